//! Page orchestration: authentication, data loading, and view building

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{AuthProvider, Session};
use crate::client::MailClientFactory;
use crate::counters::fetch_counts;
use crate::error::Result;
use crate::hydration::ThreadHydrator;
use crate::models::ThreadTrackerType;
use crate::refresh::RefreshControl;
use crate::resolution::{ResolutionAction, ResolutionOutcome};
use crate::store::{ThreadTrackerStore, TrackerQuery};
use crate::tracker::{
    render_tracker_list, RowControl, ThreadSelection, TrackerFlags, TrackerListProps,
    TrackerListView, TrackerRow,
};
use crate::wizard::{render_step, CleanStep, StepView};

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanPageView {
    NotAuthenticated,
    Step(StepView),
}

/// The inbox cleaning wizard page
pub struct CleanPage {
    auth: Arc<dyn AuthProvider>,
    clients: Arc<dyn MailClientFactory>,
}

impl CleanPage {
    pub fn new(auth: Arc<dyn AuthProvider>, clients: Arc<dyn MailClientFactory>) -> Self {
        Self { auth, clients }
    }

    /// Render the step named by the raw `step` query parameter
    ///
    /// Both mailbox counters are read on every render, whichever step is shown.
    pub async fn render(&self, step_param: Option<&str>) -> Result<CleanPageView> {
        let session = match self.auth.auth().await? {
            Some(session) if session.email().is_some() => session,
            _ => return Ok(CleanPageView::NotAuthenticated),
        };

        let client = self.clients.client_for(&session);
        let counts = fetch_counts(client.as_ref()).await?;

        let step = CleanStep::from_param(step_param);
        debug!("Rendering clean step {:?} (unhandled={})", step, counts.unhandled());
        Ok(CleanPageView::Step(render_step(step, counts.unhandled())))
    }
}

/// Which trackers a reply tracker page lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerPageRequest {
    pub tracker_type: Option<ThreadTrackerType>,
    pub resolved: bool,
    /// 1-based
    pub page: usize,
    /// Raw `enabled` query parameter
    pub enabled: Option<String>,
}

impl TrackerPageRequest {
    pub fn new(tracker_type: Option<ThreadTrackerType>, resolved: bool) -> Self {
        Self {
            tracker_type,
            resolved,
            page: 1,
            enabled: None,
        }
    }

    /// Unresolved threads that need an action from the user
    pub fn needs_action() -> Self {
        Self::new(Some(ThreadTrackerType::NeedsAction), false)
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn enabled(mut self, enabled: Option<&str>) -> Self {
        self.enabled = enabled.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerPageView {
    Redirect(String),
    List {
        props: TrackerListProps,
        view: TrackerListView,
    },
}

/// A tracker page whose hydration may still be running
pub struct PendingTrackerPage {
    session: Session,
    props: TrackerListProps,
    flags: TrackerFlags,
    /// What the page shows right now
    pub initial: TrackerListView,
    handle: Option<JoinHandle<()>>,
}

impl PendingTrackerPage {
    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// Outcome of starting a tracker page load
pub enum TrackerPageStart {
    Redirect(String),
    Pending(PendingTrackerPage),
}

/// The reply tracker page for one signed-in user
pub struct ReplyTrackerPage {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn ThreadTrackerStore>,
    hydrator: Arc<ThreadHydrator>,
    resolution: ResolutionAction,
    refresh: RefreshControl,
    selection: Mutex<ThreadSelection>,
    page_size: usize,
}

impl ReplyTrackerPage {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn ThreadTrackerStore>,
        hydrator: Arc<ThreadHydrator>,
        resolution: ResolutionAction,
        refresh: RefreshControl,
        page_size: usize,
    ) -> Self {
        Self {
            auth,
            store,
            hydrator,
            resolution,
            refresh,
            selection: Mutex::new(ThreadSelection::new()),
            page_size,
        }
    }

    fn with_selection<T>(&self, f: impl FnOnce(&mut ThreadSelection) -> T) -> T {
        let mut selection = match self.selection.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut selection)
    }

    fn render(&self, props: &TrackerListProps, flags: TrackerFlags) -> TrackerListView {
        let snapshot = self.hydrator.snapshot(&props.thread_ids());
        let selection = self.with_selection(|selection| {
            // Only prune once real data for this page is in
            if let (Some(data), false) = (&snapshot.data, snapshot.is_stale) {
                selection.retain_visible(data);
            }
            selection.clone()
        });
        let is_loading = |thread_id: &str| self.resolution.is_loading(thread_id);
        render_tracker_list(
            props,
            &snapshot,
            &selection,
            flags,
            &is_loading,
            self.refresh.is_refreshing(),
        )
    }

    /// Authenticate, query the tracker page, and kick off hydration
    pub async fn start(&self, request: &TrackerPageRequest) -> Result<TrackerPageStart> {
        let session = match self.auth.auth().await? {
            Some(session) if session.user_id().is_some() => session,
            _ => return Ok(TrackerPageStart::Redirect(LOGIN_PATH.to_string())),
        };
        let user_id = session.user.id.clone();

        let query = TrackerQuery::new(&user_id, request.resolved, request.tracker_type)
            .with_page(request.page, self.page_size);
        let page = self.store.find_page(&query).await?;
        info!(
            "Loaded {} tracker(s) for page {}/{}",
            page.records.len(),
            request.page,
            page.total_pages
        );

        let props = TrackerListProps {
            trackers: page.records,
            user_email: session.email().unwrap_or_default().to_string(),
            tracker_type: request.tracker_type,
            is_resolved: request.resolved,
            total_pages: page.total_pages,
        };
        let flags = TrackerFlags::from_params(request.enabled.as_deref());

        let (_, handle) = self.hydrator.hydrate_in_background(&props.thread_ids());
        let initial = self.render(&props, flags);

        Ok(TrackerPageStart::Pending(PendingTrackerPage {
            session,
            props,
            flags,
            initial,
            handle,
        }))
    }

    /// Wait for hydration to settle and build the final view
    pub async fn finish(&self, pending: PendingTrackerPage) -> TrackerPageView {
        if let Some(handle) = pending.handle {
            if let Err(e) = handle.await {
                warn!("Hydration task ended abnormally: {}", e);
            }
        }
        let view = self.render(&pending.props, pending.flags);
        TrackerPageView::List {
            props: pending.props,
            view,
        }
    }

    /// Load the page and wait for its threads
    pub async fn load(&self, request: &TrackerPageRequest) -> Result<TrackerPageView> {
        match self.start(request).await? {
            TrackerPageStart::Redirect(path) => Ok(TrackerPageView::Redirect(path)),
            TrackerPageStart::Pending(pending) => Ok(self.finish(pending).await),
        }
    }

    /// Press a row control
    ///
    /// Nudge/Reply open the viewer and return `None`. Resolve/Unresolve run
    /// the resolution action and return its outcome.
    pub async fn press(
        &self,
        session: &Session,
        row: &TrackerRow,
        control: RowControl,
    ) -> Option<ResolutionOutcome> {
        let request = self.with_selection(|selection| selection.apply(control.effect(row)))?;
        let (thread_id, resolved) = request;
        Some(self.resolution.run(&session.user.id, &thread_id, resolved).await)
    }

    /// Close the thread viewer
    pub fn close_viewer(&self) {
        self.with_selection(|selection| selection.clear());
    }

    /// Refresh control: invalidate cached threads and mark busy briefly
    pub fn refresh(&self) -> JoinHandle<()> {
        let hydrator = Arc::clone(&self.hydrator);
        self.refresh.trigger(move || hydrator.invalidate())
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }
}
