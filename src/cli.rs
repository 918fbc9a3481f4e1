//! Command-line interface and terminal rendering

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::{AuthProvider, Session};
use crate::client::MailClient;
use crate::config::{Config, StoreBackend, StoreConfig};
use crate::error::{Result, TriageError};
use crate::hydration::{ThreadCache, ThreadHydrator};
use crate::models::{Thread, ThreadTracker, ThreadTrackerType};
use crate::notify::Notifier;
use crate::pages::{
    CleanPageView, ReplyTrackerPage, TrackerPageRequest, TrackerPageStart, TrackerPageView,
};
use crate::refresh::RefreshControl;
use crate::resolution::{ResolutionAction, ResolutionOutcome};
use crate::store::{InMemoryTrackerStore, ThreadTrackerStore};
use crate::tracker::{
    EmptyState, ListPane, RowControl, ThreadViewer, TrackerLayout, TrackerListProps,
    TrackerListView, TrackerRow,
};
use crate::wizard::{CleanAction, CleanStep, StepView, TimeRangeOption};

#[derive(Parser, Debug)]
#[command(name = "mail-triage")]
#[command(version)]
#[command(about = "Inbox cleaning wizard and reply tracker for Gmail", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".mail-triage/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Show a step of the inbox cleaning wizard
    Clean {
        /// Step number (0-4); anything else shows the intro
        #[arg(short, long)]
        step: Option<String>,
    },

    /// Reply tracker operations
    Tracker {
        #[command(subcommand)]
        command: TrackerCommand,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum TrackerCommand {
    /// List tracked threads
    List {
        /// Only trackers of this type (awaiting, needs-reply, needs-action)
        #[arg(short = 't', long = "type")]
        tracker_type: Option<ThreadTrackerType>,

        /// List resolved trackers instead of open ones
        #[arg(long)]
        resolved: bool,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Tracking enabled flag ("true" shows the analyzing state when empty)
        #[arg(long)]
        enabled: Option<String>,

        /// Pick rows and press their controls
        #[arg(short, long)]
        interactive: bool,
    },

    /// List open threads that need an action
    NeedsAction {
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        #[arg(short, long)]
        interactive: bool,
    },

    /// Mark a thread as done
    Resolve { thread_id: String },

    /// Mark a thread as not done
    Unresolve { thread_id: String },

    /// Start tracking a thread
    Track {
        thread_id: String,

        #[arg(short = 't', long = "type")]
        tracker_type: ThreadTrackerType,
    },
}

/// Truncate a string to max_len characters, adding "..." if truncated
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

/// Spinner shown while something loads
pub struct ProgressReporter {
    spinner_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self { spinner_style }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        if !msg.is_empty() {
            println!("{}", msg);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifier printing toasts to the terminal
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn success(&self, title: &str, description: &str) {
        info!("{}: {}", title, description);
        println!("✓ {}: {}", title, description);
    }

    fn error(&self, title: &str, description: &str) {
        warn!("{}: {}", title, description);
        eprintln!("✗ {}: {}", title, description);
    }
}

pub fn render_clean_view(view: &CleanPageView) -> String {
    let step = match view {
        CleanPageView::NotAuthenticated => {
            return "Not authenticated. Run `mail-triage auth` first.".to_string();
        }
        CleanPageView::Step(step) => step,
    };

    let mut out = String::new();
    out.push_str(&format!(
        "Clean your inbox - step {}/{}\n\n",
        step.step().index(),
        CleanStep::ALL.len() - 1
    ));

    match step {
        StepView::Intro {
            unhandled_count,
            clean_action,
        } => {
            out.push_str(&format!(
                "You have {} unhandled email(s) in your inbox.\n",
                unhandled_count
            ));
            out.push_str(&format!("Default action: {}\n", clean_action));
        }
        StepView::ActionSelection => {
            out.push_str("What should happen to the emails we clean?\n");
            for action in CleanAction::ALL {
                out.push_str(&format!("  - {}\n", action.label()));
            }
        }
        StepView::TimeRange => {
            out.push_str("Which emails should be cleaned?\n");
            for option in TimeRangeOption::ALL {
                out.push_str(&format!("  - {}\n", option.label()));
            }
        }
        StepView::CleanInstructions => {
            out.push_str("Describe any emails that should never be cleaned, ");
            out.push_str("and pick labels to apply to cleaned emails.\n");
        }
        StepView::Confirmation { unhandled_count } => {
            out.push_str(&format!(
                "Ready to process {} email(s). Confirm to start cleaning.\n",
                unhandled_count
            ));
        }
    }

    let current = step.step();
    if let Some(previous) = current.previous() {
        out.push_str(&format!("\nBack: {}", previous.href()));
    }
    if let Some(next) = current.next() {
        out.push_str(&format!("\nNext: {}", next.href()));
    }
    out
}

fn render_list_pane(out: &mut String, pane: &ListPane, selected: Option<&str>) {
    for (i, row) in pane.rows.iter().enumerate() {
        let marker = if selected == Some(row.thread_id.as_str()) {
            '>'
        } else {
            ' '
        };
        let sender = row.sender_name.as_deref().unwrap_or(&row.sender_email);
        let controls: Vec<String> = row
            .controls
            .iter()
            .map(|c| {
                if c.is_loading() {
                    format!("[{}…]", c.label())
                } else {
                    format!("[{}]", c.label())
                }
            })
            .collect();

        out.push_str(&format!(
            "{} {:>3}. {:<24} {:<40} {}\n",
            marker,
            i + 1,
            truncate_string(sender, 24),
            truncate_string(&row.subject, 40),
            row.internal_date.format("%Y-%m-%d %H:%M"),
        ));
        out.push_str(&format!(
            "        {}  {}\n",
            truncate_string(&row.snippet, 64),
            controls.join(" ")
        ));
    }
    out.push_str(&format!("\nPages: {}\n", pane.pagination.total_pages));
}

pub fn render_tracker_view(props: &TrackerListProps, view: &TrackerListView) -> String {
    let mut out = String::new();
    let title = match (props.tracker_type, props.is_resolved) {
        (_, true) => "Done".to_string(),
        (Some(t), false) => t.to_string(),
        (None, false) => "All".to_string(),
    };
    out.push_str(&format!("Reply tracker - {}\n\n", title));

    match view {
        TrackerListView::Loading => out.push_str("Loading...\n"),
        TrackerListView::Failed { message } => {
            out.push_str(&format!("Failed to load threads: {}\n", message));
        }
        TrackerListView::Empty(EmptyState::Plain { message }) => {
            out.push_str(message);
            out.push('\n');
        }
        TrackerListView::Empty(EmptyState::Analyzing {
            message,
            refreshing,
        }) => {
            out.push_str(message);
            out.push('\n');
            out.push_str(if *refreshing {
                "[Refreshing...]\n"
            } else {
                "[Refresh]\n"
            });
        }
        TrackerListView::Ready(TrackerLayout::Single(pane)) => {
            render_list_pane(&mut out, pane, None);
        }
        TrackerListView::Ready(TrackerLayout::Split { list, viewer, .. }) => {
            render_list_pane(&mut out, list, Some(&viewer.thread_id));
        }
    }
    out
}

/// Thread content for the detail viewer
pub fn render_thread(viewer: &ThreadViewer, thread: &Thread) -> String {
    let mut out = String::new();
    out.push_str(&format!("── Thread {} ──\n", viewer.thread_id));
    for message in &thread.messages {
        out.push_str(&format!(
            "\nFrom: {}\nTo: {}\nSubject: {}\nDate: {}\n\n{}\n",
            message.headers.from,
            message.headers.to,
            message.headers.subject,
            message.internal_date.format("%Y-%m-%d %H:%M"),
            message.snippet,
        ));
        if viewer.show_reply_button && message.id == viewer.auto_open_reply_for_message_id {
            out.push_str(&format!("\n[Reply as {}]\n", viewer.user_email));
        }
    }
    out
}

/// Open the tracker store named by the configuration
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn ThreadTrackerStore>> {
    match config.backend {
        StoreBackend::Json => Ok(Arc::new(InMemoryTrackerStore::open(&config.path).await?)),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => Ok(Arc::new(crate::store::SqliteTrackerStore::open(
            &config.path,
        )?)),
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => Err(TriageError::ConfigError(
            "sqlite store requested but the sqlite feature is not enabled".to_string(),
        )),
    }
}

/// Wire a reply tracker page from configuration
pub fn build_tracker_page(
    config: &Config,
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn ThreadTrackerStore>,
    client: Arc<dyn MailClient>,
    notifier: Arc<dyn Notifier>,
) -> Result<ReplyTrackerPage> {
    let capacity = NonZeroUsize::new(config.tracker.cache_capacity).ok_or_else(|| {
        TriageError::ConfigError("tracker.cache_capacity must be at least 1".to_string())
    })?;
    let cache = ThreadCache::new(capacity, config.tracker.stale_after());
    let hydrator = Arc::new(ThreadHydrator::new(client, cache, true));
    let resolution = ResolutionAction::new(Arc::clone(&store), notifier);

    Ok(ReplyTrackerPage::new(
        auth,
        store,
        hydrator,
        resolution,
        RefreshControl::new(config.tracker.refresh_reset()),
        config.tracker.page_size,
    ))
}

enum MenuChoice {
    Row(usize, String),
    CloseViewer,
    Refresh,
    Quit,
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuChoice::Row(i, label) => write!(f, "{}. {}", i + 1, label),
            MenuChoice::CloseViewer => f.write_str("Close viewer"),
            MenuChoice::Refresh => f.write_str("Refresh"),
            MenuChoice::Quit => f.write_str("Quit"),
        }
    }
}

struct ControlChoice(RowControl);

impl fmt::Display for ControlChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.label())
    }
}

fn prompt_error(e: inquire::InquireError) -> TriageError {
    TriageError::Unknown(format!("Prompt failed: {}", e))
}

/// Load a tracker page, print it, and optionally let the user work on it
pub async fn run_tracker_list(
    page: &ReplyTrackerPage,
    client: Arc<dyn MailClient>,
    request: &TrackerPageRequest,
    interactive: bool,
) -> Result<()> {
    let reporter = ProgressReporter::new();

    loop {
        let pending = match page.start(request).await? {
            TrackerPageStart::Redirect(path) => {
                println!("Not signed in ({}). Run `mail-triage auth` first.", path);
                return Ok(());
            }
            TrackerPageStart::Pending(pending) => pending,
        };
        let session: Session = pending.session().clone();

        let spinner = matches!(pending.initial, TrackerListView::Loading)
            .then(|| reporter.add_spinner("Loading threads..."));
        let view = page.finish(pending).await;
        if let Some(pb) = &spinner {
            reporter.finish_spinner(pb, "");
        }

        let TrackerPageView::List { props, view } = view else {
            return Ok(());
        };
        println!("{}", render_tracker_view(&props, &view));

        if let TrackerListView::Ready(TrackerLayout::Split { viewer, .. }) = &view {
            match client.get_thread(&viewer.thread_id).await {
                Ok(thread) => println!("{}", render_thread(viewer, &thread)),
                Err(e) => warn!("Could not open thread {}: {}", viewer.thread_id, e),
            }
        }

        if !interactive {
            return Ok(());
        }

        let mut choices = Vec::new();
        let rows: Vec<TrackerRow> = match &view {
            TrackerListView::Ready(layout) => layout.list().rows.clone(),
            _ => Vec::new(),
        };
        for (i, row) in rows.iter().enumerate() {
            choices.push(MenuChoice::Row(i, truncate_string(&row.subject, 60)));
        }
        if matches!(view, TrackerListView::Ready(TrackerLayout::Split { .. })) {
            choices.push(MenuChoice::CloseViewer);
        }
        choices.push(MenuChoice::Refresh);
        choices.push(MenuChoice::Quit);

        let choice = inquire::Select::new("Choose:", choices)
            .with_page_size(12)
            .prompt()
            .map_err(prompt_error)?;

        match choice {
            MenuChoice::Quit => return Ok(()),
            MenuChoice::CloseViewer => page.close_viewer(),
            MenuChoice::Refresh => {
                let _reset = page.refresh();
            }
            MenuChoice::Row(index, _) => {
                let Some(row) = rows.get(index) else {
                    continue;
                };
                let controls = row.controls.iter().copied().map(ControlChoice).collect();
                let control = inquire::Select::new("Action:", controls)
                    .prompt()
                    .map_err(prompt_error)?;

                if let Some(ResolutionOutcome::Skipped) =
                    page.press(&session, row, control.0).await
                {
                    println!("Already in progress");
                }
            }
        }
    }
}

/// Set the resolved flag on one thread for the signed-in user
pub async fn run_set_resolved(
    auth: &dyn AuthProvider,
    action: &ResolutionAction,
    thread_id: &str,
    resolved: bool,
) -> Result<()> {
    let session = auth
        .auth()
        .await?
        .filter(|s| s.user_id().is_some())
        .ok_or_else(|| TriageError::AuthError("Not signed in".to_string()))?;

    match action.run(&session.user.id, thread_id, resolved).await {
        ResolutionOutcome::Failed(message) => Err(TriageError::StoreError(message)),
        _ => Ok(()),
    }
}

/// Record a new tracker for the signed-in user
pub async fn run_track(
    auth: &dyn AuthProvider,
    store: &dyn ThreadTrackerStore,
    thread_id: &str,
    tracker_type: ThreadTrackerType,
) -> Result<ThreadTracker> {
    let session = auth
        .auth()
        .await?
        .filter(|s| s.user_id().is_some())
        .ok_or_else(|| TriageError::AuthError("Not signed in".to_string()))?;

    let tracker = ThreadTracker::new(&session.user.id, thread_id, tracker_type);
    store.insert(tracker.clone()).await?;
    info!("Tracking thread {} as {}", thread_id, tracker_type);
    Ok(tracker)
}
