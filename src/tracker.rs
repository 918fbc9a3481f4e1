//! Reply tracker list view
//!
//! Turns a page of trackers plus their hydrated threads into a typed view:
//! a loading state, an empty state, or rows sorted by last activity with
//! per-row controls. Choosing Nudge/Reply on a row selects its last message
//! and switches the layout to a list + thread viewer split.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::hydration::HydrationSnapshot;
use crate::models::{parse_address, SelectedEmail, Thread, ThreadTracker, ThreadTrackerType};

pub const NO_EMAILS_MESSAGE: &str = "No emails yet!";
pub const ANALYZING_MESSAGE: &str = "Analyzing your emails...";

/// Inputs for one rendering of the tracker list
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerListProps {
    pub trackers: Vec<ThreadTracker>,
    pub user_email: String,
    pub tracker_type: Option<ThreadTrackerType>,
    pub is_resolved: bool,
    pub total_pages: usize,
}

impl TrackerListProps {
    pub fn thread_ids(&self) -> Vec<String> {
        self.trackers.iter().map(|t| t.thread_id.clone()).collect()
    }
}

/// Query-string flags read by the tracker page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerFlags {
    /// Reply tracking is switched on and classification may still be running
    pub enabled: bool,
}

impl TrackerFlags {
    pub fn from_params(enabled: Option<&str>) -> Self {
        Self {
            enabled: parse_bool_param(enabled),
        }
    }
}

/// Only "true" (any case) is true; anything else, including absence, is false
pub fn parse_bool_param(raw: Option<&str>) -> bool {
    raw.is_some_and(|s| s.trim().eq_ignore_ascii_case("true"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowControl {
    Resolve { loading: bool },
    Unresolve { loading: bool },
    Nudge,
    Reply,
}

impl RowControl {
    pub fn label(&self) -> &'static str {
        match self {
            RowControl::Resolve { .. } => "Mark Done",
            RowControl::Unresolve { .. } => "Mark as not done",
            RowControl::Nudge => "Nudge",
            RowControl::Reply => "Reply",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            RowControl::Resolve { loading: true } | RowControl::Unresolve { loading: true }
        )
    }

    /// What pressing this control on `row` does
    pub fn effect(&self, row: &TrackerRow) -> ControlEffect {
        match self {
            RowControl::Resolve { .. } => ControlEffect::SetResolved {
                thread_id: row.thread_id.clone(),
                resolved: true,
            },
            RowControl::Unresolve { .. } => ControlEffect::SetResolved {
                thread_id: row.thread_id.clone(),
                resolved: false,
            },
            RowControl::Nudge | RowControl::Reply => ControlEffect::Select(SelectedEmail {
                thread_id: row.thread_id.clone(),
                message_id: row.message_id.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEffect {
    /// Open the viewer on this message; nothing is mutated
    Select(SelectedEmail),
    /// Run the resolution action
    SetResolved { thread_id: String, resolved: bool },
}

/// One list row, built from a thread's last message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerRow {
    pub thread_id: String,
    pub message_id: String,
    pub from: String,
    pub sender_name: Option<String>,
    pub sender_email: String,
    pub subject: String,
    pub snippet: String,
    pub internal_date: DateTime<Utc>,
    pub controls: Vec<RowControl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListPane {
    pub rows: Vec<TrackerRow>,
    pub pagination: Pagination,
}

/// Resizable panel sizes, in percent of the available width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSize {
    pub default_size: u8,
    pub min_size: u8,
}

pub const LIST_PANEL: PanelSize = PanelSize {
    default_size: 40,
    min_size: 35,
};

pub const VIEWER_PANEL: PanelSize = PanelSize {
    default_size: 60,
    min_size: 35,
};

/// Detail viewer scoped to the selected thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadViewer {
    pub thread_id: String,
    pub show_reply_button: bool,
    pub auto_open_reply_for_message_id: String,
    pub user_email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerLayout {
    Single(ListPane),
    Split {
        list: ListPane,
        list_panel: PanelSize,
        viewer: ThreadViewer,
        viewer_panel: PanelSize,
    },
}

impl TrackerLayout {
    pub fn list(&self) -> &ListPane {
        match self {
            TrackerLayout::Single(list) => list,
            TrackerLayout::Split { list, .. } => list,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyState {
    Plain { message: String },
    Analyzing { message: String, refreshing: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerListView {
    Loading,
    Empty(EmptyState),
    /// Hydration failed and there is nothing cached to show
    Failed { message: String },
    Ready(TrackerLayout),
}

/// Which thread the viewer is open on
///
/// Transitions are explicit: [`select`](Self::select) replaces any previous
/// choice, [`clear`](Self::clear) closes the viewer, and
/// [`retain_visible`](Self::retain_visible) closes it when the selected
/// thread drops out of the hydrated list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSelection {
    selected: Option<SelectedEmail>,
}

impl ThreadSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&SelectedEmail> {
        self.selected.as_ref()
    }

    pub fn select(&mut self, email: SelectedEmail) {
        self.selected = Some(email);
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn retain_visible(&mut self, threads: &[Thread]) {
        let visible = self
            .selected
            .as_ref()
            .is_some_and(|s| threads.iter().any(|t| t.id == s.thread_id));
        if !visible {
            self.selected = None;
        }
    }

    /// Apply a control's effect, returning the resolution request if any
    pub fn apply(&mut self, effect: ControlEffect) -> Option<(String, bool)> {
        match effect {
            ControlEffect::Select(email) => {
                self.select(email);
                None
            }
            ControlEffect::SetResolved { thread_id, resolved } => Some((thread_id, resolved)),
        }
    }
}

/// Threads ordered by their last message, most recent first
pub fn sort_by_recency(threads: &[Thread]) -> Vec<&Thread> {
    let mut sorted: Vec<&Thread> = threads.iter().collect();
    sorted.sort_by_key(|t| std::cmp::Reverse(t.last_activity()));
    sorted
}

fn row_controls(
    props: &TrackerListProps,
    thread_id: &str,
    is_loading: &dyn Fn(&str) -> bool,
) -> Vec<RowControl> {
    let loading = is_loading(thread_id);
    if props.is_resolved {
        return vec![RowControl::Unresolve { loading }];
    }

    let mut controls = Vec::with_capacity(2);
    match props.tracker_type {
        Some(ThreadTrackerType::Awaiting) => controls.push(RowControl::Nudge),
        Some(_) => controls.push(RowControl::Reply),
        None => {}
    }
    controls.push(RowControl::Resolve { loading });
    controls
}

/// Rows for every thread with at least one message, most recent first
pub fn build_rows(
    props: &TrackerListProps,
    threads: &[Thread],
    is_loading: &dyn Fn(&str) -> bool,
) -> Vec<TrackerRow> {
    sort_by_recency(threads)
        .into_iter()
        .filter_map(|thread| {
            let message = thread.last_message()?;
            let (sender_name, sender_email) = parse_address(&message.headers.from);
            Some(TrackerRow {
                thread_id: message.thread_id.clone(),
                message_id: message.id.clone(),
                from: message.headers.from.clone(),
                sender_name,
                sender_email,
                subject: message.headers.subject.clone(),
                snippet: message.snippet.clone(),
                internal_date: message.internal_date,
                controls: row_controls(props, &message.thread_id, is_loading),
            })
        })
        .collect()
}

fn empty_state(props: &TrackerListProps, flags: TrackerFlags, refreshing: bool) -> EmptyState {
    if flags.enabled && !props.is_resolved {
        EmptyState::Analyzing {
            message: ANALYZING_MESSAGE.to_string(),
            refreshing,
        }
    } else {
        EmptyState::Plain {
            message: NO_EMAILS_MESSAGE.to_string(),
        }
    }
}

/// Build the tracker list view for one render
///
/// `is_loading` reports whether a row's resolve control has a request in
/// flight; `refreshing` is the refresh control's busy flag.
pub fn render_tracker_list(
    props: &TrackerListProps,
    snapshot: &HydrationSnapshot,
    selection: &ThreadSelection,
    flags: TrackerFlags,
    is_loading: &dyn Fn(&str) -> bool,
    refreshing: bool,
) -> TrackerListView {
    let threads = match &snapshot.data {
        Some(data) => data,
        None if snapshot.is_loading => return TrackerListView::Loading,
        None => {
            if let Some(error) = &snapshot.error {
                return TrackerListView::Failed {
                    message: error.clone(),
                };
            }
            return TrackerListView::Empty(empty_state(props, flags, refreshing));
        }
    };

    let rows = build_rows(props, threads, is_loading);
    if rows.is_empty() {
        return TrackerListView::Empty(empty_state(props, flags, refreshing));
    }

    let list = ListPane {
        rows,
        pagination: Pagination {
            total_pages: props.total_pages,
        },
    };

    match selection.selected() {
        None => TrackerListView::Ready(TrackerLayout::Single(list)),
        Some(selected) => TrackerListView::Ready(TrackerLayout::Split {
            list,
            list_panel: LIST_PANEL,
            viewer: ThreadViewer {
                thread_id: selected.thread_id.clone(),
                show_reply_button: true,
                auto_open_reply_for_message_id: selected.message_id.clone(),
                user_email: props.user_email.clone(),
            },
            viewer_panel: VIEWER_PANEL,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageHeaders, ParsedMessage};
    use chrono::TimeZone;

    fn message(thread: &str, id: &str, secs: i64) -> ParsedMessage {
        ParsedMessage {
            id: id.to_string(),
            thread_id: thread.to_string(),
            headers: MessageHeaders {
                from: format!("Sender {} <{}@example.com>", id, id),
                subject: format!("Subject {}", id),
                ..Default::default()
            },
            snippet: format!("snippet {}", id),
            internal_date: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn thread(id: &str, last_secs: i64) -> Thread {
        Thread {
            id: id.to_string(),
            messages: vec![
                message(id, &format!("{}-first", id), 1),
                message(id, &format!("{}-last", id), last_secs),
            ],
        }
    }

    fn props(tracker_type: Option<ThreadTrackerType>, is_resolved: bool) -> TrackerListProps {
        TrackerListProps {
            trackers: vec![],
            user_email: "me@example.com".to_string(),
            tracker_type,
            is_resolved,
            total_pages: 3,
        }
    }

    fn idle(_: &str) -> bool {
        false
    }

    fn render(
        props: &TrackerListProps,
        snapshot: &HydrationSnapshot,
        selection: &ThreadSelection,
        flags: TrackerFlags,
    ) -> TrackerListView {
        render_tracker_list(props, snapshot, selection, flags, &idle, false)
    }

    #[test]
    fn test_loading_when_in_flight_without_data() {
        let view = render(
            &props(None, false),
            &HydrationSnapshot::loading(),
            &ThreadSelection::new(),
            TrackerFlags::default(),
        );
        assert_eq!(view, TrackerListView::Loading);
    }

    #[test]
    fn test_threads_without_messages_render_empty_state() {
        let snapshot = HydrationSnapshot::ready(vec![
            Thread {
                id: "t1".to_string(),
                messages: vec![],
            },
            Thread {
                id: "t2".to_string(),
                messages: vec![],
            },
        ]);
        let view = render(
            &props(Some(ThreadTrackerType::Awaiting), false),
            &snapshot,
            &ThreadSelection::new(),
            TrackerFlags::default(),
        );
        assert_eq!(
            view,
            TrackerListView::Empty(EmptyState::Plain {
                message: NO_EMAILS_MESSAGE.to_string()
            })
        );
    }

    #[test]
    fn test_empty_unresolved_without_flag_is_plain() {
        let view = render(
            &props(Some(ThreadTrackerType::Awaiting), false),
            &HydrationSnapshot::ready(vec![]),
            &ThreadSelection::new(),
            TrackerFlags { enabled: false },
        );
        assert_eq!(
            view,
            TrackerListView::Empty(EmptyState::Plain {
                message: "No emails yet!".to_string()
            })
        );
    }

    #[test]
    fn test_empty_unresolved_with_flag_is_analyzing() {
        let view = render(
            &props(None, false),
            &HydrationSnapshot::ready(vec![]),
            &ThreadSelection::new(),
            TrackerFlags { enabled: true },
        );
        assert!(matches!(
            view,
            TrackerListView::Empty(EmptyState::Analyzing { ref message, refreshing: false })
                if message == "Analyzing your emails..."
        ));
    }

    #[test]
    fn test_empty_resolved_with_flag_is_plain() {
        let view = render(
            &props(None, true),
            &HydrationSnapshot::ready(vec![]),
            &ThreadSelection::new(),
            TrackerFlags { enabled: true },
        );
        assert!(matches!(view, TrackerListView::Empty(EmptyState::Plain { .. })));
    }

    #[test]
    fn test_failed_hydration_without_data() {
        let snapshot = HydrationSnapshot {
            error: Some("Network error: offline".to_string()),
            ..Default::default()
        };
        let view = render(&props(None, false), &snapshot, &ThreadSelection::new(), TrackerFlags::default());
        assert_eq!(
            view,
            TrackerListView::Failed {
                message: "Network error: offline".to_string()
            }
        );
    }

    #[test]
    fn test_rows_sorted_by_last_message_descending() {
        let snapshot = HydrationSnapshot::ready(vec![thread("t1", 100), thread("t3", 300), thread("t2", 200)]);
        let view = render(&props(None, false), &snapshot, &ThreadSelection::new(), TrackerFlags::default());

        let TrackerListView::Ready(layout) = view else {
            panic!("expected rows");
        };
        let order: Vec<_> = layout.list().rows.iter().map(|r| r.thread_id.as_str()).collect();
        assert_eq!(order, vec!["t3", "t2", "t1"]);

        let first = &layout.list().rows[0];
        assert_eq!(first.message_id, "t3-last");
        assert_eq!(first.subject, "Subject t3-last");
        assert_eq!(first.sender_email, "t3-last@example.com");
        assert_eq!(layout.list().pagination.total_pages, 3);
    }

    #[test]
    fn test_controls_by_status_and_type() {
        let threads = vec![thread("t1", 10)];

        let resolved = build_rows(&props(Some(ThreadTrackerType::Awaiting), true), &threads, &idle);
        assert_eq!(resolved[0].controls, vec![RowControl::Unresolve { loading: false }]);

        let awaiting = build_rows(&props(Some(ThreadTrackerType::Awaiting), false), &threads, &idle);
        assert_eq!(
            awaiting[0].controls,
            vec![RowControl::Nudge, RowControl::Resolve { loading: false }]
        );

        let needs_reply = build_rows(&props(Some(ThreadTrackerType::NeedsReply), false), &threads, &idle);
        assert_eq!(needs_reply[0].controls[0], RowControl::Reply);
        assert_eq!(needs_reply[0].controls[0].label(), "Reply");

        let untyped = build_rows(&props(None, false), &threads, &idle);
        assert_eq!(untyped[0].controls, vec![RowControl::Resolve { loading: false }]);
    }

    #[test]
    fn test_loading_flag_is_per_row() {
        let threads = vec![thread("t1", 10), thread("t2", 20)];
        let busy = |id: &str| id == "t1";
        let rows = build_rows(&props(None, false), &threads, &busy);

        let t1 = rows.iter().find(|r| r.thread_id == "t1").unwrap();
        let t2 = rows.iter().find(|r| r.thread_id == "t2").unwrap();
        assert!(t1.controls[0].is_loading());
        assert!(!t2.controls[0].is_loading());
    }

    #[test]
    fn test_selection_replaces_previous_and_splits_layout() {
        let p = props(Some(ThreadTrackerType::Awaiting), false);
        let threads = vec![thread("a", 10), thread("b", 20)];
        let snapshot = HydrationSnapshot::ready(threads.clone());
        let rows = build_rows(&p, &threads, &idle);
        let row_a = rows.iter().find(|r| r.thread_id == "a").unwrap();
        let row_b = rows.iter().find(|r| r.thread_id == "b").unwrap();

        let mut selection = ThreadSelection::new();
        assert_eq!(selection.apply(RowControl::Nudge.effect(row_a)), None);
        assert_eq!(selection.selected().unwrap().thread_id, "a");

        selection.apply(RowControl::Nudge.effect(row_b));
        assert_eq!(
            selection.selected(),
            Some(&SelectedEmail {
                thread_id: "b".to_string(),
                message_id: "b-last".to_string()
            })
        );

        match render(&p, &snapshot, &selection, TrackerFlags::default()) {
            TrackerListView::Ready(TrackerLayout::Split {
                viewer,
                list_panel,
                viewer_panel,
                list,
            }) => {
                assert_eq!(viewer.thread_id, "b");
                assert_eq!(viewer.auto_open_reply_for_message_id, "b-last");
                assert!(viewer.show_reply_button);
                assert_eq!(viewer.user_email, "me@example.com");
                assert_eq!(list_panel, PanelSize { default_size: 40, min_size: 35 });
                assert_eq!(viewer_panel.min_size, 35);
                assert_eq!(list.rows.len(), 2);
            }
            other => panic!("expected split layout, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_effect_does_not_select() {
        let threads = vec![thread("a", 10)];
        let rows = build_rows(&props(None, false), &threads, &idle);
        let mut selection = ThreadSelection::new();

        let request = selection.apply(RowControl::Resolve { loading: false }.effect(&rows[0]));
        assert_eq!(request, Some(("a".to_string(), true)));
        assert!(selection.selected().is_none());
    }

    #[test]
    fn test_retain_visible_clears_missing_selection() {
        let mut selection = ThreadSelection::new();
        selection.select(SelectedEmail {
            thread_id: "a".to_string(),
            message_id: "a-last".to_string(),
        });

        selection.retain_visible(&[thread("a", 1)]);
        assert!(selection.selected().is_some());

        selection.retain_visible(&[thread("b", 1)]);
        assert!(selection.selected().is_none());
    }

    #[test]
    fn test_parse_bool_param() {
        assert!(parse_bool_param(Some("true")));
        assert!(!parse_bool_param(Some("1")));
        assert!(!parse_bool_param(Some("false")));
        assert!(!parse_bool_param(Some("yes please")));
        assert!(!parse_bool_param(None));
        assert!(TrackerFlags::from_params(Some("TRUE")).enabled);
    }
}
