//! Inbox cleaning wizard
//!
//! The wizard has no server-side state: the active step is carried in the
//! `step` query parameter and every render is a pure function of that value
//! and the mailbox counts. Moving between steps is done by links that rewrite
//! the parameter, built with [`CleanStep::href`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Steps of the cleaning wizard, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CleanStep {
    Intro,
    ArchiveOrRead,
    TimeRange,
    LabelOptions,
    FinalConfirmation,
}

impl CleanStep {
    pub const ALL: [CleanStep; 5] = [
        CleanStep::Intro,
        CleanStep::ArchiveOrRead,
        CleanStep::TimeRange,
        CleanStep::LabelOptions,
        CleanStep::FinalConfirmation,
    ];

    pub fn index(self) -> u8 {
        match self {
            CleanStep::Intro => 0,
            CleanStep::ArchiveOrRead => 1,
            CleanStep::TimeRange => 2,
            CleanStep::LabelOptions => 3,
            CleanStep::FinalConfirmation => 4,
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| i64::from(s.index()) == index)
    }

    /// Parse the raw `step` query parameter
    ///
    /// Only the leading integer counts, so `"2abc"` and `"2.5"` are step 2.
    /// Missing, non-numeric, and out-of-range values all resolve to `Intro`.
    pub fn from_param(raw: Option<&str>) -> Self {
        raw.and_then(leading_integer)
            .and_then(Self::from_index)
            .unwrap_or(CleanStep::Intro)
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(i64::from(self.index()) + 1)
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_index(i64::from(self.index()) - 1)
    }

    /// Link target for this step
    pub fn href(self) -> String {
        format!("/clean?step={}", self.index())
    }
}

/// Optional sign followed by digits, after any leading whitespace
fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse().ok()
}

impl Default for CleanStep {
    fn default() -> Self {
        CleanStep::Intro
    }
}

/// What the cleanup does with matching messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CleanAction {
    Archive,
    MarkRead,
}

impl CleanAction {
    pub const ALL: [CleanAction; 2] = [CleanAction::Archive, CleanAction::MarkRead];

    pub fn label(self) -> &'static str {
        match self {
            CleanAction::Archive => "Archive",
            CleanAction::MarkRead => "Mark as read",
        }
    }
}

impl fmt::Display for CleanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanAction::Archive => f.write_str("ARCHIVE"),
            CleanAction::MarkRead => f.write_str("MARK_READ"),
        }
    }
}

/// Age cut-off offered on the time range step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRangeOption {
    All,
    OlderThanDay,
    OlderThanThreeDays,
    OlderThanWeek,
    OlderThanTwoWeeks,
    OlderThanMonth,
    OlderThanThreeMonths,
}

impl TimeRangeOption {
    pub const ALL: [TimeRangeOption; 7] = [
        TimeRangeOption::All,
        TimeRangeOption::OlderThanDay,
        TimeRangeOption::OlderThanThreeDays,
        TimeRangeOption::OlderThanWeek,
        TimeRangeOption::OlderThanTwoWeeks,
        TimeRangeOption::OlderThanMonth,
        TimeRangeOption::OlderThanThreeMonths,
    ];

    /// Minimum message age in days; 0 means every message
    pub fn days(self) -> u32 {
        match self {
            TimeRangeOption::All => 0,
            TimeRangeOption::OlderThanDay => 1,
            TimeRangeOption::OlderThanThreeDays => 3,
            TimeRangeOption::OlderThanWeek => 7,
            TimeRangeOption::OlderThanTwoWeeks => 14,
            TimeRangeOption::OlderThanMonth => 30,
            TimeRangeOption::OlderThanThreeMonths => 90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeRangeOption::All => "All emails",
            TimeRangeOption::OlderThanDay => "Older than 1 day",
            TimeRangeOption::OlderThanThreeDays => "Older than 3 days",
            TimeRangeOption::OlderThanWeek => "Older than 1 week",
            TimeRangeOption::OlderThanTwoWeeks => "Older than 2 weeks",
            TimeRangeOption::OlderThanMonth => "Older than 1 month",
            TimeRangeOption::OlderThanThreeMonths => "Older than 3 months",
        }
    }
}

/// Content of one wizard step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepView {
    Intro {
        unhandled_count: u64,
        clean_action: CleanAction,
    },
    ActionSelection,
    TimeRange,
    CleanInstructions,
    Confirmation {
        unhandled_count: u64,
    },
}

impl StepView {
    pub fn step(&self) -> CleanStep {
        match self {
            StepView::Intro { .. } => CleanStep::Intro,
            StepView::ActionSelection => CleanStep::ArchiveOrRead,
            StepView::TimeRange => CleanStep::TimeRange,
            StepView::CleanInstructions => CleanStep::LabelOptions,
            StepView::Confirmation { .. } => CleanStep::FinalConfirmation,
        }
    }
}

/// Map a step to its content
pub fn render_step(step: CleanStep, unhandled_count: u64) -> StepView {
    match step {
        CleanStep::ArchiveOrRead => StepView::ActionSelection,
        CleanStep::TimeRange => StepView::TimeRange,
        CleanStep::LabelOptions => StepView::CleanInstructions,
        CleanStep::FinalConfirmation => StepView::Confirmation { unhandled_count },
        CleanStep::Intro => StepView::Intro {
            unhandled_count,
            clean_action: CleanAction::Archive,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_param_known_steps() {
        assert_eq!(CleanStep::from_param(Some("0")), CleanStep::Intro);
        assert_eq!(CleanStep::from_param(Some("1")), CleanStep::ArchiveOrRead);
        assert_eq!(CleanStep::from_param(Some("2")), CleanStep::TimeRange);
        assert_eq!(CleanStep::from_param(Some("3")), CleanStep::LabelOptions);
        assert_eq!(CleanStep::from_param(Some("4")), CleanStep::FinalConfirmation);
    }

    #[test]
    fn test_from_param_fallbacks() {
        assert_eq!(CleanStep::from_param(None), CleanStep::Intro);
        assert_eq!(CleanStep::from_param(Some("")), CleanStep::Intro);
        assert_eq!(CleanStep::from_param(Some("5")), CleanStep::Intro);
        assert_eq!(CleanStep::from_param(Some("-1")), CleanStep::Intro);
        assert_eq!(CleanStep::from_param(Some("abc")), CleanStep::Intro);
        assert_eq!(CleanStep::from_param(Some("-")), CleanStep::Intro);
        assert_eq!(CleanStep::from_param(Some("x2")), CleanStep::Intro);
        assert_eq!(CleanStep::from_param(Some("45")), CleanStep::Intro);
        assert_eq!(
            CleanStep::from_param(Some("99999999999999999999999")),
            CleanStep::Intro
        );
    }

    #[test]
    fn test_from_param_reads_leading_integer() {
        assert_eq!(CleanStep::from_param(Some("2abc")), CleanStep::TimeRange);
        assert_eq!(CleanStep::from_param(Some("2.5")), CleanStep::TimeRange);
        assert_eq!(CleanStep::from_param(Some("1e3")), CleanStep::ArchiveOrRead);
        assert_eq!(CleanStep::from_param(Some("4px")), CleanStep::FinalConfirmation);
        assert_eq!(CleanStep::from_param(Some("  3")), CleanStep::LabelOptions);
        assert_eq!(CleanStep::from_param(Some("+1")), CleanStep::ArchiveOrRead);
        assert_eq!(CleanStep::from_param(Some("-0")), CleanStep::Intro);
    }

    #[test]
    fn test_render_step_mapping() {
        assert_eq!(
            render_step(CleanStep::Intro, 7),
            StepView::Intro {
                unhandled_count: 7,
                clean_action: CleanAction::Archive
            }
        );
        assert_eq!(render_step(CleanStep::ArchiveOrRead, 7), StepView::ActionSelection);
        assert_eq!(render_step(CleanStep::TimeRange, 7), StepView::TimeRange);
        assert_eq!(render_step(CleanStep::LabelOptions, 7), StepView::CleanInstructions);
        assert_eq!(
            render_step(CleanStep::FinalConfirmation, 7),
            StepView::Confirmation { unhandled_count: 7 }
        );
    }

    #[test]
    fn test_navigation_helpers() {
        assert_eq!(CleanStep::Intro.next(), Some(CleanStep::ArchiveOrRead));
        assert_eq!(CleanStep::Intro.previous(), None);
        assert_eq!(CleanStep::FinalConfirmation.next(), None);
        assert_eq!(CleanStep::TimeRange.href(), "/clean?step=2");

        for step in CleanStep::ALL {
            assert_eq!(render_step(step, 0).step(), step);
        }
    }

    proptest! {
        #[test]
        fn prop_out_of_range_integers_render_intro(n in any::<i64>().prop_filter("outside 0..=4", |n| !(0..=4).contains(n))) {
            let step = CleanStep::from_param(Some(&n.to_string()));
            prop_assert_eq!(step, CleanStep::Intro);
            let is_intro = matches!(render_step(step, 1), StepView::Intro { .. });
            prop_assert!(is_intro);
        }

        #[test]
        fn prop_non_numeric_strings_render_intro(s in "[^0-9]*") {
            prop_assert_eq!(CleanStep::from_param(Some(&s)), CleanStep::Intro);
        }
    }
}
