//! Accounting period lifecycle structures and transition rules.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::common::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Lifecycle stage of an accounting period.
pub enum PeriodStatus {
    Planned,
    Open,
    Closing,
    Closed,
}

impl PeriodStatus {
    /// Returns the statuses a period may legally move to from `self`.
    pub fn successors(self) -> &'static [PeriodStatus] {
        match self {
            PeriodStatus::Planned => &[PeriodStatus::Open],
            PeriodStatus::Open => &[PeriodStatus::Closing, PeriodStatus::Closed],
            PeriodStatus::Closing | PeriodStatus::Closed => &[],
        }
    }

    /// Whether moving to `to` is legal. A same-status move is always a legal no-op.
    pub fn can_transition_to(self, to: PeriodStatus) -> bool {
        self == to || self.successors().contains(&to)
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PeriodStatus::Planned => "Planned",
            PeriodStatus::Open => "Open",
            PeriodStatus::Closing => "Closing",
            PeriodStatus::Closed => "Closed",
        };
        f.write_str(label)
    }
}

/// Raised when a requested status move is outside the allowed-successor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal period transition {from} -> {to}")]
pub struct PeriodTransitionError {
    pub from: PeriodStatus,
    pub to: PeriodStatus,
}

/// Validates a status move, failing with the offending pair when illegal.
pub fn ensure_transition(from: PeriodStatus, to: PeriodStatus) -> Result<(), PeriodTransitionError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(PeriodTransitionError { from, to })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur when constructing an [`AccountingPeriod`].
pub enum PeriodDatesError {
    InvalidRange,
}

impl fmt::Display for PeriodDatesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodDatesError::InvalidRange => f.write_str("period end date must be after start date"),
        }
    }
}

impl std::error::Error for PeriodDatesError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A single accounting period for a client. The date range is immutable once
/// created; only `status` and `is_current` mutate afterwards.
pub struct AccountingPeriod {
    pub id: Uuid,
    pub client_id: Uuid,
    pub period_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PeriodStatus,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountingPeriod {
    /// Creates a new `Planned` period for the client.
    pub fn new(
        client_id: Uuid,
        period_name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, PeriodDatesError> {
        if end_date <= start_date {
            return Err(PeriodDatesError::InvalidRange);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            client_id,
            period_name: period_name.into(),
            start_date,
            end_date,
            status: PeriodStatus::Planned,
            is_current: false,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Identifiable for AccountingPeriod {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for AccountingPeriod {
    fn name(&self) -> &str {
        &self.period_name
    }
}

impl Displayable for AccountingPeriod {
    fn display_label(&self) -> String {
        format!("{} [{}]", self.period_name, self.status)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
/// Period-setup figures carried alongside a period: materiality thresholds for
/// the current period, the prior period's equivalents, and team assignments.
pub struct PeriodSetup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_materiality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_materiality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trivial_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_overall_materiality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_performance_materiality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_trivial_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_member_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completer_member_id: Option<String>,
}

impl PeriodSetup {
    /// True when no figure or assignment has been captured yet.
    pub fn is_empty(&self) -> bool {
        self.overall_materiality.is_none()
            && self.performance_materiality.is_none()
            && self.trivial_threshold.is_none()
            && self.prior_overall_materiality.is_none()
            && self.prior_performance_materiality.is_none()
            && self.prior_trivial_threshold.is_none()
            && self.reviewer_member_id.is_none()
            && self.completer_member_id.is_none()
    }

    /// Derives the next period's setup: current figures shift into the prior
    /// slots, current figures and assignments start blank.
    pub fn rolled_forward(&self) -> PeriodSetup {
        PeriodSetup {
            prior_overall_materiality: self.overall_materiality,
            prior_performance_materiality: self.performance_materiality,
            prior_trivial_threshold: self.trivial_threshold,
            ..PeriodSetup::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_can_only_open() {
        assert!(PeriodStatus::Planned.can_transition_to(PeriodStatus::Open));
        assert!(!PeriodStatus::Planned.can_transition_to(PeriodStatus::Closing));
        assert!(!PeriodStatus::Planned.can_transition_to(PeriodStatus::Closed));
    }

    #[test]
    fn open_can_close_either_way() {
        assert!(PeriodStatus::Open.can_transition_to(PeriodStatus::Closing));
        assert!(PeriodStatus::Open.can_transition_to(PeriodStatus::Closed));
        assert!(!PeriodStatus::Open.can_transition_to(PeriodStatus::Planned));
    }

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(PeriodStatus::Closing.successors().is_empty());
        assert!(PeriodStatus::Closed.successors().is_empty());
    }

    #[test]
    fn same_status_is_an_idempotent_no_op() {
        for status in [
            PeriodStatus::Planned,
            PeriodStatus::Open,
            PeriodStatus::Closing,
            PeriodStatus::Closed,
        ] {
            assert!(ensure_transition(status, status).is_ok());
        }
    }

    #[test]
    fn illegal_transition_reports_both_endpoints() {
        let err = ensure_transition(PeriodStatus::Closed, PeriodStatus::Open)
            .expect_err("closed periods must not reopen");
        assert_eq!(err.from, PeriodStatus::Closed);
        assert_eq!(err.to, PeriodStatus::Open);
    }

    #[test]
    fn rejects_inverted_date_range() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let err = AccountingPeriod::new(Uuid::new_v4(), "FY25", start, start)
            .expect_err("zero-length period must be rejected");
        assert_eq!(err, PeriodDatesError::InvalidRange);
    }

    #[test]
    fn setup_roll_forward_shifts_current_into_prior() {
        let setup = PeriodSetup {
            overall_materiality: Some(120_000.0),
            performance_materiality: Some(90_000.0),
            trivial_threshold: Some(6_000.0),
            prior_overall_materiality: Some(100_000.0),
            reviewer_member_id: Some("member-1".into()),
            ..PeriodSetup::default()
        };
        let next = setup.rolled_forward();
        assert_eq!(next.prior_overall_materiality, Some(120_000.0));
        assert_eq!(next.prior_performance_materiality, Some(90_000.0));
        assert_eq!(next.prior_trivial_threshold, Some(6_000.0));
        assert!(next.overall_materiality.is_none());
        assert!(next.reviewer_member_id.is_none());
        assert!(next.completer_member_id.is_none());
    }
}
