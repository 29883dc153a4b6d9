//! Review/completion signoffs with an append-only audit history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Which of the two signoff slots a toggle targets.
pub enum SignoffKind {
    Reviewed,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignoffEventType {
    ReviewedSet,
    ReviewedCleared,
    CompletedSet,
    CompletedCleared,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// One entry in a signoff record's history. Events are only ever appended.
pub struct SignoffEvent {
    pub event_type: SignoffEventType,
    pub member_id: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Current signoff state for one document in one period, plus the full
/// audit trail of every set/clear that led here.
pub struct SignoffRecord {
    pub client_id: Uuid,
    pub period_id: Uuid,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by_member_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by_member_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<SignoffEvent>,
    pub updated_at: DateTime<Utc>,
}

impl SignoffRecord {
    pub fn new(client_id: Uuid, period_id: Uuid, code: impl Into<String>) -> Self {
        Self {
            client_id,
            period_id,
            code: code.into(),
            reviewed_by_member_id: None,
            reviewed_at: None,
            completed_by_member_id: None,
            completed_at: None,
            history: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// The member currently recorded against the given slot.
    pub fn current_actor(&self, kind: SignoffKind) -> Option<&str> {
        match kind {
            SignoffKind::Reviewed => self.reviewed_by_member_id.as_deref(),
            SignoffKind::Completed => self.completed_by_member_id.as_deref(),
        }
    }

    /// Applies one toggle: updates the current-state pair and appends exactly
    /// one history event. Clearing records the member who is being un-signed,
    /// not the caller.
    pub fn apply(
        &mut self,
        kind: SignoffKind,
        checked: bool,
        member_id: Option<String>,
        at: DateTime<Utc>,
    ) {
        let event_type = match (kind, checked) {
            (SignoffKind::Reviewed, true) => SignoffEventType::ReviewedSet,
            (SignoffKind::Reviewed, false) => SignoffEventType::ReviewedCleared,
            (SignoffKind::Completed, true) => SignoffEventType::CompletedSet,
            (SignoffKind::Completed, false) => SignoffEventType::CompletedCleared,
        };
        let event_member = if checked {
            member_id.clone()
        } else {
            self.current_actor(kind).map(str::to_string)
        };
        self.history.push(SignoffEvent {
            event_type,
            member_id: event_member,
            at,
        });
        let (by, when) = if checked {
            (member_id, Some(at))
        } else {
            (None, None)
        };
        match kind {
            SignoffKind::Reviewed => {
                self.reviewed_by_member_id = by;
                self.reviewed_at = when;
            }
            SignoffKind::Completed => {
                self.completed_by_member_id = by;
                self.completed_at = when;
            }
        }
        self.updated_at = at;
    }
}
