//! Review/completion signoff toggles backed by the append-only ledger.

use chrono::Utc;
use uuid::Uuid;

use crate::core::services::{ServiceError, ServiceResult};
use crate::domain::{SignoffKind, SignoffRecord};
use crate::storage::StorageBackend;

#[derive(Debug, Clone)]
/// One signoff toggle request.
pub struct ToggleSignoff {
    pub client_id: Uuid,
    pub period_id: Uuid,
    pub code: String,
    pub kind: SignoffKind,
    pub checked: bool,
    pub member_id: Option<String>,
}

/// Maintains per-document signoff state and its audit trail.
pub struct SignoffService;

impl SignoffService {
    /// Applies one toggle. Setting a signoff requires the acting member's id;
    /// clearing records the member being un-signed in the history event.
    pub fn toggle(store: &dyn StorageBackend, input: ToggleSignoff) -> ServiceResult<SignoffRecord> {
        if input.checked
            && input
                .member_id
                .as_deref()
                .map_or(true, |member| member.trim().is_empty())
        {
            return Err(ServiceError::Validation(
                "a member id is required to set a signoff".into(),
            ));
        }
        let mut tx = store.begin()?;
        tx.period(input.period_id)?
            .filter(|period| period.client_id == input.client_id)
            .ok_or(ServiceError::PeriodNotFound(input.period_id))?;
        let mut record = tx
            .signoff(input.client_id, input.period_id, &input.code)?
            .unwrap_or_else(|| {
                SignoffRecord::new(input.client_id, input.period_id, input.code.clone())
            });
        record.apply(input.kind, input.checked, input.member_id, Utc::now());
        tx.upsert_signoff(record.clone())?;
        tx.commit()?;
        Ok(record)
    }
}
