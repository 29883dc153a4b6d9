//! Carries a period's working papers forward into the next period.

use chrono::Utc;
use uuid::Uuid;

use crate::core::services::{ServiceError, ServiceResult};
use crate::domain::DOC_SCHEMA_VERSION;
use crate::storage::{DocumentRow, PeriodSetupRow, StorageBackend};

#[derive(Debug, Clone, Copy)]
/// Options controlling a roll-forward run.
pub struct RollForwardOptions {
    /// Replace documents already present at the target instead of skipping them.
    pub overwrite: bool,
    /// Force every copied document's completion flag back to false.
    pub reset_complete: bool,
}

impl Default for RollForwardOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            reset_complete: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// What a roll-forward run did, so callers can report without re-reading.
pub struct RollForwardReport {
    pub considered: usize,
    pub copied: usize,
    pub overwritten: usize,
}

/// Copies every tracked document from one period into another, applying the
/// per-kind reset transform along the way.
pub struct RollForwardService;

impl RollForwardService {
    pub fn roll_forward(
        store: &dyn StorageBackend,
        client_id: Uuid,
        from_period_id: Uuid,
        to_period_id: Uuid,
        options: RollForwardOptions,
    ) -> ServiceResult<RollForwardReport> {
        if from_period_id == to_period_id {
            return Ok(RollForwardReport::default());
        }
        let mut tx = store.begin()?;
        tx.period(from_period_id)?
            .filter(|period| period.client_id == client_id)
            .ok_or(ServiceError::PeriodNotFound(from_period_id))?;
        tx.period(to_period_id)?
            .filter(|period| period.client_id == client_id)
            .ok_or(ServiceError::PeriodNotFound(to_period_id))?;

        let mut report = RollForwardReport::default();
        let now = Utc::now();
        for source in tx.documents_for_period(from_period_id)? {
            report.considered += 1;
            let existing = tx.document(to_period_id, &source.code)?;
            if existing.is_some() && !options.overwrite {
                continue;
            }
            let complete = if options.reset_complete {
                false
            } else {
                source.complete
            };
            let row = DocumentRow {
                client_id,
                period_id: to_period_id,
                code: source.code.clone(),
                schema_version: DOC_SCHEMA_VERSION,
                content: source.content.rolled_forward(),
                complete,
                updated_at: now,
            };
            if existing.is_some() {
                tx.replace_document(row)?;
                report.overwritten += 1;
            } else {
                tx.insert_document(row)?;
                report.copied += 1;
            }
        }

        // shift setup figures: current becomes the new period's prior
        if let Some(source_setup) = tx.period_setup(from_period_id)? {
            let target_untouched = tx
                .period_setup(to_period_id)?
                .map_or(true, |row| row.setup.is_empty());
            if target_untouched || options.overwrite {
                tx.upsert_period_setup(PeriodSetupRow {
                    period_id: to_period_id,
                    client_id,
                    setup: source_setup.setup.rolled_forward(),
                    updated_at: now,
                })?;
            }
        }

        tx.commit()?;
        tracing::info!(
            %client_id,
            %from_period_id,
            %to_period_id,
            considered = report.considered,
            copied = report.copied,
            overwritten = report.overwritten,
            "rolled period forward"
        );
        Ok(report)
    }
}
