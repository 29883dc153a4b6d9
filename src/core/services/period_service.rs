//! Period lifecycle operations, including the open-period promotion
//! coordinator.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::core::services::{ServiceError, ServiceResult};
use crate::domain::{ensure_transition, AccountingPeriod, PeriodSetup, PeriodStatus};
use crate::errors::StorageError;
use crate::storage::{PeriodSetupRow, StorageBackend, OPEN_PERIOD_CONSTRAINT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Outcome of a promotion attempt.
pub struct Promotion {
    pub promoted: bool,
}

/// Lifecycle operations for accounting periods.
pub struct PeriodService;

impl PeriodService {
    /// Creates a new `Planned` period for the client, seeding a blank setup row.
    pub fn create_period(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ServiceResult<AccountingPeriod> {
        let period = AccountingPeriod::new(client_id, period_name, start_date, end_date)
            .map_err(|err| ServiceError::Validation(err.to_string()))?;
        let mut tx = store.begin()?;
        tx.client(client_id)?
            .ok_or(ServiceError::ClientNotFound(client_id))?;
        tx.insert_period(period.clone())?;
        tx.upsert_period_setup(PeriodSetupRow::empty(period.id, client_id))?;
        tx.commit()?;
        Ok(period)
    }

    /// Makes the target period the client's open, current period.
    ///
    /// Serialized against concurrent attempts through row locks on the target
    /// and on any already-open period; the store's unique constraint and a
    /// post-write re-count independently enforce the same guarantee.
    pub fn promote_to_open(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
    ) -> ServiceResult<Promotion> {
        let mut tx = store.begin()?;
        let target = tx
            .lock_period(period_id)?
            .filter(|period| period.client_id == client_id)
            .ok_or(ServiceError::PeriodNotFound(period_id))?;
        if target.status == PeriodStatus::Open {
            return Ok(Promotion { promoted: false });
        }
        let open = tx.lock_open_periods(client_id)?;
        if open.iter().any(|period| period.id != period_id) {
            return Err(ServiceError::ConflictingOpenPeriod { client_id });
        }
        if let Err(err) = ensure_transition(target.status, PeriodStatus::Open) {
            // the status was read under lock, so this can only be a logic defect
            return Err(ServiceError::InvariantViolation(format!(
                "promotion of period {period_id} hit an illegal transition: {err}"
            )));
        }
        tx.clear_current_flags(client_id)?;
        tx.set_period_state(period_id, PeriodStatus::Open, true)?;
        let open_count = tx.count_open_periods(client_id)?;
        if open_count != 1 {
            return Err(ServiceError::InvariantViolation(format!(
                "client {client_id} would have {open_count} open periods after promotion"
            )));
        }
        match tx.commit() {
            Ok(()) => {
                tracing::info!(%client_id, %period_id, "promoted period to open");
                Ok(Promotion { promoted: true })
            }
            Err(err) if err.violates(OPEN_PERIOD_CONSTRAINT) => {
                tracing::warn!(%client_id, %period_id, "promotion lost the open-period race");
                Err(ServiceError::ConflictingOpenPeriod { client_id })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Moves the period to `Closing`.
    pub fn mark_closing(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
    ) -> ServiceResult<AccountingPeriod> {
        Self::transition(store, client_id, period_id, PeriodStatus::Closing)
    }

    /// Moves the period to `Closed`.
    pub fn mark_closed(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
    ) -> ServiceResult<AccountingPeriod> {
        Self::transition(store, client_id, period_id, PeriodStatus::Closed)
    }

    fn transition(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
        to: PeriodStatus,
    ) -> ServiceResult<AccountingPeriod> {
        let mut tx = store.begin()?;
        let period = tx
            .lock_period(period_id)?
            .filter(|period| period.client_id == client_id)
            .ok_or(ServiceError::PeriodNotFound(period_id))?;
        ensure_transition(period.status, to)?;
        if period.status == to {
            return Ok(period);
        }
        tx.set_period_state(period_id, to, false)?;
        let updated = tx.period(period_id)?.ok_or_else(|| {
            StorageError::Persistence(format!("period {period_id} vanished mid-transaction"))
        })?;
        tx.commit()?;
        tracing::info!(%client_id, %period_id, status = %to, "period transitioned");
        Ok(updated)
    }

    /// Replaces the period's setup figures.
    pub fn record_setup(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
        setup: PeriodSetup,
    ) -> ServiceResult<PeriodSetupRow> {
        let mut tx = store.begin()?;
        tx.period(period_id)?
            .filter(|period| period.client_id == client_id)
            .ok_or(ServiceError::PeriodNotFound(period_id))?;
        let row = PeriodSetupRow {
            period_id,
            client_id,
            setup,
            updated_at: Utc::now(),
        };
        tx.upsert_period_setup(row.clone())?;
        tx.commit()?;
        Ok(row)
    }

    /// The period's setup figures, blank when never recorded.
    pub fn period_setup(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
    ) -> ServiceResult<PeriodSetup> {
        Ok(store
            .period_setup(period_id)?
            .filter(|row| row.client_id == client_id)
            .map(|row| row.setup)
            .unwrap_or_default())
    }

    /// The client's current period, if one is flagged.
    pub fn current_period(
        store: &dyn StorageBackend,
        client_id: Uuid,
    ) -> ServiceResult<Option<AccountingPeriod>> {
        Ok(store
            .periods_for_client(client_id)?
            .into_iter()
            .find(|period| period.is_current))
    }

    /// All periods for the client, ordered by start date.
    pub fn list_periods(
        store: &dyn StorageBackend,
        client_id: Uuid,
    ) -> ServiceResult<Vec<AccountingPeriod>> {
        Ok(store.periods_for_client(client_id)?)
    }
}
