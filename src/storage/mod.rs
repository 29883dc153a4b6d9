//! Persistence contract for the fieldwork store.
//!
//! The relational store is an external collaborator; this module specifies it
//! at the interface boundary: transactions, row-locking reads, upserts, and a
//! typed unique-constraint violation. [`memory::MemoryStore`] is the shipped
//! backend.

pub mod memory;
pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountingPeriod, Client, PeriodSetup, PeriodStatus, ScheduleDoc, SignoffRecord};
use crate::errors::StorageError;

/// Identity of the "at most one open period per client" unique constraint.
pub const OPEN_PERIOD_CONSTRAINT: &str = "uq_period_client_open";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// One stored working-paper document, keyed by `(period_id, code)`.
pub struct DocumentRow {
    pub client_id: Uuid,
    pub period_id: Uuid,
    pub code: String,
    pub schema_version: u8,
    pub content: ScheduleDoc,
    #[serde(default)]
    pub complete: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Period-setup figures stored alongside a period, keyed by `period_id`.
pub struct PeriodSetupRow {
    pub period_id: Uuid,
    pub client_id: Uuid,
    pub setup: PeriodSetup,
    pub updated_at: DateTime<Utc>,
}

impl PeriodSetupRow {
    /// A blank setup row for a freshly created period.
    pub fn empty(period_id: Uuid, client_id: Uuid) -> Self {
        Self {
            period_id,
            client_id,
            setup: PeriodSetup::default(),
            updated_at: Utc::now(),
        }
    }
}

/// Trait that abstracts the relational store behind the services.
///
/// Lookups outside `begin` read committed state only; all mutation goes
/// through a [`StoreTransaction`].
pub trait StorageBackend: Send + Sync {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StorageError>;

    fn client(&self, client_id: Uuid) -> Result<Option<Client>, StorageError>;
    fn period(&self, period_id: Uuid) -> Result<Option<AccountingPeriod>, StorageError>;
    fn periods_for_client(&self, client_id: Uuid) -> Result<Vec<AccountingPeriod>, StorageError>;
    fn period_setup(&self, period_id: Uuid) -> Result<Option<PeriodSetupRow>, StorageError>;
    fn document(&self, period_id: Uuid, code: &str) -> Result<Option<DocumentRow>, StorageError>;
    fn documents_for_period(&self, period_id: Uuid) -> Result<Vec<DocumentRow>, StorageError>;
    fn signoff(
        &self,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
    ) -> Result<Option<SignoffRecord>, StorageError>;
}

/// A single bounded transaction scope.
///
/// Reads observe the transaction's own staged writes. Dropping an uncommitted
/// transaction rolls everything back and releases any held row locks.
pub trait StoreTransaction {
    /// Locks the period row (`SELECT ... FOR UPDATE` semantics), waiting for a
    /// concurrent holder. Returns the row as currently visible, if any.
    fn lock_period(&mut self, period_id: Uuid) -> Result<Option<AccountingPeriod>, StorageError>;

    /// Locks every row of the client's currently-open periods and returns them.
    fn lock_open_periods(&mut self, client_id: Uuid)
        -> Result<Vec<AccountingPeriod>, StorageError>;

    fn client(&self, client_id: Uuid) -> Result<Option<Client>, StorageError>;
    fn period(&self, period_id: Uuid) -> Result<Option<AccountingPeriod>, StorageError>;
    fn periods_for_client(&self, client_id: Uuid) -> Result<Vec<AccountingPeriod>, StorageError>;
    fn count_open_periods(&self, client_id: Uuid) -> Result<usize, StorageError>;
    fn period_setup(&self, period_id: Uuid) -> Result<Option<PeriodSetupRow>, StorageError>;
    fn document(&self, period_id: Uuid, code: &str) -> Result<Option<DocumentRow>, StorageError>;
    fn documents_for_period(&self, period_id: Uuid) -> Result<Vec<DocumentRow>, StorageError>;
    fn signoff(
        &self,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
    ) -> Result<Option<SignoffRecord>, StorageError>;

    fn insert_client(&mut self, client: Client) -> Result<(), StorageError>;
    fn insert_period(&mut self, period: AccountingPeriod) -> Result<(), StorageError>;
    /// Updates the mutable pair of a period row; the date range never changes.
    fn set_period_state(
        &mut self,
        period_id: Uuid,
        status: PeriodStatus,
        is_current: bool,
    ) -> Result<(), StorageError>;
    /// Clears `is_current` on every period of the client.
    fn clear_current_flags(&mut self, client_id: Uuid) -> Result<(), StorageError>;
    /// Inserts a fresh document row; a concurrently committed row with the
    /// same key wins (first-insert-wins).
    fn insert_document(&mut self, row: DocumentRow) -> Result<(), StorageError>;
    /// Replaces a document row unconditionally.
    fn replace_document(&mut self, row: DocumentRow) -> Result<(), StorageError>;
    fn upsert_period_setup(&mut self, row: PeriodSetupRow) -> Result<(), StorageError>;
    fn upsert_signoff(&mut self, record: SignoffRecord) -> Result<(), StorageError>;

    /// Applies all staged writes atomically. Enforces
    /// [`OPEN_PERIOD_CONSTRAINT`], surfacing a
    /// [`StorageError::UniqueViolation`] and discarding the transaction when
    /// the commit would leave a client with more than one open period.
    fn commit(self: Box<Self>) -> Result<(), StorageError>;
}
