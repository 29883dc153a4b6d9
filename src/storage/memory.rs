//! In-memory transactional backend.
//!
//! Mirrors the relational contract the services are written against: per-row
//! locks with a bounded wait, staged writes that stay invisible until commit,
//! and commit-time enforcement of the one-open-period-per-client constraint.

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::domain::{AccountingPeriod, Client, PeriodStatus, SignoffRecord};
use crate::errors::StorageError;
use crate::storage::snapshot::StoreSnapshot;
use crate::storage::{
    DocumentRow, PeriodSetupRow, StorageBackend, StoreTransaction, OPEN_PERIOD_CONSTRAINT,
};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    clients: HashMap<Uuid, Client>,
    periods: HashMap<Uuid, AccountingPeriod>,
    setups: HashMap<Uuid, PeriodSetupRow>,
    documents: HashMap<(Uuid, String), DocumentRow>,
    signoffs: HashMap<(Uuid, String), SignoffRecord>,
}

struct LockTable {
    held: Mutex<HashSet<Uuid>>,
    released: Condvar,
}

impl LockTable {
    fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    fn acquire(&self, row_id: Uuid, timeout: Duration) -> Result<(), StorageError> {
        let deadline = Instant::now() + timeout;
        let mut held = lock(&self.held);
        while held.contains(&row_id) {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(StorageError::LockTimeout { period_id: row_id })?;
            let (guard, wait) = self
                .released
                .wait_timeout(held, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            held = guard;
            if wait.timed_out() && held.contains(&row_id) {
                return Err(StorageError::LockTimeout { period_id: row_id });
            }
        }
        held.insert(row_id);
        Ok(())
    }

    fn release_all(&self, row_ids: &HashSet<Uuid>) {
        let mut held = lock(&self.held);
        for row_id in row_ids {
            held.remove(row_id);
        }
        drop(held);
        self.released.notify_all();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transactional in-memory store.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    locks: LockTable,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Overrides how long a transaction waits for a contended row lock.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            locks: LockTable::new(),
            lock_timeout,
        }
    }

    /// Rebuilds a store from a previously saved snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        {
            let mut tables = lock(&store.tables);
            for client in snapshot.clients {
                tables.clients.insert(client.id, client);
            }
            for period in snapshot.periods {
                tables.periods.insert(period.id, period);
            }
            for setup in snapshot.setups {
                tables.setups.insert(setup.period_id, setup);
            }
            for document in snapshot.documents {
                tables
                    .documents
                    .insert((document.period_id, document.code.clone()), document);
            }
            for signoff in snapshot.signoffs {
                tables
                    .signoffs
                    .insert((signoff.period_id, signoff.code.clone()), signoff);
            }
        }
        store
    }

    /// Captures committed state into a serializable snapshot with stable ordering.
    pub fn snapshot(&self) -> StoreSnapshot {
        let tables = lock(&self.tables);
        let mut snapshot = StoreSnapshot {
            clients: tables.clients.values().cloned().collect(),
            periods: tables.periods.values().cloned().collect(),
            setups: tables.setups.values().cloned().collect(),
            documents: tables.documents.values().cloned().collect(),
            signoffs: tables.signoffs.values().cloned().collect(),
            ..StoreSnapshot::default()
        };
        snapshot.clients.sort_by_key(|client| client.id);
        snapshot.periods.sort_by_key(|period| period.id);
        snapshot.setups.sort_by_key(|setup| setup.period_id);
        snapshot
            .documents
            .sort_by(|a, b| (a.period_id, &a.code).cmp(&(b.period_id, &b.code)));
        snapshot
            .signoffs
            .sort_by(|a, b| (a.period_id, &a.code).cmp(&(b.period_id, &b.code)));
        snapshot
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStore {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StorageError> {
        Ok(Box::new(MemoryTransaction::new(self)))
    }

    fn client(&self, client_id: Uuid) -> Result<Option<Client>, StorageError> {
        Ok(lock(&self.tables).clients.get(&client_id).cloned())
    }

    fn period(&self, period_id: Uuid) -> Result<Option<AccountingPeriod>, StorageError> {
        Ok(lock(&self.tables).periods.get(&period_id).cloned())
    }

    fn periods_for_client(&self, client_id: Uuid) -> Result<Vec<AccountingPeriod>, StorageError> {
        let tables = lock(&self.tables);
        let mut rows: Vec<_> = tables
            .periods
            .values()
            .filter(|period| period.client_id == client_id)
            .cloned()
            .collect();
        rows.sort_by_key(|period| (period.start_date, period.id));
        Ok(rows)
    }

    fn period_setup(&self, period_id: Uuid) -> Result<Option<PeriodSetupRow>, StorageError> {
        Ok(lock(&self.tables).setups.get(&period_id).cloned())
    }

    fn document(&self, period_id: Uuid, code: &str) -> Result<Option<DocumentRow>, StorageError> {
        Ok(lock(&self.tables)
            .documents
            .get(&(period_id, code.to_string()))
            .cloned())
    }

    fn documents_for_period(&self, period_id: Uuid) -> Result<Vec<DocumentRow>, StorageError> {
        let tables = lock(&self.tables);
        let mut rows: Vec<_> = tables
            .documents
            .values()
            .filter(|row| row.period_id == period_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(rows)
    }

    fn signoff(
        &self,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
    ) -> Result<Option<SignoffRecord>, StorageError> {
        Ok(lock(&self.tables)
            .signoffs
            .get(&(period_id, code.to_string()))
            .filter(|record| record.client_id == client_id)
            .cloned())
    }
}

enum DocWrite {
    Insert(DocumentRow),
    Replace(DocumentRow),
}

impl DocWrite {
    fn row(&self) -> &DocumentRow {
        match self {
            DocWrite::Insert(row) | DocWrite::Replace(row) => row,
        }
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    staged_clients: HashMap<Uuid, Client>,
    staged_periods: HashMap<Uuid, AccountingPeriod>,
    staged_setups: HashMap<Uuid, PeriodSetupRow>,
    staged_documents: HashMap<(Uuid, String), DocWrite>,
    staged_signoffs: HashMap<(Uuid, String), SignoffRecord>,
    touched_clients: HashSet<Uuid>,
    held_locks: HashSet<Uuid>,
}

impl<'a> MemoryTransaction<'a> {
    fn new(store: &'a MemoryStore) -> Self {
        Self {
            store,
            staged_clients: HashMap::new(),
            staged_periods: HashMap::new(),
            staged_setups: HashMap::new(),
            staged_documents: HashMap::new(),
            staged_signoffs: HashMap::new(),
            touched_clients: HashSet::new(),
            held_locks: HashSet::new(),
        }
    }

    fn acquire_row_lock(&mut self, period_id: Uuid) -> Result<(), StorageError> {
        if self.held_locks.contains(&period_id) {
            return Ok(());
        }
        self.store
            .locks
            .acquire(period_id, self.store.lock_timeout)?;
        self.held_locks.insert(period_id);
        Ok(())
    }

    fn merged_periods_for_client(&self, client_id: Uuid) -> Vec<AccountingPeriod> {
        let mut by_id: HashMap<Uuid, AccountingPeriod> = lock(&self.store.tables)
            .periods
            .values()
            .filter(|period| period.client_id == client_id)
            .cloned()
            .map(|period| (period.id, period))
            .collect();
        for (id, period) in &self.staged_periods {
            if period.client_id == client_id {
                by_id.insert(*id, period.clone());
            }
        }
        let mut rows: Vec<_> = by_id.into_values().collect();
        rows.sort_by_key(|period| (period.start_date, period.id));
        rows
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn lock_period(&mut self, period_id: Uuid) -> Result<Option<AccountingPeriod>, StorageError> {
        self.acquire_row_lock(period_id)?;
        self.period(period_id)
    }

    fn lock_open_periods(
        &mut self,
        client_id: Uuid,
    ) -> Result<Vec<AccountingPeriod>, StorageError> {
        let open_ids: Vec<Uuid> = {
            let tables = lock(&self.store.tables);
            let mut ids: Vec<Uuid> = tables
                .periods
                .values()
                .filter(|period| {
                    period.client_id == client_id && period.status == PeriodStatus::Open
                })
                .map(|period| period.id)
                .collect();
            ids.sort();
            ids
        };
        for period_id in &open_ids {
            self.acquire_row_lock(*period_id)?;
        }
        // a holder may have transitioned rows while we waited: keep only the
        // ones still open as now visible
        let mut rows = Vec::new();
        for period_id in open_ids {
            if let Some(row) = self.period(period_id)? {
                if row.status == PeriodStatus::Open {
                    rows.push(row);
                }
            }
        }
        Ok(rows)
    }

    fn client(&self, client_id: Uuid) -> Result<Option<Client>, StorageError> {
        if let Some(client) = self.staged_clients.get(&client_id) {
            return Ok(Some(client.clone()));
        }
        self.store.client(client_id)
    }

    fn period(&self, period_id: Uuid) -> Result<Option<AccountingPeriod>, StorageError> {
        if let Some(period) = self.staged_periods.get(&period_id) {
            return Ok(Some(period.clone()));
        }
        self.store.period(period_id)
    }

    fn periods_for_client(&self, client_id: Uuid) -> Result<Vec<AccountingPeriod>, StorageError> {
        Ok(self.merged_periods_for_client(client_id))
    }

    fn count_open_periods(&self, client_id: Uuid) -> Result<usize, StorageError> {
        Ok(self
            .merged_periods_for_client(client_id)
            .iter()
            .filter(|period| period.status == PeriodStatus::Open)
            .count())
    }

    fn period_setup(&self, period_id: Uuid) -> Result<Option<PeriodSetupRow>, StorageError> {
        if let Some(row) = self.staged_setups.get(&period_id) {
            return Ok(Some(row.clone()));
        }
        self.store.period_setup(period_id)
    }

    fn document(&self, period_id: Uuid, code: &str) -> Result<Option<DocumentRow>, StorageError> {
        if let Some(write) = self.staged_documents.get(&(period_id, code.to_string())) {
            return Ok(Some(write.row().clone()));
        }
        self.store.document(period_id, code)
    }

    fn documents_for_period(&self, period_id: Uuid) -> Result<Vec<DocumentRow>, StorageError> {
        let mut by_code: HashMap<String, DocumentRow> = self
            .store
            .documents_for_period(period_id)?
            .into_iter()
            .map(|row| (row.code.clone(), row))
            .collect();
        for ((staged_period, code), write) in &self.staged_documents {
            if *staged_period == period_id {
                by_code.insert(code.clone(), write.row().clone());
            }
        }
        let mut rows: Vec<_> = by_code.into_values().collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(rows)
    }

    fn signoff(
        &self,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
    ) -> Result<Option<SignoffRecord>, StorageError> {
        if let Some(record) = self.staged_signoffs.get(&(period_id, code.to_string())) {
            return Ok(Some(record.clone()).filter(|record| record.client_id == client_id));
        }
        self.store.signoff(client_id, period_id, code)
    }

    fn insert_client(&mut self, client: Client) -> Result<(), StorageError> {
        if self.client(client.id)?.is_some() {
            return Err(StorageError::Persistence(format!(
                "client {} already exists",
                client.id
            )));
        }
        self.staged_clients.insert(client.id, client);
        Ok(())
    }

    fn insert_period(&mut self, period: AccountingPeriod) -> Result<(), StorageError> {
        if self.period(period.id)?.is_some() {
            return Err(StorageError::Persistence(format!(
                "period {} already exists",
                period.id
            )));
        }
        self.touched_clients.insert(period.client_id);
        self.staged_periods.insert(period.id, period);
        Ok(())
    }

    fn set_period_state(
        &mut self,
        period_id: Uuid,
        status: PeriodStatus,
        is_current: bool,
    ) -> Result<(), StorageError> {
        let mut row = self.period(period_id)?.ok_or_else(|| {
            StorageError::Persistence(format!("period {period_id} is not in the store"))
        })?;
        row.status = status;
        row.is_current = is_current;
        row.updated_at = chrono::Utc::now();
        self.touched_clients.insert(row.client_id);
        self.staged_periods.insert(period_id, row);
        Ok(())
    }

    fn clear_current_flags(&mut self, client_id: Uuid) -> Result<(), StorageError> {
        for mut row in self.merged_periods_for_client(client_id) {
            if row.is_current {
                row.is_current = false;
                row.updated_at = chrono::Utc::now();
                self.staged_periods.insert(row.id, row);
            }
        }
        self.touched_clients.insert(client_id);
        Ok(())
    }

    fn insert_document(&mut self, row: DocumentRow) -> Result<(), StorageError> {
        let key = (row.period_id, row.code.clone());
        if self.document(row.period_id, &row.code)?.is_some() {
            return Err(StorageError::UniqueViolation {
                constraint: "uq_document_period_code".into(),
            });
        }
        self.staged_documents.insert(key, DocWrite::Insert(row));
        Ok(())
    }

    fn replace_document(&mut self, row: DocumentRow) -> Result<(), StorageError> {
        let key = (row.period_id, row.code.clone());
        self.staged_documents.insert(key, DocWrite::Replace(row));
        Ok(())
    }

    fn upsert_period_setup(&mut self, row: PeriodSetupRow) -> Result<(), StorageError> {
        self.staged_setups.insert(row.period_id, row);
        Ok(())
    }

    fn upsert_signoff(&mut self, record: SignoffRecord) -> Result<(), StorageError> {
        self.staged_signoffs
            .insert((record.period_id, record.code.clone()), record);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut tables = lock(&self.store.tables);

        // Final constraint check against the state actually being committed
        // over. Row locks serialize the common path; this is what catches a
        // writer that slipped past them.
        for client_id in &self.touched_clients {
            let mut open_ids: HashSet<Uuid> = tables
                .periods
                .values()
                .filter(|period| {
                    period.client_id == *client_id && period.status == PeriodStatus::Open
                })
                .map(|period| period.id)
                .collect();
            for (id, period) in &self.staged_periods {
                if period.client_id == *client_id {
                    if period.status == PeriodStatus::Open {
                        open_ids.insert(*id);
                    } else {
                        open_ids.remove(id);
                    }
                }
            }
            if open_ids.len() > 1 {
                return Err(StorageError::UniqueViolation {
                    constraint: OPEN_PERIOD_CONSTRAINT.into(),
                });
            }
        }

        for (id, client) in &self.staged_clients {
            tables.clients.insert(*id, client.clone());
        }
        for (id, period) in &self.staged_periods {
            tables.periods.insert(*id, period.clone());
        }
        for (id, setup) in &self.staged_setups {
            tables.setups.insert(*id, setup.clone());
        }
        for (key, record) in &self.staged_signoffs {
            tables.signoffs.insert(key.clone(), record.clone());
        }
        for (key, write) in &self.staged_documents {
            match write {
                DocWrite::Insert(row) => {
                    // first insert wins: a row committed since we staged stays
                    if !tables.documents.contains_key(key) {
                        tables.documents.insert(key.clone(), row.clone());
                    }
                }
                DocWrite::Replace(row) => {
                    tables.documents.insert(key.clone(), row.clone());
                }
            }
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.held_locks.is_empty() {
            self.store.locks.release_all(&self.held_locks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn planned_period(client_id: Uuid, name: &str) -> AccountingPeriod {
        AccountingPeriod::new(
            client_id,
            name,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn staged_writes_stay_invisible_until_commit() {
        let store = MemoryStore::new();
        let client = Client::new(Uuid::new_v4(), "Acme");
        let client_id = client.id;

        let mut tx = store.begin().unwrap();
        tx.insert_client(client).unwrap();
        assert!(store.client(client_id).unwrap().is_none());
        tx.commit().unwrap();
        assert!(store.client(client_id).unwrap().is_some());
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let client_id = Uuid::new_v4();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_period(planned_period(client_id, "FY25")).unwrap();
        }
        assert!(store.periods_for_client(client_id).unwrap().is_empty());
    }

    #[test]
    fn commit_rejects_second_open_period() {
        let store = MemoryStore::new();
        let client_id = Uuid::new_v4();
        let first = planned_period(client_id, "FY24");
        let second = planned_period(client_id, "FY25");
        let (first_id, second_id) = (first.id, second.id);

        let mut tx = store.begin().unwrap();
        tx.insert_period(first).unwrap();
        tx.insert_period(second).unwrap();
        tx.set_period_state(first_id, PeriodStatus::Open, true)
            .unwrap();
        tx.commit().unwrap();

        // a second writer that never observed the first open row
        let mut tx = store.begin().unwrap();
        tx.set_period_state(second_id, PeriodStatus::Open, true)
            .unwrap();
        let err = tx.commit().expect_err("constraint must reject");
        assert!(err.violates(OPEN_PERIOD_CONSTRAINT), "got {err:?}");
        assert_eq!(
            store.period(second_id).unwrap().unwrap().status,
            PeriodStatus::Planned
        );
    }

    #[test]
    fn contended_row_lock_times_out() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(50));
        let client_id = Uuid::new_v4();
        let period = planned_period(client_id, "FY25");
        let period_id = period.id;
        let mut tx = store.begin().unwrap();
        tx.insert_period(period).unwrap();
        tx.commit().unwrap();

        let mut holder = store.begin().unwrap();
        holder.lock_period(period_id).unwrap();

        let mut waiter = store.begin().unwrap();
        let err = waiter
            .lock_period(period_id)
            .expect_err("lock must time out");
        assert!(matches!(err, StorageError::LockTimeout { period_id: id } if id == period_id));
    }
}
