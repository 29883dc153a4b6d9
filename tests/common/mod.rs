use chrono::NaiveDate;
use uuid::Uuid;

use fieldwork_core::core::services::{ClientService, PeriodService};
use fieldwork_core::domain::{AccountingPeriod, Client};
use fieldwork_core::storage::memory::MemoryStore;

pub fn store_with_client() -> (MemoryStore, Client) {
    let store = MemoryStore::new();
    let client = ClientService::register(&store, Uuid::new_v4(), "Hollowbrook Mills Ltd")
        .expect("register client");
    (store, client)
}

pub fn planned_period(
    store: &MemoryStore,
    client_id: Uuid,
    name: &str,
    year: i32,
) -> AccountingPeriod {
    PeriodService::create_period(
        store,
        client_id,
        name,
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
    )
    .expect("create period")
}
