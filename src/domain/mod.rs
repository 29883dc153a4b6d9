//! Domain models for clients, accounting periods, working papers, and signoffs.

pub mod client;
pub mod common;
pub mod document;
pub mod period;
pub mod signoff;

pub use client::Client;
pub use common::{Displayable, Identifiable, NamedEntity};
pub use document::{
    Attachment, Checklist, ChecklistResponse, ChecklistRow, LineItemRow, LineItemSchedule,
    Materiality, ScheduleDoc, ScheduleLine, Section, SimpleSchedule, DOC_SCHEMA_VERSION,
};
pub use period::{
    ensure_transition, AccountingPeriod, PeriodDatesError, PeriodSetup, PeriodStatus,
    PeriodTransitionError,
};
pub use signoff::{SignoffEvent, SignoffEventType, SignoffKind, SignoffRecord};
