//! Service layer: every mutating operation runs inside a single store
//! transaction and either fully applies or fully rolls back.

pub mod client_service;
pub mod document_service;
pub mod period_service;
pub mod rollforward_service;
pub mod signoff_service;

pub use client_service::ClientService;
pub use document_service::{DocumentService, DocumentView, LineItemUpdate};
pub use period_service::{PeriodService, Promotion};
pub use rollforward_service::{RollForwardOptions, RollForwardReport, RollForwardService};
pub use signoff_service::{SignoffService, ToggleSignoff};

use uuid::Uuid;

use crate::domain::PeriodTransitionError;
use crate::errors::StorageError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Client not found: {0}")]
    ClientNotFound(Uuid),
    #[error("Period not found: {0}")]
    PeriodNotFound(Uuid),
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    #[error("another period is already open for client {client_id}")]
    ConflictingOpenPeriod { client_id: Uuid },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Transition(#[from] PeriodTransitionError),
}
