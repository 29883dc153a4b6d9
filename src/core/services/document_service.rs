//! Document reads (with computed fields attached) and user-input mutations.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::core::services::{ServiceError, ServiceResult};
use crate::core::templates::TemplateRegistry;
use crate::domain::{ChecklistResponse, ScheduleDoc, DOC_SCHEMA_VERSION};
use crate::storage::{DocumentRow, StorageBackend};

#[derive(Debug, Clone)]
/// A stored document plus the computed value of every `Total`/`Calc` line.
/// Computed values are derived on read and never persisted.
pub struct DocumentView {
    pub row: DocumentRow,
    pub computed: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default)]
/// Replacement values for the editable fields of a line-item row.
pub struct LineItemUpdate {
    pub description: Option<String>,
    pub current: Option<f64>,
    pub prior: Option<f64>,
}

/// Read and mutation helpers for working-paper documents.
pub struct DocumentService;

impl DocumentService {
    /// Fetches one document, attaching computed schedule values.
    pub fn get(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
    ) -> ServiceResult<Option<DocumentView>> {
        let Some(row) = store.document(period_id, code)? else {
            return Ok(None);
        };
        if row.client_id != client_id {
            return Ok(None);
        }
        let computed = match &row.content {
            ScheduleDoc::SimpleSchedule(schedule) => schedule.computed_values(),
            _ => BTreeMap::new(),
        };
        Ok(Some(DocumentView { row, computed }))
    }

    /// Creates the blank instance from the template registry the first time a
    /// period needs the document; returns the existing row untouched otherwise.
    pub fn ensure(
        store: &dyn StorageBackend,
        registry: &TemplateRegistry,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
    ) -> ServiceResult<DocumentRow> {
        let mut tx = store.begin()?;
        tx.period(period_id)?
            .filter(|period| period.client_id == client_id)
            .ok_or(ServiceError::PeriodNotFound(period_id))?;
        if let Some(existing) = tx.document(period_id, code)? {
            return Ok(existing);
        }
        let template = registry
            .get(code)
            .ok_or_else(|| ServiceError::Validation(format!("unknown template code `{code}`")))?;
        let row = DocumentRow {
            client_id,
            period_id,
            code: code.to_string(),
            schema_version: DOC_SCHEMA_VERSION,
            content: template.blank(),
            complete: false,
            updated_at: Utc::now(),
        };
        tx.insert_document(row.clone())?;
        tx.commit()?;
        Ok(row)
    }

    /// Sets the amount of an `Input` line on a simple schedule.
    pub fn record_amount(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
        line_id: &str,
        amount: Option<f64>,
    ) -> ServiceResult<DocumentRow> {
        Self::mutate(store, client_id, period_id, code, |content| match content {
            ScheduleDoc::SimpleSchedule(schedule) => {
                if schedule.set_amount(line_id, amount) {
                    Ok(())
                } else {
                    Err(ServiceError::Validation(format!(
                        "no input line `{line_id}` in document `{code}`"
                    )))
                }
            }
            other => Err(ServiceError::Validation(format!(
                "document `{code}` is a {}, not a simple schedule",
                other.kind()
            ))),
        })
    }

    /// Replaces a section's free-text notes on a simple schedule.
    pub fn set_section_notes(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
        section_index: usize,
        notes: Option<String>,
    ) -> ServiceResult<DocumentRow> {
        Self::mutate(store, client_id, period_id, code, |content| match content {
            ScheduleDoc::SimpleSchedule(schedule) => {
                match schedule.sections.get_mut(section_index) {
                    Some(section) => {
                        section.notes = notes;
                        Ok(())
                    }
                    None => Err(ServiceError::Validation(format!(
                        "document `{code}` has no section {section_index}"
                    ))),
                }
            }
            other => Err(ServiceError::Validation(format!(
                "document `{code}` is a {}, not a simple schedule",
                other.kind()
            ))),
        })
    }

    /// Records a checklist response.
    pub fn set_checklist_response(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
        row_id: &str,
        response: Option<ChecklistResponse>,
    ) -> ServiceResult<DocumentRow> {
        Self::mutate(store, client_id, period_id, code, |content| match content {
            ScheduleDoc::Checklist(checklist) => {
                if checklist.set_response(row_id, response) {
                    Ok(())
                } else {
                    Err(ServiceError::Validation(format!(
                        "no checklist row `{row_id}` in document `{code}`"
                    )))
                }
            }
            other => Err(ServiceError::Validation(format!(
                "document `{code}` is a {}, not a checklist",
                other.kind()
            ))),
        })
    }

    /// Updates the editable fields of a line-item row.
    pub fn update_line_item_row(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
        row_id: &str,
        update: LineItemUpdate,
    ) -> ServiceResult<DocumentRow> {
        Self::mutate(store, client_id, period_id, code, |content| match content {
            ScheduleDoc::LineItemSchedule(schedule) => match schedule.row_mut(row_id) {
                Some(row) => {
                    row.description = update.description;
                    row.current = update.current;
                    row.prior = update.prior;
                    Ok(())
                }
                None => Err(ServiceError::Validation(format!(
                    "no row `{row_id}` in document `{code}`"
                ))),
            },
            other => Err(ServiceError::Validation(format!(
                "document `{code}` is a {}, not a line-item schedule",
                other.kind()
            ))),
        })
    }

    /// Flags a document as complete or not.
    pub fn set_complete(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
        complete: bool,
    ) -> ServiceResult<DocumentRow> {
        let mut tx = store.begin()?;
        let mut row = tx
            .document(period_id, code)?
            .filter(|row| row.client_id == client_id)
            .ok_or_else(|| ServiceError::DocumentNotFound(code.to_string()))?;
        row.complete = complete;
        row.updated_at = Utc::now();
        tx.replace_document(row.clone())?;
        tx.commit()?;
        Ok(row)
    }

    fn mutate<F>(
        store: &dyn StorageBackend,
        client_id: Uuid,
        period_id: Uuid,
        code: &str,
        edit: F,
    ) -> ServiceResult<DocumentRow>
    where
        F: FnOnce(&mut ScheduleDoc) -> ServiceResult<()>,
    {
        let mut tx = store.begin()?;
        let mut row = tx
            .document(period_id, code)?
            .filter(|row| row.client_id == client_id)
            .ok_or_else(|| ServiceError::DocumentNotFound(code.to_string()))?;
        edit(&mut row.content)?;
        row.updated_at = Utc::now();
        tx.replace_document(row.clone())?;
        tx.commit()?;
        Ok(row)
    }
}
