//! Reconciliation of rows edited in an external grid with the store.
//!
//! A batch runs inside one transaction. A row whose values can't be
//! converted is skipped and reported without disturbing the others, but a
//! failure of the store itself rolls the whole batch back.

use std::sync::Arc;

use log::{debug, error, info, o, warn, Logger};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::{Db, DbTransaction};
use crate::errors::BackendError;
use crate::recording::Id;

pub mod coercion;

use self::coercion::coerce_row;

/// A row as the grid hands it back: the record's ID plus raw cell values
/// keyed by column name.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EditedRow {
    pub id: Id,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EditedRow {
    pub fn new(id: Id, fields: Map<String, Value>) -> Self {
        EditedRow { id, fields }
    }
}

/// Parses a JSON array of edited rows.
pub fn parse_rows(json: &str) -> Result<Vec<EditedRow>, BackendError> {
    serde_json::from_str(json).map_err(BackendError::MalformedRows)
}

/// A row that was left untouched because one of its values didn't fit.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RowError {
    pub row_id: Id,
    pub message: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReconcileSummary {
    /// How many rows were written, including rows whose values didn't
    /// change.
    pub updated: usize,

    pub errors: Vec<RowError>,

    /// IDs of rows whose records no longer exist.
    pub skipped: Vec<Id>,
}

/// Writes every convertible row to the store in a single transaction.
///
/// Returns `BackendError::ReconcileAborted` if the store fails at any
/// point, in which case nothing from the batch is kept.
pub async fn reconcile(
    logger: Arc<Logger>,
    db: Arc<dyn Db + Send + Sync>,
    rows: Vec<EditedRow>,
) -> Result<ReconcileSummary, BackendError> {
    debug!(logger, "Reconciling rows..."; "count" => rows.len());

    let summary = apply_rows(&logger, db.as_ref(), rows)
        .await
        .map_err(|e| {
            error!(logger, "Rolled back reconciliation: {}", e);

            BackendError::ReconcileAborted {
                source: Box::new(e),
            }
        })?;

    info!(
        logger,
        "Reconciled rows";
        "updated" => summary.updated,
        "errors" => summary.errors.len(),
        "skipped" => summary.skipped.len()
    );

    Ok(summary)
}

async fn apply_rows(
    logger: &Logger,
    db: &(dyn Db + Send + Sync),
    rows: Vec<EditedRow>,
) -> Result<ReconcileSummary, BackendError> {
    let mut summary = ReconcileSummary::default();
    let mut transaction = db.begin().await?;

    for row in rows {
        let logger = logger.new(o!("row_id" => row.id));

        if !apply_row(&logger, transaction.as_mut(), &row, &mut summary).await? {
            continue;
        }

        summary.updated += 1;
    }

    debug!(logger, "Committing...");
    transaction.commit().await?;

    Ok(summary)
}

/// Returns whether the row was written. Only store failures are errors.
async fn apply_row(
    logger: &Logger,
    transaction: &mut dyn DbTransaction,
    row: &EditedRow,
    summary: &mut ReconcileSummary,
) -> Result<bool, BackendError> {
    if transaction.retrieve(row.id).await?.is_none() {
        warn!(logger, "Skipping row for a record that doesn't exist");
        summary.skipped.push(row.id);
        return Ok(false);
    }

    let patch = match coerce_row(&row.fields) {
        Ok(patch) => patch,
        Err(e) => {
            debug!(logger, "Skipping row: {}", e);
            summary.errors.push(RowError {
                row_id: row.id,
                message: e.to_string(),
            });
            return Ok(false);
        }
    };

    transaction.update_fields(row.id, patch).await?;

    Ok(true)
}
