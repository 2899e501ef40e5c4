use serde::Serialize;

use crate::recording::{AnimationRecord, Id};
use crate::sync::ReconcileSummary;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse {
    Count(i64),
    Deleted {
        deleted: u64,
    },
    Exported {
        exported: usize,
    },
    Preview {
        id: Id,
        content: String,
    },
    Reconciled(ReconcileSummary),
    Record(AnimationRecord),
    Records(Vec<AnimationRecord>),
    Version {
        revision: Option<&'static str>,
        timestamp: Option<&'static str>,
        version: &'static str,
    },
}
