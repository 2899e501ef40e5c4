use std::path::PathBuf;

use serde::Serialize;

use crate::errors::BackendError;
use crate::recording::Id;

/// A command that failed, along with what it was asked to do.
#[derive(Debug)]
pub struct Failure {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Failure {
    pub fn new(context: Context, error: BackendError) -> Self {
        Failure { context, error }
    }

    pub fn error(&self) -> &BackendError {
        &self.error
    }

    pub fn flatten(&self) -> FlattenedFailure {
        FlattenedFailure {
            context: self.context.clone(),
            message: format!("{}", self.error),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FlattenedFailure {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Context {
    Count,
    Create,
    Delete { ids: Vec<Id> },
    Export { output: Option<PathBuf> },
    Ingest { source: PathBuf },
    List,
    Preview { id: Id },
    Reconcile,
    Register { paths: Vec<PathBuf> },
    Show { id: Id },
    Version,
}

impl Context {
    pub fn count() -> Context {
        Context::Count
    }

    pub fn create() -> Context {
        Context::Create
    }

    pub fn delete(ids: Vec<Id>) -> Context {
        Context::Delete { ids }
    }

    pub fn export(output: Option<PathBuf>) -> Context {
        Context::Export { output }
    }

    pub fn ingest(source: PathBuf) -> Context {
        Context::Ingest { source }
    }

    pub fn list() -> Context {
        Context::List
    }

    pub fn preview(id: Id) -> Context {
        Context::Preview { id }
    }

    pub fn reconcile() -> Context {
        Context::Reconcile
    }

    pub fn register(paths: Vec<PathBuf>) -> Context {
        Context::Register { paths }
    }

    pub fn show(id: Id) -> Context {
        Context::Show { id }
    }

    pub fn version() -> Context {
        Context::Version
    }
}
