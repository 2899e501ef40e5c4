use std::sync::Arc;

use log::Logger;

use crate::config::Config;
use crate::db::Db;

/// Everything a command needs to run.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db + Send + Sync>,
    pub config: Config,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, db: Arc<dyn Db + Send + Sync>, config: Config) -> Self {
        Self { logger, db, config }
    }
}
