//! A helper program to create or migrate the catalog schema.

use std::error::Error;
use std::path::Path;

use movine::Movine;
use postgres::{Client, NoTls};

use log::{debug, info, initialize_logger};
use mocap_catalog::config::DbSettings;

const MIGRATION_DIR: &str = "./migrations";

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let settings = DbSettings::from_env()?;

    if !Path::new(MIGRATION_DIR).is_dir() {
        return Err(format!("missing migration directory {}", MIGRATION_DIR).into());
    }

    debug!(logger, "Connecting to database...");
    let client = Client::connect(settings.connection_string(), NoTls)?;

    let mut movine = Movine::new(client);
    movine.set_migration_dir(MIGRATION_DIR);

    if movine.status().is_err() {
        debug!(logger, "Initializing movine...");
        movine
            .initialize()
            .map_err(|e| format!("failed to initialize movine: {:?}", e))?;
    }

    debug!(logger, "Running migrations...");
    movine
        .up()
        .map_err(|e| format!("failed to run migrations: {:?}", e))?;

    info!(logger, "Completed initialization.");

    Ok(())
}
