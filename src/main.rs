use std::error::Error;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use structopt::StructOpt;

use log::{error, info, initialize_logger, Logger};
use mocap_catalog::commands::failure::{Context, Failure};
use mocap_catalog::commands::{self, CommandResult};
use mocap_catalog::config::{Config, DbSettings};
use mocap_catalog::db::PgDb;
use mocap_catalog::environment::Environment;
use mocap_catalog::errors::BackendError;
use mocap_catalog::recording::Id;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "mocap-catalog",
    about = "Catalog motion capture files and edit their metadata"
)]
enum Command {
    /// Print every record as JSON
    List,

    /// Print one record
    Show { id: Id },

    /// Count the records
    Count,

    /// Create a record from a JSON object (read from standard input if no file is given)
    Create {
        #[structopt(parse(from_os_str))]
        input: Option<PathBuf>,
    },

    /// Copy a BVH file into the data directory and record it
    Ingest {
        #[structopt(parse(from_os_str))]
        source: PathBuf,

        /// Replace a file of the same name in the data directory, deleting its records
        #[structopt(long)]
        overwrite: bool,
    },

    /// Record BVH files without copying them (every file in the data directory if none are given)
    Register {
        #[structopt(parse(from_os_str))]
        paths: Vec<PathBuf>,
    },

    /// Print the contents of a record's file
    Preview { id: Id },

    /// Delete records
    Delete {
        #[structopt(required = true)]
        ids: Vec<Id>,
    },

    /// Apply a JSON array of edited rows (read from standard input if no file is given)
    Reconcile {
        #[structopt(parse(from_os_str))]
        input: Option<PathBuf>,
    },

    /// Write every record as CSV
    Export {
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let command = Command::from_args();

    if let Command::Version = command {
        return print(&commands::version());
    }

    let logger = Arc::new(initialize_logger());

    let db = match connect(&logger).await {
        Ok(db) => Arc::new(db),
        Err(e) => fail(logger, Failure::new(context(&command), e)),
    };

    let environment = Environment::new(logger.clone(), db.clone(), Config::from_env());
    let prints_response = !matches!(command, Command::Export { output: None });

    let result = run(environment, command).await;

    info!(logger, "Closing database pool...");
    db.close().await;

    match result {
        Ok(response) if prints_response => print(&response),
        Ok(response) => {
            info!(logger, "Exported records"; "response" => format!("{:?}", response));
            Ok(())
        }
        Err(failure) => fail(logger, failure),
    }
}

async fn connect(logger: &Logger) -> Result<PgDb, BackendError> {
    let settings = DbSettings::from_env()?;

    info!(logger, "Creating database pool..."; "max_connections" => settings.max_connections());
    PgDb::connect(&settings).await
}

fn fail(logger: Arc<Logger>, failure: Failure) -> ! {
    error!(logger, "Command failed: {}", failure.error());

    if let Err(e) = print(&failure.flatten()) {
        error!(logger, "Failed to print failure: {}", e);
    }

    // flushes the asynchronous drain
    drop(logger);
    std::process::exit(1);
}

/// The context a failure is reported in before the command itself runs.
fn context(command: &Command) -> Context {
    match command {
        Command::List => Context::list(),
        Command::Show { id } => Context::show(*id),
        Command::Count => Context::count(),
        Command::Create { .. } => Context::create(),
        Command::Ingest { source, .. } => Context::ingest(source.clone()),
        Command::Register { paths } => Context::register(paths.clone()),
        Command::Preview { id } => Context::preview(*id),
        Command::Delete { ids } => Context::delete(ids.clone()),
        Command::Reconcile { .. } => Context::reconcile(),
        Command::Export { output } => Context::export(output.clone()),
        Command::Version => Context::version(),
    }
}

async fn run(environment: Environment, command: Command) -> CommandResult {
    match command {
        Command::List => commands::list(environment).await,
        Command::Show { id } => commands::show(environment, id).await,
        Command::Count => commands::count(environment).await,
        Command::Create { input } => {
            let json = read_input(input).map_err(|e| Failure::new(Context::create(), e))?;
            commands::create(environment, &json).await
        }
        Command::Ingest { source, overwrite } => {
            commands::ingest(environment, source, overwrite).await
        }
        Command::Register { paths } => commands::register(environment, paths).await,
        Command::Preview { id } => commands::preview(environment, id).await,
        Command::Delete { ids } => commands::delete(environment, ids).await,
        Command::Reconcile { input } => {
            let json = read_input(input).map_err(|e| Failure::new(Context::reconcile(), e))?;
            commands::reconcile(environment, &json).await
        }
        Command::Export { output } => commands::export(environment, output).await,
        Command::Version => Ok(commands::version()),
    }
}

fn read_input(path: Option<PathBuf>) -> Result<String, BackendError> {
    match path {
        Some(path) => std::fs::read_to_string(&path).map_err(|e| BackendError::Io { path, source: e }),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .map_err(|e| BackendError::Io {
                    path: PathBuf::from("<stdin>"),
                    source: e,
                })?;
            Ok(input)
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn startup_failures_name_the_command() {
        let failure = Failure::new(
            context(&Command::Delete { ids: vec![7, 8] }),
            BackendError::MissingVariable("POSTGRES_USER".to_owned()),
        );

        assert_eq!(
            serde_json::to_value(failure.flatten()).expect("serialize failure"),
            json!({
                "command": "delete",
                "ids": [7, 8],
                "message": "must define POSTGRES_USER environment variable",
            })
        );
    }

    #[test]
    fn startup_failures_keep_command_arguments() {
        let failure = Failure::new(
            context(&Command::Export { output: None }),
            BackendError::StoreUnavailable {
                reason: "connection refused".to_owned(),
            },
        );

        let flattened = serde_json::to_value(failure.flatten()).expect("serialize failure");

        assert_eq!(flattened["command"], "export");
        assert_eq!(flattened["output"], serde_json::Value::Null);
        assert_eq!(flattened["message"], "store unavailable: connection refused");
    }
}
