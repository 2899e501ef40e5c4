//! The operations an operator (or a presentation layer) can ask for. Each
//! returns a serializable response, or a failure that remembers which
//! command it came from.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, o};
use serde_json::{Map, Value};

use crate::environment::Environment;
use crate::errors::BackendError;
use crate::recording::Id;
use crate::validation::validate_submission;
use crate::{export, ingest, sync};

pub mod failure;
pub mod response;

use self::failure::{Context, Failure};
use self::response::SuccessResponse;

pub type CommandResult = Result<SuccessResponse, Failure>;

macro_rules! timed {
    ($environment:expr, $name:expr, $body:expr) => {{
        let start = Instant::now();

        let result: CommandResult = $body.await;

        debug!(
            $environment.logger,
            "Ran command";
            "command" => $name,
            "succeeded" => result.is_ok(),
            "duration_ms" => format_duration(start.elapsed())
        );

        result
    }};
}

pub async fn list(environment: Environment) -> CommandResult {
    timed!(environment, "list", async {
        let records = environment
            .db
            .retrieve_all()
            .await
            .map_err(|e: BackendError| Failure::new(Context::list(), e))?;

        Ok(SuccessResponse::Records(records))
    })
}

pub async fn show(environment: Environment, id: Id) -> CommandResult {
    timed!(environment, "show", async {
        let error_handler = |e: BackendError| Failure::new(Context::show(id), e);

        let record = environment
            .db
            .retrieve(id)
            .await
            .map_err(error_handler)?
            .ok_or_else(|| error_handler(BackendError::NonExistentId(id)))?;

        Ok(SuccessResponse::Record(record))
    })
}

pub async fn count(environment: Environment) -> CommandResult {
    timed!(environment, "count", async {
        let count = environment
            .db
            .count_all()
            .await
            .map_err(|e: BackendError| Failure::new(Context::count(), e))?;

        Ok(SuccessResponse::Count(count))
    })
}

/// Validates and stores a record described as a JSON object.
pub async fn create(environment: Environment, json: &str) -> CommandResult {
    timed!(environment, "create", async {
        let error_handler = |e: BackendError| Failure::new(Context::create(), e);

        debug!(environment.logger, "Parsing submission...");
        let fields: Map<String, Value> = serde_json::from_str(json)
            .map_err(|e| error_handler(BackendError::MalformedRecord(e)))?;

        debug!(environment.logger, "Validating submission...");
        let metadata = validate_submission(&fields).map_err(|e| error_handler(e.into()))?;

        let record = environment.db.insert(metadata).await.map_err(error_handler)?;

        Ok(SuccessResponse::Record(record))
    })
}

pub async fn ingest(environment: Environment, source: PathBuf, overwrite: bool) -> CommandResult {
    timed!(environment, "ingest", async {
        let record = ingest::ingest(&environment, &source, overwrite)
            .await
            .map_err(|e| Failure::new(Context::ingest(source.clone()), e))?;

        Ok(SuccessResponse::Record(record))
    })
}

/// Records files that are already in place. With no paths, every BVH file
/// in the data directory is registered.
pub async fn register(environment: Environment, paths: Vec<PathBuf>) -> CommandResult {
    timed!(environment, "register", async {
        let error_handler = |e: BackendError| Failure::new(Context::register(paths.clone()), e);

        let paths = if paths.is_empty() {
            ingest::motion_files(&environment.config.data_dir)
                .await
                .map_err(error_handler)?
        } else {
            paths.clone()
        };

        let mut records = vec![];

        for path in paths {
            let record = ingest::register(&environment, &path)
                .await
                .map_err(error_handler)?;
            records.push(record);
        }

        Ok(SuccessResponse::Records(records))
    })
}

pub async fn preview(environment: Environment, id: Id) -> CommandResult {
    timed!(environment, "preview", async {
        let content = ingest::read_source(&environment, id)
            .await
            .map_err(|e| Failure::new(Context::preview(id), e))?;

        Ok(SuccessResponse::Preview { id, content })
    })
}

pub async fn delete(environment: Environment, ids: Vec<Id>) -> CommandResult {
    timed!(environment, "delete", async {
        let logger = environment.logger.new(o!("ids" => format!("{:?}", ids)));
        let unique = ids.iter().copied().collect::<BTreeSet<_>>();

        debug!(logger, "Deleting records...");
        let deleted = environment
            .db
            .delete_many(&unique)
            .await
            .map_err(|e| Failure::new(Context::delete(ids.clone()), e))?;

        debug!(logger, "Deleted records"; "deleted" => deleted);

        Ok(SuccessResponse::Deleted { deleted })
    })
}

/// Applies a JSON array of edited rows.
pub async fn reconcile(environment: Environment, json: &str) -> CommandResult {
    timed!(environment, "reconcile", async {
        let error_handler = |e: BackendError| Failure::new(Context::reconcile(), e);

        let rows = sync::parse_rows(json).map_err(error_handler)?;

        let summary = sync::reconcile(environment.logger.clone(), environment.db.clone(), rows)
            .await
            .map_err(error_handler)?;

        Ok(SuccessResponse::Reconciled(summary))
    })
}

/// Writes the catalog as CSV to `output`, or to standard output.
pub async fn export(environment: Environment, output: Option<PathBuf>) -> CommandResult {
    timed!(environment, "export", async {
        let exported = export::export_csv(&environment, output.as_deref())
            .await
            .map_err(|e| Failure::new(Context::export(output.clone()), e))?;

        Ok(SuccessResponse::Exported { exported })
    })
}

pub fn version() -> SuccessResponse {
    SuccessResponse::Version {
        revision: info::REVISION,
        timestamp: info::BUILD_TIMESTAMP,
        version: info::VERSION,
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::db::memory::MemoryDb;

    fn environment() -> Environment {
        Environment::new(
            Arc::new(log::discard()),
            Arc::new(MemoryDb::new()),
            Config::new("data"),
        )
    }

    const WALK: &str = r#"{"original_filename": "walk01", "duration_seconds": 12.5, "frame_count": 300,
        "frame_time": 0.0333, "fps": 30.0, "bone_count": 42}"#;

    #[tokio::test]
    async fn created_records_can_be_shown() {
        let environment = environment();

        let created = match create(environment.clone(), WALK).await.expect("create record") {
            SuccessResponse::Record(record) => record,
            other => panic!("unexpected response {:?}", other),
        };

        match show(environment, created.id()).await.expect("show record") {
            SuccessResponse::Record(record) => assert_eq!(record, created),
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_submissions_explain_themselves() {
        let environment = environment();

        let failure = create(environment.clone(), r#"{"original_filename": "walk01", "duration_seconds": -1}"#)
            .await
            .expect_err("reject invalid submission");

        let flattened = serde_json::to_value(failure.flatten()).expect("serialize failure");
        assert_eq!(flattened["command"], "create");

        let message = flattened["message"].as_str().expect("message is text");
        assert!(message.contains("duration_seconds"));
        assert!(message.contains("frame_count is required"));

        let count = count(environment).await.expect("count records");
        assert_eq!(serde_json::to_value(count).expect("serialize count"), json!(0));
    }

    #[tokio::test]
    async fn badly_typed_values_do_not_hide_other_problems() {
        let failure = create(environment(), r#"{"fps": "fast", "duration_seconds": -1}"#)
            .await
            .expect_err("reject invalid submission");

        assert!(matches!(failure.error(), BackendError::Validation(_)));

        let flattened = serde_json::to_value(failure.flatten()).expect("serialize failure");
        let message = flattened["message"].as_str().expect("message is text");
        assert!(message.contains("original_filename is required"));
        assert!(message.contains("duration_seconds must be positive"));
        assert!(message.contains("fps must be a number"));
    }

    #[tokio::test]
    async fn submissions_that_are_not_objects_are_malformed() {
        let failure = create(environment(), "[1, 2]").await.expect_err("reject array");

        assert!(matches!(failure.error(), BackendError::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn missing_records_name_the_id() {
        let failure = show(environment(), 12).await.expect_err("reject unknown record");

        assert!(matches!(failure.error(), BackendError::NonExistentId(12)));
        assert_eq!(
            serde_json::to_value(failure.flatten()).expect("serialize failure"),
            json!({"command": "show", "id": 12, "message": "no record with ID 12"})
        );
    }

    #[tokio::test]
    async fn deletes_report_what_was_removed() {
        let environment = environment();

        for _ in 0..2 {
            create(environment.clone(), WALK).await.expect("create record");
        }

        let response = delete(environment.clone(), vec![1, 2, 2, 999]).await.expect("delete records");
        assert_eq!(serde_json::to_value(response).expect("serialize response"), json!({"deleted": 2}));

        let response = delete(environment, vec![1, 2]).await.expect("delete records again");
        assert_eq!(serde_json::to_value(response).expect("serialize response"), json!({"deleted": 0}));
    }

    #[tokio::test]
    async fn reconcile_reports_row_errors() {
        let environment = environment();
        create(environment.clone(), WALK).await.expect("create record");

        let response = reconcile(
            environment,
            r#"[{"id": 1, "fps": 60}, {"id": 1, "bone_count": "lots"}, {"id": 5, "fps": 24}]"#,
        )
        .await
        .expect("reconcile rows");

        assert_eq!(
            serde_json::to_value(response).expect("serialize response"),
            json!({
                "updated": 1,
                "errors": [{"row_id": 1, "message": "bone_count must be an integer, got \"lots\""}],
                "skipped": [5],
            })
        );
    }

    #[tokio::test]
    async fn malformed_rows_fail_the_command() {
        let failure = reconcile(environment(), "{").await.expect_err("reject malformed rows");

        assert!(matches!(failure.error(), BackendError::MalformedRows(_)));
    }
}
