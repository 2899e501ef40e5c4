//! Bringing motion capture files into the catalog.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use log::{debug, info, o, warn};
use tokio::fs;

use crate::environment::Environment;
use crate::errors::BackendError;
use crate::placeholder;
use crate::recording::{AnimationRecord, Id};
use crate::validation::validate_for_create;

pub const EXTENSION: &str = "bvh";

/// Whether the path names a BVH file, judging by its extension.
pub fn is_motion_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map_or(false, |extension| extension.eq_ignore_ascii_case(EXTENSION))
}

/// Copies a BVH file into the data directory and records it with
/// placeholder metadata. An existing file of the same name is only
/// replaced when `overwrite` is set, and then the records of the replaced
/// file are deleted. A file that's already in the data directory is
/// recorded where it is.
pub async fn ingest(
    environment: &Environment,
    source: &Path,
    overwrite: bool,
) -> Result<AnimationRecord, BackendError> {
    let logger = environment
        .logger
        .new(o!("source" => source.display().to_string()));

    let file_name = match source.file_name() {
        Some(file_name) if is_motion_file(source) => file_name,
        _ => return Err(BackendError::UnsupportedFile(source.to_owned())),
    };

    let data_dir = &environment.config.data_dir;
    fs::create_dir_all(data_dir)
        .await
        .map_err(|e| BackendError::io(data_dir, e))?;

    let target = data_dir.join(file_name);
    let existed = fs::metadata(&target).await.is_ok();

    let in_place = existed && same_file(source, &target).await?;

    if in_place {
        debug!(logger, "File is already in the data directory");
    } else if existed && !overwrite {
        return Err(BackendError::FileAlreadyExists(target));
    } else {
        debug!(logger, "Copying file..."; "target" => target.display().to_string());
        fs::copy(source, &target)
            .await
            .map_err(|e| BackendError::io(source, e))?;
    }

    let record = match register(environment, &target).await {
        Ok(record) => record,
        Err(e) => {
            // a copy without a record would block the retry
            if !existed {
                if let Err(remove) = fs::remove_file(&target).await {
                    warn!(logger, "Failed to remove copied file"; "error" => remove.to_string());
                }
            }

            return Err(e);
        }
    };

    if existed && overwrite {
        let forgotten = forget_replaced(environment, &record).await?;
        debug!(logger, "Deleted records of replaced file"; "deleted" => forgotten);
    }

    Ok(record)
}

async fn same_file(a: &Path, b: &Path) -> Result<bool, BackendError> {
    let a = fs::canonicalize(a).await.map_err(|e| BackendError::io(a, e))?;
    let b = fs::canonicalize(b).await.map_err(|e| BackendError::io(b, e))?;

    Ok(a == b)
}

/// Deletes every other record pointing at the file of `record`.
async fn forget_replaced(environment: &Environment, record: &AnimationRecord) -> Result<u64, BackendError> {
    let stale = environment
        .db
        .retrieve_all()
        .await?
        .into_iter()
        .filter(|other| other.id() != record.id() && other.metadata().file_path == record.metadata().file_path)
        .map(|other| other.id())
        .collect::<BTreeSet<_>>();

    if stale.is_empty() {
        return Ok(0);
    }

    environment.db.delete_many(&stale).await
}

/// Records a BVH file that's already where it should be.
pub async fn register(environment: &Environment, path: &Path) -> Result<AnimationRecord, BackendError> {
    if !is_motion_file(path) {
        return Err(BackendError::UnsupportedFile(path.to_owned()));
    }

    let path = fs::canonicalize(path)
        .await
        .map_err(|e| BackendError::io(path, e))?;

    let size = fs::metadata(&path)
        .await
        .map_err(|e| BackendError::io(&path, e))?
        .len();

    let input = placeholder::generate(&mut rand::rng(), &path, Some((size / 1024) as i64));
    let metadata = validate_for_create(input)?;

    let record = environment.db.insert(metadata).await?;

    info!(
        environment.logger,
        "Registered file";
        "id" => record.id(),
        "path" => path.display().to_string()
    );

    Ok(record)
}

/// Lists the BVH files in a directory, sorted by name.
pub async fn motion_files(dir: &Path) -> Result<Vec<PathBuf>, BackendError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| BackendError::io(dir, e))?;

    let mut files = vec![];

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BackendError::io(dir, e))?
    {
        let path = entry.path();

        if is_motion_file(&path) && fs::metadata(&path).await.map_or(false, |m| m.is_file()) {
            files.push(path);
        }
    }

    files.sort();

    Ok(files)
}

/// Reads the stored file of a record as text, for a viewer to render.
pub async fn read_source(environment: &Environment, id: Id) -> Result<String, BackendError> {
    let record = environment
        .db
        .retrieve(id)
        .await?
        .ok_or(BackendError::NonExistentId(id))?;

    let path = record
        .metadata()
        .file_path
        .as_ref()
        .map(PathBuf::from)
        .ok_or(BackendError::MissingFilePath(id))?;

    fs::read_to_string(&path)
        .await
        .map_err(|e| BackendError::io(path, e))
}
