//! Turns the raw values of an edited row into a typed `RecordPatch`.
//!
//! Grids hand back whatever their cells hold, so numbers may arrive as
//! strings and flags as `0`/`1` or `"yes"`. Each value is converted to the
//! column's type and then held to the same bounds as a new record.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::normalization::normalize_option;
use crate::recording::{ActorGender, RecordPatch};
use crate::validation::{
    finite_decimal, non_negative_integer, positive_decimal, positive_integer, text_length,
    MAX_ANIMATION_STYLE_LENGTH, MAX_FILENAME_LENGTH, MAX_FILE_PATH_LENGTH,
    MAX_SKELETON_TYPE_LENGTH,
};

/// A value in an edited row that can't be stored in its column.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("{field} {reason}")]
pub struct CoercionError {
    pub field: String,
    pub reason: String,
}

/// Columns the store assigns. Rows echo them back but they're never written.
const READ_ONLY_FIELDS: [&str; 3] = ["id", "external_id", "uploaded_at"];

/// Converts every field of a row, stopping at the first one that doesn't
/// fit.
pub fn coerce_row(fields: &Map<String, Value>) -> Result<RecordPatch, CoercionError> {
    let mut patch = RecordPatch::default();

    for (field, value) in fields {
        coerce_field(&mut patch, field, value).map_err(|reason| CoercionError {
            field: field.clone(),
            reason,
        })?;
    }

    Ok(patch)
}

fn coerce_field(patch: &mut RecordPatch, field: &str, value: &Value) -> Result<(), String> {
    if READ_ONLY_FIELDS.contains(&field) {
        return Ok(());
    }

    match field {
        "file_path" => patch.file_path = Some(bounded_text(value, MAX_FILE_PATH_LENGTH)?),
        "original_filename" => {
            let name = required(bounded_text(value, MAX_FILENAME_LENGTH)?)?;
            patch.original_filename = Some(name);
        }
        "file_size_kb" => {
            patch.file_size_kb = Some(integer(value)?.map(non_negative_integer).transpose()?)
        }
        "duration_seconds" => {
            patch.duration_seconds = Some(positive_decimal(required(decimal(value)?)?)?)
        }
        "frame_count" => patch.frame_count = Some(positive_integer(required(integer(value)?)?)?),
        "frame_time" => patch.frame_time = Some(positive_decimal(required(decimal(value)?)?)?),
        "fps" => patch.fps = Some(positive_decimal(required(decimal(value)?)?)?),
        "skeleton_type" => {
            patch.skeleton_type = Some(bounded_text(value, MAX_SKELETON_TYPE_LENGTH)?)
        }
        "bone_count" => patch.bone_count = Some(positive_integer(required(integer(value)?)?)?),
        "has_fingers" => patch.has_fingers = Some(boolean(value)?),
        "rest_pose_height" => {
            patch.rest_pose_height = Some(decimal(value)?.map(finite_decimal).transpose()?)
        }
        "animation_style" => {
            patch.animation_style = Some(bounded_text(value, MAX_ANIMATION_STYLE_LENGTH)?)
        }
        "description" => patch.description = Some(text(value)?),
        "actor_gender" => {
            patch.actor_gender = Some(text(value)?.map(|g| g.parse::<ActorGender>()).transpose()?)
        }
        "loopable" => patch.loopable = Some(boolean(value)?),
        _ => return Err("is not a known field".to_owned()),
    }

    Ok(())
}

fn required<T>(value: Option<T>) -> Result<T, String> {
    value.ok_or_else(|| "is required and can't be cleared".to_owned())
}

/// Reads text, treating `null` and blank strings as absent.
pub(crate) fn text(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(normalize_option(Some(s))),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(format!("must be text, got {}", other)),
    }
}

fn bounded_text(value: &Value, max: usize) -> Result<Option<String>, String> {
    let text = text(value)?;

    if let Some(text) = &text {
        text_length(text, 1, max)?;
    }

    Ok(text)
}

pub(crate) fn integer(value: &Value) -> Result<Option<i64>, String> {
    let invalid = || format!("must be an integer, got {}", value);

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => n.as_f64().and_then(integral).map(Some).ok_or_else(invalid),
        },
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => {
            let s = s.trim();

            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .map(Some)
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn integral(f: f64) -> Option<i64> {
    // beyond 2^63 the cast would saturate
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.2e18 {
        Some(f as i64)
    } else {
        None
    }
}

pub(crate) fn decimal(value: &Value) -> Result<Option<f64>, String> {
    let invalid = || format!("must be a number, got {}", value);

    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    finite_decimal(parsed).map(Some)
}

/// Reads a flag the way a spreadsheet would: empty cells are false.
pub(crate) fn boolean(value: &Value) -> Result<bool, String> {
    let invalid = || format!("must be true or false, got {}", value);

    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Ok(false),
            Some(f) if f == 1.0 => Ok(true),
            _ => Err(invalid()),
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "" | "false" | "no" | "0" => Ok(false),
            "true" | "yes" | "1" => Ok(true),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}
