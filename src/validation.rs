//! Creation-time checks for animation records.
//!
//! Every rule lives in a small function returning the reason it failed, so
//! the same rules back both `validate_for_create` and the coercion of
//! edited rows.

use std::convert::TryFrom;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::normalization::normalize_option;
use crate::recording::{ActorGender, AnimationMetadata, CreateAnimation};
use crate::sync::coercion::{boolean, decimal, integer, text};

pub const MAX_FILE_PATH_LENGTH: usize = 512;
pub const MAX_FILENAME_LENGTH: usize = 255;
pub const MAX_SKELETON_TYPE_LENGTH: usize = 50;
pub const MAX_ANIMATION_STYLE_LENGTH: usize = 100;

/// The submittable fields, in the order violations are reported.
const FIELDS: [&str; 15] = [
    "file_path",
    "original_filename",
    "file_size_kb",
    "duration_seconds",
    "frame_count",
    "frame_time",
    "fps",
    "skeleton_type",
    "bone_count",
    "has_fingers",
    "rest_pose_height",
    "animation_style",
    "description",
    "actor_gender",
    "loopable",
];

/// One broken rule.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

/// Every rule a submission broke.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// The names of the offending fields, in field order.
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid record: ")?;

        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} {}", violation.field, violation.reason)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Checks a submission against every rule and returns the validated
/// metadata. Store-assigned fields are left for the store to fill in.
pub fn validate_for_create(input: CreateAnimation) -> Result<AnimationMetadata, ValidationError> {
    check(input, Checker::default())
}

/// Checks a submission given as loose JSON fields. A value of the wrong
/// type is reported alongside every other violation instead of failing
/// the whole submission.
pub fn validate_submission(fields: &Map<String, Value>) -> Result<AnimationMetadata, ValidationError> {
    let mut checker = Checker::default();
    let mut input = CreateAnimation::default();

    for (field, value) in fields {
        if let Err(reason) = read_field(&mut input, field, value) {
            checker.push(field, reason);
        }
    }

    check(input, checker)
}

fn read_field(input: &mut CreateAnimation, field: &str, value: &Value) -> Result<(), String> {
    match field {
        "file_path" => input.file_path = text(value)?,
        "original_filename" => input.original_filename = text(value)?,
        "file_size_kb" => input.file_size_kb = integer(value)?,
        "duration_seconds" => input.duration_seconds = decimal(value)?,
        "frame_count" => input.frame_count = integer(value)?,
        "frame_time" => input.frame_time = decimal(value)?,
        "fps" => input.fps = decimal(value)?,
        "skeleton_type" => input.skeleton_type = text(value)?,
        "bone_count" => input.bone_count = integer(value)?,
        "has_fingers" => input.has_fingers = Some(boolean(value)?),
        "rest_pose_height" => input.rest_pose_height = decimal(value)?,
        "animation_style" => input.animation_style = text(value)?,
        "description" => input.description = text(value)?,
        "actor_gender" => input.actor_gender = text(value)?,
        "loopable" => input.loopable = Some(boolean(value)?),
        _ => return Err("is not a known field".to_owned()),
    }

    Ok(())
}

fn check(input: CreateAnimation, mut checker: Checker) -> Result<AnimationMetadata, ValidationError> {
    let file_path = normalize_option(input.file_path);
    if let Some(path) = &file_path {
        checker.check("file_path", text_length(path, 1, MAX_FILE_PATH_LENGTH));
    }

    let original_filename = checker.required("original_filename", normalize_option(input.original_filename));
    if let Some(name) = &original_filename {
        checker.check("original_filename", text_length(name, 1, MAX_FILENAME_LENGTH));
    }

    let file_size_kb = input
        .file_size_kb
        .and_then(|size| checker.check_value("file_size_kb", non_negative_integer(size)));

    let duration_seconds = checker
        .required("duration_seconds", input.duration_seconds)
        .and_then(|v| checker.check_value("duration_seconds", positive_decimal(v)));

    let frame_count = checker
        .required("frame_count", input.frame_count)
        .and_then(|v| checker.check_value("frame_count", positive_integer(v)));

    let frame_time = checker
        .required("frame_time", input.frame_time)
        .and_then(|v| checker.check_value("frame_time", positive_decimal(v)));

    let fps = checker
        .required("fps", input.fps)
        .and_then(|v| checker.check_value("fps", positive_decimal(v)));

    let skeleton_type = normalize_option(input.skeleton_type);
    if let Some(skeleton) = &skeleton_type {
        checker.check("skeleton_type", text_length(skeleton, 1, MAX_SKELETON_TYPE_LENGTH));
    }

    let bone_count = checker
        .required("bone_count", input.bone_count)
        .and_then(|v| checker.check_value("bone_count", positive_integer(v)));

    let rest_pose_height = input
        .rest_pose_height
        .and_then(|v| checker.check_value("rest_pose_height", finite_decimal(v)));

    let animation_style = normalize_option(input.animation_style);
    if let Some(style) = &animation_style {
        checker.check("animation_style", text_length(style, 1, MAX_ANIMATION_STYLE_LENGTH));
    }

    let actor_gender = normalize_option(input.actor_gender)
        .and_then(|gender| checker.check_value("actor_gender", gender.parse::<ActorGender>()));

    match (
        original_filename,
        duration_seconds,
        frame_count,
        frame_time,
        fps,
        bone_count,
    ) {
        (
            Some(original_filename),
            Some(duration_seconds),
            Some(frame_count),
            Some(frame_time),
            Some(fps),
            Some(bone_count),
        ) if checker.violations.is_empty() => Ok(AnimationMetadata {
            file_path,
            original_filename,
            file_size_kb,
            duration_seconds,
            frame_count,
            frame_time,
            fps,
            skeleton_type,
            bone_count,
            has_fingers: input.has_fingers.unwrap_or(false),
            rest_pose_height,
            animation_style,
            description: normalize_option(input.description),
            actor_gender,
            loopable: input.loopable.unwrap_or(false),
        }),
        _ => Err(checker.finish()),
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn push(&mut self, field: &str, reason: String) {
        self.violations.push(Violation {
            field: field.to_owned(),
            reason,
        });
    }

    /// A field that already failed to parse isn't also reported missing.
    fn required<T>(&mut self, field: &'static str, value: Option<T>) -> Option<T> {
        if value.is_none() && !self.violations.iter().any(|v| v.field == field) {
            self.push(field, "is required".to_owned());
        }

        value
    }

    fn check(&mut self, field: &'static str, result: Result<(), String>) {
        if let Err(reason) = result {
            self.push(field, reason);
        }
    }

    fn check_value<T>(&mut self, field: &'static str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(reason) => {
                self.push(field, reason);
                None
            }
        }
    }

    fn finish(mut self) -> ValidationError {
        // unknown fields go last
        self.violations.sort_by_key(|v| {
            FIELDS
                .iter()
                .position(|field| *field == v.field)
                .unwrap_or(FIELDS.len())
        });

        ValidationError {
            violations: self.violations,
        }
    }
}

pub(crate) fn text_length(text: &str, min: usize, max: usize) -> Result<(), String> {
    let length = text.chars().count();

    if length < min {
        Err(format!("must be at least {} characters long", min))
    } else if length > max {
        Err(format!("must be at most {} characters long, got {}", max, length))
    } else {
        Ok(())
    }
}

pub(crate) fn positive_integer(value: i64) -> Result<i32, String> {
    if value <= 0 {
        return Err(format!("must be positive, got {}", value));
    }

    i32::try_from(value).map_err(|_| format!("must be at most {}, got {}", i32::MAX, value))
}

pub(crate) fn non_negative_integer(value: i64) -> Result<i32, String> {
    if value < 0 {
        return Err(format!("must not be negative, got {}", value));
    }

    i32::try_from(value).map_err(|_| format!("must be at most {}, got {}", i32::MAX, value))
}

pub(crate) fn finite_decimal(value: f64) -> Result<f64, String> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("must be a finite number, got {}", value))
    }
}

pub(crate) fn positive_decimal(value: f64) -> Result<f64, String> {
    let value = finite_decimal(value)?;

    if value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be positive, got {}", value))
    }
}
