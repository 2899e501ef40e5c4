use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// An ID in the database.
pub type Id = i32;

/// The gender of the performer, as stored in the `gender_enum` type.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, sqlx::Type)]
#[sqlx(type_name = "gender_enum")]
pub enum ActorGender {
    M,
    F,
    Neutral,
    Other,
}

impl ActorGender {
    pub const ALL: [ActorGender; 4] = [
        ActorGender::M,
        ActorGender::F,
        ActorGender::Neutral,
        ActorGender::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorGender::M => "M",
            ActorGender::F => "F",
            ActorGender::Neutral => "Neutral",
            ActorGender::Other => "Other",
        }
    }
}

impl fmt::Display for ActorGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorGender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActorGender::ALL
            .iter()
            .find(|gender| gender.as_str() == s)
            .copied()
            .ok_or_else(|| format!("must be one of M, F, Neutral, Other, got {:?}", s))
    }
}

/// A single cataloged animation file in the database.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnimationRecord {
    /// The ID of the record.
    id: Id,

    /// The token used to refer to the record from outside.
    external_id: Uuid,

    /// The date and time the file was uploaded.
    #[serde(with = "time::serde::timestamp")]
    uploaded_at: OffsetDateTime,

    /// The descriptive metadata.
    #[serde(flatten)]
    metadata: AnimationMetadata,
}

impl AnimationRecord {
    pub fn new(
        id: Id,
        external_id: Uuid,
        uploaded_at: OffsetDateTime,
        metadata: AnimationMetadata,
    ) -> Self {
        AnimationRecord {
            id,
            external_id,
            uploaded_at,
            metadata,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn external_id(&self) -> &Uuid {
        &self.external_id
    }

    pub fn uploaded_at(&self) -> OffsetDateTime {
        self.uploaded_at
    }

    pub fn metadata(&self) -> &AnimationMetadata {
        &self.metadata
    }

    /// Applies a field-level patch. The identifiers and the upload time
    /// can't be patched.
    pub fn apply(&mut self, patch: &RecordPatch) {
        let m = &mut self.metadata;

        macro_rules! assign {
            ($($field:ident),+) => {
                $(
                    if let Some(value) = &patch.$field {
                        m.$field = value.clone();
                    }
                )+
            };
        }

        assign!(
            file_path,
            original_filename,
            file_size_kb,
            duration_seconds,
            frame_count,
            frame_time,
            fps,
            skeleton_type,
            bone_count,
            has_fingers,
            rest_pose_height,
            animation_style,
            description,
            actor_gender,
            loopable
        );
    }
}

/// The validated, mutable metadata of a record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnimationMetadata {
    /// Where the source file lives.
    pub file_path: Option<String>,

    /// The name of the file as uploaded.
    pub original_filename: String,

    /// The size of the source file in KiB.
    pub file_size_kb: Option<i32>,

    pub duration_seconds: f64,

    pub frame_count: i32,

    /// Seconds per frame.
    pub frame_time: f64,

    pub fps: f64,

    /// The rig convention, e.g. `MIXAMO` or `CMU`.
    pub skeleton_type: Option<String>,

    pub bone_count: i32,

    pub has_fingers: bool,

    /// The height of the skeleton in its rest pose, in metres.
    pub rest_pose_height: Option<f64>,

    pub animation_style: Option<String>,

    pub description: Option<String>,

    pub actor_gender: Option<ActorGender>,

    /// Whether the last frame blends back into the first.
    pub loopable: bool,
}

/// The unvalidated fields submitted to create a record. Everything is
/// optional here so that missing fields can be reported alongside every
/// other problem.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateAnimation {
    pub file_path: Option<String>,

    pub original_filename: Option<String>,

    pub file_size_kb: Option<i64>,

    pub duration_seconds: Option<f64>,

    pub frame_count: Option<i64>,

    pub frame_time: Option<f64>,

    pub fps: Option<f64>,

    pub skeleton_type: Option<String>,

    pub bone_count: Option<i64>,

    pub has_fingers: Option<bool>,

    pub rest_pose_height: Option<f64>,

    pub animation_style: Option<String>,

    pub description: Option<String>,

    /// Parsed during validation so that an unknown gender is reported
    /// with the other violations.
    pub actor_gender: Option<String>,

    pub loopable: Option<bool>,
}

/// A typed partial update. `None` leaves a field untouched; for nullable
/// fields `Some(None)` clears it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordPatch {
    pub file_path: Option<Option<String>>,
    pub original_filename: Option<String>,
    pub file_size_kb: Option<Option<i32>>,
    pub duration_seconds: Option<f64>,
    pub frame_count: Option<i32>,
    pub frame_time: Option<f64>,
    pub fps: Option<f64>,
    pub skeleton_type: Option<Option<String>>,
    pub bone_count: Option<i32>,
    pub has_fingers: Option<bool>,
    pub rest_pose_height: Option<Option<f64>>,
    pub animation_style: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub actor_gender: Option<Option<ActorGender>>,
    pub loopable: Option<bool>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }
}
