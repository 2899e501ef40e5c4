//! CSV export of the catalog.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use csv::Writer;
use time::Format;

use crate::environment::Environment;
use crate::errors::BackendError;
use crate::recording::AnimationRecord;

pub const HEADER: [&str; 18] = [
    "id",
    "external_id",
    "file_path",
    "original_filename",
    "uploaded_at",
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

fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn row(record: &AnimationRecord) -> [String; 18] {
    let m = record.metadata();

    [
        record.id().to_string(),
        record.external_id().to_string(),
        optional(&m.file_path),
        m.original_filename.clone(),
        record.uploaded_at().format(Format::Rfc3339),
        optional(&m.file_size_kb),
        m.duration_seconds.to_string(),
        m.frame_count.to_string(),
        m.frame_time.to_string(),
        m.fps.to_string(),
        optional(&m.skeleton_type),
        m.bone_count.to_string(),
        m.has_fingers.to_string(),
        optional(&m.rest_pose_height),
        optional(&m.animation_style),
        optional(&m.description),
        optional(&m.actor_gender),
        m.loopable.to_string(),
    ]
}

/// Writes a header and one row per record, returning the number of rows.
pub fn write_csv<W: Write>(records: &[AnimationRecord], output: W) -> Result<usize, BackendError> {
    let mut writer = Writer::from_writer(output);

    writer.write_record(&HEADER)?;

    for record in records {
        writer.write_record(&row(record))?;
    }

    writer
        .flush()
        .map_err(|e| BackendError::Csv { source: e.into() })?;

    Ok(records.len())
}

/// Exports every record in ID order to a file, or to standard output.
pub async fn export_csv(environment: &Environment, output: Option<&Path>) -> Result<usize, BackendError> {
    let records = environment.db.retrieve_all().await?;

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(File::create(path).map_err(|e| BackendError::io(path, e))?),
        None => Box::new(io::stdout()),
    };

    write_csv(&records, writer)
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::recording::{ActorGender, AnimationMetadata};

    fn record(id: i32, description: Option<&str>) -> AnimationRecord {
        AnimationRecord::new(
            id,
            Uuid::nil(),
            OffsetDateTime::unix_epoch(),
            AnimationMetadata {
                file_path: Some("data/walk01.bvh".to_owned()),
                original_filename: "walk01.bvh".to_owned(),
                file_size_kb: None,
                duration_seconds: 12.5,
                frame_count: 300,
                frame_time: 0.0333,
                fps: 30.0,
                skeleton_type: Some("CMU".to_owned()),
                bone_count: 42,
                has_fingers: true,
                rest_pose_height: None,
                animation_style: Some("Walk".to_owned()),
                description: description.map(str::to_owned),
                actor_gender: Some(ActorGender::Neutral),
                loopable: false,
            },
        )
    }

    #[test]
    fn rows_follow_the_header() {
        let mut output = vec![];

        let count = write_csv(&[record(1, None), record(2, Some("slow, heavy"))], &mut output)
            .expect("write CSV");
        let text = String::from_utf8(output).expect("CSV is UTF-8");
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(count, 2);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(
            lines[1],
            format!(
                "1,00000000-0000-0000-0000-000000000000,data/walk01.bvh,walk01.bvh,{},,12.5,300,0.0333,30,CMU,42,true,,Walk,,Neutral,false",
                OffsetDateTime::unix_epoch().format(Format::Rfc3339)
            )
        );
        assert!(lines[1].contains("1970-01-01T00:00:00"));
        assert!(lines[2].contains("\"slow, heavy\""));
    }

    #[test]
    fn empty_catalog_still_has_a_header() {
        let mut output = vec![];

        assert_eq!(write_csv(&[], &mut output).expect("write CSV"), 0);
        assert_eq!(String::from_utf8(output).expect("CSV is UTF-8"), HEADER.join(",") + "\n");
    }
}
