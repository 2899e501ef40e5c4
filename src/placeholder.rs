//! Randomized metadata for files whose contents haven't been analysed.

use std::path::Path;

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::recording::{ActorGender, CreateAnimation};

pub const SKELETON_TYPES: [&str; 4] = ["MIXAMO", "CUSTOM", "CMU", "BIPED"];

pub const ANIMATION_STYLES: [&str; 7] = ["Walk", "Run", "Jump", "Dance", "Idle", "Combat", "Gesture"];

const DESCRIPTION_WORDS: [&str; 24] = [
    "actor", "arms", "balance", "capture", "circle", "crouch", "forward", "gentle", "heavy",
    "left", "light", "loop", "motion", "pause", "quick", "right", "slow", "spin", "stance",
    "step", "studio", "take", "turn", "weight",
];

const DESCRIPTION_LENGTH: usize = 10;

/// Builds a submission for the file at `path` with plausible random values.
/// `size_kb` is used when known; otherwise a size is made up too.
pub fn generate<R: Rng + ?Sized>(rng: &mut R, path: &Path, size_kb: Option<i64>) -> CreateAnimation {
    let original_filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    CreateAnimation {
        file_path: Some(path.to_string_lossy().into_owned()),
        original_filename,
        file_size_kb: Some(size_kb.unwrap_or_else(|| rng.random_range(50..=5000))),
        duration_seconds: Some(round(rng.random_range(1.0..=60.0), 3)),
        frame_count: Some(rng.random_range(30..=1800)),
        frame_time: Some(round(rng.random_range(0.008..=0.033), 6)),
        fps: Some(round(rng.random_range(24.0..=120.0), 2)),
        skeleton_type: SKELETON_TYPES.choose(rng).map(|s| (*s).to_owned()),
        bone_count: Some(rng.random_range(15..=80)),
        has_fingers: Some(rng.random()),
        rest_pose_height: Some(round(rng.random_range(1.5..=2.0), 2)),
        animation_style: ANIMATION_STYLES.choose(rng).map(|s| (*s).to_owned()),
        description: Some(sentence(rng)),
        actor_gender: ActorGender::ALL.choose(rng).map(|g| g.to_string()),
        loopable: Some(rng.random()),
    }
}

fn sentence<R: Rng + ?Sized>(rng: &mut R) -> String {
    let words = (0..DESCRIPTION_LENGTH)
        .filter_map(|_| DESCRIPTION_WORDS.choose(rng).copied())
        .collect::<Vec<_>>()
        .join(" ");

    let mut chars = words.chars();

    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

fn round(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);

    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::validation::validate_for_create;

    #[test]
    fn names_come_from_the_path() {
        let mut rng = StdRng::seed_from_u64(7);

        let input = generate(&mut rng, Path::new("data/walk01.bvh"), Some(120));

        assert_eq!(input.original_filename.as_deref(), Some("walk01.bvh"));
        assert_eq!(input.file_path.as_deref(), Some("data/walk01.bvh"));
        assert_eq!(input.file_size_kb, Some(120));
    }

    #[test]
    fn values_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..500 {
            let input = generate(&mut rng, Path::new("run.bvh"), None);

            let size = input.file_size_kb.expect("size is generated");
            assert!((50..=5000).contains(&size));

            let frames = input.frame_count.expect("frame count is generated");
            assert!((30..=1800).contains(&frames));

            let bones = input.bone_count.expect("bone count is generated");
            assert!((15..=80).contains(&bones));

            let fps = input.fps.expect("fps is generated");
            assert!((24.0..=120.0).contains(&fps));

            let height = input.rest_pose_height.expect("height is generated");
            assert!((1.5..=2.0).contains(&height));

            let skeleton = input.skeleton_type.expect("skeleton type is generated");
            assert!(SKELETON_TYPES.contains(&skeleton.as_str()));

            let style = input.animation_style.expect("style is generated");
            assert!(ANIMATION_STYLES.contains(&style.as_str()));
        }
    }

    #[test]
    fn description_reads_as_a_sentence() {
        let mut rng = StdRng::seed_from_u64(3);

        let description = sentence(&mut rng);

        assert_eq!(description.split(' ').count(), DESCRIPTION_LENGTH);
        assert!(description.ends_with('.'));
        assert!(description.starts_with(char::is_uppercase));
    }

    proptest! {
        #[test]
        fn placeholders_always_validate(seed in any::<u64>(), name in "[a-z0-9_]{1,40}") {
            let mut rng = StdRng::seed_from_u64(seed);
            let path = format!("data/{}.bvh", name);

            let input = generate(&mut rng, Path::new(&path), None);

            prop_assert!(validate_for_create(input).is_ok());
        }
    }
}
