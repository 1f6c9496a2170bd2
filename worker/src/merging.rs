use std::path::PathBuf;
use std::process::Stdio;

use shared::errors::MergeError;
use shared::frames::FrameRecord;
use tokio::process::Command;
use tracing::{debug, info};

const ENCODED_ANIMATION_FILE_NAME: &str = "output.gif";


/// Folds a group of frame records into one looping animation using GraphicsMagick.
///
/// The same merger is used to combine each worker task's frames and to reduce the
/// combined results into the final animation: merged records carry the sentinel
/// frame index and are encoded like any other image.
pub struct FrameMerger {
    encoder_binary_path: PathBuf,
}

impl FrameMerger {
    pub fn new(encoder_binary_path: PathBuf) -> Self {
        Self {
            encoder_binary_path,
        }
    }

    /// Returns `Ok(None)` for an empty group.
    ///
    /// Frames are stably sorted by frame index before encoding. Already merged
    /// animations all share the sentinel index, so they keep the order they were
    /// passed in. In a group mixing both, merged animations are only ordered
    /// relative to that sentinel: they land where frame 1 would, ahead of any
    /// plain frame with a higher index.
    pub async fn merge(
        &self,
        group_key: u32,
        mut frames: Vec<FrameRecord>,
    ) -> Result<Option<FrameRecord>, MergeError> {
        if frames.is_empty() {
            info!(group_key, "Nothing to merge (no frames).");
            return Ok(None);
        }

        frames.sort_by_key(|frame| frame.frame_index);

        // Dropping the directory removes it, whichever way this function returns.
        let working_directory = tempfile::Builder::new()
            .prefix("merge-")
            .tempdir()
            .map_err(MergeError::WorkingDirectory)?;

        let mut encoder_args: Vec<String> = ["convert", "-loop", "0", "-delay", "0"]
            .into_iter()
            .map(String::from)
            .collect();

        for (position, frame) in frames.iter().enumerate() {
            let file_name = format!(
                "{:05}-frame{}.{}",
                position,
                frame.frame_index,
                frame.image_extension()
            );

            tokio::fs::write(working_directory.path().join(&file_name), &frame.image)
                .await
                .map_err(|source| MergeError::MaterializeFrame {
                    frame_index: frame.frame_index,
                    source,
                })?;

            encoder_args.push(file_name);
        }

        encoder_args.push(ENCODED_ANIMATION_FILE_NAME.to_string());

        debug!(group_key, frames = frames.len(), "Running encoder.");

        let status = Command::new(&self.encoder_binary_path)
            .args(&encoder_args)
            .current_dir(working_directory.path())
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(MergeError::Spawn)?;

        if !status.success() {
            return Err(MergeError::EncoderExit(status));
        }

        let animation = tokio::fs::read(working_directory.path().join(ENCODED_ANIMATION_FILE_NAME))
            .await
            .map_err(MergeError::ReadOutput)?;

        info!(
            group_key,
            frames = frames.len(),
            bytes = animation.len(),
            "Merged frames into animation."
        );

        Ok(Some(FrameRecord::new_merged(group_key, animation)))
    }
}


#[cfg(all(test, unix))]
mod tests {
    use shared::frames::{ANIMATION_GROUP_KEY, MERGED_FRAME_INDEX};

    use super::*;
    use crate::testing::{fake_tools, lines};

    fn frame(frame_index: usize) -> FrameRecord {
        FrameRecord::new(
            ANIMATION_GROUP_KEY,
            frame_index,
            format!("frame {frame_index}\n").into_bytes(),
        )
    }

    async fn merge(merger: &FrameMerger, frames: Vec<FrameRecord>) -> FrameRecord {
        merger
            .merge(ANIMATION_GROUP_KEY, frames)
            .await
            .unwrap()
            .expect("non-empty group should produce a record")
    }

    #[tokio::test]
    async fn empty_group_produces_nothing() {
        // The encoder must not even be started for an empty group.
        let merger = FrameMerger::new(fake_tools().failing_encoder.clone());

        let merged = merger.merge(ANIMATION_GROUP_KEY, Vec::new()).await.unwrap();
        assert!(merged.is_none());
    }

    #[tokio::test]
    async fn merged_record_uses_sentinel_index_and_same_key() {
        let merger = FrameMerger::new(fake_tools().encoder.clone());

        let merged = merger
            .merge(7, vec![FrameRecord::new(7, 4, b"a\n".to_vec())])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.group_key, 7);
        assert_eq!(merged.frame_index, MERGED_FRAME_INDEX);
        assert_eq!(lines(&merged.image), vec!["a"]);
    }

    #[tokio::test]
    async fn frames_are_encoded_in_frame_index_order() {
        let merger = FrameMerger::new(fake_tools().encoder.clone());

        let merged = merge(&merger, vec![frame(3), frame(1), frame(2)]).await;
        assert_eq!(lines(&merged.image), vec!["frame 1", "frame 2", "frame 3"]);
    }

    #[tokio::test]
    async fn merging_is_safe_on_its_own_output() {
        let merger = FrameMerger::new(fake_tools().encoder.clone());

        let flat = merge(&merger, vec![frame(1), frame(2), frame(3)]).await;

        let partial = merge(&merger, vec![frame(1), frame(2)]).await;
        let nested = merge(&merger, vec![partial, frame(3)]).await;

        assert_eq!(lines(&flat.image).len(), 3);
        assert_eq!(lines(&nested.image), lines(&flat.image));
        assert_eq!(nested.frame_index, MERGED_FRAME_INDEX);
    }

    #[tokio::test]
    async fn merged_animations_sort_as_frame_one() {
        let merger = FrameMerger::new(fake_tools().encoder.clone());

        let later_frames = merge(&merger, vec![frame(2), frame(3)]).await;
        let mixed = merge(&merger, vec![frame(1), later_frames]).await;

        // Stable sort: frame 1 and the merged record tie, so input order decides.
        assert_eq!(lines(&mixed.image), vec!["frame 1", "frame 2", "frame 3"]);

        let behind = merge(&merger, vec![frame(4), merge(&merger, vec![frame(2)]).await]).await;
        assert_eq!(lines(&behind.image), vec!["frame 2", "frame 4"]);
    }

    #[tokio::test]
    async fn merging_at_several_depths_keeps_every_frame() {
        let merger = FrameMerger::new(fake_tools().encoder.clone());

        // ((1 2) 3) and (4 5) combined, then reduced with a lone merged frame 6.
        let depth_one = merge(&merger, vec![frame(1), frame(2)]).await;
        let depth_two = merge(&merger, vec![depth_one, frame(3)]).await;
        let sibling = merge(&merger, vec![frame(4), frame(5)]).await;
        let single = merge(&merger, vec![frame(6)]).await;
        let reduced = merge(&merger, vec![depth_two, sibling, single]).await;

        assert_eq!(
            lines(&reduced.image),
            vec!["frame 1", "frame 2", "frame 3", "frame 4", "frame 5", "frame 6"]
        );

        let re_reduced = merge(&merger, vec![reduced]).await;
        assert_eq!(lines(&re_reduced.image).len(), 6);
    }

    #[tokio::test]
    async fn encoder_failure_is_propagated() {
        let merger = FrameMerger::new(fake_tools().failing_encoder.clone());

        let result = merger.merge(ANIMATION_GROUP_KEY, vec![frame(1)]).await;
        assert!(matches!(result, Err(MergeError::EncoderExit(status)) if status.code() == Some(3)));
    }

    #[tokio::test]
    async fn missing_encoder_is_a_spawn_failure() {
        let directory = tempfile::tempdir().unwrap();
        let merger = FrameMerger::new(directory.path().join("no-such-gm"));

        let result = merger.merge(ANIMATION_GROUP_KEY, vec![frame(1)]).await;
        assert!(matches!(result, Err(MergeError::Spawn(_))));
    }
}
