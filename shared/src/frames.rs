use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::errors::{ChunkDescriptorError, PartitionError};

/// Group key shared by every frame of the (single) animation being rendered.
pub const ANIMATION_GROUP_KEY: u32 = 1;

/// Frame index carried by a record that already holds a merged animation.
pub const MERGED_FRAME_INDEX: usize = 1;

/// Number of frames each worker task renders unless configured otherwise.
pub const DEFAULT_FRAMES_PER_TASK: usize = 10;


/// One worker task's share of the animation.
///
/// Frame bounds are 1-indexed and inclusive. `total_frames` is the frame count of
/// the whole animation, so the renderer can compute global timing.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct ChunkDescriptor {
    pub total_frames: usize,

    /// Inclusive frame bound.
    pub start_frame: usize,

    /// Inclusive frame bound.
    pub end_frame: usize,
}

impl ChunkDescriptor {
    pub fn new(
        total_frames: usize,
        start_frame: usize,
        end_frame: usize,
    ) -> Result<Self, ChunkDescriptorError> {
        if start_frame < 1 || start_frame > end_frame || end_frame > total_frames {
            return Err(ChunkDescriptorError::InvalidRange {
                total_frames,
                start_frame,
                end_frame,
            });
        }

        Ok(Self {
            total_frames,
            start_frame,
            end_frame,
        })
    }

    pub fn frame_indices(&self) -> impl Iterator<Item = usize> {
        self.start_frame..=self.end_frame
    }

    pub fn num_frames(&self) -> usize {
        self.end_frame - self.start_frame + 1
    }

    /// Encodes the chunk as `<animationId> <totalFrames> <startFrame> <endFrame>`.
    pub fn to_line(&self, group_key: u32) -> String {
        format!(
            "{} {} {} {}",
            group_key, self.total_frames, self.start_frame, self.end_frame
        )
    }

    /// Parses a line produced by [`ChunkDescriptor::to_line`],
    /// returning the group key alongside the chunk.
    pub fn from_line(line: &str) -> Result<(u32, Self), ChunkDescriptorError> {
        let malformed = || ChunkDescriptorError::Malformed {
            line: line.to_string(),
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [group_key, total_frames, start_frame, end_frame] = fields.as_slice() else {
            return Err(malformed());
        };

        let group_key: u32 = group_key.parse().map_err(|_| malformed())?;
        let total_frames: usize = total_frames.parse().map_err(|_| malformed())?;
        let start_frame: usize = start_frame.parse().map_err(|_| malformed())?;
        let end_frame: usize = end_frame.parse().map_err(|_| malformed())?;

        Ok((
            group_key,
            Self::new(total_frames, start_frame, end_frame)?,
        ))
    }
}

impl Display for ChunkDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] of {}",
            self.start_frame, self.end_frame, self.total_frames
        )
    }
}


/// Splits `1..=total_frames` into consecutive chunks of at most `chunk_size` frames.
pub fn partition(
    total_frames: usize,
    chunk_size: usize,
) -> Result<Vec<ChunkDescriptor>, PartitionError> {
    if total_frames < 1 {
        return Err(PartitionError::InvalidTotalFrames(total_frames));
    }
    if chunk_size < 1 {
        return Err(PartitionError::InvalidChunkSize(chunk_size));
    }

    let mut chunks = Vec::with_capacity(total_frames.div_ceil(chunk_size));
    let mut end_frame = 0;

    while end_frame != total_frames {
        let start_frame = end_frame + 1;
        end_frame = start_frame
            .saturating_add(chunk_size - 1)
            .min(total_frames);

        chunks.push(ChunkDescriptor {
            total_frames,
            start_frame,
            end_frame,
        });
    }

    Ok(chunks)
}


/// A rendered image (or an already-merged animation) travelling towards the reducer.
///
/// Records produced by a merge carry [`MERGED_FRAME_INDEX`], which makes them
/// look like an ordinary single frame to the next merge.
#[derive(Clone, Eq, PartialEq)]
pub struct FrameRecord {
    pub group_key: u32,
    pub frame_index: usize,
    pub image: Vec<u8>,
}

impl FrameRecord {
    pub fn new(group_key: u32, frame_index: usize, image: Vec<u8>) -> Self {
        Self {
            group_key,
            frame_index,
            image,
        }
    }

    pub fn new_merged(group_key: u32, animation: Vec<u8>) -> Self {
        Self::new(group_key, MERGED_FRAME_INDEX, animation)
    }

    /// File extension matching the image's magic bytes.
    pub fn image_extension(&self) -> &'static str {
        if self.image.starts_with(b"GIF87a") || self.image.starts_with(b"GIF89a") {
            "gif"
        } else if self.image.starts_with(b"\x89PNG\r\n\x1a\n") {
            "png"
        } else if self.image.starts_with(b"\xff\xd8\xff") {
            "jpg"
        } else {
            "img"
        }
    }
}

impl fmt::Debug for FrameRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRecord")
            .field("group_key", &self.group_key)
            .field("frame_index", &self.frame_index)
            .field("image_len", &self.image.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(chunks: &[ChunkDescriptor]) -> Vec<(usize, usize)> {
        chunks
            .iter()
            .map(|chunk| (chunk.start_frame, chunk.end_frame))
            .collect()
    }

    #[test]
    fn single_chunk_when_chunk_size_exceeds_frames() {
        let chunks = partition(7, 10).unwrap();
        assert_eq!(ranges(&chunks), vec![(1, 7)]);
        assert_eq!(chunks[0].total_frames, 7);
    }

    #[test]
    fn huge_chunk_size_does_not_overflow() {
        assert_eq!(ranges(&partition(7, usize::MAX).unwrap()), vec![(1, 7)]);
        assert_eq!(
            ranges(&partition(usize::MAX, usize::MAX).unwrap()),
            vec![(1, usize::MAX)]
        );
    }

    #[test]
    fn last_chunk_is_truncated() {
        let chunks = partition(25, 10).unwrap();
        assert_eq!(ranges(&chunks), vec![(1, 10), (11, 20), (21, 25)]);
        assert!(chunks.iter().all(|chunk| chunk.total_frames == 25));
    }

    #[test]
    fn exact_multiple_has_no_empty_trailing_chunk() {
        let chunks = partition(20, 10).unwrap();
        assert_eq!(ranges(&chunks), vec![(1, 10), (11, 20)]);
    }

    #[test]
    fn chunks_tile_the_frame_range() {
        for total_frames in 1..=40 {
            for chunk_size in 1..=45 {
                let chunks = partition(total_frames, chunk_size).unwrap();

                assert_eq!(chunks.first().unwrap().start_frame, 1);
                assert_eq!(chunks.last().unwrap().end_frame, total_frames);

                for pair in chunks.windows(2) {
                    assert_eq!(pair[0].end_frame + 1, pair[1].start_frame);
                }

                for chunk in &chunks {
                    assert!(chunk.start_frame <= chunk.end_frame);
                    assert!(chunk.num_frames() <= chunk_size);
                }

                let covered: usize = chunks.iter().map(ChunkDescriptor::num_frames).sum();
                assert_eq!(covered, total_frames);
            }
        }
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert!(matches!(
            partition(0, 10),
            Err(PartitionError::InvalidTotalFrames(0))
        ));
        assert!(matches!(
            partition(10, 0),
            Err(PartitionError::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn descriptor_line_format() {
        let chunk = ChunkDescriptor::new(25, 11, 20).unwrap();
        assert_eq!(chunk.to_line(ANIMATION_GROUP_KEY), "1 25 11 20");

        let (group_key, parsed) = ChunkDescriptor::from_line("1 25 11 20\n").unwrap();
        assert_eq!(group_key, ANIMATION_GROUP_KEY);
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn rejects_malformed_descriptor_lines() {
        assert!(matches!(
            ChunkDescriptor::from_line("1 25 11"),
            Err(ChunkDescriptorError::Malformed { .. })
        ));
        assert!(matches!(
            ChunkDescriptor::from_line("1 25 eleven 20"),
            Err(ChunkDescriptorError::Malformed { .. })
        ));
        assert!(matches!(
            ChunkDescriptor::from_line("1 25 21 20"),
            Err(ChunkDescriptorError::InvalidRange { .. })
        ));
        assert!(matches!(
            ChunkDescriptor::from_line("1 25 0 20"),
            Err(ChunkDescriptorError::InvalidRange { .. })
        ));
    }

    #[test]
    fn merged_records_use_the_sentinel_index() {
        let merged = FrameRecord::new_merged(ANIMATION_GROUP_KEY, b"GIF89a...".to_vec());
        assert_eq!(merged.frame_index, MERGED_FRAME_INDEX);
        assert_eq!(merged.image_extension(), "gif");
    }
}
