// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Adapts a sample source into a finite sequence of fixed-size render blocks.

use std::path::Path;

use tracing::{info, warn};

use super::block::AudioBlock;
use super::sample_source::{DecodeError, Decoder, SampleSource};

/// Reads a sample source as fixed-size blocks shaped for the output: every block
/// has exactly `block_frames` frames and `output_channels` channels.
///
/// Source channels map 1:1 onto output channels. Output channels with no source
/// channel are silent and surplus source channels are dropped. The final block is
/// zero-padded when the source length isn't a multiple of the block size.
pub struct BlockReader<S: SampleSource> {
    source: S,
    block_frames: usize,
    output_channels: usize,
    /// Reused planar scratch buffer, one Vec per source channel.
    scratch: Vec<Vec<f32>>,
    finished: bool,
}

impl BlockReader<Box<dyn SampleSource>> {
    /// Opens the file at `path` with the given decoder.
    pub fn open(
        decoder: &dyn Decoder,
        path: &Path,
        block_frames: usize,
        output_channels: usize,
        sample_rate: u32,
    ) -> Result<Self, DecodeError> {
        let source = decoder.open(path)?;

        if source.sample_rate() != sample_rate {
            warn!(
                path = ?path,
                file_rate = source.sample_rate(),
                output_rate = sample_rate,
                "Sample rate mismatch, file will play at the output rate"
            );
        }

        info!(
            path = ?path,
            channels = source.channel_count(),
            sample_rate = source.sample_rate(),
            duration = ?source.duration(),
            "Opened audio file"
        );

        Ok(BlockReader::new(source, block_frames, output_channels))
    }
}

impl<S: SampleSource> BlockReader<S> {
    /// Wraps an already opened source.
    pub fn new(source: S, block_frames: usize, output_channels: usize) -> Self {
        let source_channels = source.channel_count() as usize;
        Self {
            source,
            block_frames,
            output_channels,
            scratch: vec![Vec::with_capacity(block_frames); source_channels],
            finished: false,
        }
    }

    /// Fills one block. Returns the number of source frames it holds.
    fn fill(&mut self, samples: &mut [f32]) -> Result<usize, DecodeError> {
        let block_frames = self.block_frames;
        let mut filled = 0;

        while filled < block_frames {
            let read = self
                .source
                .next_chunk(&mut self.scratch, block_frames - filled)?;
            if read == 0 {
                self.finished = true;
                break;
            }

            for (channel, source) in samples
                .chunks_exact_mut(block_frames)
                .zip(self.scratch.iter())
            {
                channel[filled..filled + read].copy_from_slice(&source[..read]);
            }
            filled += read;
        }

        Ok(filled)
    }
}

impl<S: SampleSource> Iterator for BlockReader<S> {
    type Item = Result<AudioBlock, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.block_frames == 0 {
            return None;
        }

        let mut samples = vec![0.0f32; self.block_frames * self.output_channels].into_boxed_slice();
        match self.fill(&mut samples) {
            Ok(0) => None,
            Ok(_) => Some(Ok(AudioBlock::from_samples(
                samples,
                self.block_frames,
                self.output_channels,
            ))),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::{FileDecoder, MemorySampleSource};
    use crate::testutil::write_wav;

    fn ramp(len: usize, offset: f32) -> Vec<f32> {
        (0..len).map(|i| offset + i as f32).collect()
    }

    #[test]
    fn test_final_block_is_zero_padded() {
        let source = MemorySampleSource::new(vec![ramp(10, 0.0)], 44100);
        let blocks: Vec<AudioBlock> = BlockReader::new(source, 4, 1)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].channel(0), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(blocks[1].channel(0), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(blocks[2].channel(0), &[8.0, 9.0, 0.0, 0.0]);
    }

    #[test]
    fn test_exact_multiple_has_no_extra_block() {
        let source = MemorySampleSource::new(vec![ramp(8, 0.0)], 44100);
        assert_eq!(BlockReader::new(source, 4, 1).count(), 2);
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        let source = MemorySampleSource::new(vec![Vec::new()], 44100);
        assert_eq!(BlockReader::new(source, 4, 2).count(), 0);
    }

    #[test]
    fn test_mono_source_on_stereo_output() {
        let source = MemorySampleSource::new(vec![ramp(4, 1.0)], 44100);
        let block = BlockReader::new(source, 4, 2).next().unwrap().unwrap();

        assert_eq!(block.channel_count(), 2);
        assert_eq!(block.channel(0), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(block.channel(1), &[0.0; 4]);
    }

    #[test]
    fn test_surplus_source_channels_are_dropped() {
        let source = MemorySampleSource::new(
            vec![ramp(2, 0.0), ramp(2, 10.0), ramp(2, 20.0)],
            44100,
        );
        let block = BlockReader::new(source, 2, 2).next().unwrap().unwrap();

        assert_eq!(block.channel_count(), 2);
        assert_eq!(block.channel(0), &[0.0, 1.0]);
        assert_eq!(block.channel(1), &[10.0, 11.0]);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let result = BlockReader::open(
            &FileDecoder,
            Path::new("/nowhere/missing.wav"),
            64,
            2,
            44100,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_open_wav_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("clip.wav");
        let left = ramp(100, 0.0).iter().map(|s| s / 100.0).collect::<Vec<_>>();
        let right = left.iter().map(|s| -s).collect::<Vec<_>>();
        write_wav(path.clone(), vec![left.clone(), right.clone()], 44100).unwrap();

        let blocks: Vec<AudioBlock> = BlockReader::open(&FileDecoder, &path, 32, 2, 44100)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(blocks.len(), 4);
        let decoded_left: Vec<f32> = blocks.iter().flat_map(|b| b.channel(0).to_vec()).collect();
        let decoded_right: Vec<f32> = blocks.iter().flat_map(|b| b.channel(1).to_vec()).collect();
        assert_eq!(&decoded_left[..100], &left[..]);
        assert_eq!(&decoded_right[..100], &right[..]);
        assert!(decoded_left[100..].iter().all(|s| *s == 0.0));
    }
}
