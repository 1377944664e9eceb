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

/// One render period of multi-channel audio. Samples are stored planar in a
/// single allocation: all frames of channel 0, then all frames of channel 1, etc.
/// Blocks are immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock {
    samples: Box<[f32]>,
    frames: usize,
    channels: usize,
}

impl AudioBlock {
    /// Builds a block from planar channel data. Every channel must hold the same
    /// number of frames; short channels are zero-padded to the longest one.
    pub fn from_planar(planar: &[Vec<f32>]) -> Self {
        let frames = planar.iter().map(Vec::len).max().unwrap_or(0);
        let channels = planar.len();
        let mut samples = vec![0.0; frames * channels];
        for (channel, source) in samples.chunks_exact_mut(frames.max(1)).zip(planar) {
            channel[..source.len()].copy_from_slice(source);
        }
        Self {
            samples: samples.into_boxed_slice(),
            frames,
            channels,
        }
    }

    /// Builds a block that owns an already laid out planar buffer.
    pub(crate) fn from_samples(samples: Box<[f32]>, frames: usize, channels: usize) -> Self {
        debug_assert_eq!(samples.len(), frames * channels);
        Self {
            samples,
            frames,
            channels,
        }
    }

    /// Number of frames per channel.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// The samples of one channel.
    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * self.frames;
        &self.samples[start..start + self.frames]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_planar_pads_short_channels() {
        let block = AudioBlock::from_planar(&[vec![1.0, 2.0, 3.0], vec![4.0]]);
        assert_eq!(block.frames(), 3);
        assert_eq!(block.channel_count(), 2);
        assert_eq!(block.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(block.channel(1), &[4.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_block() {
        let block = AudioBlock::from_planar(&[Vec::new(), Vec::new()]);
        assert_eq!(block.frames(), 0);
        assert!(block.channel(1).is_empty());
    }
}
