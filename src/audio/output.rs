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
use super::block::AudioBlock;

/// Preallocated planar output buffers handed to the renderer on every callback.
/// Nothing in here allocates after construction.
pub struct OutputBuffers {
    samples: Vec<f32>,
    channels: usize,
    frames: usize,
}

impl OutputBuffers {
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            samples: vec![0.0; channels * frames],
            channels,
            frames,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * self.frames;
        &self.samples[start..start + self.frames]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let start = channel * self.frames;
        &mut self.samples[start..start + self.frames]
    }

    /// Zeroes every output channel.
    pub fn silence(&mut self) {
        self.samples.fill(0.0);
    }

    /// Copies a block into the outputs. Channels and frames the block does not
    /// cover are zeroed.
    pub fn copy_block(&mut self, block: &AudioBlock) {
        let frames = self.frames.min(block.frames());
        for channel in 0..self.channels {
            let out = self.channel_mut(channel);
            if channel < block.channel_count() {
                out[..frames].copy_from_slice(&block.channel(channel)[..frames]);
                out[frames..].fill(0.0);
            } else {
                out.fill(0.0);
            }
        }
    }

    /// Writes the planar outputs into an interleaved device buffer. Frames past
    /// the end of the outputs are zeroed.
    pub fn interleave_into(&self, data: &mut [f32]) {
        if self.channels == 0 {
            data.fill(0.0);
            return;
        }

        for (frame, out) in data.chunks_mut(self.channels).enumerate() {
            if frame < self.frames {
                for (channel, sample) in out.iter_mut().enumerate() {
                    *sample = self.samples[channel * self.frames + frame];
                }
            } else {
                out.fill(0.0);
            }
        }
    }
}
