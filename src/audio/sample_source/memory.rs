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
use std::sync::Arc;
use std::time::Duration;

use super::error::DecodeError;
use super::traits::SampleSource;

/// A sample source that produces planar samples from memory.
/// The sample data is shared so one decoded clip can back many sources.
pub struct MemorySampleSource {
    /// Planar sample storage (one Vec per channel)
    planar_samples: Arc<Vec<Vec<f32>>>,
    /// Current position in frames
    current_frame: usize,
    sample_rate: u32,
}

impl MemorySampleSource {
    /// Creates a new memory sample source from planar samples.
    pub fn new(planar_samples: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self::from_shared(Arc::new(planar_samples), sample_rate)
    }

    /// Creates a new memory sample source over shared planar samples.
    pub fn from_shared(planar_samples: Arc<Vec<Vec<f32>>>, sample_rate: u32) -> Self {
        Self {
            planar_samples,
            current_frame: 0,
            sample_rate,
        }
    }

    /// Returns the total number of frames
    fn total_frames(&self) -> usize {
        self.planar_samples.first().map(|c| c.len()).unwrap_or(0)
    }
}

impl SampleSource for MemorySampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, DecodeError> {
        let num_channels = self.planar_samples.len();
        if output.len() != num_channels {
            return Err(DecodeError::ChannelMismatch {
                expected: num_channels,
                actual: output.len(),
            });
        }

        let available = self.total_frames().saturating_sub(self.current_frame);
        let to_copy = available.min(max_frames);
        let range = self.current_frame..self.current_frame + to_copy;

        for (out, channel) in output.iter_mut().zip(self.planar_samples.iter()) {
            out.clear();
            out.extend_from_slice(&channel[range.clone()]);
        }
        self.current_frame += to_copy;

        Ok(to_copy)
    }

    fn channel_count(&self) -> u16 {
        self.planar_samples.len() as u16
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.total_frames() as f64 / self.sample_rate as f64,
        ))
    }
}
