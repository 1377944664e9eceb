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
use std::path::Path;
use std::time::Duration;

use super::error::DecodeError;

/// A source of audio samples that produces chunks in planar format.
/// Planar format stores all samples for channel 0, then all samples for channel 1, etc.
pub trait SampleSource: Send {
    /// Get the next chunk of samples from the source in planar format.
    /// Each inner Vec corresponds to one channel and is cleared before being
    /// filled with up to max_frames samples.
    /// Returns the number of frames written (0 = EOF).
    ///
    /// The output slice must have exactly channel_count() elements.
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, DecodeError>;

    /// Get the number of channels in this source
    fn channel_count(&self) -> u16;

    /// Get the sample rate of this source
    fn sample_rate(&self) -> u32;

    /// Get the duration of this source (if known)
    fn duration(&self) -> Option<Duration>;
}

/// Blanket implementation for Box<dyn SampleSource> so boxed sources can be
/// handed to generic consumers directly.
impl SampleSource for Box<dyn SampleSource> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, DecodeError> {
        (**self).next_chunk(output, max_frames)
    }

    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }
}

/// Opens audio files as sample sources. This is the seam between the playback
/// pipeline and the codec library, and lets tests substitute slow or failing
/// decoders.
pub trait Decoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn SampleSource>, DecodeError>;
}
