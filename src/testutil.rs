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
use std::{
    collections::HashMap,
    error::Error,
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::sample_source::{DecodeError, Decoder, MemorySampleSource, SampleSource};

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes planar float samples to a 32 bit float WAV file.
pub fn write_wav(
    path: PathBuf,
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    // WAV data is interleaved.
    let frames = samples.iter().map(Vec::len).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in &samples {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// A decoder serving in-memory clips keyed by file name. Paths with no clip of
/// their own get the fallback clip, if there is one.
#[derive(Clone, Default)]
pub struct MapDecoder {
    clips: HashMap<String, Arc<Vec<Vec<f32>>>>,
    fallback: Option<Arc<Vec<Vec<f32>>>>,
    sample_rate: u32,
}

impl MapDecoder {
    pub fn new(sample_rate: u32) -> MapDecoder {
        MapDecoder {
            clips: HashMap::new(),
            fallback: None,
            sample_rate,
        }
    }

    /// Serves `frames` frames of `value` on every channel for any path.
    pub fn constant(channels: usize, frames: usize, value: f32) -> MapDecoder {
        let mut decoder = MapDecoder::new(44100);
        decoder.fallback = Some(Arc::new(vec![vec![value; frames]; channels]));
        decoder
    }

    pub fn with_clip(mut self, file_name: &str, planar: Vec<Vec<f32>>) -> MapDecoder {
        self.clips.insert(file_name.to_string(), Arc::new(planar));
        self
    }
}

impl Decoder for MapDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn SampleSource>, DecodeError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let clip = self
            .clips
            .get(&name)
            .or(self.fallback.as_ref())
            .ok_or_else(|| DecodeError::Unsupported(format!("no clip for {}", name)))?;
        Ok(Box::new(MemorySampleSource::from_shared(
            clip.clone(),
            self.sample_rate,
        )))
    }
}

/// A decoder that takes `delay` for every chunk it produces.
pub struct SlowDecoder<D: Decoder> {
    inner: D,
    delay: Duration,
}

impl<D: Decoder> SlowDecoder<D> {
    pub fn new(inner: D, delay: Duration) -> SlowDecoder<D> {
        SlowDecoder { inner, delay }
    }
}

struct SlowSource {
    inner: Box<dyn SampleSource>,
    delay: Duration,
}

impl SampleSource for SlowSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, DecodeError> {
        thread::sleep(self.delay);
        self.inner.next_chunk(output, max_frames)
    }

    fn channel_count(&self) -> u16 {
        self.inner.channel_count()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        self.inner.duration()
    }
}

impl<D: Decoder> Decoder for SlowDecoder<D> {
    fn open(&self, path: &Path) -> Result<Box<dyn SampleSource>, DecodeError> {
        Ok(Box::new(SlowSource {
            inner: self.inner.open(path)?,
            delay: self.delay,
        }))
    }
}

/// A decoder whose sources fail after producing `good_frames` frames.
pub struct FailingDecoder {
    channels: u16,
    good_frames: usize,
}

impl FailingDecoder {
    pub fn new(channels: u16, good_frames: usize) -> FailingDecoder {
        FailingDecoder {
            channels,
            good_frames,
        }
    }
}

struct FailingSource {
    channels: u16,
    remaining: usize,
}

impl SampleSource for FailingSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, DecodeError> {
        if self.remaining == 0 {
            return Err(DecodeError::Unsupported("corrupt packet".into()));
        }
        let frames = self.remaining.min(max_frames);
        for channel in output.iter_mut() {
            channel.clear();
            channel.resize(frames, 1.0);
        }
        self.remaining -= frames;
        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        44100
    }

    fn duration(&self) -> Option<Duration> {
        None
    }
}

impl Decoder for FailingDecoder {
    fn open(&self, _: &Path) -> Result<Box<dyn SampleSource>, DecodeError> {
        Ok(Box::new(FailingSource {
            channels: self.channels,
            remaining: self.good_frames,
        }))
    }
}
