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
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use midiboard::audio::sample_source::{DecodeError, Decoder, MemorySampleSource, SampleSource};
use midiboard::audio::OutputBuffers;
use midiboard::playback::{BlockFormat, PlaybackController, PlaybackState};
use midiboard::playsync::StopHandle;
use midiboard::render::{AudioRenderer, RawMidi, Renderer};
use midiboard::resolver::FileResolver;

const BLOCK_FRAMES: usize = 256;
const CHANNELS: usize = 2;

/// Serves a long sine clip, sleeping before every chunk.
struct SlowDecoder {
    clip: Arc<Vec<Vec<f32>>>,
    delay: Duration,
}

struct SlowSource {
    inner: MemorySampleSource,
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

impl Decoder for SlowDecoder {
    fn open(&self, _: &Path) -> Result<Box<dyn SampleSource>, DecodeError> {
        Ok(Box::new(SlowSource {
            inner: MemorySampleSource::from_shared(self.clip.clone(), 44100),
            delay: self.delay,
        }))
    }
}

fn sine(frames: usize, sample_rate: u32) -> Vec<f32> {
    (0..frames)
        .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn benchmark_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    let sound_directory = tempfile::tempdir().unwrap();
    std::fs::write(sound_directory.path().join("clip.wav"), b"").unwrap();
    let clip = Arc::new(vec![sine(44100 * 60, 44100); CHANNELS]);

    for delay_ms in [0u64, 5, 50] {
        let state = Arc::new(PlaybackState::new(20000, StopHandle::new()).unwrap());
        let controller = PlaybackController::new(
            FileResolver::new(sound_directory.path().to_path_buf(), 48),
            Arc::new(SlowDecoder {
                clip: clip.clone(),
                delay: Duration::from_millis(delay_ms),
            }),
            state,
            BlockFormat {
                block_frames: BLOCK_FRAMES,
                channels: CHANNELS,
                sample_rate: 44100,
            },
            Duration::from_secs(1),
        );
        let mut renderer = Renderer::new(controller, 0);
        let mut outputs = OutputBuffers::new(CHANNELS, BLOCK_FRAMES);

        renderer.process(BLOCK_FRAMES, &[RawMidi::new(&[0x90, 48, 100])], &mut outputs);

        group.bench_with_input(
            BenchmarkId::new("process", format!("decoder_delay_{}ms", delay_ms)),
            &delay_ms,
            |b, _| {
                b.iter(|| {
                    let status = renderer.process(black_box(BLOCK_FRAMES), &[], &mut outputs);
                    black_box(status)
                })
            },
        );

        renderer.process(BLOCK_FRAMES, &[RawMidi::new(&[0x80, 48, 0])], &mut outputs);
    }

    group.finish();
}

criterion_group!(benches, benchmark_render);
criterion_main!(benches);
