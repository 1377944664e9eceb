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
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, span, Level};

use super::{DeviceError, Session};
use crate::audio::OutputBuffers;
use crate::playback::BlockFormat;
use crate::playsync::StopHandle;
use crate::render::{AudioRenderer, RawMidi, RenderStatus};

const MAX_MIDI_PER_BLOCK: usize = 64;

/// A mock device. Calls the renderer from a thread once per block period and
/// optionally hands every rendered block to a capture channel.
#[derive(Clone)]
pub struct Device {
    name: String,
    format: BlockFormat,
    period: Duration,
    /// Frames reported to the renderer on every call.
    frames: usize,
    capture: Option<Sender<Vec<Vec<f32>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, format: BlockFormat) -> Device {
        Device {
            name: name.to_string(),
            format,
            period: format.duration_of(1),
            frames: format.block_frames,
            capture: None,
        }
    }

    /// Calls the renderer with this period instead of real time.
    pub fn with_period(mut self, period: Duration) -> Device {
        self.period = period;
        self
    }

    /// Reports this many frames per call instead of the block size.
    pub fn with_frames(mut self, frames: usize) -> Device {
        self.frames = frames;
        self
    }

    /// Sends the planar outputs of every call to `capture`.
    pub fn with_capture(mut self, capture: Sender<Vec<Vec<f32>>>) -> Device {
        self.capture = Some(capture);
        self
    }
}

/// Stops and joins the render thread when dropped.
struct MockSession {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl super::Device for Device {
    fn start(
        &self,
        mut renderer: Box<dyn AudioRenderer>,
        midi: Receiver<RawMidi>,
        stop: StopHandle,
    ) -> Result<Session, DeviceError> {
        let span = span!(Level::INFO, "start (mock)");
        let _enter = span.enter();

        info!(
            device = self.name,
            block_size = self.format.block_frames,
            period = ?self.period,
            "Starting mock output."
        );

        let running = Arc::new(AtomicBool::new(true));
        let join = {
            let running = running.clone();
            let device = self.clone();
            thread::Builder::new()
                .name("midiboard-mock-render".into())
                .spawn(move || {
                    let mut outputs =
                        OutputBuffers::new(device.format.channels, device.format.block_frames);
                    let mut pending: Vec<RawMidi> = Vec::with_capacity(MAX_MIDI_PER_BLOCK);

                    while running.load(Ordering::Relaxed) && !stop.is_stopped() {
                        thread::sleep(device.period);

                        pending.clear();
                        pending.extend(midi.try_iter().take(MAX_MIDI_PER_BLOCK));
                        let status = renderer.process(device.frames, &pending, &mut outputs);

                        if let Some(capture) = &device.capture {
                            let planar = (0..outputs.channels())
                                .map(|channel| outputs.channel(channel).to_vec())
                                .collect();
                            let _ = capture.send(planar);
                        }

                        if status == RenderStatus::Stop {
                            break;
                        }
                    }
                    debug!("Mock output stopped.");
                })?
        };

        Ok(Box::new(MockSession {
            running,
            join: Some(join),
        }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
