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

//! The real-time render callback.
//!
//! Hosts call [`AudioRenderer::process`] once per audio block with the MIDI
//! messages that arrived for that block. Everything reachable from `process` on
//! the steady-state path is non-blocking and allocation-free.

use std::sync::Arc;
use std::time::Duration;

use midly::live::LiveEvent;
use midly::MidiMessage;
use thiserror::Error;
use tracing::{error, warn};

use crate::audio::{OutputBuffers, Popped};
use crate::playback::{PlaybackController, PlaybackError, PlaybackState};
use crate::playsync::StopReason;

/// A raw MIDI message as delivered by the input device. Only the first three
/// bytes are kept; `len` is the length of the original message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawMidi {
    bytes: [u8; 3],
    len: usize,
}

impl RawMidi {
    pub fn new(data: &[u8]) -> RawMidi {
        let mut bytes = [0u8; 3];
        let kept = data.len().min(3);
        bytes[..kept].copy_from_slice(&data[..kept]);
        RawMidi {
            bytes,
            len: data.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The message bytes, if this is a three byte message.
    pub fn as_triple(&self) -> Option<&[u8; 3]> {
        (self.len == 3).then_some(&self.bytes)
    }
}

/// A note event the board reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteEvent {
    On(u8),
    Off(u8),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed MIDI message: {0}")]
    Parse(#[from] midly::Error),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Decodes a raw message into a note event on `channel`. Messages that aren't
/// three bytes long, are on another channel or aren't notes decode to None.
/// Velocity is ignored, so a note-on with zero velocity still triggers.
pub fn decode_note(message: &RawMidi, channel: u8) -> Result<Option<NoteEvent>, midly::Error> {
    let Some(bytes) = message.as_triple() else {
        return Ok(None);
    };

    let event = match LiveEvent::parse(bytes)? {
        LiveEvent::Midi {
            channel: event_channel,
            message,
        } if event_channel.as_int() == channel => match message {
            MidiMessage::NoteOn { key, .. } => NoteEvent::On(key.as_int()),
            MidiMessage::NoteOff { key, .. } => NoteEvent::Off(key.as_int()),
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };
    Ok(Some(event))
}

/// What the host should do after a render call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    Continue,
    /// Tear down the stream. The outputs of this call are already silent.
    Stop,
}

/// The callbacks an audio host drives.
pub trait AudioRenderer: Send {
    /// Renders one block. `frames` is the number of frames the host delivered.
    fn process(
        &mut self,
        frames: usize,
        midi: &[RawMidi],
        outputs: &mut OutputBuffers,
    ) -> RenderStatus;

    /// The host missed a deadline.
    fn xrun(&mut self, delay: Option<Duration>);

    /// The host is going away.
    fn shutdown(&mut self, reason: &str);
}

/// The board's renderer: feeds MIDI to the playback controller and copies one
/// queued block per call into the outputs.
pub struct Renderer {
    controller: PlaybackController,
    state: Arc<PlaybackState>,
    midi_channel: u8,
}

impl Renderer {
    pub fn new(controller: PlaybackController, midi_channel: u8) -> Renderer {
        let state = controller.state().clone();
        Renderer {
            controller,
            state,
            midi_channel,
        }
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }

    fn dispatch(
        &mut self,
        message: &RawMidi,
        outputs: &mut OutputBuffers,
    ) -> Result<(), DispatchError> {
        match decode_note(message, self.midi_channel)? {
            Some(NoteEvent::On(note)) => self.controller.note_on(note)?,
            Some(NoteEvent::Off(note)) => self.controller.note_off(note, outputs),
            None => {}
        }
        Ok(())
    }
}

impl AudioRenderer for Renderer {
    fn process(
        &mut self,
        frames: usize,
        midi: &[RawMidi],
        outputs: &mut OutputBuffers,
    ) -> RenderStatus {
        if !self.state.is_running() {
            outputs.silence();
            return RenderStatus::Stop;
        }

        for message in midi {
            if let Err(e) = self.dispatch(message, outputs) {
                error!(err = %e, message = ?message, "Error handling MIDI message");
            }
        }

        let expected = self.controller.format().block_frames;
        if frames != expected {
            error!(expected, actual = frames, "Block size changed, stopping");
            outputs.silence();
            self.state.stop(StopReason::BlockSizeMismatch {
                expected,
                actual: frames,
            });
            return RenderStatus::Stop;
        }

        match self.state.try_pop() {
            Popped::Block(block) => {
                outputs.copy_block(&block);
                self.state.retire_block(block);
            }
            Popped::EndOfStream | Popped::Empty => outputs.silence(),
        }
        RenderStatus::Continue
    }

    fn xrun(&mut self, delay: Option<Duration>) {
        warn!(delay = ?delay, "An xrun occurred, consider a larger block size");
    }

    fn shutdown(&mut self, reason: &str) {
        error!(reason, "Audio device shut down");
        self.state.stop(StopReason::DeviceShutdown(reason.to_string()));
    }
}
