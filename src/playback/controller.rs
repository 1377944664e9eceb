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
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info};

use super::error::PlaybackError;
use super::producer::{BlockFormat, PlaybackSession, ProducerOutcome};
use super::state::PlaybackState;
use crate::audio::sample_source::Decoder;
use crate::audio::OutputBuffers;
use crate::resolver::FileResolver;

/// The single voice of the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Voice {
    Idle,
    /// A producer was started for `note` and is bound to queue `queue`.
    Playing { note: u8, queue: u64 },
}

/// Interprets note events. Monophonic: a note-on replaces whatever was playing
/// and any note-off silences the voice.
pub struct PlaybackController {
    resolver: FileResolver,
    decoder: Arc<dyn Decoder>,
    state: Arc<PlaybackState>,
    format: BlockFormat,
    push_timeout: Duration,
    voice: Voice,
    next_session: u64,
    /// The most recent producer. Older producers are detached and left to
    /// finish on their own.
    producer: Option<JoinHandle<ProducerOutcome>>,
}

impl PlaybackController {
    pub fn new(
        resolver: FileResolver,
        decoder: Arc<dyn Decoder>,
        state: Arc<PlaybackState>,
        format: BlockFormat,
        push_timeout: Duration,
    ) -> PlaybackController {
        PlaybackController {
            resolver,
            decoder,
            state,
            format,
            push_timeout,
            voice: Voice::Idle,
            next_session: 0,
            producer: None,
        }
    }

    pub fn voice(&self) -> Voice {
        self.voice
    }

    pub fn state(&self) -> &Arc<PlaybackState> {
        &self.state
    }

    pub fn format(&self) -> BlockFormat {
        self.format
    }

    /// Takes the handle of the most recently started producer.
    pub fn take_producer(&mut self) -> Option<JoinHandle<ProducerOutcome>> {
        self.producer.take()
    }

    /// Starts streaming the file mapped to `note`. A note with no file leaves
    /// the current playback alone.
    pub fn note_on(&mut self, note: u8) -> Result<(), PlaybackError> {
        let Some(path) = self.resolver.resolve(note) else {
            debug!(note, "Note has no file, ignoring");
            return Ok(());
        };

        let queue = self.state.install_new();
        let queue_id = queue.id();
        let id = self.next_session;
        self.next_session += 1;

        info!(note, path = ?path, session = id, "Note on");
        let session = PlaybackSession::new(
            id,
            note,
            path,
            queue,
            self.state.clone(),
            self.push_timeout,
        );

        match session.spawn(self.decoder.clone(), self.format) {
            Ok(handle) => {
                self.producer = Some(handle);
                self.voice = Voice::Playing {
                    note,
                    queue: queue_id,
                };
                Ok(())
            }
            Err(e) => {
                self.voice = Voice::Idle;
                Err(e)
            }
        }
    }

    /// Discards pending audio and silences the outputs for the current block.
    pub fn note_off(&mut self, note: u8, outputs: &mut OutputBuffers) {
        self.state.install_new();
        outputs.silence();
        self.voice = Voice::Idle;
        info!(note, "Note off");
    }
}
