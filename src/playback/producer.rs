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
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, span, Level};

use super::error::PlaybackError;
use super::state::PlaybackState;
use crate::audio::sample_source::{DecodeError, Decoder};
use crate::audio::{AudioBlock, BlockReader, PlaybackQueue, QueueItem};

/// Upper bound on a single blocking push, so a producer notices it has been
/// superseded well before its full timeout runs out.
const STALE_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// How a producer session ended.
#[derive(Debug)]
pub enum ProducerOutcome {
    /// Every block and the end marker were delivered.
    Finished { blocks: usize },
    /// The queue was replaced by a newer note or a note-off.
    Superseded { blocks: usize },
    /// The queue stayed full for the whole push timeout.
    TimedOut { blocks: usize },
    /// The file couldn't be opened or decoded. No end marker was pushed.
    Failed(DecodeError),
}

enum Stalled {
    Superseded,
    TimedOut,
}

/// Audio format the producer reads files into.
#[derive(Clone, Copy, Debug)]
pub struct BlockFormat {
    pub block_frames: usize,
    pub channels: usize,
    pub sample_rate: u32,
}

impl BlockFormat {
    /// The time it takes the render callback to drain `blocks` blocks.
    pub fn duration_of(&self, blocks: usize) -> Duration {
        Duration::from_secs_f64(blocks as f64 * self.block_frames as f64 / self.sample_rate as f64)
    }
}

/// One producer run: feeds the blocks of one file into the queue it was bound
/// to at note-on.
pub struct PlaybackSession {
    id: u64,
    note: u8,
    path: PathBuf,
    queue: Arc<PlaybackQueue>,
    state: Arc<PlaybackState>,
    push_timeout: Duration,
}

impl PlaybackSession {
    pub fn new(
        id: u64,
        note: u8,
        path: PathBuf,
        queue: Arc<PlaybackQueue>,
        state: Arc<PlaybackState>,
        push_timeout: Duration,
    ) -> PlaybackSession {
        PlaybackSession {
            id,
            note,
            path,
            queue,
            state,
            push_timeout,
        }
    }

    /// Opens the file and runs the session on a new thread.
    pub fn spawn(
        self,
        decoder: Arc<dyn Decoder>,
        format: BlockFormat,
    ) -> Result<JoinHandle<ProducerOutcome>, PlaybackError> {
        thread::Builder::new()
            .name(format!("midiboard-producer-{}", self.id))
            .spawn(move || {
                let span = span!(Level::INFO, "producer", id = self.id, note = self.note);
                let _enter = span.enter();

                let blocks = match BlockReader::open(
                    decoder.as_ref(),
                    &self.path,
                    format.block_frames,
                    format.channels,
                    format.sample_rate,
                ) {
                    Ok(blocks) => blocks,
                    Err(e) => {
                        error!(path = ?self.path, err = %e, "Unable to open audio file");
                        return ProducerOutcome::Failed(e);
                    }
                };

                info!(
                    path = ?self.path,
                    block_size = format.block_frames,
                    sample_rate = format.sample_rate,
                    "Playing file"
                );
                self.run(blocks)
            })
            .map_err(|source| PlaybackError::Spawn {
                what: "producer",
                source,
            })
    }

    /// Feeds blocks into the bound queue until the source is exhausted, the
    /// queue is superseded or a push times out.
    ///
    /// Blocks are pushed without waiting while the queue has room. Once it is
    /// full, each push waits for the render callback to make space.
    pub fn run<I>(&self, blocks: I) -> ProducerOutcome
    where
        I: IntoIterator<Item = Result<AudioBlock, DecodeError>>,
    {
        let mut delivered = 0;

        for block in blocks {
            let block = match block {
                Ok(block) => block,
                Err(e) => {
                    error!(path = ?self.path, err = %e, blocks = delivered, "Error decoding audio file");
                    return ProducerOutcome::Failed(e);
                }
            };

            if let Err(stalled) = self.deliver(QueueItem::Block(block)) {
                return self.stalled(stalled, delivered);
            }
            delivered += 1;
        }

        if let Err(stalled) = self.deliver(QueueItem::EndOfStream) {
            return self.stalled(stalled, delivered);
        }

        info!(path = ?self.path, blocks = delivered, "Finished queueing file");
        ProducerOutcome::Finished { blocks: delivered }
    }

    fn deliver(&self, item: QueueItem) -> Result<(), Stalled> {
        if !self.state.is_current(&self.queue) {
            return Err(Stalled::Superseded);
        }

        let mut item = match self.queue.try_push(item) {
            Ok(()) => return Ok(()),
            Err(e) => e.into_item(),
        };

        let deadline = Instant::now() + self.push_timeout;
        loop {
            if !self.state.is_current(&self.queue) {
                return Err(Stalled::Superseded);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Stalled::TimedOut);
            }

            match self.queue.push(item, remaining.min(STALE_CHECK_INTERVAL)) {
                Ok(()) => return Ok(()),
                Err(e) => item = e.into_item(),
            }
        }
    }

    fn stalled(&self, stalled: Stalled, blocks: usize) -> ProducerOutcome {
        match stalled {
            Stalled::Superseded => {
                debug!(path = ?self.path, blocks, "Queue replaced, abandoning file");
                ProducerOutcome::Superseded { blocks }
            }
            Stalled::TimedOut => {
                debug!(path = ?self.path, blocks, "Timed out waiting for queue space");
                ProducerOutcome::TimedOut { blocks }
            }
        }
    }
}
