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
use std::thread;

use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use super::error::PlaybackError;
use crate::audio::{AudioBlock, PlaybackQueue, Popped};
use crate::playsync::{StopHandle, StopReason};

/// Slots in the channel that carries retired queues and blocks to the reaper.
const RETIRE_CAPACITY: usize = 1024;

/// Things the render thread is done with. Dropping them may free memory, so they
/// are dropped on the reaper thread instead.
enum Retired {
    Queue(Arc<PlaybackQueue>),
    Block(AudioBlock),
}

/// Process-wide playback state: the queue the render callback currently reads
/// and the stop flag.
///
/// The current queue is an atomically swappable handle. Readers never see a
/// partially replaced queue, and replacing it is the only way pending audio is
/// discarded.
pub struct PlaybackState {
    current: ArcSwap<PlaybackQueue>,
    capacity: usize,
    stop: StopHandle,
    retire: Sender<Retired>,
    /// Empty queues built ahead of time by the reaper.
    spares: Receiver<Arc<PlaybackQueue>>,
}

impl PlaybackState {
    /// Creates the state with an empty current queue and starts its reaper thread.
    pub fn new(capacity: usize, stop: StopHandle) -> Result<PlaybackState, PlaybackError> {
        let (retire, retired) = bounded(RETIRE_CAPACITY);
        let (spare_sender, spares) = bounded(1);

        thread::Builder::new()
            .name("midiboard-reaper".into())
            .spawn(move || reap(capacity, retired, spare_sender))
            .map_err(|source| PlaybackError::Spawn {
                what: "reaper",
                source,
            })?;

        Ok(PlaybackState {
            current: ArcSwap::from_pointee(PlaybackQueue::new(capacity)),
            capacity,
            stop,
            retire,
            spares,
        })
    }

    /// The queue currently read by the render callback.
    pub fn current(&self) -> Arc<PlaybackQueue> {
        self.current.load_full()
    }

    /// Installs a fresh, empty queue and returns it. The previous queue is no
    /// longer read; any producer still writing to it sees it is stale.
    pub fn install_new(&self) -> Arc<PlaybackQueue> {
        let queue = self
            .spares
            .try_recv()
            .unwrap_or_else(|_| Arc::new(PlaybackQueue::new(self.capacity)));
        let old = self.current.swap(queue.clone());
        self.retire(Retired::Queue(old));
        queue
    }

    /// Returns true if the given queue is the one being read.
    pub fn is_current(&self, queue: &Arc<PlaybackQueue>) -> bool {
        Arc::ptr_eq(&*self.current.load(), queue)
    }

    /// Pops from the current queue without blocking.
    pub fn try_pop(&self) -> Popped {
        self.current.load().try_pop()
    }

    /// Hands a block the render thread has finished copying to the reaper.
    pub fn retire_block(&self, block: AudioBlock) {
        self.retire(Retired::Block(block));
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }

    pub fn is_running(&self) -> bool {
        !self.stop.is_stopped()
    }

    /// Discards pending audio and signals the process to stop.
    pub fn stop(&self, reason: StopReason) {
        self.install_new();
        self.stop.stop(reason);
    }

    fn retire(&self, item: Retired) {
        // A full retire channel means the reaper is behind. Dropping inline is
        // the only option left.
        if let Err(TrySendError::Full(item) | TrySendError::Disconnected(item)) =
            self.retire.try_send(item)
        {
            drop(item);
        }
    }
}

/// Drops retired items and keeps one spare queue ready. Exits once the playback
/// state is dropped.
fn reap(capacity: usize, retired: Receiver<Retired>, spares: Sender<Arc<PlaybackQueue>>) {
    refill(capacity, &spares);
    for item in retired.iter() {
        if let Retired::Queue(queue) = &item {
            debug!(queue = queue.id(), pending = queue.len(), "Retiring queue");
        }
        drop(item);
        refill(capacity, &spares);
    }
    debug!("Reaper exiting");
}

fn refill(capacity: usize, spares: &Sender<Arc<PlaybackQueue>>) {
    if spares.is_empty() {
        if let Err(TrySendError::Disconnected(_)) =
            spares.try_send(Arc::new(PlaybackQueue::new(capacity)))
        {
            warn!("Playback state dropped before reaper");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::QueueItem;

    fn state() -> PlaybackState {
        PlaybackState::new(8, StopHandle::new()).unwrap()
    }

    #[test]
    fn test_install_new_replaces_current() {
        let state = state();
        let first = state.current();
        assert!(state.is_current(&first));

        let second = state.install_new();
        assert!(!state.is_current(&first));
        assert!(state.is_current(&second));
        assert_ne!(first.id(), second.id());
        assert_eq!(second.capacity(), 8);
        assert!(second.is_empty());
    }

    #[test]
    fn test_old_queue_is_no_longer_read() {
        let state = state();
        let old = state.current();
        old.try_push(QueueItem::Block(AudioBlock::from_planar(&[vec![1.0]])))
            .unwrap();

        state.install_new();
        assert!(matches!(state.try_pop(), Popped::Empty));
        // The stale queue itself is still valid for whoever holds it.
        assert!(matches!(old.try_pop(), Popped::Block(_)));
    }

    #[test]
    fn test_stop_discards_and_signals() {
        let state = state();
        state
            .current()
            .try_push(QueueItem::EndOfStream)
            .unwrap();

        assert!(state.is_running());
        state.stop(StopReason::Interrupted);
        assert!(!state.is_running());
        assert!(matches!(state.try_pop(), Popped::Empty));
        assert_eq!(state.stop_handle().reason(), Some(StopReason::Interrupted));
    }

    #[test]
    fn test_many_installs_stay_unique() {
        let state = state();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(ids.insert(state.install_new().id()));
        }
    }
}
