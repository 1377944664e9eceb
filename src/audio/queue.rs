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
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{
    bounded, Receiver, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use thiserror::Error;

use super::block::AudioBlock;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(0);

/// An item carried from a producer to the render callback.
#[derive(Debug)]
pub enum QueueItem {
    Block(AudioBlock),
    /// No further blocks will follow on this queue.
    EndOfStream,
}

/// The result of a non-blocking pop.
#[derive(Debug)]
pub enum Popped {
    Block(AudioBlock),
    EndOfStream,
    Empty,
}

/// A push that didn't land. The item is handed back to the caller.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("timed out waiting for queue space")]
    Timeout(QueueItem),
    #[error("queue is full")]
    Full(QueueItem),
}

impl PushError {
    pub fn into_item(self) -> QueueItem {
        match self {
            PushError::Timeout(item) | PushError::Full(item) => item,
        }
    }
}

/// A bounded FIFO of audio blocks between one producer and the render callback.
///
/// The queue owns both ends of its channel so it never disconnects. A queue is
/// replaced rather than cleared: whoever holds an old queue keeps a valid object
/// that simply isn't read anymore.
pub struct PlaybackQueue {
    id: u64,
    capacity: usize,
    sender: Sender<QueueItem>,
    receiver: Receiver<QueueItem>,
}

impl PlaybackQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            sender,
            receiver,
        }
    }

    /// Unique identity of this queue instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Pushes an item, blocking up to `timeout` for space.
    pub fn push(&self, item: QueueItem, timeout: Duration) -> Result<(), PushError> {
        self.sender
            .send_timeout(item, timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(item) | SendTimeoutError::Disconnected(item) => {
                    PushError::Timeout(item)
                }
            })
    }

    /// Pushes an item without blocking.
    pub fn try_push(&self, item: QueueItem) -> Result<(), PushError> {
        self.sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) | TrySendError::Disconnected(item) => PushError::Full(item),
        })
    }

    /// Pops the oldest item without blocking. Safe to call from the render thread.
    pub fn try_pop(&self) -> Popped {
        match self.receiver.try_recv() {
            Ok(QueueItem::Block(block)) => Popped::Block(block),
            Ok(QueueItem::EndOfStream) => Popped::EndOfStream,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Popped::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(value: f32) -> AudioBlock {
        AudioBlock::from_planar(&[vec![value; 2]])
    }

    #[test]
    fn test_fifo_order() {
        let queue = PlaybackQueue::new(4);
        queue.try_push(QueueItem::Block(block(1.0))).unwrap();
        queue.try_push(QueueItem::Block(block(2.0))).unwrap();
        queue.try_push(QueueItem::EndOfStream).unwrap();
        assert_eq!(queue.len(), 3);

        assert!(matches!(queue.try_pop(), Popped::Block(b) if b.channel(0)[0] == 1.0));
        assert!(matches!(queue.try_pop(), Popped::Block(b) if b.channel(0)[0] == 2.0));
        assert!(matches!(queue.try_pop(), Popped::EndOfStream));
        assert!(matches!(queue.try_pop(), Popped::Empty));
    }

    #[test]
    fn test_full_queue_returns_item() {
        let queue = PlaybackQueue::new(1);
        queue.try_push(QueueItem::Block(block(1.0))).unwrap();

        let err = queue.try_push(QueueItem::Block(block(2.0))).unwrap_err();
        assert!(matches!(err, PushError::Full(_)));
        assert!(matches!(err.into_item(), QueueItem::Block(b) if b.channel(0)[0] == 2.0));

        let err = queue
            .push(QueueItem::EndOfStream, Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, PushError::Timeout(QueueItem::EndOfStream)));
        assert_eq!(queue.len(), queue.capacity());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = PlaybackQueue::new(1);
        let b = PlaybackQueue::new(1);
        assert_ne!(a.id(), b.id());
    }
}
