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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Why the engine stopped.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StopReason {
    #[error("host delivered {actual} frames, expected a block of {expected}")]
    BlockSizeMismatch { expected: usize, actual: usize },
    #[error("audio device shut down: {0}")]
    DeviceShutdown(String),
    #[error("interrupted")]
    Interrupted,
}

struct Inner {
    /// Lock-free view of the stop state for the render thread.
    stopped: AtomicBool,
    reason: Mutex<Option<StopReason>>,
    condvar: Condvar,
}

/// A stop handle is shared by the render callback, the device and the main thread.
/// Anything may request a stop; the main thread waits on it to exit.
#[derive(Clone)]
pub struct StopHandle {
    inner: Arc<Inner>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    /// Creates a new stop handle.
    pub fn new() -> StopHandle {
        StopHandle {
            inner: Arc::new(Inner {
                stopped: AtomicBool::new(false),
                reason: Mutex::new(None),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Returns true once a stop has been requested. Never blocks.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// The reason for the first stop request, if any.
    pub fn reason(&self) -> Option<StopReason> {
        self.inner.reason.lock().clone()
    }

    /// Requests a stop. The first reason wins; later requests are ignored.
    pub fn stop(&self, reason: StopReason) {
        let mut current = self.inner.reason.lock();
        if current.is_none() {
            *current = Some(reason);
            self.inner.stopped.store(true, Ordering::Release);
            self.inner.condvar.notify_all();
        }
    }

    /// Blocks until a stop is requested and returns its reason.
    pub fn wait(&self) -> StopReason {
        let mut reason = self.inner.reason.lock();
        self.inner
            .condvar
            .wait_while(&mut reason, |reason| reason.is_none());
        reason.clone().unwrap_or(StopReason::Interrupted)
    }

    /// Blocks until a stop is requested or the timeout elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<StopReason> {
        let mut reason = self.inner.reason.lock();
        self.inner
            .condvar
            .wait_while_for(&mut reason, |reason| reason.is_none(), timeout);
        reason.clone()
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;

    #[test]
    fn test_stop_handle_stopped() {
        let stop = StopHandle::new();
        assert!(!stop.is_stopped());

        let join = {
            let stop = stop.clone();
            thread::spawn(move || stop.wait())
        };

        stop.stop(StopReason::Interrupted);
        assert_eq!(join.join().unwrap(), StopReason::Interrupted);
        assert!(stop.is_stopped());
    }

    #[test]
    fn test_first_reason_wins() {
        let stop = StopHandle::new();
        stop.stop(StopReason::BlockSizeMismatch {
            expected: 1024,
            actual: 512,
        });
        stop.stop(StopReason::Interrupted);

        assert_eq!(
            stop.reason(),
            Some(StopReason::BlockSizeMismatch {
                expected: 1024,
                actual: 512
            })
        );
    }

    #[test]
    fn test_wait_timeout_elapses() {
        let stop = StopHandle::new();
        assert_eq!(stop.wait_timeout(Duration::from_millis(10)), None);
        assert!(!stop.is_stopped());
    }
}
