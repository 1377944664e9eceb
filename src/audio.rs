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

//! Audio data plumbing: fixed-size blocks, the decoder adapter that produces
//! them, the bounded queue that carries them to the render thread, and the
//! output buffers they are copied into.

pub mod block;
pub mod blocks;
pub mod output;
pub mod queue;
pub mod sample_source;

pub use block::AudioBlock;
pub use blocks::BlockReader;
pub use output::OutputBuffers;
pub use queue::{PlaybackQueue, Popped, PushError, QueueItem};
