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

//! Playback control: the process-wide queue handle, the producer threads that
//! fill queues, and the monophonic controller that starts and stops them.

pub mod controller;
pub mod error;
pub mod producer;
pub mod state;

pub use controller::{PlaybackController, Voice};
pub use error::PlaybackError;
pub use producer::{BlockFormat, PlaybackSession, ProducerOutcome};
pub use state::PlaybackState;
