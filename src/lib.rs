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

//! A MIDI-triggered soundboard.
//!
//! Note events select files from a sound directory. Each file is decoded on a
//! producer thread into fixed-size blocks that the real-time render callback
//! drains one block per period.

pub mod audio;
pub mod config;
pub mod device;
pub mod midi;
pub mod playback;
pub mod playsync;
pub mod render;
pub mod resolver;

#[cfg(test)]
mod testutil;
