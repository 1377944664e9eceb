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

//! Audio hosts. A device owns the real-time thread and drives an
//! [`AudioRenderer`] once per block.

use std::any::Any;
use std::{fmt, sync::Arc};

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::config::Board;
use crate::playsync::StopHandle;
use crate::render::{AudioRenderer, RawMidi};

pub mod cpal;
pub mod mock;

/// Keeps a started device running. Dropping it stops the stream.
pub type Session = Box<dyn Any>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no device found with name {0}")]
    NotFound(String),
    #[error("device {name} supports at most {max} channels, {requested} requested")]
    TooManyChannels {
        name: String,
        max: u16,
        requested: usize,
    },
    #[error("unable to reach audio host: {0}")]
    Host(#[from] ::cpal::HostUnavailable),
    #[error("unable to list devices: {0}")]
    Devices(#[from] ::cpal::DevicesError),
    #[error("unable to read device name: {0}")]
    Name(#[from] ::cpal::DeviceNameError),
    #[error("unable to query device configurations: {0}")]
    Configs(#[from] ::cpal::SupportedStreamConfigsError),
    #[error("unable to build output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),
    #[error("unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An audio output device.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Starts rendering. `midi` carries the messages for upcoming blocks and
    /// `stop` is signalled if the device goes away.
    fn start(
        &self,
        renderer: Box<dyn AudioRenderer>,
        midi: Receiver<RawMidi>,
        stop: StopHandle,
    ) -> Result<Session, DeviceError>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, DeviceError> {
    cpal::Device::list()
}

/// Gets the output device configured for the board.
pub fn get_device(board: &Board) -> Result<Arc<dyn Device>, DeviceError> {
    let name = board.audio_device();
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name, board.block_format())));
    };

    Ok(Arc::new(cpal::Device::get(name, board.block_format())?))
}
