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
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::playback::BlockFormat;

const DEFAULT_AUDIO_DEVICE: &str = "default";
const DEFAULT_BASE_NOTE: u8 = 48;
const DEFAULT_MIDI_CHANNEL: u8 = 0;
const DEFAULT_BLOCK_SIZE: usize = 1024;
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: usize = 2;
const DEFAULT_QUEUE_CAPACITY: usize = 20000;

/// Prefix of environment variables that override file values, e.g.
/// `MIDIBOARD_AUDIO_DEVICE`.
const ENV_PREFIX: &str = "MIDIBOARD";

/// The configuration for the soundboard.
#[derive(Deserialize, Clone, Debug)]
pub struct Board {
    /// The directory whose sorted listing maps notes to files.
    sound_directory: PathBuf,

    /// The audio output device. Names starting with "mock" select the mock device.
    audio_device: Option<String>,

    /// The MIDI input port. Without one, the board only plays what it is sent
    /// programmatically.
    midi_device: Option<String>,

    /// The note mapped to the first file (default: 48).
    base_note: Option<u8>,

    /// The zero-based MIDI channel listened to (default: 0).
    midi_channel: Option<u8>,

    /// Frames per render block (default: 1024).
    block_size: Option<usize>,

    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Output channel count (default: 2).
    channels: Option<usize>,

    /// Blocks per playback queue (default: 20000).
    queue_capacity: Option<usize>,

    /// How long a producer waits on a full queue before giving up. Defaults to
    /// the time it takes to play a full queue.
    push_timeout: Option<String>,
}

impl Board {
    /// Creates a board configuration with every optional value at its default.
    pub fn new(sound_directory: PathBuf) -> Board {
        Board {
            sound_directory,
            audio_device: None,
            midi_device: None,
            base_note: None,
            midi_channel: None,
            block_size: None,
            sample_rate: None,
            channels: None,
            queue_capacity: None,
            push_timeout: None,
        }
    }

    /// Loads and validates the board configuration from a YAML file, applying
    /// environment overrides.
    pub fn deserialize(path: &Path) -> Result<Board, ConfigError> {
        Board::from_config(
            Config::builder()
                .add_source(File::from(path))
                .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
                .build()?,
        )
    }

    /// Deserializes and validates an already built config.
    pub fn from_config(config: Config) -> Result<Board, ConfigError> {
        let board = config.try_deserialize::<Board>()?;
        board.validate()?;
        Ok(board)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("block_size", self.block_size() as u64),
            ("sample_rate", self.sample_rate() as u64),
            ("channels", self.channels() as u64),
            ("queue_capacity", self.queue_capacity() as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
        }
        if self.base_note() > 127 {
            return Err(ConfigError::Invalid(format!(
                "base_note {} is not a MIDI note",
                self.base_note()
            )));
        }
        if self.midi_channel() > 15 {
            return Err(ConfigError::Invalid(format!(
                "midi_channel {} is out of range (0-15)",
                self.midi_channel()
            )));
        }
        self.push_timeout()?;
        Ok(())
    }

    pub fn sound_directory(&self) -> &Path {
        &self.sound_directory
    }

    pub fn audio_device(&self) -> &str {
        self.audio_device.as_deref().unwrap_or(DEFAULT_AUDIO_DEVICE)
    }

    pub fn midi_device(&self) -> Option<&str> {
        self.midi_device.as_deref()
    }

    pub fn base_note(&self) -> u8 {
        self.base_note.unwrap_or(DEFAULT_BASE_NOTE)
    }

    pub fn midi_channel(&self) -> u8 {
        self.midi_channel.unwrap_or(DEFAULT_MIDI_CHANNEL)
    }

    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn channels(&self) -> usize {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    /// The block layout the renderer and producers share.
    pub fn block_format(&self) -> BlockFormat {
        BlockFormat {
            block_frames: self.block_size(),
            channels: self.channels(),
            sample_rate: self.sample_rate(),
        }
    }

    /// Returns the producer push timeout.
    pub fn push_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.push_timeout {
            Some(push_timeout) => Ok(DurationString::from_string(push_timeout.clone())
                .map_err(|e| ConfigError::Invalid(format!("push_timeout: {}", e)))?
                .into()),
            None => Ok(self.block_format().duration_of(self.queue_capacity())),
        }
    }
}
