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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use midiboard::audio::sample_source::FileDecoder;
use midiboard::config::Board;
use midiboard::playback::{PlaybackController, PlaybackState};
use midiboard::playsync::{StopHandle, StopReason};
use midiboard::render::Renderer;
use midiboard::resolver::FileResolver;
use midiboard::{device, midi};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=MIDI soundboard

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/midiboard
ExecStart=/usr/local/bin/midiboard start "$MIDIBOARD_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=midiboard.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI driven soundboard."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Prints which file each note plays.
    Notes {
        /// The path to the board config.
        config_path: String,
    },
    /// Start will start the soundboard and run until interrupted.
    Start {
        /// The path to the board config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = device::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Notes { config_path } => {
            let board = Board::deserialize(&PathBuf::from(config_path))?;
            let resolver = resolver(&board);
            let files = resolver.list()?;

            if files.is_empty() {
                println!("No files found in {}.", resolver.directory().display());
                return Ok(());
            }

            println!("Notes:");
            for (note, file) in (resolver.base_note() as usize..=127).zip(files.iter()) {
                println!("- {:3} -> {}", note, file.display());
            }
            let unreachable = files.len().saturating_sub(128 - resolver.base_note() as usize);
            if unreachable > 0 {
                println!("({} files are past the last MIDI note)", unreachable);
            }
        }
        Commands::Start { config_path } => {
            let board = Board::deserialize(&PathBuf::from(config_path))?;
            let reason = start(board).await?;
            info!(reason = %reason, "Stopped.");
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}

fn resolver(board: &Board) -> FileResolver {
    FileResolver::new(board.sound_directory().to_path_buf(), board.base_note())
}

/// Runs the board until Ctrl-C or until the engine stops itself.
async fn start(board: Board) -> Result<StopReason, Box<dyn Error>> {
    let stop = StopHandle::new();
    let state = Arc::new(PlaybackState::new(board.queue_capacity(), stop.clone())?);
    let controller = PlaybackController::new(
        resolver(&board),
        Arc::new(FileDecoder),
        state.clone(),
        board.block_format(),
        board.push_timeout()?,
    );
    let renderer = Renderer::new(controller, board.midi_channel());

    let (midi_tx, midi_rx) = crossbeam_channel::bounded(midi::EVENT_QUEUE_SIZE);
    let midi_device = match board.midi_device() {
        Some(name) => {
            let midi_device = midi::get_device(name)?;
            midi_device.watch_events(midi_tx)?;
            info!(midi_device = %midi_device.name(), "Watching MIDI input.");
            Some(midi_device)
        }
        None => {
            warn!("No MIDI device configured, nothing will trigger playback.");
            None
        }
    };

    let device = device::get_device(&board)?;
    info!(
        device = %device,
        sound_directory = ?board.sound_directory(),
        "Starting soundboard."
    );
    let session = device.start(Box::new(renderer), midi_rx, stop.clone())?;
    println!("Press Ctrl+C to stop");

    let waiter = {
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || stop.wait())
    };
    let reason = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            println!("\nInterrupted by user");
            StopReason::Interrupted
        }
        reason = waiter => reason?,
    };

    // Wakes the waiter if Ctrl-C won.
    state.stop(reason.clone());
    drop(session);
    if let Some(midi_device) = midi_device {
        midi_device.stop_watch_events();
    }

    Ok(reason)
}
