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
use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, info, span, warn, Level};

use super::{DeviceError, Session};
use crate::audio::OutputBuffers;
use crate::playback::BlockFormat;
use crate::playsync::{StopHandle, StopReason};
use crate::render::{AudioRenderer, RawMidi, RenderStatus};

/// The most MIDI messages handed to the renderer in one callback. Anything
/// beyond this waits for the next block.
const MAX_MIDI_PER_BLOCK: usize = 64;

/// The device name that falls back to the host's default output.
const DEFAULT_DEVICE: &str = "default";

/// Events from the stream's error callback, delivered to the renderer on the
/// audio thread.
#[derive(Debug)]
enum Notification {
    Xrun,
    Shutdown(String),
}

/// Queues a notification for the audio thread without blocking the error
/// callback. Returns false if it was dropped.
fn notify(sender: &Sender<Notification>, notification: Notification) -> bool {
    match sender.try_send(notification) {
        Ok(()) => true,
        Err(e) => {
            debug!(err = %e, "Dropped stream notification.");
            false
        }
    }
}

/// A cpal output device.
pub struct Device {
    name: String,
    max_channels: u16,
    host_id: cpal::HostId,
    device: cpal::Device,
    format: BlockFormat,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, DeviceError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that have at least one output channel.
    fn list_cpal_devices() -> Result<Vec<Device>, DeviceError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let max_channels = match device.supported_output_configs() {
                    Ok(configs) => configs.map(|config| config.channels()).max().unwrap_or(0),
                    Err(_) => continue,
                };

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        format: BlockFormat {
                            block_frames: 0,
                            channels: 0,
                            sample_rate: 0,
                        },
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. "default" selects the default output of the
    /// default host unless a device carries that exact name.
    pub fn get(name: &str, format: BlockFormat) -> Result<Device, DeviceError> {
        let found = Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name);

        let mut device = match found {
            Some(device) => device,
            None if name == DEFAULT_DEVICE => Device::default_output()?,
            None => return Err(DeviceError::NotFound(name.to_string())),
        };

        if format.channels > device.max_channels as usize {
            return Err(DeviceError::TooManyChannels {
                name: device.name,
                max: device.max_channels,
                requested: format.channels,
            });
        }
        device.format = format;
        Ok(device)
    }

    fn default_output() -> Result<Device, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| DeviceError::NotFound(DEFAULT_DEVICE.to_string()))?;
        let max_channels = device
            .supported_output_configs()?
            .map(|config| config.channels())
            .max()
            .unwrap_or(0);

        Ok(Device {
            name: device.name()?,
            max_channels,
            host_id: host.id(),
            device,
            format: BlockFormat {
                block_frames: 0,
                channels: 0,
                sample_rate: 0,
            },
        })
    }
}

impl super::Device for Device {
    fn start(
        &self,
        mut renderer: Box<dyn AudioRenderer>,
        midi: Receiver<RawMidi>,
        stop: StopHandle,
    ) -> Result<Session, DeviceError> {
        let span = span!(Level::INFO, "start (cpal)");
        let _enter = span.enter();

        let format = self.format;
        let channels = format.channels;
        let config = cpal::StreamConfig {
            channels: channels as u16,
            sample_rate: format.sample_rate as cpal::SampleRate,
            buffer_size: cpal::BufferSize::Fixed(format.block_frames as u32),
        };

        let (notify_tx, notify_rx) = bounded::<Notification>(16);
        let mut outputs = OutputBuffers::new(channels, format.block_frames);
        let mut pending: Vec<RawMidi> = Vec::with_capacity(MAX_MIDI_PER_BLOCK);
        let mut stopped = false;

        let stream = self.device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while let Ok(notification) = notify_rx.try_recv() {
                    match notification {
                        Notification::Xrun => renderer.xrun(None),
                        Notification::Shutdown(reason) => renderer.shutdown(&reason),
                    }
                }

                if stopped {
                    data.fill(0.0);
                    return;
                }

                pending.clear();
                pending.extend(midi.try_iter().take(MAX_MIDI_PER_BLOCK));

                let frames = data.len() / channels;
                if renderer.process(frames, &pending, &mut outputs) == RenderStatus::Stop {
                    stopped = true;
                }
                outputs.interleave_into(data);
            },
            move |err| match err {
                cpal::StreamError::DeviceNotAvailable => {
                    error!(err = %err, "Output device is no longer available");
                    let reason = err.to_string();
                    notify(&notify_tx, Notification::Shutdown(reason.clone()));
                    stop.stop(StopReason::DeviceShutdown(reason));
                }
                err => {
                    warn!(err = %err, "Output stream error");
                    notify(&notify_tx, Notification::Xrun);
                }
            },
            None,
        )?;
        stream.play()?;

        info!(
            device = self.name,
            channels,
            block_size = format.block_frames,
            sample_rate = format.sample_rate,
            "Output stream started"
        );
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_drops_when_full() {
        let (tx, rx) = bounded(1);
        assert!(notify(&tx, Notification::Xrun));
        assert!(!notify(&tx, Notification::Shutdown("gone".to_string())));
        assert!(matches!(rx.try_recv(), Ok(Notification::Xrun)));
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!notify(&tx, Notification::Xrun));
    }
}
