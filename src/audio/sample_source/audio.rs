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
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_codecs;
use symphonia::default::get_probe;
use tracing::warn;

use super::error::DecodeError;
use super::traits::SampleSource;

/// A sample source that reads audio files (WAV, MP3, FLAC, etc.) through symphonia
/// and hands out planar f32 chunks.
pub struct AudioSampleSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    is_finished: bool,
    /// Decoded frames not yet handed out, one Vec per channel.
    pending: Vec<Vec<f32>>,
    /// Next frame to hand out from `pending`.
    pending_position: usize,
    channels: u16,
    sample_rate: u32,
    duration: Option<Duration>,
    /// Frame count from the container, if it knows one.
    total_frames: Option<u64>,
    /// Frames decoded so far, handed out or pending.
    decoded_frames: u64,
}

impl SampleSource for AudioSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, DecodeError> {
        let channels = self.channels as usize;
        if output.len() != channels {
            return Err(DecodeError::ChannelMismatch {
                expected: channels,
                actual: output.len(),
            });
        }

        for channel in output.iter_mut() {
            channel.clear();
        }

        let mut written = 0;
        while written < max_frames {
            if self.pending_frames() == 0 && !self.refill()? {
                break;
            }

            let to_take = self.pending_frames().min(max_frames - written);
            let start = self.pending_position;
            for (out, pending) in output.iter_mut().zip(self.pending.iter()) {
                out.extend_from_slice(&pending[start..start + to_take]);
            }
            self.pending_position += to_take;
            written += to_take;
        }

        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl AudioSampleSource {
    /// Creates a new audio sample source from a file path.
    /// Supports WAV, MP3, FLAC, and other formats supported by symphonia.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        // Include the path in the error so the user sees which file failed.
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DecodeError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let file_path = path.to_string_lossy().to_string();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| DecodeError::Unsupported(format!("'{}': {}", file_path, e)))?;

        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                DecodeError::Unsupported(format!("'{}': no audio track found", file_path))
            })?;

        let track_id = track.id;
        let params = &track.codec_params;

        let sample_rate = params.sample_rate.ok_or_else(|| {
            DecodeError::Unsupported(format!("'{}': sample rate not specified", file_path))
        })?;
        let total_frames = params.n_frames;
        let duration = total_frames
            .map(|n_frames| Duration::from_secs_f64(n_frames as f64 / sample_rate as f64));

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs()
            .make(params, &decoder_opts)
            .map_err(|e| DecodeError::Unsupported(format!("'{}': {}", file_path, e)))?;

        // Prefer container/codec metadata for the channel count. If it's missing,
        // decode the first packet and take the count from the decoded buffer.
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let (channels, pending) = if channels > 0 {
            (channels, vec![Vec::new(); channels as usize])
        } else {
            Self::detect_channels_and_prime_buffer(
                format_reader.as_mut(),
                decoder.as_mut(),
                track_id,
                total_frames,
            )?
        };
        let decoded_frames = pending.first().map_or(0, |plane| plane.len() as u64);

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            is_finished: false,
            pending,
            pending_position: 0,
            channels,
            sample_rate,
            duration,
            total_frames,
            decoded_frames,
        })
    }

    fn pending_frames(&self) -> usize {
        self.pending
            .first()
            .map(|channel| channel.len().saturating_sub(self.pending_position))
            .unwrap_or(0)
    }

    /// Decodes the next packet into the pending buffers. Returns false at EOF.
    fn refill(&mut self) -> Result<bool, DecodeError> {
        if self.is_finished {
            return Ok(false);
        }

        let remaining = self
            .total_frames
            .map(|total| total.saturating_sub(self.decoded_frames));
        match Self::read_and_decode_next_packet_for_track(
            self.format_reader.as_mut(),
            self.decoder.as_mut(),
            self.track_id,
            remaining,
        )? {
            Some(planes) => {
                if planes.len() != self.channels as usize {
                    return Err(DecodeError::ChannelMismatch {
                        expected: self.channels as usize,
                        actual: planes.len(),
                    });
                }
                self.decoded_frames += planes.first().map_or(0, |plane| plane.len() as u64);
                self.pending = planes;
                self.pending_position = 0;
                Ok(true)
            }
            None => {
                self.is_finished = true;
                Ok(false)
            }
        }
    }

    /// Reads the next packet with common error handling.
    ///
    /// `remaining` is how many frames the container still owes, if it declared a
    /// length. Running out of packets (UnexpectedEof, or DecodeError from readers
    /// that report the end that way) is `Ok(None)` once nothing is owed, and an
    /// error while frames are still missing. ResetRequired is propagated so
    /// callers can reset the decoder.
    fn read_next_packet(
        format_reader: &mut dyn FormatReader,
        remaining: Option<u64>,
    ) -> Result<Option<Packet>, DecodeError> {
        let err = match format_reader.next_packet() {
            Ok(packet) => return Ok(Some(packet)),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                SymphoniaError::IoError(e)
            }
            Err(SymphoniaError::DecodeError(reason)) => SymphoniaError::DecodeError(reason),
            Err(e) => return Err(DecodeError::AudioError(e)),
        };

        match remaining {
            Some(0) => Ok(None),
            Some(remaining) => {
                warn!(remaining, err = %err, "File ended early");
                Err(DecodeError::AudioError(err))
            }
            None => {
                if let SymphoniaError::DecodeError(reason) = err {
                    warn!(reason, "Container error with no known length, treating it as the end");
                }
                Ok(None)
            }
        }
    }

    /// Reads and decodes the next packet for the given track, resetting the decoder
    /// when asked to. Returns planar samples, or `Ok(None)` at EOF.
    fn read_and_decode_next_packet_for_track(
        format_reader: &mut dyn FormatReader,
        decoder: &mut dyn symphonia::core::codecs::Decoder,
        track_id: u32,
        remaining: Option<u64>,
    ) -> Result<Option<Vec<Vec<f32>>>, DecodeError> {
        loop {
            let packet = match Self::read_next_packet(format_reader, remaining) {
                Ok(Some(packet)) => packet,
                Ok(None) => return Ok(None),
                Err(DecodeError::AudioError(SymphoniaError::ResetRequired)) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    decoder.decode(&packet)?
                }
                Err(e) => return Err(DecodeError::AudioError(e)),
            };

            // Header packets (e.g. Ogg/Vorbis) decode to zero frames; keep reading.
            let planes = Self::decode_buffer_to_f32(decoded);
            if planes.first().is_some_and(|plane| !plane.is_empty()) {
                return Ok(Some(planes));
            }
        }
    }

    /// When codec/channel metadata is missing, decode the first audio packet and
    /// derive the channel count from it. The decoded samples become the initial
    /// pending buffer.
    fn detect_channels_and_prime_buffer(
        format_reader: &mut dyn FormatReader,
        decoder: &mut dyn symphonia::core::codecs::Decoder,
        track_id: u32,
        total_frames: Option<u64>,
    ) -> Result<(u16, Vec<Vec<f32>>), DecodeError> {
        match Self::read_and_decode_next_packet_for_track(
            format_reader,
            decoder,
            track_id,
            total_frames,
        )? {
            Some(planes) => Ok((planes.len() as u16, planes)),
            None => Err(DecodeError::Unsupported(
                "channels not specified".to_string(),
            )),
        }
    }

    /// Converts a decoded AudioBufferRef to planar f32 samples.
    fn decode_buffer_to_f32(decoded: AudioBufferRef) -> Vec<Vec<f32>> {
        match decoded {
            AudioBufferRef::F32(buf) => Self::convert_planes(&buf, |sample| sample),
            AudioBufferRef::F64(buf) => Self::convert_planes(&buf, |sample| sample as f32),
            AudioBufferRef::S8(buf) => Self::convert_planes(&buf, Self::scale_s8),
            AudioBufferRef::S16(buf) => Self::convert_planes(&buf, Self::scale_s16),
            AudioBufferRef::S24(buf) => {
                Self::convert_planes(&buf, |sample| Self::scale_s24(sample.inner()))
            }
            AudioBufferRef::S32(buf) => Self::convert_planes(&buf, Self::scale_s32),
            AudioBufferRef::U8(buf) => Self::convert_planes(&buf, Self::scale_u8),
            AudioBufferRef::U16(buf) => Self::convert_planes(&buf, Self::scale_u16),
            AudioBufferRef::U24(buf) => {
                Self::convert_planes(&buf, |sample| Self::scale_u24(sample.inner()))
            }
            AudioBufferRef::U32(buf) => Self::convert_planes(&buf, Self::scale_u32),
        }
    }

    fn convert_planes<T, F>(buf: &AudioBuffer<T>, convert: F) -> Vec<Vec<f32>>
    where
        T: symphonia::core::sample::Sample,
        F: Fn(T) -> f32,
    {
        let frames = buf.frames();
        buf.planes()
            .planes()
            .iter()
            .map(|plane| plane[..frames].iter().map(|&sample| convert(sample)).collect())
            .collect()
    }

    // Scaling helpers for all integer formats.

    #[inline]
    pub(crate) fn scale_s8(sample: i8) -> f32 {
        sample as f32 / (1i64 << 7) as f32
    }

    #[inline]
    pub(crate) fn scale_s16(sample: i16) -> f32 {
        sample as f32 / (1i64 << 15) as f32
    }

    #[inline]
    pub(crate) fn scale_s24(sample: i32) -> f32 {
        sample as f32 / (1i64 << 23) as f32
    }

    #[inline]
    pub(crate) fn scale_s32(sample: i32) -> f32 {
        sample as f32 / (1i64 << 31) as f32
    }

    #[inline]
    pub(crate) fn scale_u8(sample: u8) -> f32 {
        (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u16(sample: u16) -> f32 {
        (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u24(sample: u32) -> f32 {
        let max = (1u32 << 24) - 1;
        (sample as f32 / max as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u32(sample: u32) -> f32 {
        (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    fn read_all(source: &mut AudioSampleSource, chunk: usize) -> Vec<Vec<f32>> {
        let channels = source.channel_count() as usize;
        let mut all = vec![Vec::new(); channels];
        let mut planar = vec![Vec::new(); channels];
        loop {
            let read = source.next_chunk(&mut planar, chunk).unwrap();
            if read == 0 {
                break;
            }
            for (all, chunk) in all.iter_mut().zip(planar.iter()) {
                assert_eq!(chunk.len(), read);
                all.extend_from_slice(chunk);
            }
        }
        all
    }

    #[test]
    fn test_scale_helpers() {
        assert_eq!(AudioSampleSource::scale_s16(0), 0.0);
        assert_eq!(AudioSampleSource::scale_s16(i16::MIN), -1.0);
        assert_eq!(AudioSampleSource::scale_s8(i8::MIN), -1.0);
        assert_eq!(AudioSampleSource::scale_s24(-(1 << 23)), -1.0);
        assert_eq!(AudioSampleSource::scale_s32(i32::MIN), -1.0);
        assert_eq!(AudioSampleSource::scale_u8(u8::MAX), 1.0);
        assert_eq!(AudioSampleSource::scale_u8(0), -1.0);
        assert_eq!(AudioSampleSource::scale_u16(u16::MAX), 1.0);
        assert_eq!(AudioSampleSource::scale_u24((1 << 24) - 1), 1.0);
        assert_eq!(AudioSampleSource::scale_u32(0), -1.0);
    }

    #[test]
    fn test_reads_float_wav_planar() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("stereo.wav");
        let left: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        write_wav(path.clone(), vec![left.clone(), right.clone()], 44100).unwrap();

        let mut source = AudioSampleSource::from_file(&path).unwrap();
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.sample_rate(), 44100);

        let all = read_all(&mut source, 64);
        assert_eq!(all[0], left);
        assert_eq!(all[1], right);
    }

    #[test]
    fn test_chunk_sizes_do_not_change_content() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("mono.wav");
        let samples: Vec<f32> = (0..777).map(|i| (i % 50) as f32 / 50.0).collect();
        write_wav(path.clone(), vec![samples.clone()], 48000).unwrap();

        for chunk in [1, 7, 256, 4096] {
            let mut source = AudioSampleSource::from_file(&path).unwrap();
            assert_eq!(read_all(&mut source, chunk)[0], samples);
        }
    }

    #[test]
    fn test_wrong_output_channel_count() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("mono.wav");
        write_wav(path.clone(), vec![vec![0.5f32; 16]], 44100).unwrap();

        let mut source = AudioSampleSource::from_file(&path).unwrap();
        let mut planar = vec![Vec::new(); 2];
        assert!(matches!(
            source.next_chunk(&mut planar, 16),
            Err(DecodeError::ChannelMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_truncated_file_is_an_error() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("truncated.wav");
        write_wav(path.clone(), vec![vec![0.25f32; 10000]], 44100).unwrap();
        let length = std::fs::metadata(&path).unwrap().len();
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(length / 2)
            .unwrap();

        let mut source = AudioSampleSource::from_file(&path).unwrap();
        let mut planar = vec![Vec::new(); 1];
        let mut frames = 0;
        let result = loop {
            match source.next_chunk(&mut planar, 1024) {
                Ok(0) => break Ok(()),
                Ok(read) => frames += read,
                Err(e) => break Err(e),
            }
        };
        assert!(
            matches!(result, Err(DecodeError::AudioError(_))),
            "read {} frames without an error",
            frames
        );
        assert!(frames < 10000);
    }

    #[test]
    fn test_missing_file() {
        let result = AudioSampleSource::from_file("/definitely/not/here.wav");
        assert!(matches!(result, Err(DecodeError::IoError(_))));
    }

    #[test]
    fn test_unsupported_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("notes.txt");
        std::fs::write(&path, "this is not audio").unwrap();

        let result = AudioSampleSource::from_file(&path);
        assert!(matches!(result, Err(DecodeError::Unsupported(_))));
    }
}
