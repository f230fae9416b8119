use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, CodecParameters, Decoder, DecoderOptions},
    errors::Error,
    formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
    units::Time,
};
use tracing::debug;

use super::{AudioDecoder, AudioFormat, DecodeError, PcmChunk};

/// File decoder backed by symphonia's format readers and codecs.
pub struct SymphoniaDecoder {
    reader: Box<dyn FormatReader>,
    codec: Box<dyn Decoder>,
    codec_params: CodecParameters,
    track_id: u32,
    format: AudioFormat,
    finished: bool,
}

impl SymphoniaDecoder {
    /// Open `path`, select its first audio track and prepare a codec for it.
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let file = File::open(path).map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|err| DecodeError::Probe(format!("{}: {err}", path.display())))?;
        let reader = probed.format;
        let track = reader
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let format = format_from_params(&codec_params)?;
        let codec = make_codec(&codec_params)?;
        debug!(
            "Opened {} ({}Hz, {}ch, duration {:?})",
            path.display(),
            format.sample_rate,
            format.channels,
            format.duration_seconds
        );
        Ok(Self {
            reader,
            codec,
            codec_params,
            track_id,
            format,
            finished: false,
        })
    }

    fn rebuild_codec(&mut self) -> Result<(), DecodeError> {
        debug!("Codec reset required; rebuilding decoder");
        self.codec = make_codec(&self.codec_params)?;
        Ok(())
    }

    fn note_output_spec(&mut self, sample_rate: u32, channels: u16) {
        if self.format.sample_rate != sample_rate || self.format.channels != channels {
            debug!(
                "Output format changed: {}Hz/{}ch -> {}Hz/{}ch",
                self.format.sample_rate, self.format.channels, sample_rate, channels
            );
            self.format.sample_rate = sample_rate;
            self.format.channels = channels;
        }
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn next_chunk(&mut self) -> Result<Option<PcmChunk>, DecodeError> {
        if self.finished {
            return Ok(None);
        }
        let packet = match self.reader.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => {
                self.finished = true;
                return Ok(None);
            }
            Err(Error::IoError(err)) => return Err(DecodeError::Io(err)),
            Err(Error::ResetRequired) => {
                self.rebuild_codec()?;
                return Ok(Some(PcmChunk::pending()));
            }
            Err(err) => return Err(DecodeError::Codec(err.to_string())),
        };
        if packet.track_id() != self.track_id {
            return Ok(Some(PcmChunk::pending()));
        }
        let decoded = match self.codec.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::DecodeError(reason)) => {
                debug!("Skipping undecodable packet: {reason}");
                return Ok(Some(PcmChunk::pending()));
            }
            Err(Error::ResetRequired) => {
                self.rebuild_codec()?;
                return Ok(Some(PcmChunk::pending()));
            }
            Err(err) => return Err(DecodeError::Codec(err.to_string())),
        };
        let spec = *decoded.spec();
        if decoded.frames() == 0 {
            return Ok(Some(PcmChunk::pending()));
        }
        let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples().to_vec();
        self.note_output_spec(spec.rate, spec.channels.count() as u16);
        Ok(Some(PcmChunk::new(samples)))
    }

    fn seek(&mut self, seconds: f64) -> Result<(), DecodeError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(DecodeError::Seek {
                seconds,
                reason: "timestamp must be a non-negative number".to_string(),
            });
        }
        self.reader
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time: Time::from(seconds),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|err| DecodeError::Seek {
                seconds,
                reason: err.to_string(),
            })?;
        self.codec.reset();
        self.finished = false;
        Ok(())
    }
}

fn format_from_params(params: &CodecParameters) -> Result<AudioFormat, DecodeError> {
    let sample_rate = params
        .sample_rate
        .filter(|rate| *rate > 0)
        .ok_or(DecodeError::MissingSampleRate)?;
    let channels = match params.channels.map(|channels| channels.count()) {
        Some(0) => return Err(DecodeError::UnsupportedChannels(0)),
        Some(count) => u16::try_from(count).map_err(|_| DecodeError::UnsupportedChannels(count))?,
        // Some containers only reveal the layout once the first packet decodes.
        None => 2,
    };
    let duration_seconds = params.n_frames.map(|frames| match params.time_base {
        Some(time_base) => {
            let time = time_base.calc_time(frames);
            time.seconds as f64 + time.frac
        }
        None => frames as f64 / sample_rate as f64,
    });
    Ok(AudioFormat {
        sample_rate,
        channels,
        duration_seconds,
    })
}

fn make_codec(params: &CodecParameters) -> Result<Box<dyn Decoder>, DecodeError> {
    symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .map_err(|err| DecodeError::Codec(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::decode::decode_all;
    use crate::analysis::progress::NoProgress;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_ramp_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for frame in 0..frames {
            for _ in 0..channels {
                writer.write_sample::<i16>((frame % 1_000) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn open_reads_format_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_ramp_wav(&path, 22_050, 2, 44_100);
        let decoder = SymphoniaDecoder::open(&path).unwrap();
        let format = decoder.format();
        assert_eq!(format.sample_rate, 22_050);
        assert_eq!(format.channels, 2);
        let duration = format.duration_seconds.unwrap();
        assert!((duration - 2.0).abs() < 1e-3);
    }

    #[test]
    fn decode_all_returns_every_interleaved_sample() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ramp.wav");
        write_ramp_wav(&path, 8_000, 1, 12_000);
        let mut decoder = SymphoniaDecoder::open(&path).unwrap();
        let decoded = decode_all(&mut decoder, &mut NoProgress).unwrap();
        assert_eq!(decoded.samples.len(), 12_000);
        assert_eq!(decoded.samples[999], 999);
        assert_eq!(decoded.samples[1_000], 0);
    }

    #[test]
    fn seek_resumes_decoding_near_the_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seek.wav");
        write_ramp_wav(&path, 8_000, 1, 40_000);
        let mut decoder = SymphoniaDecoder::open(&path).unwrap();
        decoder.seek(3.0).unwrap();
        let mut remaining = 0usize;
        while let Some(chunk) = decoder.next_chunk().unwrap() {
            remaining += chunk.len();
        }
        assert!(remaining < 24_000, "decoded {remaining} samples after seek");
        assert!(remaining > 8_000, "decoded {remaining} samples after seek");
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = TempDir::new().unwrap();
        let err = SymphoniaDecoder::open(&dir.path().join("absent.wav")).err().unwrap();
        assert!(matches!(err, DecodeError::Open { .. }));
    }

    #[test]
    fn non_audio_file_is_a_probe_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();
        let err = SymphoniaDecoder::open(&path).err().unwrap();
        assert!(matches!(err, DecodeError::Probe(_)));
    }
}
