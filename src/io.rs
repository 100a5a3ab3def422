//! WAV decode/encode.
//!
//! Decoding accepts integer PCM (8 to 32 bit) and 32-bit float; every sample
//! is scaled to [-1, 1]. Output is always 32-bit float stereo so gains above
//! unity survive until whoever plays the file decides how to clip.

use crate::error::{EnhanceError, Result};
use crate::AudioBuffer;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info};
use std::io::Read;
use std::path::Path;

pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path)
        .map_err(|e| EnhanceError::Load(format!("{}: {}", path.display(), e)))?;
    let buf = decode(reader)?;
    info!(
        "loaded '{}': {} frames @ {} Hz ({:.2} s)",
        path.display(),
        buf.len(),
        buf.sample_rate,
        buf.duration_secs()
    );
    Ok(buf)
}

/// Decode an already-open WAV stream.
pub fn decode<R: Read>(reader: WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(EnhanceError::Load("WAV header declares zero channels".into()));
    }
    debug!(
        "wav: {} ch, {} bit {:?}, {} Hz",
        channels, spec.bits_per_sample, spec.sample_format, spec.sample_rate
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| EnhanceError::Load(e.to_string()))?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(EnhanceError::Load(format!(
                    "unsupported bit depth {}",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| EnhanceError::Load(e.to_string()))?
        }
    };

    let frames = interleaved.len() / channels;
    let mut split = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &v) in split.iter_mut().zip(frame) {
            ch.push(v);
        }
    }
    AudioBuffer::from_channels(split, spec.sample_rate)
}

pub fn write_wav(path: &Path, buf: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: buf.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    let n = buf.len();
    for i in 0..n {
        writer.write_sample(buf.left.get(i).copied().unwrap_or(0.0))?;
        writer.write_sample(buf.right.get(i).copied().unwrap_or(0.0))?;
    }
    writer.finalize()?;
    info!("wrote '{}' ({} frames)", path.display(), n);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_int16(path: &Path, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut w = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn test_mono_int16_is_scaled_and_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_int16(&path, 1, &[0, 16384, -32768]);

        let buf = read_wav(&path).unwrap();
        assert_eq!(buf.sample_rate, 16000);
        assert_eq!(buf.left, vec![0.0, 0.5, -1.0]);
        assert_eq!(buf.left, buf.right);
    }

    #[test]
    fn test_stereo_is_deinterleaved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_int16(&path, 2, &[8192, -8192, 16384, 0]);

        let buf = read_wav(&path).unwrap();
        assert_eq!(buf.left, vec![0.25, 0.5]);
        assert_eq!(buf.right, vec![-0.25, 0.0]);
    }

    #[test]
    fn test_float_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let buf = AudioBuffer::stereo(vec![0.1, 1.5, -0.3], vec![0.0, -2.0, 0.7], 44100);

        write_wav(&path, &buf).unwrap();
        let back = read_wav(&path).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn test_garbage_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"definitely not a wav file").unwrap();
        assert!(matches!(read_wav(&path), Err(EnhanceError::Load(_))));

        let missing = dir.path().join("missing.wav");
        assert!(matches!(read_wav(&missing), Err(EnhanceError::Load(_))));
    }
}
