//! Offline rendering and WAV output.

use crate::engine::Engine;
use crate::error::Error;
use crate::{BLOCK_SIZE, CHANNELS, SAMPLE_RATE};
use std::path::Path;

/// Render `blocks` blocks and return them as interleaved stereo frames.
///
/// Block `n` is stamped with time `n * 128 / 44100` for telemetry.
pub fn render_offline(engine: &mut Engine, blocks: usize) -> Vec<f32> {
    let mut interleaved = Vec::with_capacity(blocks * BLOCK_SIZE * CHANNELS);
    let mut planes = vec![0.0; CHANNELS * BLOCK_SIZE];
    for n in 0..blocks {
        let time = (n * BLOCK_SIZE) as f32 / SAMPLE_RATE;
        engine.process(&[], &mut planes, time);
        let (left, right) = planes.split_at(BLOCK_SIZE);
        for (&l, &r) in left.iter().zip(right) {
            interleaved.push(l);
            interleaved.push(r);
        }
    }
    interleaved
}

/// Write interleaved stereo samples as a 32-bit float WAV at the engine rate.
pub fn write_wav<P: AsRef<Path>>(path: P, interleaved: &[f32]) -> Result<(), Error> {
    let spec = hound::WavSpec {
        channels: CHANNELS as u16,
        sample_rate: SAMPLE_RATE as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
    for &sample in interleaved {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    log::info!(
        "wrote {} frames to {}",
        interleaved.len() / CHANNELS,
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default().with_loop_capacity(2048)).unwrap();
        engine.load_default_controls();
        engine.init();
        engine
    }

    #[test]
    fn offline_render_determinism() {
        let a = render_offline(&mut engine(), 8);
        let b = render_offline(&mut engine(), 8);
        assert_eq!(a.len(), 8 * BLOCK_SIZE * CHANNELS);
        assert_eq!(a, b, "Offline renders should be identical");
    }

    #[test]
    fn wav_roundtrip_preserves_frames() {
        let samples: Vec<f32> = (0..64).map(|i| (i as f32 / 64.0) - 0.5).collect();
        let path = std::env::temp_dir().join(format!("grainline-{}.wav", std::process::id()));
        write_wav(&path, &samples).unwrap();
        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 44100);
        let read: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(read, samples);
    }
}
