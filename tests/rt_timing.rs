use grainline::config::EngineConfig;
use grainline::{Engine, Param, BLOCK_SIZE, CHANNELS};
use std::time::Instant;

#[test]
fn rt_timing_stability() {
    // Full-size delay memory, all voices busy.
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.load_default_controls();
    engine.set(Param::DensityRate, 40.0);
    engine.init();
    engine.set(Param::Click, 1.0);

    let mut out = vec![0.0; CHANNELS * BLOCK_SIZE];
    let start = Instant::now();
    // About one second of audio.
    for n in 0..345 {
        engine.process(&[], &mut out, n as f32);
    }
    let duration = start.elapsed();
    assert!(duration.as_secs() < 5, "Execution took too long: {:?}", duration);
}
