// demos/render_grains.rs
use grainline::render::{render_offline, write_wav};
use grainline::{Engine, EngineConfig, Param};

fn main() -> Result<(), grainline::Error> {
    let capacity = 2 * 44_100;
    let mut engine = Engine::new(EngineConfig::default().with_loop_capacity(capacity))?;
    engine.load_default_controls();
    engine.set(Param::LoopLength, capacity as f32);
    engine.set(Param::DensityRate, 12.0);
    engine.set(Param::Semitones, 7.0);
    engine.set(Param::GrainSize, 0.8);
    // Hold the transport gate open for the whole render.
    engine.set(Param::GateLength, 16_000.0);

    // Two seconds of a gliding tone as source material, one plane per channel.
    let base = engine.store().layout().delay_region().start;
    let mut phase = 0.0f32;
    let mut material = Vec::with_capacity(2 * capacity);
    for i in 0..capacity {
        let hz = 220.0 + 220.0 * i as f32 / capacity as f32;
        phase += std::f32::consts::TAU * hz / grainline::SAMPLE_RATE;
        material.push(phase.sin() * 0.5);
    }
    material.extend_from_within(..capacity);
    engine.bulk_load(base, &material);

    engine.init();
    engine.set(Param::Click, 1.0);

    // Four seconds of output.
    let blocks = 4 * 44_100 / grainline::BLOCK_SIZE;
    let samples = render_offline(&mut engine, blocks);
    write_wav("grains.wav", &samples)?;

    println!(
        "Generated grains.wav ({} telemetry records pending)",
        engine.telemetry_count()
    );
    Ok(())
}
