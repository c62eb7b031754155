use grainline::config::EngineConfig;
use grainline::context::EngineContext;
use grainline::patch::build_patch;
use grainline::plan::Plan;
use grainline::rt::Runtime;
use grainline::store::{MemoryLayout, Param, ParameterStore};
use grainline::{BLOCK_SIZE, CHANNELS};
use proptest::prelude::*;

proptest! {
    #[test]
    fn rt_no_panic_fuzz(
        values in proptest::collection::vec(-1.0e5f32..1.0e5, Param::ALL.len()),
        click in 0.0f32..10.0,
        blocks in 1usize..6,
    ) {
        let config = EngineConfig::default().with_loop_capacity(512);
        let patch = build_patch(&config).unwrap();
        let plan = Plan::compile(&patch.graph).unwrap();
        let mut runtime = Runtime::new(plan, &patch.graph);
        let mut store = ParameterStore::new(MemoryLayout::new(512));
        let mut ctx = EngineContext::new(&config);
        for (param, &value) in Param::ALL.iter().zip(&values) {
            store.write(*param, value);
        }
        store.write(Param::Click, click);

        let mut out = vec![0.0; CHANNELS * BLOCK_SIZE];
        for n in 0..blocks {
            ctx.begin_block(n as f32);
            // Called directly so a panic fails the test instead of being contained.
            runtime.process_block(&mut store, &mut ctx, &mut out);
            ctx.end_block();
        }
    }
}
