use grainline::config::EngineConfig;
use grainline::{Engine, Param, BLOCK_SIZE, CHANNELS};
use std::alloc::{GlobalAlloc, Layout};
use std::cell::RefCell;

thread_local! {
    static ALLOC_COUNT: RefCell<usize> = RefCell::new(0);
}

struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOC_COUNT.with(|c| *c.borrow_mut() += 1);
        unsafe { std::alloc::System.alloc(layout) }
    }
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { std::alloc::System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static A: CountingAllocator = CountingAllocator;

#[test]
fn rt_alloc_invariant() {
    let mut engine = Engine::new(EngineConfig::default().with_loop_capacity(4096)).unwrap();
    engine.load_default_controls();
    engine.set(Param::LoopLength, 4096.0);
    let material = vec![0.25; 4096 * CHANNELS];
    engine.bulk_load(engine.store().layout().delay_region().start, &material);
    engine.init();
    engine.set(Param::Click, 1.0);
    let mut out = vec![0.0; CHANNELS * BLOCK_SIZE];

    let after_setup = ALLOC_COUNT.with(|c| *c.borrow());
    for n in 0..2_000 {
        engine.process(&[], &mut out, n as f32);
    }
    let final_count = ALLOC_COUNT.with(|c| *c.borrow());
    assert_eq!(
        final_count, after_setup,
        "Engine::process should not allocate"
    );
}
