use grainline::config::EngineConfig;
use grainline::invariant_ppt::{
    contract_test, BUFFER_LIVENESS, GRAPH_LEGALITY, HOST_WRITE_GUARDED, LAYOUT_DISJOINT,
    PATCH_COMPLETE, PLAN_SOUNDNESS,
};
use grainline::{Engine, Param};

#[test]
fn engine_construction_enforces_contracts() {
    let mut engine = Engine::new(EngineConfig::default().with_loop_capacity(256)).unwrap();
    contract_test(
        "engine construction",
        &[
            LAYOUT_DISJOINT,
            GRAPH_LEGALITY,
            PLAN_SOUNDNESS,
            BUFFER_LIVENESS,
            PATCH_COMPLETE,
        ],
    );

    engine.set_parameter(Param::Tempo.index(), 90.0).unwrap();
    contract_test("host writes", &[HOST_WRITE_GUARDED]);
}
