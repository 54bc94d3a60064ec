//! Operator commands: validation, queueing and delivery to decisions.

use vector_cycle::app::{CommandOutcome, CycleEngine, EngineBuilder};
use vector_cycle::config::EngineConfig;
use vector_cycle::decision::{LimitGuard, LimitGuardConfig};

use super::mock_io::{RecordingSink, ScriptedCollector, at};

fn engine_with(config: EngineConfig, sink: &RecordingSink) -> CycleEngine {
    let temp = ScriptedCollector::new(&["temp"]);
    temp.set("temp", 20.0);
    EngineBuilder::new(config)
        .collector(temp)
        .sink(sink.clone())
        .safety_decision(LimitGuard::new(LimitGuardConfig {
            name: "overtemp".into(),
            sensor: "temp".into(),
            max: 100.0,
            outputs: Vec::new(),
            safe_value: 0.0,
        }))
        .command("lamp", |args| matches!(args, ["lamp", "on" | "off"]))
        .build()
        .unwrap()
}

#[test]
fn decision_events_are_validated() {
    let sink = RecordingSink::new();
    let engine = engine_with(EngineConfig::default(), &sink);

    assert_eq!(engine.submit("overtemp reset"), CommandOutcome::Accepted);
    assert_eq!(engine.submit("OVERTEMP Reset"), CommandOutcome::Accepted);
    assert_eq!(engine.submit("overtemp_reset"), CommandOutcome::Accepted);
    assert_eq!(engine.submit("overtemp reset 0x1F"), CommandOutcome::Accepted);
    assert_eq!(engine.submit("overtemp reset abc"), CommandOutcome::Rejected);
    assert_eq!(engine.submit("overtemp"), CommandOutcome::Rejected);
    assert_eq!(engine.submit("overtemp clear"), CommandOutcome::Rejected);
    assert_eq!(engine.submit("heater on"), CommandOutcome::Unknown);
    assert_eq!(engine.submit("   "), CommandOutcome::Empty);
    assert_eq!(engine.submit("help"), CommandOutcome::Accepted);
}

#[test]
fn custom_commands_reach_the_next_cycle_only() {
    let sink = RecordingSink::new();
    let mut engine = engine_with(EngineConfig::default(), &sink);

    assert_eq!(engine.submit("lamp  on"), CommandOutcome::Accepted);
    assert_eq!(engine.submit("lamp dim"), CommandOutcome::Rejected);
    engine.run_cycle(at(0));
    engine.run_cycle(at(1));

    let events: Vec<Vec<String>> = sink.published().into_iter().map(|p| p.events).collect();
    assert_eq!(events, [vec!["lamp on".to_string()], Vec::new()]);
}

#[test]
fn full_queue_drops_oldest() {
    let sink = RecordingSink::new();
    let config = EngineConfig {
        command_queue_capacity: 2,
        ..EngineConfig::default()
    };
    let mut engine = engine_with(config, &sink);

    engine.submit("lamp on");
    engine.submit("lamp off");
    engine.submit("overtemp reset");
    let published = engine.run_cycle(at(0));
    assert_eq!(published.events, ["lamp off", "overtemp reset"]);
}

#[test]
fn escape_cancels_the_engine_token() {
    let sink = RecordingSink::new();
    let engine = engine_with(EngineConfig::default(), &sink);
    assert!(!engine.token().is_cancelled());
    assert_eq!(engine.submit("escape"), CommandOutcome::Accepted);
    assert!(engine.token().is_cancelled());
}
