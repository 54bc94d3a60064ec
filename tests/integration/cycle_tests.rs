//! Whole cycles built from rows: legacy filters, math and sustained
//! filters feeding each other in one pass.

use vector_cycle::app::{CycleEngine, EngineBuilder, VectorFrame};
use vector_cycle::config::EngineConfig;
use vector_cycle::rows::{self, ConfigRow};

use super::mock_io::{RecordingSink, ScriptedCollector, at};

const ROWS: [&str; 4] = [
    "Math;sum;a_filter + b // smoothed a plus b",
    "Filter;a;Average;10;a;hidesource",
    "Filter;warm;Sustained;3;sum > 20",
    "Heater;ignored;row;type",
];

fn engine(config: EngineConfig) -> (CycleEngine, ScriptedCollector, RecordingSink) {
    let sensors = ScriptedCollector::new(&["a", "b"]);
    let sink = RecordingSink::new();
    let rows: Vec<ConfigRow> = ROWS
        .iter()
        .enumerate()
        .map(|(i, r)| ConfigRow::new(i + 1, *r))
        .collect();
    let parsed = rows::parse_rows(&rows, |_| Vec::new(), 0.0).unwrap();
    let engine = EngineBuilder::new(config)
        .collector(sensors.clone())
        .sink(sink.clone())
        .rows(parsed)
        .build()
        .unwrap();
    (engine, sensors, sink)
}

fn value(engine: &CycleEngine, field: &str) -> f64 {
    engine.vector().value(field).unwrap()
}

#[test]
fn description_hides_filter_source() {
    let (engine, _, _) = engine(EngineConfig::default());
    let fields: Vec<&str> = engine.description().descriptors().collect();
    assert_eq!(fields, ["b", "a_filter", "sum", "warm", "warm_targettime"]);
}

#[test]
fn verbose_vectors_keep_hidden_sources() {
    let config = EngineConfig {
        verbose_vectors: true,
        ..EngineConfig::default()
    };
    let (engine, _, _) = engine(config);
    let fields: Vec<&str> = engine.description().descriptors().collect();
    assert_eq!(fields, ["a", "b", "a_filter", "sum", "warm", "warm_targettime"]);
}

#[test]
fn filter_math_and_sustained_chain() {
    let (mut engine, sensors, _) = engine(EngineConfig::default());
    sensors.set_all(&[("a", 10.0), ("b", 1.0)]);
    engine.run_cycle(at(0));
    assert_eq!(value(&engine, "a_filter"), 10.0);
    assert_eq!(value(&engine, "sum"), 11.0);
    assert_eq!(value(&engine, "warm"), 0.0);

    sensors.set("a", 30.0);
    engine.run_cycle(at(1));
    assert_eq!(value(&engine, "sum"), 21.0);
    assert_eq!(value(&engine, "warm"), 0.0, "condition must hold for 3s");

    engine.run_cycle(at(4));
    assert!((value(&engine, "a_filter") - 70.0 / 3.0).abs() < 1e-9);
    assert_eq!(value(&engine, "warm"), 1.0);

    // Older readings leave the 10s window.
    engine.run_cycle(at(20));
    assert_eq!(value(&engine, "a_filter"), 30.0);
    assert_eq!(value(&engine, "warm"), 1.0);

    sensors.set("b", -20.0);
    engine.run_cycle(at(21));
    assert_eq!(value(&engine, "sum"), 10.0);
    assert_eq!(value(&engine, "warm"), 0.0);
    assert_eq!(value(&engine, "warm_targettime"), 0.0);
}

#[test]
fn silent_inputs_keep_their_last_value() {
    let (mut engine, sensors, _) = engine(EngineConfig::default());
    sensors.set_all(&[("a", 10.0), ("b", 5.0)]);
    engine.run_cycle(at(0));
    sensors.silence("b");
    engine.run_cycle(at(1));
    assert_eq!(value(&engine, "b"), 5.0);
}

#[test]
fn every_cycle_is_published_and_encodable() {
    let (mut engine, sensors, sink) = engine(EngineConfig::default());
    sensors.set_all(&[("a", 10.0), ("b", 1.0)]);
    for s in 0..3 {
        engine.run_cycle(at(s));
    }
    assert_eq!(sink.len(), 3);
    assert_eq!(engine.cycles(), 3);

    let published = sink.published();
    let last = published.last().unwrap();
    assert_eq!(last.vector.timestamp(), at(2));
    assert_eq!(last.vector, *engine.vector());

    let frame = VectorFrame::decode(&last.encode().unwrap()).unwrap();
    assert_eq!(frame.timestamp, at(2));
    assert_eq!(frame.data, last.vector.data());
    assert!(frame.events.is_empty());
}
