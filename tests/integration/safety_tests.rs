//! Safety decisions run after regular decisions and win.

use vector_cycle::Result;
use vector_cycle::app::{CommandOutcome, CycleEngine, EngineBuilder};
use vector_cycle::config::EngineConfig;
use vector_cycle::decision::{Decision, LimitGuard, LimitGuardConfig, PluginField};
use vector_cycle::vector::{DataVector, Slot, VectorDescription};

use super::mock_io::{RecordingSink, ScriptedCollector, at};

/// Regular decision that always commands the heater on.
struct HeaterOn {
    slot: Option<Slot>,
}

impl Decision for HeaterOn {
    fn name(&self) -> &str {
        "heater_on"
    }

    fn plugin_fields(&self) -> Vec<PluginField> {
        vec![PluginField::output("heater")]
    }

    fn initialize(&mut self, description: &VectorDescription) -> Result<()> {
        self.slot = Some(description.writable_slot("heater", "heater_on")?);
        Ok(())
    }

    fn make_decision(&mut self, vector: &mut DataVector, _events: &[String]) {
        vector.write(self.slot.unwrap(), 1.0);
    }
}

fn rig() -> (CycleEngine, ScriptedCollector, RecordingSink) {
    let temp = ScriptedCollector::new(&["temp"]);
    let sink = RecordingSink::new();
    let engine = EngineBuilder::new(EngineConfig::default())
        .collector(temp.clone())
        .sink(sink.clone())
        .safety_decision(LimitGuard::new(LimitGuardConfig {
            name: "overtemp".into(),
            sensor: "temp".into(),
            max: 100.0,
            outputs: vec!["heater".into()],
            safe_value: 0.0,
        }))
        .decision(HeaterOn { slot: None })
        .build()
        .unwrap();
    (engine, temp, sink)
}

fn heater_and_trip(engine: &CycleEngine) -> (f64, f64) {
    let v = engine.vector();
    (
        v.value("heater").unwrap(),
        v.value("overtemp_tripped").unwrap(),
    )
}

#[test]
fn regular_fields_come_before_safety_fields() {
    let (engine, _, _) = rig();
    let fields: Vec<&str> = engine.description().descriptors().collect();
    assert_eq!(fields, ["temp", "heater", "overtemp_tripped"]);
}

#[test]
fn guard_overrides_regular_decision_until_reset() {
    let (mut engine, temp, sink) = rig();

    temp.set("temp", 50.0);
    engine.run_cycle(at(0));
    assert_eq!(heater_and_trip(&engine), (1.0, 0.0));

    temp.set("temp", 120.0);
    engine.run_cycle(at(1));
    assert_eq!(heater_and_trip(&engine), (0.0, 1.0));

    // Back under the limit, but latched until reset.
    temp.set("temp", 50.0);
    engine.run_cycle(at(2));
    assert_eq!(heater_and_trip(&engine), (0.0, 1.0));

    assert_eq!(engine.submit("overtemp reset"), CommandOutcome::Accepted);
    engine.run_cycle(at(3));
    assert_eq!(heater_and_trip(&engine), (1.0, 0.0));

    // Published vectors carry the overridden value.
    let heater: Vec<f64> = sink
        .published()
        .iter()
        .map(|p| p.vector.value("heater").unwrap())
        .collect();
    assert_eq!(heater, [1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn reset_while_over_limit_is_ignored() {
    let (mut engine, temp, _) = rig();
    temp.set("temp", 120.0);
    engine.run_cycle(at(0));

    engine.submit("overtemp reset");
    engine.run_cycle(at(1));
    assert_eq!(heater_and_trip(&engine), (0.0, 1.0));

    temp.set("temp", 90.0);
    engine.run_cycle(at(2));
    assert_eq!(heater_and_trip(&engine), (0.0, 1.0), "earlier reset is not remembered");
}
