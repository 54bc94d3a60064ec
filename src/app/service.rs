//! Cycle engine, the hexagonal core.
//!
//! [`CycleEngine`] owns the vector, the expansions and the decisions, and
//! runs them in a fixed order once per cycle.  All I/O flows through the
//! port traits handed to [`EngineBuilder`], so the whole engine runs under
//! test with in-memory collectors and sinks.
//!
//! ```text
//!  SampleCollector ──▶ ┌──────────────────────────────────────┐ ──▶ VectorSink
//!                      │             CycleEngine              │
//!   CommandIntake ───▶ │ filters · math · decisions · safety  │
//!                      └──────────────────────────────────────┘
//! ```
//!
//! One cycle, strictly sequential on the caller's thread:
//!
//! 1. collect samples
//! 2. legacy filters (append `_filter` samples, drop hidden sources)
//! 3. write samples into their `Input` slots
//! 4. math, then sustained filters
//! 5. drain the command queue into this cycle's events
//! 6. regular decisions, then safety decisions
//! 7. publish a copy of the vector
//!
//! The vector has a single writer at every step; nothing in a cycle runs
//! concurrently with anything else in it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::decision::{Decision, PluginField, RedundancyDecision};
use crate::error::Result;
use crate::expansion::{FilterConfig, FilterExpansion, MathConfig, MathExpansion};
use crate::rows::EngineRows;
use crate::sensors::{InputConfig, SensorSample};
use crate::sync::CancellationToken;
use crate::vector::{DataVector, FieldDirection, VectorDescription, VectorDescriptionItem};

use super::commands::{CommandIntake, CommandOutcome, CommandQueue, CommandRegistry};
use super::events::PublishedVector;
use super::ports::{SampleCollector, VectorSink};

// ───────────────────────────────────────────────────────────────
// Builder
// ───────────────────────────────────────────────────────────────

/// Collects every part of an engine, then validates and wires them in
/// [`build`](Self::build).
pub struct EngineBuilder {
    config: EngineConfig,
    token: CancellationToken,
    collectors: Vec<Box<dyn SampleCollector>>,
    maths: Vec<MathConfig>,
    filters: Vec<FilterConfig>,
    decisions: Vec<Box<dyn Decision>>,
    safety_decisions: Vec<Box<dyn Decision>>,
    sinks: Vec<Box<dyn VectorSink>>,
    commands: CommandRegistry,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            token: CancellationToken::new(),
            collectors: Vec::new(),
            maths: Vec::new(),
            filters: Vec::new(),
            decisions: Vec::new(),
            safety_decisions: Vec::new(),
            sinks: Vec::new(),
            commands: CommandRegistry::new(),
        }
    }

    /// Use an existing token instead of a fresh one.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn collector(mut self, collector: impl SampleCollector + 'static) -> Self {
        self.collectors.push(Box::new(collector));
        self
    }

    #[must_use]
    pub fn maths(mut self, maths: impl IntoIterator<Item = MathConfig>) -> Self {
        self.maths.extend(maths);
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: impl IntoIterator<Item = FilterConfig>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Regular decisions run in the order they are added.
    #[must_use]
    pub fn decision(mut self, decision: impl Decision + 'static) -> Self {
        self.decisions.push(Box::new(decision));
        self
    }

    /// Safety decisions run after every regular decision.
    #[must_use]
    pub fn safety_decision(mut self, decision: impl Decision + 'static) -> Self {
        self.safety_decisions.push(Box::new(decision));
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: impl VectorSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Extra operator command outside any decision.
    #[must_use]
    pub fn command(
        mut self,
        name: &str,
        handler: impl Fn(&[&str]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.commands.register(name, handler);
        self
    }

    /// Add typed rows: maths, filters, and one redundancy decision per
    /// group.
    #[must_use]
    pub fn rows(mut self, rows: EngineRows) -> Self {
        self.maths.extend(rows.maths);
        self.filters.extend(rows.filters);
        for config in rows.redundancies {
            self.decisions.push(Box::new(RedundancyDecision::new(config)));
        }
        self
    }

    /// Witness fields of `sensor`: the state field of the board reporting
    /// it, if any collector knows it.
    pub fn board_states_for(&self, sensor: &str) -> Vec<String> {
        self.collectors
            .iter()
            .flat_map(|c| c.inputs())
            .filter(|i| i.name == sensor)
            .filter_map(|i| i.board_state_field())
            .collect()
    }

    /// Assemble the vector description, initialize every expansion and
    /// decision, and register decision commands.
    ///
    /// Description order: inputs and legacy filter outputs (minus hidden
    /// sources), math fields, sustained filter fields, decision fields.
    pub fn build(self) -> Result<CycleEngine> {
        let Self {
            config,
            token,
            collectors,
            maths,
            filters,
            mut decisions,
            mut safety_decisions,
            sinks,
            mut commands,
        } = self;

        let inputs: Vec<Arc<InputConfig>> = collectors.iter().flat_map(|c| c.inputs()).collect();
        let raw_items: Vec<VectorDescriptionItem> = inputs
            .iter()
            .map(|i| VectorDescriptionItem::new(i.name.clone(), FieldDirection::Input))
            .collect();

        let mut filters = FilterExpansion::new(filters, &raw_items, config.verbose_vectors)?;
        let mut math = MathExpansion::new(maths);

        let mut items = raw_items;
        filters.extend_inputs(&mut items);
        items.extend(math.description_items());
        items.extend(filters.decision_items());
        for decision in decisions.iter().chain(&safety_decisions) {
            items.extend(decision.plugin_fields().iter().map(PluginField::to_item));
        }
        let description = Arc::new(VectorDescription::new(items)?);

        math.initialize(&description)?;
        filters.initialize(&description)?;
        for decision in decisions.iter_mut().chain(safety_decisions.iter_mut()) {
            decision.initialize(&description)?;
            for event in decision.handled_events() {
                commands.register_event(&event);
            }
        }

        let escape = token.clone();
        commands.register("escape", move |_| {
            escape.cancel();
            true
        });

        info!(
            "decisions: [{}] then safety: [{}]",
            names(&decisions),
            names(&safety_decisions)
        );
        info!(
            "vector: {} fields ({} maths, {} collectors)",
            description.len(),
            math.len(),
            collectors.len()
        );

        let queue = Arc::new(CommandQueue::new(config.command_queue_capacity));
        let intake = CommandIntake::new(Arc::new(commands), queue);
        let vector = DataVector::zeroed(Arc::clone(&description), Utc::now());

        Ok(CycleEngine {
            description,
            vector,
            collectors,
            math,
            filters,
            decisions,
            safety_decisions,
            sinks,
            intake,
            token,
            samples: Vec::with_capacity(inputs.len()),
            unmapped: HashSet::new(),
            cycles: 0,
        })
    }
}

fn names(decisions: &[Box<dyn Decision>]) -> String {
    decisions
        .iter()
        .map(|d| d.name())
        .collect::<Vec<_>>()
        .join(", ")
}

// ───────────────────────────────────────────────────────────────
// CycleEngine
// ───────────────────────────────────────────────────────────────

/// A built engine.  Call [`run_cycle`](Self::run_cycle) once per period.
pub struct CycleEngine {
    description: Arc<VectorDescription>,
    vector: DataVector,
    collectors: Vec<Box<dyn SampleCollector>>,
    math: MathExpansion,
    filters: FilterExpansion,
    decisions: Vec<Box<dyn Decision>>,
    safety_decisions: Vec<Box<dyn Decision>>,
    sinks: Vec<Box<dyn VectorSink>>,
    intake: CommandIntake,
    token: CancellationToken,
    /// Reused sample buffer.
    samples: Vec<SensorSample>,
    /// Sample names already warned about.
    unmapped: HashSet<String>,
    cycles: u64,
}

impl CycleEngine {
    pub fn description(&self) -> &Arc<VectorDescription> {
        &self.description
    }

    /// The vector as left by the last cycle.
    pub fn vector(&self) -> &DataVector {
        &self.vector
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Handle for feeding commands from another thread.
    pub fn intake(&self) -> CommandIntake {
        self.intake.clone()
    }

    /// Dispatch a command line; accepted lines reach decisions next cycle.
    pub fn submit(&self, line: &str) -> CommandOutcome {
        self.intake.submit(line)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one full cycle stamped `now` and return what was published.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> PublishedVector {
        self.cycles += 1;
        self.vector.set_timestamp(now);

        // 1-2. Samples and legacy filters
        self.samples.clear();
        for collector in &mut self.collectors {
            collector.collect(now, &mut self.samples);
        }
        self.filters.apply_legacy(&mut self.samples);

        // 3. Inputs
        for sample in &self.samples {
            let written = self
                .description
                .index_of(sample.name())
                .map(|i| self.vector.record_sample(i, sample.value()));
            match written {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    if self.unmapped.insert(sample.name().to_string()) {
                        warn!("sample {} ignored: {e}", sample.name());
                    }
                }
                None => {
                    if self.unmapped.insert(sample.name().to_string()) {
                        warn!("sample {} has no vector field, ignoring it", sample.name());
                    }
                }
            }
        }

        // 4. Expansions
        self.math.apply(&mut self.vector);
        self.filters.apply_decisions(&mut self.vector);

        // 5. Events
        let events = self.intake.queue().drain();
        if !events.is_empty() {
            debug!("cycle {}: events {events:?}", self.cycles);
        }

        // 6. Decisions, then safety decisions
        for decision in &mut self.decisions {
            decision.make_decision(&mut self.vector, &events);
        }
        for decision in &mut self.safety_decisions {
            decision.make_decision(&mut self.vector, &events);
        }

        // 7. Publish
        let published = PublishedVector {
            vector: self.vector.clone(),
            events,
        };
        for sink in &mut self.sinks {
            sink.publish(&published);
        }
        published
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::decision::{LimitGuard, LimitGuardConfig};
    use crate::error::{Error, VectorError};
    use crate::expansion::FilterKind;

    struct Fixed(Vec<(&'static str, f64)>);

    impl SampleCollector for Fixed {
        fn inputs(&self) -> Vec<Arc<InputConfig>> {
            self.0.iter().map(|(n, _)| Arc::new(InputConfig::new(*n))).collect()
        }

        fn collect(&mut self, now: DateTime<Utc>, out: &mut Vec<SensorSample>) {
            out.extend(self.0.iter().map(|(n, v)| SensorSample::new(*n, *v).at(now)));
        }
    }

    /// Records which decisions ran, in order.
    struct Probe {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        events: Vec<String>,
    }

    impl Decision for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn plugin_fields(&self) -> Vec<PluginField> {
            vec![PluginField::output(self.name)]
        }

        fn handled_events(&self) -> Vec<String> {
            self.events.clone()
        }

        fn initialize(&mut self, _description: &VectorDescription) -> Result<()> {
            Ok(())
        }

        fn make_decision(&mut self, vector: &mut DataVector, events: &[String]) {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, events.len()));
            vector.set_field(self.name, 1.0).unwrap();
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn description_order_follows_build_steps() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .collector(Fixed(vec![("a", 1.0), ("b", 2.0)]))
            .filters([FilterConfig {
                name: "hot".into(),
                kind: FilterKind::Sustained,
                length_secs: 1.0,
                sources: vec!["a > 0".into()],
                hide_source: false,
            }])
            .maths([MathConfig::new("sum", "a + b").unwrap()])
            .decision(Probe {
                name: "p",
                log: Arc::default(),
                events: vec![],
            })
            .build()
            .unwrap();
        let names: Vec<_> = engine.description().descriptors().collect();
        assert_eq!(names, ["a", "b", "sum", "hot", "hot_targettime", "p"]);
    }

    #[test]
    fn regular_decisions_run_before_safety() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let probe = |name| Probe {
            name,
            log: Arc::clone(&log),
            events: vec![format!("{name} go")],
        };
        let mut engine = EngineBuilder::new(EngineConfig::default())
            .safety_decision(probe("s1"))
            .decision(probe("r1"))
            .decision(probe("r2"))
            .build()
            .unwrap();
        assert_eq!(engine.submit("r1 go"), CommandOutcome::Accepted);
        engine.run_cycle(t0());
        assert_eq!(*log.lock().unwrap(), ["r1:1", "r2:1", "s1:1"]);
    }

    #[test]
    fn events_last_exactly_one_cycle() {
        let mut engine = EngineBuilder::new(EngineConfig::default())
            .decision(Probe {
                name: "oven",
                log: Arc::default(),
                events: vec!["oven".into()],
            })
            .build()
            .unwrap();
        engine.submit("oven 120");
        assert_eq!(engine.run_cycle(t0()).events, ["oven 120"]);
        assert!(engine.run_cycle(t0() + Duration::seconds(1)).events.is_empty());
    }

    #[test]
    fn math_reads_samples_of_the_same_cycle() {
        let mut engine = EngineBuilder::new(EngineConfig::default())
            .collector(Fixed(vec![("a", 1.5), ("b", 2.0)]))
            .maths([MathConfig::new("sum", "a + b").unwrap()])
            .build()
            .unwrap();
        let out = engine.run_cycle(t0());
        assert_eq!(out.vector.value("sum"), Some(3.5));
        assert_eq!(out.vector.timestamp(), t0());
        assert_eq!(engine.cycles(), 1);
    }

    #[test]
    fn duplicate_fields_fail_build() {
        let err = EngineBuilder::new(EngineConfig::default())
            .collector(Fixed(vec![("a", 1.0)]))
            .maths([MathConfig::new("a", "1").unwrap()])
            .build()
            .err();
        assert_eq!(
            err,
            Some(Error::Vector(VectorError::DuplicateDescriptor("a".into())))
        );
    }

    #[test]
    fn missing_decision_field_fails_build() {
        let err = EngineBuilder::new(EngineConfig::default())
            .safety_decision(LimitGuard::new(LimitGuardConfig {
                name: "guard".into(),
                sensor: "temp".into(),
                max: 1.0,
                outputs: vec![],
                safe_value: 0.0,
            }))
            .build()
            .err();
        assert_eq!(err, Some(Error::missing_field("guard", "temp")));
    }

    #[test]
    fn escape_cancels_the_token() {
        let engine = EngineBuilder::new(EngineConfig::default()).build().unwrap();
        assert!(!engine.token().is_cancelled());
        assert_eq!(engine.submit("escape"), CommandOutcome::Accepted);
        assert!(engine.token().is_cancelled());
    }
}
