//! Filter expansion.
//!
//! Two families configured by `Filter` rows:
//!
//! - **Legacy windowed filters** consume the raw sample stream.  Every
//!   cycle the samples matching the filter's sources form one group; groups
//!   older than the filter length are dropped, and the remaining groups are
//!   reduced to a single `<name>_filter` input.
//! - **Sustained decision filters** evaluate a boolean expression over the
//!   vector.  The output `<name>` turns `1` once the condition has held for
//!   the whole filter length, tracked through `<name>_targettime`.

use std::collections::VecDeque;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{BoundExpression, Expression};
use crate::error::{ExpressionError, FilterError, Result};
use crate::rows::MAX_DURATION_SECS;
use crate::sensors::SensorSample;
use crate::vector::{DataVector, FieldDirection, Slot, VectorDescription, VectorDescriptionItem};

/// Legacy filters treat a group containing any value at or above this as invalid.
const INVALID_VALUE_CEILING: f64 = 10_000.0;

// ═══════════════════════════════════════════════════════════════
//  Configuration
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    None,
    Average,
    Max,
    Min,
    SumAvg,
    DiffAvg,
    Triangle,
    Sustained,
}

impl FromStr for FilterKind {
    type Err = ();

    fn from_str(s: &str) -> core::result::Result<Self, ()> {
        Ok(match s {
            "None" => Self::None,
            "Average" => Self::Average,
            "Max" => Self::Max,
            "Min" => Self::Min,
            "SumAvg" => Self::SumAvg,
            "DiffAvg" => Self::DiffAvg,
            "Triangle" => Self::Triangle,
            "Sustained" => Self::Sustained,
            _ => return Err(()),
        })
    }
}

/// One `Filter;Name;Type;Length;Sources...;[hidesource]` row.
///
/// For `Sustained` filters `sources` holds the condition text as its only
/// entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub name: String,
    pub kind: FilterKind,
    /// Window or hold length in seconds.
    pub length_secs: f64,
    pub sources: Vec<String>,
    pub hide_source: bool,
}

impl FilterConfig {
    pub fn output_name(&self) -> String {
        format!("{}_filter", self.name)
    }

    fn has_source(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s == name)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Expansion
// ═══════════════════════════════════════════════════════════════

/// All configured filters of both families.
#[derive(Debug)]
pub struct FilterExpansion {
    legacy: Vec<LegacyFilter>,
    sustained: Vec<SustainedFilter>,
    /// Hidden sources stay in the vector when verbose.
    verbose: bool,
    scratch: Vec<f64>,
}

impl FilterExpansion {
    /// Validate `filters` against the raw input list.
    ///
    /// Every legacy source must match one or two entries of `inputs`
    /// (the same sensor can be reported by two nodes).  Sustained
    /// conditions must be boolean.
    pub fn new(
        filters: Vec<FilterConfig>,
        inputs: &[VectorDescriptionItem],
        verbose: bool,
    ) -> Result<Self> {
        let mut legacy = Vec::new();
        let mut sustained = Vec::new();
        for filter in filters {
            if !(0.0..=MAX_DURATION_SECS).contains(&filter.length_secs) {
                return Err(FilterError::InvalidLength {
                    filter: filter.name,
                    length: filter.length_secs,
                }
                .into());
            }
            if filter.kind == FilterKind::Sustained {
                sustained.push(SustainedFilter::new(filter)?);
                continue;
            }
            for source in &filter.sources {
                let count = inputs.iter().filter(|i| i.descriptor == *source).count();
                match count {
                    0 => {
                        return Err(FilterError::MissingSource {
                            filter: filter.name.clone(),
                            source_name: source.clone(),
                        }
                        .into());
                    }
                    1 | 2 => {}
                    _ => {
                        return Err(FilterError::AmbiguousSource {
                            filter: filter.name.clone(),
                            source_name: source.clone(),
                            count,
                        }
                        .into());
                    }
                }
            }
            if filter.kind == FilterKind::DiffAvg && filter.sources.len() != 2 {
                return Err(FilterError::DiffAvgSources(filter.name).into());
            }
            legacy.push(LegacyFilter::new(filter));
        }
        Ok(Self {
            legacy,
            sustained,
            verbose,
            scratch: Vec::new(),
        })
    }

    /// Append legacy outputs to `inputs` and drop hidden sources.
    pub fn extend_inputs(&self, inputs: &mut Vec<VectorDescriptionItem>) {
        inputs.extend(
            self.legacy
                .iter()
                .map(|f| VectorDescriptionItem::new(f.output.name(), FieldDirection::Input)),
        );
        self.remove_hidden_sources(inputs, |i| i.descriptor.as_str());
    }

    /// Fields owned by sustained filters.
    pub fn decision_items(&self) -> Vec<VectorDescriptionItem> {
        self.sustained
            .iter()
            .flat_map(|f| {
                [
                    VectorDescriptionItem::new(f.config.name.clone(), FieldDirection::State),
                    VectorDescriptionItem::new(f.target_name(), FieldDirection::State),
                ]
            })
            .collect()
    }

    /// Bind sustained filters to their slots.
    pub fn initialize(&mut self, description: &VectorDescription) -> Result<()> {
        for filter in &mut self.sustained {
            filter.initialize(description)?;
        }
        let widest = self
            .sustained
            .iter()
            .filter_map(|f| f.bound.as_ref().map(|b| b.condition.arity()))
            .max()
            .unwrap_or(0);
        self.scratch = Vec::with_capacity(widest);
        Ok(())
    }

    /// Feed this cycle's samples to the legacy filters, append their outputs
    /// and drop hidden sources.
    pub fn apply_legacy(&mut self, samples: &mut Vec<SensorSample>) {
        for filter in &mut self.legacy {
            filter.input(samples);
            samples.push(filter.output.clone());
        }
        self.remove_hidden_sources(samples, SensorSample::name);
    }

    /// Evaluate the sustained filters against the current vector.
    pub fn apply_decisions(&mut self, vector: &mut DataVector) {
        for filter in &self.sustained {
            filter.apply(vector, &mut self.scratch);
        }
    }

    fn remove_hidden_sources<T>(&self, list: &mut Vec<T>, name: impl Fn(&T) -> &str) {
        if self.verbose {
            return;
        }
        for filter in self.legacy.iter().filter(|f| f.config.hide_source) {
            list.retain(|entry| !filter.config.has_source(name(entry)));
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Legacy windowed filter
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct Reading {
    value: f64,
    at: DateTime<Utc>,
}

#[derive(Debug)]
struct LegacyFilter {
    config: FilterConfig,
    window: VecDeque<Vec<Reading>>,
    output: SensorSample,
}

impl LegacyFilter {
    fn new(config: FilterConfig) -> Self {
        let output = SensorSample::new(config.output_name(), 0.0);
        Self {
            config,
            window: VecDeque::new(),
            output,
        }
    }

    fn input(&mut self, samples: &[SensorSample]) {
        let group: Vec<Reading> = samples
            .iter()
            .filter(|s| self.config.has_source(s.name()))
            .map(|s| Reading {
                value: s.value(),
                at: s.timestamp(),
            })
            .collect();
        if group.is_empty() {
            return;
        }

        let latest = average_time(&group);
        let remove_before = latest
            .checked_sub_signed(seconds(self.config.length_secs))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.window.push_back(group);
        while self.window.len() > 1
            && self
                .window
                .front()
                .is_some_and(|g| g.iter().any(|r| r.at < remove_before))
        {
            self.window.pop_front();
        }

        let valid: Vec<&Vec<Reading>> = self
            .window
            .iter()
            .filter(|g| g.iter().all(|r| r.value < INVALID_VALUE_CEILING && r.value != 0.0))
            .collect();

        let (value, at) = match valid.last() {
            Some(newest) => {
                let at = average_time(newest);
                (self.reduce(&valid, at), at)
            }
            None => {
                let Some(newest) = self.window.back() else {
                    return;
                };
                (average_value(newest), average_time(newest))
            }
        };
        self.output.set_value_at(value, at);
    }

    fn reduce(&self, groups: &[&Vec<Reading>], latest: DateTime<Utc>) -> f64 {
        let all = || groups.iter().flat_map(|g| g.iter().map(|r| r.value));
        let count = groups.iter().map(|g| g.len()).sum::<usize>() as f64;
        match self.config.kind {
            FilterKind::Average => all().sum::<f64>() / count,
            FilterKind::Max => all().fold(f64::MIN, f64::max),
            FilterKind::Min => all().fold(f64::MAX, f64::min),
            FilterKind::SumAvg => {
                groups.iter().map(|g| g.iter().map(|r| r.value).sum::<f64>()).sum::<f64>()
                    / groups.len() as f64
            }
            FilterKind::DiffAvg => {
                let pairs: Vec<f64> = groups
                    .iter()
                    .filter(|g| g.len() == 2)
                    .map(|g| g[0].value - g[1].value)
                    .collect();
                if pairs.is_empty() {
                    groups.last().map_or(0.0, |g| average_value(g))
                } else {
                    pairs.iter().sum::<f64>() / pairs.len() as f64
                }
            }
            FilterKind::Triangle => triangle(groups, self.config.length_secs, latest),
            FilterKind::None | FilterKind::Sustained => {
                groups.last().map_or(0.0, |g| average_value(g))
            }
        }
    }
}

/// Weighted average where each group weighs `length - age` seconds.
fn triangle(groups: &[&Vec<Reading>], length_secs: f64, latest: DateTime<Utc>) -> f64 {
    let weight = |g: &[Reading]| length_secs - seconds_between(average_time(g), latest);
    let total: f64 = groups.iter().map(|g| weight(g.as_slice())).sum();
    groups
        .iter()
        .map(|g| average_value(g) * weight(g.as_slice()) / total)
        .sum()
}

fn average_value(group: &[Reading]) -> f64 {
    group.iter().map(|r| r.value).sum::<f64>() / group.len() as f64
}

fn average_time(group: &[Reading]) -> DateTime<Utc> {
    let sum: i128 = group.iter().map(|r| i128::from(r.at.timestamp_micros())).sum();
    let micros = (sum / group.len() as i128) as i64;
    DateTime::from_timestamp_micros(micros).unwrap_or(group[0].at)
}

fn seconds(secs: f64) -> Duration {
    Duration::microseconds((secs * 1_000_000.0) as i64)
}

fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0
}

// ═══════════════════════════════════════════════════════════════
//  Sustained decision filter
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
struct SustainedFilter {
    config: FilterConfig,
    condition: Expression,
    bound: Option<BoundSustained>,
}

#[derive(Debug)]
struct BoundSustained {
    condition: BoundExpression,
    output: Slot,
    target: Slot,
}

impl SustainedFilter {
    fn new(config: FilterConfig) -> Result<Self> {
        let text = config.sources.join(";");
        let condition = Expression::parse(&text)?;
        if !condition.is_boolean() {
            return Err(ExpressionError::NotBoolean {
                name: config.name.clone(),
                expression: text,
            }
            .into());
        }
        Ok(Self {
            config,
            condition,
            bound: None,
        })
    }

    fn target_name(&self) -> String {
        format!("{}_targettime", self.config.name)
    }

    fn initialize(&mut self, description: &VectorDescription) -> Result<()> {
        let name = &self.config.name;
        self.bound = Some(BoundSustained {
            condition: BoundExpression::bind(self.condition.clone(), description, name)?,
            output: description.writable_slot(name, name)?,
            target: description.writable_slot(&self.target_name(), name)?,
        });
        info!(
            "filter {name}: sustained for {}s on '{}'",
            self.config.length_secs,
            self.condition.text()
        );
        Ok(())
    }

    fn apply(&self, vector: &mut DataVector, scratch: &mut Vec<f64>) {
        let Some(bound) = &self.bound else {
            panic!("sustained filter {} applied before initialize", self.config.name);
        };
        let holds = bound.condition.evaluate(vector, scratch) != 0.0;
        if !holds {
            vector.write(bound.target, 0.0);
            vector.write(bound.output, 0.0);
            return;
        }
        let mut target = vector[bound.target.index()];
        if target == 0.0 {
            target = vector.time_after((self.config.length_secs * 1000.0) as i64);
            vector.write(bound.target, target);
            debug!("filter {}: condition met, target {target}", self.config.name);
        }
        let reached = if vector.reached(target) { 1.0 } else { 0.0 };
        vector.write(bound.output, reached);
    }
}
