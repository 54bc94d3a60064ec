//! Typed configuration rows.
//!
//! Reading IOconf files is someone else's job; this module starts from a
//! row that has already been located and split:
//!
//! ```text
//!   "RedundantValidRange;oven;0;2000"   line 12
//!        │
//!        ▼  ConfigRow::new
//!   fields = ["RedundantValidRange", "oven", "0", "2000"]
//!        │
//!        ▼  parse_rows
//!   EngineRows { maths, filters, redundancies }
//! ```
//!
//! Every fault carries the row text, its line and the expected format.

use std::str::FromStr;

use crate::decision::{RedundancyConfig, RedundancyStrategy};
use crate::error::{ConfigError, Error, Result};
use crate::expansion::{FilterConfig, FilterKind, MathConfig};

pub const MATH_FORMAT: &str = "Math;Name;math expression";
pub const FILTER_FORMAT: &str = "Filter;Name;FilterType;FilterLength;SourceNames;[hidesource]";
pub const SENSORS_FORMAT: &str = "RedundantSensors;Name;Sensor1;Sensor2...;Sensorn";
pub const RANGE_FORMAT: &str = "RedundantValidRange;Name;MinValue;MaxValue";
pub const DEFAULT_FORMAT: &str = "RedundantInvalidDefault;Name;InvalidDefaultValue";
pub const STRATEGY_FORMAT: &str = "RedundantStrategy;Name;Median/Max/Min/Average";
pub const DELAY_FORMAT: &str = "RedundantInvalidValueDelay;DelaySeconds";

/// Invalid default used when a group has no `RedundantInvalidDefault` row.
pub const DEFAULT_INVALID_VALUE: f64 = 10_000.0;

/// Upper bound for any duration given in seconds (filter lengths, invalid
/// value delay): one year.
pub const MAX_DURATION_SECS: f64 = 365.0 * 24.0 * 3600.0;

const HIDE_SOURCE: &str = "hidesource";

// ───────────────────────────────────────────────────────────────
// Row
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRow {
    pub line: usize,
    pub text: String,
    pub fields: Vec<String>,
}

impl ConfigRow {
    /// Split `text` on `;`, dropping a trailing `//` comment.
    ///
    /// Empty fields keep their position; only trailing ones are dropped, so
    /// a blank line has no fields.
    pub fn new(line: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let content = text.split("//").next().unwrap_or_default();
        let mut fields: Vec<String> = content.split(';').map(|f| f.trim().to_string()).collect();
        while fields.last().is_some_and(String::is_empty) {
            fields.pop();
        }
        Self { line, text, fields }
    }

    pub fn row_type(&self) -> &str {
        self.fields.first().map_or("", String::as_str)
    }

    pub fn name(&self) -> &str {
        self.fields.get(1).map_or("", String::as_str)
    }

    fn bad(&self, reason: impl Into<String>, format: &'static str) -> Error {
        ConfigError::BadRow {
            reason: reason.into(),
            format,
            row: self.text.clone(),
            line: self.line,
        }
        .into()
    }

    fn min_fields(&self, count: usize, format: &'static str) -> Result<()> {
        if self.fields.len() < count {
            return Err(self.bad("Too few values", format));
        }
        Ok(())
    }

    /// The row name, which must not be empty.
    fn named(&self, format: &'static str) -> Result<String> {
        match self.name() {
            "" => Err(self.bad("Empty name", format)),
            name => Ok(name.to_string()),
        }
    }

    fn number(&self, index: usize, what: &str, format: &'static str) -> Result<f64> {
        let field = &self.fields[index];
        if field.is_empty() {
            return Err(self.bad(format!("Empty {what}"), format));
        }
        field
            .parse::<f64>()
            .map_err(|_| self.bad(format!("Failed to parse {what}"), format))
    }

    /// A duration in seconds within `0..=MAX_DURATION_SECS`.
    fn seconds(&self, index: usize, what: &str, format: &'static str) -> Result<f64> {
        let secs = self.number(index, what, format)?;
        if !(0.0..=MAX_DURATION_SECS).contains(&secs) {
            return Err(self.bad(
                format!("Invalid {what}: must be between 0 and {MAX_DURATION_SECS} seconds"),
                format,
            ));
        }
        Ok(secs)
    }

    /// Names from `index` on; none of them may be empty.
    fn names_from(&self, index: usize, what: &str, format: &'static str) -> Result<Vec<String>> {
        let names = self.fields.get(index..).unwrap_or_default().to_vec();
        if names.iter().any(String::is_empty) {
            return Err(self.bad(format!("Empty {what}"), format));
        }
        Ok(names)
    }
}

// ───────────────────────────────────────────────────────────────
// Math and Filter
// ───────────────────────────────────────────────────────────────

pub fn parse_math(row: &ConfigRow) -> Result<MathConfig> {
    row.min_fields(3, MATH_FORMAT)?;
    let name = row.named(MATH_FORMAT)?;
    let expression = row.fields[2..].join(";");
    MathConfig::new(&name, &expression)
        .map_err(|e| row.bad(format!("wrong format - expression: {e}"), MATH_FORMAT))
}

/// Sustained rows carry a condition in place of sources; any `;` inside it
/// is kept.
pub fn parse_filter(row: &ConfigRow) -> Result<FilterConfig> {
    row.min_fields(5, FILTER_FORMAT)?;
    let name = row.named(FILTER_FORMAT)?;
    let kind = FilterKind::from_str(&row.fields[2])
        .map_err(|()| row.bad("Wrong filter type", FILTER_FORMAT))?;
    let length_secs = row.seconds(3, "filter length", FILTER_FORMAT)?;

    let mut sources = if kind == FilterKind::Sustained {
        row.fields[4..].to_vec()
    } else {
        row.names_from(4, "source name", FILTER_FORMAT)?
    };
    let hide_source = sources.last().is_some_and(|s| s == HIDE_SOURCE);
    if hide_source {
        sources.pop();
    }
    if sources.is_empty() {
        return Err(row.bad("Missing source names", FILTER_FORMAT));
    }
    if kind == FilterKind::Sustained {
        sources = vec![sources.join(";")];
    }
    Ok(FilterConfig {
        name,
        kind,
        length_secs,
        sources,
        hide_source,
    })
}

// ───────────────────────────────────────────────────────────────
// Redundancy
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RedundantRow {
    Sensors { name: String, sensors: Vec<String> },
    ValidRange { name: String, min: f64, max: f64 },
    InvalidDefault { name: String, value: f64 },
    Strategy { name: String, strategy: RedundancyStrategy },
}

impl RedundantRow {
    pub fn name(&self) -> &str {
        match self {
            Self::Sensors { name, .. }
            | Self::ValidRange { name, .. }
            | Self::InvalidDefault { name, .. }
            | Self::Strategy { name, .. } => name,
        }
    }
}

/// Parse one of the per-decision `Redundant*` rows.  Returns `Ok(None)` for
/// any other row type.
pub fn parse_redundant(row: &ConfigRow) -> Result<Option<RedundantRow>> {
    let parsed = match row.row_type() {
        "RedundantSensors" => {
            let name = row.named(SENSORS_FORMAT)?;
            let sensors = row.names_from(2, "sensor name", SENSORS_FORMAT)?;
            if sensors.is_empty() {
                return Err(row.bad("Missing sensors", SENSORS_FORMAT));
            }
            RedundantRow::Sensors { name, sensors }
        }
        "RedundantValidRange" => {
            row.min_fields(4, RANGE_FORMAT)?;
            let name = row.named(RANGE_FORMAT)?;
            let min = row.number(2, "min", RANGE_FORMAT)?;
            let max = row.number(3, "max", RANGE_FORMAT)?;
            RedundantRow::ValidRange { name, min, max }
        }
        "RedundantInvalidDefault" => {
            row.min_fields(3, DEFAULT_FORMAT)?;
            let name = row.named(DEFAULT_FORMAT)?;
            let value = row.number(2, "invalid default value", DEFAULT_FORMAT)?;
            RedundantRow::InvalidDefault { name, value }
        }
        "RedundantStrategy" => {
            row.min_fields(3, STRATEGY_FORMAT)?;
            let name = row.named(STRATEGY_FORMAT)?;
            let strategy = RedundancyStrategy::from_str(&row.fields[2])
                .map_err(|()| row.bad("Failed to parse strategy", STRATEGY_FORMAT))?;
            RedundantRow::Strategy { name, strategy }
        }
        _ => return Ok(None),
    };
    Ok(Some(parsed))
}

/// `RedundantInvalidValueDelay;DelaySeconds`, process-wide.
pub fn parse_invalid_value_delay(row: &ConfigRow) -> Result<f64> {
    row.min_fields(2, DELAY_FORMAT)?;
    row.seconds(1, "delay", DELAY_FORMAT)
}

/// Group `Redundant*` rows by name into decision configs, in order of first
/// appearance.
///
/// `board_states(sensor)` lists the witness fields of one sensor.  Absent
/// rows fall back to an unbounded range, [`DEFAULT_INVALID_VALUE`] and
/// `Median`.
pub fn redundancy_configs(
    rows: &[(ConfigRow, RedundantRow)],
    board_states: impl Fn(&str) -> Vec<String>,
    invalid_value_delay_secs: f64,
) -> Result<Vec<RedundancyConfig>> {
    let mut names: Vec<&str> = Vec::new();
    for (_, parsed) in rows {
        if !names.contains(&parsed.name()) {
            names.push(parsed.name());
        }
    }

    let mut configs = Vec::with_capacity(names.len());
    for name in names {
        let group: Vec<_> = rows.iter().filter(|(_, r)| r.name() == name).collect();
        let mut sensors = None;
        let mut range = (f64::MIN, f64::MAX);
        let mut invalid_default = DEFAULT_INVALID_VALUE;
        let mut strategy = RedundancyStrategy::default();
        for (_, parsed) in &group {
            match parsed {
                RedundantRow::Sensors { sensors: s, .. } => sensors = Some(s.clone()),
                RedundantRow::ValidRange { min, max, .. } => range = (*min, *max),
                RedundantRow::InvalidDefault { value, .. } => invalid_default = *value,
                RedundantRow::Strategy { strategy: s, .. } => strategy = *s,
            }
        }
        let Some(sensors) = sensors else {
            let rows = group
                .iter()
                .map(|(row, _)| row.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(ConfigError::MissingSensors {
                name: name.to_string(),
                rows,
            }
            .into());
        };
        let witnesses = sensors.iter().map(|s| board_states(s.as_str())).collect();
        let config =
            RedundancyConfig::new(name, sensors, witnesses, range, invalid_default, strategy)?
                .with_invalid_value_delay(invalid_value_delay_secs);
        configs.push(config);
    }
    Ok(configs)
}

// ───────────────────────────────────────────────────────────────
// All rows
// ───────────────────────────────────────────────────────────────

/// The typed rows the engine consumes.
#[derive(Debug, Default)]
pub struct EngineRows {
    pub maths: Vec<MathConfig>,
    pub filters: Vec<FilterConfig>,
    pub redundancies: Vec<RedundancyConfig>,
}

/// Convert every row the engine understands; other row types are skipped.
///
/// A `RedundantInvalidValueDelay` row overrides `default_delay_secs`.
pub fn parse_rows(
    rows: &[ConfigRow],
    board_states: impl Fn(&str) -> Vec<String>,
    default_delay_secs: f64,
) -> Result<EngineRows> {
    let mut out = EngineRows::default();
    let mut redundant = Vec::new();
    let mut delay = default_delay_secs;
    for row in rows {
        match row.row_type() {
            "Math" => out.maths.push(parse_math(row)?),
            "Filter" => out.filters.push(parse_filter(row)?),
            "RedundantInvalidValueDelay" => delay = parse_invalid_value_delay(row)?,
            _ => {
                if let Some(parsed) = parse_redundant(row)? {
                    redundant.push((row.clone(), parsed));
                }
            }
        }
    }
    out.redundancies = redundancy_configs(&redundant, board_states, delay)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(lines: &[&str]) -> Vec<ConfigRow> {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| ConfigRow::new(i + 1, *l))
            .collect()
    }

    fn witnesses(sensor: &str) -> Vec<String> {
        vec![format!("{}box_state", &sensor[..1])]
    }

    #[test]
    fn splits_fields_and_strips_comments() {
        let row = ConfigRow::new(3, "Math; total ;a + b // sum of both");
        assert_eq!(row.fields, ["Math", "total", "a + b"]);
        assert_eq!(row.row_type(), "Math");
        assert_eq!(row.name(), "total");
    }

    #[test]
    fn math_row_compiles_expression() {
        let m = parse_math(&ConfigRow::new(1, "Math;MyMath;MyName + 2")).unwrap();
        assert_eq!(m.name, "MyMath");
        assert_eq!(m.expression.sources(), ["MyName".to_string()]);
    }

    #[test]
    fn bad_math_row_reports_format() {
        let err = parse_math(&ConfigRow::new(7, "Math;MyMath;MyName +")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(MATH_FORMAT), "{msg}");
        assert!(msg.contains("Line 7"), "{msg}");
    }

    #[test]
    fn filter_row_with_hidesource() {
        let f = parse_filter(&ConfigRow::new(1, "Filter;t;Triangle;5;a;b;hidesource")).unwrap();
        assert_eq!(f.kind, FilterKind::Triangle);
        assert_eq!(f.length_secs, 5.0);
        assert_eq!(f.sources, ["a", "b"]);
        assert!(f.hide_source);
    }

    #[test]
    fn sustained_filter_keeps_condition_whole() {
        let f = parse_filter(&ConfigRow::new(1, "Filter;hot;Sustained;2;temp > 40")).unwrap();
        assert_eq!(f.kind, FilterKind::Sustained);
        assert_eq!(f.sources, ["temp > 40"]);
        assert!(!f.hide_source);
    }

    #[test]
    fn wrong_filter_type_fails() {
        let err = parse_filter(&ConfigRow::new(1, "Filter;t;Wobble;5;a")).unwrap_err();
        assert!(err.to_string().contains("Wrong filter type"));
    }

    #[test]
    fn redundancy_defaults_apply() {
        let parsed = parse_rows(
            &rows(&["RedundantSensors;red;a;b"]),
            witnesses,
            0.0,
        )
        .unwrap();
        let c = &parsed.redundancies[0];
        assert_eq!(c.name(), "red");
        assert_eq!(c.valid_range(), (f64::MIN, f64::MAX));
        assert_eq!(c.default_invalid_value(), DEFAULT_INVALID_VALUE);
        assert_eq!(c.strategy(), RedundancyStrategy::Median);
    }

    #[test]
    fn redundancy_rows_group_by_name() {
        let parsed = parse_rows(
            &rows(&[
                "RedundantSensors;red;a;b;c",
                "RedundantSensors;other;d",
                "RedundantValidRange;red;0;2000",
                "RedundantInvalidDefault;red;-1",
                "RedundantStrategy;red;Max",
                "RedundantInvalidValueDelay;2",
                "Math;m;a * 2",
                "Unrelated;row",
            ]),
            witnesses,
            0.0,
        )
        .unwrap();
        assert_eq!(parsed.maths.len(), 1);
        assert_eq!(parsed.redundancies.len(), 2);
        let red = &parsed.redundancies[0];
        assert_eq!(red.sensors(), ["a", "b", "c"]);
        assert_eq!(red.valid_range(), (0.0, 2000.0));
        assert_eq!(red.default_invalid_value(), -1.0);
        assert_eq!(red.strategy(), RedundancyStrategy::Max);
        assert_eq!(red.invalid_value_delay_secs(), 2.0);
        assert_eq!(parsed.redundancies[1].name(), "other");
    }

    #[test]
    fn missing_sensors_lists_group_rows() {
        let err = parse_rows(
            &rows(&["RedundantValidRange;red;0;10", "RedundantStrategy;red;Min"]),
            witnesses,
            0.0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::Config(ConfigError::MissingSensors {
                name: "red".into(),
                rows: "RedundantValidRange;red;0;10\nRedundantStrategy;red;Min".into(),
            })
        );
    }

    #[test]
    fn malformed_redundant_rows_report_format() {
        for (line, format) in [
            ("RedundantValidRange;red;0", RANGE_FORMAT),
            ("RedundantValidRange;red;zero;10", RANGE_FORMAT),
            ("RedundantInvalidDefault;red;x", DEFAULT_FORMAT),
            ("RedundantStrategy;red;Mode", STRATEGY_FORMAT),
            ("RedundantSensors;red", SENSORS_FORMAT),
        ] {
            let err = parse_redundant(&ConfigRow::new(1, line)).unwrap_err();
            assert!(
                matches!(&err, Error::Config(ConfigError::BadRow { format: f, .. }) if *f == format),
                "{line}: {err}"
            );
        }
    }

    #[test]
    fn negative_delay_is_rejected() {
        assert!(parse_invalid_value_delay(&ConfigRow::new(1, "RedundantInvalidValueDelay;-3")).is_err());
        assert_eq!(
            parse_invalid_value_delay(&ConfigRow::new(1, "RedundantInvalidValueDelay;1.5")),
            Ok(1.5)
        );
    }

    fn bad_row_format(err: &Error) -> Option<&'static str> {
        match err {
            Error::Config(ConfigError::BadRow { format, .. }) => Some(format),
            _ => None,
        }
    }

    #[test]
    fn unbounded_delays_are_rejected() {
        for delay in ["inf", "-inf", "NaN", "1e300", "31536001"] {
            let row = ConfigRow::new(1, format!("RedundantInvalidValueDelay;{delay}"));
            let err = parse_invalid_value_delay(&row).unwrap_err();
            assert_eq!(bad_row_format(&err), Some(DELAY_FORMAT), "{delay}: {err}");
        }
        let row = ConfigRow::new(1, format!("RedundantInvalidValueDelay;{MAX_DURATION_SECS}"));
        assert_eq!(parse_invalid_value_delay(&row), Ok(MAX_DURATION_SECS));
    }

    #[test]
    fn infinite_delay_row_fails_the_whole_parse() {
        let err = parse_rows(
            &rows(&["RedundantSensors;red;a;b", "RedundantInvalidValueDelay;inf"]),
            witnesses,
            0.0,
        )
        .unwrap_err();
        assert_eq!(bad_row_format(&err), Some(DELAY_FORMAT));
    }

    #[test]
    fn unbounded_filter_lengths_are_rejected() {
        for length in ["inf", "-inf", "NaN", "-1", "1e13"] {
            for kind in ["Average", "Sustained"] {
                let row = ConfigRow::new(1, format!("Filter;f;{kind};{length};a"));
                let err = parse_filter(&row).unwrap_err();
                assert_eq!(bad_row_format(&err), Some(FILTER_FORMAT), "{kind} {length}: {err}");
                assert!(err.to_string().contains("filter length"), "{err}");
            }
        }
        let zero = parse_filter(&ConfigRow::new(1, "Filter;f;Average;0;a")).unwrap();
        assert_eq!(zero.length_secs, 0.0);
    }

    #[test]
    fn empty_fields_keep_their_position() {
        let row = ConfigRow::new(4, "RedundantValidRange;r;;100");
        assert_eq!(row.fields, ["RedundantValidRange", "r", "", "100"]);
        let err = parse_redundant(&row).unwrap_err();
        assert_eq!(bad_row_format(&err), Some(RANGE_FORMAT));
        let msg = err.to_string();
        assert!(msg.contains("Empty min"), "{msg}");
        assert!(!msg.contains("Too few values"), "{msg}");
    }

    #[test]
    fn trailing_separators_and_blank_lines_add_no_fields() {
        assert!(ConfigRow::new(1, "").fields.is_empty());
        assert!(ConfigRow::new(1, " ; ; // note").fields.is_empty());
        let f = parse_filter(&ConfigRow::new(1, "Filter;t;Average;5;a;b;")).unwrap();
        assert_eq!(f.sources, ["a", "b"]);
    }

    #[test]
    fn empty_names_are_reported() {
        for (line, format) in [
            ("RedundantSensors;red;a;;b", SENSORS_FORMAT),
            ("RedundantSensors;;a;b", SENSORS_FORMAT),
            ("Filter;t;Average;5;a;;b", FILTER_FORMAT),
            ("Math;;a + 1", MATH_FORMAT),
        ] {
            let row = ConfigRow::new(1, line);
            let err = match row.row_type() {
                "Math" => parse_math(&row).map(|_| ()),
                "Filter" => parse_filter(&row).map(|_| ()),
                _ => parse_redundant(&row).map(|_| ()),
            }
            .unwrap_err();
            assert_eq!(bad_row_format(&err), Some(format), "{line}: {err}");
            assert!(err.to_string().contains("Empty"), "{line}: {err}");
        }
    }
}
