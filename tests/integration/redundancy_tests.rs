//! Redundant sensor fusion through the whole engine: rows in, board
//! states from a live `BoardRegistry`, fused value out.

use std::sync::Arc;

use vector_cycle::app::{CycleEngine, EngineBuilder};
use vector_cycle::config::EngineConfig;
use vector_cycle::rows::{self, ConfigRow};
use vector_cycle::sensors::ConnectionState;
use vector_cycle::sync::{BoardRegistry, BoardStateCollector, CancellationToken};
use vector_cycle::vector::to_vector_ms;

use super::mock_io::{ScriptedCollector, at};

const BOARDS: [(&str, &str); 5] = [
    ("a", "abox"),
    ("b", "bbox"),
    ("c", "cbox"),
    ("d", "dbox"),
    ("e", "ebox"),
];

struct Rig {
    engine: CycleEngine,
    sensors: ScriptedCollector,
    boards: Arc<BoardRegistry>,
    token: CancellationToken,
}

impl Rig {
    fn new(row_lines: &[&str]) -> Self {
        let token = CancellationToken::new();
        let boards = Arc::new(BoardRegistry::new());
        for (i, (_, board)) in BOARDS.iter().enumerate() {
            boards.register(board, &format!("tty{i}"), &token).unwrap();
            boards
                .set_state(board, ConnectionState::ReceivingValues, &token)
                .unwrap();
        }
        let sensors = ScriptedCollector::on_boards(&BOARDS);
        sensors.set_all(&[("a", 10.0), ("b", 14.0), ("c", 17.0), ("d", 19.0), ("e", 20.0)]);

        let builder = EngineBuilder::new(EngineConfig::default())
            .with_token(token.clone())
            .collector(BoardStateCollector::new(Arc::clone(&boards), token.clone()).unwrap())
            .collector(sensors.clone());
        let config_rows: Vec<ConfigRow> = row_lines
            .iter()
            .enumerate()
            .map(|(i, line)| ConfigRow::new(i + 1, *line))
            .collect();
        let parsed =
            rows::parse_rows(&config_rows, |s| builder.board_states_for(s), 0.0).unwrap();
        let engine = builder.rows(parsed).build().unwrap();
        Self {
            engine,
            sensors,
            boards,
            token,
        }
    }

    fn board(&self, name: &str, state: ConnectionState) {
        self.boards.set_state(name, state, &self.token).unwrap();
    }

    fn cycle(&mut self, secs: i64) -> f64 {
        let published = self.engine.run_cycle(at(secs));
        published.vector.value("red5").unwrap()
    }
}

const RED5: [&str; 2] = [
    "RedundantSensors;red5;a;b;c;d;e",
    "RedundantValidRange;red5;0;100",
];

#[test]
fn witnesses_resolve_to_board_state_fields() {
    let rig = Rig::new(&RED5);
    let desc = rig.engine.description();
    for (_, board) in BOARDS {
        assert!(desc.has_item(&format!("{board}_state")));
    }
    assert_eq!(rig.engine.description().descriptors().last(), Some("red5"));
}

#[test]
fn median_follows_boards_and_values() {
    let mut rig = Rig::new(&RED5);
    assert_eq!(rig.cycle(0), 17.0);

    rig.sensors.set("c", 21.0);
    assert_eq!(rig.cycle(1), 19.0);

    // a (10) drops out: 14, 19, 20, 21
    rig.board("abox", ConnectionState::Disconnected);
    assert_eq!(rig.cycle(2), 19.5);

    for (_, board) in BOARDS {
        rig.board(board, ConnectionState::ReadError);
    }
    assert_eq!(rig.cycle(3), 10_000.0);

    rig.board("dbox", ConnectionState::ReceivingValues);
    assert_eq!(rig.cycle(4), 19.0);
}

#[test]
fn out_of_range_values_are_skipped() {
    let mut rig = Rig::new(&RED5);
    rig.sensors.set("e", 150.0);
    rig.sensors.set("d", -1.0);
    // 10, 14, 17
    assert_eq!(rig.cycle(0), 14.0);
}

#[test]
fn strategy_and_invalid_default_rows_apply() {
    let mut rig = Rig::new(&[
        "RedundantSensors;red5;a;b;c;d;e",
        "RedundantStrategy;red5;Max",
        "RedundantInvalidDefault;red5;-1",
    ]);
    assert_eq!(rig.cycle(0), 20.0);
    for (_, board) in BOARDS {
        rig.board(board, ConnectionState::Disconnected);
    }
    assert_eq!(rig.cycle(1), -1.0);
}

#[test]
fn invalid_value_delay_holds_then_falls_back() {
    let mut rig = Rig::new(&[
        "RedundantSensors;red5;a;b;c;d;e",
        "RedundantInvalidValueDelay;2",
    ]);
    assert_eq!(rig.cycle(0), 17.0);

    for (_, board) in BOARDS {
        rig.board(board, ConnectionState::Disconnected);
    }
    assert_eq!(rig.cycle(1), 17.0, "first invalid cycle holds the value");
    assert_eq!(
        rig.engine.vector().value("red5_invalidValueDelay"),
        Some(to_vector_ms(at(3)))
    );
    assert_eq!(rig.cycle(2), 17.0, "still inside the grace period");
    assert_eq!(rig.cycle(3), 10_000.0, "deadline reached");

    rig.board("bbox", ConnectionState::ReceivingValues);
    assert_eq!(rig.cycle(4), 14.0);
    assert_eq!(rig.engine.vector().value("red5_invalidValueDelay"), Some(0.0));
}

#[test]
fn group_without_sensors_fails_to_parse() {
    let row = ConfigRow::new(1, "RedundantValidRange;lonely;0;10");
    let err = rows::parse_rows(&[row], |_| Vec::new(), 0.0).unwrap_err();
    assert!(err.to_string().contains("lonely"), "{err}");
}
