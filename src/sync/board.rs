use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use super::{CancellableRwLock, CancellationToken};
use crate::app::ports::SampleCollector;
use crate::error::Result;
use crate::sensors::{ConnectionState, InputConfig, SensorSample, board_state_field};

/// Connection bookkeeping for one board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardInfo {
    pub name: String,
    pub port: String,
    pub state: ConnectionState,
    pub reconnects: u32,
}

/// Boards known to the process.
///
/// Reconnect handlers write here from their own threads while the cycle
/// reads board states every period.
#[derive(Debug, Default)]
pub struct BoardRegistry {
    boards: CancellableRwLock<BTreeMap<String, BoardInfo>>,
}

impl BoardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, port: &str, token: &CancellationToken) -> Result<()> {
        let mut boards = self.boards.write(token)?;
        boards.insert(
            name.to_string(),
            BoardInfo {
                name: name.to_string(),
                port: port.to_string(),
                state: ConnectionState::Disconnected,
                reconnects: 0,
            },
        );
        info!("board {name} registered on {port}");
        Ok(())
    }

    /// Record a connection change.  Moving back to `ReceivingValues` after
    /// any other state counts as a reconnect.
    pub fn set_state(
        &self,
        name: &str,
        state: ConnectionState,
        token: &CancellationToken,
    ) -> Result<bool> {
        let mut boards = self.boards.write(token)?;
        let Some(board) = boards.get_mut(name) else {
            return Ok(false);
        };
        if board.state != state {
            if state == ConnectionState::ReceivingValues
                && board.state != ConnectionState::Disconnected
            {
                board.reconnects += 1;
            }
            info!("board {name}: {} -> {state}", board.state);
            board.state = state;
        }
        Ok(true)
    }

    /// Move a board to a new port, e.g. after USB re-enumeration.
    pub fn reassign_port(&self, name: &str, port: &str, token: &CancellationToken) -> Result<bool> {
        let mut boards = self.boards.write(token)?;
        let Some(board) = boards.get_mut(name) else {
            return Ok(false);
        };
        info!("board {name} moved {} -> {port}", board.port);
        board.port = port.to_string();
        Ok(true)
    }

    pub fn get(&self, name: &str, token: &CancellationToken) -> Result<Option<BoardInfo>> {
        Ok(self.boards.read(token)?.get(name).cloned())
    }

    pub fn names(&self, token: &CancellationToken) -> Result<Vec<String>> {
        Ok(self.boards.read(token)?.keys().cloned().collect())
    }
}

/// Reports each board's connection state as a `<board>_state` input, the
/// witness fields redundancy decisions check.
pub struct BoardStateCollector {
    registry: Arc<BoardRegistry>,
    /// Board name and its state input.
    boards: Vec<(String, Arc<InputConfig>)>,
    token: CancellationToken,
}

impl BoardStateCollector {
    /// The set of boards is fixed here; boards registered later are not
    /// reported.
    pub fn new(registry: Arc<BoardRegistry>, token: CancellationToken) -> Result<Self> {
        let boards = registry
            .names(&token)?
            .into_iter()
            .map(|b| {
                let input = Arc::new(InputConfig::new(board_state_field(&b)));
                (b, input)
            })
            .collect();
        Ok(Self {
            registry,
            boards,
            token,
        })
    }
}

impl SampleCollector for BoardStateCollector {
    fn inputs(&self) -> Vec<Arc<InputConfig>> {
        self.boards.iter().map(|(_, input)| Arc::clone(input)).collect()
    }

    fn collect(&mut self, now: DateTime<Utc>, out: &mut Vec<SensorSample>) {
        let boards = match self.registry.boards.read(&self.token) {
            Ok(boards) => boards,
            Err(e) => {
                debug!("board states skipped: {e}");
                return;
            }
        };
        for (board, input) in &self.boards {
            let state = boards
                .get(board)
                .map_or(ConnectionState::Disconnected, |b| b.state);
            out.push(SensorSample::from_input(Arc::clone(input), state.code()).at(now));
        }
    }
}
