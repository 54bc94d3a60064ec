//! Console command source.

use std::io::{BufRead, BufReader, Stdin};

use log::warn;

use crate::app::ports::CommandSource;
use crate::sync::CancellationToken;

/// Reads operator commands line by line from any buffered reader,
/// normally standard input.
pub struct LineCommands<R> {
    reader: R,
    buf: String,
}

impl<R: BufRead + Send> LineCommands<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
        }
    }
}

impl LineCommands<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send> CommandSource for LineCommands<R> {
    fn next_line(&mut self, token: &CancellationToken) -> Option<String> {
        if token.is_cancelled() {
            return None;
        }
        self.buf.clear();
        match self.reader.read_line(&mut self.buf) {
            Ok(0) => None,
            Ok(_) => Some(self.buf.trim_end().to_string()),
            Err(e) => {
                warn!("command input failed: {e}");
                None
            }
        }
    }
}
