//! Shutdown signalling and shared board state.
//!
//! - [`CancellationToken`]: one cooperative stop flag for the command
//!   thread and the cycle loop.
//! - [`CancellableRwLock`]: many readers or one writer, with waits that a
//!   token can abandon.
//! - [`BoardRegistry`]: board connection info behind that lock, written by
//!   reconnect events and read by the cycle.

pub mod board;
mod cancel;
mod rwlock;

pub use board::{BoardInfo, BoardRegistry, BoardStateCollector};
pub use cancel::CancellationToken;
pub use rwlock::CancellableRwLock;
