use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::CancellationToken;
use crate::error::Result;

/// How long one parked attempt lasts before the token is checked again.
const POLL: Duration = Duration::from_millis(5);

/// Many readers or one writer; waiting on either side can be abandoned
/// through a [`CancellationToken`].
///
/// Writers are preferred: while one is waiting, new readers hold back
/// until it has run, so a steady stream of cycle reads cannot starve a
/// reconfiguration write.  A thread already holding a read guard must not
/// take a second one while a writer waits.
#[derive(Debug, Default)]
pub struct CancellableRwLock<T> {
    inner: RwLock<T>,
    waiting_writers: AtomicUsize,
}

/// Counts one waiting writer for as long as it lives.
struct WaitingWriter<'a>(&'a AtomicUsize);

impl<'a> WaitingWriter<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for WaitingWriter<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T> CancellableRwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
            waiting_writers: AtomicUsize::new(0),
        }
    }

    /// Shared access.  Fails with `Cancelled` if `token` fires before the
    /// lock is free.
    pub fn read(&self, token: &CancellationToken) -> Result<RwLockReadGuard<'_, T>> {
        loop {
            token.check()?;
            if self.waiting_writers.load(Ordering::SeqCst) > 0 {
                token.sleep(POLL)?;
                continue;
            }
            if let Some(guard) = self.inner.try_read_for(POLL) {
                return Ok(guard);
            }
        }
    }

    /// Exclusive access.  Fails with `Cancelled` if `token` fires before
    /// the lock is free.
    pub fn write(&self, token: &CancellationToken) -> Result<RwLockWriteGuard<'_, T>> {
        let _waiting = WaitingWriter::enter(&self.waiting_writers);
        loop {
            token.check()?;
            if let Some(guard) = self.inner.try_write_for(POLL) {
                return Ok(guard);
            }
        }
    }
}
