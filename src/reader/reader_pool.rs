use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use tracing::warn;
use crate::core::error::{Error, ErrorKind, Result};

/// Bounded pool of read slots.
///
/// A slot is held for as long as its `ReaderSlot` lives. When every slot is taken,
/// `acquire` waits up to `wait` for one to be released.
pub struct ReaderPool {
    active: Mutex<usize>,
    released: Condvar,
    max_readers: usize,
    wait: Duration,
}

/// One occupied read slot, released on drop
pub struct ReaderSlot<'p> {
    pool: &'p ReaderPool,
}

impl ReaderPool {
    pub fn new(max_readers: usize, wait_ms: u64) -> Self {
        ReaderPool {
            active: Mutex::new(0),
            released: Condvar::new(),
            max_readers,
            wait: Duration::from_millis(wait_ms),
        }
    }

    pub fn acquire(&self) -> Result<ReaderSlot<'_>> {
        let deadline = Instant::now() + self.wait;
        let mut active = self.active.lock();
        while *active >= self.max_readers {
            if self.released.wait_until(&mut active, deadline).timed_out() && *active >= self.max_readers {
                warn!(max_readers = self.max_readers, wait_ms = self.wait.as_millis() as u64, "no reader slot available");
                return Err(Error::new(
                    ErrorKind::ResourceExhausted,
                    format!("all {} reader slots busy", self.max_readers),
                ));
            }
        }
        *active += 1;
        Ok(ReaderSlot { pool: self })
    }

    pub fn active(&self) -> usize {
        *self.active.lock()
    }

    pub fn max_readers(&self) -> usize {
        self.max_readers
    }

    fn release(&self) {
        let mut active = self.active.lock();
        *active -= 1;
        self.released.notify_one();
    }
}

impl Drop for ReaderSlot<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}
