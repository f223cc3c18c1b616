pub mod closed_processor;
pub mod fulfilled_processor;
pub mod open_processor;
pub mod processors_controller;
pub mod spawning_processor;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::domain::order::order::{LockedOrder, OrderHandle};
use crate::domain::order::order_state::OrderState;
use crate::domain::registry::order_registry::SharedOrderRegistry;
use crate::domain::utils::lock;
use crate::error::Result;

/// Control loop body for the orders of one state bucket.
pub trait OrderProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    /// The bucket this processor consumes.
    fn state(&self) -> OrderState;

    fn registry(&self) -> &SharedOrderRegistry;

    /// Handles one order. Called with the order locked and known to still
    /// be in [`state`](Self::state).
    fn process_order(&self, order: &mut LockedOrder<'_>) -> Result<()>;
}

/// Cooperative stop flag with an interruptible sleep.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        *lock::lock(&self.stopped) = true;
        self.wakeup.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *lock::lock(&self.stopped)
    }

    /// Sleeps up to `timeout`, returning early once triggered.
    ///
    /// # Returns
    /// `true` if the signal was triggered.
    pub fn sleep(&self, timeout: Duration) -> bool {
        let guard = lock::lock(&self.stopped);
        let (guard, _) = self
            .wakeup
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard
    }
}

/// Processes one order taken from the bucket. Errors and panics stay inside
/// this call so the sweep continues with the next order.
pub fn process_handle(processor: &dyn OrderProcessor, handle: &OrderHandle) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut order = handle.lock();
        if order.state() != processor.state() {
            // Moved by someone else (typically a deletion request) since it was picked.
            return Ok(());
        }
        processor.process_order(&mut order)
    }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("{} failed on order {}: {}", processor.name(), handle.id(), e),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("{} panicked on order {}: {}", processor.name(), handle.id(), reason);
        }
    }
}

/// Walks the bucket once from the cursor to the end, then rewinds the cursor.
///
/// # Returns
/// How many orders were visited.
pub fn sweep_once(processor: &dyn OrderProcessor) -> Result<usize> {
    let bucket = processor.registry().bucket(processor.state())?;
    let mut visited = 0;

    while let Some(handle) = bucket.next() {
        process_handle(processor, &handle);
        visited += 1;
    }
    bucket.reset_cursor();

    Ok(visited)
}

/// Runs the processor until `shutdown` is triggered. The current order is
/// always finished before the loop checks the signal.
pub fn run_loop(processor: &dyn OrderProcessor, shutdown: &ShutdownSignal, idle_sleep: Duration) {
    let bucket = match processor.registry().bucket(processor.state()) {
        Ok(bucket) => bucket,
        Err(e) => {
            log::error!("{} can not start: {}", processor.name(), e);
            return;
        }
    };

    log::info!("{} started, sweeping {} orders.", processor.name(), processor.state());
    while !shutdown.is_triggered() {
        match bucket.next() {
            Some(handle) => process_handle(processor, &handle),
            None => {
                bucket.reset_cursor();
                if shutdown.sleep(idle_sleep) {
                    break;
                }
            }
        }
    }
    log::info!("{} stopped.", processor.name());
}
