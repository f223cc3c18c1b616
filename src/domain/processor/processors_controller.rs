use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::domain::processor::{OrderProcessor, ShutdownSignal, run_loop};
use crate::error::{Error, Result};

/// Owns one named OS thread per processor.
pub struct ProcessorsController {
    shutdown: Arc<ShutdownSignal>,
    threads: Vec<JoinHandle<()>>,
}

impl ProcessorsController {
    /// Starts every processor on its own thread with its idle sleep.
    pub fn start(processors: Vec<(Arc<dyn OrderProcessor>, Duration)>) -> Result<Self> {
        let shutdown = Arc::new(ShutdownSignal::new());
        let mut controller = ProcessorsController { shutdown: shutdown.clone(), threads: Vec::new() };

        for (processor, idle_sleep) in processors {
            let signal = shutdown.clone();
            let name = processor.name();
            let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
                run_loop(processor.as_ref(), &signal, idle_sleep);
            });

            match spawned {
                Ok(handle) => controller.threads.push(handle),
                Err(e) => {
                    controller.stop();
                    return Err(Error::Unexpected(format!("Failed to spawn processor thread {}: {}", name, e)));
                }
            }
        }

        log::info!("Started {} processor threads.", controller.threads.len());
        Ok(controller)
    }

    pub fn is_running(&self) -> bool {
        !self.threads.is_empty()
    }

    /// Signals every processor and waits for each to finish its current order.
    pub fn stop(&mut self) {
        self.shutdown.trigger();
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("processor").to_string();
            if handle.join().is_err() {
                log::error!("Processor thread {} ended with a panic.", name);
            }
        }
        log::info!("All processor threads stopped.");
    }
}

impl Drop for ProcessorsController {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::order::LockedOrder;
    use crate::domain::order::order_state::OrderState;
    use crate::domain::registry::order_registry::SharedOrderRegistry;

    struct Idle {
        registry: SharedOrderRegistry,
    }

    impl OrderProcessor for Idle {
        fn name(&self) -> &'static str {
            "idle-proc"
        }

        fn state(&self) -> OrderState {
            OrderState::Failed
        }

        fn registry(&self) -> &SharedOrderRegistry {
            &self.registry
        }

        fn process_order(&self, _order: &mut LockedOrder<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stop_interrupts_long_idle_sleeps() {
        let processor: Arc<dyn OrderProcessor> = Arc::new(Idle { registry: SharedOrderRegistry::new() });
        let mut controller = ProcessorsController::start(vec![(processor, Duration::from_secs(3600))]).unwrap();
        assert!(controller.is_running());

        let started = std::time::Instant::now();
        controller.stop();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!controller.is_running());
    }
}
