//! Drive a controller from its own thread on a wall-clock tick.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::command::{Command, CommandSender};
use crate::Controller;

/// A controller running on a background clock thread.
pub struct RunningController {
    sender: CommandSender,
    stop_signal: Arc<AtomicBool>,
    clock: Arc<AtomicU64>,
    thread: Option<JoinHandle<Controller>>,
}

impl RunningController {
    pub(crate) fn spawn(mut controller: Controller, sender: CommandSender, tick: Duration) -> Self {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let clock = Arc::new(AtomicU64::new(controller.transport().now()));
        let elapsed = controller.samples_per(tick);

        let thread_stop = Arc::clone(&stop_signal);
        let thread_clock = Arc::clone(&clock);
        let thread = thread::spawn(move || {
            debug!(elapsed, "clock thread started");
            while !thread_stop.load(Ordering::Relaxed) {
                controller.tick(elapsed);
                thread_clock.store(controller.transport().now(), Ordering::Relaxed);
                thread::sleep(tick);
            }
            controller.drain_commands();
            thread_clock.store(controller.transport().now(), Ordering::Relaxed);
            controller
        });

        Self { sender, stop_signal, clock, thread: Some(thread) }
    }

    /// Queue a command for the next tick; hands it back when the queue is full.
    pub fn send(&mut self, command: Command) -> Result<(), Command> {
        self.sender.send(command)
    }

    /// Transport clock as of the last tick, in samples.
    pub fn now(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    /// Stop the clock thread and take the controller back.
    ///
    /// Commands sent before the call are applied first. Returns `None` if
    /// the thread panicked.
    pub fn stop(mut self) -> Option<Controller> {
        self.join()
    }

    fn join(&mut self) -> Option<Controller> {
        self.stop_signal.store(true, Ordering::Relaxed);
        let handle = self.thread.take()?;
        match handle.join() {
            Ok(controller) => Some(controller),
            Err(_) => {
                warn!("clock thread panicked");
                None
            }
        }
    }
}

impl Drop for RunningController {
    fn drop(&mut self) {
        self.join();
    }
}
