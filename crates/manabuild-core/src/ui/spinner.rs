//! Background spinner for the running step.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{Console, clear_line, theme};

/// Redraw interval
pub const TICK: Duration = Duration::from_millis(100);

/// A spinner redrawn by its own thread until stopped or dropped.
#[derive(Debug)]
pub struct Spinner {
    console: Console,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Start spinning next to `label`. Nothing is drawn unless the console
    /// is a terminal.
    pub fn start(console: &Console, label: impl Into<String>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = console
            .is_terminal()
            .then(|| {
                let console = console.clone();
                let stop = Arc::clone(&stop);
                let label = label.into();
                thread::Builder::new()
                    .name("manabuild-spinner".into())
                    .spawn(move || animate(&console, &stop, &label))
                    .map_err(|e| tracing::debug!(error = %e, "spinner thread unavailable"))
                    .ok()
            })
            .flatten();

        Self {
            console: console.clone(),
            stop,
            handle,
        }
    }

    /// Whether a drawing thread is running
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the animation and erase the spinner line.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            handle.join().ok();
            let mut out = self.console.lock();
            clear_line(&mut **out).ok();
            out.flush().ok();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.halt();
    }
}

fn animate(console: &Console, stop: &AtomicBool, label: &str) {
    let mut tick = 0usize;
    while !stop.load(Ordering::Acquire) {
        {
            let mut out = console.lock();
            if stop.load(Ordering::Acquire) {
                break;
            }
            clear_line(&mut **out).ok();
            write!(out, "{} {label}", theme::spinner_frame(tick)).ok();
            out.flush().ok();
        }
        tick = tick.wrapping_add(1);
        thread::park_timeout(TICK);
    }
}
