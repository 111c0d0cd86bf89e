//! Debounced trigger for the external diagram pass.

use std::{fmt, sync::Arc, time::Duration};

use tokio::{runtime::Handle, sync::Notify, task::JoinHandle};
use tracing::debug;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// External collaborator that turns `<pre class="mermaid">` placeholders into diagrams.
pub trait DiagramRunner: Send + Sync {
    fn run(&self);
}

/// Wakes a waiter instead of rendering directly; the binary awaits the
/// notification and then runs the CLI pass over the assembled HTML.
#[derive(Debug, Clone, Default)]
pub struct NotifyRunner(pub Arc<Notify>);

impl NotifyRunner {
    pub fn new() -> Self {
        Self(Arc::new(Notify::new()))
    }

    pub fn notify(&self) -> Arc<Notify> {
        Arc::clone(&self.0)
    }
}

impl DiagramRunner for NotifyRunner {
    fn run(&self) {
        self.0.notify_one();
    }
}

/// Collapses a burst of triggers into a single runner invocation.
///
/// Inside a tokio runtime each trigger aborts the pending task and schedules a
/// new one after `window`. Outside a runtime the trigger is remembered and
/// executed once by [`flush`](Self::flush).
pub struct DiagramDebouncer {
    runner: Option<Arc<dyn DiagramRunner>>,
    window: Duration,
    pending: Option<JoinHandle<()>>,
    deferred: bool,
    triggers: u64,
}

impl DiagramDebouncer {
    pub fn new(runner: Option<Arc<dyn DiagramRunner>>, window: Duration) -> Self {
        Self {
            runner,
            window,
            pending: None,
            deferred: false,
            triggers: 0,
        }
    }

    /// A debouncer with nothing attached; triggers are counted and dropped.
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_DEBOUNCE_WINDOW)
    }

    pub fn set_runner(&mut self, runner: Option<Arc<dyn DiagramRunner>>) {
        self.cancel();
        self.runner = runner;
    }

    pub fn trigger(&mut self) {
        self.triggers += 1;
        let Some(runner) = self.runner.clone() else {
            return;
        };

        if let Some(handle) = self.pending.take() {
            handle.abort();
        }

        match Handle::try_current() {
            Ok(handle) => {
                let window = self.window;
                self.pending = Some(handle.spawn(async move {
                    tokio::time::sleep(window).await;
                    runner.run();
                }));
            }
            Err(_) => {
                self.deferred = true;
            }
        }
    }

    /// Run a deferred trigger now. Scheduled tasks are left to fire on their own.
    pub fn flush(&mut self) {
        if !self.deferred {
            return;
        }
        self.deferred = false;
        if let Some(runner) = &self.runner {
            debug!(
                target = "application::render::diagram",
                triggers = self.triggers,
                "Running deferred diagram pass"
            );
            runner.run();
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.deferred = false;
    }

    pub fn is_pending(&self) -> bool {
        self.deferred || self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Total triggers since construction.
    pub fn triggers(&self) -> u64 {
        self.triggers
    }
}

impl Default for DiagramDebouncer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for DiagramDebouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagramDebouncer")
            .field("has_runner", &self.runner.is_some())
            .field("window", &self.window)
            .field("deferred", &self.deferred)
            .field("scheduled", &self.pending.is_some())
            .field("triggers", &self.triggers)
            .finish()
    }
}
