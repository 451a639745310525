use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Available,
    Denied,
    Restricted,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct HostOptions {
    pub minimum_interval_secs: u64,
    /// Host-portability flags. The in-process host dies with the process,
    /// so these are recorded but cannot be honored here.
    pub continue_after_exit: bool,
    pub start_on_boot: bool,
}

/// In-process stand-in for an OS-level periodic scheduler: one registered
/// job, invoked on a minimum interval, no guarantee about alignment with
/// manual triggers beyond what the run guard provides.
pub struct PeriodicHost {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicHost {
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    /// Replace any previous registration with a new interval loop driving
    /// `tick`. The loop's first firing is one full interval out; startup
    /// does its own bootstrap run.
    pub fn register<F, Fut>(&self, options: HostOptions, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut handle = self.handle.lock().unwrap();
        if let Some(previous) = handle.take() {
            previous.abort();
        }

        if options.continue_after_exit || options.start_on_boot {
            tracing::debug!(
                "continue_after_exit/start_on_boot recorded; in-process host cannot honor them"
            );
        }

        let interval = Duration::from_secs(options.minimum_interval_secs.max(1));
        tracing::info!(interval_secs = interval.as_secs(), "periodic reminder host registered");

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately once; swallow that tick
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tick().await;
            }
        }));
    }

    pub fn unregister(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
            tracing::info!("periodic reminder host unregistered");
        }
    }

    pub fn status(&self) -> HostStatus {
        match self.handle.lock().unwrap().as_ref() {
            Some(handle) if !handle.is_finished() => HostStatus::Available,
            Some(_) => HostStatus::Restricted,
            None => HostStatus::Unknown,
        }
    }
}

impl Default for PeriodicHost {
    fn default() -> Self {
        Self::new()
    }
}
