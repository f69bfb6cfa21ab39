//! In-process stand-in for the OS periodic task registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::background::scan_task::{BackgroundFetchResult, BackgroundTask};
use crate::core::bluetooth::{
    BACKGROUND_MIN_INTERVAL_SECS, BACKGROUND_TASK_NAME, DEFAULT_BACKGROUND_INTERVAL_SECS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundTaskOptions {
    pub name: String,
    /// Clamped to `BACKGROUND_MIN_INTERVAL_SECS`, like the OS does.
    pub minimum_interval: Duration,
    /// Cancel the task on `shutdown()`. False keeps it running after the
    /// foreground goes away.
    pub stop_on_terminate: bool,
    /// Run the first invocation immediately instead of after one interval.
    pub start_on_boot: bool,
}

impl Default for BackgroundTaskOptions {
    fn default() -> Self {
        Self {
            name: BACKGROUND_TASK_NAME.to_string(),
            minimum_interval: Duration::from_secs(DEFAULT_BACKGROUND_INTERVAL_SECS),
            stop_on_terminate: false,
            start_on_boot: true,
        }
    }
}

struct Registration {
    options: BackgroundTaskOptions,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    last_result: Arc<Mutex<Option<BackgroundFetchResult>>>,
}

#[derive(Default)]
pub struct BackgroundScheduler {
    tasks: Mutex<HashMap<String, Registration>>,
}

impl BackgroundScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `task` under `options.name`, replacing a previous
    /// registration with the same name. Returns the effective interval.
    pub fn register(&self, task: Arc<dyn BackgroundTask>, options: BackgroundTaskOptions) -> Duration {
        let floor = Duration::from_secs(BACKGROUND_MIN_INTERVAL_SECS);
        let interval = if options.minimum_interval < floor {
            warn!(
                "Interval {:?} for {} is below the minimum, using {:?}",
                options.minimum_interval, options.name, floor
            );
            floor
        } else {
            options.minimum_interval
        };

        let cancel = CancellationToken::new();
        let last_result = Arc::new(Mutex::new(None));
        let handle = tokio::spawn(run_periodic(
            task,
            options.name.clone(),
            interval,
            options.start_on_boot,
            cancel.clone(),
            last_result.clone(),
        ));

        let name = options.name.clone();
        let previous = self.tasks.lock().unwrap().insert(
            name.clone(),
            Registration {
                options,
                cancel,
                handle,
                last_result,
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
            info!("Replaced existing background task {}", name);
        }
        info!("Background task {} registered every {:?}", name, interval);
        interval
    }

    pub fn unregister(&self, name: &str) -> bool {
        match self.tasks.lock().unwrap().remove(name) {
            Some(registration) => {
                registration.cancel.cancel();
                info!("Background task {} unregistered", name);
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.tasks
            .lock()
            .unwrap()
            .get(name)
            .is_some_and(|r| !r.handle.is_finished())
    }

    pub fn last_result(&self, name: &str) -> Option<BackgroundFetchResult> {
        let tasks = self.tasks.lock().unwrap();
        let registration = tasks.get(name)?;
        *registration.last_result.lock().unwrap()
    }

    /// Foreground teardown: stops only tasks registered with
    /// `stop_on_terminate`.
    pub fn shutdown(&self) {
        self.tasks.lock().unwrap().retain(|name, registration| {
            if registration.options.stop_on_terminate {
                registration.cancel.cancel();
                info!("Background task {} stopped with the app", name);
                false
            } else {
                true
            }
        });
    }

    pub fn shutdown_all(&self) {
        for (name, registration) in self.tasks.lock().unwrap().drain() {
            registration.cancel.cancel();
            info!("Background task {} stopped", name);
        }
    }
}

async fn run_periodic(
    task: Arc<dyn BackgroundTask>,
    name: String,
    interval: Duration,
    start_on_boot: bool,
    cancel: CancellationToken,
    last_result: Arc<Mutex<Option<BackgroundFetchResult>>>,
) {
    if !start_on_boot {
        tokio::select! {
            _ = sleep(interval) => {}
            _ = cancel.cancelled() => return,
        }
    }

    loop {
        let result = task.run().await;
        *last_result.lock().unwrap() = Some(result);
        match result {
            BackgroundFetchResult::Failed => {
                warn!("Background task {} reported {}", name, result)
            }
            _ => info!("Background task {} reported {}", name, result),
        }

        // A failure waits a full interval like any other result
        tokio::select! {
            _ = sleep(interval) => {}
            _ = cancel.cancelled() => return,
        }
    }
}
