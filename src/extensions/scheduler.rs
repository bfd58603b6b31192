//! Supervised background loops for scheduled-loop extensions
//!
//! Each loop cog gets exactly one supervising task running a
//! wait/execute cycle. Cancellation is cooperative: the stop signal is
//! observed when the current wait resumes and at the top of each cycle,
//! never mid-`execute`, so teardown latency is bounded by one
//! wait/execute cycle of that loop.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::extensions::cog::LoopCog;

/// Wait between cycles when a loop cog supplies no policy of its own.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(300);

/// How a loop suspends between cycles.
#[derive(Debug, Clone)]
pub enum WaitPolicy {
    /// Sleep a fixed duration.
    Fixed(Duration),
    /// Suspend until the next fire time of a cron schedule.
    Cron(Box<Schedule>),
    /// Sleep a random duration drawn from `[min, max]`.
    Between { min: Duration, max: Duration },
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy::Fixed(DEFAULT_WAIT)
    }
}

impl WaitPolicy {
    /// Delay until the next cycle. `None` means the schedule has no
    /// further occurrences and the loop should stop.
    fn next_delay(&self) -> Option<Duration> {
        match self {
            WaitPolicy::Fixed(d) => Some(*d),
            WaitPolicy::Between { min, max } => {
                if max <= min {
                    return Some(*min);
                }
                let span = max.saturating_sub(*min).as_millis() as u64;
                let offset = rand::thread_rng().gen_range(0..=span);
                Some(*min + Duration::from_millis(offset))
            }
            WaitPolicy::Cron(schedule) => {
                let next = schedule.upcoming(Utc).next()?;
                Some((next - Utc::now()).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }
}

/// Handle to one supervised loop.
///
/// `stop` flips the cooperative cancellation signal exactly once; the
/// supervising task exits at its next checkpoint. There is no hard kill
/// of a running `execute`.
pub struct LoopHandle {
    pub extension: String,
    pub cog: String,
    cancel: CancellationToken,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl LoopHandle {
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the supervising task to exit. Best-effort: a blocked
    /// `execute` delays this until it returns.
    pub async fn join(&self) {
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// Owns the supervising task of every scheduled-loop cog.
pub struct LoopScheduler {
    handles: RwLock<HashMap<String, Vec<Arc<LoopHandle>>>>,
}

impl LoopScheduler {
    pub fn new() -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Spawn the supervising task for one loop cog.
    pub fn spawn(&self, extension: &str, cog: Arc<dyn LoopCog>) -> Arc<LoopHandle> {
        let cancel = CancellationToken::new();
        let cog_name = cog.name().to_string();
        let task = tokio::spawn(run_loop(extension.to_string(), cog, cancel.clone()));

        let handle = Arc::new(LoopHandle {
            extension: extension.to_string(),
            cog: cog_name,
            cancel,
            task: tokio::sync::Mutex::new(Some(task)),
        });

        let mut handles = write_handles(&self.handles);
        handles
            .entry(extension.to_string())
            .or_default()
            .push(handle.clone());
        handle
    }

    /// Signal every loop of an extension to stop and drop the scheduler's
    /// bookkeeping for them. Returns the handles so callers may await
    /// task exit if they want to observe teardown.
    pub fn stop_extension(&self, extension: &str) -> Vec<Arc<LoopHandle>> {
        let handles = write_handles(&self.handles)
            .remove(extension)
            .unwrap_or_default();
        for handle in &handles {
            handle.stop();
        }
        handles
    }

    /// Loops currently tracked for an extension.
    pub fn loop_count(&self, extension: &str) -> usize {
        read_handles(&self.handles)
            .get(extension)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

impl Default for LoopScheduler {
    fn default() -> Self {
        Self::new()
    }
}

type HandleMap = HashMap<String, Vec<Arc<LoopHandle>>>;

fn read_handles(lock: &RwLock<HandleMap>) -> std::sync::RwLockReadGuard<'_, HandleMap> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_handles(lock: &RwLock<HandleMap>) -> std::sync::RwLockWriteGuard<'_, HandleMap> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Supervising task body: preconfigure once, then wait/execute until the
/// cancellation signal is observed.
async fn run_loop(extension: String, cog: Arc<dyn LoopCog>, cancel: CancellationToken) {
    if let Err(e) = cog.preconfigure().await {
        error!(
            "Loop '{}/{}' preconfigure failed, loop will not start: {}",
            extension,
            cog.name(),
            e
        );
        return;
    }

    info!("Loop '{}/{}' started", extension, cog.name());

    while !cancel.is_cancelled() {
        let policy = cog.wait_policy();
        let Some(delay) = policy.next_delay() else {
            info!(
                "Loop '{}/{}' schedule has no further occurrences, stopping",
                extension,
                cog.name()
            );
            break;
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        // A stop requested during the sleep must win before execute runs.
        if cancel.is_cancelled() {
            break;
        }

        if let Err(e) = cog.execute().await {
            warn!("Loop '{}/{}' execute failed: {}", extension, cog.name(), e);
        }
    }

    info!("Loop '{}/{}' stopped", extension, cog.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::ExtensionError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoop {
        wait: Duration,
        executions: AtomicUsize,
        fail_preconfig: bool,
        fail_execute: bool,
    }

    impl CountingLoop {
        fn new(wait: Duration) -> Self {
            Self {
                wait,
                executions: AtomicUsize::new(0),
                fail_preconfig: false,
                fail_execute: false,
            }
        }
    }

    #[async_trait]
    impl LoopCog for CountingLoop {
        fn name(&self) -> &str {
            "counting"
        }

        async fn preconfigure(&self) -> Result<(), ExtensionError> {
            if self.fail_preconfig {
                return Err(ExtensionError::MissingConfig("channel".to_string()));
            }
            Ok(())
        }

        fn wait_policy(&self) -> WaitPolicy {
            WaitPolicy::Fixed(self.wait)
        }

        async fn execute(&self) -> Result<(), ExtensionError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if self.fail_execute {
                return Err(ExtensionError::Execution("boom".to_string()));
            }
            Ok(())
        }
    }

    struct BareLoop;

    #[async_trait]
    impl LoopCog for BareLoop {
        fn name(&self) -> &str {
            "bare"
        }
    }

    #[tokio::test]
    async fn loop_executes_until_stopped() {
        let scheduler = LoopScheduler::new();
        let cog = Arc::new(CountingLoop::new(Duration::from_millis(10)));
        let handle = scheduler.spawn("test", cog.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_running());

        let handles = scheduler.stop_extension("test");
        assert_eq!(handles.len(), 1);
        for h in &handles {
            h.join().await;
        }

        let count = cog.executions.load(Ordering::SeqCst);
        assert!(count >= 1, "expected at least one execution, got {}", count);

        // No further executions after the task has exited.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cog.executions.load(Ordering::SeqCst), count);
        assert!(!handle.is_running());
        assert_eq!(scheduler.loop_count("test"), 0);
    }

    #[tokio::test]
    async fn stop_during_wait_prevents_next_execute() {
        let scheduler = LoopScheduler::new();
        let cog = Arc::new(CountingLoop::new(Duration::from_secs(3600)));
        let handle = scheduler.spawn("test", cog.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop();
        handle.join().await;

        assert_eq!(cog.executions.load(Ordering::SeqCst), 0);
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn preconfigure_failure_is_fatal_to_the_loop() {
        let scheduler = LoopScheduler::new();
        let mut cog = CountingLoop::new(Duration::from_millis(5));
        cog.fail_preconfig = true;
        let cog = Arc::new(cog);
        let handle = scheduler.spawn("test", cog.clone());

        handle.join().await;
        assert_eq!(cog.executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn execute_errors_do_not_stop_the_loop() {
        let scheduler = LoopScheduler::new();
        let mut cog = CountingLoop::new(Duration::from_millis(10));
        cog.fail_execute = true;
        let cog = Arc::new(cog);
        let handle = scheduler.spawn("test", cog.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        handle.join().await;

        assert!(
            cog.executions.load(Ordering::SeqCst) >= 2,
            "loop should keep cycling past execute errors"
        );
    }

    #[tokio::test]
    async fn unimplemented_execute_raises() {
        let cog = BareLoop;
        let err = cog.execute().await.unwrap_err();
        assert!(matches!(err, ExtensionError::NotImplemented("execute")));
    }

    #[test]
    fn between_policy_stays_in_range() {
        let policy = WaitPolicy::Between {
            min: Duration::from_millis(100),
            max: Duration::from_millis(200),
        };
        for _ in 0..20 {
            let d = policy.next_delay().unwrap();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn cron_policy_yields_future_delay() {
        use std::str::FromStr;
        // Every second.
        let schedule = Schedule::from_str("* * * * * * *").unwrap();
        let policy = WaitPolicy::Cron(Box::new(schedule));
        let d = policy.next_delay().unwrap();
        assert!(d <= Duration::from_secs(1));
    }
}
