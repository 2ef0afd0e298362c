//! Per-component update scheduler
//!
//! Requests for a re-render are coalesced and serialized per component.
//! The phase lives in a `watch` channel so callers can observe it, and one
//! worker task per scheduler moves it along:
//!
//! - `Idle` + request: `Scheduled` with deadline `now + delay`
//! - `Scheduled` + request: the deadline is re-armed
//! - deadline reached: `Running`, then `Idle` (or `Scheduled` right away
//!   when a request arrived meanwhile)
//! - `Running` + request: `RunningPending`
//!
//! Every request is reflected by exactly one render that starts after it.

use crate::error::{RuntimeError, RuntimeResult};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scheduled { deadline: Instant },
    Running,
    RunningPending,
}

/// Something the scheduler re-renders
pub trait Renderable: Send + 'static {
    fn render(&mut self) -> BoxFuture<'_, RuntimeResult<()>>;
}

#[derive(Debug, Clone, Default)]
pub struct RenderStatus {
    /// Completed renders, failed ones included
    pub renders: u64,
    pub failures: u64,
    pub last_error: Option<RuntimeError>,
}

pub struct Scheduler<R: Renderable> {
    target: Arc<Mutex<R>>,
    phase: Arc<watch::Sender<Phase>>,
    status: Arc<watch::Sender<RenderStatus>>,
    default_delay: Duration,
    worker: JoinHandle<()>,
}

impl<R: Renderable> Scheduler<R> {
    /// Starts the worker task; must be called inside a tokio runtime
    pub fn new(target: R, default_delay: Duration) -> Self {
        let target = Arc::new(Mutex::new(target));
        let (phase, _) = watch::channel(Phase::Idle);
        let (status, _) = watch::channel(RenderStatus::default());
        let phase = Arc::new(phase);
        let status = Arc::new(status);

        let worker = tokio::spawn(drive(target.clone(), phase.clone(), status.clone()));

        Self {
            target,
            phase,
            status,
            default_delay,
            worker,
        }
    }

    /// Requests a render after the default coalescing delay
    pub fn request_display(&self) {
        self.request_display_after(self.default_delay);
    }

    pub fn request_display_after(&self, delay: Duration) {
        let now = Instant::now();
        self.phase.send_modify(|phase| {
            *phase = match *phase {
                Phase::Idle | Phase::Scheduled { .. } => Phase::Scheduled {
                    deadline: now + delay,
                },
                Phase::Running | Phase::RunningPending => Phase::RunningPending,
            };
        });
        trace!(phase = ?*self.phase.borrow(), "display requested");
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn status(&self) -> RenderStatus {
        self.status.borrow().clone()
    }

    /// Waits until no render is scheduled, running or pending
    pub async fn settled(&self) {
        let mut phase = self.phase.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = phase.wait_for(|phase| *phase == Phase::Idle).await;
    }

    /// Waits until the phase satisfies `predicate`
    pub async fn wait_for_phase(&self, predicate: impl FnMut(&Phase) -> bool) {
        let mut phase = self.phase.subscribe();
        let _ = phase.wait_for(predicate).await;
    }

    /// Cancels a scheduled render, drops a pending repeat and waits for a
    /// running render to finish. Later requests schedule normally again.
    pub async fn cancel(&self) {
        self.phase.send_modify(|phase| {
            *phase = match *phase {
                Phase::Idle | Phase::Scheduled { .. } => Phase::Idle,
                Phase::Running | Phase::RunningPending => Phase::Running,
            };
        });
        self.settled().await;
    }

    /// Exclusive access to the rendered target; waits for a running render
    pub async fn lock(&self) -> MutexGuard<'_, R> {
        self.target.lock().await
    }
}

impl<R: Renderable> Drop for Scheduler<R> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

impl<R: Renderable> std::fmt::Debug for Scheduler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("phase", &self.phase())
            .field("default_delay", &self.default_delay)
            .finish_non_exhaustive()
    }
}

async fn drive<R: Renderable>(
    target: Arc<Mutex<R>>,
    phase: Arc<watch::Sender<Phase>>,
    status: Arc<watch::Sender<RenderStatus>>,
) {
    let mut changes = phase.subscribe();
    loop {
        let current = *changes.borrow_and_update();
        let Phase::Scheduled { deadline } = current else {
            if changes.changed().await.is_err() {
                return;
            }
            continue;
        };

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            changed = changes.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
        }

        let started = phase.send_if_modified(|phase| match *phase {
            Phase::Scheduled { deadline } if deadline <= Instant::now() => {
                *phase = Phase::Running;
                true
            }
            _ => false,
        });
        if !started {
            continue;
        }

        debug!("rendering");
        let result = target.lock().await.render().await;

        status.send_modify(|status| {
            status.renders += 1;
            if let Err(failure) = result {
                error!(error = %failure, "render failed");
                status.failures += 1;
                status.last_error = Some(failure);
            }
        });

        phase.send_modify(|phase| {
            *phase = match *phase {
                Phase::RunningPending => Phase::Scheduled {
                    deadline: Instant::now(),
                },
                _ => Phase::Idle,
            };
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Probe {
        renders: Arc<AtomicU64>,
        started_at: Arc<std::sync::Mutex<Vec<Instant>>>,
        work: Duration,
        fail: bool,
    }

    impl Renderable for Probe {
        fn render(&mut self) -> BoxFuture<'_, RuntimeResult<()>> {
            async move {
                if let Ok(mut started) = self.started_at.lock() {
                    started.push(Instant::now());
                }
                tokio::time::sleep(self.work).await;
                self.renders.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    Err(RuntimeError::Config("probe failure".into()))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_coalesced() {
        let probe = Probe::default();
        let renders = probe.renders.clone();
        let scheduler = Scheduler::new(probe, Duration::from_millis(10));

        for _ in 0..5 {
            scheduler.request_display();
        }
        scheduler.settled().await;

        assert_eq!(renders.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.status().renders, 1);
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_rearms_deadline() {
        let probe = Probe::default();
        let started_at = probe.started_at.clone();
        let scheduler = Scheduler::new(probe, Duration::from_millis(50));
        let start = Instant::now();

        scheduler.request_display();
        tokio::time::sleep(Duration::from_millis(30)).await;
        scheduler.request_display();
        scheduler.settled().await;

        let started_at = started_at.lock().unwrap().clone();
        assert_eq!(started_at.len(), 1);
        assert_eq!(started_at[0] - start, Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_while_running_renders_once_more() {
        let probe = Probe {
            work: Duration::from_millis(100),
            ..Default::default()
        };
        let renders = probe.renders.clone();
        let scheduler = Scheduler::new(probe, Duration::ZERO);

        scheduler.request_display();
        scheduler.wait_for_phase(|phase| *phase == Phase::Running).await;
        scheduler.request_display();
        scheduler.request_display();
        assert_eq!(scheduler.phase(), Phase::RunningPending);

        scheduler.settled().await;
        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_scheduled_render() {
        let probe = Probe::default();
        let renders = probe.renders.clone();
        let scheduler = Scheduler::new(probe, Duration::from_millis(50));

        scheduler.request_display();
        scheduler.cancel().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(renders.load(Ordering::SeqCst), 0);

        scheduler.request_display();
        scheduler.settled().await;
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_waits_for_running_render() {
        let probe = Probe {
            work: Duration::from_millis(100),
            ..Default::default()
        };
        let renders = probe.renders.clone();
        let scheduler = Scheduler::new(probe, Duration::ZERO);

        scheduler.request_display();
        scheduler.wait_for_phase(|phase| *phase == Phase::Running).await;
        scheduler.request_display();
        scheduler.cancel().await;

        assert_eq!(renders.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_recorded_and_scheduling_continues() {
        let probe = Probe {
            fail: true,
            ..Default::default()
        };
        let scheduler = Scheduler::new(probe, Duration::ZERO);

        scheduler.request_display();
        scheduler.settled().await;
        scheduler.request_display();
        scheduler.settled().await;

        let status = scheduler.status();
        assert_eq!(status.renders, 2);
        assert_eq!(status.failures, 2);
        assert!(matches!(status.last_error, Some(RuntimeError::Config(_))));
    }
}
