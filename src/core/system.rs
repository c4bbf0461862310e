//! # System: one boot of the control loop.
//!
//! [`System::run`] builds every component from scratch, runs until a reset or
//! a shutdown request, tears everything down and reports how it ended through
//! [`Exit`]. Calling `run` again is a fresh boot: new channel, flags,
//! heartbeats, counters, watchdog.
//!
//! ## Architecture
//! ```text
//! run():
//!   Bus ──► subscriber_listener ──► SubscriberSet ──► LogWriter / custom
//!   Context { channel, status, heartbeats, bus, watchdog }
//!   JoinSet:
//!     ├─ Supervisor::run   (owns Producer + Consumer handles)
//!     └─ Watchdog::monitor
//!
//! end of boot (first wins):
//!   ResetLine::triggered()          → Exit::Reset(reason)
//!   OS signal / request_shutdown()  → ShutdownRequested → Exit::Shutdown
//!   supervisor or monitor gone      → ResetReason::SupervisorLost
//!
//! teardown:
//!   runtime_token.cancel() → wait up to `grace`
//!     ├─ all joined → AllStoppedWithin
//!     └─ timeout    → GraceExceeded (Shutdown: RuntimeError::GraceExceeded)
//!   listener drained → SubscriberSet::shutdown (flush)
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::builder::{SystemBuilder, WorkerFactory};
use crate::core::reset::{ResetLine, ResetReason};
use crate::core::supervisor::Supervisor;
use crate::core::shutdown;
use crate::core::watchdog::Watchdog;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::shared::{Context, MemoryProbe};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::WorkerSpec;

const SUPERVISOR: &str = "supervisor";
const WATCHDOG: &str = "watchdog";

/// How one boot ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// Graceful stop after a shutdown request; do not boot again.
    Shutdown,
    /// Terminal escalation; boot again from initial state.
    Reset(ResetReason),
}

/// The supervised control loop.
pub struct System {
    pub(crate) cfg: Config,
    pub(crate) subscribers: Vec<Arc<dyn Subscribe>>,
    pub(crate) memory: Arc<dyn MemoryProbe>,
    pub(crate) producer: WorkerFactory,
    pub(crate) consumer: WorkerFactory,
    pub(crate) shutdown: CancellationToken,
}

impl System {
    /// Starts building a system with `cfg`.
    pub fn builder(cfg: Config) -> SystemBuilder {
        SystemBuilder::new(cfg)
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Asks the running boot to stop gracefully, as an OS signal would.
    ///
    /// Sticky: later boots of the same `System` stop immediately.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Runs one boot until it resets or shuts down.
    pub async fn run(&self) -> Result<Exit, RuntimeError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers.clone(), bus.clone());
        let listener_stop = CancellationToken::new();
        let listener = subscriber_listener(&bus, subs, listener_stop.clone());

        let runtime = CancellationToken::new();
        let reset = ResetLine::new(bus.clone());
        let watchdog = Watchdog::new(self.cfg.watchdog_timeout);
        let ctx = Arc::new(Context::new(self.cfg.clone(), bus.clone(), watchdog.clone()));

        let supervisor = Supervisor::new(
            Arc::clone(&ctx),
            reset.clone(),
            Arc::clone(&self.memory),
            runtime.child_token(),
            WorkerSpec::new((self.producer)(Arc::clone(&ctx)), self.cfg.producer),
            WorkerSpec::new((self.consumer)(Arc::clone(&ctx)), self.cfg.consumer),
        );

        bus.publish(
            Event::new(EventKind::WorkerStarted)
                .with_task(SUPERVISOR)
                .with_placement(self.cfg.supervisor),
        );
        let mut set = JoinSet::new();
        set.spawn(async move {
            supervisor.run().await;
            SUPERVISOR
        });
        let monitor_token = runtime.child_token();
        let monitor_bus = bus.clone();
        let monitor_reset = reset.clone();
        set.spawn(async move {
            watchdog.monitor(monitor_bus, monitor_reset, monitor_token).await;
            WATCHDOG
        });
        let mut running = vec![SUPERVISOR, WATCHDOG];

        let exit = self.drive(&mut set, &mut running, &reset, &bus).await;
        runtime.cancel();
        let stopped = self.wait_all_with_grace(&mut set, &mut running, &bus).await;

        listener_stop.cancel();
        if let Ok(subs) = listener.await {
            subs.shutdown().await;
        }

        match (exit, stopped) {
            (Exit::Shutdown, Err(e)) => Err(e),
            (exit, _) => Ok(exit),
        }
    }

    /// Waits for the first end-of-boot condition.
    async fn drive(
        &self,
        set: &mut JoinSet<&'static str>,
        running: &mut Vec<&'static str>,
        reset: &ResetLine,
        bus: &Bus,
    ) -> Exit {
        tokio::select! {
            biased;
            reason = reset.triggered() => Exit::Reset(reason),
            _ = self.shutdown.cancelled() => {
                bus.publish(Event::new(EventKind::ShutdownRequested));
                Exit::Shutdown
            }
            _ = shutdown::shutdown_signal() => {
                bus.publish(Event::new(EventKind::ShutdownRequested));
                Exit::Shutdown
            }
            Some(joined) = set.join_next() => {
                if let Ok(name) = joined {
                    running.retain(|n| *n != name);
                }
                reset.trigger(ResetReason::SupervisorLost);
                Exit::Reset(reset.reason().unwrap_or(ResetReason::SupervisorLost))
            }
        }
    }

    /// Waits up to `grace` for the supervisor and the monitor to finish.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout, aborts what is left and returns
    /// [`RuntimeError::GraceExceeded`] with the names still running.
    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<&'static str>,
        running: &mut Vec<&'static str>,
        bus: &Bus,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let done = async {
            while let Some(joined) = set.join_next().await {
                if let Ok(name) = joined {
                    running.retain(|n| *n != name);
                }
            }
        };

        match tokio::time::timeout(grace, done).await {
            Ok(()) => {
                bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                bus.publish(Event::new(EventKind::GraceExceeded).with_timeout(grace));
                set.abort_all();
                let stuck = running.iter().map(|n| (*n).to_string()).collect();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

/// Forwards bus events to the subscriber set until `stop`, then drains what is left.
///
/// Returns the set so the caller can flush it.
fn subscriber_listener(
    bus: &Bus,
    subs: SubscriberSet,
    stop: CancellationToken,
) -> JoinHandle<SubscriberSet> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => subs.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    loop {
                        match rx.try_recv() {
                            Ok(ev) => subs.emit(&ev),
                            Err(TryRecvError::Lagged(_)) => continue,
                            Err(_) => break,
                        }
                    }
                    break;
                }
            }
        }
        subs
    })
}
