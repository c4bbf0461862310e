//! # Supervisor: periodic health audit and respawn authority.
//!
//! The [`Supervisor`] never touches the data channel. It observes the
//! [`StatusRegister`](crate::StatusRegister) and the
//! [`HeartbeatTracker`](crate::HeartbeatTracker), owns the two
//! [`WorkerHandle`]s, and is the only component allowed to delete and recreate
//! workers.
//!
//! ## Audit (every `supervisor_period`)
//! ```text
//! 1. HealthReport   flags snapshot + memory sample (no side effects)
//! 2. consumer       absent/finished OR heartbeat older than 2P?
//!                     └─► terminate, restarts += 1, respawn, heartbeat = now,
//!                         escalation flags cleared
//!                     └─► restarts == ceiling?
//!                           └─► RestartCeilingReached, sleep(restart_grace),
//!                               ResetLine::trigger ─► audit loop ends
//! 3. producer       heartbeat older than 2P?
//!                     └─► terminate, respawn, heartbeat = now
//!                         (escalates only if `producer_restart_ceiling` is set)
//! 4. memory         historical minimum below floor? ─► MemoryLow (alert only)
//! ```
//!
//! ## Rules
//! - Restart counters are never reset while the process image lives; only a
//!   system reset (fresh boot) starts them at zero again.
//! - Deletion completes before the replacement is created.

use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::reset::{ResetLine, ResetReason};
use crate::core::worker::WorkerHandle;
use crate::events::{Event, EventKind};
use crate::shared::{Beat, Context, MemoryProbe, MemorySample, MemoryWatermark, StatusFlag};
use crate::tasks::WorkerSpec;

/// One supervised worker position.
struct Slot {
    spec: WorkerSpec,
    beat: Beat,
    ceiling: Option<u32>,
    handle: Option<WorkerHandle>,
    restarts: u32,
}

impl Slot {
    fn new(spec: WorkerSpec, beat: Beat, ceiling: Option<u32>) -> Self {
        Self {
            spec,
            beat,
            ceiling,
            handle: None,
            restarts: 0,
        }
    }

    fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(WorkerHandle::is_alive)
    }
}

/// Outcome of one audit pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Audit {
    /// The consumer was deleted and recreated.
    pub consumer_respawned: bool,
    /// The producer was deleted and recreated.
    pub producer_respawned: bool,
    /// Memory sample taken for the report, if the probe could tell.
    pub memory: Option<MemorySample>,
    /// Set when this pass pulled the reset line.
    pub reset: Option<ResetReason>,
}

/// Periodic auditor of the producer and the consumer.
pub struct Supervisor {
    ctx: Arc<Context>,
    reset: ResetLine,
    memory: Arc<dyn MemoryProbe>,
    watermark: MemoryWatermark,
    token: CancellationToken,
    producer: Slot,
    consumer: Slot,
}

impl Supervisor {
    /// Creates a supervisor; workers are not started until [`Supervisor::start`].
    ///
    /// Workers run under children of `token`.
    pub fn new(
        ctx: Arc<Context>,
        reset: ResetLine,
        memory: Arc<dyn MemoryProbe>,
        token: CancellationToken,
        producer: WorkerSpec,
        consumer: WorkerSpec,
    ) -> Self {
        let cfg: &Config = &ctx.cfg;
        let producer = Slot::new(producer, Beat::Producer, cfg.producer_restart_ceiling);
        let consumer = Slot::new(consumer, Beat::Consumer, Some(cfg.consumer_restart_ceiling));
        Self {
            ctx,
            reset,
            memory,
            watermark: MemoryWatermark::new(),
            token,
            producer,
            consumer,
        }
    }

    /// Spawns both workers and starts their heartbeats from now.
    pub fn start(&mut self) {
        for slot in [&mut self.producer, &mut self.consumer] {
            slot.handle = Some(WorkerHandle::spawn(&slot.spec, &self.token, &self.ctx.bus));
            self.ctx.heartbeats.beat(slot.beat);
        }
    }

    /// Respawns performed on the consumer since boot.
    pub fn consumer_restarts(&self) -> u32 {
        self.consumer.restarts
    }

    /// Respawns performed on the producer since boot.
    pub fn producer_restarts(&self) -> u32 {
        self.producer.restarts
    }

    /// Starts the workers and audits every period until cancelled or reset.
    ///
    /// Workers are deleted before this returns.
    pub async fn run(mut self) {
        self.start();
        loop {
            tokio::select! {
                _ = time::sleep(self.ctx.cfg.supervisor_period) => {}
                _ = self.token.cancelled() => break,
            }
            let audit = self.audit().await;
            if audit.reset.is_some() || self.token.is_cancelled() {
                break;
            }
        }
        self.stop().await;
    }

    /// Runs one audit pass.
    pub async fn audit(&mut self) -> Audit {
        let mut audit = Audit {
            memory: self.watermark.sample(self.memory.as_ref()),
            ..Audit::default()
        };
        self.report(audit.memory);

        if self.consumer_stalled() {
            self.respawn(SlotId::Consumer).await;
            audit.consumer_respawned = true;
            if let Some(reason) = self.check_ceiling(SlotId::Consumer).await {
                audit.reset = Some(reason);
                return audit;
            }
        }
        // Cancelled during the restart grace: nothing more may be spawned.
        if self.token.is_cancelled() {
            return audit;
        }

        if self.producer_stalled() {
            self.respawn(SlotId::Producer).await;
            audit.producer_respawned = true;
            if let Some(reason) = self.check_ceiling(SlotId::Producer).await {
                audit.reset = Some(reason);
                return audit;
            }
        }

        let floor = self.ctx.cfg.memory_floor;
        if let Some(sample) = audit.memory.filter(|m| m.min_ever < floor) {
            self.ctx
                .bus
                .publish(Event::new(EventKind::MemoryLow).with_memory(sample));
        }
        audit
    }

    fn report(&self, memory: Option<MemorySample>) {
        let mut ev = Event::new(EventKind::HealthReport).with_status(self.ctx.status.snapshot());
        if let Some(sample) = memory {
            ev = ev.with_memory(sample);
        }
        self.ctx.bus.publish(ev);
    }

    fn consumer_stalled(&self) -> bool {
        !self.consumer.is_alive()
            || self
                .ctx
                .heartbeats
                .is_stale(Beat::Consumer, self.ctx.cfg.stale_after())
    }

    fn producer_stalled(&self) -> bool {
        self.ctx
            .heartbeats
            .is_stale(Beat::Producer, self.ctx.cfg.stale_after())
    }

    fn slot_mut(&mut self, id: SlotId) -> &mut Slot {
        match id {
            SlotId::Producer => &mut self.producer,
            SlotId::Consumer => &mut self.consumer,
        }
    }

    async fn respawn(&mut self, id: SlotId) {
        let token = self.token.clone();
        let ctx = Arc::clone(&self.ctx);
        let slot = self.slot_mut(id);

        if let Some(handle) = slot.handle.take() {
            handle.terminate().await;
        }
        slot.restarts = slot.restarts.saturating_add(1);
        slot.handle = Some(WorkerHandle::spawn(&slot.spec, &token, &ctx.bus));
        ctx.heartbeats.beat(slot.beat);
        if id == SlotId::Consumer {
            ctx.status.clear_all(&StatusFlag::RECEIVER_ESCALATION);
        }

        ctx.bus.publish(
            Event::new(EventKind::WorkerRespawned)
                .with_task(slot.spec.name())
                .with_count(slot.restarts),
        );
    }

    /// Pulls the reset line after `restart_grace` once a slot hits its ceiling.
    async fn check_ceiling(&mut self, id: SlotId) -> Option<ResetReason> {
        let grace = self.ctx.cfg.restart_grace;
        let slot = self.slot_mut(id);
        let ceiling = slot.ceiling?;
        if slot.restarts < ceiling {
            return None;
        }
        let restarts = slot.restarts;
        let task: Arc<str> = Arc::from(slot.spec.name());

        self.ctx.bus.publish(
            Event::new(EventKind::RestartCeilingReached)
                .with_task(Arc::clone(&task))
                .with_count(restarts)
                .with_delay(grace),
        );
        tokio::select! {
            _ = time::sleep(grace) => {}
            _ = self.token.cancelled() => return None,
        }

        let reason = ResetReason::RestartCeiling { task, restarts };
        self.reset.trigger(reason.clone());
        Some(reason)
    }

    async fn stop(&mut self) {
        for slot in [&mut self.consumer, &mut self.producer] {
            if let Some(handle) = slot.handle.take() {
                handle.terminate().await;
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotId {
    Producer,
    Consumer,
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::core::Watchdog;
    use crate::error::TaskError;
    use crate::events::Bus;
    use crate::tasks::{Placement, TaskFn, TaskRef};

    struct FixedMemory(Mutex<Vec<usize>>);

    impl MemoryProbe for FixedMemory {
        fn available(&self) -> Option<usize> {
            let mut v = self.0.lock().unwrap();
            if v.len() > 1 { v.pop() } else { v.first().copied() }
        }
    }

    fn idle(name: &'static str) -> WorkerSpec {
        let task: TaskRef = TaskFn::arc(name, |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<(), _>(TaskError::Canceled)
        });
        WorkerSpec::new(task, Placement::new(1, 1, 1024))
    }

    fn dying(name: &'static str) -> WorkerSpec {
        let task: TaskRef = TaskFn::arc(name, |_ctx: CancellationToken| async {
            Err::<(), _>(TaskError::Terminated { timeouts: 10 })
        });
        WorkerSpec::new(task, Placement::new(1, 1, 1024))
    }

    async fn settle(sup: &Supervisor) {
        while sup.consumer.is_alive() {
            tokio::task::yield_now().await;
        }
    }

    fn supervisor(
        producer: WorkerSpec,
        consumer: WorkerSpec,
        memory: Vec<usize>,
    ) -> (Supervisor, Arc<Context>, ResetLine) {
        let cfg = Config::default();
        let bus = Bus::new(1024);
        let watchdog = Watchdog::new(cfg.watchdog_timeout);
        let ctx = Arc::new(Context::new(cfg, bus.clone(), watchdog));
        let reset = ResetLine::new(bus);
        let sup = Supervisor::new(
            Arc::clone(&ctx),
            reset.clone(),
            Arc::new(FixedMemory(Mutex::new(memory))),
            CancellationToken::new(),
            producer,
            consumer,
        );
        (sup, ctx, reset)
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_workers_are_left_alone() {
        let (mut sup, ctx, _) = supervisor(idle("producer"), idle("consumer"), vec![1 << 20]);
        sup.start();

        for _ in 0..5 {
            time::advance(Duration::from_secs(3)).await;
            ctx.heartbeats.beat(Beat::Producer);
            ctx.heartbeats.beat(Beat::Consumer);
            let audit = sup.audit().await;
            assert!(!audit.consumer_respawned);
            assert!(!audit.producer_respawned);
        }
        assert_eq!(sup.consumer_restarts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_heartbeat_needs_more_than_two_periods() {
        let (mut sup, ctx, _) = supervisor(idle("producer"), idle("consumer"), vec![1 << 20]);
        sup.start();

        time::advance(Duration::from_secs(6)).await;
        ctx.heartbeats.beat(Beat::Producer);
        assert!(!sup.audit().await.consumer_respawned);

        time::advance(Duration::from_millis(1)).await;
        ctx.heartbeats.beat(Beat::Producer);
        let audit = sup.audit().await;
        assert!(audit.consumer_respawned);
        assert_eq!(sup.consumer_restarts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_respawn_clears_escalation_flags() {
        let (mut sup, ctx, _) = supervisor(idle("producer"), dying("consumer"), vec![1 << 20]);
        sup.start();
        ctx.status.set(StatusFlag::ReceiverShutdown);
        ctx.status.set(StatusFlag::GeneratorOk);
        settle(&sup).await;

        let audit = sup.audit().await;
        assert!(audit.consumer_respawned);
        let snap = ctx.status.snapshot();
        for flag in StatusFlag::RECEIVER_ESCALATION {
            assert!(!snap.contains(flag));
        }
        assert!(snap.contains(StatusFlag::GeneratorOk));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifth_consumer_respawn_resets_after_grace() {
        let (mut sup, ctx, reset) = supervisor(idle("producer"), dying("consumer"), vec![1 << 20]);
        sup.start();

        for n in 1..=4 {
            settle(&sup).await;
            ctx.heartbeats.beat(Beat::Producer);
            let audit = sup.audit().await;
            assert!(audit.consumer_respawned);
            assert!(audit.reset.is_none());
            assert_eq!(sup.consumer_restarts(), n);
        }
        assert!(!reset.is_triggered());

        settle(&sup).await;
        let before = time::Instant::now();
        let audit = sup.audit().await;
        assert!(before.elapsed() >= ctx.cfg.restart_grace);
        assert_eq!(
            audit.reset,
            Some(ResetReason::RestartCeiling {
                task: "consumer".into(),
                restarts: 5
            })
        );
        assert!(reset.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumer_ceiling_preempts_producer_check() {
        let (mut sup, _ctx, reset) = supervisor(idle("producer"), idle("consumer"), vec![1 << 20]);
        sup.start();

        for _ in 0..8 {
            time::advance(Duration::from_millis(6001)).await;
            let audit = sup.audit().await;
            if audit.reset.is_some() {
                assert!(!audit.producer_respawned);
                break;
            }
            assert!(audit.consumer_respawned);
            assert!(audit.producer_respawned);
        }
        assert_eq!(sup.consumer_restarts(), 5);
        assert_eq!(sup.producer_restarts(), 4);
        assert!(reset.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_grace_skips_producer_check() {
        let (mut sup, ctx, reset) = supervisor(idle("producer"), dying("consumer"), vec![1 << 20]);
        sup.start();

        for _ in 1..=4 {
            settle(&sup).await;
            ctx.heartbeats.beat(Beat::Producer);
            sup.audit().await;
        }
        settle(&sup).await;
        time::advance(Duration::from_millis(6001)).await;
        settle(&sup).await;

        let token = sup.token.clone();
        let (audit, ()) = tokio::join!(sup.audit(), async {
            time::sleep(Duration::from_millis(500)).await;
            token.cancel();
        });

        assert!(audit.consumer_respawned);
        assert!(!audit.producer_respawned);
        assert!(audit.reset.is_none());
        assert_eq!(sup.consumer_restarts(), 5);
        assert_eq!(sup.producer_restarts(), 0);
        assert!(!reset.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_only_staleness_never_resets() {
        let (mut sup, ctx, reset) = supervisor(idle("producer"), idle("consumer"), vec![1 << 20]);
        sup.start();

        for _ in 0..10 {
            time::advance(Duration::from_millis(6001)).await;
            ctx.heartbeats.beat(Beat::Consumer);
            assert!(sup.audit().await.producer_respawned);
        }
        assert_eq!(sup.producer_restarts(), 10);
        assert!(!reset.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_alert_uses_historical_minimum() {
        // Popped from the back: 64 KiB, then 8 KiB, then 64 KiB forever.
        let (mut sup, ctx, _) = supervisor(
            idle("producer"),
            idle("consumer"),
            vec![64 * 1024, 8 * 1024, 64 * 1024],
        );
        let mut rx = ctx.bus.subscribe();
        sup.start();

        let mut lows = 0;
        for _ in 0..3 {
            ctx.heartbeats.beat(Beat::Producer);
            ctx.heartbeats.beat(Beat::Consumer);
            let audit = sup.audit().await;
            while let Ok(ev) = rx.try_recv() {
                if ev.kind == EventKind::MemoryLow {
                    lows += 1;
                    assert_eq!(ev.memory.map(|m| m.min_ever), Some(8 * 1024));
                }
            }
            assert!(audit.memory.is_some());
        }
        // Once the minimum dips under the floor it stays there.
        assert_eq!(lows, 2);
    }
}
