use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::system::System;
use crate::shared::{Context, MemoryProbe, SystemMemory};
use crate::subscribers::Subscribe;
use crate::tasks::{Consumer, Producer, TaskRef};

/// Creates the task of one worker position for a fresh boot context.
pub type WorkerFactory = Arc<dyn Fn(Arc<Context>) -> TaskRef + Send + Sync>;

/// Builder for constructing a [`System`] with optional parts.
///
/// Defaults: no subscribers, [`SystemMemory`] probe, built-in [`Producer`]
/// and [`Consumer`].
pub struct SystemBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    memory: Arc<dyn MemoryProbe>,
    producer: WorkerFactory,
    consumer: WorkerFactory,
}

impl SystemBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            memory: Arc::new(SystemMemory),
            producer: Arc::new(|ctx: Arc<Context>| Producer::arc(ctx) as TaskRef),
            consumer: Arc::new(|ctx: Arc<Context>| Consumer::arc(ctx) as TaskRef),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Each subscriber gets a dedicated worker with a bounded queue; the same
    /// instances are reused across boots.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the source of available-memory readings.
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = probe;
        self
    }

    /// Replaces the producer task.
    pub fn with_producer<F>(mut self, f: F) -> Self
    where
        F: Fn(Arc<Context>) -> TaskRef + Send + Sync + 'static,
    {
        self.producer = Arc::new(f);
        self
    }

    /// Replaces the consumer task.
    pub fn with_consumer<F>(mut self, f: F) -> Self
    where
        F: Fn(Arc<Context>) -> TaskRef + Send + Sync + 'static,
    {
        self.consumer = Arc::new(f);
        self
    }

    /// Builds the system. Nothing runs until [`System::run`].
    pub fn build(self) -> System {
        System {
            cfg: self.cfg,
            subscribers: self.subscribers,
            memory: self.memory,
            producer: self.producer,
            consumer: self.consumer,
            shutdown: CancellationToken::new(),
        }
    }
}
