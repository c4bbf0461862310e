//! `streamvisor` binary: runs the control loop with the reference configuration.
//!
//! `RUST_LOG` controls verbosity (default `info`; `debug` shows every value).
//! A system reset reboots the loop from initial state; SIGINT/SIGTERM stop it.

use std::sync::Arc;

use anyhow::Context as _;
use streamvisor::{Config, Exit, LogWriter, Subscribe, System};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = Config::default();
    cfg.validate().context("invalid configuration")?;

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let system = System::builder(cfg).with_subscribers(subs).build();

    let mut boot: u64 = 0;
    loop {
        boot += 1;
        tracing::info!(boot, "system boot");
        match system.run().await.context("control loop failed")? {
            Exit::Shutdown => {
                tracing::info!(boot, "shutdown complete");
                return Ok(());
            }
            Exit::Reset(reason) => {
                tracing::warn!(boot, reason = %reason, label = reason.as_label(), "restarting from initial state");
            }
        }
    }
}
