//! Time-budgeted loading for async hosts.
//!
//! The pipeline itself is synchronous. [`load_within`] runs it on tokio's
//! blocking pool so an async host can bound how long it waits.

use std::sync::Arc;
use std::time::Duration;

use capload_sdk::Capability;
use tracing::warn;

use crate::config::LoadStrategy;
use crate::error::{Error, Result};
use crate::instantiate::PluginInstance;
use crate::loader::ModuleOpener;
use crate::pipeline::PluginHost;

/// Run the pipeline, giving up after `budget`.
///
/// On timeout the load already in progress keeps running on the blocking
/// pool; its instances are dropped when it finishes.
pub async fn load_within<C, O>(
    host: Arc<PluginHost<O>>,
    strategy: LoadStrategy,
    budget: Duration,
) -> Result<Vec<PluginInstance<C>>>
where
    C: Capability,
    C::Object: Send,
    O: ModuleOpener + Send + Sync + 'static,
{
    let task = tokio::task::spawn_blocking(move || host.load::<C>(strategy));

    match tokio::time::timeout(budget, task).await {
        Ok(Ok(instances)) => Ok(instances),
        Ok(Err(e)) => Err(Error::Task(e.to_string())),
        Err(_) => {
            warn!(
                category = "plugin",
                strategy = %strategy,
                capability = C::NAME,
                budget_ms = budget.as_millis() as u64,
                "Plugin loading exceeded its time budget"
            );
            Err(Error::Timeout(budget))
        }
    }
}
