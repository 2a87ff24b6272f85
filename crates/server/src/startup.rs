//! Engine bring-up run before the MCP transport starts.

use harbor_engine::EngineHandle;

/// Install, then activate.
///
/// A failure in either phase is logged and the engine is left passing every
/// request through to the network; the server still starts. Returns whether
/// the engine reached `activated`.
pub async fn bring_up(handle: &EngineHandle) -> bool {
    let installed = match handle.install().await {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(error = %e, "install failed, serving pass-through");
            return false;
        }
    };
    tracing::info!(warmed = installed.warmed.len(), "installed");

    match handle.activate().await {
        Ok(report) => {
            tracing::info!(evicted = ?report.evicted, claimed = report.claimed, "activated");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "activation failed, serving pass-through");
            false
        }
    }
}
