use anyhow::{Context, Result};
use tracing::info;

use stackwatch_compose::ComposeStack;
use stackwatch_core::StackConfig;

/// Run `compose down`, removing volumes when asked.
pub async fn cleanup(config: &StackConfig, volumes: bool) -> Result<()> {
    ComposeStack::new(&config.compose)
        .down(volumes)
        .await
        .context("failed to tear the stack down")?;
    info!(volumes, "stack removed");
    Ok(())
}
