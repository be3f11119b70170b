use super::{interruptible, provider};
use anyhow::Context as _;
use colored::Colorize;
use std::path::Path;

pub async fn handle(file: &Path) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("state file not found: {}", file.display());
    }
    let provider = provider()?;
    let ctx = interruptible();
    let upgraded = provider
        .upgrade_state_file(&ctx, file)
        .await
        .with_context(|| format!("failed to upgrade {}", file.display()))?;

    if upgraded == 0 {
        println!("{}", "State is already current".dimmed());
    } else {
        println!(
            "{}",
            format!("✓ Upgraded {upgraded} instance(s) in {}", file.display()).green()
        );
    }
    Ok(())
}
