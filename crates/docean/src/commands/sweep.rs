use super::{interruptible, provider};
use anyhow::Context as _;
use colored::Colorize;

pub async fn handle(prefix: &str, only: &[String]) -> anyhow::Result<()> {
    let provider = provider()?;
    let registry = provider.sweepers()?;
    let only: Vec<&str> = only.iter().map(String::as_str).collect();
    for kind in &only {
        if !registry.names().any(|name| name == *kind) {
            anyhow::bail!(
                "unknown sweeper '{}'\navailable: {}",
                kind,
                registry.names().collect::<Vec<_>>().join(", ")
            );
        }
    }

    println!("{}", format!("Sweeping resources prefixed '{prefix}'").green());
    let ctx = interruptible();
    let report = registry
        .run(&ctx, provider.meta(), prefix, &only)
        .await
        .context("sweep aborted")?;

    for (kind, count) in &report.swept {
        let line = format!("  {kind}: {count}");
        if *count > 0 {
            println!("{}", line.cyan());
        } else {
            println!("{}", line.dimmed());
        }
    }
    for (kind, err) in &report.failures {
        eprintln!("{} {}: {}", "✗".red(), kind, err);
    }

    let total = report.total();
    let failures = report.failures.len();
    if failures > 0 {
        anyhow::bail!("{failures} sweeper(s) failed after deleting {total} object(s)");
    }
    println!("{}", format!("✓ Swept {total} object(s)").green().bold());
    Ok(())
}
