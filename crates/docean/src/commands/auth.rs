use super::{interruptible, provider};
use colored::Colorize;

pub async fn handle() -> anyhow::Result<()> {
    let provider = provider()?;
    let status = provider.check_auth(&interruptible()).await;

    match (status.authenticated, status.account_info) {
        (true, Some(account)) => {
            println!("{} {}", "✓ Authenticated as".green(), account.email.cyan());
            println!("  status: {}", account.status);
            println!("  droplet limit: {}", account.droplet_limit);
            Ok(())
        }
        _ => {
            let reason = status.error.unwrap_or_else(|| "unknown error".to_string());
            eprintln!("{} {}", "✗ Authentication failed:".red(), reason);
            anyhow::bail!("authentication failed")
        }
    }
}
