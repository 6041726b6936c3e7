//! Status command handler.

use anyhow::Result;
use crate::bootstrap::CliContext;
use crate::presentation::{print_separator, truncate_string};

/// Print every configured server with its connection status.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let manager = ctx.orchestrator().manager();
    let configs = manager.get_configs().await;

    if configs.is_empty() {
        println!("No servers configured.");
        println!("Add servers to the servers file or pass --servers <path>.");
        return Ok(());
    }

    let statuses = manager.get_status().await;
    let catalog = ctx.orchestrator().registry().list_all().await;

    println!(
        "{:<20} {:<24} {:<16} {:<6} Status",
        "ID", "Name", "Transport", "Tools"
    );
    print_separator(80);

    for config in &configs {
        let status = statuses
            .get(&config.id)
            .cloned()
            .unwrap_or_default();
        let tools = catalog.iter().filter(|e| e.server_id == config.id).count();
        let label = if config.enabled {
            status.to_string()
        } else {
            "disabled".to_string()
        };
        println!(
            "{:<20} {:<24} {:<16} {:<6} {}",
            truncate_string(&config.id, 19),
            truncate_string(&config.name, 23),
            config.transport.kind().to_string(),
            tools,
            label
        );
    }

    Ok(())
}
