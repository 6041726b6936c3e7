//! Catalog command handler.
//!
//! Shows the aggregated tool catalog with the credentials each tool needs.

use anyhow::Result;
use toolgate_core::CapabilityDescriptor;

use crate::bootstrap::CliContext;
use crate::presentation::{print_separator, truncate_string};

/// Execute the catalog command.
///
/// With `json` the function definitions handed to a model are printed
/// instead of the table.
pub async fn execute(ctx: &CliContext, server: Option<&str>, json: bool) -> Result<()> {
    let registry = ctx.orchestrator().registry();
    let entries = match server {
        Some(id) => registry.list_by_server(id).await,
        None => registry.list_all().await,
    };

    if json {
        let definitions: Vec<_> = entries
            .iter()
            .map(CapabilityDescriptor::to_function_definition)
            .collect();
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No tools available.");
        return Ok(());
    }

    println!("Found {} tool(s):\n", entries.len());
    println!(
        "{:<28} {:<20} {:<6} {:<24} Description",
        "Tool", "Server", "Rating", "Credentials"
    );
    print_separator(110);

    for entry in &entries {
        println!(
            "{:<28} {:<20} {:<6.1} {:<24} {}",
            truncate_string(&entry.name, 27),
            truncate_string(&entry.server_name, 19),
            entry.rating,
            truncate_string(&credential_summary(entry), 23),
            truncate_string(&entry.description, 40)
        );
    }

    Ok(())
}

fn credential_summary(entry: &CapabilityDescriptor) -> String {
    if entry.credential_requirements.is_empty() {
        "-".to_string()
    } else {
        entry.requirement_ids().join(", ")
    }
}
