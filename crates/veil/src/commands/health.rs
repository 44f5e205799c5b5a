//! Health command - checks whether a relay is up.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::Context;

/// Arguments for the health command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Relay URL (overrides config)
    #[arg(long)]
    pub relay: Option<String>,
}

/// Health output for JSON mode.
#[derive(Debug, Serialize)]
struct HealthOutput {
    running: bool,
    version: Option<String>,
    relay_url: String,
}

/// Run the health command.
pub async fn run(args: HealthArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client(args.relay.as_deref())?;
    let relay_url = client.base_url().to_string();
    let result = client.health().check().await;

    if ctx.json_output {
        let output = HealthOutput {
            running: result.is_ok(),
            version: result.as_ref().ok().map(|h| h.version.clone()),
            relay_url,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!("{}", style("Veil Relay Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    match result {
        Ok(health) => {
            println!(
                "  {} {}",
                dim.apply_to("Status:"),
                Style::new().green().apply_to("● running")
            );
            println!("  {} {}", dim.apply_to("Version:"), health.version);
            println!("  {} {}", dim.apply_to("Relay:"), relay_url);
        }
        Err(e) => {
            println!(
                "  {} {}",
                dim.apply_to("Status:"),
                Style::new().red().apply_to("● not running")
            );
            println!("  {} {}", dim.apply_to("Relay:"), relay_url);
            if ctx.verbose {
                println!();
                println!("  {} {}", dim.apply_to("Error:"), e);
            }
            println!();
            println!("  {}", dim.apply_to("Start a relay with: veil serve"));
        }
    }
    println!();

    Ok(())
}
