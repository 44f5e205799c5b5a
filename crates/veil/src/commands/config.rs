//! Config command - inspect and initialize configuration.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use veil_config::VeilConfig;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration and its sources
    Show,

    /// Print the user config file path
    Path,

    /// Write a config file with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(),
        ConfigCommand::Init { force } => cmd_init(force),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let effective = defaults_filled(&loaded.config);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Sources").bold());
    for source in &loaded.sources {
        let marker = if source.loaded { "●" } else { "○" };
        println!("  {} {}", marker, source.path.display());
    }
    for var in &loaded.env_overrides {
        println!("  ● {}", var);
    }
    println!();
    println!("{}", dim.apply_to("─".repeat(40)));
    print!("{}", effective.to_toml()?);
    Ok(())
}

fn cmd_path() -> Result<()> {
    match veil_config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => bail!("Could not determine config directory"),
    }
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let Some(path) = veil_config::config_path() else {
        bail!("Could not determine config directory");
    };
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = defaults_filled(&VeilConfig::new());
    veil_config::save_config(&config, &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Every section present, absent ones at their defaults.
fn defaults_filled(config: &VeilConfig) -> VeilConfig {
    VeilConfig {
        relay: Some(config.relay()),
        overlay: Some(config.overlay()),
        client: Some(config.client()),
        logging: Some(config.logging()),
    }
}
