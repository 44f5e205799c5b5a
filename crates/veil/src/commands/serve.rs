//! Serve command - runs the OAuth relay.

use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use clap::Args;
use console::style;
use veil_config::RelaySection;
use veil_relay::{AppState, RelayConfig, RelayServer, UpstreamSessionResolver};
use veil_session::StoreConfig;

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Externally reachable URL of this relay (overrides config)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Base URL of the identity layer serving /api/auth (overrides config)
    #[arg(long)]
    pub auth_url: Option<String>,

    /// Disable rate limiting on init
    #[arg(long)]
    pub no_rate_limit: bool,

    /// Delete relay sessions once their credentials were read
    #[arg(long)]
    pub single_use: bool,
}

impl ServeArgs {
    fn apply(&self, section: &mut RelaySection) {
        if let Some(bind) = self.bind {
            section.bind = bind.to_string();
        }
        if let Some(url) = &self.public_url {
            section.public_base_url = url.clone();
        }
        if let Some(url) = &self.auth_url {
            section.auth_base_url = url.clone();
        }
        if self.no_rate_limit {
            section.rate_limiting = false;
        }
        if self.single_use {
            section.single_use_tokens = true;
        }
    }
}

/// Build the relay configuration from a `[relay]` section.
pub fn relay_config(section: &RelaySection) -> Result<RelayConfig> {
    let store = StoreConfig::new()
        .with_max_age(section.session_max_age())
        .with_sweep_interval(section.sweep_interval())
        .with_single_use_tokens(section.single_use_tokens)
        .with_default_callback_url(&section.default_callback_url);

    Ok(RelayConfig::new()
        .with_bind_address(section.bind_address()?)
        .with_public_base_url(&section.public_base_url)
        .with_auth_base_url(&section.auth_base_url)
        .with_rate_limiting(section.rate_limiting)
        .with_init_rpm(section.init_rpm)
        .with_request_logging(section.request_logging)
        .with_store_config(store))
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.config().clone();
    let mut section = config.relay();
    args.apply(&mut section);
    config.relay = Some(section.clone());
    config.validate().context("invalid relay configuration")?;

    let relay = relay_config(&section)?;
    let resolver = UpstreamSessionResolver::new(&relay.auth_base_url)?;
    let addr = relay.bind_address;

    if !ctx.json_output {
        println!();
        println!("{}", style("Veil Relay").bold());
        println!("  Listening: {}", addr);
        println!("  Public:    {}", relay.public_base_url);
        println!("  Identity:  {}", relay.auth_base_url);
        println!(
            "  Sessions:  {}s max age, {}",
            section.session_max_age_secs,
            if section.single_use_tokens {
                "single-use tokens"
            } else {
                "reusable tokens"
            }
        );
        println!();
    }

    let state = AppState::new(relay).with_ambient_resolver(resolver);
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, shutting down");
        }
    };

    RelayServer::from_state(state)
        .run_with_shutdown(addr, shutdown)
        .await?;
    Ok(())
}
