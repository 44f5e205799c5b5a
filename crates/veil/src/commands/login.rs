//! Login command - desktop sign-in through a relay.

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use serde_json::Value;
use veil_client::Error as ClientError;

use super::Context;

/// Arguments for the login command.
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Identity provider (e.g. google, github)
    pub provider: String,

    /// Deep link to land on after sign-in
    #[arg(long)]
    pub callback_url: Option<String>,

    /// Relay URL (overrides config)
    #[arg(long)]
    pub relay: Option<String>,

    /// Print the sign-in URL without opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Seconds to wait for the browser sign-in (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginOutput {
    session_id: String,
    session: Value,
}

/// Run the login command.
pub async fn run(args: LoginArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client(args.relay.as_deref())?;
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config().client().login_timeout());
    let dim = Style::new().dim();

    let init = client
        .auth()
        .init(&args.provider, args.callback_url.as_deref())
        .await?;

    if !ctx.json_output {
        println!();
        println!("{}", style(format!("Sign in with {}", args.provider)).bold());
        println!();
        println!("Open this URL in your browser:");
        println!();
        println!("  {}", init.auth_url);
        println!();
    }

    if !args.no_browser && open_url(&init.auth_url).is_err() && !ctx.json_output {
        println!("{}", dim.apply_to("(Could not open browser automatically)"));
        println!();
    }

    if !ctx.json_output {
        println!("{}", dim.apply_to("Waiting for sign-in to finish..."));
    }

    let completion = match client.auth().await_completion(&init.session_id, timeout).await {
        Ok(completion) => completion,
        Err(ClientError::Expired(_)) => {
            bail!("Sign-in session expired before it finished. Run 'veil login' again.")
        }
        Err(ClientError::Timeout(_)) => {
            bail!("Timed out after {}s waiting for sign-in.", timeout.as_secs())
        }
        Err(e) => return Err(e.into()),
    };

    let session = client.auth().session(&completion.token).await?;

    if ctx.json_output {
        let output = LoginOutput {
            session_id: completion.session_id,
            session,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    println!();
    println!("{}", green.apply_to("● Signed in"));
    if let Some(user) = session.get("user") {
        for field in ["name", "email"] {
            if let Some(value) = user.get(field).and_then(Value::as_str) {
                println!("  {} {}", dim.apply_to(format!("{}:", field)), value);
            }
        }
    }
    if ctx.verbose {
        println!();
        println!("{}", serde_json::to_string_pretty(&session)?);
    }
    println!();

    Ok(())
}

/// Try to open a URL in the default browser.
fn open_url(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).status()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).status()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .status()?;
    }
    Ok(())
}
