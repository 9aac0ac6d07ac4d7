//! warden daemon: entry point for running a warden node.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use warden_node::{init_logging, LogFormat, WardenConfig, WardenNode};

#[derive(Parser)]
#[command(name = "warden-daemon", about = "Moderation and verification companion for Discord")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Bot token.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: Option<String>,

    /// Root URL of the verification web front end.
    #[arg(long, env = "AUTH_WEBSITE_URL")]
    verify_base_url: Option<String>,

    /// Path segment placed before the session id in verification links.
    #[arg(long, env = "SERVICE_TAG")]
    service_tag: Option<String>,

    /// Role granted on successful verification.
    #[arg(long, env = "VERIFIED_ROLE_ID")]
    verified_role_id: Option<String>,

    /// Role given to ticket openers.
    #[arg(long, env = "TICKET_ROLE_ID")]
    ticket_role_id: Option<String>,

    /// Role mentioned in new tickets.
    #[arg(long, env = "STAFF_ROLE_ID")]
    staff_role_id: Option<String>,

    /// Webhook server port.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "WARDEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "WARDEN_LOG_FORMAT")]
    log_format: Option<String>,

    /// Run only the webhook server, without a gateway session.
    #[arg(long, env = "WARDEN_DISABLE_GATEWAY")]
    disable_gateway: bool,

    /// Do not expose Prometheus metrics.
    #[arg(long, env = "WARDEN_DISABLE_METRICS")]
    disable_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the node.
    Run,
    /// Validate the effective configuration and print it (token redacted).
    CheckConfig,
}

impl Cli {
    /// File (or defaults) as the base, flags and env on top.
    fn effective_config(&self) -> anyhow::Result<WardenConfig> {
        let base = match &self.config {
            Some(path) => WardenConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => WardenConfig::default(),
        };

        Ok(WardenConfig {
            discord_token: self.discord_token.clone().unwrap_or(base.discord_token),
            verify_base_url: self.verify_base_url.clone().unwrap_or(base.verify_base_url),
            service_tag: self.service_tag.clone().unwrap_or(base.service_tag),
            verified_role_id: self.verified_role_id.clone().unwrap_or(base.verified_role_id),
            ticket_role_id: self.ticket_role_id.clone().unwrap_or(base.ticket_role_id),
            staff_role_id: self.staff_role_id.clone().unwrap_or(base.staff_role_id),
            http_port: self.port.unwrap_or(base.http_port),
            log_level: self.log_level.clone().unwrap_or(base.log_level),
            log_format: self.log_format.clone().unwrap_or(base.log_format),
            enable_gateway: base.enable_gateway && !self.disable_gateway,
            enable_metrics: base.enable_metrics && !self.disable_metrics,
            ..base
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.effective_config()?;

    let format: LogFormat = config
        .log_format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    init_logging(format, &config.log_level).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Command::CheckConfig => {
            config.validate()?;
            print!("{}", config.redacted().to_toml_string()?);
            tracing::info!("configuration is valid");
        }
        Command::Run => {
            tracing::info!(
                http_port = config.http_port,
                verify_base_url = %config.verify_base_url,
                gateway = config.enable_gateway,
                "starting warden"
            );
            let mut node = WardenNode::with_discord(config)?;
            node.start().await?;
            node.wait_for_shutdown().await;

            tracing::info!("shutdown signal received, stopping node");
            node.stop().await?;
            tracing::info!("warden daemon exited cleanly");
        }
    }

    Ok(())
}
