//! Command executor for dispatching CLI commands
//!
//! This module provides the main entry point for executing CLI commands
//! after parsing and configuration loading.

use super::handlers::{
    SendCommandHandler, ServeCommandHandler, TokenCommandHandler, build_payload,
};
use super::parser::{Cli, Commands};
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};

/// Execute a CLI command with the given settings
///
/// Running without a subcommand starts the server.
///
/// # Errors
/// Returns errors from command handlers or argument validation failures
pub async fn execute_command(cli: &Cli, settings: Settings) -> anyhow::Result<()> {
    validate_command_args(cli)?;

    match &cli.command {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings).execute(*dry_run).await
        }
        None => ServeCommandHandler::new(settings).execute(false).await,
        Some(Commands::Send {
            token,
            title,
            body,
            data,
        }) => {
            let payload = build_payload(title.as_deref(), body.as_deref(), data);
            SendCommandHandler::new(settings)
                .execute(token, payload)
                .await?;
            Ok(())
        }
        Some(Commands::Token) => {
            TokenCommandHandler::new(settings).execute().await?;
            Ok(())
        }
    }
}

/// Validate command arguments before execution
fn validate_command_args(cli: &Cli) -> AppResult<()> {
    cli.validate().map_err(|reason| AppError::Validation {
        field: "cli_arguments".to_string(),
        reason,
    })?;

    if let Some(Commands::Serve {
        host: Some(host_addr),
        port: Some(port_num),
        ..
    }) = &cli.command
        && *port_num < 1024
        && host_addr == "0.0.0.0"
    {
        tracing::warn!(
            port = port_num,
            "Binding to 0.0.0.0 on a privileged port typically requires root privileges"
        );
    }

    Ok(())
}
