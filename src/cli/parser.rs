//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::build;

/// Push notification delivery tracker
#[derive(Parser, Debug)]
#[command(name = "herald-rs")]
#[command(about = "Push notification delivery tracker")]
#[command(long_about = "
Herald-rs sends push notifications through FCM HTTP v1 and tracks every
delivery attempt from request to confirmed delivery or failure. It exposes
an HTTP API for sending, inspecting and cancelling attempts, and a webhook
for delivery acknowledgments.

EXAMPLES:
    # Start the server with default configuration
    herald-rs serve

    # Start server on custom host and port
    herald-rs serve --host 0.0.0.0 --port 8080

    # Use custom configuration file
    herald-rs --config /path/to/config.toml serve

    # Check configuration without starting server
    herald-rs serve --dry-run

    # Send one notification and print the resulting attempt
    herald-rs send --token <DEVICE_TOKEN> --title Hello --data order_id=42

    # Verify credentials by fetching an access token
    herald-rs token

For more information about configuration options, see the documentation.
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Use a single TOML file instead of the layered configuration directory.
    /// The file must exist and be readable.
    ///
    /// Example: --config /etc/herald-rs/production.toml
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which `{environment}.toml` is layered over the defaults.
    ///
    /// Available values: development (dev), test, staging (stage), production (prod)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Increases log output to debug level.
    /// Cannot be used with --quiet.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    ///
    /// Reduces log output to error level only.
    /// Cannot be used with --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the web server (default)
    ///
    /// Launches the HTTP server with the configured settings.
    ///
    /// Examples:
    ///   herald-rs serve                           # Start with defaults
    ///   herald-rs serve --host 0.0.0.0 --port 80 # Bind to all interfaces on port 80
    ///   herald-rs serve --dry-run                 # Validate config without starting
    Serve {
        /// Host address to bind to
        ///
        /// Use 127.0.0.1 for localhost only, or 0.0.0.0 to accept connections from any interface.
        ///
        /// Default: 127.0.0.1
        #[arg(long, value_name = "ADDRESS", value_parser = super::validation::validate_host_address)]
        host: Option<String>,

        /// Port number to listen on
        ///
        /// Must be between 1 and 65535.
        ///
        /// Default: 3000
        #[arg(short, long, value_name = "PORT", value_parser = super::validation::validate_port)]
        port: Option<u16>,

        /// Log level override
        ///
        /// Overrides both configuration file settings and global --verbose/--quiet flags.
        ///
        /// Available levels: error, warn, info, debug, trace
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        ///
        /// Checks configuration and credential wiring without binding a socket.
        /// Returns exit code 0 if valid, non-zero if invalid.
        #[arg(long)]
        dry_run: bool,
    },
    /// Send one notification and print the resulting attempt
    ///
    /// Runs the full pipeline once: credential acquisition, provider call with
    /// retries, and outcome recording. The attempt is printed as JSON whether
    /// it ends up sent or failed.
    ///
    /// Examples:
    ///   herald-rs send --token <TOKEN>
    ///   herald-rs send --token <TOKEN> --title Hi --body "Order shipped" --data order_id=42
    Send {
        /// Target device or channel token
        #[arg(short, long, value_name = "TOKEN", value_parser = super::validation::validate_target_token)]
        token: String,

        /// Notification title
        #[arg(long)]
        title: Option<String>,

        /// Notification body
        #[arg(long)]
        body: Option<String>,

        /// Custom data entry, may be repeated
        ///
        /// Example: --data order_id=42 --data channel=promo
        #[arg(short, long = "data", value_name = "KEY=VALUE", value_parser = super::validation::parse_data_entry)]
        data: Vec<(String, String)>,
    },
    /// Obtain an access token and print a masked summary
    ///
    /// Verifies that the configured credentials can be exchanged for a token.
    Token,
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

/// Log level options
#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Validate argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(Commands::Send {
            title, body, data, ..
        }) = &self.command
        {
            for (key, _) in data {
                if (key == "title" && title.is_some()) || (key == "body" && body.is_some()) {
                    return Err(format!(
                        "--data {} conflicts with --{}; pass the value once",
                        key, key
                    ));
                }
            }
            let mut keys: Vec<&str> = data.iter().map(|(k, _)| k.as_str()).collect();
            keys.sort_unstable();
            if let Some(pair) = keys.windows(2).find(|pair| pair[0] == pair[1]) {
                return Err(format!("--data key '{}' given more than once", pair[0]));
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_flag() {
        let err = Cli::try_parse_from(["herald-rs", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["herald-rs", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_default_behavior() {
        let cli = Cli::try_parse_from(["herald-rs"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(!cli.quiet);
        assert!(cli.config.is_none());
        assert!(cli.env.is_none());
    }

    #[test]
    fn test_serve_command() {
        let cli =
            Cli::try_parse_from(["herald-rs", "serve", "--host", "0.0.0.0", "--port", "8080"])
                .unwrap();
        match cli.command {
            Some(Commands::Serve {
                host,
                port,
                dry_run,
                ..
            }) => {
                assert_eq!(host, Some("0.0.0.0".to_string()));
                assert_eq!(port, Some(8080));
                assert!(!dry_run);
            }
            other => panic!("Expected Serve command, got {:?}", other),
        }
    }

    #[test]
    fn test_send_command_collects_data() {
        let cli = Cli::try_parse_from([
            "herald-rs", "send", "--token", "tok-1", "--title", "Hi", "-d", "order_id=42", "--data",
            "note=a=b",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Send {
                token, title, data, ..
            }) => {
                assert_eq!(token, "tok-1");
                assert_eq!(title.as_deref(), Some("Hi"));
                assert_eq!(
                    data,
                    vec![
                        ("order_id".to_string(), "42".to_string()),
                        ("note".to_string(), "a=b".to_string())
                    ]
                );
            }
            other => panic!("Expected Send command, got {:?}", other),
        }
    }

    #[test]
    fn test_send_requires_token() {
        let err = Cli::try_parse_from(["herald-rs", "send"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        assert!(Cli::try_parse_from(["herald-rs", "send", "--token", "  "]).is_err());
    }

    #[test]
    fn test_token_command() {
        let cli = Cli::try_parse_from(["herald-rs", "--env", "prod", "token"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Token)));
        assert!(matches!(cli.env, Some(Environment::Production)));
    }

    #[test]
    fn test_validate_rejects_duplicate_title() {
        let cli = Cli::try_parse_from([
            "herald-rs", "send", "--token", "t", "--title", "A", "--data", "title=B",
        ])
        .unwrap();
        assert!(cli.validate().unwrap_err().contains("--title"));
    }

    #[test]
    fn test_validate_rejects_repeated_data_key() {
        let cli = Cli::try_parse_from([
            "herald-rs", "send", "--token", "t", "--data", "k=1", "--data", "k=2",
        ])
        .unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let err = Cli::try_parse_from(["herald-rs", "--verbose", "--quiet"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
