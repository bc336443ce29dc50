//! CLI command definitions using Clap.
//!
//! - `inspect` - commands querying the running daemon

use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell, generate};

use crate::config::{self, CONFIG_ENV_VAR};
use crate::daemon::{self, RunOptions};
use crate::error::RegistryError;
use crate::schema;

pub mod inspect;

pub use inspect::InspectTarget;

/// Application version from Cargo.toml.
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// registryd - accessibility registry daemon.
#[derive(Parser, Debug)]
#[command(name = "registryd")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a custom configuration file.
    ///
    /// Overrides the default configuration file search paths.
    /// Supports JSONC format (JSON with comments).
    #[arg(long, short, global = true, value_name = "PATH", env = CONFIG_ENV_VAR)]
    pub config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Run the registry daemon.
    ///
    /// This is the default when no command is given.
    Run(RunArgs),

    /// Check whether the daemon is running and print its counters.
    Status {
        /// Output raw JSON.
        #[arg(long, short)]
        json: bool,
    },

    /// List embedded applications.
    Apps {
        #[arg(long, short)]
        json: bool,
    },

    /// List event subscriptions.
    Events {
        #[arg(long, short)]
        json: bool,
    },

    /// List keystroke listeners.
    Keystrokes {
        #[arg(long, short)]
        json: bool,
    },

    /// List device (mouse) listeners.
    Devices {
        #[arg(long, short)]
        json: bool,
    },

    /// List active key grabs.
    Grabs {
        #[arg(long, short)]
        json: bool,
    },

    /// Output the configuration JSON Schema.
    ///
    /// Can be redirected to a file for use with editors that support JSON
    /// Schema validation.
    Schema,

    /// Generate shell completions.
    ///
    /// Usage:
    ///   eval "$(registryd completions --shell zsh)"
    ///   registryd completions --shell fish > ~/.config/fish/completions/registryd.fish
    Completions {
        /// The shell to generate completions for.
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

/// Arguments of `registryd run`.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Accessibility bus address. Defaults to `bus.address`, then the
    /// session bus.
    #[arg(long, value_name = "ADDRESS")]
    pub address: Option<String>,

    /// Log at debug level.
    #[arg(long, short)]
    pub verbose: bool,
}

impl From<&RunArgs> for RunOptions {
    fn from(args: &RunArgs) -> Self {
        Self { address: args.address.clone(), verbose: args.verbose }
    }
}

impl Cli {
    /// Returns the custom config path if specified via --config flag.
    #[must_use]
    pub fn config_path(&self) -> Option<PathBuf> { self.config.as_ref().map(PathBuf::from) }

    /// The command to run; `run` when none was given.
    #[must_use]
    pub fn resolved_command(&self) -> Commands {
        self.command.clone().unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file does not exist or the
    /// command fails.
    pub fn execute(&self) -> Result<(), RegistryError> {
        if let Some(path) = self.config_path() {
            if !path.exists() {
                return Err(RegistryError::ConfigError(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            config::set_custom_config_path(path);
        }

        match self.resolved_command() {
            Commands::Run(args) => daemon::run(&RunOptions::from(&args)),
            Commands::Status { json } => inspect::execute(InspectTarget::Status, json),
            Commands::Apps { json } => inspect::execute(InspectTarget::Applications, json),
            Commands::Events { json } => inspect::execute(InspectTarget::Events, json),
            Commands::Keystrokes { json } => inspect::execute(InspectTarget::Keystrokes, json),
            Commands::Devices { json } => inspect::execute(InspectTarget::Devices, json),
            Commands::Grabs { json } => inspect::execute(InspectTarget::Grabs, json),
            Commands::Schema => {
                println!("{}", schema::generate_schema_json());
                Ok(())
            }
            Commands::Completions { shell } => {
                Self::print_completions(shell);
                Ok(())
            }
        }
    }

    /// Print shell completions to stdout.
    fn print_completions<G: Generator>(generator: G) {
        let mut cmd = Self::command_factory();
        generate(generator, &mut cmd, "registryd", &mut io::stdout());
    }

    fn command_factory() -> clap::Command { <Self as CommandFactory>::command() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_runs_the_daemon() {
        let cli = Cli::try_parse_from(["registryd"]).unwrap();
        assert!(matches!(cli.resolved_command(), Commands::Run(args) if args == RunArgs::default()));
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli =
            Cli::try_parse_from(["registryd", "run", "--address", "unix:path=/tmp/bus", "-v"])
                .unwrap();
        match cli.resolved_command() {
            Commands::Run(args) => {
                assert_eq!(args.address.as_deref(), Some("unix:path=/tmp/bus"));
                assert!(args.verbose);
                let options = RunOptions::from(&args);
                assert!(options.verbose);
            }
            other => panic!("Expected Run command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_inspection_commands() {
        let cli = Cli::try_parse_from(["registryd", "apps", "--json"]).unwrap();
        assert!(matches!(cli.resolved_command(), Commands::Apps { json: true }));

        let cli = Cli::try_parse_from(["registryd", "keystrokes"]).unwrap();
        assert!(matches!(cli.resolved_command(), Commands::Keystrokes { json: false }));

        let cli = Cli::try_parse_from(["registryd", "grabs", "-j"]).unwrap();
        assert!(matches!(cli.resolved_command(), Commands::Grabs { json: true }));
    }

    #[test]
    fn test_cli_parses_schema() {
        let cli = Cli::try_parse_from(["registryd", "schema"]).unwrap();
        assert!(matches!(cli.resolved_command(), Commands::Schema));
    }

    #[test]
    fn test_cli_parses_completions() {
        let cli = Cli::try_parse_from(["registryd", "completions", "--shell", "zsh"]).unwrap();
        match cli.resolved_command() {
            Commands::Completions { shell } => assert_eq!(shell, Shell::Zsh),
            other => panic!("Expected Completions command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_config_flag_after_subcommand() {
        let cli =
            Cli::try_parse_from(["registryd", "status", "--config", "/path/to/config.jsonc"])
                .unwrap();
        assert_eq!(cli.config_path(), Some(PathBuf::from("/path/to/config.jsonc")));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli =
            Cli::try_parse_from(["registryd", "--config", "/nonexistent/registryd.jsonc", "schema"])
                .unwrap();
        let err = cli.execute().unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[test]
    fn test_app_version_is_not_empty() {
        assert!(!APP_VERSION.is_empty());
    }
}
