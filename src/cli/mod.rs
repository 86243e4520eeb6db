//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Parallel test-suite orchestrator with merged TAP reporting
#[derive(Parser, Debug)]
#[command(name = "harness-multi")]
#[command(version = "0.1.0")]
#[command(about = "Run many test suites through an external harness in parallel")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run all configured suites
    Run(RunArgs),

    /// Show the task set and lane classification without running
    List(ListArgs),

    /// Manage configuration files
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file (default: discovered from standard locations)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the configured pool size
    #[arg(short, long)]
    pub pool_size: Option<usize>,

    /// Skip remaining suites after the first failing run
    #[arg(long)]
    pub bail_out: bool,

    /// Output format (table, json, tap)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Write the TAP document to a file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Suppress per-case progress lines
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Configuration file (default: discovered from standard locations)
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "harness-multi.json")]
        output: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (default: discovered)
        file: Option<String>,
    },

    /// Print the effective configuration
    Show {
        /// Output format (json, yaml)
        #[arg(short, long, default_value = "json")]
        format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_parsing() {
        let args = Args::parse_from([
            "harness-multi",
            "run",
            "--config",
            "suites.json",
            "--pool-size",
            "3",
            "--bail-out",
        ]);
        match args.command {
            Command::Run(run_args) => {
                assert_eq!(run_args.config.as_deref(), Some("suites.json"));
                assert_eq!(run_args.pool_size, Some(3));
                assert!(run_args.bail_out);
                assert_eq!(run_args.format, "table");
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_list_args_parsing() {
        let args = Args::parse_from(["harness-multi", "list"]);
        match args.command {
            Command::List(list_args) => {
                assert!(list_args.config.is_none());
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_config_init_parsing() {
        let args = Args::parse_from(["harness-multi", "config", "init", "--force"]);
        match args.command {
            Command::Config(config_args) => match config_args.action {
                ConfigAction::Init { output, force } => {
                    assert_eq!(output, "harness-multi.json");
                    assert!(force);
                }
                _ => panic!("Expected Init action"),
            },
            _ => panic!("Expected Config command"),
        }
    }
}
