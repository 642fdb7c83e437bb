mod commands;
mod prompts;

use std::fs;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lettavault_config::AppConfig;

use crate::prompts::TerminalPrompts;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "lettavault",
    version,
    about = "Mirror a notes vault into a Letta source and edit the agent's memory"
)]
struct Cli {
    /// Config file (missing file means defaults).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Accept defaults for every setup question; never overwrite on conflict.
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a config file with the default settings.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Resolve (or create) the source and agent and report them.
    Connect,
    /// Run one full reconciliation pass over the vault.
    Sync,
    /// Force-upload one vault document.
    SyncFile {
        /// Vault-relative path, e.g. `notes/today.md`.
        path: String,
    },
    /// Keep the source in step with the vault until interrupted.
    Watch,
    /// Inspect and edit the agent's memory blocks.
    Blocks {
        #[command(subcommand)]
        command: BlockCommands,
    },
    /// Control which uploaded documents the agent has open.
    Files {
        #[command(subcommand)]
        command: FileCommands,
    },
}

#[derive(Debug, Subcommand)]
enum BlockCommands {
    List,
    Show {
        label: String,
    },
    /// Replace a block's value, asking what to do if it changed remotely.
    Edit {
        label: String,
        /// New value.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        value: Option<String>,
        /// Read the new value from this file.
        #[arg(long)]
        file: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum FileCommands {
    Open { path: String },
    Close { path: String },
    CloseAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level)),
        )
        .init();

    let prompts = TerminalPrompts::new(cli.yes, config.agent.clone());

    match cli.command {
        Commands::Init { force } => commands::run_init(&cli.config, force)?,
        Commands::Connect => commands::run_connect(&config, &prompts).await?,
        Commands::Sync => commands::run_sync(&config, &prompts).await?,
        Commands::SyncFile { path } => {
            commands::run_sync_file(&config, &prompts, &normalize(&path)).await?
        }
        Commands::Watch => commands::run_watch(&config, &prompts).await?,
        Commands::Blocks { command } => match command {
            BlockCommands::List => commands::run_blocks_list(&config, &prompts).await?,
            BlockCommands::Show { label } => {
                commands::run_blocks_show(&config, &prompts, &label).await?
            }
            BlockCommands::Edit { label, value, file } => {
                let text = match (value, file) {
                    (Some(value), _) => value,
                    (None, Some(file)) => fs::read_to_string(&file)
                        .with_context(|| format!("could not read {file}"))?,
                    (None, None) => bail!("pass --value or --file"),
                };
                commands::run_blocks_edit(&config, &prompts, &label, text).await?
            }
        },
        Commands::Files { command } => match command {
            FileCommands::Open { path } => {
                commands::run_files_open(&config, &prompts, &normalize(&path)).await?
            }
            FileCommands::Close { path } => {
                commands::run_files_close(&config, &prompts, &normalize(&path)).await?
            }
            FileCommands::CloseAll => commands::run_files_close_all(&config, &prompts).await?,
        },
    }

    Ok(())
}

/// Vault paths are `/`-separated and relative.
fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_paths_are_normalized() {
        assert_eq!(normalize("./notes/a.md"), "notes/a.md");
        assert_eq!(normalize("notes\\a.md"), "notes/a.md");
        assert_eq!(normalize("/a.md"), "a.md");
    }

    #[test]
    fn global_flags_parse_after_the_subcommand() {
        let cli = Cli::try_parse_from(["lettavault", "sync", "--yes", "--config", "x.toml"]).unwrap();
        assert!(cli.yes);
        assert_eq!(cli.config, "x.toml");
        assert!(matches!(cli.command, Commands::Sync));
    }

    #[test]
    fn block_edit_needs_a_value() {
        assert!(Cli::try_parse_from(["lettavault", "blocks", "edit", "human"]).is_err());
        let cli =
            Cli::try_parse_from(["lettavault", "blocks", "edit", "human", "--value", "hi"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Blocks {
                command: BlockCommands::Edit { value: Some(_), .. }
            }
        ));
    }
}
