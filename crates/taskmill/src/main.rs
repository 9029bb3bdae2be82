//! CLI entry point for taskmill.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;

/// Checklist task extraction for Markdown note vaults.
#[derive(Parser, Debug)]
#[command(
    name = "taskmill",
    version,
    about = "taskmill: aggregate checklist tasks from a Markdown note vault"
)]
struct Cli {
    /// Vault root directory (defaults to current).
    #[arg(long, default_value = ".")]
    vault: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the vault and list the extracted tasks.
    List {
        /// Keep only notes under these path prefixes.
        #[arg(short = 'p', long = "path")]
        path: Vec<String>,
        /// Drop notes under these path prefixes.
        #[arg(long = "exclude-path")]
        exclude_path: Vec<String>,
        /// Keep only notes carrying one of these tags.
        #[arg(short = 't', long = "tag")]
        tag: Vec<String>,
        /// Drop notes carrying any of these tags.
        #[arg(long = "exclude-tag")]
        exclude_tag: Vec<String>,
        /// Hide tasks with these markers or status names.
        #[arg(long = "hide")]
        hide: Vec<String>,
        /// Sort specification, e.g. "due desc".
        #[arg(long)]
        sort: Option<String>,
        /// Emit the batch as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// List the note paths contributing tasks.
    Paths,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    install_tracing();

    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    runtime.block_on(commands::run(cli))
}

fn install_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_flags_parse() {
        let cli = Cli::parse_from([
            "taskmill",
            "--vault",
            "/tmp/vault",
            "list",
            "-p",
            "Projects",
            "--tag",
            "#work",
            "--hide",
            "x",
            "--sort",
            "due desc",
            "--json",
        ]);
        assert_eq!(cli.vault, "/tmp/vault");
        match cli.cmd {
            Command::List {
                path,
                tag,
                hide,
                sort,
                json,
                ..
            } => {
                assert_eq!(path, vec!["Projects"]);
                assert_eq!(tag, vec!["#work"]);
                assert_eq!(hide, vec!["x"]);
                assert_eq!(sort.as_deref(), Some("due desc"));
                assert!(json);
            }
            Command::Paths => panic!("expected list command"),
        }
    }
}
