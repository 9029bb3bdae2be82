//! Command handlers wiring the CLI onto the extraction engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use taskmill_core::{DateKind, TaskRecord};
use taskmill_engine::{RefreshQuery, TaskAdapter, VaultConfig};
use taskmill_store_fs::FsStore;

use crate::{Cli, Command};

/// Execute the parsed command against the vault.
pub async fn run(cli: Cli) -> Result<()> {
    let store = Arc::new(
        FsStore::open(&cli.vault).with_context(|| format!("failed to open vault {}", cli.vault))?,
    );
    let config = VaultConfig::load(&cli.vault)?;
    let adapter = TaskAdapter::new(store);

    match cli.cmd {
        Command::List {
            path,
            exclude_path,
            tag,
            exclude_tag,
            hide,
            sort,
            json,
        } => {
            let mut options = config.extract;
            if !hide.is_empty() {
                options.hide_status = hide;
            }
            if sort.is_some() {
                options.sort = sort;
            }
            let batch = adapter
                .refresh(RefreshQuery {
                    path_include: path,
                    path_exclude: exclude_path,
                    tag_include: tag,
                    tag_exclude: exclude_tag,
                    options,
                })
                .await?;
            for failure in &batch.failures {
                warn!(note = failure.path.as_str(), "skipped: {}", failure.message);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&batch.records)?);
            } else {
                print_records(&adapter.sorted_records());
            }
        }

        Command::Paths => {
            adapter.refresh(RefreshQuery::default()).await?;
            for path in adapter.note_paths() {
                println!("{path}");
            }
        }
    }
    Ok(())
}

fn print_records(records: &[TaskRecord]) {
    for record in records {
        let mut line = format!("[{}] {:<11} {}", record.marker, record.status.as_str(), record.visual);
        if let Some(due) = record.date(DateKind::Due) {
            line.push_str(&format!("  due {due}"));
        }
        if !record.tags.is_empty() {
            let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
            line.push_str(&format!("  {}", tags.join(" ")));
        }
        line.push_str(&format!("  ({})", record.key));
        println!("{line}");
    }
    println!("{} task(s)", records.len());
}
