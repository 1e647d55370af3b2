use libmarkidea_core::{MarkideaError, VersionRecord};
use serde::Serialize;

use crate::cli::{Cli, HistoryCommand};
use crate::commands::short_ref;
use crate::context::{require_user, MarkideaContext};
use crate::output::{output_success, print_human, print_table};

#[derive(Serialize)]
struct HistoryOutput {
    notebook: String,
    title: String,
    versions: Vec<VersionRecord>,
}

#[derive(Serialize)]
struct VersionContentOutput {
    notebook: String,
    title: String,
    version: String,
    content: String,
}

pub fn run(cli: &Cli, cmd: HistoryCommand) -> Result<(), MarkideaError> {
    let user = require_user(cli)?;
    let ctx = MarkideaContext::resolve(cli)?;
    let service = ctx.open_service()?;

    match cmd {
        HistoryCommand::List { notebook, title } => {
            let versions = service.history(user, &notebook, &title)?;
            let rows = versions
                .iter()
                .map(|v| {
                    vec![
                        v.version_ref.clone(),
                        v.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    ]
                })
                .collect();
            print_table(cli, &["Version", "Time"], rows);
            output_success(cli, HistoryOutput { notebook, title, versions });
        }
        HistoryCommand::Show { notebook, title, version } => {
            let content = service.history_content(user, &notebook, &title, &version)?;
            if !cli.json && !cli.quiet {
                print!("{}", content);
            }
            output_success(
                cli,
                VersionContentOutput {
                    notebook,
                    title,
                    version,
                    content,
                },
            );
        }
        HistoryCommand::Reset { notebook, title, version } => {
            let content = service.reset_and_get(user, &notebook, &title, &version)?;
            print_human(
                cli,
                &format!("Reset {}/{} to {}", notebook, title, short_ref(&version)),
            );
            output_success(
                cli,
                VersionContentOutput {
                    notebook,
                    title,
                    version,
                    content,
                },
            );
        }
    }

    Ok(())
}
