use chrono::{TimeZone, Utc};
use libmarkidea_core::{DeletedNoteSnapshot, MarkideaError};
use serde::Serialize;

use crate::cli::{Cli, TrashCommand};
use crate::context::{require_user, MarkideaContext};
use crate::output::{output_success, print_human, print_table};

#[derive(Serialize)]
struct TrashListOutput {
    deleted: Vec<DeletedNoteSnapshot>,
}

#[derive(Serialize)]
struct ClearOutput {
    removed: usize,
}

fn deleted_at(snapshot: &DeletedNoteSnapshot) -> String {
    Utc.timestamp_millis_opt(snapshot.deleted_at_ms as i64)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn run(cli: &Cli, cmd: TrashCommand) -> Result<(), MarkideaError> {
    let user = require_user(cli)?;
    let ctx = MarkideaContext::resolve(cli)?;
    let service = ctx.open_service()?;

    match cmd {
        TrashCommand::List => {
            let deleted = service.list_deleted(user)?;
            let rows = deleted
                .iter()
                .map(|s| {
                    vec![
                        s.id.to_string(),
                        s.notebook.clone(),
                        s.title.clone(),
                        deleted_at(s),
                    ]
                })
                .collect();
            print_table(cli, &["Id", "Notebook", "Title", "Deleted"], rows);
            output_success(cli, TrashListOutput { deleted });
        }
        TrashCommand::Recover { id } => {
            let snapshot = service.recover_note(user, id)?;
            print_human(
                cli,
                &format!("Recovered {}/{}", snapshot.notebook, snapshot.title),
            );
            output_success(cli, snapshot);
        }
        TrashCommand::Clear { id, all } => {
            let removed = if all {
                service.clear_all_deleted(user)?
            } else {
                let id = id.ok_or_else(|| {
                    MarkideaError::InvalidArgs("pass a trash id or --all".to_string())
                })?;
                service.clear_deleted(user, id)?;
                1
            };
            print_human(cli, &format!("Removed {} deleted notes", removed));
            output_success(cli, ClearOutput { removed });
        }
    }

    Ok(())
}
