use libmarkidea_core::{DeletedNoteSnapshot, MarkideaError};
use libmarkidea_notes::{NoteStatus, NoteSummary, SearchHit};
use serde::Serialize;

use crate::cli::{Cli, NoteCommand};
use crate::commands::{read_content, short_ref};
use crate::context::{require_user, MarkideaContext};
use crate::output::{output_success, print_human, print_table};

#[derive(Serialize)]
struct NoteListOutput {
    notebook: String,
    notes: Vec<NoteSummary>,
}

#[derive(Serialize)]
struct NoteContentOutput {
    notebook: String,
    title: String,
    content: String,
}

#[derive(Serialize)]
struct SaveOutput {
    notebook: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

#[derive(Serialize)]
struct MoveOutput {
    from_notebook: String,
    from_title: String,
    to_notebook: String,
    to_title: String,
}

#[derive(Serialize)]
struct SearchOutput {
    keyword: String,
    hits: Vec<SearchHit>,
}

fn status_label(status: NoteStatus) -> &'static str {
    match status {
        NoteStatus::Saved => "saved",
        NoteStatus::Unsaved => "unsaved",
    }
}

pub fn run(cli: &Cli, cmd: NoteCommand) -> Result<(), MarkideaError> {
    let user = require_user(cli)?;
    let ctx = MarkideaContext::resolve(cli)?;
    let service = ctx.open_service()?;

    match cmd {
        NoteCommand::List { notebook } => {
            let notes = service.list_notes(user, &notebook)?;
            let rows = notes
                .iter()
                .map(|n| {
                    vec![
                        n.title.clone(),
                        n.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
                        status_label(n.status).to_string(),
                        n.preview.replace('\n', " "),
                    ]
                })
                .collect();
            print_table(cli, &["Title", "Modified", "Status", "Preview"], rows);
            output_success(cli, NoteListOutput { notebook, notes });
        }
        NoteCommand::Show { notebook, title } => {
            let content = service.get_note(user, &notebook, &title)?;
            if !cli.json && !cli.quiet {
                print!("{}", content);
            }
            output_success(cli, NoteContentOutput { notebook, title, content });
        }
        NoteCommand::Save { notebook, title, input } => {
            let content = read_content(&input)?;
            let version = service.save_note(user, &notebook, &title, &content)?;
            print_human(cli, &format!("Saved {}/{} ({})", notebook, title, short_ref(&version)));
            output_success(cli, SaveOutput { notebook, title, version: Some(version) });
        }
        NoteCommand::Create { notebook, title, input } => {
            let content = read_content(&input)?;
            let version = service.create_note(user, &notebook, &title, &content)?;
            print_human(cli, &format!("Created {}/{} ({})", notebook, title, short_ref(&version)));
            output_success(cli, SaveOutput { notebook, title, version: Some(version) });
        }
        NoteCommand::TmpSave { notebook, title, input } => {
            let content = read_content(&input)?;
            service.tmp_save_note(user, &notebook, &title, &content)?;
            print_human(cli, &format!("Stored draft of {}/{}", notebook, title));
            output_success(cli, SaveOutput { notebook, title, version: None });
        }
        NoteCommand::Discard { notebook, title } => {
            service.discard_unsaved(user, &notebook, &title)?;
            print_human(cli, &format!("Discarded unsaved changes of {}/{}", notebook, title));
            output_success(cli, SaveOutput { notebook, title, version: None });
        }
        NoteCommand::Copy { notebook, title, target } => {
            let version = service.copy_note(user, &notebook, &title, &target)?;
            print_human(cli, &format!("Copied {}/{} to {}", notebook, title, target));
            output_success(
                cli,
                SaveOutput {
                    notebook: target,
                    title,
                    version: Some(version),
                },
            );
        }
        NoteCommand::Move {
            notebook,
            title,
            target,
            new_title,
        } => {
            let target_title = new_title.unwrap_or_else(|| title.clone());
            service.move_note(user, &notebook, &title, &target, &target_title)?;
            print_human(
                cli,
                &format!("Moved {}/{} to {}/{}", notebook, title, target, target_title),
            );
            output_success(
                cli,
                MoveOutput {
                    from_notebook: notebook,
                    from_title: title,
                    to_notebook: target,
                    to_title: target_title,
                },
            );
        }
        NoteCommand::Delete { notebook, title } => {
            let snapshot: DeletedNoteSnapshot = service.delete_note(user, &notebook, &title)?;
            print_human(
                cli,
                &format!("Deleted {}/{} (trash id {})", notebook, title, snapshot.id),
            );
            output_success(cli, snapshot);
        }
        NoteCommand::Search { keyword, notebooks } => {
            let scope = if notebooks.is_empty() {
                None
            } else {
                Some(notebooks.as_slice())
            };
            let hits = service.search(user, &keyword, scope)?;
            let rows = hits
                .iter()
                .map(|h| vec![h.notebook.clone(), h.title.clone(), h.hits.to_string()])
                .collect();
            print_table(cli, &["Notebook", "Title", "Hits"], rows);
            output_success(cli, SearchOutput { keyword, hits });
        }
    }

    Ok(())
}
