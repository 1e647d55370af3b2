use libmarkidea_core::MarkideaError;
use serde::Serialize;

use crate::cli::{Cli, NotebookCommand};
use crate::context::{require_user, MarkideaContext};
use crate::output::{output_success, print_human, print_table};

#[derive(Serialize)]
struct NotebookListOutput {
    notebooks: Vec<String>,
}

#[derive(Serialize)]
struct NotebookOutput {
    notebook: String,
}

#[derive(Serialize)]
struct RenameOutput {
    old_name: String,
    new_name: String,
}

#[derive(Serialize)]
struct DeleteOutput {
    notebook: String,
    deleted_ids: Vec<u64>,
}

pub fn run(cli: &Cli, cmd: NotebookCommand) -> Result<(), MarkideaError> {
    let user = require_user(cli)?;
    let ctx = MarkideaContext::resolve(cli)?;
    let service = ctx.open_service()?;

    match cmd {
        NotebookCommand::List => {
            let notebooks = service.list_notebooks(user)?;
            print_table(cli, &["Notebook"], notebooks.iter().map(|n| vec![n.clone()]).collect());
            output_success(cli, NotebookListOutput { notebooks });
        }
        NotebookCommand::Create { name } => {
            service.create_notebook(user, &name)?;
            print_human(cli, &format!("Created notebook {}", name));
            output_success(cli, NotebookOutput { notebook: name });
        }
        NotebookCommand::Rename { old_name, new_name } => {
            service.rename_notebook(user, &old_name, &new_name)?;
            print_human(cli, &format!("Renamed notebook {} to {}", old_name, new_name));
            output_success(cli, RenameOutput { old_name, new_name });
        }
        NotebookCommand::Delete { name } => {
            let deleted = service.delete_notebook(user, &name)?;
            print_human(
                cli,
                &format!("Deleted notebook {} ({} notes moved to trash)", name, deleted.len()),
            );
            output_success(
                cli,
                DeleteOutput {
                    notebook: name,
                    deleted_ids: deleted.iter().map(|s| s.id).collect(),
                },
            );
        }
    }

    Ok(())
}
