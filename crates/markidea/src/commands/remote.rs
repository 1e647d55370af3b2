use libmarkidea_core::{MarkideaError, SyncConfig, SyncReport};

use crate::cli::{Cli, RemoteCommand};
use crate::context::{require_user, MarkideaContext};
use crate::output::{output_success, print_human};

fn describe(config: &SyncConfig) -> String {
    format!(
        "remote: {}\npush: {}",
        config.remote_url.as_deref().unwrap_or("(none)"),
        if config.push_enabled { "enabled" } else { "disabled" }
    )
}

fn report(cli: &Cli, action: &str, report: SyncReport) -> Result<(), MarkideaError> {
    if report.success {
        print_human(cli, &format!("{}: {}", action, report.message));
    } else {
        print_human(cli, &format!("{} failed: {}", action, report.message));
    }
    output_success(cli, report);
    Ok(())
}

pub fn run(cli: &Cli, cmd: RemoteCommand) -> Result<(), MarkideaError> {
    let user = require_user(cli)?;
    let ctx = MarkideaContext::resolve(cli)?;
    let service = ctx.open_service()?;

    match cmd {
        RemoteCommand::Show => {
            let config = service.sync_config(user)?;
            print_human(cli, &describe(&config));
            output_success(cli, config);
        }
        RemoteCommand::Set { url } => {
            let config = service.set_remote(user, &url)?;
            print_human(cli, &describe(&config));
            output_success(cli, config);
        }
        RemoteCommand::Enable => {
            let config = service.enable_push(user)?;
            print_human(cli, &describe(&config));
            output_success(cli, config);
        }
        RemoteCommand::Disable => {
            let config = service.disable_push(user)?;
            print_human(cli, &describe(&config));
            output_success(cli, config);
        }
        RemoteCommand::Push => report(cli, "Push", service.push_now(user)?)?,
        RemoteCommand::Pull => report(cli, "Pull", service.pull(user)?)?,
    }

    Ok(())
}
