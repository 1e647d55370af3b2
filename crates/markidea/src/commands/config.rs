use libmarkidea_core::config::{save_config, ServiceConfig, CONFIG_FILE_NAME};
use libmarkidea_core::MarkideaError;
use serde::Serialize;

use crate::cli::{Cli, ConfigCommand};
use crate::context::{data_dir, MarkideaContext};
use crate::output::{output_success, print_human};

#[derive(Serialize)]
struct ConfigOutput {
    path: String,
    config: ServiceConfig,
}

pub fn run(cli: &Cli, cmd: ConfigCommand) -> Result<(), MarkideaError> {
    match cmd {
        ConfigCommand::Init { force } => {
            let (path, config) = match &cli.config {
                Some(path) => {
                    let base = path.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| data_dir(cli));
                    (path.clone(), ServiceConfig::with_data_dir(&base))
                }
                None => {
                    let dir = data_dir(cli);
                    (dir.join(CONFIG_FILE_NAME), ServiceConfig::with_data_dir(&dir))
                }
            };

            if path.exists() && !force {
                return Err(MarkideaError::AlreadyExists(format!(
                    "config file {} (use --force to overwrite)",
                    path.display()
                )));
            }
            save_config(&path, &config)?;
            config.ensure_layout()?;

            print_human(cli, &format!("Wrote {}", path.display()));
            output_success(
                cli,
                ConfigOutput {
                    path: path.display().to_string(),
                    config,
                },
            );
        }
        ConfigCommand::Show => {
            let ctx = MarkideaContext::resolve(cli)?;
            print_human(
                cli,
                &format!(
                    "config: {}\nnotes_dir: {}\nssh_keys_dir: {}\ndb_path: {}",
                    ctx.config_path.display(),
                    ctx.config.notes_dir.display(),
                    ctx.config.ssh_keys_dir.display(),
                    ctx.config.db_path.display()
                ),
            );
            output_success(
                cli,
                ConfigOutput {
                    path: ctx.config_path.display().to_string(),
                    config: ctx.config,
                },
            );
        }
    }

    Ok(())
}
