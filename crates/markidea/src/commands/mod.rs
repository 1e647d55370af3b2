pub mod config;
pub mod history;
pub mod note;
pub mod notebook;
pub mod remote;
pub mod trash;

use std::io::Read;

use libmarkidea_core::MarkideaError;

use crate::cli::ContentArgs;

/// Note content from `--content`, `--file`, or stdin
pub fn read_content(input: &ContentArgs) -> Result<String, MarkideaError> {
    if let Some(content) = &input.content {
        return Ok(content.clone());
    }
    if let Some(path) = &input.file {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;
    Ok(content)
}

/// Short commit id for human output
pub fn short_ref(version: &str) -> &str {
    version.get(..10).unwrap_or(version)
}
