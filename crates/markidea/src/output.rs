use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::Table;
use libmarkidea_core::MarkideaError;
use serde::Serialize;

use crate::cli::Cli;

/// Envelope around every `--json` result
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub schema_version: u32,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonError>,
}

#[derive(Serialize)]
pub struct JsonError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<&'static str>,
}

const SCHEMA_VERSION: u32 = 1;

impl<T: Serialize> JsonResponse<T> {
    fn success(data: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl JsonResponse<()> {
    fn failure(err: &MarkideaError) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ok: false,
            data: None,
            error: Some(JsonError {
                code: err.error_code().to_string(),
                message: err.to_string(),
                suggestions: err.suggestions(),
            }),
        }
    }
}

fn to_pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"serialize_error\":\"{}\"}}", e))
}

/// Print `data` in the envelope. Human output is printed by each command.
pub fn output_success<T: Serialize>(cli: &Cli, data: T) {
    if cli.json {
        println!("{}", to_pretty(&JsonResponse::success(data)));
    }
}

pub fn output_error(cli: &Cli, err: &MarkideaError) {
    if cli.json {
        eprintln!("{}", to_pretty(&JsonResponse::failure(err)));
        return;
    }

    eprintln!("error: {}", err);
    let suggestions = err.suggestions();
    if !suggestions.is_empty() {
        eprintln!();
        eprintln!("Suggestions:");
        for suggestion in suggestions {
            eprintln!("  - {}", suggestion);
        }
    }
}

/// Print human-readable output (ignored in quiet and JSON mode)
pub fn print_human(cli: &Cli, msg: &str) {
    if !cli.json && !cli.quiet {
        println!("{}", msg);
    }
}

/// Print a table in human mode
pub fn print_table(cli: &Cli, header: &[&str], rows: Vec<Vec<String>>) {
    if cli.json || cli.quiet {
        return;
    }
    if rows.is_empty() {
        println!("(none)");
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED).set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}
