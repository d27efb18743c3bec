//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use dotset_config::CleanReport;
use dotset_config::path::flatten;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cli::OutputFormat;
use crate::context::{CliError, CliResult};

fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn format_value(value: &Value, format: OutputFormat) -> CliResult<String> {
    match (format, value) {
        (OutputFormat::Json, _) | (OutputFormat::Table, Value::Array(_) | Value::Object(_)) => {
            to_json(value)
        }
        (OutputFormat::Table, scalar) => Ok(scalar_text(scalar)),
    }
}

pub(crate) const fn format_absent(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Json => "null",
        OutputFormat::Table => "(not set)",
    }
}

pub(crate) fn format_mapping(mapping: &Map<String, Value>, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(mapping);
    }
    let flat = flatten(&Value::Object(mapping.clone()));
    if flat.is_empty() {
        return Ok("(no settings)".to_string());
    }
    let width = flat.keys().map(String::len).max().unwrap_or(0).max("KEY".len());
    let mut lines = vec![format!("{:<width$} VALUE", "KEY")];
    lines.extend(
        flat.iter()
            .map(|(key, value)| format!("{key:<width$} {}", scalar_text(value))),
    );
    Ok(lines.join("\n"))
}

pub(crate) fn format_report(report: &CleanReport, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(report);
    }
    if report.is_noop() {
        return Ok("Settings already match defaults.".to_string());
    }
    let mut lines = Vec::new();
    if report.flushed {
        lines.push("flushed all settings".to_string());
    }
    lines.extend(report.removed.iter().map(|key| format!("removed  {key}")));
    lines.extend(report.inserted.iter().map(|key| format!("inserted {key}")));
    Ok(lines.join("\n"))
}
