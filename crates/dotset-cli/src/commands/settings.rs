//! Handlers for reading and writing individual settings.

use dotset_config::SettingsStore;
use dotset_data::SettingsRows;
use tracing::info;

use crate::cli::{AllArgs, GetArgs, KeyArgs, OutputFormat, SetArgs};
use crate::commands::{Outcome, parse_value};
use crate::context::CliResult;
use crate::output::{format_absent, format_mapping, format_value};

pub(crate) fn handle_get<R: SettingsRows>(
    store: &mut SettingsStore<R>,
    args: &GetArgs,
    format: OutputFormat,
) -> CliResult<Outcome> {
    let value = match &args.default {
        Some(raw) => Some(store.get_or(&args.key, parse_value(raw))?),
        None => store.get(&args.key)?,
    };
    match value.filter(|value| !value.is_null()) {
        Some(value) => Ok(Outcome::printed(format_value(&value, format)?)),
        None => Ok(Outcome::printed(format_absent(format))),
    }
}

pub(crate) fn handle_set<R: SettingsRows>(
    store: &mut SettingsStore<R>,
    args: &SetArgs,
    format: OutputFormat,
) -> CliResult<Outcome> {
    let stored = store.set(&args.key, parse_value(&args.value))?;
    info!(key = %args.key, "setting stored");
    match format {
        OutputFormat::Json => Ok(Outcome::printed(format_value(&stored, format)?)),
        OutputFormat::Table => Ok(Outcome::silent()),
    }
}

pub(crate) fn handle_has<R: SettingsRows>(
    store: &mut SettingsStore<R>,
    args: &KeyArgs,
) -> CliResult<Outcome> {
    let present = store.has(&args.key)?;
    Ok(Outcome::silent().with_exit_code(if present { 0 } else { 1 }))
}

pub(crate) fn handle_forget<R: SettingsRows>(
    store: &mut SettingsStore<R>,
    args: &KeyArgs,
) -> CliResult<Outcome> {
    store.forget(&args.key)?;
    info!(key = %args.key, "setting forgotten");
    Ok(Outcome::silent())
}

pub(crate) fn handle_all<R: SettingsRows>(
    store: &mut SettingsStore<R>,
    args: &AllArgs,
    format: OutputFormat,
) -> CliResult<Outcome> {
    let mapping = store.get_all(!args.no_cache)?;
    Ok(Outcome::printed(format_mapping(&mapping, format)?))
}
