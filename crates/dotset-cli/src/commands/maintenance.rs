//! Handlers that operate on the whole settings set.

use anyhow::anyhow;
use dotset_config::{CleanOptions, SettingsStore};
use dotset_data::{PgSettingsRows, SettingsRows};

use crate::cli::{CleanArgs, OutputFormat};
use crate::commands::Outcome;
use crate::context::{CliError, CliResult};
use crate::output::format_report;

pub(crate) fn handle_flush<R: SettingsRows>(store: &mut SettingsStore<R>) -> CliResult<Outcome> {
    if store.flush()? {
        Ok(Outcome::printed("Settings flushed."))
    } else {
        Ok(Outcome::printed("Settings cache cleared; no rows were deleted.").with_exit_code(3))
    }
}

pub(crate) fn handle_clean<R: SettingsRows>(
    store: &mut SettingsStore<R>,
    args: &CleanArgs,
    format: OutputFormat,
) -> CliResult<Outcome> {
    let report = store.clean(CleanOptions { flush: args.flush })?;
    Ok(Outcome::printed(format_report(&report, format)?))
}

pub(crate) fn handle_init(rows: &mut PgSettingsRows) -> CliResult<Outcome> {
    rows.ensure_schema().map_err(|err| {
        CliError::failure(anyhow!(err).context("failed to provision the settings table"))
    })?;
    Ok(Outcome::printed(format!(
        "Settings table \"{}\" is ready.",
        rows.table()
    )))
}
