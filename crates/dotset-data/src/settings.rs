//! `PostgreSQL` row backend for the settings table.

use postgres::{Client, NoTls};
use tracing::{debug, info};

use crate::error::{DataError, Result};
use crate::rows::{SettingRow, SettingsRows};

/// Table used when no explicit name is configured.
pub const DEFAULT_TABLE: &str = "settings__lists";

const MAX_IDENTIFIER_LEN: usize = 63;

fn map_query_err(operation: &'static str) -> impl FnOnce(postgres::Error) -> DataError {
    move |source| DataError::QueryFailed { operation, source }
}

/// Validate a table name so it can be interpolated as a quoted identifier.
///
/// # Errors
///
/// Returns [`DataError::InvalidIdentifier`] when the name is empty, too long, or
/// contains characters outside `[A-Za-z0-9_]` (or starts with a digit).
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid_head = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    let valid_tail = chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid_head && valid_tail && table.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(DataError::InvalidIdentifier {
            field: "table",
            value: table.to_string(),
        })
    }
}

struct Statements {
    create: String,
    find: String,
    insert: String,
    update: String,
    delete: String,
    list: String,
    delete_all: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Self {
            create: format!(
                r#"
                CREATE TABLE IF NOT EXISTS "{table}" (
                    setting_key TEXT NOT NULL PRIMARY KEY,
                    setting_value BYTEA NULL
                )
                "#
            ),
            find: format!(r#"SELECT setting_key, setting_value FROM "{table}" WHERE setting_key = $1"#),
            insert: format!(
                r#"INSERT INTO "{table}" (setting_key, setting_value) VALUES ($1, $2)"#
            ),
            update: format!(r#"UPDATE "{table}" SET setting_value = $2 WHERE setting_key = $1"#),
            delete: format!(r#"DELETE FROM "{table}" WHERE setting_key = $1"#),
            list: format!(
                r#"SELECT setting_key, setting_value FROM "{table}" ORDER BY setting_key"#
            ),
            delete_all: format!(r#"DELETE FROM "{table}""#),
        }
    }
}

/// Settings rows stored in a `PostgreSQL` table.
pub struct PgSettingsRows {
    client: Client,
    table: String,
    statements: Statements,
}

impl PgSettingsRows {
    /// Connect to `PostgreSQL` and bind the backend to `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is invalid or the connection fails.
    pub fn connect(database_url: &str, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let client = Client::connect(database_url, NoTls)
            .map_err(|source| DataError::ConnectFailed { source })?;
        Ok(Self::from_client(client, table))
    }

    fn from_client(client: Client, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            statements: Statements::for_table(table),
        }
    }

    /// Name of the backing table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the settings table when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL statement fails.
    pub fn ensure_schema(&mut self) -> Result<()> {
        self.client
            .batch_execute(&self.statements.create)
            .map_err(map_query_err("ensure settings schema"))?;
        info!(table = %self.table, "settings table ready");
        Ok(())
    }
}

impl SettingsRows for PgSettingsRows {
    fn find_row(&mut self, key: &str) -> Result<Option<SettingRow>> {
        let row = self
            .client
            .query_opt(self.statements.find.as_str(), &[&key])
            .map_err(map_query_err("find setting row"))?;
        Ok(row.map(|row| SettingRow {
            key: row.get("setting_key"),
            value: row.get("setting_value"),
        }))
    }

    fn insert_row(&mut self, key: &str, value: Option<&[u8]>) -> Result<()> {
        self.client
            .execute(self.statements.insert.as_str(), &[&key, &value])
            .map_err(map_query_err("insert setting row"))?;
        debug!(key, "inserted setting row");
        Ok(())
    }

    fn update_row(&mut self, key: &str, value: Option<&[u8]>) -> Result<()> {
        self.client
            .execute(self.statements.update.as_str(), &[&key, &value])
            .map_err(map_query_err("update setting row"))?;
        debug!(key, "updated setting row");
        Ok(())
    }

    fn delete_row(&mut self, key: &str) -> Result<()> {
        self.client
            .execute(self.statements.delete.as_str(), &[&key])
            .map_err(map_query_err("delete setting row"))?;
        debug!(key, "deleted setting row");
        Ok(())
    }

    fn list_rows(&mut self) -> Result<Vec<SettingRow>> {
        let rows = self
            .client
            .query(self.statements.list.as_str(), &[])
            .map_err(map_query_err("list setting rows"))?;
        Ok(rows
            .into_iter()
            .map(|row| SettingRow {
                key: row.get("setting_key"),
                value: row.get("setting_value"),
            })
            .collect())
    }

    fn delete_all_rows(&mut self) -> Result<bool> {
        let deleted = self
            .client
            .execute(self.statements.delete_all.as_str(), &[])
            .map_err(map_query_err("delete all setting rows"))?;
        info!(table = %self.table, deleted, "deleted all setting rows");
        Ok(true)
    }
}
