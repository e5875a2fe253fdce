//! Versioned schema migrations.
//!
//! A migration is a named pair of `up`/`down` steps. The
//! [`MigrationManager`] applies pending migrations in name order, recording
//! each in a ledger table with the batch it ran in, and reverts whole
//! batches on rollback.
//!
//! Migrations come from code (implement [`Migration`] and register the type
//! under its class name) or from `.sql` files with `-- up` and `-- down`
//! sections; [`discover`] maps a directory of
//! `<timestamp>_<snake_name>.<ext>` files onto both.

pub mod discovery;
pub mod manager;

pub use discovery::{MigrationFile, MigrationRegistry, SqlFileMigration, discover, parse_file_name};
pub use manager::MigrationManager;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::OrmResult;
use crate::schema::Schema;

/// One reversible schema change.
pub trait Migration {
    fn up(&self, schema: &mut Schema<'_>) -> OrmResult<()>;

    fn down(&self, schema: &mut Schema<'_>) -> OrmResult<()>;
}

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationRecord {
    pub name: String,
    pub batch: i64,
    pub executed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MigrationState {
    Ran,
    Pending,
}

/// One known migration and where it stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub state: MigrationState,
    /// The batch it ran in, when it has run.
    pub batch: Option<i64>,
}
