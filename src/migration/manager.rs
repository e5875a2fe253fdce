use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use super::discovery::{MigrationRegistry, discover};
use super::{Migration, MigrationRecord, MigrationState, MigrationStatus};
use crate::config::Config;
use crate::engine::Connection;
use crate::error::{OrmError, OrmResult};
use crate::query::{self, Direction, Operator, OrderClause, Predicate};
use crate::schema::Schema;
use crate::transpiler::{compile_delete_where, compile_insert, compile_select_where};
use crate::value::{DATETIME_FORMAT, Row, Value};

pub const DEFAULT_TABLE: &str = "migrations";

/// Applies and reverts migrations, tracking them in a ledger table.
///
/// Migrations run in lexicographic name order, so timestamp-prefixed names
/// run oldest first. Every `migrate` call forms one batch, executed inside a
/// single transaction; a failure rolls the whole batch back.
pub struct MigrationManager {
    migrations: BTreeMap<String, Box<dyn Migration>>,
    table: String,
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationManager {
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Use a different ledger table.
    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    /// Load every migration found in `dir`.
    pub fn from_directory(dir: &Path, registry: &MigrationRegistry) -> OrmResult<Self> {
        let mut manager = Self::new();
        for (name, migration) in discover(dir, registry)? {
            manager.migrations.insert(name, migration);
        }
        Ok(manager)
    }

    /// Load the configured directory into the configured ledger table.
    pub fn from_config(config: &Config, registry: &MigrationRegistry) -> OrmResult<Self> {
        Ok(Self::from_directory(&config.migrations.directory, registry)?
            .with_table(&config.migrations.table))
    }

    pub fn add(&mut self, name: &str, migration: impl Migration + 'static) -> &mut Self {
        self.migrations.insert(name.to_string(), Box::new(migration));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Known migration names, in run order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.migrations.keys().map(String::as_str)
    }

    /// Apply pending migrations as one new batch; at most `steps` of them
    /// when given. Returns the names applied.
    pub fn migrate(&self, conn: &mut dyn Connection, steps: Option<usize>) -> OrmResult<Vec<String>> {
        let ran = self.ran(conn)?;
        let applied: BTreeSet<&str> = ran.iter().map(|r| r.name.as_str()).collect();
        let pending: Vec<&str> = self
            .names()
            .filter(|name| !applied.contains(name))
            .take(steps.unwrap_or(usize::MAX))
            .collect();

        if pending.is_empty() {
            info!("Nothing to migrate");
            return Ok(Vec::new());
        }

        let batch = ran.iter().map(|r| r.batch).max().unwrap_or(0) + 1;
        info!(batch, count = pending.len(), "Running migrations");

        self.in_transaction(conn, &pending, |manager, conn, name| {
            manager.run_up(conn, name, batch)
        })?;
        Ok(pending.into_iter().map(str::to_string).collect())
    }

    /// Revert the last `steps` batches (one when `None`), newest first.
    /// Returns the names reverted.
    pub fn rollback(&self, conn: &mut dyn Connection, steps: Option<usize>) -> OrmResult<Vec<String>> {
        let ran = self.ran(conn)?;
        let batches: BTreeSet<i64> = ran
            .iter()
            .map(|r| r.batch)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .rev()
            .take(steps.unwrap_or(1))
            .collect();
        let targets: Vec<MigrationRecord> = ran
            .into_iter()
            .rev()
            .filter(|r| batches.contains(&r.batch))
            .collect();
        self.revert(conn, targets)
    }

    /// Revert every applied migration.
    pub fn reset(&self, conn: &mut dyn Connection) -> OrmResult<Vec<String>> {
        let ran = self.ran(conn)?;
        self.revert(conn, ran.into_iter().rev().collect())
    }

    /// Reset, then migrate everything again as a single batch.
    pub fn refresh(&self, conn: &mut dyn Connection) -> OrmResult<Vec<String>> {
        self.reset(conn)?;
        self.migrate(conn, None)
    }

    /// Every known migration with its state.
    pub fn status(&self, conn: &mut dyn Connection) -> OrmResult<Vec<MigrationStatus>> {
        let batches: HashMap<String, i64> = self
            .ran(conn)?
            .into_iter()
            .map(|r| (r.name, r.batch))
            .collect();

        Ok(self
            .names()
            .map(|name| {
                let batch = batches.get(name).copied();
                MigrationStatus {
                    name: name.to_string(),
                    state: if batch.is_some() {
                        MigrationState::Ran
                    } else {
                        MigrationState::Pending
                    },
                    batch,
                }
            })
            .collect())
    }

    /// Ledger rows in the order they were applied.
    pub fn ran(&self, conn: &mut dyn Connection) -> OrmResult<Vec<MigrationRecord>> {
        self.ensure_ledger(conn)?;

        let orders = [
            OrderClause {
                column: "batch".to_string(),
                direction: Direction::Asc,
            },
            OrderClause {
                column: "id".to_string(),
                direction: Direction::Asc,
            },
        ];
        let q = compile_select_where(
            conn.dialect(),
            &self.table,
            &["migration", "batch", "executed_at"],
            &[],
            &orders,
        );
        query::fetch(conn, &self.table, &q)?
            .iter()
            .map(record_from_row)
            .collect()
    }

    fn ensure_ledger(&self, conn: &mut dyn Connection) -> OrmResult<()> {
        let mut schema = Schema::new(conn);
        if schema.has_table(&self.table)? {
            return Ok(());
        }
        info!(table = %self.table, "Creating migration ledger");
        schema.create(&self.table, |table| {
            table.increments("id");
            table.string("migration", 255).unique();
            table.integer("batch");
            table.timestamp("executed_at").nullable();
        })
    }

    fn revert(&self, conn: &mut dyn Connection, targets: Vec<MigrationRecord>) -> OrmResult<Vec<String>> {
        if targets.is_empty() {
            info!("Nothing to rollback");
            return Ok(Vec::new());
        }
        if let Some(missing) = targets.iter().find(|r| !self.migrations.contains_key(&r.name)) {
            return Err(OrmError::Config("migration is recorded but not known".to_string())
                .in_migration(missing.name.as_str()));
        }

        let names: Vec<&str> = targets.iter().map(|r| r.name.as_str()).collect();
        info!(count = names.len(), "Rolling back migrations");
        self.in_transaction(conn, &names, |manager, conn, name| manager.run_down(conn, name))?;
        Ok(names.into_iter().map(str::to_string).collect())
    }

    /// Run `step` for each name inside one transaction.
    fn in_transaction(
        &self,
        conn: &mut dyn Connection,
        names: &[&str],
        step: impl Fn(&Self, &mut dyn Connection, &str) -> OrmResult<()>,
    ) -> OrmResult<()> {
        conn.begin().map_err(|e| OrmError::query_failed("BEGIN", e))?;

        for name in names {
            if let Err(err) = step(self, &mut *conn, name) {
                if let Err(rollback_err) = conn.rollback() {
                    warn!(migration = %name, error = %rollback_err, "Rollback failed");
                }
                return Err(err.in_migration(*name));
            }
        }

        conn.commit().map_err(|e| OrmError::query_failed("COMMIT", e))
    }

    fn run_up(&self, conn: &mut dyn Connection, name: &str, batch: i64) -> OrmResult<()> {
        let migration = self.known(name)?;
        migration.up(&mut Schema::new(&mut *conn))?;

        let mut row = Row::new();
        row.insert("migration".to_string(), Value::from(name));
        row.insert("batch".to_string(), Value::Int(batch));
        row.insert("executed_at".to_string(), Value::now());
        let q = compile_insert(conn.dialect(), &self.table, &row, None);
        query::execute(conn, &self.table, &q)?;

        info!(migration = %name, batch, "Migrated");
        Ok(())
    }

    fn run_down(&self, conn: &mut dyn Connection, name: &str) -> OrmResult<()> {
        let migration = self.known(name)?;
        migration.down(&mut Schema::new(&mut *conn))?;

        let predicate = Predicate::Compare {
            column: "migration".to_string(),
            op: Operator::Eq,
            value: Value::from(name),
        };
        let q = compile_delete_where(conn.dialect(), &self.table, &[predicate]);
        query::execute(conn, &self.table, &q)?;

        info!(migration = %name, "Rolled back");
        Ok(())
    }

    fn known(&self, name: &str) -> OrmResult<&dyn Migration> {
        self.migrations
            .get(name)
            .map(|m| m.as_ref())
            .ok_or_else(|| OrmError::Config(format!("unknown migration '{}'", name)))
    }
}

fn record_from_row(row: &Row) -> OrmResult<MigrationRecord> {
    let name = row
        .get("migration")
        .and_then(Value::as_str)
        .ok_or_else(|| OrmError::query("ledger row without a migration name"))?
        .to_string();
    let batch = row
        .get("batch")
        .and_then(Value::as_i64)
        .ok_or_else(|| OrmError::query(format!("ledger row '{}' without a batch", name)))?;
    let executed_at = match row.get("executed_at") {
        Some(Value::DateTime(dt)) => Some(*dt),
        Some(Value::Text(s)) => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok(),
        _ => None,
    };

    Ok(MigrationRecord {
        name,
        batch,
        executed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SqlxConnection;
    use crate::migration::SqlFileMigration;
    use pretty_assertions::assert_eq;

    fn sql(up: &str, down: &str) -> SqlFileMigration {
        SqlFileMigration::parse(&format!("-- up\n{}\n-- down\n{}\n", up, down))
    }

    fn manager() -> MigrationManager {
        let mut manager = MigrationManager::new();
        manager
            .add(
                "2024_01_01_000000_create_accounts_table",
                sql("CREATE TABLE accounts (id INTEGER PRIMARY KEY)", "DROP TABLE accounts"),
            )
            .add(
                "2024_01_02_000000_create_posts_table",
                sql("CREATE TABLE posts (id INTEGER PRIMARY KEY)", "DROP TABLE posts"),
            );
        manager
    }

    #[test]
    fn test_migrate_records_batch() {
        let mut conn = SqlxConnection::connect("sqlite::memory:").unwrap();
        let manager = manager();

        let applied = manager.migrate(&mut conn, None).unwrap();
        assert_eq!(applied.len(), 2);
        assert!(manager.migrate(&mut conn, None).unwrap().is_empty());

        let ran = manager.ran(&mut conn).unwrap();
        assert_eq!(ran.iter().map(|r| r.batch).collect::<Vec<_>>(), vec![1, 1]);
        assert!(ran.iter().all(|r| r.executed_at.is_some()));
    }

    #[test]
    fn test_steps_split_batches() {
        let mut conn = SqlxConnection::connect("sqlite::memory:").unwrap();
        let manager = manager();

        manager.migrate(&mut conn, Some(1)).unwrap();
        manager.migrate(&mut conn, Some(1)).unwrap();
        let status = manager.status(&mut conn).unwrap();
        assert_eq!(status[0].batch, Some(1));
        assert_eq!(status[1].batch, Some(2));

        let reverted = manager.rollback(&mut conn, None).unwrap();
        assert_eq!(reverted, vec!["2024_01_02_000000_create_posts_table".to_string()]);
        let status = manager.status(&mut conn).unwrap();
        assert_eq!(status[0].state, MigrationState::Ran);
        assert_eq!(status[1].state, MigrationState::Pending);
    }

    #[test]
    fn test_failed_migration_rolls_back_batch() {
        let mut conn = SqlxConnection::connect("sqlite::memory:").unwrap();
        let mut manager = manager();
        manager.add("2024_01_03_000000_broken", sql("CREATE TABLE accounts (id INTEGER)", ""));

        let err = manager.migrate(&mut conn, None).unwrap_err();
        assert!(matches!(err, OrmError::Migration { ref name, .. } if name == "2024_01_03_000000_broken"));
        assert!(manager.ran(&mut conn).unwrap().is_empty());
        assert!(!Schema::new(&mut conn).has_table("accounts").unwrap());
    }

    #[test]
    fn test_custom_ledger_table() {
        let mut conn = SqlxConnection::connect("sqlite::memory:").unwrap();
        let manager = manager().with_table("schema_history");
        manager.migrate(&mut conn, None).unwrap();
        assert!(Schema::new(&mut conn).has_table("schema_history").unwrap());
        assert!(!Schema::new(&mut conn).has_table(DEFAULT_TABLE).unwrap());
    }
}
