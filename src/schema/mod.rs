//! Schema facade: builds blueprints and applies their DDL through a connection.
//!
//! ```rust,ignore
//! let mut schema = Schema::new(&mut conn);
//! schema.create("accounts", |table| {
//!     table.id();
//!     table.string("email", 255).unique();
//!     table.timestamps();
//! })?;
//! assert!(schema.has_column("accounts", "email")?);
//! ```

pub mod blueprint;
pub mod grammar;
pub mod types;

pub use blueprint::{
    Blueprint, BlueprintMode, ColumnDefault, ColumnDefinition, Command, ForeignKeyDefinition,
    IndexDefinition, IndexKind,
};
pub use types::ColumnType;

use crate::dialect::Dialect;
use crate::engine::Connection;
use crate::error::{OrmError, OrmResult};
use crate::value::Value;

pub struct Schema<'c> {
    conn: &'c mut dyn Connection,
}

impl<'c> Schema<'c> {
    pub fn new(conn: &'c mut dyn Connection) -> Self {
        Self { conn }
    }

    pub fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    /// The underlying connection, for statements the facade does not cover.
    pub fn connection(&mut self) -> &mut dyn Connection {
        &mut *self.conn
    }

    /// Create a table.
    pub fn create(&mut self, table: &str, build: impl FnOnce(&mut Blueprint)) -> OrmResult<()> {
        let mut blueprint = Blueprint::create(table);
        build(&mut blueprint);
        self.build(&blueprint)
    }

    /// Alter an existing table.
    pub fn table(&mut self, table: &str, build: impl FnOnce(&mut Blueprint)) -> OrmResult<()> {
        let mut blueprint = Blueprint::alter(table);
        build(&mut blueprint);
        self.build(&blueprint)
    }

    /// Run every statement of a prepared blueprint.
    pub fn build(&mut self, blueprint: &Blueprint) -> OrmResult<()> {
        for sql in blueprint.statements(self.dialect())? {
            self.statement(&sql)?;
        }
        Ok(())
    }

    pub fn drop(&mut self, table: &str) -> OrmResult<()> {
        let sql = format!("DROP TABLE {}", self.dialect().quote_identifier(table));
        self.statement(&sql)
    }

    pub fn drop_if_exists(&mut self, table: &str) -> OrmResult<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", self.dialect().quote_identifier(table));
        self.statement(&sql)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> OrmResult<()> {
        let dialect = self.dialect();
        let (from, to) = (dialect.quote_identifier(from), dialect.quote_identifier(to));
        let sql = match dialect {
            Dialect::Mysql => format!("RENAME TABLE {} TO {}", from, to),
            Dialect::Sqlite | Dialect::Postgres => format!("ALTER TABLE {} RENAME TO {}", from, to),
        };
        self.statement(&sql)
    }

    pub fn has_table(&mut self, table: &str) -> OrmResult<bool> {
        let sql = match self.dialect() {
            Dialect::Sqlite => "SELECT 1 AS present FROM sqlite_master WHERE type = 'table' AND name = ?",
            Dialect::Postgres => {
                "SELECT 1 AS present FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
            }
            Dialect::Mysql => {
                "SELECT 1 AS present FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
        };
        self.exists(sql, &[Value::from(table)])
    }

    pub fn has_column(&mut self, table: &str, column: &str) -> OrmResult<bool> {
        let sql = match self.dialect() {
            Dialect::Sqlite => "SELECT 1 AS present FROM pragma_table_info(?) WHERE name = ?",
            Dialect::Postgres => {
                "SELECT 1 AS present FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2"
            }
            Dialect::Mysql => {
                "SELECT 1 AS present FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?"
            }
        };
        self.exists(sql, &[Value::from(table), Value::from(column)])
    }

    /// Execute one raw DDL statement.
    pub fn statement(&mut self, sql: &str) -> OrmResult<()> {
        self.conn
            .execute(sql, &[])
            .map_err(|e| OrmError::query_failed(sql, e))?;
        Ok(())
    }

    fn exists(&mut self, sql: &str, bindings: &[Value]) -> OrmResult<bool> {
        let rows = self
            .conn
            .fetch_all(sql, bindings)
            .map_err(|e| OrmError::query_failed(sql, e))?;
        Ok(!rows.is_empty())
    }
}
