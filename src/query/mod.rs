//! Fluent, parameterized queries against one entity table.

pub mod builder;
pub mod clause;

pub use builder::QueryBuilder;
pub use clause::{Direction, Operator, OrderClause, Predicate, TrashedMode};

use crate::engine::{Connection, ExecResult};
use crate::error::{OrmError, OrmResult};
use crate::transpiler::CompiledQuery;
use crate::value::Row;

/// Run a compiled read, classifying driver failures for `entity`.
pub(crate) fn fetch(
    conn: &mut dyn Connection,
    entity: &str,
    query: &CompiledQuery,
) -> OrmResult<Vec<Row>> {
    conn.fetch_all(&query.sql, &query.bindings)
        .map_err(|e| OrmError::execute_failed(entity, &query.sql, e))
}

/// Run a compiled write, classifying driver failures for `entity`.
pub(crate) fn execute(
    conn: &mut dyn Connection,
    entity: &str,
    query: &CompiledQuery,
) -> OrmResult<ExecResult> {
    conn.execute(&query.sql, &query.bindings)
        .map_err(|e| OrmError::execute_failed(entity, &query.sql, e))
}
