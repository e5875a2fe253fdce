//! SQL compiler.
//!
//! Turns query builders and entity writes into parameterized SQL. Every
//! value is emitted as a positional placeholder and carried in
//! [`CompiledQuery::bindings`]; only identifiers from code-declared metadata
//! are written into the SQL text, and those are always quoted.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::query::QueryBuilder;
use crate::query::clause::{Operator, OrderClause, Predicate, TrashedMode};
use crate::value::{Row, Value};

/// A statement ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

/// Accumulates SQL text and bindings, numbering placeholders as it goes.
pub(crate) struct SqlWriter {
    dialect: Dialect,
    sql: String,
    bindings: Vec<Value>,
}

impl SqlWriter {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            bindings: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, s: &str) -> &mut Self {
        self.sql.push_str(s);
        self
    }

    pub(crate) fn ident(&mut self, name: &str) -> &mut Self {
        let quoted = self.dialect.quote_identifier(name);
        self.sql.push_str(&quoted);
        self
    }

    pub(crate) fn bind(&mut self, value: Value) -> &mut Self {
        self.bindings.push(value);
        let placeholder = self.dialect.placeholder(self.bindings.len());
        self.sql.push_str(&placeholder);
        self
    }

    fn idents<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for (i, name) in names.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(name);
        }
        self
    }

    fn bind_list(&mut self, values: &[Value]) -> &mut Self {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.bind(value.clone());
        }
        self
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::Compare { column, op, value } => {
                // `= NULL` never matches; compare nulls the way SQL can.
                if value.is_null() && matches!(op, Operator::Eq | Operator::Ne) {
                    let test = if *op == Operator::Eq { " IS NULL" } else { " IS NOT NULL" };
                    self.ident(column).push(test);
                } else {
                    self.ident(column)
                        .push(" ")
                        .push(op.as_sql())
                        .push(" ")
                        .bind(value.clone());
                }
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    self.push(if *negated { "1 = 1" } else { "0 = 1" });
                } else {
                    self.ident(column)
                        .push(if *negated { " NOT IN (" } else { " IN (" })
                        .bind_list(values)
                        .push(")");
                }
            }
            Predicate::Between { column, low, high } => {
                self.ident(column)
                    .push(" BETWEEN ")
                    .bind(low.clone())
                    .push(" AND ")
                    .bind(high.clone());
            }
            Predicate::Date { column, op, value } => {
                let value = match value {
                    Value::DateTime(dt) => Value::Text(dt.format("%Y-%m-%d").to_string()),
                    other => other.clone(),
                };
                match self.dialect {
                    Dialect::Postgres => {
                        self.push("CAST(")
                            .ident(column)
                            .push(" AS DATE) ")
                            .push(op.as_sql())
                            .push(" CAST(")
                            .bind(value)
                            .push(" AS DATE)");
                    }
                    Dialect::Sqlite | Dialect::Mysql => {
                        self.push("DATE(")
                            .ident(column)
                            .push(") ")
                            .push(op.as_sql())
                            .push(" ")
                            .bind(value);
                    }
                }
            }
            Predicate::Null { column, negated } => {
                self.ident(column)
                    .push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::InSubquery { column, subquery } => {
                self.ident(column)
                    .push(" IN (SELECT ")
                    .ident(&subquery.select)
                    .push(" FROM ")
                    .ident(&subquery.table)
                    .push(" WHERE ")
                    .ident(&subquery.column)
                    .push(" = ")
                    .bind(subquery.value.clone())
                    .push(")");
            }
        }
    }

    /// Write ` WHERE a AND b ...` when there is anything to filter on.
    pub(crate) fn where_clause(&mut self, predicates: &[Predicate]) -> &mut Self {
        for (i, predicate) in predicates.iter().enumerate() {
            self.push(if i == 0 { " WHERE " } else { " AND " });
            self.predicate(predicate);
        }
        self
    }

    fn order_clause(&mut self, orders: &[OrderClause]) -> &mut Self {
        for (i, order) in orders.iter().enumerate() {
            self.push(if i == 0 { " ORDER BY " } else { ", " });
            self.ident(&order.column)
                .push(" ")
                .push(order.direction.as_sql());
        }
        self
    }

    fn paging(&mut self, limit: Option<u64>, offset: Option<u64>) -> OrmResult<&mut Self> {
        match (limit, offset) {
            (Some(limit), _) => {
                self.push(" LIMIT ").bind(Value::Int(paging_bound("limit", limit)?));
            }
            // SQLite and MySQL only accept OFFSET after a LIMIT.
            (None, Some(_)) => match self.dialect {
                Dialect::Sqlite => {
                    self.push(" LIMIT -1");
                }
                Dialect::Mysql => {
                    self.push(" LIMIT 18446744073709551615");
                }
                Dialect::Postgres => {}
            },
            (None, None) => {}
        }
        if let Some(offset) = offset {
            self.push(" OFFSET ").bind(Value::Int(paging_bound("offset", offset)?));
        }
        Ok(self)
    }

    pub(crate) fn finish(self) -> CompiledQuery {
        CompiledQuery {
            sql: self.sql,
            bindings: self.bindings,
        }
    }
}

impl QueryBuilder {
    /// Fail on anything recorded as malformed while the query was built.
    fn check(&self) -> OrmResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(OrmError::query(self.errors.join("; ")))
        }
    }

    /// Accumulated predicates plus the soft-delete visibility clause.
    fn effective_predicates(&self) -> Vec<Predicate> {
        let mut predicates = self.predicates.clone();
        if self.meta.uses_soft_deletes() {
            let column = self.meta.deleted_at_column().to_string();
            match self.trashed {
                TrashedMode::Default => predicates.push(Predicate::Null {
                    column,
                    negated: false,
                }),
                TrashedMode::OnlyTrashed => predicates.push(Predicate::Null {
                    column,
                    negated: true,
                }),
                TrashedMode::WithTrashed => {}
            }
        }
        predicates
    }

    /// Generate `SELECT * ...`.
    pub fn to_select_sql(&self, dialect: Dialect) -> OrmResult<CompiledQuery> {
        self.compile_select(dialect, &[])
    }

    /// Generate SELECT SQL for the given columns (all when empty).
    pub(crate) fn compile_select(&self, dialect: Dialect, columns: &[&str]) -> OrmResult<CompiledQuery> {
        self.check()?;
        let mut w = SqlWriter::new(dialect);
        w.push("SELECT ");
        if columns.is_empty() {
            w.push("*");
        } else {
            w.idents(columns.iter().copied());
        }
        w.push(" FROM ")
            .ident(self.meta.table())
            .where_clause(&self.effective_predicates())
            .order_clause(&self.orders)
            .paging(self.limit, self.offset)?;
        Ok(w.finish())
    }

    /// Generate `SELECT FUNC(column) AS aggregate ...`. Ordering and paging are ignored.
    pub(crate) fn compile_aggregate(
        &self,
        dialect: Dialect,
        function: &str,
        column: Option<&str>,
    ) -> OrmResult<CompiledQuery> {
        self.check()?;
        let mut w = SqlWriter::new(dialect);
        w.push("SELECT ").push(function).push("(");
        match column {
            Some(column) => w.ident(column),
            None => w.push("*"),
        };
        w.push(") AS ")
            .ident("aggregate")
            .push(" FROM ")
            .ident(self.meta.table())
            .where_clause(&self.effective_predicates());
        Ok(w.finish())
    }

    /// Generate a bulk UPDATE over the accumulated predicates.
    pub fn to_update_sql(&self, dialect: Dialect, values: &Row) -> OrmResult<CompiledQuery> {
        self.check()?;
        if values.is_empty() {
            return Err(OrmError::query("bulk update requires at least one column"));
        }
        Ok(compile_update_where(
            dialect,
            self.meta.table(),
            values,
            &self.effective_predicates(),
        ))
    }

    /// Generate a bulk DELETE over the accumulated predicates.
    pub fn to_delete_sql(&self, dialect: Dialect) -> OrmResult<CompiledQuery> {
        self.check()?;
        Ok(compile_delete_where(
            dialect,
            self.meta.table(),
            &self.effective_predicates(),
        ))
    }
}

/// Generate INSERT SQL, optionally returning one column.
fn paging_bound(clause: &str, n: u64) -> OrmResult<i64> {
    i64::try_from(n).map_err(|_| OrmError::query(format!("{} {} is out of range", clause, n)))
}

pub(crate) fn compile_insert(
    dialect: Dialect,
    table: &str,
    values: &Row,
    returning: Option<&str>,
) -> CompiledQuery {
    let mut w = SqlWriter::new(dialect);
    w.push("INSERT INTO ").ident(table);

    if values.is_empty() {
        match dialect {
            Dialect::Mysql => w.push(" () VALUES ()"),
            Dialect::Sqlite | Dialect::Postgres => w.push(" DEFAULT VALUES"),
        };
    } else {
        w.push(" (")
            .idents(values.keys().map(String::as_str))
            .push(") VALUES (");
        for (i, value) in values.values().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.bind(value.clone());
        }
        w.push(")");
    }

    if let Some(column) = returning {
        w.push(" RETURNING ").ident(column);
    }
    w.finish()
}

/// Generate `UPDATE table SET ... WHERE ...`.
pub(crate) fn compile_update_where(
    dialect: Dialect,
    table: &str,
    values: &Row,
    predicates: &[Predicate],
) -> CompiledQuery {
    let mut w = SqlWriter::new(dialect);
    w.push("UPDATE ").ident(table).push(" SET ");
    for (i, (column, value)) in values.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.ident(column).push(" = ").bind(value.clone());
    }
    w.where_clause(predicates);
    w.finish()
}

/// Generate `DELETE FROM table WHERE ...`.
pub(crate) fn compile_delete_where(
    dialect: Dialect,
    table: &str,
    predicates: &[Predicate],
) -> CompiledQuery {
    let mut w = SqlWriter::new(dialect);
    w.push("DELETE FROM ").ident(table).where_clause(predicates);
    w.finish()
}

/// Generate a plain SELECT over a table that has no entity metadata.
pub(crate) fn compile_select_where(
    dialect: Dialect,
    table: &str,
    columns: &[&str],
    predicates: &[Predicate],
    orders: &[OrderClause],
) -> CompiledQuery {
    let mut w = SqlWriter::new(dialect);
    w.push("SELECT ")
        .idents(columns.iter().copied())
        .push(" FROM ")
        .ident(table)
        .where_clause(predicates)
        .order_clause(orders);
    w.finish()
}
