//! The query builder.
//!
//! A [`QueryBuilder`] accumulates predicates, ordering and paging for one
//! entity table. Builder methods never fail: a malformed operator, direction
//! or scope is recorded and reported as [`OrmError::Query`] by the terminal
//! call. Terminal calls consume the builder and issue exactly one statement.
//!
//! ```rust,ignore
//! let adults = Account::query()
//!     .where_op("age", ">=", 18)
//!     .where_in("role", ["admin", "editor"])
//!     .order_by("name", "asc")
//!     .limit(20)
//!     .get(&mut conn)?;
//! ```

use std::sync::Arc;

use crate::engine::Connection;
use crate::entity::{EntityMeta, Model};
use crate::error::{OrmError, OrmResult};
use crate::query::clause::{Direction, Operator, OrderClause, Predicate, Subquery, TrashedMode};
use crate::query::{execute, fetch};
use crate::value::{Row, Value};

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) meta: Arc<EntityMeta>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) orders: Vec<OrderClause>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) trashed: TrashedMode,
    pub(crate) errors: Vec<String>,
}

impl QueryBuilder {
    pub fn new(meta: Arc<EntityMeta>) -> Self {
        Self {
            meta,
            predicates: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            trashed: TrashedMode::Default,
            errors: Vec::new(),
        }
    }

    /// Metadata of the entity this builder targets.
    pub fn meta(&self) -> &Arc<EntityMeta> {
        &self.meta
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    // ========== Predicates ==========

    /// `column = value`.
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(Predicate::Compare {
            column: column.to_string(),
            op: Operator::Eq,
            value: value.into(),
        })
    }

    /// `column <op> value` where `op` is one of `= != <> < <= > >= like`, `not like`.
    pub fn where_op(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        match op.parse::<Operator>() {
            Ok(op) => self.push(Predicate::Compare {
                column: column.to_string(),
                op,
                value: value.into(),
            }),
            Err(e) => {
                self.errors.push(e);
                self
            }
        }
    }

    /// One equality predicate per pair, ANDed together.
    pub fn where_map<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .fold(self, |builder, (column, value)| builder.where_eq(column.as_ref(), value))
    }

    pub fn where_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    pub fn where_not_in<V: Into<Value>>(
        self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }

    /// `column BETWEEN low AND high`, inclusive.
    pub fn where_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.push(Predicate::Between {
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
        })
    }

    pub fn where_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.push(Predicate::Compare {
            column: column.to_string(),
            op: Operator::Like,
            value: pattern.into(),
        })
    }

    /// Compare only the date part of `column` against `value` (`YYYY-MM-DD`).
    pub fn where_date(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        match op.parse::<Operator>() {
            Ok(op) => self.push(Predicate::Date {
                column: column.to_string(),
                op,
                value: value.into(),
            }),
            Err(e) => {
                self.errors.push(e);
                self
            }
        }
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push(Predicate::Null {
            column: column.to_string(),
            negated: false,
        })
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push(Predicate::Null {
            column: column.to_string(),
            negated: true,
        })
    }

    pub(crate) fn where_in_subquery(self, column: &str, subquery: Subquery) -> Self {
        self.push(Predicate::InSubquery {
            column: column.to_string(),
            subquery,
        })
    }

    fn push(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    // ========== Ordering & paging ==========

    /// Append an ORDER BY term. `direction` is `asc` or `desc`, any case.
    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        match direction.parse::<Direction>() {
            Ok(direction) => self.orders.push(OrderClause {
                column: column.to_string(),
                direction,
            }),
            Err(e) => self.errors.push(e),
        }
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    // ========== Visibility & scopes ==========

    /// Include soft-deleted rows.
    pub fn with_trashed(mut self) -> Self {
        self.trashed = TrashedMode::WithTrashed;
        self
    }

    /// Return soft-deleted rows only.
    pub fn only_trashed(mut self) -> Self {
        self.trashed = TrashedMode::OnlyTrashed;
        self
    }

    /// Apply a scope registered on the entity's metadata.
    pub fn scope(mut self, name: &str) -> Self {
        match self.meta.scope_named(name) {
            Some(apply) => apply(self),
            None => {
                self.errors
                    .push(format!("Unknown scope '{}' on {}", name, self.meta.name()));
                self
            }
        }
    }

    // ========== Terminals ==========

    /// Every matching row, hydrated as persisted entities.
    pub fn get(self, conn: &mut dyn Connection) -> OrmResult<Vec<Model>> {
        let query = self.to_select_sql(conn.dialect())?;
        let rows = fetch(conn, self.meta.name(), &query)?;
        Ok(rows
            .into_iter()
            .map(|row| Model::hydrate(self.meta.clone(), row))
            .collect())
    }

    /// The first matching row, if any.
    pub fn first(self, conn: &mut dyn Connection) -> OrmResult<Option<Model>> {
        Ok(self.limit(1).get(conn)?.into_iter().next())
    }

    pub fn first_or_fail(self, conn: &mut dyn Connection) -> OrmResult<Model> {
        let entity = self.meta.name().to_string();
        let key = self.describe();
        self.first(conn)?
            .ok_or_else(|| OrmError::not_found(entity, key))
    }

    /// Look a row up by primary key within the current constraints.
    pub fn find(self, conn: &mut dyn Connection, id: impl Into<Value>) -> OrmResult<Option<Model>> {
        let pk = self.meta.primary_key().to_string();
        self.where_eq(&pk, id).first(conn)
    }

    pub fn find_or_fail(self, conn: &mut dyn Connection, id: impl Into<Value>) -> OrmResult<Model> {
        let id = id.into();
        let entity = self.meta.name().to_string();
        let key = format!("{} = {}", self.meta.primary_key(), id);
        self.find(conn, id)?
            .ok_or_else(|| OrmError::not_found(entity, key))
    }

    pub fn count(self, conn: &mut dyn Connection) -> OrmResult<i64> {
        Ok(self.aggregate(conn, "COUNT", None)?.as_i64().unwrap_or(0))
    }

    /// Largest value of `column`, `Null` when nothing matches.
    pub fn max(self, conn: &mut dyn Connection, column: &str) -> OrmResult<Value> {
        self.aggregate(conn, "MAX", Some(column))
    }

    pub fn min(self, conn: &mut dyn Connection, column: &str) -> OrmResult<Value> {
        self.aggregate(conn, "MIN", Some(column))
    }

    /// Sum of `column`; zero when nothing matches.
    pub fn sum(self, conn: &mut dyn Connection, column: &str) -> OrmResult<Value> {
        let total = self.aggregate(conn, "SUM", Some(column))?;
        Ok(if total.is_null() { Value::Int(0) } else { total })
    }

    pub fn exists(self, conn: &mut dyn Connection) -> OrmResult<bool> {
        let pk = self.meta.primary_key().to_string();
        let query = self.limit(1);
        let compiled = query.compile_select(conn.dialect(), &[pk.as_str()])?;
        Ok(!fetch(conn, query.meta.name(), &compiled)?.is_empty())
    }

    /// The values of a single column, in row order.
    pub fn pluck(self, conn: &mut dyn Connection, column: &str) -> OrmResult<Vec<Value>> {
        let query = self.compile_select(conn.dialect(), &[column])?;
        let rows = fetch(conn, self.meta.name(), &query)?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_values().next().unwrap_or_default())
            .collect())
    }

    fn aggregate(
        &self,
        conn: &mut dyn Connection,
        function: &str,
        column: Option<&str>,
    ) -> OrmResult<Value> {
        let query = self.compile_aggregate(conn.dialect(), function, column)?;
        let rows = fetch(conn, self.meta.name(), &query)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_values().next())
            .unwrap_or_default())
    }

    /// Bulk UPDATE of every matching row. Returns the number of rows affected.
    ///
    /// Life-cycle hooks do not fire. `updated_at` is stamped when the entity
    /// tracks timestamps and the caller did not set it.
    pub fn update<K, V>(
        self,
        conn: &mut dyn Connection,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> OrmResult<u64>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut row: Row = values
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        if self.meta.uses_timestamps() && !row.contains_key("updated_at") {
            row.insert("updated_at".to_string(), Value::now());
        }
        let query = self.to_update_sql(conn.dialect(), &row)?;
        Ok(execute(conn, self.meta.name(), &query)?.rows_affected)
    }

    /// Bulk delete of every matching row.
    ///
    /// Soft-deleting entities get `deleted_at` stamped instead; use
    /// [`force_delete`](Self::force_delete) to remove the rows.
    pub fn delete(self, conn: &mut dyn Connection) -> OrmResult<u64> {
        if self.meta.uses_soft_deletes() {
            let column = self.meta.deleted_at_column().to_string();
            return self.update(conn, [(column, Value::now())]);
        }
        self.force_delete(conn)
    }

    /// Physically DELETE every matching row.
    pub fn force_delete(self, conn: &mut dyn Connection) -> OrmResult<u64> {
        let query = self.to_delete_sql(conn.dialect())?;
        Ok(execute(conn, self.meta.name(), &query)?.rows_affected)
    }

    fn describe(&self) -> String {
        if self.predicates.is_empty() {
            return "query".to_string();
        }
        self.predicates
            .iter()
            .map(|p| match p {
                Predicate::Compare { column, op, value } | Predicate::Date { column, op, value } => {
                    format!("{} {} {}", column, op, value)
                }
                Predicate::In { column, .. } => format!("{} in [..]", column),
                Predicate::Between { column, low, high } => {
                    format!("{} between {} and {}", column, low, high)
                }
                Predicate::Null { column, negated } => {
                    format!("{} is {}null", column, if *negated { "not " } else { "" })
                }
                Predicate::InSubquery { column, subquery } => {
                    format!("{} via {}", column, subquery.table)
                }
            })
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    fn active(query: QueryBuilder) -> QueryBuilder {
        query.where_eq("active", true)
    }

    fn meta() -> Arc<EntityMeta> {
        Arc::new(EntityMeta::new("Account").scope("active", active))
    }

    #[test]
    fn test_where_map_ands_equalities() {
        let query = QueryBuilder::new(meta()).where_map([("name", "Ana"), ("email", "a@x.com")]);
        assert_eq!(query.predicates().len(), 2);
        let sql = query.to_select_sql(Dialect::Sqlite).unwrap().sql;
        assert_eq!(sql, "SELECT * FROM `accounts` WHERE `name` = ? AND `email` = ?");
    }

    #[test]
    fn test_scope_applies_registered_predicates() {
        let query = QueryBuilder::new(meta()).scope("active");
        assert_eq!(
            query.predicates(),
            &[Predicate::Compare {
                column: "active".into(),
                op: Operator::Eq,
                value: Value::Bool(true),
            }]
        );
    }

    #[test]
    fn test_unknown_scope_is_deferred() {
        let query = QueryBuilder::new(meta()).scope("popular");
        let err = query.to_select_sql(Dialect::Sqlite).unwrap_err();
        assert!(err.to_string().contains("Unknown scope 'popular'"));
    }

    #[test]
    fn test_builders_are_independent_values() {
        let base = QueryBuilder::new(meta()).where_eq("active", true);
        let limited = base.clone().limit(5);
        assert_eq!(base.limit, None);
        assert_eq!(limited.limit, Some(5));
    }

    #[test]
    fn test_describe() {
        let query = QueryBuilder::new(meta()).where_eq("email", "a@x.com").where_null("deleted_at");
        assert_eq!(query.describe(), "email = a@x.com and deleted_at is null");
    }
}
