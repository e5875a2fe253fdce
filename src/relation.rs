//! Relation resolvers.
//!
//! A [`RelationDef`] is declared on an entity's metadata; binding it to an
//! owning [`Model`] gives a [`Relation`], which resolves the related rows
//! through a scoped [`QueryBuilder`]. Resolution is lazy and never cached:
//! every `get` is a new round-trip. [`Model::load`] is the explicit way to
//! keep a result around.

use serde_json::Value as Json;
use std::sync::Arc;

use crate::engine::Connection;
use crate::entity::{Entity, EntityMeta, Model};
use crate::error::{OrmError, OrmResult};
use crate::naming;
use crate::query::clause::{Operator, Predicate, Subquery};
use crate::query::{QueryBuilder, execute};
use crate::transpiler::{compile_delete_where, compile_insert};
use crate::value::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
    BelongsToMany,
}

/// A declared relationship; key names left unset follow the naming conventions.
#[derive(Debug, Clone)]
pub struct RelationDef {
    kind: RelationKind,
    related: fn() -> Arc<EntityMeta>,
    foreign_key: Option<String>,
    local_key: Option<String>,
    pivot_table: Option<String>,
    related_pivot_key: Option<String>,
}

impl RelationDef {
    fn new<T: Entity>(kind: RelationKind) -> Self {
        Self {
            kind,
            related: T::meta,
            foreign_key: None,
            local_key: None,
            pivot_table: None,
            related_pivot_key: None,
        }
    }

    /// The related table holds `<owner>_id` pointing at the owner's key.
    pub fn has_one<T: Entity>() -> Self {
        Self::new::<T>(RelationKind::HasOne)
    }

    pub fn has_many<T: Entity>() -> Self {
        Self::new::<T>(RelationKind::HasMany)
    }

    /// The owner holds `<related>_id` pointing at the related key.
    pub fn belongs_to<T: Entity>() -> Self {
        Self::new::<T>(RelationKind::BelongsTo)
    }

    /// Linked through a pivot table holding both foreign keys.
    pub fn belongs_to_many<T: Entity>() -> Self {
        Self::new::<T>(RelationKind::BelongsToMany)
    }

    /// The foreign key column. For `belongs_to_many` this is the pivot
    /// column pointing at the owner.
    pub fn foreign_key(mut self, column: &str) -> Self {
        self.foreign_key = Some(column.to_string());
        self
    }

    /// The key the foreign key refers to: the owner's for `has_*` and
    /// `belongs_to_many`, the related entity's for `belongs_to`.
    pub fn local_key(mut self, column: &str) -> Self {
        self.local_key = Some(column.to_string());
        self
    }

    pub fn pivot_table(mut self, table: &str) -> Self {
        self.pivot_table = Some(table.to_string());
        self
    }

    /// The pivot column pointing at the related entity.
    pub fn related_pivot_key(mut self, column: &str) -> Self {
        self.related_pivot_key = Some(column.to_string());
        self
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Resolve key names against `owner` and capture the owner's key value.
    pub fn bind(&self, owner: &Model) -> Relation {
        let related = (self.related)();
        let owner_meta = owner.meta();

        let (foreign_key, local_key) = match self.kind {
            RelationKind::HasOne | RelationKind::HasMany | RelationKind::BelongsToMany => (
                self.foreign_key
                    .clone()
                    .unwrap_or_else(|| naming::foreign_key(owner_meta.name())),
                self.local_key
                    .clone()
                    .unwrap_or_else(|| owner_meta.primary_key().to_string()),
            ),
            RelationKind::BelongsTo => (
                self.foreign_key
                    .clone()
                    .unwrap_or_else(|| naming::foreign_key(related.name())),
                self.local_key
                    .clone()
                    .unwrap_or_else(|| related.primary_key().to_string()),
            ),
        };

        let key = match self.kind {
            RelationKind::BelongsTo => owner.get_raw(&foreign_key),
            _ => owner.get_raw(&local_key),
        }
        .cloned()
        .unwrap_or_default();

        let pivot = (self.kind == RelationKind::BelongsToMany).then(|| Pivot {
            table: self
                .pivot_table
                .clone()
                .unwrap_or_else(|| naming::pivot_table(owner_meta.name(), related.name())),
            related_key: self
                .related_pivot_key
                .clone()
                .unwrap_or_else(|| naming::foreign_key(related.name())),
        });

        Relation {
            kind: self.kind,
            related,
            foreign_key,
            local_key,
            key,
            pivot,
        }
    }
}

#[derive(Debug, Clone)]
struct Pivot {
    table: String,
    related_key: String,
}

/// A relationship bound to one owning row.
#[derive(Debug, Clone)]
pub struct Relation {
    kind: RelationKind,
    related: Arc<EntityMeta>,
    foreign_key: String,
    local_key: String,
    key: Value,
    pivot: Option<Pivot>,
}

impl Relation {
    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn pivot_table(&self) -> Option<&str> {
        self.pivot.as_ref().map(|p| p.table.as_str())
    }

    /// A builder over the related table, constrained to this owner.
    /// Further predicates, ordering and paging can be chained on it.
    pub fn query(&self) -> QueryBuilder {
        let query = QueryBuilder::new(Arc::clone(&self.related));
        match (&self.kind, &self.pivot) {
            (RelationKind::BelongsToMany, Some(pivot)) => query.where_in_subquery(
                self.related.primary_key(),
                Subquery {
                    table: pivot.table.clone(),
                    select: pivot.related_key.clone(),
                    column: self.foreign_key.clone(),
                    value: self.key.clone(),
                },
            ),
            (RelationKind::BelongsTo, _) => query.where_eq(&self.local_key, self.key.clone()),
            _ => query.where_eq(&self.foreign_key, self.key.clone()),
        }
    }

    /// Resolve the relation: one row (or none) for `has_one`/`belongs_to`,
    /// every row otherwise.
    pub fn get(&self, conn: &mut dyn Connection) -> OrmResult<Related> {
        match self.kind {
            RelationKind::HasOne | RelationKind::BelongsTo => self.first(conn).map(Related::One),
            RelationKind::HasMany | RelationKind::BelongsToMany => self.all(conn).map(Related::Many),
        }
    }

    pub fn first(&self, conn: &mut dyn Connection) -> OrmResult<Option<Model>> {
        if self.key.is_empty() {
            return Ok(None);
        }
        self.query().first(conn)
    }

    pub fn all(&self, conn: &mut dyn Connection) -> OrmResult<Vec<Model>> {
        if self.key.is_empty() {
            return Ok(Vec::new());
        }
        self.query().get(conn)
    }

    pub fn count(&self, conn: &mut dyn Connection) -> OrmResult<i64> {
        if self.key.is_empty() {
            return Ok(0);
        }
        self.query().count(conn)
    }

    // ========== Pivot maintenance ==========

    /// Insert one pivot row per related id.
    pub fn attach<V: Into<Value>>(
        &self,
        conn: &mut dyn Connection,
        ids: impl IntoIterator<Item = V>,
    ) -> OrmResult<u64> {
        let pivot = self.pivot_for("attach")?;
        let mut attached = 0;
        for id in ids {
            let mut row = Row::new();
            row.insert(self.foreign_key.clone(), self.key.clone());
            row.insert(pivot.related_key.clone(), id.into());
            let query = compile_insert(conn.dialect(), &pivot.table, &row, None);
            attached += execute(conn, &pivot.table, &query)?.rows_affected;
        }
        Ok(attached)
    }

    /// Remove the pivot rows linking this owner to the given ids.
    pub fn detach<V: Into<Value>>(
        &self,
        conn: &mut dyn Connection,
        ids: impl IntoIterator<Item = V>,
    ) -> OrmResult<u64> {
        let pivot = self.pivot_for("detach")?;
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let predicates = [
            self.owner_predicate(),
            Predicate::In {
                column: pivot.related_key.clone(),
                values: ids,
                negated: false,
            },
        ];
        let query = compile_delete_where(conn.dialect(), &pivot.table, &predicates);
        Ok(execute(conn, &pivot.table, &query)?.rows_affected)
    }

    /// Remove every pivot row for this owner.
    pub fn detach_all(&self, conn: &mut dyn Connection) -> OrmResult<u64> {
        let pivot = self.pivot_for("detach")?;
        let query = compile_delete_where(conn.dialect(), &pivot.table, &[self.owner_predicate()]);
        Ok(execute(conn, &pivot.table, &query)?.rows_affected)
    }

    fn owner_predicate(&self) -> Predicate {
        Predicate::Compare {
            column: self.foreign_key.clone(),
            op: Operator::Eq,
            value: self.key.clone(),
        }
    }

    fn pivot_for(&self, action: &str) -> OrmResult<&Pivot> {
        if self.key.is_empty() {
            return Err(OrmError::InvalidState(format!(
                "cannot {} {} before the owner is saved",
                action,
                self.related.name()
            )));
        }
        self.pivot.as_ref().ok_or_else(|| {
            OrmError::InvalidState(format!(
                "cannot {} on a {:?} relation; only many-to-many relations have a pivot",
                action, self.kind
            ))
        })
    }
}

/// A resolved relation.
#[derive(Debug, Clone)]
pub enum Related {
    One(Option<Model>),
    Many(Vec<Model>),
}

impl Related {
    pub fn one(&self) -> Option<&Model> {
        match self {
            Related::One(model) => model.as_ref(),
            Related::Many(models) => models.first(),
        }
    }

    pub fn many(&self) -> &[Model] {
        match self {
            Related::One(model) => model.as_slice(),
            Related::Many(models) => models,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Related::One(Some(model)) => model.to_json(),
            Related::One(None) => Json::Null,
            Related::Many(models) => Json::Array(models.iter().map(Model::to_json).collect()),
        }
    }
}
