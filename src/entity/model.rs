//! Entity instances: attribute storage and persistence life cycle.

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::hooks::ModelEvent;
use super::{Entity, EntityMeta};
use crate::dialect::Dialect;
use crate::engine::Connection;
use crate::error::{OrmError, OrmResult};
use crate::query::QueryBuilder;
use crate::query::clause::{Operator, Predicate};
use crate::relation::{Related, Relation, RelationDef};
use crate::transpiler::{CompiledQuery, compile_delete_where, compile_insert, compile_update_where};
use crate::value::{Row, Value};

/// One row of an entity type.
///
/// A model is either new (never saved), persisted (its primary key is set),
/// or deleted. A deleted model keeps its attributes for inspection but
/// refuses to be saved again.
#[derive(Debug, Clone)]
pub struct Model {
    meta: Arc<EntityMeta>,
    attributes: Row,
    original: Row,
    relations: HashMap<String, Related>,
    exists: bool,
    deleted: bool,
}

impl Model {
    pub fn new(meta: Arc<EntityMeta>) -> Self {
        Self {
            meta,
            attributes: Row::new(),
            original: Row::new(),
            relations: HashMap::new(),
            exists: false,
            deleted: false,
        }
    }

    /// A persisted model built from a fetched row.
    pub(crate) fn hydrate(meta: Arc<EntityMeta>, row: Row) -> Self {
        Self {
            meta,
            original: row.clone(),
            attributes: row,
            relations: HashMap::new(),
            exists: true,
            deleted: false,
        }
    }

    pub fn meta(&self) -> &Arc<EntityMeta> {
        &self.meta
    }

    /// Whether this model's row is known to exist.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Whether `delete()` removed this model's row.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// The primary key, when populated.
    pub fn key(&self) -> Option<&Value> {
        self.attributes
            .get(self.meta.primary_key())
            .filter(|v| !v.is_empty())
    }

    // ========== Attributes ==========

    /// Mass-assign `values`, silently skipping keys that are not fillable.
    pub fn fill<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in values {
            let key = key.as_ref();
            if self.meta.is_fillable(key) {
                self.set(key, value);
            } else {
                debug!(entity = self.meta.name(), field = key, "discarding non-fillable attribute");
            }
        }
        self
    }

    /// Read an attribute. An accessor, when registered, receives the raw
    /// value; otherwise the declared cast is applied. Names that are not
    /// attributes fall back to a loaded relation.
    pub fn get(&self, name: &str) -> Value {
        let raw = self.attributes.get(name);
        if let Some(accessor) = self.meta.accessor_for(name) {
            return accessor(self, raw.cloned().unwrap_or_default());
        }
        match raw {
            Some(raw) => match self.meta.cast_for(name) {
                Some(cast) => cast.apply(raw),
                None => raw.clone(),
            },
            None => self
                .relations
                .get(name)
                .map(|related| Value::Json(related.to_json()))
                .unwrap_or_default(),
        }
    }

    /// The stored value, without accessors or casts.
    pub fn get_raw(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Write one attribute through its mutator, if any. No fillable check.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let value = match self.meta.mutator_for(name) {
            Some(mutator) => mutator(value),
            None => value,
        };
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Write one attribute as-is.
    pub fn set_raw(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// The attributes as of the last hydration or save.
    pub fn original(&self) -> &Row {
        &self.original
    }

    /// Attributes whose value differs from the last hydration or save.
    pub fn dirty(&self) -> Row {
        self.attributes
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty().is_empty()
    }

    // ========== Persistence ==========

    /// Insert when the primary key is empty, update otherwise.
    ///
    /// Event order: `saving`, `creating`/`updating`, the statement,
    /// `created`/`updated`, `saved`. An error from a hook stops the save.
    pub fn save(&mut self, conn: &mut dyn Connection) -> OrmResult<()> {
        if self.deleted {
            return Err(OrmError::InvalidState(format!(
                "cannot save a deleted {}",
                self.meta.name()
            )));
        }

        self.fire(ModelEvent::Saving)?;
        let updating = self.key().is_some();
        if self.meta.uses_timestamps() {
            self.touch(!updating);
        }
        if updating {
            self.perform_update(conn)?;
        } else {
            self.perform_insert(conn)?;
        }
        self.original = self.attributes.clone();
        self.fire(ModelEvent::Saved)
    }

    fn touch(&mut self, creating: bool) {
        let now = Value::now();
        if creating {
            self.attributes.insert("created_at".to_string(), now.clone());
        }
        self.attributes.insert("updated_at".to_string(), now);
    }

    fn perform_insert(&mut self, conn: &mut dyn Connection) -> OrmResult<()> {
        self.fire(ModelEvent::Creating)?;

        let pk = self.meta.primary_key().to_string();
        let mut values = self.attributes.clone();
        if values.get(&pk).is_some_and(Value::is_empty) {
            values.shift_remove(&pk);
        }

        let dialect = conn.dialect();
        let id = if matches!(dialect, Dialect::Postgres | Dialect::Sqlite) {
            let query = compile_insert(dialect, self.meta.table(), &values, Some(&pk));
            let rows = conn
                .fetch_all(&query.sql, &query.bindings)
                .map_err(|e| self.persistence_error(&query, e))?;
            rows.into_iter().next().and_then(|row| row.into_values().next())
        } else {
            let query = compile_insert(dialect, self.meta.table(), &values, None);
            let result = conn
                .execute(&query.sql, &query.bindings)
                .map_err(|e| self.persistence_error(&query, e))?;
            result.last_insert_id.map(Value::Int)
        };

        if let Some(id) = id {
            self.attributes.insert(pk, id);
        }
        self.exists = true;
        debug!(entity = self.meta.name(), key = ?self.key(), "inserted");
        self.fire(ModelEvent::Created)
    }

    /// Rewrites every attribute except the primary key.
    fn perform_update(&mut self, conn: &mut dyn Connection) -> OrmResult<()> {
        self.fire(ModelEvent::Updating)?;

        let pk = self.meta.primary_key();
        let values: Row = self
            .attributes
            .iter()
            .filter(|(name, _)| name.as_str() != pk)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        if !values.is_empty() {
            let query = compile_update_where(
                conn.dialect(),
                self.meta.table(),
                &values,
                &[self.key_predicate()],
            );
            conn.execute(&query.sql, &query.bindings)
                .map_err(|e| self.persistence_error(&query, e))?;
        }

        self.exists = true;
        self.fire(ModelEvent::Updated)
    }

    /// Physically delete the row. Returns `false` without touching the
    /// database when the model has no primary key or was already deleted.
    pub fn delete(&mut self, conn: &mut dyn Connection) -> OrmResult<bool> {
        if self.deleted || self.key().is_none() {
            return Ok(false);
        }

        self.fire(ModelEvent::Deleting)?;
        let query = compile_delete_where(conn.dialect(), self.meta.table(), &[self.key_predicate()]);
        conn.execute(&query.sql, &query.bindings)
            .map_err(|e| self.persistence_error(&query, e))?;

        self.exists = false;
        self.deleted = true;
        debug!(entity = self.meta.name(), key = ?self.key(), "deleted");
        self.fire(ModelEvent::Deleted)?;
        Ok(true)
    }

    /// Stamp `deleted_at` and save. Returns `false` for an unsaved model.
    pub fn soft_delete(&mut self, conn: &mut dyn Connection) -> OrmResult<bool> {
        self.require_soft_deletes("soft-delete")?;
        if self.key().is_none() {
            return Ok(false);
        }

        self.fire(ModelEvent::Deleting)?;
        let column = self.meta.deleted_at_column().to_string();
        self.attributes.insert(column, Value::now());
        self.save(conn)?;
        self.fire(ModelEvent::Deleted)?;
        Ok(true)
    }

    /// Clear `deleted_at` and save.
    pub fn restore(&mut self, conn: &mut dyn Connection) -> OrmResult<()> {
        self.require_soft_deletes("restore")?;

        self.fire(ModelEvent::Restoring)?;
        let column = self.meta.deleted_at_column().to_string();
        self.attributes.insert(column, Value::Null);
        self.save(conn)?;
        self.fire(ModelEvent::Restored)
    }

    /// Whether the model is soft-deleted.
    pub fn trashed(&self) -> bool {
        self.meta.uses_soft_deletes()
            && self
                .attributes
                .get(self.meta.deleted_at_column())
                .is_some_and(|v| !v.is_null())
    }

    /// Reload attributes from the database and drop loaded relations.
    pub fn refresh(&mut self, conn: &mut dyn Connection) -> OrmResult<()> {
        let key = self.key().cloned().ok_or_else(|| {
            OrmError::InvalidState(format!("cannot refresh an unsaved {}", self.meta.name()))
        })?;
        let fresh = QueryBuilder::new(Arc::clone(&self.meta))
            .with_trashed()
            .find_or_fail(conn, key)?;
        self.attributes = fresh.attributes;
        self.original = fresh.original;
        self.relations.clear();
        self.exists = true;
        Ok(())
    }

    fn key_predicate(&self) -> Predicate {
        Predicate::Compare {
            column: self.meta.primary_key().to_string(),
            op: Operator::Eq,
            value: self.key().cloned().unwrap_or_default(),
        }
    }

    fn require_soft_deletes(&self, action: &str) -> OrmResult<()> {
        if self.meta.uses_soft_deletes() {
            Ok(())
        } else {
            Err(OrmError::InvalidState(format!(
                "cannot {} {}: soft deletes are not enabled",
                action,
                self.meta.name()
            )))
        }
    }

    fn persistence_error(&self, query: &CompiledQuery, source: sqlx::Error) -> OrmError {
        OrmError::persistence(self.meta.name(), &query.sql, source)
    }

    fn fire(&mut self, event: ModelEvent) -> OrmResult<()> {
        let meta = Arc::clone(&self.meta);
        for hook in meta.hooks_for(event) {
            hook(self)?;
        }
        Ok(())
    }

    // ========== Validation ==========

    /// Check the current attributes against the declared rules.
    pub fn validate(&self) -> OrmResult<()> {
        self.meta.validate(&self.attributes)
    }

    // ========== Relations ==========

    pub fn has_one<T: Entity>(&self) -> Relation {
        RelationDef::has_one::<T>().bind(self)
    }

    pub fn has_many<T: Entity>(&self) -> Relation {
        RelationDef::has_many::<T>().bind(self)
    }

    pub fn belongs_to<T: Entity>(&self) -> Relation {
        RelationDef::belongs_to::<T>().bind(self)
    }

    pub fn belongs_to_many<T: Entity>(&self) -> Relation {
        RelationDef::belongs_to_many::<T>().bind(self)
    }

    /// A relation declared on this entity's metadata.
    pub fn relation(&self, name: &str) -> OrmResult<Relation> {
        self.meta
            .relation_def(name)
            .map(|def| def.bind(self))
            .ok_or_else(|| {
                OrmError::query(format!("Unknown relation '{}' on {}", name, self.meta.name()))
            })
    }

    /// Resolve a declared relation now and keep the result on this model.
    pub fn load(&mut self, conn: &mut dyn Connection, name: &str) -> OrmResult<&Related> {
        let related = self.relation(name)?.get(conn)?;
        self.relations.insert(name.to_string(), related);
        self.relations
            .get(name)
            .ok_or_else(|| OrmError::InvalidState(format!("relation '{}' was not stored", name)))
    }

    /// A relation previously resolved with [`load`](Self::load).
    pub fn loaded(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    // ========== Serialization ==========

    /// Attributes with accessors and casts applied, hidden fields removed,
    /// and loaded relations nested under their names.
    pub fn to_json(&self) -> serde_json::Value {
        let hidden = self.meta.hidden_fields();
        let mut object = serde_json::Map::new();
        for name in self.attributes.keys() {
            if !hidden.contains(name) {
                object.insert(name.clone(), self.get(name).to_json());
            }
        }
        for (name, related) in &self.relations {
            if !hidden.contains(name) {
                object.insert(name.clone(), related.to_json());
            }
        }
        serde_json::Value::Object(object)
    }

    /// Convert into a typed struct through its JSON form.
    pub fn deserialize<T: DeserializeOwned>(&self) -> OrmResult<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
