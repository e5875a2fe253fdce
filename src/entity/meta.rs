//! Per-type entity metadata.
//!
//! Everything the engine knows about an entity type lives in one
//! [`EntityMeta`]: table and key names, mass-assignment rules, casts,
//! validation rules, and the explicit tables of accessors, mutators, scopes,
//! hooks and relations.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

use super::cast::Cast;
use super::hooks::{Hook, ModelEvent};
use super::validation::Rule;
use super::Model;
use crate::error::{OrmError, OrmResult};
use crate::naming;
use crate::parser::parse_rules;
use crate::query::QueryBuilder;
use crate::relation::RelationDef;
use crate::value::Value;

/// Computes an attribute's value on read from the raw stored value.
pub type Accessor = fn(&Model, Value) -> Value;
/// Transforms a value on its way into the attribute store.
pub type Mutator = fn(Value) -> Value;
/// A named, reusable set of constraints.
pub type Scope = fn(QueryBuilder) -> QueryBuilder;

const DELETED_AT: &str = "deleted_at";

#[derive(Clone)]
pub struct EntityMeta {
    name: String,
    table: String,
    primary_key: String,
    fillable: Vec<String>,
    guarded: Vec<String>,
    hidden: Vec<String>,
    casts: IndexMap<String, Cast>,
    timestamps: bool,
    soft_deletes: bool,
    rules: IndexMap<String, Vec<Rule>>,
    rule_errors: Vec<String>,
    accessors: HashMap<String, Accessor>,
    mutators: HashMap<String, Mutator>,
    scopes: HashMap<String, Scope>,
    hooks: HashMap<ModelEvent, Vec<Hook>>,
    relations: IndexMap<String, RelationDef>,
}

impl fmt::Debug for EntityMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMeta")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("fillable", &self.fillable)
            .field("guarded", &self.guarded)
            .field("timestamps", &self.timestamps)
            .field("soft_deletes", &self.soft_deletes)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl EntityMeta {
    /// Metadata for the type `name`, with every setting at its default.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: naming::table_name(name),
            primary_key: "id".to_string(),
            fillable: Vec::new(),
            guarded: Vec::new(),
            hidden: Vec::new(),
            casts: IndexMap::new(),
            timestamps: false,
            soft_deletes: false,
            rules: IndexMap::new(),
            rule_errors: Vec::new(),
            accessors: HashMap::new(),
            mutators: HashMap::new(),
            scopes: HashMap::new(),
            hooks: HashMap::new(),
            relations: IndexMap::new(),
        }
    }

    // ========== Builder ==========

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn with_primary_key(mut self, key: &str) -> Self {
        self.primary_key = key.to_string();
        self
    }

    /// Allow-list for mass assignment. Wins over `guarded` when non-empty.
    pub fn fillable(mut self, fields: &[&str]) -> Self {
        self.fillable = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Deny-list for mass assignment; `*` guards everything.
    pub fn guarded(mut self, fields: &[&str]) -> Self {
        self.guarded = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Fields left out of serialization.
    pub fn hidden(mut self, fields: &[&str]) -> Self {
        self.hidden = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn cast(mut self, field: &str, cast: Cast) -> Self {
        self.casts.insert(field.to_string(), cast);
        self
    }

    /// Maintain `created_at` / `updated_at`.
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Delete by stamping `deleted_at` and hide stamped rows from queries.
    pub fn soft_deletes(mut self, enabled: bool) -> Self {
        self.soft_deletes = enabled;
        self
    }

    /// Declare validation rules for a field, e.g. `required|email|max:255`.
    ///
    /// A malformed rule string is reported by [`validate`](Self::validate).
    pub fn rules(mut self, field: &str, rules: &str) -> Self {
        match parse_rules(rules) {
            Ok(parsed) => {
                self.rules.insert(field.to_string(), parsed);
            }
            Err(e) => self.rule_errors.push(format!("{}: {}", field, e)),
        }
        self
    }

    pub fn accessor(mut self, field: &str, accessor: Accessor) -> Self {
        self.accessors.insert(field.to_string(), accessor);
        self
    }

    pub fn mutator(mut self, field: &str, mutator: Mutator) -> Self {
        self.mutators.insert(field.to_string(), mutator);
        self
    }

    pub fn scope(mut self, name: &str, scope: Scope) -> Self {
        self.scopes.insert(name.to_string(), scope);
        self
    }

    /// Register a hook; hooks for one event run in registration order.
    pub fn on(mut self, event: ModelEvent, hook: Hook) -> Self {
        self.hooks.entry(event).or_default().push(hook);
        self
    }

    pub fn relation(mut self, name: &str, relation: RelationDef) -> Self {
        self.relations.insert(name.to_string(), relation);
        self
    }

    // ========== Accessors ==========

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn uses_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn uses_soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    pub fn deleted_at_column(&self) -> &str {
        DELETED_AT
    }

    pub fn hidden_fields(&self) -> &[String] {
        &self.hidden
    }

    pub fn cast_for(&self, field: &str) -> Option<Cast> {
        self.casts.get(field).copied()
    }

    /// Whether `field` may be mass-assigned. The primary key never is.
    pub fn is_fillable(&self, field: &str) -> bool {
        if field == self.primary_key {
            return false;
        }
        if !self.fillable.is_empty() {
            return self.fillable.iter().any(|f| f == field);
        }
        !self.guarded.iter().any(|g| g == "*" || g == field)
    }

    pub(crate) fn accessor_for(&self, field: &str) -> Option<Accessor> {
        self.accessors.get(field).copied()
    }

    pub(crate) fn mutator_for(&self, field: &str) -> Option<Mutator> {
        self.mutators.get(field).copied()
    }

    pub(crate) fn scope_named(&self, name: &str) -> Option<Scope> {
        self.scopes.get(name).copied()
    }

    pub(crate) fn hooks_for(&self, event: ModelEvent) -> &[Hook] {
        self.hooks.get(&event).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn relation_def(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Check `data` against the declared rules.
    pub fn validate(&self, data: &crate::value::Row) -> OrmResult<()> {
        if !self.rule_errors.is_empty() {
            return Err(OrmError::Config(self.rule_errors.join("; ")));
        }
        super::validation::validate(data, &self.rules).map_err(OrmError::Validation)
    }
}
