//! Entities: typed record definitions over dynamic attribute storage.
//!
//! An entity type is a marker implementing [`Entity`]; its rows are
//! [`Model`] values carrying that type's [`EntityMeta`].
//!
//! ```rust,ignore
//! struct Account;
//!
//! impl Entity for Account {
//!     const NAME: &'static str = "Account";
//!
//!     fn configure(meta: EntityMeta) -> EntityMeta {
//!         meta.fillable(&["name", "email"])
//!             .timestamps(true)
//!             .rules("email", "required|email")
//!             .relation("posts", RelationDef::has_many::<Post>())
//!     }
//! }
//!
//! let ana = Account::create(&mut conn, [("name", "Ana"), ("email", "a@x.com")])?;
//! let found = Account::where_in("email", ["a@x.com"]).get(&mut conn)?;
//! ```

pub mod cast;
pub mod hooks;
pub mod meta;
pub mod model;
mod registry;
pub mod validation;

pub use cast::Cast;
pub use hooks::{Hook, ModelEvent};
pub use meta::EntityMeta;
pub use model::Model;
pub use validation::{Rule, ValidationErrors};

use std::sync::Arc;

use crate::engine::Connection;
use crate::error::OrmResult;
use crate::query::QueryBuilder;
use crate::value::{Row, Value};

/// An entity type and its fixed set of type-level entry points.
pub trait Entity: Sized + 'static {
    /// Type name; the default table, foreign key and pivot names derive from it.
    const NAME: &'static str;

    /// Customize the default metadata.
    fn configure(meta: EntityMeta) -> EntityMeta {
        meta
    }

    fn meta() -> Arc<EntityMeta> {
        registry::meta_for::<Self>()
    }

    /// An empty, unsaved instance.
    fn new_model() -> Model {
        Model::new(Self::meta())
    }

    /// An unsaved instance filled with the fillable subset of `values`.
    fn make<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Model
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut model = Self::new_model();
        model.fill(values);
        model
    }

    // ========== Query entry points ==========

    fn query() -> QueryBuilder {
        QueryBuilder::new(Self::meta())
    }

    fn where_eq(column: &str, value: impl Into<Value>) -> QueryBuilder {
        Self::query().where_eq(column, value)
    }

    fn where_op(column: &str, op: &str, value: impl Into<Value>) -> QueryBuilder {
        Self::query().where_op(column, op, value)
    }

    fn where_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> QueryBuilder {
        Self::query().where_in(column, values)
    }

    fn order_by(column: &str, direction: &str) -> QueryBuilder {
        Self::query().order_by(column, direction)
    }

    fn limit(n: u64) -> QueryBuilder {
        Self::query().limit(n)
    }

    fn with_trashed() -> QueryBuilder {
        Self::query().with_trashed()
    }

    fn only_trashed() -> QueryBuilder {
        Self::query().only_trashed()
    }

    /// Start a query from a registered scope.
    fn scoped(name: &str) -> QueryBuilder {
        Self::query().scope(name)
    }

    // ========== Persistence helpers ==========

    fn all(conn: &mut dyn Connection) -> OrmResult<Vec<Model>> {
        Self::query().get(conn)
    }

    fn find(conn: &mut dyn Connection, id: impl Into<Value>) -> OrmResult<Option<Model>> {
        Self::query().find(conn, id)
    }

    fn find_or_fail(conn: &mut dyn Connection, id: impl Into<Value>) -> OrmResult<Model> {
        Self::query().find_or_fail(conn, id)
    }

    /// Fill a new instance and save it.
    fn create<K, V>(conn: &mut dyn Connection, values: impl IntoIterator<Item = (K, V)>) -> OrmResult<Model>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut model = Self::make(values);
        model.save(conn)?;
        Ok(model)
    }

    /// The first row matching `attributes`, or a new saved one built from
    /// `attributes` and `values`.
    fn first_or_create<K, V, K2, V2>(
        conn: &mut dyn Connection,
        attributes: impl IntoIterator<Item = (K, V)>,
        values: impl IntoIterator<Item = (K2, V2)>,
    ) -> OrmResult<Model>
    where
        K: AsRef<str>,
        V: Into<Value>,
        K2: AsRef<str>,
        V2: Into<Value>,
    {
        let attributes = to_row(attributes);
        if let Some(found) = Self::query().where_map(attributes.clone()).first(conn)? {
            return Ok(found);
        }
        let mut model = Self::make(attributes);
        model.fill(values);
        model.save(conn)?;
        Ok(model)
    }

    /// Find the row matching `attributes` (or start a new one), fill `values`, and save.
    fn update_or_create<K, V, K2, V2>(
        conn: &mut dyn Connection,
        attributes: impl IntoIterator<Item = (K, V)>,
        values: impl IntoIterator<Item = (K2, V2)>,
    ) -> OrmResult<Model>
    where
        K: AsRef<str>,
        V: Into<Value>,
        K2: AsRef<str>,
        V2: Into<Value>,
    {
        let attributes = to_row(attributes);
        let mut model = match Self::query().where_map(attributes.clone()).first(conn)? {
            Some(found) => found,
            None => Self::make(attributes),
        };
        model.fill(values);
        model.save(conn)?;
        Ok(model)
    }

    /// Delete the rows with the given primary keys, firing each row's delete
    /// hooks. Returns how many were deleted.
    fn destroy<V: Into<Value>>(
        conn: &mut dyn Connection,
        ids: impl IntoIterator<Item = V>,
    ) -> OrmResult<u64> {
        let meta = Self::meta();
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let mut deleted = 0;
        for mut model in Self::with_trashed().where_in(meta.primary_key(), ids).get(conn)? {
            if model.delete(conn)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Check arbitrary data against this type's rules.
    fn validate_data(data: &Row) -> OrmResult<()> {
        Self::meta().validate(data)
    }
}

fn to_row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: AsRef<str>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.into()))
        .collect()
}
