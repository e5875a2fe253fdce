//! # Tabula
//!
//! Entities, fluent queries, relations and versioned migrations over a
//! single SQL connection (SQLite, PostgreSQL or MySQL).
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use tabula::prelude::*;
//!
//! struct Account;
//!
//! impl Entity for Account {
//!     const NAME: &'static str = "Account";
//!
//!     fn configure(meta: EntityMeta) -> EntityMeta {
//!         meta.fillable(&["name", "email"]).timestamps(true)
//!     }
//! }
//!
//! let mut conn = SqlxConnection::connect("sqlite::memory:")?;
//! Schema::new(&mut conn).create("accounts", |table| {
//!     table.id();
//!     table.string("name", 100);
//!     table.string("email", 255).unique();
//!     table.timestamps();
//! })?;
//!
//! let ana = Account::create(&mut conn, [("name", "Ana"), ("email", "a@x.com")])?;
//! let adults = Account::where_op("age", ">=", 18).order_by("name", "asc").get(&mut conn)?;
//! ```
//!
//! ## Layout
//!
//! | Module        | Role                                               |
//! |---------------|----------------------------------------------------|
//! | [`engine`]    | The [`Connection`](engine::Connection) seam        |
//! | [`entity`]    | Entity metadata, models, casts, hooks, validation  |
//! | [`query`]     | Fluent query builder                               |
//! | [`relation`]  | hasOne, hasMany, belongsTo, belongsToMany          |
//! | [`schema`]    | Blueprints and dialect DDL                         |
//! | [`migration`] | Ledger-backed migration manager                    |

pub mod config;
pub mod dialect;
pub mod engine;
pub mod entity;
pub mod error;
pub mod migration;
pub mod naming;
pub mod parser;
pub mod query;
pub mod relation;
pub mod schema;
pub mod transpiler;
pub mod value;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::dialect::Dialect;
    pub use crate::engine::{Connection, SqlxConnection};
    pub use crate::entity::{Cast, Entity, EntityMeta, Model, ModelEvent, Rule, ValidationErrors};
    pub use crate::error::*;
    pub use crate::migration::{Migration, MigrationManager, MigrationRegistry, MigrationState};
    pub use crate::query::{Direction, Operator, QueryBuilder};
    pub use crate::relation::{Related, RelationDef, RelationKind};
    pub use crate::schema::{Blueprint, Schema};
    pub use crate::value::{Row, Value};
}
