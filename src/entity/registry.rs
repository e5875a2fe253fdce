//! Process-wide metadata registry, keyed by entity type.
//!
//! Metadata is built once per type from [`Entity::configure`] on first use
//! and shared behind an `Arc` afterwards.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use super::{Entity, EntityMeta};

static REGISTRY: LazyLock<RwLock<HashMap<TypeId, Arc<EntityMeta>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

pub(crate) fn meta_for<E: Entity>() -> Arc<EntityMeta> {
    let id = TypeId::of::<E>();
    if let Some(meta) = REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
    {
        return Arc::clone(meta);
    }

    // Built outside the lock: configure() may touch other entity types.
    let meta = Arc::new(E::configure(EntityMeta::new(E::NAME)));
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(registry.entry(id).or_insert(meta))
}
