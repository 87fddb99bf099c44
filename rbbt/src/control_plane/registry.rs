//! Name-keyed entity registry primitives.

use crate::error::ErrorKind;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub(crate) type EntityRegistry<T> = Mutex<HashMap<String, T>>;

/// Upper bound on name regeneration when a generated name collides.
const MAX_NAME_ATTEMPTS: usize = 8;

pub(crate) fn new_registry<T>() -> EntityRegistry<T> {
    Mutex::new(HashMap::new())
}

/// Fails with [`ErrorKind::TooManyChannels`] when one more entry would exceed `capacity`.
/// A capacity of `0` is unlimited.
pub(crate) fn ensure_capacity<T>(
    registered: &HashMap<String, T>,
    capacity: usize,
) -> Result<(), ErrorKind> {
    if capacity > 0 && registered.len() >= capacity {
        return Err(ErrorKind::TooManyChannels {
            channel_max: capacity,
        });
    }
    Ok(())
}

/// Draws names from `generate` until one is not registered yet.
///
/// Fails with [`ErrorKind::NameUnavailable`] once `MAX_NAME_ATTEMPTS` candidates all
/// collide; a taken name is never handed back.
pub(crate) fn vacant_name<T>(
    registered: &HashMap<String, T>,
    generate: impl Fn() -> String,
) -> Result<String, ErrorKind> {
    (0..MAX_NAME_ATTEMPTS)
        .map(|_| generate())
        .find(|name| !registered.contains_key(name))
        .ok_or(ErrorKind::NameUnavailable {
            attempts: MAX_NAME_ATTEMPTS,
        })
}

/// Removes `name` only while it still maps to `entity`, so a closed entity never evicts a
/// newer one registered under the same name.
pub(crate) async fn remove_entity<T: PartialEq>(
    registry: &EntityRegistry<T>,
    name: &str,
    entity: &T,
) -> bool {
    let mut registered = registry.lock().await;
    if registered.get(name) == Some(entity) {
        registered.remove(name);
        return true;
    }
    false
}

/// Empties the registry, returning its former entries.
pub(crate) async fn drain_entities<T>(registry: &EntityRegistry<T>) -> Vec<T> {
    let mut registered = registry.lock().await;
    registered.drain().map(|(_, entity)| entity).collect()
}

pub(crate) async fn entity_names<T>(registry: &EntityRegistry<T>) -> Vec<String> {
    let registered = registry.lock().await;
    let mut names: Vec<String> = registered.keys().cloned().collect();
    names.sort();
    names
}
