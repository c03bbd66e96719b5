//! Display names for Steam-style identities

use std::collections::HashMap;

use log::debug;
use parking_lot::Mutex;

/// Looks up the display name behind an identity. Unknown ids and lookup
/// failures resolve to an empty string.
pub trait IdentityResolver: Send + Sync {
    fn resolve_username(&self, steam_id: u64) -> String;
}

/// Fixed table of names loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct NameBook {
    names: HashMap<u64, String>,
}

impl NameBook {
    pub fn new(names: HashMap<u64, String>) -> Self {
        Self { names }
    }
}

impl IdentityResolver for NameBook {
    fn resolve_username(&self, steam_id: u64) -> String {
        self.names.get(&steam_id).cloned().unwrap_or_default()
    }
}

/// Remembers successful lookups of an inner resolver
pub struct CachedResolver<R> {
    inner: R,
    cache: Mutex<HashMap<u64, String>>,
}

impl<R: IdentityResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<R: IdentityResolver> IdentityResolver for CachedResolver<R> {
    fn resolve_username(&self, steam_id: u64) -> String {
        if let Some(name) = self.cache.lock().get(&steam_id) {
            return name.clone();
        }

        let name = self.inner.resolve_username(steam_id);
        // Empty means the lookup failed; try again next time
        if !name.is_empty() {
            debug!("Caching username {:?} for {}", name, steam_id);
            self.cache.lock().insert(steam_id, name.clone());
        }
        name
    }
}
