use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;

use super::{BackendError, GeocodedAddress, Geocoder};

/// LRU memo in front of a geocoder. Only successful lookups are cached.
pub struct CachedGeocoder {
    inner: Arc<dyn Geocoder>,
    cache: Mutex<LruCache<String, GeocodedAddress>>,
}

impl CachedGeocoder {
    /// A zero `capacity` is bumped to one entry.
    pub fn new(inner: Arc<dyn Geocoder>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// "  Big   Ben " and "big ben" share a cache entry.
fn cache_key(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl Geocoder for CachedGeocoder {
    async fn resolve(&self, address: &str) -> Result<GeocodedAddress, BackendError> {
        let key = cache_key(address);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                tracing::debug!("geocode cache hit for {key:?}");
                return Ok(hit.clone());
            }
        }

        let resolved = self.inner.resolve(address).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, resolved.clone());
        }
        Ok(resolved)
    }
}
