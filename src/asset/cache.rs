//! Single-slot cache of the registered cape texture.

use super::{
    pipeline::{LoadError, RegisteredTexture, Registrar},
    source::CapeSource,
};

/// Holds the texture registered for the most recent source. A source with the same key is served
/// from here without touching its bytes.
#[derive(Default)]
pub struct CapeCache {
    slot: Option<(String, RegisteredTexture)>,
}

impl CapeCache {
    pub fn new() -> CapeCache {
        CapeCache::default()
    }

    /// Key of the cached source.
    pub fn key(&self) -> Option<&str> {
        self.slot.as_ref().map(|(key, _)| key.as_str())
    }

    /// The cached texture, whatever source it came from.
    pub fn current(&self) -> Option<&RegisteredTexture> {
        self.slot.as_ref().map(|(_, texture)| texture)
    }

    /// Forgets the cached texture so that the next lookup registers again.
    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    /// Returns the texture for `source`, registering it through `registrar` if the cached one
    /// came from somewhere else. On failure the cached texture is kept.
    pub fn get_or_register(
        &mut self,
        source: &CapeSource,
        registrar: &mut impl Registrar,
    ) -> Result<RegisteredTexture, LoadError> {
        if let Some((key, texture)) = &self.slot {
            if key == source.cache_key() {
                return Ok(texture.clone());
            }
        }

        let texture = registrar.register(source)?;
        self.slot = Some((source.cache_key().to_string(), texture.clone()));

        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostClass, ObjectRef, Value};

    /// Registers every source as a fresh object, counting calls.
    #[derive(Default)]
    struct CountingRegistrar {
        calls: usize,
        fail: bool,
    }

    impl Registrar for CountingRegistrar {
        fn register(&mut self, source: &CapeSource) -> Result<RegisteredTexture, LoadError> {
            self.calls += 1;

            if self.fail {
                return Err(LoadError::Decode);
            }

            let class = HostClass::builder("Identifier").build();
            let id = Value::Object(ObjectRef::new(&class, source.cache_key().to_string()));

            Ok(RegisteredTexture::new(id.clone(), id))
        }
    }

    #[test]
    fn same_key_is_a_hit() {
        let mut cache = CapeCache::new();
        let mut registrar = CountingRegistrar::default();
        let source = CapeSource::from_bytes(b"cape".to_vec());

        let first = cache.get_or_register(&source, &mut registrar).unwrap();
        let second = cache.get_or_register(&source, &mut registrar).unwrap();

        assert_eq!(registrar.calls, 1);
        assert_eq!(first, second);
        assert_eq!(cache.key(), Some(source.cache_key()));
    }

    #[test]
    fn new_key_replaces_the_slot() {
        let mut cache = CapeCache::new();
        let mut registrar = CountingRegistrar::default();

        let red = cache
            .get_or_register(&CapeSource::from_bytes(b"red".to_vec()), &mut registrar)
            .unwrap();
        let blue = cache
            .get_or_register(&CapeSource::from_bytes(b"blue".to_vec()), &mut registrar)
            .unwrap();

        assert_eq!(registrar.calls, 2);
        assert_ne!(red, blue);
        assert_eq!(cache.current(), Some(&blue));
    }

    #[test]
    fn failures_keep_the_old_texture() {
        let mut cache = CapeCache::new();
        let mut registrar = CountingRegistrar::default();
        let red = CapeSource::from_bytes(b"red".to_vec());

        let cached = cache.get_or_register(&red, &mut registrar).unwrap();

        registrar.fail = true;
        let result = cache.get_or_register(&CapeSource::from_bytes(b"blue".to_vec()), &mut registrar);

        assert!(result.is_err());
        assert_eq!(cache.current(), Some(&cached));
        assert_eq!(cache.key(), Some(red.cache_key()));
    }

    #[test]
    fn invalidation_forces_registration() {
        let mut cache = CapeCache::new();
        let mut registrar = CountingRegistrar::default();
        let source = CapeSource::from_bytes(b"cape".to_vec());

        cache.get_or_register(&source, &mut registrar).unwrap();
        cache.invalidate();

        assert_eq!(cache.key(), None);

        cache.get_or_register(&source, &mut registrar).unwrap();
        assert_eq!(registrar.calls, 2);
    }
}
