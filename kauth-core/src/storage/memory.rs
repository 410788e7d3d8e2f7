use async_trait::async_trait;
use dashmap::DashMap;

use crate::Error;

use super::KeyValueStore;

/// Process-local store. Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get("kauth_jwt").await.unwrap().is_none());

        store.set("kauth_jwt", "a.b.c").await.unwrap();
        assert_eq!(store.get("kauth_jwt").await.unwrap().as_deref(), Some("a.b.c"));

        store.set("kauth_jwt", "d.e.f").await.unwrap();
        assert_eq!(store.get("kauth_jwt").await.unwrap().as_deref(), Some("d.e.f"));
        assert_eq!(store.len(), 1);

        store.remove("kauth_jwt").await.unwrap();
        store.remove("kauth_jwt").await.unwrap();
        assert!(store.is_empty());
        assert!(store.health_check().await.is_ok());
    }
}
