//! Typed access to the key-value store
//!
//! Services never serialize values themselves; they go through the helpers in
//! this module so that every persisted collection uses the same JSON encoding
//! and the same error mapping.

pub mod ledger;

pub use ledger::LedgerRepository;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, error::utilities::SerdeResultExt, storage::KeyValueStore};

/// Read and decode a JSON value. Missing keys are `Ok(None)`.
pub async fn read_json<S, T>(store: &S, key: &str) -> Result<Option<T>, Error>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw).map_serde_err(key)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
pub async fn write_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), Error>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + Sync + ?Sized,
{
    let raw = serde_json::to_string(value).map_serde_err(key)?;
    store.set(key, &raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::StorageError, storage::MemoryStore};

    #[tokio::test]
    async fn test_json_round_trip_and_missing_key() {
        let store = MemoryStore::new();
        let missing: Option<Vec<u32>> = read_json(&store, "numbers").await.unwrap();
        assert!(missing.is_none());

        write_json(&store, "numbers", &vec![1u32, 2, 3]).await.unwrap();
        let numbers: Option<Vec<u32>> = read_json(&store, "numbers").await.unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_corrupt_value_is_serialization_error() {
        let store = MemoryStore::new();
        store.set("numbers", "[1, 2,").await.unwrap();

        let result: Result<Option<Vec<u32>>, _> = read_json(&store, "numbers").await;
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Serialization(_)))
        ));
    }
}
