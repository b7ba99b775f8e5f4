use serde_json::Value;
use std::sync::Arc;

use crate::error::StorageError;
use crate::monitoring::types::CheckRecord;

use super::{CHECKS, CheckStore};

/// Writes probed records back to the store
pub struct StatePersister {
    store: Arc<dyn CheckStore>,
}

impl StatePersister {
    pub fn new(store: Arc<dyn CheckStore>) -> Self {
        Self { store }
    }

    /// Write the probed check back over the raw record it was read from.
    ///
    /// The check's fields replace their stored counterparts; keys the worker
    /// does not know about are left as they were.
    pub async fn persist(&self, raw: &Value, check: &CheckRecord) -> Result<(), StorageError> {
        let value = match (raw, serde_json::to_value(check)?) {
            (Value::Object(stored), Value::Object(fields)) => {
                let mut merged = stored.clone();
                merged.extend(fields);
                Value::Object(merged)
            }
            (_, fields) => fields,
        };
        self.store.update(CHECKS, &check.id, &value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{CheckState, Method, Protocol};
    use crate::monitoring::validation::validate_check;
    use crate::testing::MemoryCheckStore;
    use serde_json::json;

    fn check() -> CheckRecord {
        CheckRecord {
            id: "abcdefghij0123456789".to_string(),
            user_phone: "5551234567".to_string(),
            protocol: Protocol::Http,
            url: "example.com".to_string(),
            method: Method::Delete,
            success_codes: vec![200],
            timeout_seconds: 1,
            state: CheckState::Up,
            last_check: Some(99),
        }
    }

    #[tokio::test]
    async fn test_persisted_record_validates_back() {
        let store = Arc::new(MemoryCheckStore::default());
        store.insert(CHECKS, &check().id, json!({}));
        let persister = StatePersister::new(store.clone());

        persister.persist(&json!({}), &check()).await.unwrap();

        let stored = store.get(CHECKS, &check().id).unwrap();
        assert_eq!(validate_check(&stored).unwrap(), check());
    }

    #[tokio::test]
    async fn test_unknown_keys_survive() {
        let store = Arc::new(MemoryCheckStore::default());
        let raw = json!({
            "id": "abcdefghij0123456789",
            "user_phone": "5551234567",
            "protocol": "http",
            "url": "example.com",
            "method": "delete",
            "success_codes": [200],
            "timeout_seconds": 1,
            "state": "down",
            "owner_note": "created by api"
        });
        store.insert(CHECKS, &check().id, raw.clone());
        let persister = StatePersister::new(store.clone());

        persister.persist(&raw, &check()).await.unwrap();

        let stored = store.get(CHECKS, &check().id).unwrap();
        assert_eq!(stored["owner_note"], "created by api");
        assert_eq!(stored["state"], "up");
        assert_eq!(stored["last_check"], 99);
    }

    #[tokio::test]
    async fn test_persist_missing_record_fails() {
        let store = Arc::new(MemoryCheckStore::default());
        let persister = StatePersister::new(store);

        assert!(matches!(
            persister.persist(&json!({}), &check()).await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
