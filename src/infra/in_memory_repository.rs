use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::app::ports::RecordRepository;
use crate::common::error::RepositoryError;
use crate::domain::{EnrichedTable, PersistedRecord};

/// In-memory repository implementation for development/testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<Uuid, PersistedRecord>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, PersistedRecord>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("record store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordRepository for InMemoryRepository {
    async fn insert_records(&self, records: EnrichedTable) -> Result<Vec<PersistedRecord>, RepositoryError> {
        let persisted: Vec<PersistedRecord> = records
            .into_iter()
            .map(|record| PersistedRecord { id: Uuid::new_v4(), record })
            .collect();

        let mut store = self.lock()?;
        for row in &persisted {
            store.insert(row.id, row.clone());
        }
        debug!("Inserted {} records ({} total)", persisted.len(), store.len());
        Ok(persisted)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<PersistedRecord>, RepositoryError> {
        let store = self.lock()?;
        Ok(ids.iter().filter_map(|id| store.get(id).cloned()).collect())
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnrichedRecord, SampleKey};

    fn record(testpoint: &str) -> EnrichedRecord {
        EnrichedRecord {
            key: SampleKey {
                dut: "D".into(),
                pba: "P".into(),
                rework: "0".into(),
                serial_number: "S".into(),
                runid: "1".into(),
                scope_channel: "CH1".into(),
                testpoint: testpoint.into(),
            },
            capture: Default::default(),
            rail: Default::default(),
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_in_order() {
        let repo = InMemoryRepository::new();
        let persisted = repo
            .insert_records(vec![record("V1"), record("V2")])
            .await
            .unwrap();

        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].record.testpoint(), "V1");
        assert_ne!(persisted[0].id, persisted[1].id);
        assert_eq!(repo.count().await.unwrap(), 2);

        let found = repo.find_by_ids(&[persisted[1].id, Uuid::nil()]).await.unwrap();
        assert_eq!(found, vec![persisted[1].clone()]);
    }
}
