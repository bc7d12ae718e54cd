use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DbId, KpiKey, KpiRecord};
use crate::period::{PeriodBounds, Scope};

/// Persistence capability the aggregator writes through.
#[async_trait]
pub trait KpiStore: Send + Sync {
    /// Record stored under the natural key, if any.
    async fn find_record(&self, key: &KpiKey) -> Result<Option<KpiRecord>>;

    async fn create_record(&self, record: KpiRecord) -> Result<KpiRecord>;

    /// Overwrites value, actor and timestamp of the record with `record.id`.
    async fn update_record(&self, record: KpiRecord) -> Result<KpiRecord>;

    /// All records of one period; `client_id` matches exactly, so `None`
    /// selects organization-wide records only.
    async fn list_records(
        &self,
        scope: Scope,
        period: PeriodBounds,
        client_id: Option<DbId>,
    ) -> Result<Vec<KpiRecord>>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<KpiRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<KpiRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KpiStore for MemoryStore {
    async fn find_record(&self, key: &KpiKey) -> Result<Option<KpiRecord>> {
        Ok(self
            .lock()
            .iter()
            .find(|record| record.key() == *key)
            .cloned())
    }

    async fn create_record(&self, record: KpiRecord) -> Result<KpiRecord> {
        let mut records = self.lock();
        let key = record.key();
        match records.iter_mut().find(|existing| existing.key() == key) {
            // racing create for the same key: last write wins
            Some(existing) => {
                existing.value = record.value;
                existing.recorded_by = record.recorded_by;
                existing.recorded_at = record.recorded_at;
                Ok(existing.clone())
            }
            None => {
                records.push(record.clone());
                Ok(record)
            }
        }
    }

    async fn update_record(&self, record: KpiRecord) -> Result<KpiRecord> {
        let mut records = self.lock();
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => {
                existing.value = record.value;
                existing.recorded_by = record.recorded_by;
                existing.recorded_at = record.recorded_at;
                Ok(existing.clone())
            }
            None => Err(sqlx::Error::RowNotFound.into()),
        }
    }

    async fn list_records(
        &self,
        scope: Scope,
        period: PeriodBounds,
        client_id: Option<DbId>,
    ) -> Result<Vec<KpiRecord>> {
        Ok(self
            .lock()
            .iter()
            .filter(|record| {
                record.scope == scope
                    && record.period_start == period.start
                    && record.period_end == period.end
                    && record.client_id == client_id
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KpiError;
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn june_week() -> PeriodBounds {
        PeriodBounds {
            start: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 16).unwrap(),
        }
    }

    fn record(metric: &str, value: f64, client_id: Option<DbId>) -> KpiRecord {
        let period = june_week();
        KpiRecord {
            id: Uuid::new_v4(),
            scope: Scope::Weekly,
            metric_slug: metric.to_string(),
            value,
            period_start: period.start,
            period_end: period.end,
            client_id,
            recorded_by: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn list_matches_client_exactly() {
        let store = MemoryStore::new();
        store.create_record(record("ig_leads", 4.0, None)).await.unwrap();
        store.create_record(record("ig_leads", 9.0, Some(7))).await.unwrap();
        store.create_record(record("wa_leads", 2.0, Some(8))).await.unwrap();

        let org = store.list_records(Scope::Weekly, june_week(), None).await.unwrap();
        assert_eq!(org.len(), 1);
        assert_eq!(org[0].value, 4.0);

        let client = store.list_records(Scope::Weekly, june_week(), Some(7)).await.unwrap();
        assert_eq!(client.len(), 1);
        assert_eq!(client[0].value, 9.0);

        let monthly = store.list_records(Scope::Monthly, june_week(), None).await.unwrap();
        assert!(monthly.is_empty());
    }

    #[tokio::test]
    async fn duplicate_create_keeps_one_record() {
        let store = MemoryStore::new();
        let first = store.create_record(record("ig_leads", 1.0, Some(3))).await.unwrap();
        let second = store.create_record(record("ig_leads", 2.0, Some(3))).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(second.id, first.id);
        assert_eq!(second.value, 2.0);
    }

    #[tokio::test]
    async fn find_uses_the_natural_key() {
        let store = MemoryStore::new();
        let stored = store.create_record(record("ig_reach", 1200.0, None)).await.unwrap();

        let found = store.find_record(&stored.key()).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(stored.id));

        let mut other_client = stored.key();
        other_client.client_id = Some(1);
        assert!(store.find_record(&other_client).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_overwrites_the_stored_value() {
        let store = MemoryStore::new();
        let mut stored = store.create_record(record("wa_leads", 3.0, Some(5))).await.unwrap();
        stored.value = 11.0;
        stored.recorded_by = Some(7);

        let updated = store.update_record(stored.clone()).await.unwrap();
        assert_eq!(updated.value, 11.0);
        assert_eq!(updated.recorded_by, Some(7));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_rejected() {
        let store = MemoryStore::new();
        store.create_record(record("ig_leads", 1.0, None)).await.unwrap();

        let stray = record("ig_leads", 5.0, Some(9));
        assert_matches!(
            store.update_record(stray).await,
            Err(KpiError::Database(sqlx::Error::RowNotFound))
        );
        assert_eq!(store.len(), 1);
    }
}
