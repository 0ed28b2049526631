/// Storage collaborator: candidate collections and registered pets.
///
/// Key schema of the Redis document store:
/// - `kahu:v1:collection:pet_recommendations`: JSON array of PetRecommendation
/// - `kahu:v1:collection:dishes`: JSON array of Dish
/// - `kahu:v1:pet:{id}`: JSON SubjectProfile
///
/// Collections are read whole on every request; the filter engine works on that snapshot.
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use kahu_common::error::CommonError;
use kahu_common::redis::RedisCache;

use crate::error::AppError;
use crate::model::{Dish, Domain, PetRecommendation, SubjectProfile};
use crate::seed::SeedSet;

const KEY_PREFIX: &str = "kahu:v1:";

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn fetch_pet_recommendations(&self) -> Result<Vec<PetRecommendation>, AppError>;

    async fn fetch_dishes(&self) -> Result<Vec<Dish>, AppError>;

    /// `Ok(None)` when no pet is registered under `id`.
    async fn fetch_subject_profile(&self, id: &str) -> Result<Option<SubjectProfile>, AppError>;
}

/// Serves a seed set held in memory.
pub struct MemoryStore {
    seed: SeedSet,
}

impl MemoryStore {
    pub fn new(seed: SeedSet) -> Self {
        Self { seed }
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn fetch_pet_recommendations(&self) -> Result<Vec<PetRecommendation>, AppError> {
        Ok(self.seed.pet_recommendations.clone())
    }

    async fn fetch_dishes(&self) -> Result<Vec<Dish>, AppError> {
        Ok(self.seed.dishes.clone())
    }

    async fn fetch_subject_profile(&self, id: &str) -> Result<Option<SubjectProfile>, AppError> {
        Ok(self.seed.pets.iter().find(|p| p.id == id).cloned())
    }
}

/// JSON documents in Redis. Read failures are `StorageUnavailable`.
pub struct RedisDocumentStore {
    redis: RedisCache,
}

impl RedisDocumentStore {
    pub fn new(redis: RedisCache) -> Self {
        Self { redis }
    }

    /// Write every seed document whose key does not exist yet. Existing documents are left
    /// untouched.
    pub async fn initialize(&self, seed: &SeedSet) -> Result<(), AppError> {
        let mut written = 0usize;
        if self
            .write_if_absent(&collection_key(Domain::PetRecommendations), &seed.pet_recommendations)
            .await?
        {
            written += 1;
        }
        if self
            .write_if_absent(&collection_key(Domain::Dishes), &seed.dishes)
            .await?
        {
            written += 1;
        }
        for pet in &seed.pets {
            if self.write_if_absent(&pet_key(&pet.id), pet).await? {
                written += 1;
            }
        }
        info!(written, "redis document store initialized");
        Ok(())
    }

    async fn write_if_absent<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool, AppError> {
        let json = serde_json::to_string(value).map_err(CommonError::from)?;
        Ok(self.redis.set_if_absent(key, &json).await?)
    }

    async fn read_document<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let raw = self.redis.get_checked(key).await.map_err(|e| {
            warn!(error = %e, key, "document read failed");
            AppError::StorageUnavailable(format!("failed to read {key}: {e}"))
        })?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AppError::StorageUnavailable(format!("corrupt document {key}: {e}")))
    }
}

#[async_trait]
impl CandidateStore for RedisDocumentStore {
    async fn fetch_pet_recommendations(&self) -> Result<Vec<PetRecommendation>, AppError> {
        Ok(self
            .read_document(&collection_key(Domain::PetRecommendations))
            .await?
            .unwrap_or_default())
    }

    async fn fetch_dishes(&self) -> Result<Vec<Dish>, AppError> {
        Ok(self
            .read_document(&collection_key(Domain::Dishes))
            .await?
            .unwrap_or_default())
    }

    async fn fetch_subject_profile(&self, id: &str) -> Result<Option<SubjectProfile>, AppError> {
        self.read_document(&pet_key(id)).await
    }
}

fn collection_key(domain: Domain) -> String {
    format!("{KEY_PREFIX}collection:{}", domain.as_str())
}

fn pet_key(id: &str) -> String {
    format!("{KEY_PREFIX}pet:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_serves_seed_collections() {
        let store = MemoryStore::new(SeedSet::builtin().expect("seed"));
        assert!(!store.fetch_pet_recommendations().await.expect("recs").is_empty());
        assert!(!store.fetch_dishes().await.expect("dishes").is_empty());

        let toby = store.fetch_subject_profile("pet-toby").await.expect("fetch");
        assert_eq!(toby.map(|p| p.name), Some("Toby".to_string()));
        assert_eq!(store.fetch_subject_profile("pet-nobody").await.expect("fetch"), None);
    }

    #[tokio::test]
    async fn redis_store_without_redis_is_storage_unavailable() {
        let store = RedisDocumentStore::new(RedisCache::new(None));
        assert!(matches!(
            store.fetch_dishes().await,
            Err(AppError::StorageUnavailable(_))
        ));
        assert!(matches!(
            store.fetch_subject_profile("pet-toby").await,
            Err(AppError::StorageUnavailable(_))
        ));
        assert!(store.initialize(&SeedSet::default()).await.is_err());
    }

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(collection_key(Domain::Dishes), "kahu:v1:collection:dishes");
        assert_eq!(
            collection_key(Domain::PetRecommendations),
            "kahu:v1:collection:pet_recommendations"
        );
        assert_eq!(pet_key("pet-luna"), "kahu:v1:pet:pet-luna");
    }
}
