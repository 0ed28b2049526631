/// End-to-end request flow: validate, load, interpret, filter, summarize.
use std::sync::Arc;

use tracing::info;

use kahu_common::conversation::ConversationTurn;

use crate::error::AppError;
use crate::filter::{self, FilterPolicy};
use crate::interpreter::{Interpretation, QueryInterpreter};
use crate::model::{
    Candidate, Dish, Domain, IntentSource, PetRecommendation, RecommendationResponse,
    StructuredIntent, SubjectProfile,
};
use crate::store::CandidateStore;
use crate::summary;

#[derive(Clone)]
pub struct RecommendationPipeline {
    store: Arc<dyn CandidateStore>,
    interpreter: QueryInterpreter,
}

impl RecommendationPipeline {
    pub fn new(store: Arc<dyn CandidateStore>, interpreter: QueryInterpreter) -> Self {
        Self { store, interpreter }
    }

    pub async fn recommend_pets(
        &self,
        query: &str,
        pet_id: Option<&str>,
        history: &[ConversationTurn],
    ) -> Result<RecommendationResponse<PetRecommendation>, AppError> {
        let query = validate_query(query)?;
        let profile = match non_empty(pet_id) {
            Some(id) => Some(self.subject_profile(id).await?),
            None => None,
        };
        let candidates = self.store.fetch_pet_recommendations().await?;

        let Interpretation { intent, source } = self
            .interpreter
            .interpret(query, Domain::PetRecommendations, &candidates, profile.as_ref(), history)
            .await?;
        let recommendations = filter::filter(&intent, &candidates, profile.as_ref(), &FilterPolicy::pets());
        Ok(respond(Domain::PetRecommendations, &intent, source, candidates.len(), recommendations))
    }

    pub async fn recommend_dishes(
        &self,
        query: &str,
        restaurant_id: Option<&str>,
        history: &[ConversationTurn],
    ) -> Result<RecommendationResponse<Dish>, AppError> {
        let query = validate_query(query)?;
        let mut candidates = self.store.fetch_dishes().await?;
        if let Some(restaurant_id) = non_empty(restaurant_id) {
            candidates.retain(|d| d.restaurant_id == restaurant_id);
            if candidates.is_empty() {
                return Err(AppError::NotFound(format!("no dishes for restaurant '{restaurant_id}'")));
            }
        }

        let Interpretation { intent, source } = self
            .interpreter
            .interpret(query, Domain::Dishes, &candidates, None, history)
            .await?;
        let recommendations = filter::filter(&intent, &candidates, None, &FilterPolicy::dishes());
        Ok(respond(Domain::Dishes, &intent, source, candidates.len(), recommendations))
    }

    pub async fn subject_profile(&self, pet_id: &str) -> Result<SubjectProfile, AppError> {
        self.store
            .fetch_subject_profile(pet_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("pet '{pet_id}' is not registered")))
    }
}

fn validate_query(query: &str) -> Result<&str, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::InvalidInput("query must not be empty".to_string()));
    }
    Ok(query)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn respond<C: Candidate>(
    domain: Domain,
    intent: &StructuredIntent,
    source: IntentSource,
    candidate_count: usize,
    recommendations: Vec<C>,
) -> RecommendationResponse<C> {
    let persona_message = intent
        .persona_response
        .as_ref()
        .filter(|p| intent.has_subject() && !p.message.trim().is_empty())
        .map(|p| p.message.clone());
    let summary = summary::compose(domain, intent, recommendations.len());

    info!(
        domain = domain.as_str(),
        candidates = candidate_count,
        results = recommendations.len(),
        persona = persona_message.is_some(),
        "recommendations composed"
    );
    RecommendationResponse {
        total: recommendations.len(),
        recommendations,
        persona_message,
        summary,
        interpreted_by: source,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use kahu_common::openai::{CompletionService, OpenAiClientError};
    use kahu_common::redis::RedisCache;

    use super::*;
    use crate::seed::SeedSet;
    use crate::store::{MemoryStore, RedisDocumentStore};

    struct Unreachable;

    #[async_trait]
    impl CompletionService for Unreachable {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[ConversationTurn],
            _user_message: &str,
        ) -> Result<String, OpenAiClientError> {
            Err(OpenAiClientError::Timeout(Duration::from_secs(15)))
        }
    }

    struct FixedReply(&'static str);

    #[async_trait]
    impl CompletionService for FixedReply {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[ConversationTurn],
            _user_message: &str,
        ) -> Result<String, OpenAiClientError> {
            Ok(self.0.to_string())
        }
    }

    fn pipeline(service: impl CompletionService + 'static) -> RecommendationPipeline {
        let store = MemoryStore::new(SeedSet::builtin().expect("seed"));
        RecommendationPipeline::new(
            Arc::new(store),
            QueryInterpreter::new(Arc::new(service), Duration::from_secs(1)),
        )
    }

    #[tokio::test]
    async fn barking_dog_gets_training_first_from_fallback() {
        let response = pipeline(Unreachable)
            .recommend_pets("Mi golden retriever ladra mucho", None, &[])
            .await
            .expect("recommend");
        assert_eq!(response.interpreted_by, IntentSource::LocalFallback);
        assert_eq!(response.recommendations[0].id, "rec-dog-bark");
        assert!(response.total <= 8);
        assert_eq!(response.total, response.recommendations.len());
        assert!(response
            .recommendations
            .iter()
            .all(|r| r.animal_type.as_deref() == Some("perro")));
        assert!(response.persona_message.is_some());
        assert!(response.summary.contains("entrenamiento"));
    }

    #[tokio::test]
    async fn registered_pet_speaks_through_remote_persona() {
        let reply = r#"{"issues": ["arenero"], "resultTypeFilters": ["training"],
            "personaResponse": {"hasSubject": true, "message": "Miau, soy Luna.", "tone": "curious"}}"#;
        let response = pipeline(FixedReply(reply))
            .recommend_pets("no usa su caja", Some("pet-luna"), &[])
            .await
            .expect("recommend");
        assert_eq!(response.interpreted_by, IntentSource::Remote);
        assert_eq!(response.persona_message.as_deref(), Some("Miau, soy Luna."));
        let ids: Vec<&str> = response.recommendations.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(&ids[..3], ["rec-cat-litter", "rec-siamese-vocal", "rec-cat-scratch"]);
        assert!(response.summary.starts_with("🤔 Para Luna:"));
    }

    #[tokio::test]
    async fn unknown_pet_is_not_found() {
        let result = pipeline(Unreachable)
            .recommend_pets("mi perro ladra", Some("pet-ghost"), &[])
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn blank_query_is_rejected_before_storage() {
        let result = pipeline(Unreachable).recommend_dishes("  ", None, &[]).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn restaurant_scopes_dish_candidates() {
        let response = pipeline(Unreachable)
            .recommend_dishes("quiero un postre", Some("cantina-lupita"), &[])
            .await
            .expect("recommend");
        assert_eq!(response.recommendations[0].id, "dish-churros");
        assert!(response
            .recommendations
            .iter()
            .all(|d| d.restaurant_id == "cantina-lupita"));
        assert!(response.persona_message.is_none());

        let missing = pipeline(Unreachable)
            .recommend_dishes("quiero un postre", Some("nowhere"), &[])
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn dessert_query_orders_by_price() {
        let response = pipeline(FixedReply(r#"{"resultTypeFilters": ["postre"]}"#))
            .recommend_dishes("algo dulce", None, &[])
            .await
            .expect("recommend");
        let ids: Vec<&str> = response.recommendations.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["dish-churros", "dish-mochi", "dish-tiramisu"]);
    }

    #[tokio::test]
    async fn storage_failure_is_surfaced() {
        let pipeline = RecommendationPipeline::new(
            Arc::new(RedisDocumentStore::new(RedisCache::new(None))),
            QueryInterpreter::new(Arc::new(Unreachable), Duration::from_secs(1)),
        );
        let result = pipeline.recommend_pets("mi perro ladra", None, &[]).await;
        assert!(matches!(result, Err(AppError::StorageUnavailable(_))));
    }
}
