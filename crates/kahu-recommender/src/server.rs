use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tracing::{error, warn};

use kahu_common::conversation::{ConversationStore, ConversationTurn};
use kahu_common::mcp_api::{
    EndConversationParams, GetPetProfileParams, OkResponse, RecommendDishesParams,
    RecommendPetCareParams, StartConversationResponse,
};

use crate::error::AppError;
use crate::model::{Dish, PetRecommendation, RecommendationResponse, SubjectProfile};
use crate::pipeline::RecommendationPipeline;

const APOLOGY: &str =
    "Lo sentimos, no pudimos preparar tus recomendaciones en este momento. Inténtalo de nuevo en unos minutos.";

#[derive(Clone)]
pub struct KahuRecommenderServer {
    pipeline: Arc<RecommendationPipeline>,
    convos: ConversationStore,
    tool_router: ToolRouter<KahuRecommenderServer>,
}

impl KahuRecommenderServer {
    pub fn new(pipeline: Arc<RecommendationPipeline>, convos: ConversationStore) -> Self {
        Self {
            pipeline,
            convos,
            tool_router: Self::tool_router(),
        }
    }

    /// Prior turns of a conversation. Unknown or expired ids run without history.
    async fn history(&self, conversation_id: Option<&str>) -> Vec<ConversationTurn> {
        let Some(id) = conversation_id else {
            return Vec::new();
        };
        match self.convos.turns(id).await {
            Some(turns) => turns,
            None => {
                warn!(conversation_id = id, "conversation not found, continuing without history");
                Vec::new()
            }
        }
    }

    async fn remember<C>(&self, conversation_id: Option<&str>, query: &str, response: &RecommendationResponse<C>) {
        let Some(id) = conversation_id else {
            return;
        };
        let reply = response
            .persona_message
            .clone()
            .unwrap_or_else(|| response.summary.clone());
        let turns = [ConversationTurn::user(query.trim()), ConversationTurn::assistant(reply)];
        if !self.convos.append(id, &turns).await {
            warn!(conversation_id = id, "failed to persist conversation turns");
        }
    }
}

/// Client errors are reported as-is; anything else is logged and replaced by an apology.
fn tool_error(err: AppError) -> String {
    match err {
        AppError::InvalidInput(_) | AppError::NotFound(_) => err.to_string(),
        other => {
            error!(error = %other, "request failed");
            APOLOGY.to_string()
        }
    }
}

#[tool_router]
impl KahuRecommenderServer {
    #[tool(description = "Recommend pet care tips (training, nutrition, wellness) for a free-text question. With pet_id, the registered pet answers in its own voice.")]
    async fn recommend_pet_care(
        &self,
        Parameters(params): Parameters<RecommendPetCareParams>,
    ) -> Result<Json<RecommendationResponse<PetRecommendation>>, String> {
        let conversation_id = params.conversation_id.as_deref();
        let history = self.history(conversation_id).await;
        let response = self
            .pipeline
            .recommend_pets(&params.query, params.pet_id.as_deref(), &history)
            .await
            .map_err(tool_error)?;
        self.remember(conversation_id, &params.query, &response).await;
        Ok(Json(response))
    }

    #[tool(description = "Recommend restaurant dishes for a free-text request (course, cuisine, dietary needs). restaurant_id limits suggestions to one menu.")]
    async fn recommend_dishes(
        &self,
        Parameters(params): Parameters<RecommendDishesParams>,
    ) -> Result<Json<RecommendationResponse<Dish>>, String> {
        let conversation_id = params.conversation_id.as_deref();
        let history = self.history(conversation_id).await;
        let response = self
            .pipeline
            .recommend_dishes(&params.query, params.restaurant_id.as_deref(), &history)
            .await
            .map_err(tool_error)?;
        self.remember(conversation_id, &params.query, &response).await;
        Ok(Json(response))
    }

    #[tool(description = "Get the profile of a registered pet by ID.")]
    async fn get_pet_profile(
        &self,
        Parameters(params): Parameters<GetPetProfileParams>,
    ) -> Result<Json<SubjectProfile>, String> {
        let pet_id = params.pet_id.trim();
        if pet_id.is_empty() {
            return Err("pet_id must not be empty".to_string());
        }
        let profile = self.pipeline.subject_profile(pet_id).await.map_err(tool_error)?;
        Ok(Json(profile))
    }

    #[tool(description = "Start a Redis-backed conversation so follow-up questions keep their context. Returns a conversation_id.")]
    async fn start_conversation(&self) -> Result<Json<StartConversationResponse>, String> {
        let id = self.convos.start().await;
        Ok(Json(StartConversationResponse { conversation_id: id }))
    }

    #[tool(description = "End a conversation and delete its stored history.")]
    async fn end_conversation(
        &self,
        Parameters(params): Parameters<EndConversationParams>,
    ) -> Result<Json<OkResponse>, String> {
        self.convos.end(&params.conversation_id).await;
        Ok(Json(OkResponse { ok: true }))
    }
}

#[tool_handler]
impl ServerHandler for KahuRecommenderServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "kahu-recommender".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Kahupet and Komi recommendation server. Use recommend_pet_care for pet questions \
(pass pet_id for a registered pet, see get_pet_profile) and recommend_dishes for food orders. \
For follow-up questions, call start_conversation and pass the conversation_id to every request; \
end_conversation deletes the history."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use kahu_common::openai::{CompletionService, OpenAiClientError};
    use kahu_common::redis::RedisCache;

    use super::*;
    use crate::interpreter::QueryInterpreter;
    use crate::seed::SeedSet;
    use crate::store::{CandidateStore, MemoryStore, RedisDocumentStore};

    struct Unreachable;

    #[async_trait]
    impl CompletionService for Unreachable {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[ConversationTurn],
            _user_message: &str,
        ) -> Result<String, OpenAiClientError> {
            Err(OpenAiClientError::EmptyChoices)
        }
    }

    fn server(store: Arc<dyn CandidateStore>) -> KahuRecommenderServer {
        let interpreter = QueryInterpreter::new(Arc::new(Unreachable), Duration::from_secs(1));
        KahuRecommenderServer::new(
            Arc::new(RecommendationPipeline::new(store, interpreter)),
            ConversationStore::new(RedisCache::new(None), None),
        )
    }

    fn memory_server() -> KahuRecommenderServer {
        server(Arc::new(MemoryStore::new(SeedSet::builtin().expect("seed"))))
    }

    #[test]
    fn tools_publish_output_schemas() {
        let tools = KahuRecommenderServer::tool_router().list_all();
        for name in [
            "recommend_pet_care",
            "recommend_dishes",
            "get_pet_profile",
            "start_conversation",
            "end_conversation",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }

    #[tokio::test]
    async fn empty_query_is_reported_verbatim() {
        let err = memory_server()
            .recommend_dishes(Parameters(RecommendDishesParams {
                query: " ".to_string(),
                restaurant_id: None,
                conversation_id: None,
            }))
            .await
            .err()
            .expect("invalid input");
        assert_eq!(err, "invalid input: query must not be empty");
    }

    #[tokio::test]
    async fn storage_failure_becomes_an_apology() {
        let server = server(Arc::new(RedisDocumentStore::new(RedisCache::new(None))));
        let err = server
            .recommend_pet_care(Parameters(RecommendPetCareParams {
                query: "mi perro ladra".to_string(),
                pet_id: None,
                conversation_id: None,
            }))
            .await
            .err()
            .expect("storage failure");
        assert_eq!(err, APOLOGY);
    }

    #[tokio::test]
    async fn unknown_conversation_runs_without_history() {
        let Json(response) = memory_server()
            .recommend_pet_care(Parameters(RecommendPetCareParams {
                query: "mi gato no usa el arenero".to_string(),
                pet_id: Some("pet-luna".to_string()),
                conversation_id: Some("does-not-exist".to_string()),
            }))
            .await
            .expect("recommend");
        assert_eq!(response.recommendations[0].id, "rec-cat-litter");
        assert!(response.persona_message.is_some());
    }

    #[tokio::test]
    async fn pet_profile_lookup() {
        let server = memory_server();
        let Json(profile) = server
            .get_pet_profile(Parameters(GetPetProfileParams {
                pet_id: "pet-toby".to_string(),
            }))
            .await
            .expect("profile");
        assert_eq!(profile.breed, "golden retriever");

        let err = server
            .get_pet_profile(Parameters(GetPetProfileParams {
                pet_id: "pet-ghost".to_string(),
            }))
            .await
            .err()
            .expect("not found");
        assert!(err.starts_with("not found:"));
    }
}
