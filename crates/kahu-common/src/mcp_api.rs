use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RecommendPetCareParams {
    /// Free-text question about a pet, e.g. "mi perro ladra mucho por las noches".
    pub query: String,
    /// Registered pet the question is about. Enables the pet's own voice in the reply.
    pub pet_id: Option<String>,
    /// Conversation to continue. Prior turns are used as context.
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RecommendDishesParams {
    /// Free-text request, e.g. "algo vegetariano de postre".
    pub query: String,
    /// Restrict suggestions to one restaurant's menu.
    pub restaurant_id: Option<String>,
    /// Conversation to continue. Prior turns are used as context.
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetPetProfileParams {
    pub pet_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EndConversationParams {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StartConversationResponse {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct OkResponse {
    pub ok: bool,
}
