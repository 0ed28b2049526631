use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::redis::RedisCache;

static CONVO_COUNTER: AtomicU64 = AtomicU64::new(0);

const DEFAULT_TTL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }
}

pub type ConversationId = String;

/// Redis-backed conversation history. Without Redis, conversations cannot be resumed and
/// requests run with an empty history.
///
/// A conversation is an open marker key plus a list of JSON-encoded turns. Turns are only
/// ever appended with RPUSH.
#[derive(Clone)]
pub struct ConversationStore {
    redis: RedisCache,
    ttl_secs: u64,
}

impl ConversationStore {
    pub fn new(redis: RedisCache, ttl_secs: Option<u64>) -> Self {
        Self {
            redis,
            ttl_secs: ttl_secs.unwrap_or(DEFAULT_TTL_SECS),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub async fn start(&self) -> ConversationId {
        let id = new_conversation_id();
        if !self.redis.set_with_ttl(&convo_key(&id), OPEN_MARKER, self.ttl_secs).await {
            warn!(conversation_id = %id, "conversation started without persistence");
        }
        id
    }

    pub async fn end(&self, conversation_id: &str) {
        self.redis.delete(&turns_key(conversation_id)).await;
        self.redis.delete(&convo_key(conversation_id)).await;
    }

    /// Stored turns, oldest first. `None` for unknown or expired conversations.
    pub async fn turns(&self, conversation_id: &str) -> Option<Vec<ConversationTurn>> {
        if !self.redis.exists(&convo_key(conversation_id)).await {
            return None;
        }
        let raw = self.redis.list(&turns_key(conversation_id)).await?;
        Some(decode_turns(conversation_id, &raw))
    }

    /// Append turns and refresh the TTL. Returns `false` if nothing was persisted.
    pub async fn append(&self, conversation_id: &str, new_turns: &[ConversationTurn]) -> bool {
        let Some(encoded) = encode_turns(new_turns) else {
            return false;
        };
        self.redis
            .push_with_ttl(&turns_key(conversation_id), &encoded, self.ttl_secs)
            .await
            && self
                .redis
                .set_with_ttl(&convo_key(conversation_id), OPEN_MARKER, self.ttl_secs)
                .await
    }
}

const OPEN_MARKER: &str = "open";

fn convo_key(conversation_id: &str) -> String {
    format!("kahu:convo:{conversation_id}")
}

fn turns_key(conversation_id: &str) -> String {
    format!("kahu:convo:{conversation_id}:turns")
}

/// One JSON document per turn, in order.
fn encode_turns(turns: &[ConversationTurn]) -> Option<Vec<String>> {
    turns
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<_, _>>()
        .inspect_err(|e| warn!(error = %e, "failed to encode conversation turns"))
        .ok()
}

/// Decode stored turns, skipping entries that no longer parse.
fn decode_turns(conversation_id: &str, raw: &[String]) -> Vec<ConversationTurn> {
    raw.iter()
        .filter_map(|entry| {
            serde_json::from_str(entry)
                .inspect_err(|e| warn!(error = %e, conversation_id, "stored conversation turn is corrupt"))
                .ok()
        })
        .collect()
}

fn new_conversation_id() -> ConversationId {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let counter = CONVO_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut h = Sha256::new();
    h.update(now.as_nanos().to_le_bytes());
    h.update(std::process::id().to_le_bytes());
    h.update(counter.to_le_bytes());
    h.finalize()[..16]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
