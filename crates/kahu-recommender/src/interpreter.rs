/// Structured query interpretation.
///
/// The remote completion service is asked for a JSON intent; its reply is repaired by the
/// sanitizer and coerced field by field into `StructuredIntent`. Any failure on that path
/// (transport, status, timeout, empty choices, unrepairable text) drops to the local keyword
/// classifier, so `interpret` only ever fails on an empty query.
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{info, warn};

use kahu_common::conversation::ConversationTurn;
use kahu_common::openai::{CompletionService, OpenAiClientError};

use crate::classifier;
use crate::error::{AppError, InterpreterFailure};
use crate::model::{
    Candidate, Domain, IntentSource, PersonaResponse, StructuredIntent, SubjectProfile, Tone,
};
use crate::sanitizer;
use crate::vocab;

/// The interpreter's output plus where it came from.
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub intent: StructuredIntent,
    pub source: IntentSource,
}

#[derive(Clone)]
pub struct QueryInterpreter {
    service: Arc<dyn CompletionService>,
    timeout: Duration,
}

impl QueryInterpreter {
    pub fn new(service: Arc<dyn CompletionService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub async fn interpret<C: Candidate>(
        &self,
        query: &str,
        domain: Domain,
        candidates: &[C],
        profile: Option<&SubjectProfile>,
        history: &[ConversationTurn],
    ) -> Result<Interpretation, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("query must not be empty".to_string()));
        }

        let (mut intent, source) = match self
            .interpret_remote(query, domain, candidates, profile, history)
            .await
        {
            Ok(intent) => (intent, IntentSource::Remote),
            Err(failure) => {
                warn!(domain = domain.as_str(), error = %failure, "remote interpretation failed, using keyword classifier");
                (classifier::classify(query, domain, profile), IntentSource::LocalFallback)
            }
        };

        match domain {
            Domain::PetRecommendations => {
                if let Some(profile) = profile {
                    bind_subject(&mut intent, profile, query);
                }
            }
            Domain::Dishes => intent.persona_response = None,
        }

        info!(
            domain = domain.as_str(),
            source = ?source,
            issues = intent.issues.len(),
            result_types = intent.result_type_filters.len(),
            explicit_ids = intent.explicit_ids.len(),
            "query interpreted"
        );
        Ok(Interpretation { intent, source })
    }

    async fn interpret_remote<C: Candidate>(
        &self,
        query: &str,
        domain: Domain,
        candidates: &[C],
        profile: Option<&SubjectProfile>,
        history: &[ConversationTurn],
    ) -> Result<StructuredIntent, InterpreterFailure> {
        let system_prompt = build_system_prompt(domain, candidates, profile);
        let raw = tokio::time::timeout(
            self.timeout,
            self.service.complete(&system_prompt, history, query),
        )
        .await
        .map_err(|_| OpenAiClientError::Timeout(self.timeout))??;

        let parsed = sanitizer::repair(&raw)
            .map_err(|e| InterpreterFailure::UnrecoverableFormat(e.to_string()))?;
        Ok(coerce_intent(&parsed))
    }
}

/// A registered pet always speaks as itself: name and species come from the profile, and a
/// templated message fills in when the remote reply had none.
fn bind_subject(intent: &mut StructuredIntent, profile: &SubjectProfile, query: &str) {
    let persona = intent
        .persona_response
        .get_or_insert_with(PersonaResponse::default);
    persona.has_subject = true;
    persona.subject_name = profile.name.clone();
    persona.subject_category = profile.species.clone();

    if persona.message.trim().is_empty() {
        let templated = classifier::persona_for(
            classifier::primary_topic(query),
            vocab::canonical_species(&profile.species),
            Some(profile),
            &[],
        );
        persona.message = templated.message;
        persona.tone = templated.tone;
    }
}

pub fn build_system_prompt<C: Candidate>(
    domain: Domain,
    candidates: &[C],
    profile: Option<&SubjectProfile>,
) -> String {
    let mut prompt = String::new();
    match domain {
        Domain::PetRecommendations => prompt.push_str(
            "You are Kahupet's pet care assistant. Read the owner's message and classify it so \
recommendations can be filtered. Spanish and English messages are both expected.\n\
Reply with ONE JSON object and nothing else:\n\
{\"subjectCharacteristics\": [species, breed, age band, ...],\n \
\"issues\": [short problem descriptions, e.g. \"ladridos excesivos\"],\n \
\"resultTypeFilters\": [any of \"training\", \"nutrition\", \"wellness\"],\n \
\"explicitIds\": [ids from the candidate list that clearly answer the message],\n \
\"personaResponse\": {\"hasSubject\": bool, \"subjectName\": string, \"subjectCategory\": string,\n  \
\"message\": first-person message from the pet to its owner, 2-3 short paragraphs,\n  \
\"tone\": one of happy|playful|worried|curious|calm|sad|excited|neutral}}\n\
Set hasSubject to true only when the message is about the owner's own pet.\n",
        ),
        Domain::Dishes => prompt.push_str(
            "You are Komi's food ordering assistant. Read the customer's message and classify it \
so dishes can be filtered.\n\
Reply with ONE JSON object and nothing else:\n\
{\"subjectCharacteristics\": [cuisines or preferences, e.g. \"italiana\"],\n \
\"issues\": [dietary needs or cravings, e.g. \"vegano\", \"picante\"],\n \
\"resultTypeFilters\": [courses: \"entrada\", \"principal\", \"postre\", \"bebida\"],\n \
\"explicitIds\": [ids from the candidate list that clearly answer the message]}\n",
        ),
    }

    if let Some(profile) = profile {
        prompt.push_str("\nRegistered pet (the message is about this pet):\n");
        prompt.push_str(&format!(
            "name={} | species={} | breed={}",
            profile.name, profile.species, profile.breed
        ));
        if let Some(age) = &profile.age {
            prompt.push_str(&format!(" | age={age}"));
        }
        if let Some(weight) = profile.weight {
            prompt.push_str(&format!(" | weight={weight}kg"));
        }
        if let Some(gender) = &profile.gender {
            prompt.push_str(&format!(" | gender={gender}"));
        }
        if let Some(notes) = &profile.notes {
            prompt.push_str(&format!(" | notes={notes}"));
        }
        prompt.push('\n');
    }

    if !candidates.is_empty() {
        prompt.push_str("\nCandidates:\n");
        for candidate in candidates {
            prompt.push_str(&candidate.context_line());
            prompt.push('\n');
        }
    }
    prompt
}

/// Convert an untrusted JSON object into a typed intent. Wrong types become defaults.
pub fn coerce_intent(obj: &Map<String, Value>) -> StructuredIntent {
    StructuredIntent {
        subject_characteristics: string_array(field(obj, &["subjectCharacteristics", "subject_characteristics"])),
        issues: string_array(field(obj, &["issues"])),
        result_type_filters: string_array(field(obj, &["resultTypeFilters", "result_type_filters"])),
        explicit_ids: string_array(field(obj, &["explicitIds", "explicit_ids"])),
        persona_response: field(obj, &["personaResponse", "persona_response"])
            .and_then(Value::as_object)
            .map(coerce_persona),
    }
}

fn coerce_persona(obj: &Map<String, Value>) -> PersonaResponse {
    PersonaResponse {
        has_subject: field(obj, &["hasSubject", "has_subject"])
            .and_then(Value::as_bool)
            .unwrap_or(false),
        subject_name: string_field(field(obj, &["subjectName", "subject_name"])),
        subject_category: string_field(field(obj, &["subjectCategory", "subject_category"])),
        message: string_field(field(obj, &["message"])),
        tone: field(obj, &["tone"])
            .and_then(Value::as_str)
            .and_then(Tone::from_label)
            .unwrap_or_default(),
    }
}

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| obj.get(*name))
}

fn string_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Strings are kept, numbers stringified, everything else dropped.
fn string_array(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use kahu_common::conversation::TurnRole;

    use super::*;
    use crate::model::PetRecommendation;

    struct FixedReply(String);

    #[async_trait]
    impl CompletionService for FixedReply {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[ConversationTurn],
            _user_message: &str,
        ) -> Result<String, OpenAiClientError> {
            Ok(self.0.clone())
        }
    }

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

    struct Slow;

    #[async_trait]
    impl CompletionService for Slow {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[ConversationTurn],
            _user_message: &str,
        ) -> Result<String, OpenAiClientError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".to_string())
        }
    }

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, Vec<ConversationTurn>, String)>>,
    }

    #[async_trait]
    impl CompletionService for Recording {
        async fn complete(
            &self,
            system_prompt: &str,
            history: &[ConversationTurn],
            user_message: &str,
        ) -> Result<String, OpenAiClientError> {
            self.calls.lock().expect("lock").push((
                system_prompt.to_string(),
                history.to_vec(),
                user_message.to_string(),
            ));
            Ok(r#"{"issues": ["x"]}"#.to_string())
        }
    }

    fn interpreter(service: impl CompletionService + 'static) -> QueryInterpreter {
        QueryInterpreter::new(Arc::new(service), Duration::from_millis(200))
    }

    fn toby() -> SubjectProfile {
        SubjectProfile {
            id: "pet-2".to_string(),
            name: "Toby".to_string(),
            species: "perro".to_string(),
            breed: "beagle".to_string(),
            age: None,
            weight: Some(12.0),
            gender: None,
            notes: Some("alérgico al pollo".to_string()),
        }
    }

    fn recs() -> Vec<PetRecommendation> {
        vec![PetRecommendation {
            id: "rec-1".to_string(),
            title: "Refuerzo positivo".to_string(),
            description: "Premia el silencio".to_string(),
            animal_type: Some("dog".to_string()),
            breed: None,
            rec_type: Some("training".to_string()),
            tags: vec!["ladridos".to_string()],
            difficulty: None,
            duration: None,
        }]
    }

    #[tokio::test]
    async fn empty_query_is_invalid_input() {
        let result = interpreter(Unreachable)
            .interpret::<PetRecommendation>("   ", Domain::PetRecommendations, &[], None, &[])
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn unreachable_remote_uses_keyword_classifier() {
        let out = interpreter(Unreachable)
            .interpret::<PetRecommendation>(
                "Mi golden retriever ladra mucho",
                Domain::PetRecommendations,
                &[],
                None,
                &[],
            )
            .await
            .expect("interpret");
        assert_eq!(out.source, IntentSource::LocalFallback);
        assert_eq!(out.intent.result_type_filters, vec!["training"]);
        assert!(out
            .intent
            .subject_characteristics
            .contains(&"golden retriever".to_string()));
        assert!(out.intent.has_subject());
    }

    #[tokio::test]
    async fn prose_wrapped_reply_is_parsed_with_defaults() {
        let reply = "Here is the result: {\"issues\": [\"x\"]}\nThanks!".to_string();
        let out = interpreter(FixedReply(reply))
            .interpret("algo", Domain::PetRecommendations, &recs(), None, &[])
            .await
            .expect("interpret");
        assert_eq!(out.source, IntentSource::Remote);
        assert_eq!(out.intent.issues, vec!["x"]);
        assert!(out.intent.subject_characteristics.is_empty());
        assert!(out.intent.result_type_filters.is_empty());
        assert!(out.intent.explicit_ids.is_empty());
        assert!(out.intent.persona_response.is_none());
    }

    #[tokio::test]
    async fn raw_newline_in_message_is_repaired() {
        let reply = "{\"personaResponse\": {\"hasSubject\": true, \"message\": \"Hola\nsoy yo\", \"tone\": \"feliz\"}}";
        let out = interpreter(FixedReply(reply.to_string()))
            .interpret("hola", Domain::PetRecommendations, &recs(), None, &[])
            .await
            .expect("interpret");
        let persona = out.intent.persona_response.expect("persona");
        assert_eq!(persona.message, "Hola\nsoy yo");
        assert_eq!(persona.tone, Tone::Happy);
    }

    #[tokio::test]
    async fn malformed_fields_are_coerced_to_declared_types() {
        let reply = r#"{
            "subjectCharacteristics": [1, "perro", null, {"x": 1}, ""],
            "issues": "ladridos",
            "resultTypeFilters": {"training": true},
            "explicitIds": [42],
            "personaResponse": {"hasSubject": "yes", "subjectName": 7, "message": ["a"], "tone": 3}
        }"#;
        let out = interpreter(FixedReply(reply.to_string()))
            .interpret("ladra", Domain::PetRecommendations, &recs(), None, &[])
            .await
            .expect("interpret");
        assert_eq!(out.source, IntentSource::Remote);
        assert_eq!(out.intent.subject_characteristics, vec!["1", "perro"]);
        assert!(out.intent.issues.is_empty());
        assert!(out.intent.result_type_filters.is_empty());
        assert_eq!(out.intent.explicit_ids, vec!["42"]);
        let persona = out.intent.persona_response.expect("persona");
        assert!(!persona.has_subject);
        assert_eq!(persona.subject_name, "");
        assert_eq!(persona.message, "");
        assert_eq!(persona.tone, Tone::Neutral);
    }

    #[tokio::test]
    async fn unrepairable_reply_falls_back() {
        let out = interpreter(FixedReply("lo siento, no puedo ayudar".to_string()))
            .interpret("mi gato no come", Domain::PetRecommendations, &recs(), None, &[])
            .await
            .expect("interpret");
        assert_eq!(out.source, IntentSource::LocalFallback);
        assert_eq!(out.intent.result_type_filters, vec!["nutrition"]);
    }

    #[tokio::test]
    async fn slow_remote_times_out_into_fallback() {
        let out = interpreter(Slow)
            .interpret("mi perro no duerme", Domain::PetRecommendations, &recs(), None, &[])
            .await
            .expect("interpret");
        assert_eq!(out.source, IntentSource::LocalFallback);
        assert_eq!(out.intent.issues, vec!["sueño"]);
    }

    #[tokio::test]
    async fn profile_forces_subject_even_when_remote_denies_it() {
        let reply = r#"{"issues": ["ladridos"], "personaResponse": {"hasSubject": false, "subjectName": "Rex", "subjectCategory": "gato"}}"#;
        let out = interpreter(FixedReply(reply.to_string()))
            .interpret("ladra toda la noche", Domain::PetRecommendations, &recs(), Some(&toby()), &[])
            .await
            .expect("interpret");
        let persona = out.intent.persona_response.expect("persona");
        assert!(persona.has_subject);
        assert_eq!(persona.subject_name, "Toby");
        assert_eq!(persona.subject_category, "perro");
        assert!(persona.message.contains("Soy Toby"));
        assert_eq!(persona.tone, Tone::Excited);
    }

    #[tokio::test]
    async fn prompt_carries_context_and_history_is_forwarded_in_order() {
        let service = Arc::new(Recording::default());
        let interpreter = QueryInterpreter::new(service.clone(), Duration::from_secs(1));
        let history = vec![
            ConversationTurn::user("mi perro ladra"),
            ConversationTurn::assistant("¿A qué hora?"),
        ];
        interpreter
            .interpret("  de noche ", Domain::PetRecommendations, &recs(), Some(&toby()), &history)
            .await
            .expect("interpret");

        let calls = service.calls.lock().expect("lock");
        let (prompt, sent_history, user) = &calls[0];
        assert!(prompt.contains("id=rec-1"));
        assert!(prompt.contains("name=Toby | species=perro | breed=beagle"));
        assert!(prompt.contains("notes=alérgico al pollo"));
        assert_eq!(sent_history.len(), 2);
        assert_eq!(sent_history[0].role, TurnRole::User);
        assert_eq!(sent_history[1].text, "¿A qué hora?");
        assert_eq!(user, "de noche");
    }

    #[tokio::test]
    async fn dish_domain_never_carries_a_persona() {
        let reply = r#"{"resultTypeFilters": ["postre"], "personaResponse": {"hasSubject": true}}"#;
        let out = interpreter(FixedReply(reply.to_string()))
            .interpret::<PetRecommendation>("un postre", Domain::Dishes, &[], None, &[])
            .await
            .expect("interpret");
        assert!(out.intent.persona_response.is_none());
        assert_eq!(out.intent.result_type_filters, vec!["postre"]);
    }
}
