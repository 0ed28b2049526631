use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which candidate collection a request is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    PetRecommendations,
    Dishes,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::PetRecommendations => "pet_recommendations",
            Domain::Dishes => "dishes",
        }
    }
}

/// The structural contract the filter engine works against.
///
/// `price` is only ever used to order results, never to include or exclude them.
pub trait Candidate {
    fn id(&self) -> &str;
    /// Coarse classification (species for pet care, cuisine for dishes).
    fn category(&self) -> Option<&str>;
    /// Kind of result (training/nutrition/wellness, or a dish course).
    fn result_type(&self) -> Option<&str>;
    fn tags(&self) -> &[String];
    /// Finer grouping key (breed, restaurant).
    fn secondary(&self) -> Option<&str>;
    fn description(&self) -> &str;

    fn price(&self) -> Option<f64> {
        None
    }

    /// One compact line for the interpreter's candidate context.
    fn context_line(&self) -> String {
        format!(
            "id={} | category={} | type={} | group={} | tags={} | {}",
            self.id(),
            self.category().unwrap_or("-"),
            self.result_type().unwrap_or("-"),
            self.secondary().unwrap_or("-"),
            self.tags().join(","),
            self.description(),
        )
    }
}

/// A pet care tip or routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PetRecommendation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Species this applies to, e.g. "dog", "perro", "cat".
    pub animal_type: Option<String>,
    pub breed: Option<String>,
    /// "training", "nutrition" or "wellness".
    #[serde(rename = "type")]
    pub rec_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub difficulty: Option<String>,
    pub duration: Option<String>,
}

impl Candidate for PetRecommendation {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> Option<&str> {
        self.animal_type.as_deref()
    }

    fn result_type(&self) -> Option<&str> {
        self.rec_type.as_deref()
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn secondary(&self) -> Option<&str> {
        self.breed.as_deref()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn context_line(&self) -> String {
        format!(
            "id={} | animal={} | breed={} | type={} | tags={} | {}: {}",
            self.id,
            self.animal_type.as_deref().unwrap_or("-"),
            self.breed.as_deref().unwrap_or("-"),
            self.rec_type.as_deref().unwrap_or("-"),
            self.tags.join(","),
            self.title,
            self.description,
        )
    }
}

/// A restaurant menu item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub restaurant_id: String,
    /// e.g. "italiana", "mexicana".
    pub cuisine: Option<String>,
    /// e.g. "entrada", "principal", "postre", "bebida".
    pub course: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub price: f64,
}

impl Candidate for Dish {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> Option<&str> {
        self.cuisine.as_deref()
    }

    fn result_type(&self) -> Option<&str> {
        self.course.as_deref()
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn secondary(&self) -> Option<&str> {
        Some(&self.restaurant_id)
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn price(&self) -> Option<f64> {
        Some(self.price)
    }
}

/// A registered pet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProfile {
    pub id: String,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: Option<String>,
    pub weight: Option<f64>,
    pub gender: Option<String>,
    pub notes: Option<String>,
}

/// Emotional register of a persona message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Happy,
    Playful,
    Worried,
    Curious,
    Calm,
    Sad,
    Excited,
    #[default]
    Neutral,
}

impl Tone {
    /// Parse a tone label (English or Spanish). Unknown labels are `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let tone = match crate::vocab::fold(label).as_str() {
            "happy" | "feliz" | "contento" | "alegre" => Tone::Happy,
            "playful" | "jugueton" | "juguetona" => Tone::Playful,
            "worried" | "preocupado" | "preocupada" => Tone::Worried,
            "curious" | "curioso" | "curiosa" => Tone::Curious,
            "calm" | "tranquilo" | "tranquila" | "calmado" | "calmada" => Tone::Calm,
            "sad" | "triste" => Tone::Sad,
            "excited" | "emocionado" | "emocionada" => Tone::Excited,
            "neutral" => Tone::Neutral,
            _ => return None,
        };
        Some(tone)
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Tone::Happy => "😊",
            Tone::Playful => "🐾",
            Tone::Worried => "😟",
            Tone::Curious => "🤔",
            Tone::Calm => "😌",
            Tone::Sad => "😢",
            Tone::Excited => "🤩",
            Tone::Neutral => "🙂",
        }
    }
}

/// A message voiced by a registered pet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonaResponse {
    pub has_subject: bool,
    pub subject_name: String,
    pub subject_category: String,
    pub message: String,
    pub tone: Tone,
}

/// Typed interpretation of a free-text query. Sequences are empty, never absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StructuredIntent {
    pub subject_characteristics: Vec<String>,
    pub issues: Vec<String>,
    pub result_type_filters: Vec<String>,
    pub explicit_ids: Vec<String>,
    pub persona_response: Option<PersonaResponse>,
}

impl StructuredIntent {
    pub fn has_subject(&self) -> bool {
        self.persona_response
            .as_ref()
            .is_some_and(|p| p.has_subject)
    }

    pub fn has_criteria(&self) -> bool {
        !self.subject_characteristics.is_empty()
            || !self.issues.is_empty()
            || !self.result_type_filters.is_empty()
    }
}

/// How an intent was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Remote,
    LocalFallback,
}

/// Pipeline output returned to tool callers.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse<C> {
    pub recommendations: Vec<C>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_message: Option<String>,
    pub summary: String,
    pub total: usize,
    pub interpreted_by: IntentSource,
}
