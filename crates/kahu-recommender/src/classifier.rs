/// Local keyword classifier: a deterministic stand-in for the remote interpreter.
///
/// The query is folded (lowercase, no accents) and tokenized. A single-word keyword matches
/// when it is a prefix of some token ("ladr" matches "ladra", "ladridos"); a multi-word
/// keyword matches as a substring of the folded query. Stems listed in `WHOLE_WORDS` only
/// match a token exactly.
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Domain, PersonaResponse, StructuredIntent, SubjectProfile};
use crate::persona::{self, PersonaVars, SpeciesKind, Topic};
use crate::vocab::{self, NUTRITION, TRAINING, WELLNESS};

struct Bucket {
    topic: Topic,
    keywords: &'static [&'static str],
    issue: &'static str,
    /// Narrower issues emitted when a specific keyword matches.
    specific: &'static [(&'static str, &'static str)],
    result_type: &'static str,
}

static POSSESSIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(mi|mis|my|our|nuestro|nuestra|nuestros|nuestras)\b").expect("valid regex")
});

/// Keywords whose prefix reading collides with unrelated words ("muda" vs "mudanza").
const WHOLE_WORDS: &[&str] = &["muda", "vet"];

/// Pet care buckets. Order is priority order for persona selection.
const PET_BUCKETS: &[Bucket] = &[
    Bucket {
        topic: Topic::Feeding,
        keywords: &[
            "come", "comid", "aliment", "apetito", "dieta", "peso", "gord", "flac", "hambre",
            "croqueta", "pienso", "eat", "food", "diet", "weight",
        ],
        issue: "alimentación",
        specific: &[("apetito", "falta de apetito"), ("gord", "sobrepeso"), ("peso", "control de peso")],
        result_type: NUTRITION,
    },
    Bucket {
        topic: Topic::Behavior,
        keywords: &[
            "ladr", "maull", "muerde", "mord", "agresiv", "destru", "rasgun", "arana", "grun",
            "bark", "meow", "bite", "aggressive",
        ],
        issue: "comportamiento",
        specific: &[
            ("ladr", "ladridos excesivos"),
            ("bark", "ladridos excesivos"),
            ("maull", "maullidos"),
            ("meow", "maullidos"),
            ("muerde", "mordidas"),
            ("mord", "mordidas"),
            ("agresiv", "agresividad"),
            ("destru", "conducta destructiva"),
        ],
        result_type: TRAINING,
    },
    Bucket {
        topic: Topic::Health,
        keywords: &[
            "enferm", "vomit", "diarrea", "fiebre", "veterinari", "dolor", "cojea", "herida",
            "pulga", "garrapata", "sick", "pain", "vet",
        ],
        issue: "salud",
        specific: &[
            ("vomit", "vómitos"),
            ("diarrea", "problemas digestivos"),
            ("pulga", "parásitos"),
            ("garrapata", "parásitos"),
        ],
        result_type: WELLNESS,
    },
    Bucket {
        topic: Topic::Mood,
        keywords: &[
            "triste", "deprimid", "ansie", "ansios", "estres", "miedo", "nervios", "sad",
            "anxious", "anxiety", "stress", "scared",
        ],
        issue: "ansiedad",
        specific: &[("miedo", "miedos"), ("triste", "tristeza"), ("estres", "estrés")],
        result_type: WELLNESS,
    },
    Bucket {
        topic: Topic::Exercise,
        keywords: &[
            "ejercicio", "paseo", "pasea", "camina", "jug", "energi", "activ", "exercise", "walk", "play",
        ],
        issue: "ejercicio",
        specific: &[("energi", "exceso de energía")],
        result_type: WELLNESS,
    },
    Bucket {
        topic: Topic::Training,
        keywords: &[
            "entren", "ensen", "obedec", "obedien", "truco", "comando", "adiestr", "train",
            "obey", "trick",
        ],
        issue: "obediencia",
        specific: &[("truco", "trucos")],
        result_type: TRAINING,
    },
    Bucket {
        topic: Topic::Hygiene,
        keywords: &["arenero", "arena", "orina", "pipi", "popo", "sus necesidades", "litter", "pee", "potty"],
        issue: "higiene",
        specific: &[("arenero", "arenero"), ("arena", "arenero"), ("orina", "marcaje")],
        result_type: TRAINING,
    },
    Bucket {
        topic: Topic::Grooming,
        keywords: &["bano", "banar", "pelaje", "cae el pelo", "pierde pelo", "cepill", "muda", "groom", "brush", "bath", "shed"],
        issue: "aseo",
        specific: &[("cepill", "cepillado"), ("muda", "muda de pelo")],
        result_type: WELLNESS,
    },
    Bucket {
        topic: Topic::Sleep,
        keywords: &["duerm", "dormir", "sueno", "descans", "insomn", "sleep"],
        issue: "sueño",
        specific: &[],
        result_type: WELLNESS,
    },
];

/// (keywords, canonical course).
const DISH_COURSES: &[(&[&str], &str)] = &[
    (&["entrada", "entrante", "aperitivo", "botana", "starter", "appetizer"], "entrada"),
    (&["principal", "plato fuerte", "comida fuerte", "main"], "principal"),
    (&["postre", "dulce", "pastel", "dessert"], "postre"),
    (&["bebida", "tomar", "refresco", "jugo", "cafe", "cerveza", "vino", "drink"], "bebida"),
];

/// (keywords, cuisine).
const DISH_CUISINES: &[(&[&str], &str)] = &[
    (&["italian", "pasta", "pizza", "risotto"], "italiana"),
    (&["mexican", "taco", "burrito", "quesadilla"], "mexicana"),
    (&["japones", "japanese", "sushi", "ramen"], "japonesa"),
    (&["chin", "wok"], "china"),
    (&["peruan", "ceviche"], "peruana"),
    (&["american", "hamburguesa", "burger"], "americana"),
];

/// (keywords, dietary issue).
const DISH_DIETARY: &[(&[&str], &str)] = &[
    (&["vegetarian"], "vegetariano"),
    (&["vegan"], "vegano"),
    (&["sin gluten", "celiac", "gluten free"], "sin gluten"),
    (&["sin lactosa", "lactose"], "sin lactosa"),
    (&["picant", "spicy", "enchilad"], "picante"),
    (&["saludable", "ligero", "light", "healthy"], "saludable"),
];

/// Derive an intent from the query text alone.
pub fn classify(query: &str, domain: Domain, profile: Option<&SubjectProfile>) -> StructuredIntent {
    match domain {
        Domain::PetRecommendations => classify_pet_query(query, profile),
        Domain::Dishes => classify_dish_query(query),
    }
}

struct QueryText {
    folded: String,
    tokens: Vec<String>,
}

impl QueryText {
    fn new(query: &str) -> Self {
        let folded = vocab::fold(query);
        let tokens = vocab::tokens(&folded).map(str::to_string).collect();
        Self { folded, tokens }
    }

    fn matches(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            self.folded.contains(keyword)
        } else if WHOLE_WORDS.contains(&keyword) {
            self.tokens.iter().any(|t| t == keyword)
        } else {
            self.tokens.iter().any(|t| t.starts_with(keyword))
        }
    }

    fn matches_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.matches(k))
    }
}

fn classify_pet_query(query: &str, profile: Option<&SubjectProfile>) -> StructuredIntent {
    let text = QueryText::new(query);
    let mut intent = StructuredIntent::default();
    let mut first_topic = None;

    for bucket in PET_BUCKETS {
        if !text.matches_any(bucket.keywords) {
            continue;
        }
        first_topic.get_or_insert(bucket.topic);
        push_unique(&mut intent.issues, bucket.issue);
        for (keyword, issue) in bucket.specific {
            if text.matches(keyword) {
                push_unique(&mut intent.issues, issue);
            }
        }
        push_unique(&mut intent.result_type_filters, bucket.result_type);
    }

    let breeds = vocab::breed_mentions(&text.folded);
    let species = vocab::species_mentions(&text.folded);

    if let Some(profile) = profile {
        push_unique(&mut intent.subject_characteristics, &profile.species);
        push_unique(&mut intent.subject_characteristics, &profile.breed);
        if let Some(age) = &profile.age {
            push_unique(&mut intent.subject_characteristics, age);
        }
    } else {
        for (breed, canonical) in &breeds {
            push_unique(&mut intent.subject_characteristics, breed);
            push_unique(&mut intent.subject_characteristics, vocab::species_label(canonical));
        }
        for (word, _) in &species {
            push_unique(&mut intent.subject_characteristics, word);
        }
    }

    let mentions_animal = !breeds.is_empty() || !species.is_empty();
    if profile.is_some() || (mentions_animal && has_possessive(&text.folded)) {
        let canonical = profile
            .and_then(|p| vocab::canonical_species(&p.species))
            .or_else(|| breeds.first().map(|(_, s)| *s))
            .or_else(|| species.first().map(|(_, s)| *s));
        intent.persona_response = Some(persona_for(first_topic, canonical, profile, &breeds));
    }

    intent
}

/// Persona payload for the fallback path. The tone always comes from the template table.
pub fn persona_for(
    topic: Option<Topic>,
    canonical_species: Option<&str>,
    profile: Option<&SubjectProfile>,
    breeds: &[(&str, &str)],
) -> PersonaResponse {
    let species_word = canonical_species
        .map(|s| vocab::species_label(s).to_string())
        .or_else(|| profile.map(|p| p.species.clone()))
        .unwrap_or_default();
    let vars = PersonaVars {
        name: profile.map(|p| p.name.clone()).unwrap_or_default(),
        species: species_word.clone(),
        breed: profile
            .map(|p| p.breed.clone())
            .or_else(|| breeds.first().map(|(b, _)| b.to_string()))
            .unwrap_or_default(),
        age: profile.and_then(|p| p.age.clone()),
    };
    let (message, tone) = persona::render(topic, SpeciesKind::from_canonical(canonical_species), &vars);

    PersonaResponse {
        has_subject: true,
        subject_name: vars.name,
        subject_category: profile.map(|p| p.species.clone()).unwrap_or(species_word),
        message,
        tone,
    }
}

/// First topic bucket the query falls into, if any.
pub fn primary_topic(query: &str) -> Option<Topic> {
    let text = QueryText::new(query);
    PET_BUCKETS
        .iter()
        .find(|b| text.matches_any(b.keywords))
        .map(|b| b.topic)
}

fn has_possessive(folded: &str) -> bool {
    POSSESSIVE_RE.is_match(folded)
}

fn classify_dish_query(query: &str) -> StructuredIntent {
    let text = QueryText::new(query);
    let mut intent = StructuredIntent::default();

    for (keywords, course) in DISH_COURSES {
        if text.matches_any(keywords) {
            push_unique(&mut intent.result_type_filters, course);
        }
    }
    for (keywords, cuisine) in DISH_CUISINES {
        if text.matches_any(keywords) {
            push_unique(&mut intent.subject_characteristics, cuisine);
        }
    }
    for (keywords, diet) in DISH_DIETARY {
        if text.matches_any(keywords) {
            push_unique(&mut intent.issues, diet);
        }
    }
    intent
}

/// Append unless an entry with the same folded text is already present.
fn push_unique(values: &mut Vec<String>, value: &str) {
    let folded = vocab::fold(value);
    if folded.is_empty() || values.iter().any(|v| vocab::fold(v) == folded) {
        return;
    }
    values.push(value.trim().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tone;

    fn luna() -> SubjectProfile {
        SubjectProfile {
            id: "pet-1".to_string(),
            name: "Luna".to_string(),
            species: "gato".to_string(),
            breed: "siamés".to_string(),
            age: Some("2 años".to_string()),
            weight: Some(4.1),
            gender: Some("hembra".to_string()),
            notes: None,
        }
    }

    #[test]
    fn barking_golden_retriever_falls_into_training() {
        let intent = classify("Mi golden retriever ladra mucho", Domain::PetRecommendations, None);
        assert_eq!(intent.result_type_filters, vec!["training"]);
        assert!(intent.subject_characteristics.contains(&"golden retriever".to_string()));
        assert!(intent.subject_characteristics.contains(&"perro".to_string()));
        assert!(intent.issues.contains(&"ladridos excesivos".to_string()));
        let persona = intent.persona_response.expect("persona");
        assert!(persona.has_subject);
        assert_eq!(persona.tone, Tone::Excited);
        assert!(persona.message.contains("golden retriever"));
    }

    #[test]
    fn profile_is_injected_even_without_keywords() {
        let intent = classify("hola, ¿qué tal?", Domain::PetRecommendations, Some(&luna()));
        assert_eq!(intent.subject_characteristics, vec!["gato", "siamés", "2 años"]);
        assert!(intent.issues.is_empty());
        let persona = intent.persona_response.expect("persona");
        assert!(persona.has_subject);
        assert_eq!(persona.subject_name, "Luna");
        assert_eq!(persona.subject_category, "gato");
        assert_eq!(persona.tone, Tone::Neutral);
        assert!(persona.message.contains("Soy Luna y tengo 2 años"));
    }

    #[test]
    fn multiple_buckets_keep_priority_order_and_dedupe_types() {
        let intent = classify(
            "mi perro no come y esta triste, ademas vomita",
            Domain::PetRecommendations,
            None,
        );
        assert_eq!(intent.result_type_filters, vec!["nutrition", "wellness"]);
        assert_eq!(intent.issues[0], "alimentación");
        assert!(intent.issues.contains(&"vómitos".to_string()));
        assert!(intent.issues.contains(&"tristeza".to_string()));
        assert_eq!(intent.persona_response.expect("persona").tone, Tone::Worried);
    }

    #[test]
    fn no_possessive_means_no_persona() {
        let intent = classify("como entrenar a un perro", Domain::PetRecommendations, None);
        assert!(intent.persona_response.is_none());
        assert_eq!(intent.result_type_filters, vec!["training"]);
        assert_eq!(intent.subject_characteristics, vec!["perro"]);
    }

    #[test]
    fn recommendation_word_does_not_trigger_feeding() {
        assert_eq!(primary_topic("dame una recomendacion"), None);
        assert_eq!(primary_topic("mi gato no usa el arenero"), Some(Topic::Hygiene));
    }

    #[test]
    fn short_stems_do_not_match_unrelated_words() {
        let intent = classify("nos vamos de mudanza con mi perro", Domain::PetRecommendations, None);
        assert!(!intent.issues.contains(&"aseo".to_string()));
        assert_eq!(primary_topic("mi gato esta en plena muda"), Some(Topic::Grooming));

        assert_eq!(primary_topic("ya pase la tarde con mi gato"), None);
        assert_eq!(primary_topic("le encanta pasear"), Some(Topic::Exercise));
        assert_eq!(primary_topic("vete de aqui"), None);
    }

    #[test]
    fn dish_queries_map_courses_cuisines_and_diets() {
        let intent = classify(
            "Quiero un postre vegano y algo de sushi",
            Domain::Dishes,
            None,
        );
        assert_eq!(intent.result_type_filters, vec!["postre"]);
        assert_eq!(intent.subject_characteristics, vec!["japonesa"]);
        assert_eq!(intent.issues, vec!["vegano"]);
        assert!(intent.persona_response.is_none());
    }
}
