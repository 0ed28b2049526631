/// One-sentence synopsis of a recommendation result. Pure.
use crate::model::{Domain, StructuredIntent};
use crate::vocab;

pub fn compose(domain: Domain, intent: &StructuredIntent, result_count: usize) -> String {
    if result_count == 0 {
        return match domain {
            Domain::Dishes => "🍽️ No encontré platos para tu búsqueda.".to_string(),
            Domain::PetRecommendations => "No encontré recomendaciones para tu búsqueda.".to_string(),
        };
    }
    match domain {
        Domain::Dishes => dish_summary(intent, result_count),
        Domain::PetRecommendations => match &intent.persona_response {
            Some(persona) if persona.has_subject => {
                let name = if persona.subject_name.trim().is_empty() {
                    "tu mascota"
                } else {
                    persona.subject_name.trim()
                };
                persona_summary(name, persona.tone.emoji(), intent, result_count)
            }
            _ => generic_pet_summary(intent, result_count),
        },
    }
}

fn persona_summary(name: &str, tone_emoji: &str, intent: &StructuredIntent, count: usize) -> String {
    let (label, emoji) = intent
        .result_type_filters
        .first()
        .map(|t| {
            let canonical = vocab::canonical_result_type(t);
            let (label, emoji) = vocab::result_type_label(&canonical);
            (label.to_string(), emoji)
        })
        .unwrap_or_else(|| ("cuidado general".to_string(), "💚"));

    let mut line = format!(
        "{tone_emoji} Para {name}: {} de {emoji} {label}",
        count_phrase(count, "recomendación", "recomendaciones")
    );
    let issues = dominant_issues(&intent.issues);
    if !issues.is_empty() {
        line.push_str(&format!(" sobre {issues}"));
    }
    line.push('.');
    line
}

fn generic_pet_summary(intent: &StructuredIntent, count: usize) -> String {
    if !intent.has_criteria() {
        return format!(
            "Encontré {} de bienestar general para tu mascota.",
            count_phrase(count, "recomendación", "recomendaciones")
        );
    }

    let species = intent
        .subject_characteristics
        .iter()
        .find_map(|c| vocab::canonical_species(c).filter(|_| is_species_word(c)))
        .map(vocab::species_label);
    let descriptors: Vec<&str> = intent
        .subject_characteristics
        .iter()
        .filter(|c| !is_species_word(c))
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    let mut line = format!(
        "Encontré {}",
        count_phrase(count, "recomendación", "recomendaciones")
    );
    match (species, descriptors.is_empty()) {
        (Some(species), true) => line.push_str(&format!(" para {species}")),
        (Some(species), false) => line.push_str(&format!(" para {species} ({})", descriptors.join(", "))),
        (None, false) => line.push_str(&format!(" para {}", descriptors.join(", "))),
        (None, true) => {}
    }
    let types = type_labels(&intent.result_type_filters);
    if !types.is_empty() {
        line.push_str(&format!(" de {types}"));
    }
    let issues = dominant_issues(&intent.issues);
    if !issues.is_empty() {
        line.push_str(&format!(" sobre {issues}"));
    }
    line.push('.');
    line
}

fn dish_summary(intent: &StructuredIntent, count: usize) -> String {
    let plates = count_phrase(count, "plato", "platos");
    if !intent.has_criteria() {
        return format!("🍽️ Encontré {plates} recomendados del menú.");
    }

    let mut line = format!("🍽️ Encontré {plates}");
    let types = type_labels(&intent.result_type_filters);
    if !types.is_empty() {
        line.push_str(&format!(" entre {types}"));
    }
    let cuisines: Vec<&str> = intent
        .subject_characteristics
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if !cuisines.is_empty() {
        line.push_str(&format!(" de cocina {}", cuisines.join(" y ")));
    }
    if !intent.issues.is_empty() {
        line.push_str(&format!(" ({})", intent.issues.join(", ")));
    }
    line.push('.');
    line
}

fn count_phrase(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {plural}")
    }
}

fn is_species_word(text: &str) -> bool {
    let folded = vocab::fold(text);
    !folded.contains(' ') && !vocab::species_mentions(&folded).is_empty()
}

/// Labels with emoji for the distinct canonical result types, in first-seen order.
fn type_labels(filters: &[String]) -> String {
    let mut seen: Vec<String> = Vec::new();
    for filter in filters {
        let canonical = vocab::canonical_result_type(filter);
        if !canonical.is_empty() && !seen.contains(&canonical) {
            seen.push(canonical);
        }
    }
    seen.iter()
        .map(|t| {
            let (label, emoji) = vocab::result_type_label(t);
            format!("{emoji} {label}")
        })
        .collect::<Vec<_>>()
        .join(" y ")
}

/// The first two issues, joined for a sentence.
fn dominant_issues(issues: &[String]) -> String {
    issues
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join(" y ")
}
