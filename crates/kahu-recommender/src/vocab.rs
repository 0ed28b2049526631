/// Shared vocabulary: text folding plus the species, breed and result-type tables used by
/// the classifier, the filter engine and the summary.
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, strip accents and trim, so "Perro", "perro " and "PÉRRO" compare equal.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Alphanumeric words of already-folded text.
pub fn tokens(folded: &str) -> impl Iterator<Item = &str> {
    folded.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

/// Two folded phrases overlap when every word of one starts some word of the other, so
/// "ladridos" overlaps "ladridos excesivos" but "aseo" does not overlap "paseo".
pub fn phrases_overlap(a: &str, b: &str) -> bool {
    let a: Vec<&str> = tokens(a).collect();
    let b: Vec<&str> = tokens(b).collect();
    let covers = |words: &[&str], within: &[&str]| {
        !words.is_empty() && words.iter().all(|w| within.iter().any(|t| t.starts_with(w)))
    };
    covers(&a, &b) || covers(&b, &a)
}

/// (canonical species, Spanish display word, folded synonyms).
const SPECIES: &[(&str, &str, &[&str])] = &[
    (
        "dog",
        "perro",
        &["dog", "dogs", "puppy", "perro", "perra", "perros", "perrito", "perrita", "cachorro", "cachorra", "canino"],
    ),
    (
        "cat",
        "gato",
        &["cat", "cats", "kitten", "gato", "gata", "gatos", "gatito", "gatita", "felino", "minino"],
    ),
    ("bird", "ave", &["bird", "ave", "pajaro", "loro", "perico", "canario"]),
    ("rabbit", "conejo", &["rabbit", "bunny", "conejo", "coneja", "conejito"]),
    ("fish", "pez", &["fish", "pez", "peces", "pececito"]),
    ("hamster", "hámster", &["hamster", "cuyo", "cobaya"]),
];

/// (folded breed name, canonical species).
const BREEDS: &[(&str, &str)] = &[
    ("golden retriever", "dog"),
    ("labrador", "dog"),
    ("pastor aleman", "dog"),
    ("german shepherd", "dog"),
    ("bulldog", "dog"),
    ("chihuahua", "dog"),
    ("poodle", "dog"),
    ("caniche", "dog"),
    ("beagle", "dog"),
    ("husky", "dog"),
    ("yorkshire", "dog"),
    ("schnauzer", "dog"),
    ("pug", "dog"),
    ("dalmata", "dog"),
    ("border collie", "dog"),
    ("salchicha", "dog"),
    ("siames", "cat"),
    ("persa", "cat"),
    ("maine coon", "cat"),
    ("bengali", "cat"),
    ("sphynx", "cat"),
    ("ragdoll", "cat"),
];

/// Canonical species for a species word or a known breed name.
pub fn canonical_species(word: &str) -> Option<&'static str> {
    let folded = fold(word);
    if folded.is_empty() {
        return None;
    }
    SPECIES
        .iter()
        .find(|(canonical, _, synonyms)| *canonical == folded || synonyms.contains(&folded.as_str()))
        .map(|(canonical, _, _)| *canonical)
        .or_else(|| {
            BREEDS
                .iter()
                .find(|(breed, _)| *breed == folded)
                .map(|(_, species)| *species)
        })
}

/// Spanish display word for a canonical species.
pub fn species_label(canonical: &str) -> &str {
    SPECIES
        .iter()
        .find(|(c, _, _)| *c == canonical)
        .map(|(_, label, _)| *label)
        .unwrap_or(canonical)
}

/// Species words mentioned in already-folded text, as (word, canonical species), in table order.
pub fn species_mentions(folded_text: &str) -> Vec<(&'static str, &'static str)> {
    let words: Vec<&str> = tokens(folded_text).collect();
    let mut found = Vec::new();
    for (canonical, _, synonyms) in SPECIES {
        if let Some(word) = synonyms.iter().find(|s| words.contains(*s)) {
            found.push((*word, *canonical));
        }
    }
    found
}

/// Known breeds mentioned in already-folded text, as (breed, canonical species).
pub fn breed_mentions(folded_text: &str) -> Vec<(&'static str, &'static str)> {
    BREEDS
        .iter()
        .filter(|(breed, _)| folded_text.contains(breed))
        .copied()
        .collect()
}

pub const TRAINING: &str = "training";
pub const NUTRITION: &str = "nutrition";
pub const WELLNESS: &str = "wellness";

/// Map result-type words onto their canonical value. Pet care types collapse to
/// training/nutrition/wellness, dish courses to entrada/principal/postre/bebida; anything
/// else is returned folded.
pub fn canonical_result_type(value: &str) -> String {
    let folded = fold(value);
    let canonical = match folded.as_str() {
        "training" | "entrenamiento" | "adiestramiento" | "comportamiento" | "behavior" | "behaviour" => TRAINING,
        "nutrition" | "nutricion" | "alimentacion" | "feeding" | "diet" | "dieta" => NUTRITION,
        "wellness" | "bienestar" | "salud" | "health" | "cuidado" | "care" => WELLNESS,
        "entrada" | "entradas" | "entrante" | "aperitivo" | "starter" | "appetizer" => "entrada",
        "principal" | "plato fuerte" | "plato principal" | "fuerte" | "main" => "principal",
        "postre" | "postres" | "dessert" => "postre",
        "bebida" | "bebidas" | "drink" | "drinks" => "bebida",
        _ => return folded,
    };
    canonical.to_string()
}

/// Display label and emoji for a canonical result type.
pub fn result_type_label(canonical: &str) -> (&str, &'static str) {
    match canonical {
        TRAINING => ("entrenamiento", "🎓"),
        NUTRITION => ("nutrición", "🍖"),
        WELLNESS => ("bienestar", "💚"),
        "entrada" => ("entradas", "🥗"),
        "principal" => ("platos principales", "🍽️"),
        "postre" => ("postres", "🍰"),
        "bebida" => ("bebidas", "🥤"),
        other => (other, "✨"),
    }
}
