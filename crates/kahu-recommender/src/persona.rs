/// Table-driven persona messages: a pet talking to its owner in first person.
///
/// Templates are selected by `(topic, species)` and filled by explicit placeholder
/// substitution: `{intro}`, `{who}`, `{age}`.
use crate::model::Tone;

/// Topic buckets of the keyword classifier, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Feeding,
    Behavior,
    Health,
    Mood,
    Exercise,
    Training,
    Hygiene,
    Grooming,
    Sleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesKind {
    Dog,
    Cat,
    Other,
}

impl SpeciesKind {
    pub fn from_canonical(species: Option<&str>) -> Self {
        match species {
            Some("dog") => SpeciesKind::Dog,
            Some("cat") => SpeciesKind::Cat,
            _ => SpeciesKind::Other,
        }
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct PersonaVars {
    pub name: String,
    /// Spanish species word, e.g. "perro".
    pub species: String,
    pub breed: String,
    pub age: Option<String>,
}

struct Template {
    tone: Tone,
    text: &'static str,
}

const CLARIFY: Template = Template {
    tone: Tone::Neutral,
    text: "¡Hola! {intro}{age}.\n\n\
           Quiero ayudarte, pero no entendí bien qué me pasa. ¿Me cuentas un poco más? \
           Por ejemplo, si es algo de mi comida, de cómo me porto, de mi salud o de mis paseos.\n\n\
           Mientras tanto, te dejo algunas ideas generales para cuidarme.",
};

fn template(topic: Topic, species: SpeciesKind) -> Template {
    use SpeciesKind::*;
    use Topic::*;

    match (topic, species) {
        (Feeding, Dog) => Template {
            tone: Tone::Worried,
            text: "¡Guau! {intro}{age}.\n\n\
                   Últimamente la hora de comer no me emociona como antes, y eso no es normal en {who}. \
                   Revisemos juntos mi ración, los horarios y si me estás dando premios de más.\n\n\
                   Si sigo sin apetito más de un día, llévame al veterinario, ¿sí?",
        },
        (Feeding, Cat) => Template {
            tone: Tone::Worried,
            text: "Miau. {intro}{age}.\n\n\
                   Los gatos somos exigentes con la comida, pero si dejo el plato lleno algo no anda bien. \
                   Prueba porciones pequeñas varias veces al día y agua siempre fresca.\n\n\
                   Si no como en 24 horas, necesito que me vea un veterinario.",
        },
        (Feeding, Other) => Template {
            tone: Tone::Worried,
            text: "{intro}{age}.\n\n\
                   Mi alimentación me tiene un poco inquieto. Ayúdame a revisar qué como y cuánto.\n\n\
                   Aquí tienes algunas recomendaciones de nutrición pensadas para {who}.",
        },
        (Behavior, Dog) => Template {
            tone: Tone::Excited,
            text: "¡Guau guau! {intro}{age}.\n\n\
                   Ya sé que a veces ladro o me pongo intenso, pero es mi forma de decirte que algo me \
                   inquieta o que me sobra energía. Con paciencia y premios aprendo rapidísimo.\n\n\
                   Te dejo ideas de entrenamiento hechas para {who}.",
        },
        (Behavior, Cat) => Template {
            tone: Tone::Curious,
            text: "Miau, miau. {intro}{age}.\n\n\
                   Cuando maúllo mucho o araño cosas te estoy pidiendo algo: atención, juego o un lugar mío. \
                   Un rascador y rutinas claras me ayudan muchísimo.\n\n\
                   Mira estas recomendaciones para {who}.",
        },
        (Behavior, Other) => Template {
            tone: Tone::Curious,
            text: "{intro}{age}.\n\n\
                   Sé que mi comportamiento te tiene con dudas. Casi siempre tiene una razón.\n\n\
                   Estas recomendaciones pueden ayudarnos a entendernos mejor.",
        },
        (Health, _) => Template {
            tone: Tone::Worried,
            text: "{intro}{age}.\n\n\
                   No me siento del todo bien y quiero que estés atento a cómo sigo. \
                   Si empeoro o algo te preocupa, lo mejor es que me revise un veterinario pronto.\n\n\
                   Mientras tanto, aquí hay cuidados de bienestar para {who}.",
        },
        (Mood, _) => Template {
            tone: Tone::Sad,
            text: "{intro}{age}.\n\n\
                   Estos días me siento un poco decaído o nervioso. Tu compañía me hace mucho bien, \
                   y también un espacio tranquilo y rutinas que pueda anticipar.\n\n\
                   Estas ideas pueden ayudarme a sentirme mejor.",
        },
        (Exercise, Dog) => Template {
            tone: Tone::Playful,
            text: "¡Guau! {intro}{age}.\n\n\
                   ¡Me encanta moverme! Un buen paseo y juegos todos los días me dejan feliz y tranquilo en casa.\n\n\
                   Aquí tienes actividades pensadas para {who}.",
        },
        (Exercise, _) => Template {
            tone: Tone::Playful,
            text: "{intro}{age}.\n\n\
                   Necesito moverme y jugar un rato cada día para estar sano y contento.\n\n\
                   Te dejo actividades que le van bien a {who}.",
        },
        (Training, _) => Template {
            tone: Tone::Happy,
            text: "{intro}{age}.\n\n\
                   ¡Me encanta aprender cosas nuevas contigo! Sesiones cortas, premios y mucha paciencia \
                   son mi combinación favorita.\n\n\
                   Estas recomendaciones de entrenamiento están hechas para {who}.",
        },
        (Hygiene, Cat) => Template {
            tone: Tone::Worried,
            text: "Miau. {intro}{age}.\n\n\
                   Si no uso el arenero es porque algo no me gusta: la limpieza, el lugar o la arena. \
                   Mantenlo limpio y en un rincón tranquilo.\n\n\
                   Aquí tienes consejos para {who}.",
        },
        (Hygiene, _) => Template {
            tone: Tone::Calm,
            text: "{intro}{age}.\n\n\
                   Aprender dónde hacer mis necesidades lleva tiempo. Con horarios fijos y premios lo logro.\n\n\
                   Estas recomendaciones nos van a ayudar a {who} y a ti.",
        },
        (Grooming, _) => Template {
            tone: Tone::Calm,
            text: "{intro}{age}.\n\n\
                   Un buen cepillado y mis baños a tiempo me dejan cómodo y con el pelaje sano.\n\n\
                   Te dejo cuidados de aseo pensados para {who}.",
        },
        (Sleep, _) => Template {
            tone: Tone::Calm,
            text: "{intro}{age}.\n\n\
                   Dormir bien es clave para mí. Un lugar cómodo, tranquilo y una rutina antes de dormir me ayudan.\n\n\
                   Mira estas ideas para el descanso de {who}.",
        },
    }
}

/// Render the persona message for the best-matching topic, or a clarification request
/// when no topic matched. Always returns a tone.
pub fn render(topic: Option<Topic>, species: SpeciesKind, vars: &PersonaVars) -> (String, Tone) {
    let chosen = match topic {
        Some(topic) => template(topic, species),
        None => CLARIFY,
    };
    (fill(chosen.text, vars), chosen.tone)
}

fn fill(text: &str, vars: &PersonaVars) -> String {
    let who = if !vars.breed.is_empty() {
        format!("un {}", vars.breed)
    } else if !vars.species.is_empty() {
        format!("un {}", vars.species)
    } else {
        "mí".to_string()
    };
    let intro = if !vars.name.is_empty() {
        format!("Soy {}", vars.name)
    } else if !vars.species.is_empty() {
        format!("Soy tu {}", vars.species)
    } else {
        "Soy tu mascota".to_string()
    };
    let age = vars
        .age
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .map(|a| format!(" y tengo {}", a.trim()))
        .unwrap_or_default();

    text.replace("{intro}", &intro)
        .replace("{who}", &who)
        .replace("{age}", &age)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> PersonaVars {
        PersonaVars {
            name: "Toby".to_string(),
            species: "perro".to_string(),
            breed: "golden retriever".to_string(),
            age: Some("3 años".to_string()),
        }
    }

    #[test]
    fn fills_every_placeholder() {
        let (message, tone) = render(Some(Topic::Behavior), SpeciesKind::Dog, &vars());
        assert!(message.starts_with("¡Guau guau! Soy Toby y tengo 3 años."));
        assert!(message.contains("un golden retriever"));
        assert!(!message.contains('{'));
        assert_eq!(tone, Tone::Excited);
        assert!(message.split("\n\n").count() >= 3);
    }

    #[test]
    fn unknown_topic_asks_for_clarification_with_neutral_tone() {
        let (message, tone) = render(None, SpeciesKind::Other, &PersonaVars::default());
        assert_eq!(tone, Tone::Neutral);
        assert!(message.contains("Soy tu mascota."));
        assert!(message.contains("¿Me cuentas un poco más?"));
    }

    #[test]
    fn missing_name_falls_back_to_species() {
        let vars = PersonaVars {
            species: "gato".to_string(),
            ..PersonaVars::default()
        };
        let (message, _) = render(Some(Topic::Hygiene), SpeciesKind::Cat, &vars);
        assert!(message.contains("Soy tu gato."));
        assert!(message.contains("para un gato"));
    }
}
