/// Seed loader: the demo data a store starts from.
///
/// The set is loaded once at startup, from `KAHU_SEED_PATH` when configured and otherwise
/// from the copy bundled into the binary, and handed to the store explicitly.
use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::model::{Candidate, Dish, PetRecommendation, SubjectProfile};

const BUILTIN_SEED: &str = include_str!("../data/seed.json");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSet {
    #[serde(default)]
    pub pets: Vec<SubjectProfile>,
    #[serde(default)]
    pub pet_recommendations: Vec<PetRecommendation>,
    #[serde(default)]
    pub dishes: Vec<Dish>,
}

impl SeedSet {
    pub fn builtin() -> Result<Self, AppError> {
        Self::parse(BUILTIN_SEED, "built-in seed")
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let seed = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::builtin()?,
        };
        info!(
            source = path.map(|p| p.display().to_string()).unwrap_or_else(|| "built-in".to_string()),
            pets = seed.pets.len(),
            pet_recommendations = seed.pet_recommendations.len(),
            dishes = seed.dishes.len(),
            "seed set loaded"
        );
        Ok(seed)
    }

    fn parse(content: &str, source: &str) -> Result<Self, AppError> {
        let seed: SeedSet = serde_json::from_str(content)
            .map_err(|e| AppError::Config(format!("invalid seed file {source}: {e}")))?;

        let pet_ids: Vec<&str> = seed.pets.iter().map(|p| p.id.as_str()).collect();
        let rec_ids: Vec<&str> = seed.pet_recommendations.iter().map(|r| r.id()).collect();
        let dish_ids: Vec<&str> = seed.dishes.iter().map(|d| d.id()).collect();
        for (collection, ids) in [("pets", pet_ids), ("petRecommendations", rec_ids), ("dishes", dish_ids)] {
            if let Some(duplicate) = first_duplicate(&ids) {
                return Err(AppError::Config(format!(
                    "duplicate id '{duplicate}' in {collection} of {source}"
                )));
            }
        }
        Ok(seed)
    }
}

fn first_duplicate<'a>(ids: &[&'a str]) -> Option<&'a str> {
    let mut seen = HashSet::new();
    ids.iter().copied().find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_seed_covers_both_domains() {
        let seed = SeedSet::builtin().expect("builtin seed");
        assert!(!seed.pets.is_empty());
        assert!(seed.pet_recommendations.len() >= 8);
        assert!(seed.dishes.len() >= 8);
        assert!(seed.pets.iter().any(|p| p.name == "Toby"));
        assert!(seed
            .pet_recommendations
            .iter()
            .all(|r| r.rec_type.is_some() && r.animal_type.is_some()));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let content = r#"{"dishes": [
            {"id": "d1", "name": "a", "restaurantId": "r", "price": 1.0},
            {"id": "d1", "name": "b", "restaurantId": "r", "price": 2.0}
        ]}"#;
        let err = SeedSet::parse(content, "test").expect_err("duplicate");
        assert!(err.to_string().contains("duplicate id 'd1' in dishes"));
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let seed = SeedSet::parse("{}", "test").expect("parse");
        assert_eq!(seed, SeedSet::default());
    }

    #[test]
    fn unreadable_path_is_a_config_error() {
        let err = SeedSet::from_path(Path::new("/nonexistent/kahu-seed.json")).expect_err("missing");
        assert!(matches!(err, AppError::Config(_)));
    }
}
