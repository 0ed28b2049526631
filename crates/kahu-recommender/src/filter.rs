/// Multi-phase candidate selection.
///
/// 0. explicit ids, in listed order
/// 1. strict scored filter over the active mandatory criteria
/// 2. relaxation to the target category when phase 1 under-produces
/// 3. the first few candidates unfiltered when nothing else matched
///
/// Ids selected by an earlier phase are never repeated by a later one.
use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::debug;

use crate::model::{Candidate, Domain, StructuredIntent, SubjectProfile};
use crate::vocab;

/// Relevance weights. Tuning constants, not part of any contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    pub category: u32,
    pub result_type: u32,
    pub issue: u32,
    /// Added once per overlapping issue beyond the first.
    pub extra_issue: u32,
    pub secondary: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            category: 10,
            result_type: 8,
            issue: 6,
            extra_issue: 3,
            secondary: 5,
        }
    }
}

/// Per-domain rule set. Pet care treats species and result type as mandatory; dishes only
/// the course, with cuisine as a bonus that still drives relaxation.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPolicy {
    pub domain: Domain,
    pub category_mandatory: bool,
    pub price_tie_break: bool,
    pub weights: ScoreWeights,
    pub strict_cap: usize,
    pub relax_threshold: usize,
    pub relax_limit: usize,
    pub fallback_count: usize,
    pub final_cap: usize,
}

impl FilterPolicy {
    pub fn pets() -> Self {
        Self {
            domain: Domain::PetRecommendations,
            category_mandatory: true,
            price_tie_break: false,
            weights: ScoreWeights::default(),
            strict_cap: 8,
            relax_threshold: 3,
            relax_limit: 5,
            fallback_count: 4,
            final_cap: 8,
        }
    }

    pub fn dishes() -> Self {
        Self {
            domain: Domain::Dishes,
            category_mandatory: false,
            price_tie_break: true,
            final_cap: 12,
            ..Self::pets()
        }
    }
}

/// Scoring record for one candidate that passed every active mandatory criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOutcome {
    pub achieved_matches: u32,
    pub required_matches: u32,
    pub relevance_score: u32,
}

impl FilterOutcome {
    pub fn is_retained(&self) -> bool {
        self.achieved_matches >= self.required_matches.max(1) && self.relevance_score > 0
    }
}

/// Intent terms, folded once per request.
#[derive(Debug, Default)]
struct Criteria {
    target_category: Option<String>,
    result_types: Vec<String>,
    issues: Vec<String>,
    secondary: Vec<String>,
}

impl Criteria {
    fn build<C: Candidate>(
        intent: &StructuredIntent,
        candidates: &[C],
        profile: Option<&SubjectProfile>,
        domain: Domain,
    ) -> Self {
        let target_category = match domain {
            Domain::PetRecommendations => profile
                .and_then(|p| vocab::canonical_species(&p.species))
                .or_else(|| {
                    intent
                        .subject_characteristics
                        .iter()
                        .find_map(|c| vocab::canonical_species(c))
                })
                .map(str::to_string),
            Domain::Dishes => intent
                .subject_characteristics
                .iter()
                .map(|c| vocab::fold(c))
                .find(|c| {
                    candidates
                        .iter()
                        .any(|cand| cand.category().is_some_and(|cat| vocab::fold(cat) == *c))
                }),
        };

        let mut secondary: Vec<String> = intent
            .subject_characteristics
            .iter()
            .map(|c| vocab::fold(c))
            .filter(|c| !c.is_empty())
            .collect();
        if let Some(profile) = profile {
            secondary.push(vocab::fold(&profile.breed));
        }

        Self {
            target_category,
            result_types: intent
                .result_type_filters
                .iter()
                .map(|t| vocab::canonical_result_type(t))
                .filter(|t| !t.is_empty())
                .collect(),
            issues: intent
                .issues
                .iter()
                .map(|i| vocab::fold(i))
                .filter(|i| !i.is_empty())
                .collect(),
            secondary,
        }
    }

    fn category_matches(&self, domain: Domain, category: Option<&str>) -> bool {
        let (Some(target), Some(category)) = (&self.target_category, category) else {
            return false;
        };
        category_key(domain, category) == *target
    }

    fn result_type_matches(&self, result_type: Option<&str>) -> bool {
        result_type
            .map(vocab::canonical_result_type)
            .is_some_and(|t| self.result_types.contains(&t))
    }

    fn issue_overlaps(&self, tags: &[String]) -> u32 {
        let tags: Vec<String> = tags
            .iter()
            .map(|t| vocab::fold(t))
            .filter(|t| !t.is_empty())
            .collect();
        let overlapping = self
            .issues
            .iter()
            .filter(|issue| tags.iter().any(|tag| vocab::phrases_overlap(issue, tag)))
            .count();
        overlapping as u32
    }

    fn secondary_matches(&self, secondary: Option<&str>) -> bool {
        secondary
            .map(vocab::fold)
            .is_some_and(|s| !s.is_empty() && self.secondary.contains(&s))
    }
}

fn category_key(domain: Domain, raw: &str) -> String {
    match domain {
        Domain::PetRecommendations => vocab::canonical_species(raw)
            .map(str::to_string)
            .unwrap_or_else(|| vocab::fold(raw)),
        Domain::Dishes => vocab::fold(raw),
    }
}

/// Score one candidate. `None` when it fails an active mandatory criterion.
fn score<C: Candidate>(candidate: &C, criteria: &Criteria, policy: &FilterPolicy) -> Option<FilterOutcome> {
    let weights = &policy.weights;
    let mut outcome = FilterOutcome {
        achieved_matches: 0,
        required_matches: 0,
        relevance_score: 0,
    };

    if criteria.target_category.is_some() {
        let matched = criteria.category_matches(policy.domain, candidate.category());
        if policy.category_mandatory {
            outcome.required_matches += 1;
            if !matched {
                return None;
            }
        }
        if matched {
            outcome.achieved_matches += 1;
            outcome.relevance_score += weights.category;
        }
    }

    if !criteria.result_types.is_empty() {
        outcome.required_matches += 1;
        if !criteria.result_type_matches(candidate.result_type()) {
            return None;
        }
        outcome.achieved_matches += 1;
        outcome.relevance_score += weights.result_type;
    }

    let overlaps = criteria.issue_overlaps(candidate.tags());
    if overlaps > 0 {
        outcome.achieved_matches += 1;
        outcome.relevance_score += weights.issue * overlaps + weights.extra_issue * (overlaps - 1);
    }

    if criteria.secondary_matches(candidate.secondary()) {
        outcome.achieved_matches += 1;
        outcome.relevance_score += weights.secondary;
    }

    Some(outcome)
}

fn price_order<C: Candidate>(a: &C, b: &C) -> Ordering {
    match (a.price(), b.price()) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn filter<C: Candidate + Clone>(
    intent: &StructuredIntent,
    candidates: &[C],
    profile: Option<&SubjectProfile>,
    policy: &FilterPolicy,
) -> Vec<C> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let criteria = Criteria::build(intent, candidates, profile, policy.domain);
    let mut selected: Vec<&C> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for id in &intent.explicit_ids {
        if let Some(candidate) = candidates.iter().find(|c| c.id() == id.as_str()) {
            if seen.insert(candidate.id()) {
                selected.push(candidate);
            }
        }
    }
    let explicit = selected.len();

    let mut scored: Vec<(&C, FilterOutcome)> = candidates
        .iter()
        .filter(|c| !seen.contains(c.id()))
        .filter_map(|c| score(c, &criteria, policy).map(|outcome| (c, outcome)))
        .filter(|(_, outcome)| outcome.is_retained())
        .collect();
    scored.sort_by(|(a, oa), (b, ob)| {
        ob.achieved_matches
            .cmp(&oa.achieved_matches)
            .then(ob.relevance_score.cmp(&oa.relevance_score))
            .then_with(|| {
                if policy.price_tie_break {
                    price_order(*a, *b)
                } else {
                    Ordering::Equal
                }
            })
    });
    for (candidate, _) in scored.into_iter().take(policy.strict_cap) {
        if seen.insert(candidate.id()) {
            selected.push(candidate);
        }
    }
    let strict = selected.len() - explicit;

    let mut relaxed = 0;
    if selected.len() < policy.relax_threshold && criteria.target_category.is_some() {
        for candidate in candidates {
            if relaxed == policy.relax_limit {
                break;
            }
            if !seen.contains(candidate.id())
                && criteria.category_matches(policy.domain, candidate.category())
            {
                seen.insert(candidate.id());
                selected.push(candidate);
                relaxed += 1;
            }
        }
    }

    let fallback = selected.is_empty();
    if fallback {
        selected.extend(candidates.iter().take(policy.fallback_count));
    }

    debug!(
        domain = policy.domain.as_str(),
        candidates = candidates.len(),
        explicit,
        strict,
        relaxed,
        fallback,
        "candidates filtered"
    );

    selected
        .into_iter()
        .take(policy.final_cap)
        .cloned()
        .collect()
}
