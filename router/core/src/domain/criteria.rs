// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Routing Criteria
//!
//! A [`Criterion`] is an atomic, immutable requirement or capability value.
//! Requests carry a [`CriteriaCollection`] of what they *need*; rules carry a
//! collection of what their adapter *offers*. The same type serves both roles,
//! the role is decided by which side of [`CriteriaCollection::matches`] it sits on.
//!
//! ## Families
//!
//! - **Ordinal** (`capability`, `privacy`): totally ordered ranks. A requirement
//!   is a lower bound, so `capability:advanced` is satisfied by `advanced` or `smart`.
//! - **Flag** (`feature`, `provider`, `model`): unordered labels. A requirement is
//!   satisfied only by the identical label.
//!
//! ## Text Form
//!
//! Criteria are written `family:value` in configuration and on the command line,
//! e.g. `capability:smart`, `feature:tools`, `provider:ollama`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model capability level, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Basic,
    Intermediate,
    Advanced,
    Smart,
}

/// Data privacy level offered by a backend, ascending.
///
/// `high` is typically a self-hosted or local model where prompts never leave
/// the operator's infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    Low,
    Medium,
    High,
}

/// Discrete features a backend may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Tools,
    ImageToText,
    Stream,
    Embeddings,
    ImageGeneration,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Tools,
        Feature::ImageToText,
        Feature::Stream,
        Feature::Embeddings,
        Feature::ImageGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Tools => "tools",
            Feature::ImageToText => "image_to_text",
            Feature::Stream => "stream",
            Feature::Embeddings => "embeddings",
            Feature::ImageGeneration => "image_generation",
        }
    }
}

impl FromStr for Feature {
    type Err = CriterionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| CriterionParseError::UnknownValue {
                family: "feature".to_string(),
                value: s.to_string(),
            })
    }
}

/// Ordinal criterion families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrdinalFamily {
    Capability,
    Privacy,
}

impl OrdinalFamily {
    /// Rank names in ascending order.
    pub fn levels(&self) -> &'static [&'static str] {
        match self {
            OrdinalFamily::Capability => &["basic", "intermediate", "advanced", "smart"],
            OrdinalFamily::Privacy => &["low", "medium", "high"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrdinalFamily::Capability => "capability",
            OrdinalFamily::Privacy => "privacy",
        }
    }

    fn rank_of(&self, value: &str) -> Option<u8> {
        self.levels()
            .iter()
            .position(|level| *level == value)
            .map(|pos| pos as u8)
    }
}

/// Flag criterion families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagFamily {
    Feature,
    Provider,
    Model,
}

impl FlagFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagFamily::Feature => "feature",
            FlagFamily::Provider => "provider",
            FlagFamily::Model => "model",
        }
    }
}

/// An atomic requirement or capability value.
///
/// Closed over the two family kinds so [`compare`] is a single exhaustive match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Criterion {
    Ordinal { family: OrdinalFamily, rank: u8 },
    Flag { family: FlagFamily, label: String },
}

impl Criterion {
    pub fn capability(level: Capability) -> Self {
        Criterion::Ordinal {
            family: OrdinalFamily::Capability,
            rank: level as u8,
        }
    }

    pub fn privacy(level: Privacy) -> Self {
        Criterion::Ordinal {
            family: OrdinalFamily::Privacy,
            rank: level as u8,
        }
    }

    pub fn feature(feature: Feature) -> Self {
        Criterion::Flag {
            family: FlagFamily::Feature,
            label: feature.as_str().to_string(),
        }
    }

    pub fn provider(name: impl AsRef<str>) -> Self {
        Criterion::Flag {
            family: FlagFamily::Provider,
            label: name.as_ref().to_lowercase(),
        }
    }

    pub fn model(name: impl AsRef<str>) -> Self {
        Criterion::Flag {
            family: FlagFamily::Model,
            label: name.as_ref().to_lowercase(),
        }
    }

    /// Family name as written in the text form
    pub fn family_name(&self) -> &'static str {
        match self {
            Criterion::Ordinal { family, .. } => family.as_str(),
            Criterion::Flag { family, .. } => family.as_str(),
        }
    }

    pub fn is_ordinal(&self) -> bool {
        matches!(self, Criterion::Ordinal { .. })
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Ordinal { family, rank } => {
                match family.levels().get(*rank as usize) {
                    Some(level) => write!(f, "{}:{}", family.as_str(), level),
                    None => write!(f, "{}:#{}", family.as_str(), rank),
                }
            }
            Criterion::Flag { family, label } => write!(f, "{}:{}", family.as_str(), label),
        }
    }
}

/// Errors produced while parsing the `family:value` text form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriterionParseError {
    #[error("Criterion '{0}' must have the form family:value")]
    MissingSeparator(String),

    #[error("Unknown criterion family '{0}'")]
    UnknownFamily(String),

    #[error("Unknown {family} value '{value}'")]
    UnknownValue { family: String, value: String },

    #[error("Empty {0} label")]
    EmptyLabel(String),
}

impl FromStr for Criterion {
    type Err = CriterionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, value) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| CriterionParseError::MissingSeparator(s.to_string()))?;
        let family = family.trim().to_lowercase();
        let value = value.trim().to_lowercase();

        let ordinal = |family: OrdinalFamily| {
            family
                .rank_of(&value)
                .map(|rank| Criterion::Ordinal { family, rank })
                .ok_or_else(|| CriterionParseError::UnknownValue {
                    family: family.as_str().to_string(),
                    value: value.clone(),
                })
        };

        match family.as_str() {
            "capability" => ordinal(OrdinalFamily::Capability),
            "privacy" => ordinal(OrdinalFamily::Privacy),
            "feature" => Ok(Criterion::feature(value.parse()?)),
            "provider" | "model" if value.is_empty() => {
                Err(CriterionParseError::EmptyLabel(family.clone()))
            }
            "provider" => Ok(Criterion::provider(&value)),
            "model" => Ok(Criterion::model(&value)),
            _ => Err(CriterionParseError::UnknownFamily(family.clone())),
        }
    }
}

impl TryFrom<String> for Criterion {
    type Error = CriterionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Criterion> for String {
    fn from(criterion: Criterion) -> Self {
        criterion.to_string()
    }
}

/// Outcome of comparing one requirement against one candidate criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The candidate satisfies the requirement
    Match,
    /// Same ordinal family, candidate rank is below the requirement
    NoMatch,
    /// Same flag family, different label
    SameType,
    /// Different families; the candidate says nothing about the requirement
    Abstain,
}

/// Compare a `requirement` against a `candidate` criterion.
pub fn compare(requirement: &Criterion, candidate: &Criterion) -> Decision {
    match (requirement, candidate) {
        (
            Criterion::Ordinal { family: req_family, rank: req_rank },
            Criterion::Ordinal { family: cand_family, rank: cand_rank },
        ) if req_family == cand_family => {
            if cand_rank >= req_rank {
                Decision::Match
            } else {
                Decision::NoMatch
            }
        }
        (
            Criterion::Flag { family: req_family, label: req_label },
            Criterion::Flag { family: cand_family, label: cand_label },
        ) if req_family == cand_family => {
            if req_label == cand_label {
                Decision::Match
            } else {
                Decision::SameType
            }
        }
        _ => Decision::Abstain,
    }
}

/// Ordered multiset of criteria.
///
/// Insertion order is preserved and duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaCollection(Vec<Criterion>);

impl CriteriaCollection {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, criterion: Criterion) {
        self.0.push(criterion);
    }

    /// Builder-style push
    pub fn with(mut self, criterion: Criterion) -> Self {
        self.0.push(criterion);
        self
    }

    /// Push unless an identical criterion is already present
    pub fn push_unique(&mut self, criterion: Criterion) {
        if !self.0.contains(&criterion) {
            self.0.push(criterion);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Criterion> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, criterion: &Criterion) -> bool {
        self.0.contains(criterion)
    }

    /// True iff every requirement in `self` has at least one MATCH in `candidate`.
    ///
    /// Not symmetric. An empty requirement collection matches anything, and an
    /// empty candidate only matches an empty requirement collection.
    pub fn matches(&self, candidate: &CriteriaCollection) -> bool {
        self.0.iter().all(|requirement| candidate.satisfies(requirement))
    }

    /// Requirements in `self` with no MATCH in `candidate`, in order.
    pub fn unmet_by(&self, candidate: &CriteriaCollection) -> Vec<Criterion> {
        self.0
            .iter()
            .filter(|requirement| !candidate.satisfies(requirement))
            .cloned()
            .collect()
    }

    fn satisfies(&self, requirement: &Criterion) -> bool {
        self.0
            .iter()
            .any(|candidate| compare(requirement, candidate) == Decision::Match)
    }
}

impl From<Vec<Criterion>> for CriteriaCollection {
    fn from(criteria: Vec<Criterion>) -> Self {
        Self(criteria)
    }
}

impl FromIterator<Criterion> for CriteriaCollection {
    fn from_iter<T: IntoIterator<Item = Criterion>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Criterion> for CriteriaCollection {
    fn extend<T: IntoIterator<Item = Criterion>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a CriteriaCollection {
    type Item = &'a Criterion;
    type IntoIter = std::slice::Iter<'a, Criterion>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for CriteriaCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, criterion) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", criterion)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_ordinals() -> Vec<Criterion> {
        let mut all = Vec::new();
        for family in [OrdinalFamily::Capability, OrdinalFamily::Privacy] {
            for rank in 0..family.levels().len() as u8 {
                all.push(Criterion::Ordinal { family, rank });
            }
        }
        all
    }

    fn all_flags() -> Vec<Criterion> {
        let mut all: Vec<Criterion> = Feature::ALL.iter().map(|f| Criterion::feature(*f)).collect();
        all.push(Criterion::provider("openai"));
        all.push(Criterion::provider("ollama"));
        all.push(Criterion::model("gpt-4o"));
        all.push(Criterion::model("llama3.2"));
        all
    }

    #[test]
    fn test_ordinal_compare_is_lower_bound() {
        for requirement in all_ordinals() {
            for candidate in all_ordinals() {
                let decision = compare(&requirement, &candidate);
                match (&requirement, &candidate) {
                    (
                        Criterion::Ordinal { family: rf, rank: rr },
                        Criterion::Ordinal { family: cf, rank: cr },
                    ) if rf == cf => {
                        let expected = if cr >= rr { Decision::Match } else { Decision::NoMatch };
                        assert_eq!(decision, expected, "{} vs {}", requirement, candidate);
                    }
                    _ => assert_eq!(decision, Decision::Abstain),
                }
            }
        }
    }

    #[test]
    fn test_flag_compare_same_type() {
        for requirement in all_flags() {
            for candidate in all_flags() {
                let decision = compare(&requirement, &candidate);
                if requirement.family_name() != candidate.family_name() {
                    assert_eq!(decision, Decision::Abstain);
                } else if requirement == candidate {
                    assert_eq!(decision, Decision::Match);
                } else {
                    assert_eq!(decision, Decision::SameType);
                }
            }
        }
    }

    #[test]
    fn test_mixed_kinds_abstain() {
        for ordinal in all_ordinals() {
            for flag in all_flags() {
                assert_eq!(compare(&ordinal, &flag), Decision::Abstain);
                assert_eq!(compare(&flag, &ordinal), Decision::Abstain);
            }
        }
    }

    #[test]
    fn test_scenario_feature_with_higher_capability() {
        let requirements = CriteriaCollection::from(vec![Criterion::feature(Feature::ImageToText)]);
        let candidate = CriteriaCollection::from(vec![
            Criterion::feature(Feature::ImageToText),
            Criterion::capability(Capability::Advanced),
        ]);
        assert!(requirements.matches(&candidate));
    }

    #[test]
    fn test_scenario_capability_too_low() {
        let requirements = CriteriaCollection::from(vec![
            Criterion::feature(Feature::ImageToText),
            Criterion::capability(Capability::Smart),
        ]);
        let candidate = CriteriaCollection::from(vec![
            Criterion::feature(Feature::ImageToText),
            Criterion::capability(Capability::Advanced),
        ]);
        assert!(!requirements.matches(&candidate));
        assert_eq!(
            requirements.unmet_by(&candidate),
            vec![Criterion::capability(Capability::Smart)]
        );
    }

    #[test]
    fn test_scenario_same_type_hits_do_not_satisfy() {
        let requirements = CriteriaCollection::from(vec![Criterion::feature(Feature::Tools)]);
        let candidate = CriteriaCollection::from(vec![
            Criterion::feature(Feature::ImageToText),
            Criterion::feature(Feature::Stream),
        ]);
        assert!(!requirements.matches(&candidate));
    }

    #[test]
    fn test_matches_is_not_symmetric() {
        let a = CriteriaCollection::from(vec![Criterion::feature(Feature::Tools)]);
        let b = CriteriaCollection::from(vec![
            Criterion::feature(Feature::Tools),
            Criterion::capability(Capability::Smart),
        ]);
        assert!(a.matches(&b));
        assert!(!b.matches(&a));
    }

    #[test]
    fn test_empty_collections() {
        let empty = CriteriaCollection::new();
        let some = CriteriaCollection::from(vec![Criterion::privacy(Privacy::High)]);
        assert!(empty.matches(&empty));
        assert!(empty.matches(&some));
        assert!(!some.matches(&empty));
    }

    #[test]
    fn test_one_candidate_satisfies_many_requirements() {
        let requirements = CriteriaCollection::from(vec![
            Criterion::capability(Capability::Basic),
            Criterion::capability(Capability::Advanced),
            Criterion::capability(Capability::Advanced),
        ]);
        let candidate = CriteriaCollection::from(vec![Criterion::capability(Capability::Smart)]);
        assert!(requirements.matches(&candidate));
    }

    #[test]
    fn test_parse_and_display() {
        let parsed: Criterion = "Capability:SMART".parse().unwrap();
        assert_eq!(parsed, Criterion::capability(Capability::Smart));
        assert_eq!(parsed.to_string(), "capability:smart");

        let feature: Criterion = "feature:image_to_text".parse().unwrap();
        assert_eq!(feature, Criterion::feature(Feature::ImageToText));

        let provider: Criterion = "provider:OpenAI".parse().unwrap();
        assert_eq!(provider.to_string(), "provider:openai");

        assert!(matches!(
            "privacy".parse::<Criterion>(),
            Err(CriterionParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            "colour:red".parse::<Criterion>(),
            Err(CriterionParseError::UnknownFamily(_))
        ));
        assert!(matches!(
            "capability:genius".parse::<Criterion>(),
            Err(CriterionParseError::UnknownValue { .. })
        ));
        assert!(matches!(
            "model:".parse::<Criterion>(),
            Err(CriterionParseError::EmptyLabel(_))
        ));
    }

    #[test]
    fn test_collection_serde_uses_text_form() {
        let collection = CriteriaCollection::from(vec![
            Criterion::privacy(Privacy::Medium),
            Criterion::feature(Feature::Stream),
        ]);
        let json = serde_json::to_string(&collection).unwrap();
        assert_eq!(json, r#"["privacy:medium","feature:stream"]"#);
        let back: CriteriaCollection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, collection);
    }
}
