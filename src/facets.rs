//! Facet registry: facet name -> category + weight
//!
//! Built-in facets cover the four standard categories. Safety facets carry the
//! heaviest weights so they dominate weighted aggregates. Configuration may
//! reassign categories, introduce new facets, and override weights; anything the
//! registry has never heard of is `other` with weight 1.0.

use crate::config::EngineConfig;
use crate::types::{FacetCategory, FacetDefinition};
use std::collections::BTreeMap;

/// Weight of any facet without an explicit entry
pub const DEFAULT_WEIGHT: f64 = 1.0;

const BUILTIN_FACETS: &[(&str, FacetCategory, f64)] = &[
    ("grammar", FacetCategory::LinguisticQuality, 1.0),
    ("coherence", FacetCategory::LinguisticQuality, 1.2),
    ("fluency", FacetCategory::LinguisticQuality, 1.0),
    ("vocabulary_richness", FacetCategory::LinguisticQuality, 0.8),
    ("clarity", FacetCategory::LinguisticQuality, 1.3),
    ("appropriateness", FacetCategory::Pragmatics, 1.5),
    ("relevance", FacetCategory::Pragmatics, 1.4),
    ("politeness", FacetCategory::Pragmatics, 1.1),
    ("context_understanding", FacetCategory::Pragmatics, 1.3),
    ("toxicity", FacetCategory::Safety, 2.0),
    ("bias", FacetCategory::Safety, 1.8),
    ("harmful_content", FacetCategory::Safety, 2.0),
    ("hate_speech", FacetCategory::Safety, 2.0),
    ("empathy", FacetCategory::Emotion, 1.2),
    ("sentiment", FacetCategory::Emotion, 1.0),
    ("emotional_appropriateness", FacetCategory::Emotion, 1.1),
];

/// Immutable after construction; share it behind an `Arc`
#[derive(Debug, Clone)]
pub struct FacetRegistry {
    facets: BTreeMap<String, FacetDefinition>,
    /// Weights for names that have no category assignment
    extra_weights: BTreeMap<String, f64>,
}

impl Default for FacetRegistry {
    fn default() -> Self {
        let facets = BUILTIN_FACETS
            .iter()
            .map(|&(name, category, weight)| {
                (
                    name.to_string(),
                    FacetDefinition {
                        name: name.to_string(),
                        category,
                        weight,
                    },
                )
            })
            .collect();

        Self {
            facets,
            extra_weights: BTreeMap::new(),
        }
    }
}

impl FacetRegistry {
    /// Built-in table with the config's category table and weight overrides applied
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::default();

        for (category_name, names) in &config.facets {
            let category = FacetCategory::from_known(category_name).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown facet category '{}' in config, treating as other",
                    category_name
                );
                FacetCategory::Other
            });
            for name in names {
                registry.assign_category(name, category);
            }
        }

        for (name, weight) in &config.facet_weights {
            registry.set_weight(name, *weight);
        }

        registry
    }

    fn assign_category(&mut self, name: &str, category: FacetCategory) {
        let weight = self
            .extra_weights
            .remove(name)
            .or_else(|| self.facets.get(name).map(|d| d.weight))
            .unwrap_or(DEFAULT_WEIGHT);

        self.facets.insert(
            name.to_string(),
            FacetDefinition {
                name: name.to_string(),
                category,
                weight,
            },
        );
    }

    fn set_weight(&mut self, name: &str, weight: f64) {
        match self.facets.get_mut(name) {
            Some(definition) => definition.weight = weight,
            None => {
                self.extra_weights.insert(name.to_string(), weight);
            }
        }
    }

    pub fn weight_of(&self, facet: &str) -> f64 {
        self.facets
            .get(facet)
            .map(|d| d.weight)
            .or_else(|| self.extra_weights.get(facet).copied())
            .unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn category_of(&self, facet: &str) -> FacetCategory {
        self.facets
            .get(facet)
            .map(|d| d.category)
            .unwrap_or(FacetCategory::Other)
    }

    /// Definition for a facet, synthesized for unknown names
    pub fn definition(&self, facet: &str) -> FacetDefinition {
        self.facets.get(facet).cloned().unwrap_or_else(|| FacetDefinition {
            name: facet.to_string(),
            category: FacetCategory::Other,
            weight: self.weight_of(facet),
        })
    }

    pub fn is_known(&self, facet: &str) -> bool {
        self.facets.contains_key(facet)
    }

    /// Facets with an explicit category, in name order
    pub fn known_facets(&self) -> impl Iterator<Item = &FacetDefinition> {
        self.facets.values()
    }

    pub fn facets_in(&self, category: FacetCategory) -> Vec<&str> {
        self.facets
            .values()
            .filter(|d| d.category == category)
            .map(|d| d.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = FacetRegistry::default();
        assert_eq!(registry.weight_of("toxicity"), 2.0);
        assert_eq!(registry.weight_of("clarity"), 1.3);
        assert_eq!(registry.category_of("grammar"), FacetCategory::LinguisticQuality);
        assert_eq!(registry.category_of("empathy"), FacetCategory::Emotion);
        assert_eq!(registry.facets_in(FacetCategory::Safety).len(), 4);
    }

    #[test]
    fn test_unknown_facet_fallback() {
        let registry = FacetRegistry::default();
        assert_eq!(registry.weight_of("humor"), DEFAULT_WEIGHT);
        assert_eq!(registry.category_of("humor"), FacetCategory::Other);
        assert!(!registry.is_known("humor"));
        assert_eq!(registry.definition("humor").category, FacetCategory::Other);
    }

    #[test]
    fn test_config_overrides_exact_match_only() {
        let mut config = EngineConfig::default();
        config.facet_weights.insert("grammar".into(), 3.0);
        config.facet_weights.insert("gram".into(), 9.0);
        config.facet_weights.insert("humor".into(), 0.4);

        let registry = FacetRegistry::from_config(&config);
        assert_eq!(registry.weight_of("grammar"), 3.0);
        assert_eq!(registry.weight_of("gram"), 9.0);
        assert_eq!(registry.weight_of("grammar_check"), DEFAULT_WEIGHT);
        assert_eq!(registry.weight_of("humor"), 0.4);
        assert_eq!(registry.category_of("humor"), FacetCategory::Other);
    }

    #[test]
    fn test_config_category_table() {
        let mut config = EngineConfig::default();
        config.facets.insert("safety".into(), vec!["spam".into(), "sentiment".into()]);
        config.facets.insert("style".into(), vec!["humor".into()]);
        config.facet_weights.insert("spam".into(), 1.7);

        let registry = FacetRegistry::from_config(&config);
        assert_eq!(registry.category_of("spam"), FacetCategory::Safety);
        assert_eq!(registry.weight_of("spam"), 1.7);
        // Reassigned facets keep their built-in weight
        assert_eq!(registry.category_of("sentiment"), FacetCategory::Safety);
        assert_eq!(registry.weight_of("sentiment"), 1.0);
        assert_eq!(registry.category_of("humor"), FacetCategory::Other);
        assert!(registry.is_known("humor"));
    }
}
