//! Relevance scoring rules

use serde::{Deserialize, Serialize};

/// Length comparison used by a score rule instead of term matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthOperator {
    LessThan,
    GreaterThan,
}

/// Fires when the normalized text length compares true against `chars`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthCondition {
    pub operator: LengthOperator,
    pub chars: usize,
}

impl LengthCondition {
    pub fn holds(&self, len: usize) -> bool {
        match self.operator {
            LengthOperator::LessThan => len < self.chars,
            LengthOperator::GreaterThan => len > self.chars,
        }
    }
}

/// A single scoring rule. A rule with a length condition ignores its terms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreRule {
    pub score: i32,
    pub match_any_terms: Vec<String>,
    pub condition: Option<LengthCondition>,
}

impl ScoreRule {
    /// Rule that adds `score` when any of `terms` appears
    pub fn terms(score: i32, terms: &[&str]) -> Self {
        Self {
            score,
            match_any_terms: terms.iter().map(|t| t.to_string()).collect(),
            condition: None,
        }
    }

    /// Rule that adds `score` when the text length condition holds
    pub fn length(score: i32, operator: LengthOperator, chars: usize) -> Self {
        Self {
            score,
            match_any_terms: Vec::new(),
            condition: Some(LengthCondition { operator, chars }),
        }
    }
}

/// Content scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentScoringConfig {
    pub enabled: bool,
    pub min_score: i32,
    pub positive_rules: Vec<ScoreRule>,
    pub negative_rules: Vec<ScoreRule>,
}

impl Default for ContentScoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_score: 0,
            positive_rules: Vec::new(),
            negative_rules: Vec::new(),
        }
    }
}
