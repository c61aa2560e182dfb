//! Rule-based relevance scoring for teaser candidates

use std::collections::HashSet;

use crate::config::{ContentScoringConfig, ScoreRule};

/// Penalty for URLs that carry a fragment (`#...`)
pub const FRAGMENT_PENALTY: i32 = -2;

/// Text a candidate is scored on
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub intro_text: Option<&'a str>,
    pub body_text: &'a str,
}

impl ScoringContext<'_> {
    /// Lowercased, whitespace-collapsed title + intro + body
    fn haystack(&self) -> String {
        let parts = [self.title, self.intro_text.unwrap_or(""), self.body_text];
        normalize_text(&parts.join(" "))
    }
}

/// Lowercase and collapse whitespace runs
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A rule with terms pre-normalized
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: ScoreRule,
    terms: Vec<String>,
}

impl CompiledRule {
    fn new(rule: &ScoreRule) -> Self {
        Self {
            terms: rule
                .match_any_terms
                .iter()
                .map(|t| normalize_text(t))
                .filter(|t| !t.is_empty())
                .collect(),
            rule: rule.clone(),
        }
    }

    /// A length condition replaces term matching for its rule
    fn fires(&self, haystack: &str, haystack_chars: usize) -> bool {
        match &self.rule.condition {
            Some(condition) => condition.holds(haystack_chars),
            None => self.terms.iter().any(|t| haystack.contains(t.as_str())),
        }
    }
}

/// Scores candidates against positive and negative rule sets
#[derive(Debug, Clone)]
pub struct RelevanceEvaluator {
    min_score: i32,
    positive: Vec<CompiledRule>,
    negative: Vec<CompiledRule>,
    forced_urls: HashSet<String>,
}

impl RelevanceEvaluator {
    pub fn new(config: &ContentScoringConfig, forced_urls: &[String]) -> Self {
        Self {
            min_score: config.min_score,
            positive: config.positive_rules.iter().map(CompiledRule::new).collect(),
            negative: config.negative_rules.iter().map(CompiledRule::new).collect(),
            forced_urls: forced_urls.iter().cloned().collect(),
        }
    }

    /// Total score: positive rules add their score, negative rules subtract
    /// theirs whatever its sign, fragments cost 2
    pub fn score(&self, context: &ScoringContext<'_>) -> i32 {
        let haystack = context.haystack();
        let chars = haystack.chars().count();

        let positive: i32 = self
            .positive
            .iter()
            .filter(|r| r.fires(&haystack, chars))
            .map(|r| r.rule.score)
            .sum();
        let negative: i32 = self
            .negative
            .iter()
            .filter(|r| r.fires(&haystack, chars))
            .map(|r| r.rule.score.abs())
            .sum();

        let penalty = if context.url.contains('#') {
            FRAGMENT_PENALTY
        } else {
            0
        };

        positive - negative + penalty
    }

    /// Whether the candidate reaches `min_score`. Forced URLs are never
    /// relevant here; they enter the crawl on their own.
    pub fn is_relevant(&self, context: &ScoringContext<'_>) -> bool {
        if self.forced_urls.contains(context.url) {
            return false;
        }
        self.score(context) >= self.min_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LengthOperator;

    fn context<'a>(url: &'a str, title: &'a str, body: &'a str) -> ScoringContext<'a> {
        ScoringContext {
            url,
            title,
            intro_text: None,
            body_text: body,
        }
    }

    fn evaluator(positive: Vec<ScoreRule>, negative: Vec<ScoreRule>, min_score: i32) -> RelevanceEvaluator {
        let config = ContentScoringConfig {
            enabled: true,
            min_score,
            positive_rules: positive,
            negative_rules: negative,
        };
        RelevanceEvaluator::new(&config, &["https://x/forced".to_string()])
    }

    #[test]
    fn test_threshold_with_single_positive_rule() {
        let e = evaluator(vec![ScoreRule::terms(6, &["apply"])], vec![], 5);

        assert!(e.is_relevant(&context("https://x/job", "Developer", "How to APPLY now")));
        assert!(!e.is_relevant(&context("https://x/job", "Developer", "No match here")));
        assert_eq!(e.score(&context("https://x/job", "Developer", "No match here")), 0);
    }

    #[test]
    fn test_negative_rules_subtract() {
        let e = evaluator(
            vec![ScoreRule::terms(6, &["apply"])],
            vec![ScoreRule::terms(4, &["expired"]), ScoreRule::terms(-3, &["closed"])],
            0,
        );
        let ctx = context("https://x/job", "Apply today", "Position expired and closed");
        assert_eq!(e.score(&ctx), -1);
        assert!(!e.is_relevant(&ctx));
    }

    #[test]
    fn test_positive_rules_add_score_as_configured() {
        let e = evaluator(vec![ScoreRule::terms(-3, &["apply"]), ScoreRule::terms(2, &["today"])], vec![], 0);
        assert_eq!(e.score(&context("https://x/job", "Apply today", "")), -1);
    }

    #[test]
    fn test_fragment_penalty() {
        let e = evaluator(vec![ScoreRule::terms(6, &["apply"])], vec![], 5);
        let ctx = context("https://x/job#section", "Apply", "");
        assert_eq!(e.score(&ctx), 4);
        assert!(!e.is_relevant(&ctx));
    }

    #[test]
    fn test_length_condition_replaces_terms() {
        let e = evaluator(
            vec![ScoreRule {
                score: 3,
                match_any_terms: vec!["never-present".to_string()],
                condition: Some(crate::config::LengthCondition {
                    operator: LengthOperator::GreaterThan,
                    chars: 10,
                }),
            }],
            vec![ScoreRule::length(5, LengthOperator::LessThan, 10)],
            0,
        );
        assert_eq!(e.score(&context("https://x/a", "A long enough title", "")), 3);
        assert_eq!(e.score(&context("https://x/a", "Tiny", "")), -5);
    }

    #[test]
    fn test_terms_match_across_collapsed_whitespace() {
        let e = evaluator(vec![ScoreRule::terms(1, &["Full  Time"])], vec![], 1);
        assert!(e.is_relevant(&context("https://x/a", "Job", "full\n   time role")));
    }

    #[test]
    fn test_forced_urls_never_relevant() {
        let e = evaluator(vec![ScoreRule::terms(6, &["apply"])], vec![], 5);
        assert!(!e.is_relevant(&context("https://x/forced", "Apply", "apply")));
    }
}
