use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

pub const LABELS: [&str; 3] = ["negative", "neutral", "positive"];

/// Sentiment of one text: a label plus the distribution it was drawn from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: String,
    pub probabilities: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SentimentClassifier;

impl SentimentClassifier {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count). A negator within the previous 1..=3
    /// tokens inverts the sign of a word's lexicon score.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let w = tokens[i].as_str();
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let base = self.word_score(w);
            if base != 0 {
                score += if negated { -base } else { base };
            }
        }

        (score, tokens.len())
    }

    /// Map a text to a label and a distribution over the three labels via a
    /// softmax of the lexicon score.
    pub fn classify(&self, text: &str) -> SentimentResult {
        let (score, _) = self.score_text(text);
        let z = score as f64 * 0.6;
        // Neutral carries a small fixed bias so an even score stays neutral.
        let logits = [-z, 0.5, z];

        let max = logits.iter().cloned().fold(f64::MIN, f64::max);
        let exp: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exp.iter().sum();

        let mut probabilities = HashMap::with_capacity(LABELS.len());
        let mut best = 0usize;
        for (i, label) in LABELS.iter().enumerate() {
            let p = exp[i] / total;
            probabilities.insert(label.to_string(), p);
            if exp[i] > exp[best] {
                best = i;
            }
        }

        SentimentResult {
            label: LABELS[best].to_string(),
            probabilities,
        }
    }

    pub fn classify_texts<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SentimentResult> {
        texts.iter().map(|t| self.classify(t.as_ref())).collect()
    }
}

/// Alphanumeric tokens, lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tok: &str) -> bool {
    // Contraction stems ("isn't" tokenizes to "isn", "t") are listed as
    // their stems; ambiguous words like "can"/"won" are deliberately absent.
    matches!(
        tok,
        "not" | "no" | "never" | "isn" | "wasn" | "aren" | "doesn" | "didn" | "cannot" | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_text_scores_positive() {
        let c = SentimentClassifier::new();
        let res = c.classify("Markets rally as stocks surge on strong gains");
        assert_eq!(res.label, "positive");
        assert!(res.probabilities["positive"] > res.probabilities["negative"]);
    }

    #[test]
    fn negative_text_scores_negative() {
        let c = SentimentClassifier::new();
        let res = c.classify("Shares crash amid recession fears and heavy losses");
        assert_eq!(res.label, "negative");
    }

    #[test]
    fn neutral_text_stays_neutral() {
        let c = SentimentClassifier::new();
        let res = c.classify("The committee meets on Thursday");
        assert_eq!(res.label, "neutral");
    }

    #[test]
    fn negation_flips_polarity() {
        let c = SentimentClassifier::new();
        let (plain, _) = c.score_text("strong growth");
        let (negated, _) = c.score_text("no strong growth");
        assert!(plain > 0);
        assert!(negated < 0);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let c = SentimentClassifier::new();
        let res = c.classify("Oil prices rise on OPEC cut");
        let total: f64 = res.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(res.probabilities.len(), 3);
    }
}
