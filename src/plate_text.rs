use regex::Regex;
use serde::{ Deserialize, Serialize };

use crate::config::PlateGrammar;
use crate::error::VrError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlateValidation {
    pub is_valid_format: bool,
    pub confidence: f32,
}

/// Cleans raw OCR output and checks it against the plate grammar
pub struct PlateTextNormalizer {
    grammar: PlateGrammar,
    pattern: Regex,
}

impl PlateTextNormalizer {

    pub fn new(grammar: PlateGrammar) -> Result<Self, VrError> {
        let pattern = Regex::new(&grammar.pattern())?;
        Ok(Self { grammar, pattern })
    }

    pub fn grammar(&self) -> &PlateGrammar {
        &self.grammar
    }

    /// Drops punctuation and whitespace, uppercases, keeps only `[A-Z0-9]`.
    /// `None` when nothing is left.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let stripped: String = raw.chars()
            .filter(|c| !self.grammar.noise_chars.contains(*c))
            .collect();
        let cleaned: String = stripped.to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .collect();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    pub fn is_valid_format(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Additive heuristic capped at 1.0, not a probability
    pub fn confidence(&self, text: &str) -> f32 {
        let grammar = &self.grammar;
        let within = |n: usize, (low, high): (usize, usize)| low <= n && n <= high;

        let length = text.chars().count();
        let letters = text.chars().filter(|c| c.is_ascii_uppercase()).count();
        let digits = text.chars().filter(|c| c.is_ascii_digit()).count();

        let mut score = 0.0;
        if within(length, grammar.length_band) {
            score += grammar.length_weight;
        }
        if self.is_valid_format(text) {
            score += grammar.format_weight;
        }
        if within(letters, grammar.letter_band) && within(digits, grammar.digit_band) {
            score += grammar.balance_weight;
        }
        score.min(1.0)
    }

    pub fn validate(&self, text: &str) -> PlateValidation {
        PlateValidation {
            is_valid_format: self.is_valid_format(text),
            confidence: self.confidence(text),
        }
    }
}
