//! Score Normalizer — turns whatever the model sent back into a validated
//! ATS score set.
//!
//! Rules:
//! - every sub-score is rounded, then clamped into 0..=100
//! - missing or non-numeric sub-scores become 0 and are reported in
//!   `defaulted_fields`
//! - overall = round(0.30·keyword + 0.25·content + 0.20·format
//!   + 0.15·experience + 0.10·skills), computed in integer percent so
//!   half-way cases always round up
//! - string lists are truncated to 5 / 5 / 10 entries
//!
//! A reply that is not a JSON object at all is a schema error, not a zero score.

use serde_json::{Map, Value};
use tracing::warn;

use crate::analysis::models::ConfidenceLevel;
use crate::llm_client::LlmError;

pub const MAX_STRENGTHS: usize = 5;
pub const MAX_IMPROVEMENTS: usize = 5;
pub const MAX_MISSING_KEYWORDS: usize = 10;

/// Sub-score weights in whole percent. Must sum to 100.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub keyword_match: u32,
    pub content_quality: u32,
    pub format_score: u32,
    pub experience_match: u32,
    pub skills_alignment: u32,
}

pub const ATS_WEIGHTS: ScoreWeights = ScoreWeights {
    keyword_match: 30,
    content_quality: 25,
    format_score: 20,
    experience_match: 15,
    skills_alignment: 10,
};

/// The five clamped sub-scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubScores {
    pub keyword_match: u8,
    pub format_score: u8,
    pub content_quality: u8,
    pub experience_match: u8,
    pub skills_alignment: u8,
}

impl SubScores {
    /// Weighted overall score, rounded half-up.
    pub fn overall(&self, weights: &ScoreWeights) -> u8 {
        let total = weights.keyword_match * u32::from(self.keyword_match)
            + weights.content_quality * u32::from(self.content_quality)
            + weights.format_score * u32::from(self.format_score)
            + weights.experience_match * u32::from(self.experience_match)
            + weights.skills_alignment * u32::from(self.skills_alignment);
        // each term ≤ weight·100 and weights sum to 100, so this fits in 0..=100
        ((total + 50) / 100).min(100) as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAnalysis {
    pub overall_score: u8,
    pub scores: SubScores,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub confidence_level: ConfidenceLevel,
    pub defaulted_fields: Vec<String>,
}

/// Rounds and clamps one raw score. Non-finite input is treated as 0.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Reads a numeric score from a JSON value. Accepts numbers and numeric strings.
fn read_score(value: Option<&Value>) -> Option<u8> {
    let raw = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(clamp_score(raw))
}

/// Keeps the string entries of an array, up to `limit`.
fn read_string_list(value: Option<&Value>, limit: usize) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(limit)
            .map(String::from)
            .collect(),
    )
}

/// Validates a raw model reply. Errors only when the reply is not an object.
pub fn normalize(raw: &Value) -> Result<NormalizedAnalysis, LlmError> {
    let obj = raw.as_object().ok_or_else(|| {
        LlmError::Schema(format!(
            "expected a JSON object with ATS scores, got {}",
            json_kind(raw)
        ))
    })?;

    Ok(normalize_object(obj))
}

fn normalize_object(obj: &Map<String, Value>) -> NormalizedAnalysis {
    let mut defaulted = Vec::new();

    let mut score = |field: &str| -> u8 {
        read_score(obj.get(field)).unwrap_or_else(|| {
            defaulted.push(field.to_string());
            0
        })
    };

    let scores = SubScores {
        keyword_match: score("keyword_match"),
        format_score: score("format_score"),
        content_quality: score("content_quality"),
        experience_match: score("experience_match"),
        skills_alignment: score("skills_alignment"),
    };

    let mut list = |field: &str, limit: usize| -> Vec<String> {
        read_string_list(obj.get(field), limit).unwrap_or_else(|| {
            defaulted.push(field.to_string());
            Vec::new()
        })
    };

    let strengths = list("strengths", MAX_STRENGTHS);
    let improvements = list("improvements", MAX_IMPROVEMENTS);
    let missing_keywords = list("missing_keywords", MAX_MISSING_KEYWORDS);

    let confidence_level = obj
        .get("confidence_level")
        .and_then(Value::as_str)
        .and_then(ConfidenceLevel::parse)
        .unwrap_or_default();

    if !defaulted.is_empty() {
        warn!(
            "ATS reply was missing or malformed in {} field(s), defaulted: {}",
            defaulted.len(),
            defaulted.join(", ")
        );
    }

    NormalizedAnalysis {
        overall_score: scores.overall(&ATS_WEIGHTS),
        scores,
        strengths,
        improvements,
        missing_keywords,
        confidence_level,
        defaulted_fields: defaulted,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expected_overall(k: u8, c: u8, f: u8, e: u8, s: u8) -> u8 {
        (0.30 * k as f64 + 0.25 * c as f64 + 0.20 * f as f64 + 0.15 * e as f64 + 0.10 * s as f64)
            .round() as u8
    }

    #[test]
    fn test_weights_sum_to_100() {
        let w = ATS_WEIGHTS;
        assert_eq!(
            w.keyword_match
                + w.content_quality
                + w.format_score
                + w.experience_match
                + w.skills_alignment,
            100
        );
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let raw = json!({
            "keyword_match": 140,
            "format_score": -20,
            "content_quality": 100.4,
            "experience_match": 1e9,
            "skills_alignment": -0.4,
        });
        let n = normalize(&raw).unwrap();
        assert_eq!(n.scores.keyword_match, 100);
        assert_eq!(n.scores.format_score, 0);
        assert_eq!(n.scores.content_quality, 100);
        assert_eq!(n.scores.experience_match, 100);
        assert_eq!(n.scores.skills_alignment, 0);
    }

    #[test]
    fn test_clamped_scores_stay_in_range_across_inputs() {
        for raw in [-1e6, -101.0, -0.5, 0.0, 0.49, 50.5, 99.5, 100.0, 100.5, 250.0, 1e12] {
            let s = clamp_score(raw);
            assert!(s <= 100, "{raw} produced {s}");
        }
        assert_eq!(clamp_score(f64::NAN), 0);
        assert_eq!(clamp_score(f64::INFINITY), 100);
        assert_eq!(clamp_score(f64::NEG_INFINITY), 0);
    }

    #[test]
    fn test_overall_is_weighted_sum_of_clamped_scores() {
        let raw = json!({
            "overall_score": 12,
            "keyword_match": 78,
            "format_score": 85,
            "content_quality": 72,
            "experience_match": 70,
            "skills_alignment": 80,
        });
        let n = normalize(&raw).unwrap();
        // 23.4 + 18 + 17 + 10.5 + 8 = 76.9
        assert_eq!(n.overall_score, 77);
        assert_eq!(n.overall_score, expected_overall(78, 72, 85, 70, 80));
    }

    #[test]
    fn test_overall_matches_float_formula_on_a_grid() {
        let values = [0u8, 1, 17, 33, 50, 64, 99, 100];
        for &k in &values {
            for &c in &values {
                for &f in &values {
                    let scores = SubScores {
                        keyword_match: k,
                        content_quality: c,
                        format_score: f,
                        experience_match: c,
                        skills_alignment: k,
                    };
                    let exact = 30 * k as u32 + 25 * c as u32 + 20 * f as u32 + 15 * c as u32 + 10 * k as u32;
                    // skip exact .5 ties where float rounding is ambiguous
                    if exact % 100 == 50 {
                        continue;
                    }
                    assert_eq!(scores.overall(&ATS_WEIGHTS), expected_overall(k, c, f, c, k));
                }
            }
        }
    }

    #[test]
    fn test_half_way_overall_rounds_up() {
        // 0.30·5 = 1.5
        let scores = SubScores {
            keyword_match: 5,
            ..Default::default()
        };
        assert_eq!(scores.overall(&ATS_WEIGHTS), 2);
    }

    #[test]
    fn test_missing_scores_default_to_zero_and_are_reported() {
        let raw = json!({ "keyword_match": 90, "strengths": ["clear"], "improvements": [], "missing_keywords": [] });
        let n = normalize(&raw).unwrap();
        assert_eq!(n.scores.keyword_match, 90);
        assert_eq!(n.scores.format_score, 0);
        assert_eq!(n.overall_score, 27);
        assert_eq!(
            n.defaulted_fields,
            vec![
                "format_score",
                "content_quality",
                "experience_match",
                "skills_alignment"
            ]
        );
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let raw = json!({ "keyword_match": "75", "format_score": "not a number" });
        let n = normalize(&raw).unwrap();
        assert_eq!(n.scores.keyword_match, 75);
        assert_eq!(n.scores.format_score, 0);
        assert!(n.defaulted_fields.contains(&"format_score".to_string()));
    }

    #[test]
    fn test_lists_are_truncated() {
        let many: Vec<String> = (0..20).map(|i| format!("item {i}")).collect();
        let raw = json!({
            "strengths": many,
            "improvements": many,
            "missing_keywords": many,
        });
        let n = normalize(&raw).unwrap();
        assert_eq!(n.strengths.len(), MAX_STRENGTHS);
        assert_eq!(n.improvements.len(), MAX_IMPROVEMENTS);
        assert_eq!(n.missing_keywords.len(), MAX_MISSING_KEYWORDS);
        assert_eq!(n.strengths[0], "item 0");
    }

    #[test]
    fn test_non_array_lists_become_empty() {
        let raw = json!({ "strengths": "great resume", "improvements": null, "missing_keywords": [1, "Kafka", {}] });
        let n = normalize(&raw).unwrap();
        assert!(n.strengths.is_empty());
        assert!(n.improvements.is_empty());
        assert_eq!(n.missing_keywords, vec!["Kafka"]);
        assert!(n.defaulted_fields.contains(&"strengths".to_string()));
    }

    #[test]
    fn test_confidence_defaults_to_medium() {
        let n = normalize(&json!({})).unwrap();
        assert_eq!(n.confidence_level, ConfidenceLevel::Medium);

        let n = normalize(&json!({ "confidence_level": "high" })).unwrap();
        assert_eq!(n.confidence_level, ConfidenceLevel::High);
    }

    #[test]
    fn test_non_object_reply_is_schema_error() {
        assert!(matches!(normalize(&json!([1, 2, 3])), Err(LlmError::Schema(_))));
        assert!(matches!(normalize(&json!("75")), Err(LlmError::Schema(_))));
    }
}
