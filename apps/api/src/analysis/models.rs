use serde::{Deserialize, Serialize};

/// How much the model trusts its own analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    #[default]
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Lenient parse of the model's `confidence_level` field.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Milliseconds spent from prompt construction to normalized result.
    pub processing_time: u64,
    pub word_count: usize,
    pub ai_model_used: String,
    pub confidence_level: ConfidenceLevel,
    /// Fields the model omitted or sent in an unusable form; they were zeroed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted_fields: Vec<String>,
}

/// ATS compatibility of one resume against one job description.
///
/// `overall_score` is always the fixed-weight combination of the five
/// sub-scores, each in 0..=100 (see `normalizer`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsAnalysisResult {
    pub overall_score: u8,
    pub keyword_match: u8,
    pub format_score: u8,
    pub content_quality: u8,
    pub experience_match: u8,
    pub skills_alignment: u8,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub analysis_metadata: AnalysisMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedKeywords {
    #[serde(default)]
    pub technical_skills: Vec<String>,
    #[serde(default)]
    pub soft_skills: Vec<String>,
    #[serde(default)]
    pub experience_keywords: Vec<String>,
    #[serde(default)]
    pub industry_terms: Vec<String>,
}

/// Which side of the match a keyword extraction is run on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordContext {
    #[default]
    Resume,
    JobDescription,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedJobDescription {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub experience_level: Option<String>,
    pub employment_type: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementSuggestion {
    pub suggestion: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorizedSuggestions {
    #[serde(default)]
    pub high_priority: Vec<ImprovementSuggestion>,
    #[serde(default)]
    pub medium_priority: Vec<ImprovementSuggestion>,
    #[serde(default)]
    pub low_priority: Vec<ImprovementSuggestion>,
}

impl CategorizedSuggestions {
    pub fn len(&self) -> usize {
        self.high_priority.len() + self.medium_priority.len() + self.low_priority.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInsights {
    #[serde(default)]
    pub company_values: Vec<String>,
    #[serde(default)]
    pub cultural_fit_tips: Vec<String>,
    #[serde(default)]
    pub success_factors: Vec<String>,
    #[serde(default)]
    pub competitive_advantages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_level_parse_is_lenient() {
        assert_eq!(ConfidenceLevel::parse(" HIGH "), Some(ConfidenceLevel::High));
        assert_eq!(ConfidenceLevel::parse("low"), Some(ConfidenceLevel::Low));
        assert_eq!(ConfidenceLevel::parse("certain"), None);
    }

    #[test]
    fn test_confidence_level_serializes_lowercase() {
        let json = serde_json::to_string(&ConfidenceLevel::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }

    #[test]
    fn test_parsed_job_description_tolerates_nulls_and_missing_lists() {
        let json = r#"{"title": "Senior Engineer", "company": null, "skills": ["Rust"]}"#;
        let parsed: ParsedJobDescription = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Senior Engineer"));
        assert!(parsed.company.is_none());
        assert_eq!(parsed.skills, vec!["Rust"]);
        assert!(parsed.benefits.is_empty());
    }

    #[test]
    fn test_suggestions_without_example() {
        let json = r#"{"high_priority": [{"suggestion": "Add Kubernetes", "reason": "Required"}]}"#;
        let parsed: CategorizedSuggestions = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed.high_priority[0].example.is_none());
    }
}
