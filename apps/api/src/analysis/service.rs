//! AI-backed analysis operations.
//!
//! Each function builds its prompt, calls the gateway in JSON mode and returns
//! a typed result. Failures are returned, never replaced with placeholder data.

use std::time::Instant;

use serde_json::Value;
use tracing::info;

use crate::analysis::models::{
    AnalysisMetadata, AtsAnalysisResult, CategorizedSuggestions, CompanyInsights,
    ExtractedKeywords, KeywordContext, ParsedJobDescription,
};
use crate::analysis::normalizer::normalize;
use crate::analysis::prompts::{
    ats_analysis_prompt, company_insights_prompt, improvement_suggestions_prompt,
    job_parsing_prompt, keyword_extraction_prompt, AtsAnalysisInput, ImprovementSuggestionsInput,
};
use crate::llm_client::{generate_json, AiGateway, LlmError};

/// Scores a resume against a job description.
///
/// Flow: prompt → gateway (JSON mode) → normalizer → result with metadata.
/// `processing_time` covers the whole flow, `word_count` counts
/// whitespace-separated tokens of the resume.
pub async fn analyze_resume_for_ats(
    gateway: &dyn AiGateway,
    input: &AtsAnalysisInput<'_>,
) -> Result<AtsAnalysisResult, LlmError> {
    let started = Instant::now();

    let prompt = ats_analysis_prompt(input);
    let raw: Value = generate_json(gateway, &prompt).await?;
    let normalized = normalize(&raw)?;

    let processing_time = started.elapsed().as_millis() as u64;
    let word_count = input.resume_text.split_whitespace().count();

    info!(
        "ATS analysis complete: overall={} words={} in {}ms",
        normalized.overall_score, word_count, processing_time
    );

    Ok(AtsAnalysisResult {
        overall_score: normalized.overall_score,
        keyword_match: normalized.scores.keyword_match,
        format_score: normalized.scores.format_score,
        content_quality: normalized.scores.content_quality,
        experience_match: normalized.scores.experience_match,
        skills_alignment: normalized.scores.skills_alignment,
        strengths: normalized.strengths,
        improvements: normalized.improvements,
        missing_keywords: normalized.missing_keywords,
        analysis_metadata: AnalysisMetadata {
            processing_time,
            word_count,
            ai_model_used: gateway.model().to_string(),
            confidence_level: normalized.confidence_level,
            defaulted_fields: normalized.defaulted_fields,
        },
    })
}

pub async fn parse_job_description(
    gateway: &dyn AiGateway,
    job_description: &str,
) -> Result<ParsedJobDescription, LlmError> {
    generate_json(gateway, &job_parsing_prompt(job_description)).await
}

pub async fn extract_keywords(
    gateway: &dyn AiGateway,
    text: &str,
    context: KeywordContext,
) -> Result<ExtractedKeywords, LlmError> {
    generate_json(gateway, &keyword_extraction_prompt(text, context)).await
}

pub async fn generate_improvement_suggestions(
    gateway: &dyn AiGateway,
    input: &ImprovementSuggestionsInput<'_>,
) -> Result<CategorizedSuggestions, LlmError> {
    let suggestions: CategorizedSuggestions =
        generate_json(gateway, &improvement_suggestions_prompt(input)).await?;
    info!("Generated {} improvement suggestions", suggestions.len());
    Ok(suggestions)
}

pub async fn generate_company_insights(
    gateway: &dyn AiGateway,
    company_name: &str,
    job_description: &str,
) -> Result<CompanyInsights, LlmError> {
    generate_json(gateway, &company_insights_prompt(company_name, job_description)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::ConfidenceLevel;
    use crate::llm_client::testing::FakeGateway;

    fn input() -> AtsAnalysisInput<'static> {
        AtsAnalysisInput {
            resume_text: "Jane Doe\nSenior Rust engineer, 7 years",
            job_description: "We need a Rust engineer",
            company_name: Some("Acme"),
        }
    }

    #[tokio::test]
    async fn test_analysis_recomputes_overall_and_fills_metadata() {
        let gateway = FakeGateway::with_responses(vec![Ok(r#"{
            "overall_score": 3,
            "keyword_match": 150,
            "format_score": 80,
            "content_quality": 70,
            "experience_match": 60,
            "skills_alignment": 50,
            "strengths": ["Rust"],
            "improvements": ["Metrics"],
            "missing_keywords": ["Tokio"],
            "confidence_level": "high"
        }"#
        .to_string())]);

        let result = analyze_resume_for_ats(&gateway, &input()).await.unwrap();

        assert_eq!(result.keyword_match, 100);
        // 30 + 17.5 + 16 + 9 + 5 = 77.5
        assert_eq!(result.overall_score, 78);
        assert_eq!(result.analysis_metadata.word_count, 7);
        assert_eq!(result.analysis_metadata.ai_model_used, "fake-model");
        assert_eq!(result.analysis_metadata.confidence_level, ConfidenceLevel::High);
        assert!(result.analysis_metadata.defaulted_fields.is_empty());
        assert!(gateway.prompts()[0].contains("Senior Rust engineer"));
    }

    #[tokio::test]
    async fn test_analysis_with_only_one_score_defaults_the_rest() {
        let gateway =
            FakeGateway::with_responses(vec![Ok(r#"{"keyword_match": 80}"#.to_string())]);
        let result = analyze_resume_for_ats(&gateway, &input()).await.unwrap();

        assert_eq!(result.overall_score, 24);
        assert_eq!(result.analysis_metadata.confidence_level, ConfidenceLevel::Medium);
        assert!(result
            .analysis_metadata
            .defaulted_fields
            .contains(&"skills_alignment".to_string()));
    }

    #[tokio::test]
    async fn test_analysis_propagates_non_json_reply() {
        let gateway =
            FakeGateway::with_responses(vec![Ok("I cannot analyze this.".to_string())]);
        let err = analyze_resume_for_ats(&gateway, &input()).await.unwrap_err();
        assert!(matches!(err, LlmError::Schema(_)));
    }

    #[tokio::test]
    async fn test_analysis_propagates_gateway_error() {
        let gateway = FakeGateway::with_responses(vec![Err(LlmError::Api {
            status: 500,
            message: "boom".to_string(),
        })]);
        let err = analyze_resume_for_ats(&gateway, &input()).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_parse_job_description_fills_missing_lists() {
        let gateway = FakeGateway::with_responses(vec![Ok(
            r#"{"title": "Backend Engineer", "company": null, "skills": ["Rust", "SQL"]}"#
                .to_string(),
        )]);
        let parsed = parse_job_description(&gateway, "jd").await.unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Backend Engineer"));
        assert_eq!(parsed.skills.len(), 2);
        assert!(parsed.requirements.is_empty());
    }

    #[tokio::test]
    async fn test_extract_keywords_uses_context_prompt() {
        let gateway = FakeGateway::with_responses(vec![Ok(
            r#"{"technical_skills": ["Rust"], "industry_terms": ["FinTech"]}"#.to_string(),
        )]);
        let keywords = extract_keywords(&gateway, "Rust at a FinTech", KeywordContext::JobDescription)
            .await
            .unwrap();
        assert_eq!(keywords.technical_skills, vec!["Rust"]);
        assert!(keywords.soft_skills.is_empty());
        assert!(gateway.prompts()[0].contains("this job description"));
    }

    #[tokio::test]
    async fn test_company_insights_schema_mismatch() {
        let gateway = FakeGateway::with_responses(vec![Ok(r#""a plain sentence""#.to_string())]);
        let err = generate_company_insights(&gateway, "Acme", "jd").await.unwrap_err();
        assert!(matches!(err, LlmError::Schema(_)));
    }
}
