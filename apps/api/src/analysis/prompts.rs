// Prompt builders for every AI-backed analysis feature.
// Pure string templating: no I/O, deterministic for a given input.

use crate::analysis::models::{AtsAnalysisResult, KeywordContext};
use crate::llm_client::prompts::{render_template, JSON_ONLY_INSTRUCTION, NO_INVENTION_INSTRUCTION};

pub struct AtsAnalysisInput<'a> {
    pub resume_text: &'a str,
    pub job_description: &'a str,
    pub company_name: Option<&'a str>,
}

pub struct ImprovementSuggestionsInput<'a> {
    pub resume_text: &'a str,
    pub job_description: &'a str,
    pub analysis: &'a AtsAnalysisResult,
}

const ATS_ANALYSIS_TEMPLATE: &str = r#"You are an expert ATS (Applicant Tracking System) analyst and senior recruitment technology consultant. You know how ATS keyword matching works and what recruiters screen for.

# TASK
Compare the candidate resume against the job description. Give realistic, calibrated scores and specific, actionable feedback.

{company_section}# JOB DESCRIPTION
{job_description}

# CANDIDATE RESUME
{resume_text}

# SCORING (each category 0-100)

1. Keyword Match (30% of overall)
   Exact keyword matches, semantic matches ("led team" for "leadership"), sensible density, keywords used in context.
   90+: all critical terms present in context. 70-79: key terms present with some gaps. Below 50: significant misalignment.

2. Content Quality (25%)
   Quantified achievements, strong action verbs, clarity, impact statements.
   90+: strong metrics and clear impact throughout. 60-69: adequate but lacks metrics. Below 50: unclear or ineffective.

3. Format Score (20%)
   ATS-parseable layout (no complex tables or images), clear section headers, consistent dates and bullets, scannable length.
   90+: optimal structure. 50-59: issues likely to cause parsing errors.

4. Experience Match (15%)
   Relevant titles and responsibilities, career progression, industry alignment.

5. Skills Alignment (10%)
   Required technical skills and soft skills, with demonstrated proficiency.

# CALIBRATION
Most resumes score between 60 and 80. 85+ is the top 5% of candidates; below 55 is the bottom 20%. Be realistic, neither generous nor harsh.

# FEEDBACK
- strengths: up to 5. Name the strength, point to where it appears, say why it matters for this role.
  Example: "Quantified sales impact - 'Increased revenue 45% in Q2 2023' shows measurable results this revenue-focused role asks for"
- improvements: up to 5. Say what to change, why it affects ATS ranking, and how to fix it.
  Example: "Add metrics to project bullets - e.g. 'Cut page load time by 40%' - so ATS and recruiters can see impact"
- missing_keywords: high-impact terms from the job description that the resume lacks.
- confidence_level: "high" (clear resume and complete description), "medium" (some ambiguity), or "low" (incomplete information).

# OUTPUT
{json_only}

Return exactly this structure:
{
  "overall_score": 75,
  "keyword_match": 78,
  "format_score": 85,
  "content_quality": 72,
  "experience_match": 70,
  "skills_alignment": 80,
  "strengths": ["Specific strength with context and example"],
  "improvements": ["Actionable improvement with how-to guidance"],
  "missing_keywords": ["Important keyword from the job description"],
  "confidence_level": "high"
}"#;

const KEYWORD_EXTRACTION_TEMPLATE: &str = r#"You are a recruiter and keyword extraction specialist for ATS screening.

# TASK
Extract keywords from this {context_label} and group them by category.
{context_guidance}

# INPUT TEXT
{text}

# CATEGORIES
- technical_skills: languages, frameworks, tools, platforms, databases, technical methodologies. e.g. ["Python", "React", "AWS", "PostgreSQL", "Docker"]
- soft_skills: communication, leadership, collaboration, problem-solving, work style. e.g. ["Team leadership", "Cross-functional collaboration"]
- experience_keywords: years of experience, seniority, job titles. e.g. ["5+ years experience", "Senior Software Engineer", "Tech Lead"]
- industry_terms: domain jargon, certifications, process methodologies, compliance standards. e.g. ["Agile", "AWS Certified Solutions Architect", "HIPAA", "FinTech"]

# RULES
{no_invention}
Put each keyword in exactly one category. Merge obvious duplicates ("React.js" and "React" become "React").

# OUTPUT
{json_only}

{
  "technical_skills": ["skill"],
  "soft_skills": ["skill"],
  "experience_keywords": ["keyword"],
  "industry_terms": ["term"]
}"#;

const JOB_PARSING_TEMPLATE: &str = r#"You are an HR data analyst who turns job postings into structured data.

# JOB DESCRIPTION
{job_description}

# FIELDS
- title: exact job title
- company: company name
- location: location or "Remote"
- salary: salary range exactly as stated
- experience_level: e.g. "5+ years", "Senior", "Entry-level"
- employment_type: e.g. "Full-time", "Contract", "Internship"
- requirements: explicitly stated requirements (degrees, years, must-have skills, work authorization)
- responsibilities: day-to-day duties
- skills: technical and soft skills named in the posting
- benefits: perks and benefits

# RULES
{no_invention}
Use null for missing scalar fields and [] for empty lists. Do not repeat an item across lists.

# OUTPUT
{json_only}

Example:
{
  "title": "Senior Full Stack Developer",
  "company": "TechCorp Inc",
  "location": "San Francisco, CA (Hybrid)",
  "salary": "$140,000 - $180,000",
  "experience_level": "5+ years",
  "employment_type": "Full-time",
  "requirements": ["5+ years of full-stack development experience"],
  "responsibilities": ["Design and build scalable web applications"],
  "skills": ["React", "Node.js", "PostgreSQL"],
  "benefits": ["401(k) with company match"]
}"#;

const IMPROVEMENT_SUGGESTIONS_TEMPLATE: &str = r#"You are a resume coach specializing in ATS optimization.

# TASK
Using the analysis results, write prioritized suggestions that will raise this resume's ATS score for this job.

# CANDIDATE RESUME
{resume_text}

# TARGET JOB DESCRIPTION
{job_description}

# ANALYSIS RESULTS
{analysis_json}

# PRIORITIES
- high_priority: issues likely to cause rejection (missing critical keywords, no quantified achievements, missing required skills, format that breaks parsing). Roughly 10-20 points of impact.
- medium_priority: clear quality gains (more relevant keywords, stronger achievement statements, better section order). Roughly 5-10 points.
- low_priority: polish (consistent formatting, summary refinements). Roughly 2-5 points.

Each suggestion has "suggestion" (the specific change), "reason" (why it matters), and "example" (before/after or concrete steps). Give 3-5 per priority.

Be specific to THIS resume and THIS job.
Bad: "Add more keywords".
Good: "Add 'React Hooks' and 'Redux' to Skills - they appear 8 times in the job description and nowhere in the resume".

# OUTPUT
{json_only}

{
  "high_priority": [{"suggestion": "", "reason": "", "example": ""}],
  "medium_priority": [{"suggestion": "", "reason": "", "example": ""}],
  "low_priority": [{"suggestion": "", "reason": "", "example": ""}]
}"#;

const COMPANY_INSIGHTS_TEMPLATE: &str = r#"You help candidates prepare for a role at {company_name}.

# JOB DESCRIPTION
{job_description}

# TASK
From the language of the job description, describe:
- company_values: what the company appears to value
- cultural_fit_tips: how a candidate can show cultural fit
- success_factors: what makes someone successful in this role
- competitive_advantages: what would make a candidate stand out

Base every point on the job description content.

# OUTPUT
{json_only}

{
  "company_values": [],
  "cultural_fit_tips": [],
  "success_factors": [],
  "competitive_advantages": []
}"#;

const PDF_EXTRACTION_PROMPT: &str = r#"You are a document extraction specialist for resumes and professional documents.

# TASK
Extract ALL text from the attached PDF, keeping its logical structure.

Cover contact information, summary, work experience (companies, titles, dates, achievements and metrics), education, skills and certifications, and any additional sections such as projects, publications, awards or languages.

# FORMAT
Plain text with line breaks between sections. Keep bullet structure, dates, numbers and special characters (%, $). Preserve original spelling and capitalization.

# CONSTRAINTS
Do NOT add commentary, interpretation, or information that is not in the document.
Do NOT include page numbers, headers or footers.
Do NOT wrap the output in JSON, markdown or code blocks.

Return ONLY the extracted text."#;

pub fn ats_analysis_prompt(input: &AtsAnalysisInput<'_>) -> String {
    let company_section = input
        .company_name
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("# TARGET COMPANY\n{c}\n\n"))
        .unwrap_or_default();

    render_template(
        ATS_ANALYSIS_TEMPLATE,
        &[
            ("company_section", &company_section),
            ("job_description", input.job_description),
            ("resume_text", input.resume_text),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

pub fn keyword_extraction_prompt(text: &str, context: KeywordContext) -> String {
    let (label, guidance) = match context {
        KeywordContext::Resume => (
            "resume",
            "Focus on skills the candidate claims, their experience level, and their industry domains.",
        ),
        KeywordContext::JobDescription => (
            "job description",
            "Focus on skills the employer requires, experience expectations, and industry-specific terms.",
        ),
    };

    render_template(
        KEYWORD_EXTRACTION_TEMPLATE,
        &[
            ("context_label", label),
            ("context_guidance", guidance),
            ("text", text),
            ("no_invention", NO_INVENTION_INSTRUCTION),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

pub fn job_parsing_prompt(job_description: &str) -> String {
    render_template(
        JOB_PARSING_TEMPLATE,
        &[
            ("job_description", job_description),
            ("no_invention", NO_INVENTION_INSTRUCTION),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

pub fn improvement_suggestions_prompt(input: &ImprovementSuggestionsInput<'_>) -> String {
    let analysis_json = serde_json::to_string_pretty(input.analysis).unwrap_or_default();
    render_template(
        IMPROVEMENT_SUGGESTIONS_TEMPLATE,
        &[
            ("resume_text", input.resume_text),
            ("job_description", input.job_description),
            ("analysis_json", &analysis_json),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

pub fn company_insights_prompt(company_name: &str, job_description: &str) -> String {
    render_template(
        COMPANY_INSIGHTS_TEMPLATE,
        &[
            ("company_name", company_name),
            ("job_description", job_description),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

pub fn pdf_extraction_prompt() -> &'static str {
    PDF_EXTRACTION_PROMPT
}
