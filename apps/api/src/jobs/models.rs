use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::models::{AtsAnalysisResult, CompanyInsights};

pub const DEFAULT_USER_ID: &str = "local-user";
/// Older entries are dropped once a job has this many analyses.
pub const MAX_ANALYSIS_HISTORY: usize = 10;
const DESCRIPTION_HASH_LEN: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    #[default]
    Applied,
    Reviewing,
    PhoneScreen,
    Interview,
    Waiting,
    Offer,
    Rejected,
    Withdrawn,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Internship,
}

/// One tracked job application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub user_id: String,
    pub company: String,
    pub role: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    pub applied_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_file_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_analysis: Option<AtsAnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_insights: Option<CompanyInsights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_history: Option<Vec<AnalysisHistory>>,
}

impl Job {
    /// Builds a new job from user input. The caller has validated `company` and `role`.
    pub fn from_new(new: NewJob, now: DateTime<Utc>) -> Self {
        Job {
            id: Uuid::new_v4(),
            user_id: new.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            company: new.company,
            role: new.role,
            location: new.location.unwrap_or_default(),
            job_type: new.job_type.unwrap_or_default(),
            status: new.status.unwrap_or_default(),
            salary: new.salary,
            description: new.description,
            requirements: new.requirements,
            applied_date: now,
            last_updated: now,
            notes: new.notes,
            contact_person: new.contact_person,
            contact_email: new.contact_email,
            job_url: new.job_url,
            resume_used: new.resume_used,
            cover_letter_used: new.cover_letter_used,
            resume_file_id: new.resume_file_id,
            resume_uploaded_at: new.resume_file_id.map(|_| now),
            current_analysis: None,
            company_insights: None,
            analysis_history: None,
        }
    }

    /// Case-insensitive substring match on company, role or location.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.company.to_lowercase().contains(&query)
            || self.role.to_lowercase().contains(&query)
            || self.location.to_lowercase().contains(&query)
    }

    /// Fingerprint of the current description, used to tell whether a past
    /// analysis was run against different job text.
    pub fn description_hash(&self) -> String {
        let encoded = STANDARD.encode(self.description.as_deref().unwrap_or_default());
        encoded.chars().take(DESCRIPTION_HASH_LEN).collect()
    }
}

/// Create input: everything except the server-assigned id and timestamps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub role: String,
    pub user_id: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub notes: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub job_url: Option<String>,
    pub resume_used: Option<String>,
    pub cover_letter_used: Option<String>,
    pub resume_file_id: Option<Uuid>,
}

/// Partial edit. Absent fields are left as they are.
///
/// Resume attachment and analysis results have their own operations and
/// cannot be set here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub user_id: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub notes: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub job_url: Option<String>,
    pub resume_used: Option<String>,
    pub cover_letter_used: Option<String>,
}

impl JobUpdate {
    pub fn apply(self, job: &mut Job) {
        overwrite(&mut job.user_id, self.user_id);
        overwrite(&mut job.company, self.company);
        overwrite(&mut job.role, self.role);
        overwrite(&mut job.location, self.location);
        overwrite(&mut job.job_type, self.job_type);
        overwrite(&mut job.status, self.status);
        overwrite_opt(&mut job.salary, self.salary);
        overwrite_opt(&mut job.description, self.description);
        overwrite_opt(&mut job.requirements, self.requirements);
        overwrite_opt(&mut job.notes, self.notes);
        overwrite_opt(&mut job.contact_person, self.contact_person);
        overwrite_opt(&mut job.contact_email, self.contact_email);
        overwrite_opt(&mut job.job_url, self.job_url);
        overwrite_opt(&mut job.resume_used, self.resume_used);
        overwrite_opt(&mut job.cover_letter_used, self.cover_letter_used);
    }
}

fn overwrite<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn overwrite_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisHistory {
    pub id: String,
    pub analysis_date: DateTime<Utc>,
    pub ats_result: AtsAnalysisResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_insights: Option<CompanyInsights>,
    /// Empty when the job had no resume attached.
    pub resume_file_id: String,
    pub job_description_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl JobFilters {
    /// Overlays the fields set in `other`.
    pub fn merge(&mut self, other: JobFilters) {
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.job_type.is_some() {
            self.job_type = other.job_type;
        }
        if other.company.is_some() {
            self.company = other.company;
        }
    }

    /// Status and type match exactly; company is a case-insensitive substring.
    /// An empty company filter matches everything.
    pub fn matches(&self, job: &Job) -> bool {
        if self.status.is_some_and(|s| s != job.status) {
            return false;
        }
        if self.job_type.is_some_and(|t| t != job.job_type) {
            return false;
        }
        match self.company.as_deref() {
            Some(company) if !company.is_empty() => job
                .company
                .to_lowercase()
                .contains(&company.to_lowercase()),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub total: usize,
    pub applied: usize,
    /// Phone screens and interviews.
    pub interviewing: usize,
    pub offers: usize,
    pub rejected: usize,
}

impl JobStats {
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let count = |pred: fn(JobStatus) -> bool| jobs.iter().filter(|j| pred(j.status)).count();
        JobStats {
            total: jobs.len(),
            applied: count(|s| s == JobStatus::Applied),
            interviewing: count(|s| matches!(s, JobStatus::PhoneScreen | JobStatus::Interview)),
            offers: count(|s| s == JobStatus::Offer),
            rejected: count(|s| s == JobStatus::Rejected),
        }
    }
}
