//! Job store: the job list and saved filters, mirrored to persistence.
//!
//! Every mutation works on a copy of the state, writes the new snapshot under
//! `job-storage`, and only then replaces the in-memory state. A failed write
//! leaves the store unchanged. The lock is held across the write so snapshots
//! land in mutation order.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::models::{AtsAnalysisResult, CompanyInsights};
use crate::jobs::models::{
    AnalysisHistory, Job, JobFilters, JobStats, JobStatus, JobUpdate, NewJob, MAX_ANALYSIS_HISTORY,
};
use crate::persistence::{Persistence, StoreError};

pub const JOB_STORAGE_KEY: &str = "job-storage";
const SNAPSHOT_VERSION: u32 = 0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JobState {
    #[serde(default)]
    jobs: Vec<Job>,
    #[serde(default)]
    filters: JobFilters,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    state: JobState,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    state: &'a JobState,
    version: u32,
}

#[derive(Clone)]
pub struct JobStore {
    state: Arc<Mutex<JobState>>,
    persistence: Arc<dyn Persistence>,
}

impl JobStore {
    /// Opens the store, hydrating from the last persisted snapshot.
    /// An unreadable snapshot is logged and the store starts empty.
    pub async fn load(persistence: Arc<dyn Persistence>) -> Result<Self, StoreError> {
        let state = match persistence.load(JOB_STORAGE_KEY).await? {
            Some(raw) => match serde_json::from_str::<Snapshot>(&raw) {
                Ok(snapshot) => snapshot.state,
                Err(e) => {
                    warn!("Ignoring unreadable {JOB_STORAGE_KEY} snapshot: {e}");
                    JobState::default()
                }
            },
            None => JobState::default(),
        };

        info!("Job store loaded with {} job(s)", state.jobs.len());

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            persistence,
        })
    }

    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut JobState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = f(&mut next)?;

        let snapshot = serde_json::to_string(&SnapshotRef {
            state: &next,
            version: SNAPSHOT_VERSION,
        })?;
        self.persistence.save(JOB_STORAGE_KEY, &snapshot).await?;

        *state = next;
        Ok(out)
    }

    /// Applies `f` to one job, refreshing `last_updated`.
    async fn mutate_job<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Job) -> T,
    ) -> Result<T, StoreError> {
        self.mutate(|state| {
            let job = state
                .jobs
                .iter_mut()
                .find(|j| j.id == id)
                .ok_or(StoreError::JobNotFound(id))?;
            let out = f(job);
            job.last_updated = Utc::now();
            Ok(out)
        })
        .await
    }

    // ── CRUD ────────────────────────────────────────────────────────────────

    pub async fn add_job(&self, new: NewJob) -> Result<Job, StoreError> {
        let job = Job::from_new(new, Utc::now());
        let created = job.clone();
        self.mutate(|state| {
            state.jobs.push(job);
            Ok(())
        })
        .await?;
        info!("Created job {} ({} at {})", created.id, created.role, created.company);
        Ok(created)
    }

    pub async fn get_job(&self, id: Uuid) -> Option<Job> {
        self.state.lock().await.jobs.iter().find(|j| j.id == id).cloned()
    }

    pub async fn list_jobs(&self) -> Vec<Job> {
        self.state.lock().await.jobs.clone()
    }

    pub async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<Job, StoreError> {
        self.mutate_job(id, |job| {
            update.apply(job);
        })
        .await?;
        self.require(id).await
    }

    pub async fn delete_job(&self, id: Uuid) -> Result<(), StoreError> {
        self.mutate(|state| {
            let before = state.jobs.len();
            state.jobs.retain(|j| j.id != id);
            if state.jobs.len() == before {
                return Err(StoreError::JobNotFound(id));
            }
            Ok(())
        })
        .await?;
        info!("Deleted job {id}");
        Ok(())
    }

    pub async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<Job, StoreError> {
        self.mutate_job(id, |job| job.status = status).await?;
        self.require(id).await
    }

    // ── Resume attachment ───────────────────────────────────────────────────

    pub async fn attach_resume(&self, id: Uuid, file_id: Uuid) -> Result<Job, StoreError> {
        self.mutate_job(id, |job| {
            job.resume_file_id = Some(file_id);
            job.resume_uploaded_at = Some(Utc::now());
        })
        .await?;
        self.require(id).await
    }

    pub async fn remove_resume(&self, id: Uuid) -> Result<Job, StoreError> {
        self.mutate_job(id, |job| {
            job.resume_file_id = None;
            job.resume_uploaded_at = None;
        })
        .await?;
        self.require(id).await
    }

    /// Clears every reference to a deleted file. Returns how many jobs changed.
    pub async fn detach_file_references(&self, file_id: Uuid) -> Result<usize, StoreError> {
        let referenced = self
            .state
            .lock()
            .await
            .jobs
            .iter()
            .any(|j| j.resume_file_id == Some(file_id));
        if !referenced {
            return Ok(0);
        }

        self.mutate(|state| {
            let now = Utc::now();
            let mut changed = 0;
            for job in state.jobs.iter_mut().filter(|j| j.resume_file_id == Some(file_id)) {
                job.resume_file_id = None;
                job.resume_uploaded_at = None;
                job.last_updated = now;
                changed += 1;
            }
            Ok(changed)
        })
        .await
    }

    // ── Analysis results ────────────────────────────────────────────────────

    /// Stores an analysis as the job's current result and prepends it to the
    /// history, keeping the most recent `MAX_ANALYSIS_HISTORY` entries.
    pub async fn save_analysis(
        &self,
        id: Uuid,
        analysis: AtsAnalysisResult,
        insights: Option<CompanyInsights>,
    ) -> Result<AnalysisHistory, StoreError> {
        self.mutate_job(id, |job| {
            let now = Utc::now();
            let entry = AnalysisHistory {
                id: format!("analysis_{}", now.timestamp_millis()),
                analysis_date: now,
                ats_result: analysis.clone(),
                company_insights: insights.clone(),
                resume_file_id: job.resume_file_id.map(|f| f.to_string()).unwrap_or_default(),
                job_description_hash: job.description_hash(),
            };

            let history = job.analysis_history.get_or_insert_with(Vec::new);
            history.insert(0, entry.clone());
            history.truncate(MAX_ANALYSIS_HISTORY);

            job.current_analysis = Some(analysis);
            job.company_insights = insights;
            entry
        })
        .await
    }

    pub async fn analysis_history(&self, id: Uuid) -> Result<Vec<AnalysisHistory>, StoreError> {
        Ok(self.require(id).await?.analysis_history.unwrap_or_default())
    }

    /// Drops the current analysis and the whole history.
    pub async fn clear_analysis_history(&self, id: Uuid) -> Result<Job, StoreError> {
        self.mutate_job(id, |job| {
            job.current_analysis = None;
            job.analysis_history = Some(Vec::new());
        })
        .await?;
        self.require(id).await
    }

    // ── Filters, search, statistics ─────────────────────────────────────────

    pub async fn filters(&self) -> JobFilters {
        self.state.lock().await.filters.clone()
    }

    /// Merges `filters` into the saved filters.
    pub async fn set_filters(&self, filters: JobFilters) -> Result<JobFilters, StoreError> {
        self.mutate(|state| {
            state.filters.merge(filters);
            Ok(state.filters.clone())
        })
        .await
    }

    pub async fn clear_filters(&self) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.filters = JobFilters::default();
            Ok(())
        })
        .await
    }

    pub async fn filter_jobs(&self, filters: &JobFilters) -> Vec<Job> {
        self.state
            .lock()
            .await
            .jobs
            .iter()
            .filter(|j| filters.matches(j))
            .cloned()
            .collect()
    }

    /// Jobs matching the saved filters.
    pub async fn filtered_jobs(&self) -> Vec<Job> {
        let state = self.state.lock().await;
        state
            .jobs
            .iter()
            .filter(|j| state.filters.matches(j))
            .cloned()
            .collect()
    }

    pub async fn search_jobs(&self, query: &str) -> Vec<Job> {
        self.state
            .lock()
            .await
            .jobs
            .iter()
            .filter(|j| j.matches_query(query))
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> JobStats {
        JobStats::from_jobs(&self.state.lock().await.jobs)
    }

    /// Empties the store and its persisted snapshot.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        self.persistence.remove(JOB_STORAGE_KEY).await?;
        *state = JobState::default();
        Ok(())
    }

    async fn require(&self, id: Uuid) -> Result<Job, StoreError> {
        self.get_job(id).await.ok_or(StoreError::JobNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::{AnalysisMetadata, ConfidenceLevel};
    use crate::jobs::models::JobType;
    use crate::persistence::{MemoryPersistence, PersistenceError};
    use async_trait::async_trait;

    fn new_job(company: &str, role: &str) -> NewJob {
        NewJob {
            company: company.to_string(),
            role: role.to_string(),
            ..Default::default()
        }
    }

    fn analysis(score: u8) -> AtsAnalysisResult {
        AtsAnalysisResult {
            overall_score: score,
            keyword_match: score,
            format_score: score,
            content_quality: score,
            experience_match: score,
            skills_alignment: score,
            strengths: vec![],
            improvements: vec![],
            missing_keywords: vec![],
            analysis_metadata: AnalysisMetadata {
                processing_time: 10,
                word_count: 100,
                ai_model_used: "fake-model".to_string(),
                confidence_level: ConfidenceLevel::Medium,
                defaulted_fields: vec![],
            },
        }
    }

    async fn store() -> (JobStore, Arc<MemoryPersistence>) {
        let persistence = Arc::new(MemoryPersistence::default());
        let store = JobStore::load(persistence.clone()).await.unwrap();
        (store, persistence)
    }

    #[tokio::test]
    async fn test_add_job_persists_snapshot_layout() {
        let (store, persistence) = store().await;
        let job = store.add_job(new_job("Acme", "Engineer")).await.unwrap();

        let raw = persistence.load(JOB_STORAGE_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 0);
        assert_eq!(value["state"]["jobs"][0]["id"], job.id.to_string());
        assert_eq!(value["state"]["jobs"][0]["status"], "applied");
        assert!(value["state"]["filters"].is_object());
    }

    #[tokio::test]
    async fn test_store_rehydrates_from_persistence() {
        let (store, persistence) = store().await;
        let job = store.add_job(new_job("Acme", "Engineer")).await.unwrap();

        let reopened = JobStore::load(persistence).await.unwrap();
        assert_eq!(reopened.get_job(job.id).await, Some(job));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let persistence = Arc::new(MemoryPersistence::default());
        persistence.save(JOB_STORAGE_KEY, "{not json").await.unwrap();
        let store = JobStore::load(persistence).await.unwrap();
        assert!(store.list_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_refreshes_last_updated() {
        let (store, _) = store().await;
        let job = store.add_job(new_job("Acme", "Engineer")).await.unwrap();

        let updated = store
            .update_job(
                job.id,
                JobUpdate {
                    role: Some("Staff Engineer".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.role, "Staff Engineer");
        assert_eq!(updated.applied_date, job.applied_date);
        assert!(updated.last_updated >= job.last_updated);
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let (store, _) = store().await;
        let id = Uuid::new_v4();
        assert!(matches!(
            store.update_status(id, JobStatus::Offer).await,
            Err(StoreError::JobNotFound(_))
        ));
        assert!(matches!(store.delete_job(id).await, Err(StoreError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_job() {
        let (store, _) = store().await;
        let job = store.add_job(new_job("Acme", "Engineer")).await.unwrap();
        store.delete_job(job.id).await.unwrap();
        assert!(store.get_job(job.id).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_leaves_other_jobs_unchanged() {
        let (store, persistence) = store().await;
        let a = store.add_job(new_job("A", "Engineer")).await.unwrap();
        let b = store.add_job(new_job("B", "Designer")).await.unwrap();
        let c = store.add_job(new_job("C", "Manager")).await.unwrap();

        store.delete_job(b.id).await.unwrap();

        assert_eq!(store.list_jobs().await, vec![a.clone(), c.clone()]);
        let reopened = JobStore::load(persistence).await.unwrap();
        assert_eq!(reopened.list_jobs().await, vec![a, c]);
    }

    #[tokio::test]
    async fn test_filter_by_status_alone() {
        let (store, _) = store().await;
        let statuses = [
            JobStatus::Applied,
            JobStatus::Interview,
            JobStatus::Rejected,
            JobStatus::Interview,
            JobStatus::PhoneScreen,
        ];
        let mut interviews = Vec::new();
        for (i, status) in statuses.into_iter().enumerate() {
            let job = store.add_job(new_job(&format!("Co{i}"), "Engineer")).await.unwrap();
            let job = store.update_status(job.id, status).await.unwrap();
            if status == JobStatus::Interview {
                interviews.push(job);
            }
        }

        let filters = JobFilters {
            status: Some(JobStatus::Interview),
            ..Default::default()
        };
        assert_eq!(store.filter_jobs(&filters).await, interviews);
        assert_eq!(store.filter_jobs(&JobFilters::default()).await.len(), 5);
    }

    #[tokio::test]
    async fn test_attach_and_remove_resume() {
        let (store, _) = store().await;
        let job = store.add_job(new_job("Acme", "Engineer")).await.unwrap();
        let file_id = Uuid::new_v4();

        let attached = store.attach_resume(job.id, file_id).await.unwrap();
        assert_eq!(attached.resume_file_id, Some(file_id));
        assert!(attached.resume_uploaded_at.is_some());

        let removed = store.remove_resume(job.id).await.unwrap();
        assert!(removed.resume_file_id.is_none());
        assert!(removed.resume_uploaded_at.is_none());
    }

    #[tokio::test]
    async fn test_detach_file_references_only_touches_referencing_jobs() {
        let (store, _) = store().await;
        let a = store.add_job(new_job("A", "r")).await.unwrap();
        let b = store.add_job(new_job("B", "r")).await.unwrap();
        let c = store.add_job(new_job("C", "r")).await.unwrap();
        let file_id = Uuid::new_v4();
        let other_file = Uuid::new_v4();
        store.attach_resume(a.id, file_id).await.unwrap();
        store.attach_resume(b.id, file_id).await.unwrap();
        store.attach_resume(c.id, other_file).await.unwrap();

        assert_eq!(store.detach_file_references(file_id).await.unwrap(), 2);
        assert!(store.get_job(a.id).await.unwrap().resume_file_id.is_none());
        assert!(store.get_job(b.id).await.unwrap().resume_file_id.is_none());
        assert_eq!(store.get_job(c.id).await.unwrap().resume_file_id, Some(other_file));

        assert_eq!(store.detach_file_references(file_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_analysis_prepends_and_caps_history() {
        let (store, _) = store().await;
        let mut new = new_job("Acme", "Engineer");
        new.description = Some("Rust role".to_string());
        let job = store.add_job(new).await.unwrap();

        for score in 0..12u8 {
            store.save_analysis(job.id, analysis(score), None).await.unwrap();
        }

        let history = store.analysis_history(job.id).await.unwrap();
        assert_eq!(history.len(), MAX_ANALYSIS_HISTORY);
        assert_eq!(history[0].ats_result.overall_score, 11);
        assert_eq!(history[9].ats_result.overall_score, 2);
        assert_eq!(history[0].resume_file_id, "");
        assert!(history[0].id.starts_with("analysis_"));
        assert_eq!(history[0].job_description_hash, job.description_hash());

        let stored = store.get_job(job.id).await.unwrap();
        assert_eq!(stored.current_analysis.unwrap().overall_score, 11);
    }

    #[tokio::test]
    async fn test_clear_analysis_history() {
        let (store, _) = store().await;
        let job = store.add_job(new_job("Acme", "Engineer")).await.unwrap();
        store.save_analysis(job.id, analysis(70), None).await.unwrap();

        let cleared = store.clear_analysis_history(job.id).await.unwrap();
        assert!(cleared.current_analysis.is_none());
        assert!(store.analysis_history(job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_merge_and_filtered_jobs() {
        let (store, _) = store().await;
        let google = store.add_job(new_job("Google", "SWE")).await.unwrap();
        store.add_job(new_job("Meta", "SWE")).await.unwrap();
        store.update_status(google.id, JobStatus::Interview).await.unwrap();

        store
            .set_filters(JobFilters {
                company: Some("goo".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let merged = store
            .set_filters(JobFilters {
                status: Some(JobStatus::Interview),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(merged.company.as_deref(), Some("goo"));

        let filtered = store.filtered_jobs().await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, google.id);

        store.clear_filters().await.unwrap();
        assert_eq!(store.filtered_jobs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_filter_by_type_and_search() {
        let (store, _) = store().await;
        let mut contract = new_job("Initech", "Consultant");
        contract.job_type = Some(JobType::Contract);
        contract.location = Some("Austin, TX".to_string());
        store.add_job(contract).await.unwrap();
        store.add_job(new_job("Acme", "Engineer")).await.unwrap();

        let by_type = store
            .filter_jobs(&JobFilters {
                job_type: Some(JobType::Contract),
                ..Default::default()
            })
            .await;
        assert_eq!(by_type.len(), 1);

        assert_eq!(store.search_jobs("austin").await.len(), 1);
        assert_eq!(store.search_jobs("").await.len(), 2);
    }

    #[tokio::test]
    async fn test_stats_and_reset() {
        let (store, persistence) = store().await;
        let a = store.add_job(new_job("A", "r")).await.unwrap();
        store.add_job(new_job("B", "r")).await.unwrap();
        store.update_status(a.id, JobStatus::Rejected).await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.rejected, 1);

        store.reset().await.unwrap();
        assert_eq!(store.stats().await.total, 0);
        assert!(persistence.load(JOB_STORAGE_KEY).await.unwrap().is_none());
    }

    struct FailingPersistence;

    #[async_trait]
    impl Persistence for FailingPersistence {
        async fn load(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
            Ok(None)
        }

        async fn save(&self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::other("disk full")))
        }

        async fn remove(&self, _key: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let store = JobStore::load(Arc::new(FailingPersistence)).await.unwrap();
        let result = store.add_job(new_job("Acme", "Engineer")).await;
        assert!(matches!(result, Err(StoreError::Persistence(_))));
        assert!(store.list_jobs().await.is_empty());
    }
}
