// Job tracker: applications, their statuses, attached resumes and analysis history.

pub mod handlers;
pub mod models;
pub mod store;
