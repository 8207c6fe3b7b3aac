// Resume file storage with validation and a storage quota.

pub mod handlers;
pub mod models;
pub mod store;
