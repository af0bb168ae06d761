//! Persistence ports and their adapters
//!
//! Handlers and services only see the store traits below. Two adapters exist:
//! PostgreSQL via sqlx, and an in-memory store used when no database is
//! configured and throughout the tests.

mod memory;
mod pool;
mod postgres;

pub use memory::MemoryStore;
pub use pool::{create_pool, run_migrations};
pub use postgres::PgStore;

use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated. Carries what clashed.
    #[error("{0} already exists")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Duplicate` when the username or email is taken.
    async fn create(&self, user: NewUser) -> StoreResult<User>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_many(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    /// Matches the username exactly or the email case-insensitively.
    async fn find_by_login(&self, identifier: &str) -> StoreResult<Option<User>>;
    async fn list(&self) -> StoreResult<Vec<User>>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    async fn insert(&self, complaint: NewComplaint) -> StoreResult<Complaint>;
    async fn find(&self, id: Uuid) -> StoreResult<Option<Complaint>>;
    /// Newest first.
    async fn list(&self, query: ComplaintQuery) -> StoreResult<Vec<Complaint>>;
    /// Writes the mutable fields of one record in a single statement.
    /// Owner, creation time, notes and the archive flag are never touched.
    /// Last write wins.
    async fn save(&self, complaint: &Complaint) -> StoreResult<Option<Complaint>>;
    async fn append_note(&self, id: Uuid, note: InternalNote) -> StoreResult<Option<Complaint>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    /// Flags every non-archived complaint created before `cutoff`; returns how many changed.
    async fn archive_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Category>>;
    async fn create(&self, name: &str) -> StoreResult<Category>;
    async fn rename(&self, id: Uuid, name: &str) -> StoreResult<Option<Category>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait DepartmentStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Department>>;
    async fn create(&self, name: &str, manager_id: Option<Uuid>) -> StoreResult<Department>;
    async fn update(&self, id: Uuid, changes: DepartmentChanges) -> StoreResult<Option<Department>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn record(&self, description: &str) -> StoreResult<Activity>;
    /// Newest first.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<Activity>>;
}

/// The full set of stores the application runs against
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub complaints: Arc<dyn ComplaintStore>,
    pub categories: Arc<dyn CategoryStore>,
    pub departments: Arc<dyn DepartmentStore>,
    pub activities: Arc<dyn ActivityStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_shared(Arc::new(PgStore::new(pool)))
    }

    pub fn in_memory() -> Self {
        Self::from_shared(Arc::new(MemoryStore::default()))
    }

    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + ComplaintStore + CategoryStore + DepartmentStore + ActivityStore + 'static,
    {
        Self {
            users: store.clone(),
            complaints: store.clone(),
            categories: store.clone(),
            departments: store.clone(),
            activities: store,
        }
    }
}
