//! Storage facade used by the binary and by embedders.
//!
//! A `Store` may be built without a database (for instance when no storage is
//! configured). In that state every read returns an empty collection, so the task
//! list is simply empty, while every write fails with [`StoreError::Unconfigured`].

use crate::db::{self, Pool, StoreError};
use crate::model::{
    AssignedContact, Assignment, CompletionMark, Contact, ContactPatch, DashboardStats, NamedRef,
    NewContact, NewStep, SequenceStep, SequenceWithSteps,
};
use crate::tasks::TaskSource;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Store {
    pool: Option<Pool>,
}

impl Store {
    pub fn new(pool: Pool) -> Self {
        Self { pool: Some(pool) }
    }

    pub fn unconfigured() -> Self {
        warn!("storage is not configured; reads return empty results");
        Self { pool: None }
    }

    /// Open the database at `database_url` and bring its schema up to date.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = db::init_pool(database_url).await?;
        db::run_migrations(&pool).await?;
        info!("storage ready");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> Option<&Pool> {
        self.pool.as_ref()
    }

    fn writable(&self) -> Result<&Pool> {
        self.pool
            .as_ref()
            .ok_or_else(|| StoreError::Unconfigured.into())
    }

    // ---- writes ----

    pub async fn ensure_user(&self, user_id: &str, email: Option<&str>) -> Result<()> {
        db::ensure_user(self.writable()?, user_id, email).await
    }

    pub async fn create_contact(&self, user_id: &str, input: &NewContact) -> Result<String> {
        db::create_contact(self.writable()?, user_id, input).await
    }

    pub async fn update_contact(
        &self,
        user_id: &str,
        contact_id: &str,
        patch: &ContactPatch,
    ) -> Result<()> {
        db::update_contact(self.writable()?, user_id, contact_id, patch).await
    }

    pub async fn delete_contact(&self, user_id: &str, contact_id: &str) -> Result<()> {
        db::delete_contact(self.writable()?, user_id, contact_id).await
    }

    pub async fn create_sequence(
        &self,
        user_id: &str,
        name: &str,
        steps: &[NewStep],
    ) -> Result<String> {
        db::create_sequence(self.writable()?, user_id, name, steps).await
    }

    pub async fn assign_contacts(
        &self,
        user_id: &str,
        sequence_id: &str,
        contact_ids: &[String],
    ) -> Result<u64> {
        self.assign_contacts_at(user_id, sequence_id, contact_ids, Utc::now())
            .await
    }

    pub async fn assign_contacts_at(
        &self,
        user_id: &str,
        sequence_id: &str,
        contact_ids: &[String],
        assigned_at: DateTime<Utc>,
    ) -> Result<u64> {
        db::assign_contacts(self.writable()?, user_id, sequence_id, contact_ids, assigned_at).await
    }

    pub async fn unassign_contact(
        &self,
        user_id: &str,
        contact_id: &str,
        sequence_id: &str,
    ) -> Result<()> {
        db::unassign_contact(self.writable()?, user_id, contact_id, sequence_id).await
    }

    pub async fn mark_complete(
        &self,
        user_id: &str,
        contact_id: &str,
        sequence_id: &str,
        step_order: i64,
    ) -> Result<()> {
        db::mark_complete(self.writable()?, user_id, contact_id, sequence_id, step_order).await
    }

    pub async fn unmark_complete(
        &self,
        user_id: &str,
        contact_id: &str,
        sequence_id: &str,
        step_order: i64,
    ) -> Result<()> {
        db::unmark_complete(self.writable()?, user_id, contact_id, sequence_id, step_order).await
    }

    // ---- reads ----

    pub async fn list_contacts(&self, user_id: &str) -> Result<Vec<Contact>> {
        match &self.pool {
            Some(pool) => db::list_contacts(pool, user_id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_contact(&self, user_id: &str, contact_id: &str) -> Result<Option<Contact>> {
        match &self.pool {
            Some(pool) => db::get_contact(pool, user_id, contact_id).await,
            None => Ok(None),
        }
    }

    pub async fn list_sequences(&self, user_id: &str) -> Result<Vec<SequenceWithSteps>> {
        match &self.pool {
            Some(pool) => db::list_sequences(pool, user_id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_sequence(
        &self,
        user_id: &str,
        sequence_id: &str,
    ) -> Result<Option<SequenceWithSteps>> {
        match &self.pool {
            Some(pool) => db::get_sequence(pool, user_id, sequence_id).await,
            None => Ok(None),
        }
    }

    pub async fn assigned_sequences_for_contact(
        &self,
        user_id: &str,
        contact_id: &str,
    ) -> Result<Vec<SequenceWithSteps>> {
        match &self.pool {
            Some(pool) => db::assigned_sequences_for_contact(pool, user_id, contact_id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn assigned_contacts(
        &self,
        user_id: &str,
        sequence_id: &str,
    ) -> Result<Vec<AssignedContact>> {
        match &self.pool {
            Some(pool) => db::assigned_contacts(pool, user_id, sequence_id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn assignment_count(&self, user_id: &str, sequence_id: &str) -> Result<i64> {
        match &self.pool {
            Some(pool) => db::assignment_count(pool, user_id, sequence_id).await,
            None => Ok(0),
        }
    }

    pub async fn dashboard_stats(&self, user_id: &str) -> Result<DashboardStats> {
        match &self.pool {
            Some(pool) => db::dashboard_stats(pool, user_id).await,
            None => Ok(DashboardStats::default()),
        }
    }
}

#[async_trait]
impl TaskSource for Store {
    async fn contacts(&self, user_id: &str) -> Result<Vec<NamedRef>> {
        match &self.pool {
            Some(pool) => db::contact_names(pool, user_id).await,
            None => Ok(Vec::new()),
        }
    }

    async fn sequences(&self, user_id: &str) -> Result<Vec<NamedRef>> {
        match &self.pool {
            Some(pool) => db::sequence_names(pool, user_id).await,
            None => Ok(Vec::new()),
        }
    }

    async fn steps(&self, sequence_ids: &[String]) -> Result<Vec<SequenceStep>> {
        match &self.pool {
            Some(pool) => db::steps_for_sequences(pool, sequence_ids).await,
            None => Ok(Vec::new()),
        }
    }

    async fn assignments(&self, sequence_ids: &[String]) -> Result<Vec<Assignment>> {
        match &self.pool {
            Some(pool) => db::assignments_for_sequences(pool, sequence_ids).await,
            None => Ok(Vec::new()),
        }
    }

    async fn completions(&self, user_id: &str) -> Result<Vec<CompletionMark>> {
        match &self.pool {
            Some(pool) => db::completions_for_user(pool, user_id).await,
            None => Ok(Vec::new()),
        }
    }
}
