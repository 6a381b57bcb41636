use super::projector::{project, TaskInputs};
use crate::model::{Assignment, CompletionMark, DerivedTask, NamedRef, SequenceStep};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

/// Reads the projector depends on. Implementations scope every read to the given user
/// (or to sequence ids already scoped to that user).
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn contacts(&self, user_id: &str) -> Result<Vec<NamedRef>>;

    async fn sequences(&self, user_id: &str) -> Result<Vec<NamedRef>>;

    /// Steps ordered by `step_order` ascending.
    async fn steps(&self, sequence_ids: &[String]) -> Result<Vec<SequenceStep>>;

    async fn assignments(&self, sequence_ids: &[String]) -> Result<Vec<Assignment>>;

    async fn completions(&self, user_id: &str) -> Result<Vec<CompletionMark>>;
}

/// Fetch everything a user's task list needs and project it.
///
/// Contacts and sequences are read together first. With no sequences the remaining
/// reads are skipped. Any failed read fails the whole load; a partial list is never
/// returned.
#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn load_derived_tasks(source: &dyn TaskSource, user_id: &str) -> Result<Vec<DerivedTask>> {
    let (contacts, sequences) =
        futures::try_join!(source.contacts(user_id), source.sequences(user_id))?;

    if sequences.is_empty() {
        debug!("user has no sequences");
        return Ok(Vec::new());
    }

    let sequence_ids: Vec<String> = sequences.iter().map(|s| s.id.clone()).collect();
    let (assignments, steps, completions) = futures::try_join!(
        source.assignments(&sequence_ids),
        source.steps(&sequence_ids),
        source.completions(user_id),
    )?;

    let inputs = TaskInputs::from_rows(contacts, sequences, assignments, steps, completions);
    let tasks = project(&inputs);
    info!(
        assignments = inputs.assignments.len(),
        tasks = tasks.len(),
        "derived tasks projected"
    );
    Ok(tasks)
}
