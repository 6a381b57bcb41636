use super::error::StoreError;
use super::model::{AssignmentRow, CompletionRow, ContactRow, NamedRow, SequenceRow, StepRow};
use crate::model::{
    AssignedContact, Assignment, CompletionMark, Contact, ContactPatch, DashboardStats, NamedRef,
    NewContact, NewStep, Sequence, SequenceStep, SequenceWithSteps,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, instrument};
use uuid::Uuid;

pub type Pool = SqlitePool;

const UNNAMED: &str = "Unnamed";
const UNKNOWN: &str = "Unknown";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let in_memory = normalized.starts_with("sqlite::memory");
    let mut options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {normalized}"))?
        .create_if_missing(true)
        .foreign_keys(true);
    let mut pool_options = SqlitePoolOptions::new();
    if in_memory {
        // Every connection to `:memory:` is a separate database; pin a single one.
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        // Enable WAL and stricter durability.
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
    }
    let pool = pool_options.connect_with(options).await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn clean_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        UNNAMED.to_string()
    } else {
        trimmed.to_string()
    }
}

fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---- users ----

/// Record a user established by the external identity provider. No-op if present.
#[instrument(skip_all)]
pub async fn ensure_user(pool: &Pool, user_id: &str, email: Option<&str>) -> Result<()> {
    sqlx::query("INSERT INTO users (id, email, created_at) VALUES (?, ?, ?) ON CONFLICT(id) DO NOTHING")
        .bind(user_id)
        .bind(email.unwrap_or_default())
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

// ---- contacts ----

#[instrument(skip_all)]
pub async fn list_contacts(pool: &Pool, user_id: &str) -> Result<Vec<Contact>> {
    let rows = sqlx::query_as::<_, ContactRow>(
        "SELECT id, user_id, name, role, company, email, notes, created_at \
         FROM contacts WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Contact::from).collect())
}

#[instrument(skip_all)]
pub async fn get_contact(pool: &Pool, user_id: &str, contact_id: &str) -> Result<Option<Contact>> {
    let row = sqlx::query_as::<_, ContactRow>(
        "SELECT id, user_id, name, role, company, email, notes, created_at \
         FROM contacts WHERE id = ? AND user_id = ?",
    )
    .bind(contact_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Contact::from))
}

#[instrument(skip_all)]
pub async fn create_contact(pool: &Pool, user_id: &str, input: &NewContact) -> Result<String> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO contacts (id, user_id, name, role, company, email, notes, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(clean_name(&input.name))
    .bind(clean_optional(input.role.as_deref()))
    .bind(clean_optional(input.company.as_deref()))
    .bind(clean_optional(input.email.as_deref()))
    .bind(clean_optional(input.notes.as_deref()))
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("failed to insert contact")?;
    debug!(contact_id = %id, "contact created");
    Ok(id)
}

#[instrument(skip_all)]
pub async fn update_contact(
    pool: &Pool,
    user_id: &str,
    contact_id: &str,
    patch: &ContactPatch,
) -> Result<()> {
    if patch.is_empty() {
        return match get_contact(pool, user_id, contact_id).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::ContactNotFound(contact_id.to_string()).into()),
        };
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE contacts SET ");
    {
        let mut set = qb.separated(", ");
        if let Some(name) = &patch.name {
            set.push("name = ").push_bind_unseparated(clean_name(name));
        }
        let optional = [
            ("role = ", &patch.role),
            ("company = ", &patch.company),
            ("email = ", &patch.email),
            ("notes = ", &patch.notes),
        ];
        for (column, value) in optional {
            if let Some(value) = value {
                set.push(column)
                    .push_bind_unseparated(clean_optional(Some(value.as_str())));
            }
        }
    }
    qb.push(" WHERE id = ")
        .push_bind(contact_id.to_string())
        .push(" AND user_id = ")
        .push_bind(user_id.to_string());

    let res = qb
        .build()
        .execute(pool)
        .await
        .context("failed to update contact")?;
    if res.rows_affected() == 0 {
        return Err(StoreError::ContactNotFound(contact_id.to_string()).into());
    }
    Ok(())
}

/// Deleting a contact removes its enrollments and completion marks with it.
#[instrument(skip_all)]
pub async fn delete_contact(pool: &Pool, user_id: &str, contact_id: &str) -> Result<()> {
    let res = sqlx::query("DELETE FROM contacts WHERE id = ? AND user_id = ?")
        .bind(contact_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to delete contact")?;
    if res.rows_affected() == 0 {
        return Err(StoreError::ContactNotFound(contact_id.to_string()).into());
    }
    Ok(())
}

/// `{id, name}` of every contact owned by the user.
#[instrument(skip_all)]
pub async fn contact_names(pool: &Pool, user_id: &str) -> Result<Vec<NamedRef>> {
    let rows = sqlx::query_as::<_, NamedRow>("SELECT id, name FROM contacts WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(NamedRef::from).collect())
}

// ---- sequences ----

/// Insert a sequence together with all of its steps. Steps are never edited afterwards.
#[instrument(skip_all)]
pub async fn create_sequence(
    pool: &Pool,
    user_id: &str,
    name: &str,
    steps: &[NewStep],
) -> Result<String> {
    let mut tx = pool.begin().await?;
    let sequence_id = new_id();
    sqlx::query("INSERT INTO sequences (id, user_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&sequence_id)
        .bind(user_id)
        .bind(clean_name(name))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("failed to insert sequence")?;

    for step in steps {
        sqlx::query(
            "INSERT INTO sequence_steps (id, sequence_id, step_order, channel, label, suggested_timing) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new_id())
        .bind(&sequence_id)
        .bind(step.step_order)
        .bind(step.channel.as_str())
        .bind(&step.label)
        .bind(step.suggested_timing.as_deref())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert step {}", step.step_order))?;
    }

    tx.commit().await?;
    debug!(sequence_id = %sequence_id, steps = steps.len(), "sequence created");
    Ok(sequence_id)
}

#[instrument(skip_all)]
pub async fn list_sequences(pool: &Pool, user_id: &str) -> Result<Vec<SequenceWithSteps>> {
    let rows = sqlx::query_as::<_, SequenceRow>(
        "SELECT id, user_id, name, created_at FROM sequences \
         WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    attach_steps(pool, rows.into_iter().map(Sequence::from).collect()).await
}

#[instrument(skip_all)]
pub async fn get_sequence(
    pool: &Pool,
    user_id: &str,
    sequence_id: &str,
) -> Result<Option<SequenceWithSteps>> {
    let row = sqlx::query_as::<_, SequenceRow>(
        "SELECT id, user_id, name, created_at FROM sequences WHERE id = ? AND user_id = ?",
    )
    .bind(sequence_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut with_steps = attach_steps(pool, vec![Sequence::from(row)]).await?;
    Ok(with_steps.pop())
}

/// Sequences (owned by the user) that the contact is enrolled in.
#[instrument(skip_all)]
pub async fn assigned_sequences_for_contact(
    pool: &Pool,
    user_id: &str,
    contact_id: &str,
) -> Result<Vec<SequenceWithSteps>> {
    let rows = sqlx::query_as::<_, SequenceRow>(
        "SELECT s.id, s.user_id, s.name, s.created_at FROM sequences s \
         JOIN contact_sequence_assignments a ON a.sequence_id = s.id \
         WHERE a.contact_id = ? AND s.user_id = ? ORDER BY a.assigned_at ASC",
    )
    .bind(contact_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    attach_steps(pool, rows.into_iter().map(Sequence::from).collect()).await
}

async fn attach_steps(pool: &Pool, sequences: Vec<Sequence>) -> Result<Vec<SequenceWithSteps>> {
    let ids: Vec<String> = sequences.iter().map(|s| s.id.clone()).collect();
    let mut by_sequence: HashMap<String, Vec<SequenceStep>> = HashMap::new();
    for step in steps_for_sequences(pool, &ids).await? {
        by_sequence
            .entry(step.sequence_id.clone())
            .or_default()
            .push(step);
    }
    Ok(sequences
        .into_iter()
        .map(|sequence| {
            let steps = by_sequence.remove(&sequence.id).unwrap_or_default();
            SequenceWithSteps { sequence, steps }
        })
        .collect())
}

/// `{id, name}` of every sequence owned by the user.
#[instrument(skip_all)]
pub async fn sequence_names(pool: &Pool, user_id: &str) -> Result<Vec<NamedRef>> {
    let rows = sqlx::query_as::<_, NamedRow>(
        "SELECT id, name FROM sequences WHERE user_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(NamedRef::from).collect())
}

/// Steps of the given sequences, ordered by `step_order` ascending.
#[instrument(skip_all)]
pub async fn steps_for_sequences(pool: &Pool, sequence_ids: &[String]) -> Result<Vec<SequenceStep>> {
    if sequence_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, sequence_id, step_order, channel, label, suggested_timing \
         FROM sequence_steps WHERE sequence_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in sequence_ids {
        ids.push_bind(id.clone());
    }
    ids.push_unseparated(") ORDER BY step_order ASC, sequence_id ASC");

    let rows = qb.build_query_as::<StepRow>().fetch_all(pool).await?;
    let steps = rows
        .into_iter()
        .map(SequenceStep::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(steps)
}

// ---- assignments ----

/// Enroll contacts into a sequence owned by the user.
///
/// Contact ids that do not belong to the user are dropped; existing enrollments are
/// left untouched (their `assigned_at` does not move). Returns how many rows were added.
#[instrument(skip_all)]
pub async fn assign_contacts(
    pool: &Pool,
    user_id: &str,
    sequence_id: &str,
    contact_ids: &[String],
    assigned_at: DateTime<Utc>,
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sequences WHERE id = ? AND user_id = ?")
        .bind(sequence_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
    if owned == 0 {
        return Err(StoreError::SequenceNotFound(sequence_id.to_string()).into());
    }

    let mut inserted = 0;
    for contact_id in contact_ids {
        let res = sqlx::query(
            "INSERT INTO contact_sequence_assignments (contact_id, sequence_id, assigned_at) \
             SELECT id, ?, ? FROM contacts WHERE id = ? AND user_id = ? \
             ON CONFLICT(contact_id, sequence_id) DO NOTHING",
        )
        .bind(sequence_id)
        .bind(assigned_at)
        .bind(contact_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("failed to insert assignment")?;
        inserted += res.rows_affected();
    }
    tx.commit().await?;
    debug!(sequence_id, requested = contact_ids.len(), inserted, "contacts assigned");
    Ok(inserted)
}

/// Remove an enrollment. Absent rows are not an error.
#[instrument(skip_all)]
pub async fn unassign_contact(
    pool: &Pool,
    user_id: &str,
    contact_id: &str,
    sequence_id: &str,
) -> Result<()> {
    sqlx::query(
        "DELETE FROM contact_sequence_assignments WHERE contact_id = ? AND sequence_id = ? \
         AND sequence_id IN (SELECT id FROM sequences WHERE user_id = ?)",
    )
    .bind(contact_id)
    .bind(sequence_id)
    .bind(user_id)
    .execute(pool)
    .await
    .context("failed to delete assignment")?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn assignments_for_sequences(
    pool: &Pool,
    sequence_ids: &[String],
) -> Result<Vec<Assignment>> {
    if sequence_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT contact_id, sequence_id, assigned_at \
         FROM contact_sequence_assignments WHERE sequence_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in sequence_ids {
        ids.push_bind(id.clone());
    }
    ids.push_unseparated(") ORDER BY assigned_at ASC, rowid ASC");

    let rows = qb.build_query_as::<AssignmentRow>().fetch_all(pool).await?;
    Ok(rows.into_iter().map(Assignment::from).collect())
}

#[instrument(skip_all)]
pub async fn assignment_count(pool: &Pool, user_id: &str, sequence_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM contact_sequence_assignments a \
         JOIN sequences s ON s.id = a.sequence_id \
         WHERE a.sequence_id = ? AND s.user_id = ?",
    )
    .bind(sequence_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

#[instrument(skip_all)]
pub async fn assigned_contacts(
    pool: &Pool,
    user_id: &str,
    sequence_id: &str,
) -> Result<Vec<AssignedContact>> {
    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT a.contact_id, c.name FROM contact_sequence_assignments a \
         JOIN sequences s ON s.id = a.sequence_id \
         LEFT JOIN contacts c ON c.id = a.contact_id \
         WHERE a.sequence_id = ? AND s.user_id = ? ORDER BY a.assigned_at ASC, a.rowid ASC",
    )
    .bind(sequence_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(contact_id, name)| AssignedContact {
            contact_id,
            contact_name: name.unwrap_or_else(|| UNKNOWN.to_string()),
        })
        .collect())
}

// ---- completion marks ----

/// Idempotent: marking an already-complete task is a no-op.
#[instrument(skip_all)]
pub async fn mark_complete(
    pool: &Pool,
    user_id: &str,
    contact_id: &str,
    sequence_id: &str,
    step_order: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO completed_tasks (user_id, contact_id, sequence_id, step_order, created_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, contact_id, sequence_id, step_order) DO NOTHING",
    )
    .bind(user_id)
    .bind(contact_id)
    .bind(sequence_id)
    .bind(step_order)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("failed to persist completion mark")?;
    Ok(())
}

/// Idempotent: unmarking a task that is not complete is a no-op.
#[instrument(skip_all)]
pub async fn unmark_complete(
    pool: &Pool,
    user_id: &str,
    contact_id: &str,
    sequence_id: &str,
    step_order: i64,
) -> Result<()> {
    sqlx::query(
        "DELETE FROM completed_tasks \
         WHERE user_id = ? AND contact_id = ? AND sequence_id = ? AND step_order = ?",
    )
    .bind(user_id)
    .bind(contact_id)
    .bind(sequence_id)
    .bind(step_order)
    .execute(pool)
    .await
    .context("failed to delete completion mark")?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn completions_for_user(pool: &Pool, user_id: &str) -> Result<Vec<CompletionMark>> {
    let rows = sqlx::query_as::<_, CompletionRow>(
        "SELECT contact_id, sequence_id, step_order FROM completed_tasks WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(CompletionMark::from).collect())
}

// ---- dashboard ----

#[instrument(skip_all)]
pub async fn dashboard_stats(pool: &Pool, user_id: &str) -> Result<DashboardStats> {
    let total_contacts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    let active_sequences: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sequences WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    let assigned_contacts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM contact_sequence_assignments a \
         JOIN sequences s ON s.id = a.sequence_id WHERE s.user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(DashboardStats {
        total_contacts,
        active_sequences,
        assigned_contacts,
    })
}
