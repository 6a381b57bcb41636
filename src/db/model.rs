//! Row shapes returned by repository queries.
//!
//! These mirror the table columns. Conversion into the domain types in
//! `crate::model` happens here so the repository stays focused on SQL.

use super::error::StoreError;
use crate::model::{Assignment, Channel, CompletionMark, Contact, NamedRef, Sequence, SequenceStep};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ContactRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub role: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            role: row.role,
            company: row.company,
            email: row.email,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NamedRow {
    pub id: String,
    pub name: String,
}

impl From<NamedRow> for NamedRef {
    fn from(row: NamedRow) -> Self {
        NamedRef {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SequenceRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<SequenceRow> for Sequence {
    fn from(row: SequenceRow) -> Self {
        Sequence {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StepRow {
    pub id: String,
    pub sequence_id: String,
    pub step_order: i64,
    pub channel: String,
    pub label: String,
    pub suggested_timing: Option<String>,
}

impl TryFrom<StepRow> for SequenceStep {
    type Error = StoreError;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        let channel =
            Channel::parse(&row.channel).ok_or(StoreError::InvalidChannel(row.channel))?;
        Ok(SequenceStep {
            id: row.id,
            sequence_id: row.sequence_id,
            step_order: row.step_order,
            channel,
            label: row.label,
            suggested_timing: row.suggested_timing,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    pub contact_id: String,
    pub sequence_id: String,
    pub assigned_at: DateTime<Utc>,
}

impl From<AssignmentRow> for Assignment {
    fn from(row: AssignmentRow) -> Self {
        Assignment {
            contact_id: row.contact_id,
            sequence_id: row.sequence_id,
            assigned_at: row.assigned_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CompletionRow {
    pub contact_id: String,
    pub sequence_id: String,
    pub step_order: i64,
}

impl From<CompletionRow> for CompletionMark {
    fn from(row: CompletionRow) -> Self {
        CompletionMark {
            contact_id: row.contact_id,
            sequence_id: row.sequence_id,
            step_order: row.step_order,
        }
    }
}
