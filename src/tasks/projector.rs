//! Pure projection of assignments × steps into derived tasks.
//!
//! Nothing here touches storage. [`TaskInputs`] holds the four user-scoped collections
//! already indexed for lookup, and [`project`] joins them.

use crate::model::{
    Assignment, CompletionMark, DerivedTask, NamedRef, SequenceStep, TaskKey,
};
use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Name used when an assignment points at a contact or sequence missing from the lookup maps.
pub const UNKNOWN_NAME: &str = "Unknown";

// ASCII only: `\D` would keep non-ASCII digits that `i64::from_str` rejects.
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]+").expect("static regex"));

/// Day offset for a step, read from its free-text `suggested_timing`.
///
/// Every non-digit character is removed and the remaining digits are read as one
/// base-10 number, so `"Day 3"` is 3, `"1 week, 2 days"` is 12 and `"-5 days"` is 5.
/// A missing or empty timing, or one without any digit, falls back to `step_order`.
/// A digit run too long for `i64` saturates instead of falling back.
pub fn resolve_offset(suggested_timing: Option<&str>, step_order: i64) -> i64 {
    let Some(timing) = suggested_timing.filter(|t| !t.is_empty()) else {
        return step_order;
    };
    let digits = NON_DIGIT.replace_all(timing, "");
    if digits.is_empty() {
        return step_order;
    }
    digits.parse::<i64>().unwrap_or(i64::MAX)
}

fn earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn latest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// `assigned_on + offset_days` in plain calendar arithmetic.
///
/// Results are clamped to years 0001..=9999 so the ISO form stays `YYYY-MM-DD`.
pub fn due_date(assigned_on: NaiveDate, offset_days: i64) -> NaiveDate {
    let shifted = if offset_days >= 0 {
        assigned_on
            .checked_add_days(Days::new(offset_days.unsigned_abs()))
            .unwrap_or_else(latest_date)
    } else {
        assigned_on
            .checked_sub_days(Days::new(offset_days.unsigned_abs()))
            .unwrap_or_else(earliest_date)
    };
    shifted.clamp(earliest_date(), latest_date())
}

/// User-scoped inputs of one projection, indexed for O(1) lookups.
#[derive(Debug, Clone, Default)]
pub struct TaskInputs {
    pub contacts: HashMap<String, String>,
    pub sequences: HashMap<String, String>,
    pub assignments: Vec<Assignment>,
    /// Steps of each sequence, ascending by `step_order`.
    pub steps_by_sequence: HashMap<String, Vec<SequenceStep>>,
    pub completed: HashSet<TaskKey>,
}

impl TaskInputs {
    /// Index raw collection reads. Assignment order is kept as given.
    pub fn from_rows(
        contacts: Vec<NamedRef>,
        sequences: Vec<NamedRef>,
        assignments: Vec<Assignment>,
        steps: Vec<SequenceStep>,
        completions: Vec<CompletionMark>,
    ) -> Self {
        let contacts = contacts.into_iter().map(|c| (c.id, c.name)).collect();
        let sequences = sequences.into_iter().map(|s| (s.id, s.name)).collect();

        let mut steps_by_sequence: HashMap<String, Vec<SequenceStep>> = HashMap::new();
        for step in steps {
            steps_by_sequence
                .entry(step.sequence_id.clone())
                .or_default()
                .push(step);
        }
        for steps in steps_by_sequence.values_mut() {
            steps.sort_by_key(|s| s.step_order);
        }

        let completed = completions.into_iter().map(TaskKey::from).collect();

        Self {
            contacts,
            sequences,
            assignments,
            steps_by_sequence,
            completed,
        }
    }
}

/// Derive every task owed for the given inputs, ordered by due date.
///
/// One task is emitted per (assignment, step of the assigned sequence). Tasks with
/// the same due date keep emission order: assignment order, then step order.
pub fn project(inputs: &TaskInputs) -> Vec<DerivedTask> {
    if inputs.sequences.is_empty() {
        return Vec::new();
    }

    let mut tasks = Vec::new();
    for assignment in &inputs.assignments {
        let contact_name = inputs
            .contacts
            .get(&assignment.contact_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_NAME);
        let sequence_name = inputs
            .sequences
            .get(&assignment.sequence_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_NAME);
        let Some(steps) = inputs.steps_by_sequence.get(&assignment.sequence_id) else {
            continue;
        };
        let assigned_on = assignment.assigned_at.date_naive();

        for step in steps {
            let offset = resolve_offset(step.suggested_timing.as_deref(), step.step_order);
            let key = TaskKey {
                contact_id: assignment.contact_id.clone(),
                sequence_id: assignment.sequence_id.clone(),
                step_order: step.step_order,
            };
            let completed = inputs.completed.contains(&key);

            tasks.push(DerivedTask {
                id: format!(
                    "{}-{}-{}",
                    assignment.contact_id, assignment.sequence_id, step.id
                ),
                contact_id: key.contact_id,
                contact_name: contact_name.to_string(),
                sequence_id: key.sequence_id,
                sequence_name: sequence_name.to_string(),
                step_order: step.step_order,
                channel: step.channel,
                label: step.label.clone(),
                suggested_timing: step.suggested_timing.clone(),
                due_date: due_date(assigned_on, offset),
                assigned_at: assigned_on,
                completed,
            });
        }
    }

    // `sort_by_key` is stable.
    tasks.sort_by_key(|t| t.due_date);
    tasks
}
