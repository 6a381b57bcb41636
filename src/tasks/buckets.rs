//! Grouping of projected tasks for the task list, dashboard and calendar views.

use crate::model::DerivedTask;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Overdue,
    DueToday,
    Upcoming,
    Completed,
}

impl Bucket {
    /// Completed tasks land in `Completed` whatever their date.
    pub fn of(task: &DerivedTask, today: NaiveDate) -> Self {
        if task.completed {
            Bucket::Completed
        } else if task.due_date < today {
            Bucket::Overdue
        } else if task.due_date == today {
            Bucket::DueToday
        } else {
            Bucket::Upcoming
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Overdue => "overdue",
            Bucket::DueToday => "today",
            Bucket::Upcoming => "upcoming",
            Bucket::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overdue" => Some(Bucket::Overdue),
            "today" | "due_today" | "due-today" => Some(Bucket::DueToday),
            "upcoming" => Some(Bucket::Upcoming),
            "completed" | "done" => Some(Bucket::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskBuckets {
    pub overdue: Vec<DerivedTask>,
    pub due_today: Vec<DerivedTask>,
    pub upcoming: Vec<DerivedTask>,
    pub completed: Vec<DerivedTask>,
}

impl TaskBuckets {
    /// Split tasks relative to `today`, keeping their incoming order inside each bucket.
    pub fn partition(tasks: impl IntoIterator<Item = DerivedTask>, today: NaiveDate) -> Self {
        let mut buckets = Self::default();
        for task in tasks {
            match Bucket::of(&task, today) {
                Bucket::Overdue => buckets.overdue.push(task),
                Bucket::DueToday => buckets.due_today.push(task),
                Bucket::Upcoming => buckets.upcoming.push(task),
                Bucket::Completed => buckets.completed.push(task),
            }
        }
        buckets
    }

    pub fn get(&self, bucket: Bucket) -> &[DerivedTask] {
        match bucket {
            Bucket::Overdue => &self.overdue,
            Bucket::DueToday => &self.due_today,
            Bucket::Upcoming => &self.upcoming,
            Bucket::Completed => &self.completed,
        }
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            overdue: self.overdue.len(),
            due_today: self.due_today.len(),
            upcoming: self.upcoming.len(),
            completed: self.completed.len(),
        }
    }
}

/// Counts shown on the dashboard cards.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub overdue: usize,
    pub due_today: usize,
    pub upcoming: usize,
    pub completed: usize,
}

/// Calendar view: tasks keyed by due date, each day in incoming order.
pub fn by_due_date(tasks: &[DerivedTask]) -> BTreeMap<NaiveDate, Vec<&DerivedTask>> {
    let mut days: BTreeMap<NaiveDate, Vec<&DerivedTask>> = BTreeMap::new();
    for task in tasks {
        days.entry(task.due_date).or_default().push(task);
    }
    days
}
