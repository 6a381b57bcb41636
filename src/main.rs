use anyhow::{bail, Result};
use cadence_tracker::config;
use cadence_tracker::model::{Channel, ContactPatch, DerivedTask, NewContact, NewStep};
use cadence_tracker::tasks::{self, Bucket, TaskBuckets};
use cadence_tracker::Store;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Track contacts, outreach sequences and the tasks derived from them"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Act as this user id instead of `user.id` from the config
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List derived tasks, soonest first
    Tasks {
        /// Only show one bucket: overdue, today, upcoming or completed
        #[arg(long, value_parser = parse_bucket)]
        bucket: Option<Bucket>,
        /// Reference date for bucketing (defaults to the local date)
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Group by due date
        #[arg(long)]
        calendar: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    #[command(subcommand)]
    Contacts(ContactsCmd),
    #[command(subcommand)]
    Sequences(SequencesCmd),
    /// Enroll contacts into a sequence
    Assign {
        #[arg(long)]
        sequence: String,
        #[arg(required = true)]
        contacts: Vec<String>,
    },
    /// Remove a contact from a sequence
    Unassign {
        #[arg(long)]
        sequence: String,
        #[arg(long)]
        contact: String,
    },
    /// Mark a derived task as done
    Complete {
        #[arg(long)]
        contact: String,
        #[arg(long)]
        sequence: String,
        #[arg(long)]
        step: i64,
    },
    /// Clear the done mark of a derived task
    Uncomplete {
        #[arg(long)]
        contact: String,
        #[arg(long)]
        sequence: String,
        #[arg(long)]
        step: i64,
    },
    /// Dashboard counters
    Stats {
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(Debug, Subcommand)]
enum ContactsCmd {
    List,
    Show {
        id: String,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Rm {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
enum SequencesCmd {
    List,
    Show {
        id: String,
    },
    /// Create a sequence; steps are numbered in the order given
    Create {
        #[arg(long)]
        name: String,
        /// `CHANNEL|LABEL[|TIMING]`, e.g. `Email|Send intro|Day 1`
        #[arg(long = "step", value_parser = parse_step)]
        steps: Vec<StepArg>,
    },
}

#[derive(Debug, Clone)]
struct StepArg {
    channel: Channel,
    label: String,
    suggested_timing: Option<String>,
}

fn parse_bucket(s: &str) -> Result<Bucket, String> {
    Bucket::parse(s).ok_or_else(|| format!("unknown bucket {s:?}"))
}

fn parse_step(s: &str) -> Result<StepArg, String> {
    let mut parts = s.splitn(3, '|');
    let channel = parts.next().unwrap_or_default();
    let channel = Channel::parse(channel).ok_or_else(|| {
        let known: Vec<&str> = Channel::ALL.iter().map(Channel::as_str).collect();
        format!("unknown channel {channel:?} (expected one of {})", known.join(", "))
    })?;
    let label = parts.next().map(str::trim).unwrap_or_default();
    if label.is_empty() {
        return Err("step label must be non-empty".into());
    }
    let suggested_timing = parts
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    Ok(StepArg {
        channel,
        label: label.to_string(),
        suggested_timing,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let store = Store::open(&database_url).await?;

    let user_id = args.user.clone().unwrap_or_else(|| cfg.user.id.clone());
    store.ensure_user(&user_id, cfg.user.email.as_deref()).await?;

    run(&store, &user_id, args.command).await
}

async fn run(store: &Store, user_id: &str, command: Command) -> Result<()> {
    match command {
        Command::Tasks {
            bucket,
            today,
            calendar,
            json,
        } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let all = tasks::load_derived_tasks(store, user_id).await?;
            let shown: Vec<DerivedTask> = match bucket {
                Some(bucket) => TaskBuckets::partition(all, today).get(bucket).to_vec(),
                None => all,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else if calendar {
                for (day, day_tasks) in tasks::by_due_date(&shown) {
                    println!("{day}");
                    for task in day_tasks {
                        println!("  {}", task_line(task));
                    }
                }
            } else {
                for task in &shown {
                    println!("{}  {}", task.due_date, task_line(task));
                }
            }
        }
        Command::Contacts(cmd) => run_contacts(store, user_id, cmd).await?,
        Command::Sequences(cmd) => run_sequences(store, user_id, cmd).await?,
        Command::Assign { sequence, contacts } => {
            let added = store.assign_contacts(user_id, &sequence, &contacts).await?;
            info!(sequence = %sequence, added, "assigned contacts");
            println!("{added} new assignment(s)");
        }
        Command::Unassign { sequence, contact } => {
            store.unassign_contact(user_id, &contact, &sequence).await?;
            println!("unassigned {contact} from {sequence}");
        }
        Command::Complete {
            contact,
            sequence,
            step,
        } => {
            store.mark_complete(user_id, &contact, &sequence, step).await?;
            println!("marked step {step} complete");
        }
        Command::Uncomplete {
            contact,
            sequence,
            step,
        } => {
            store
                .unmark_complete(user_id, &contact, &sequence, step)
                .await?;
            println!("cleared step {step}");
        }
        Command::Stats { today } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let stats = store.dashboard_stats(user_id).await?;
            let derived = tasks::load_derived_tasks(store, user_id).await?;
            let summary = TaskBuckets::partition(derived, today).summary();
            println!("contacts:          {}", stats.total_contacts);
            println!("sequences:         {}", stats.active_sequences);
            println!("assignments:       {}", stats.assigned_contacts);
            println!("overdue tasks:     {}", summary.overdue);
            println!("due today:         {}", summary.due_today);
            println!("upcoming tasks:    {}", summary.upcoming);
            println!("completed tasks:   {}", summary.completed);
        }
    }
    Ok(())
}

async fn run_contacts(store: &Store, user_id: &str, cmd: ContactsCmd) -> Result<()> {
    match cmd {
        ContactsCmd::List => {
            for c in store.list_contacts(user_id).await? {
                let company = c.company.as_deref().unwrap_or("-");
                println!("{}  {}  ({})", c.id, c.name, company);
            }
        }
        ContactsCmd::Show { id } => {
            let Some(contact) = store.get_contact(user_id, &id).await? else {
                bail!("contact {id} not found");
            };
            println!("{}", serde_json::to_string_pretty(&contact)?);
            for s in store.assigned_sequences_for_contact(user_id, &id).await? {
                println!("in sequence {} ({} steps)", s.sequence.name, s.steps.len());
            }
        }
        ContactsCmd::Add {
            name,
            role,
            company,
            email,
            notes,
        } => {
            let input = NewContact {
                name,
                role,
                company,
                email,
                notes,
            };
            let id = store.create_contact(user_id, &input).await?;
            println!("{id}");
        }
        ContactsCmd::Edit {
            id,
            name,
            role,
            company,
            email,
            notes,
        } => {
            let patch = ContactPatch {
                name,
                role,
                company,
                email,
                notes,
            };
            store.update_contact(user_id, &id, &patch).await?;
        }
        ContactsCmd::Rm { id } => {
            store.delete_contact(user_id, &id).await?;
        }
    }
    Ok(())
}

async fn run_sequences(store: &Store, user_id: &str, cmd: SequencesCmd) -> Result<()> {
    match cmd {
        SequencesCmd::List => {
            for s in store.list_sequences(user_id).await? {
                let assigned = store.assignment_count(user_id, &s.sequence.id).await?;
                println!(
                    "{}  {}  ({} steps, {} assigned)",
                    s.sequence.id,
                    s.sequence.name,
                    s.steps.len(),
                    assigned
                );
            }
        }
        SequencesCmd::Show { id } => {
            let Some(seq) = store.get_sequence(user_id, &id).await? else {
                bail!("sequence {id} not found");
            };
            println!("{}", seq.sequence.name);
            for step in &seq.steps {
                let timing = step.suggested_timing.as_deref().unwrap_or("-");
                println!(
                    "  {}. [{}] {} ({})",
                    step.step_order, step.channel, step.label, timing
                );
            }
            for c in store.assigned_contacts(user_id, &id).await? {
                println!("  assigned: {} {}", c.contact_id, c.contact_name);
            }
        }
        SequencesCmd::Create { name, steps } => {
            let steps: Vec<NewStep> = steps
                .into_iter()
                .zip(1..)
                .map(|(s, step_order)| NewStep {
                    step_order,
                    channel: s.channel,
                    label: s.label,
                    suggested_timing: s.suggested_timing,
                })
                .collect();
            let id = store.create_sequence(user_id, &name, &steps).await?;
            println!("{id}");
        }
    }
    Ok(())
}

fn task_line(task: &DerivedTask) -> String {
    let mark = if task.completed { "x" } else { " " };
    format!(
        "[{mark}] {} / {} #{} {}: {}",
        task.contact_name, task.sequence_name, task.step_order, task.channel, task.label
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_step_with_and_without_timing() {
        let s = parse_step("Email|Send intro|Day 1").unwrap();
        assert_eq!(s.channel, Channel::Email);
        assert_eq!(s.label, "Send intro");
        assert_eq!(s.suggested_timing.as_deref(), Some("Day 1"));

        let s = parse_step("in person|Lunch").unwrap();
        assert_eq!(s.channel, Channel::InPerson);
        assert_eq!(s.suggested_timing, None);

        assert!(parse_step("Fax|Send").is_err());
        assert!(parse_step("Email|  ").is_err());
    }

    #[test]
    fn args_parse_subcommands() {
        let args = Args::try_parse_from([
            "cadence",
            "tasks",
            "--bucket",
            "overdue",
            "--today",
            "2026-02-01",
        ])
        .unwrap();
        match args.command {
            Command::Tasks { bucket, today, .. } => {
                assert_eq!(bucket, Some(Bucket::Overdue));
                assert_eq!(today, NaiveDate::from_ymd_opt(2026, 2, 1));
            }
            other => panic!("unexpected {other:?}"),
        }

        let args = Args::try_parse_from([
            "cadence",
            "sequences",
            "create",
            "--name",
            "Intro",
            "--step",
            "Email|Hello",
            "--step",
            "Phone|Call|Day 5",
        ])
        .unwrap();
        match args.command {
            Command::Sequences(SequencesCmd::Create { name, steps }) => {
                assert_eq!(name, "Intro");
                assert_eq!(steps.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
