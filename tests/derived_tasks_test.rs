use cadence_tracker::db::StoreError;
use cadence_tracker::model::{Channel, NewContact, NewStep};
use cadence_tracker::tasks::{load_derived_tasks, Bucket, TaskBuckets};
use cadence_tracker::Store;
use chrono::{NaiveDate, TimeZone, Utc};

async fn setup_store() -> Store {
    Store::open("sqlite::memory:").await.unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn intro_steps() -> Vec<NewStep> {
    vec![
        NewStep {
            step_order: 1,
            channel: Channel::Email,
            label: "Send intro email".into(),
            suggested_timing: None,
        },
        NewStep {
            step_order: 2,
            channel: Channel::LinkedIn,
            label: "Connect".into(),
            suggested_timing: Some("Day 5".into()),
        },
    ]
}

async fn add_contact(store: &Store, user: &str, name: &str) -> String {
    store
        .create_contact(
            user,
            &NewContact {
                name: name.into(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn intro_sequence_end_to_end() {
    let store = setup_store().await;
    let ann = add_contact(&store, "u1", "Ann").await;
    let intro = store
        .create_sequence("u1", "Intro", &intro_steps())
        .await
        .unwrap();
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
    let added = store
        .assign_contacts_at("u1", &intro, &[ann.clone()], at)
        .await
        .unwrap();
    assert_eq!(added, 1);

    let tasks = load_derived_tasks(&store, "u1").await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].due_date, date(2026, 1, 2));
    assert_eq!(tasks[0].channel, Channel::Email);
    assert_eq!(tasks[1].due_date, date(2026, 1, 6));
    assert_eq!(tasks[1].suggested_timing.as_deref(), Some("Day 5"));
    assert!(tasks.iter().all(|t| !t.completed));
    assert!(tasks.iter().all(|t| t.contact_name == "Ann"));
    assert!(tasks.iter().all(|t| t.id.starts_with(&format!("{ann}-{intro}-"))));

    let json = serde_json::to_value(&tasks[0]).unwrap();
    assert_eq!(json["dueDate"], "2026-01-02");
    assert_eq!(json["assignedAt"], "2026-01-01");
}

#[tokio::test]
async fn completion_round_trip() {
    let store = setup_store().await;
    let ann = add_contact(&store, "u1", "Ann").await;
    let intro = store
        .create_sequence("u1", "Intro", &intro_steps())
        .await
        .unwrap();
    store
        .assign_contacts("u1", &intro, &[ann.clone()])
        .await
        .unwrap();

    store.mark_complete("u1", &ann, &intro, 2).await.unwrap();
    // Marking twice is a no-op.
    store.mark_complete("u1", &ann, &intro, 2).await.unwrap();

    let tasks = load_derived_tasks(&store, "u1").await.unwrap();
    let step2 = tasks.iter().find(|t| t.step_order == 2).unwrap();
    let step1 = tasks.iter().find(|t| t.step_order == 1).unwrap();
    assert!(step2.completed);
    assert!(!step1.completed);

    store.unmark_complete("u1", &ann, &intro, 2).await.unwrap();
    // Unmarking an absent mark is a no-op.
    store.unmark_complete("u1", &ann, &intro, 2).await.unwrap();

    let tasks = load_derived_tasks(&store, "u1").await.unwrap();
    assert!(tasks.iter().all(|t| !t.completed));
}

#[tokio::test]
async fn user_without_sequences_gets_no_tasks() {
    let store = setup_store().await;
    add_contact(&store, "u1", "Ann").await;
    let tasks = load_derived_tasks(&store, "u1").await.unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn reassignment_is_idempotent() {
    let store = setup_store().await;
    let ann = add_contact(&store, "u1", "Ann").await;
    let intro = store
        .create_sequence("u1", "Intro", &intro_steps())
        .await
        .unwrap();
    let first = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    assert_eq!(
        store
            .assign_contacts_at("u1", &intro, &[ann.clone()], first)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        store
            .assign_contacts_at("u1", &intro, &[ann.clone()], later)
            .await
            .unwrap(),
        0
    );

    assert_eq!(store.assignment_count("u1", &intro).await.unwrap(), 1);
    let tasks = load_derived_tasks(&store, "u1").await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].assigned_at, date(2026, 1, 1));
}

#[tokio::test]
async fn assignment_is_scoped_to_owner() {
    let store = setup_store().await;
    let ann = add_contact(&store, "u1", "Ann").await;
    let bob_of_u2 = add_contact(&store, "u2", "Bob").await;
    let intro = store
        .create_sequence("u1", "Intro", &intro_steps())
        .await
        .unwrap();

    let err = store
        .assign_contacts("u2", &intro, &[bob_of_u2.clone()])
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::SequenceNotFound(_))
    ));

    // Foreign contact ids are dropped silently.
    let added = store
        .assign_contacts("u1", &intro, &[ann.clone(), bob_of_u2])
        .await
        .unwrap();
    assert_eq!(added, 1);

    let assigned = store.assigned_contacts("u1", &intro).await.unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].contact_name, "Ann");
    assert!(store.assigned_contacts("u2", &intro).await.unwrap().is_empty());

    let enrolled = store
        .assigned_sequences_for_contact("u1", &ann)
        .await
        .unwrap();
    assert_eq!(enrolled.len(), 1);
    assert_eq!(enrolled[0].sequence.name, "Intro");
    assert_eq!(enrolled[0].steps.len(), 2);

    assert!(load_derived_tasks(&store, "u2").await.unwrap().is_empty());
}

#[tokio::test]
async fn completions_do_not_leak_between_users() {
    let store = setup_store().await;
    let ann = add_contact(&store, "u1", "Ann").await;
    let intro = store
        .create_sequence("u1", "Intro", &intro_steps())
        .await
        .unwrap();
    store
        .assign_contacts("u1", &intro, &[ann.clone()])
        .await
        .unwrap();

    store.mark_complete("u2", &ann, &intro, 1).await.unwrap();
    let tasks = load_derived_tasks(&store, "u1").await.unwrap();
    assert!(tasks.iter().all(|t| !t.completed));
}

#[tokio::test]
async fn unassign_and_delete_remove_tasks() {
    let store = setup_store().await;
    let ann = add_contact(&store, "u1", "Ann").await;
    let bob = add_contact(&store, "u1", "Bob").await;
    let intro = store
        .create_sequence("u1", "Intro", &intro_steps())
        .await
        .unwrap();
    store
        .assign_contacts("u1", &intro, &[ann.clone(), bob.clone()])
        .await
        .unwrap();
    store.mark_complete("u1", &bob, &intro, 1).await.unwrap();
    assert_eq!(load_derived_tasks(&store, "u1").await.unwrap().len(), 4);

    store.unassign_contact("u1", &ann, &intro).await.unwrap();
    store.unassign_contact("u1", &ann, &intro).await.unwrap();
    let tasks = load_derived_tasks(&store, "u1").await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.contact_id == bob));

    store.delete_contact("u1", &bob).await.unwrap();
    assert!(load_derived_tasks(&store, "u1").await.unwrap().is_empty());
    let stats = store.dashboard_stats("u1").await.unwrap();
    assert_eq!(stats.total_contacts, 1);
    assert_eq!(stats.active_sequences, 1);
    assert_eq!(stats.assigned_contacts, 0);
}

#[tokio::test]
async fn buckets_follow_today() {
    let store = setup_store().await;
    let ann = add_contact(&store, "u1", "Ann").await;
    let intro = store
        .create_sequence("u1", "Intro", &intro_steps())
        .await
        .unwrap();
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    store
        .assign_contacts_at("u1", &intro, &[ann.clone()], at)
        .await
        .unwrap();

    let tasks = load_derived_tasks(&store, "u1").await.unwrap();
    let buckets = TaskBuckets::partition(tasks.clone(), date(2026, 1, 2));
    assert_eq!(buckets.get(Bucket::DueToday).len(), 1);
    assert_eq!(buckets.get(Bucket::Upcoming).len(), 1);

    store.mark_complete("u1", &ann, &intro, 1).await.unwrap();
    let tasks = load_derived_tasks(&store, "u1").await.unwrap();
    let buckets = TaskBuckets::partition(tasks, date(2026, 1, 10));
    assert_eq!(buckets.summary().overdue, 1);
    assert_eq!(buckets.summary().completed, 1);
}

#[tokio::test]
async fn unconfigured_store_reads_empty_and_rejects_writes() {
    let store = Store::unconfigured();
    assert!(load_derived_tasks(&store, "u1").await.unwrap().is_empty());
    assert!(store.list_contacts("u1").await.unwrap().is_empty());
    assert_eq!(store.dashboard_stats("u1").await.unwrap().total_contacts, 0);

    let err = store.mark_complete("u1", "c", "s", 1).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::Unconfigured)
    ));
    let err = store.assign_contacts("u1", "s", &["c".into()]).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::Unconfigured)
    ));
}
