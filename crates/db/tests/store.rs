//! Postgres store tests. They need a reachable `DATABASE_URL`; run them with
//! `cargo test -p scriptforge-db -- --ignored`.

use assert_matches::assert_matches;
use chrono::{Duration, SubsecRound, Utc};
use serde_json::json;
use sqlx::PgPool;

use scriptforge_core::error::CoreError;
use scriptforge_core::execution::{timeout_marker, ExecutionStatus, NewExecution, TIMEOUT_EXIT_CODE};
use scriptforge_core::job::{JobKind, JobPatch, JobStatus, NewJob};
use scriptforge_core::script::{NewScript, ScriptPatch};
use scriptforge_core::store::{ExecutionStore, JobStore, ScriptStore, StoreError};
use scriptforge_db::repositories::ScriptRepo;
use scriptforge_db::{PgExecutionStore, PgJobStore, PgScriptStore};

async fn seed_script(pool: &PgPool) -> i64 {
    ScriptRepo::create(
        pool,
        &NewScript {
            name: "hello".into(),
            source: "print('hi')".into(),
            dependencies: vec!["requests".into()],
            timeout_secs: Some(10),
        },
    )
    .await
    .expect("seed script")
    .id
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn job_lifecycle_round_trips(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let job = store
        .create(NewJob {
            owner_id: 3,
            kind: JobKind::Analysis,
            input: json!({"prompt": "x"}),
        })
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.kind, JobKind::Analysis);

    let job = store
        .update(job.id, JobPatch::processing(Utc::now()))
        .await
        .unwrap();
    assert_eq!(job.progress, 10);

    let job = store
        .update(job.id, JobPatch::completed(json!({"text": "t"}), Utc::now()))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result, Some(json!({"text": "t"})));

    let again = store
        .update(job.id, JobPatch::failed("late", Utc::now()))
        .await;
    assert_matches!(again, Err(StoreError::Core(CoreError::Conflict(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn jobs_are_listed_newest_first_per_owner(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let mut ids = Vec::new();
    for owner in [1, 2, 1] {
        let job = store
            .create(NewJob {
                owner_id: owner,
                kind: JobKind::Generation,
                input: json!({"prompt": "x"}),
            })
            .await
            .unwrap();
        ids.push(job.id);
    }

    let listed: Vec<i64> = store
        .list_by_owner(1, 10, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(listed, vec![ids[2], ids[0]]);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn script_last_run_is_stamped(pool: PgPool) {
    let id = seed_script(&pool).await;
    let store = PgScriptStore::new(pool);

    let script = store.get(id).await.unwrap().expect("script");
    assert_eq!(script.dependencies, vec!["requests".to_string()]);
    assert!(script.last_run_at.is_none());

    let now = Utc::now().trunc_subsecs(3);
    let script = store
        .update(
            id,
            ScriptPatch {
                last_run_at: Some(now),
            },
        )
        .await
        .unwrap();
    assert_eq!(script.last_run_at, Some(now));

    let missing = store.update(id + 1000, ScriptPatch::default()).await;
    assert_matches!(missing, Err(StoreError::Core(CoreError::NotFound { .. })));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn timed_out_execution_is_persisted(pool: PgPool) {
    let script_id = seed_script(&pool).await;
    let store = PgExecutionStore::new(pool);

    let started = Utc::now().trunc_subsecs(3);
    let completed = started + Duration::milliseconds(1_000);
    let record = store
        .create(NewExecution {
            script_id,
            triggered_by: Some(9),
            status: ExecutionStatus::Timeout,
            inputs: json!({"n": 1}),
            stdout: String::new(),
            stderr: timeout_marker(1),
            exit_code: Some(TIMEOUT_EXIT_CODE),
            duration_ms: Some(1_000),
            started_at: Some(started),
            completed_at: Some(completed),
            is_scheduled: false,
        })
        .await
        .unwrap();

    let fetched = store.get(record.id).await.unwrap().expect("record");
    assert_eq!(fetched.status, ExecutionStatus::Timeout);
    assert_eq!(fetched.duration_ms, Some(1_000));
    assert_eq!(fetched.started_at, Some(started));

    let history = store.list_by_script(script_id, 10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
}
