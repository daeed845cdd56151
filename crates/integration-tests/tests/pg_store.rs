//! `PgStore` against a live PostgreSQL.
//!
//! Each test gets a fresh database with the server migrations applied.
//! Run with `DATABASE_URL` set and `cargo test -p choreboard-integration-tests -- --ignored`.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use choreboard_core::{
    Chore, ChoreId, DueWindow, Household, HouseholdId, MAX_CHORE_POINTS, Member, MemberId,
    MemberRole, NewChore, QrToken,
};
use choreboard_server::db::{
    AwardOutcome, CompletionAward, DocumentStore, PgStore, StoreError, WriteBatch, WriteOp,
};

fn hid(s: &str) -> HouseholdId {
    HouseholdId::parse(s).unwrap()
}

fn mid(s: &str) -> MemberId {
    MemberId::parse(s).unwrap()
}

fn qr(s: &str) -> QrToken {
    QrToken::parse(s).unwrap()
}

fn member(h: &str, m: &str, token: &str) -> Member {
    Member::new(hid(h), mid(m), m, MemberRole::Child, qr(token), Utc::now())
}

async fn seeded(pool: PgPool) -> PgStore {
    let store = PgStore::new(pool);
    store
        .create_household(
            &Household::with_defaults(hid("household-1"), Utc::now()),
            &member("household-1", "a", "qr-a"),
        )
        .await
        .unwrap();
    store
        .upsert_member_merge(&member("household-1", "b", "qr-b"))
        .await
        .unwrap();
    store
}

fn chore(assignees: &[&str], points: u32) -> Chore {
    let mut chore = Chore::from_new(
        NewChore {
            title: "Vacuum".to_owned(),
            points: Some(points),
            ..NewChore::default()
        },
        mid("a"),
        Utc::now(),
    );
    chore.assignees = assignees.iter().map(|m| mid(m)).collect();
    chore
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_rotate_member_qr_is_compare_and_set(pool: PgPool) {
    let store = seeded(pool).await;
    let (h, m) = (hid("household-1"), mid("a"));
    let used_at = Utc::now();

    store
        .rotate_member_qr(&h, &m, &qr("qr-a"), &qr("qr-next"), used_at)
        .await
        .unwrap();

    let stored = store.get_member(&h, &m).await.unwrap().unwrap();
    assert_eq!(stored.qr_token.expose(), "qr-next");
    assert!(stored.last_qr_use_at.is_some());

    // a second exchange of the same code loses the race
    let stale = store
        .rotate_member_qr(&h, &m, &qr("qr-a"), &qr("qr-other"), Utc::now())
        .await;
    assert!(matches!(stale, Err(StoreError::Conflict(_))), "got {stale:?}");

    let stored = store.get_member(&h, &m).await.unwrap().unwrap();
    assert_eq!(stored.qr_token.expose(), "qr-next");
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_completion_ledger_awards_once(pool: PgPool) {
    let store = seeded(pool).await;
    let h = hid("household-1");
    let award = CompletionAward {
        household_id: h.clone(),
        chore_id: ChoreId::parse("c1").unwrap(),
        completed_at: Some(Utc::now()),
        points: 5,
        assignees: vec![mid("a"), mid("b"), mid("ghost")],
    };

    let first = store.apply_completion_award(&award).await.unwrap();
    assert_eq!(first, AwardOutcome::Awarded { members: 2 });

    let second = store.apply_completion_award(&award).await.unwrap();
    assert_eq!(second, AwardOutcome::AlreadyApplied);

    for m in ["a", "b"] {
        let stored = store.get_member(&h, &mid(m)).await.unwrap().unwrap();
        assert_eq!(stored.points, 5, "member {m}");
    }

    // a later completion of the same chore is a new ledger entry
    let again = CompletionAward {
        completed_at: Some(Utc::now() + Duration::hours(1)),
        ..award
    };
    assert_eq!(
        store.apply_completion_award(&again).await.unwrap(),
        AwardOutcome::Awarded { members: 2 }
    );
    let stored = store.get_member(&h, &mid("a")).await.unwrap().unwrap();
    assert_eq!(stored.points, 10);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_batch_with_missing_member_rolls_back(pool: PgPool) {
    let store = seeded(pool).await;
    let h = hid("household-1");

    let mut batch = WriteBatch::new();
    batch.push(WriteOp::StampHouseholdRotation {
        household_id: h.clone(),
        at: Utc::now(),
    });
    batch.push(WriteOp::SetMemberQr {
        household_id: h.clone(),
        member_id: mid("a"),
        token: qr("rotated-a"),
    });
    batch.push(WriteOp::SetMemberQr {
        household_id: h.clone(),
        member_id: mid("ghost"),
        token: qr("rotated-ghost"),
    });

    let result = store.commit(batch).await;
    match result {
        Err(StoreError::NotFound(path)) => {
            assert_eq!(path, "households/household-1/members/ghost");
        }
        other => panic!("Expected NotFound, got: {other:?}"),
    }

    let household = store.get_household(&h).await.unwrap().unwrap();
    assert!(household.rotated_at.is_none());
    let a = store.get_member(&h, &mid("a")).await.unwrap().unwrap();
    assert_eq!(a.qr_token.expose(), "qr-a");
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_due_scan_returns_bad_rows_in_place(pool: PgPool) {
    let store = seeded(pool.clone()).await;
    let h = hid("household-1");
    let now = Utc::now();

    let mut good = chore(&["a"], 1);
    good.due_at = now + Duration::minutes(5);
    store
        .write_chore(&h, &ChoreId::parse("good").unwrap(), &good)
        .await
        .unwrap();

    sqlx::query(
        r#"
        INSERT INTO chores (household_id, id, title, assignees, due_at, created_by)
        VALUES ('household-1', 'bad', 'Broken', '{"not an id"}', $1, 'a')
        "#,
    )
    .bind(now + Duration::minutes(6))
    .execute(&pool)
    .await
    .unwrap();

    let scanned = store
        .query_open_chores_due_between(&DueWindow::starting_at(now, Duration::minutes(15)))
        .await
        .unwrap();
    assert_eq!(scanned.len(), 2);

    let snapshot = scanned[0].as_ref().unwrap();
    assert_eq!(snapshot.path, "households/household-1/chores/good");
    match &scanned[1] {
        Err(StoreError::Decode(msg)) => {
            assert!(msg.starts_with("households/household-1/chores/bad:"), "{msg}");
        }
        other => panic!("Expected Decode, got: {other:?}"),
    }
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_out_of_range_points_not_written(pool: PgPool) {
    let store = seeded(pool).await;
    let h = hid("household-1");
    let id = ChoreId::parse("huge").unwrap();

    let result = store
        .write_chore(&h, &id, &chore(&["a"], MAX_CHORE_POINTS + 1))
        .await;
    assert!(matches!(result, Err(StoreError::Decode(_))), "got {result:?}");
    assert!(store.get_chore(&h, &id).await.unwrap().is_none());

    store
        .write_chore(&h, &id, &chore(&["a"], MAX_CHORE_POINTS))
        .await
        .unwrap();
    let stored = store.get_chore(&h, &id).await.unwrap().unwrap();
    assert_eq!(stored.points, MAX_CHORE_POINTS);
}
