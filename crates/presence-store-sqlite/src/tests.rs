//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone as _, Utc};
use presence_core::{
  Error as CoreError,
  directory::{NewEnvironment, NewSubject, SubjectUpdate},
  presence::{Actor, PresenceService},
  store::PresenceStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore, encode::encode_uuid};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap() }

fn new_subject(name: &str) -> NewSubject {
  NewSubject { name: name.into(), ..Default::default() }
}

fn new_environment(name: &str) -> NewEnvironment {
  NewEnvironment { name: name.into(), kind: "classroom".into(), capacity: Some(30) }
}

/// A store seeded with one subject and two environments.
async fn seeded() -> (SqliteStore, Uuid, Uuid, Uuid) {
  let s = store().await;
  let subject = s.add_subject(new_subject("Ana")).await.unwrap();
  let room = s.add_environment(new_environment("Room 101")).await.unwrap();
  let lab = s.add_environment(new_environment("Lab")).await.unwrap();
  (s, subject.subject_id, room.environment_id, lab.environment_id)
}

// ─── Directory ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_subject() {
  let s = store().await;

  let subject = s
    .add_subject(NewSubject {
      name:          "Ana".into(),
      registration:  Some("2024001".into()),
      email:         Some("ana@example.com".into()),
      password_hash: Some("$argon2id$stub".into()),
    })
    .await
    .unwrap();

  let fetched = s.get_subject(subject.subject_id).await.unwrap();
  assert_eq!(fetched, Some(subject));
}

#[tokio::test]
async fn get_subject_missing_returns_none() {
  let s = store().await;
  assert!(s.get_subject(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
  let s = store().await;
  let mut input = new_subject("Ana");
  input.registration = Some("2024001".into());
  s.add_subject(input.clone()).await.unwrap();

  input.name = "Another Ana".into();
  let err = s.add_subject(input).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateSubject)));
}

#[tokio::test]
async fn subjects_without_registration_do_not_collide() {
  let s = store().await;
  s.add_subject(new_subject("Ana")).await.unwrap();
  s.add_subject(new_subject("Bruno")).await.unwrap();
  assert_eq!(s.list_subjects().await.unwrap().len(), 2);
}

#[tokio::test]
async fn find_subject_by_email() {
  let s = store().await;
  let mut input = new_subject("Ana");
  input.email = Some("ana@example.com".into());
  let ana = s.add_subject(input).await.unwrap();

  let found = s.find_subject_by_email("ana@example.com".into()).await.unwrap();
  assert_eq!(found, Some(ana));
  assert!(s.find_subject_by_email("bruno@example.com".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn update_subject_overwrites_only_given_fields() {
  let s = store().await;
  let mut input = new_subject("Ana");
  input.registration = Some("2024001".into());
  let ana = s.add_subject(input).await.unwrap();

  let updated = s
    .update_subject(ana.subject_id, SubjectUpdate {
      name: Some("Ana Souza".into()),
      email: Some("ana@example.com".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(updated.name, "Ana Souza");
  assert_eq!(updated.registration.as_deref(), Some("2024001"));
  assert_eq!(updated.email.as_deref(), Some("ana@example.com"));
  assert_eq!(updated.created_at, ana.created_at);
  assert_eq!(s.get_subject(ana.subject_id).await.unwrap(), Some(updated));
}

#[tokio::test]
async fn update_subject_missing_is_not_found() {
  let s = store().await;
  let err = s
    .update_subject(Uuid::new_v4(), SubjectUpdate {
      name: Some("Nobody".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SubjectNotFound(_))));
}

#[tokio::test]
async fn update_subject_to_taken_email_is_duplicate() {
  let s = store().await;
  let mut input = new_subject("Ana");
  input.email = Some("ana@example.com".into());
  s.add_subject(input).await.unwrap();
  let bruno = s.add_subject(new_subject("Bruno")).await.unwrap();

  let err = s
    .update_subject(bruno.subject_id, SubjectUpdate {
      email: Some("ana@example.com".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateSubject)));

  let unchanged = s.get_subject(bruno.subject_id).await.unwrap().unwrap();
  assert!(unchanged.email.is_none());
}

#[tokio::test]
async fn version_one_file_gains_password_column() {
  let conn = tokio_rusqlite::Connection::open_in_memory().await.unwrap();
  conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TABLE subjects (
             subject_id   TEXT PRIMARY KEY,
             name         TEXT NOT NULL,
             registration TEXT UNIQUE,
             email        TEXT UNIQUE,
             created_at   TEXT NOT NULL
         );
         INSERT INTO subjects VALUES
           ('00000000-0000-4000-8000-000000000001', 'Ana', NULL, NULL,
            '2025-03-10T08:00:00.000000Z');
         PRAGMA user_version = 1;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let s = SqliteStore { conn };
  s.init_schema().await.unwrap();

  let subjects = s.list_subjects().await.unwrap();
  assert_eq!(subjects.len(), 1);
  assert!(subjects[0].password_hash.is_none());

  let version: i64 = s
    .conn
    .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?))
    .await
    .unwrap();
  assert_eq!(version, 2);
}

#[tokio::test]
async fn environments_list_in_creation_order() {
  let s = store().await;
  let a = s.add_environment(new_environment("A")).await.unwrap();
  let b = s.add_environment(new_environment("B")).await.unwrap();

  let all = s.list_environments().await.unwrap();
  let ids: Vec<_> = all.iter().map(|e| e.environment_id).collect();
  assert_eq!(ids, vec![a.environment_id, b.environment_id]);
  assert_eq!(all[0].capacity, Some(30));

  let fetched = s.get_environment(b.environment_id).await.unwrap();
  assert_eq!(fetched, Some(b));
}

// ─── Ledger writes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn create_entry_opens_and_is_found() {
  let (s, subject, room, _) = seeded().await;

  let entry = s.create_entry(subject, room, t0()).await.unwrap();
  assert!(entry.is_open());

  let open = s.find_open_entry(subject).await.unwrap();
  assert_eq!(open, Some(entry));
}

#[tokio::test]
async fn create_entry_rejects_second_open_entry() {
  let (s, subject, room, lab) = seeded().await;
  s.create_entry(subject, room, t0()).await.unwrap();

  let err = s
    .create_entry(subject, lab, t0() + Duration::minutes(1))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::AlreadyPresent { environment_id, .. }) if environment_id == room
  ));
  assert_eq!(s.open_entries_for_subject(subject).await.unwrap().len(), 1);
}

#[tokio::test]
async fn create_entry_checks_references() {
  let (s, subject, room, _) = seeded().await;

  let err = s.create_entry(Uuid::new_v4(), room, t0()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SubjectNotFound(_))));

  let err = s.create_entry(subject, Uuid::new_v4(), t0()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::EnvironmentNotFound(_))));
}

#[tokio::test]
async fn unique_index_rejects_second_open_entry_at_sql_level() {
  let (s, subject, room, _) = seeded().await;
  s.create_entry(subject, room, t0()).await.unwrap();

  let subject_str = encode_uuid(subject);
  let room_str = encode_uuid(room);
  let result = s
    .conn
    .call(move |conn| {
      conn.execute(
        "INSERT INTO entries (entry_id, subject_id, environment_id, check_in_at)
         VALUES (?1, ?2, ?3, '2025-03-10T09:00:00.000000Z')",
        rusqlite::params![encode_uuid(Uuid::new_v4()), subject_str, room_str],
      )?;
      Ok(())
    })
    .await;
  assert!(result.is_err());
}

#[tokio::test]
async fn close_entry_sets_checkout_once() {
  let (s, subject, room, _) = seeded().await;
  let entry = s.create_entry(subject, room, t0()).await.unwrap();

  let out = t0() + Duration::minutes(45);
  let closed = s.close_entry(entry.entry_id, out).await.unwrap();
  assert_eq!(closed.entry_id, entry.entry_id);
  assert_eq!(closed.check_in_at, entry.check_in_at);
  assert_eq!(closed.check_out_at, Some(out));

  let err = s
    .close_entry(entry.entry_id, out + Duration::minutes(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::AlreadyClosed(_))));

  // The first check-out time is untouched.
  let history = s.list_by_subject(subject).await.unwrap();
  assert_eq!(history[0].check_out_at, Some(out));
  assert!(s.find_open_entry(subject).await.unwrap().is_none());
}

#[tokio::test]
async fn close_entry_missing_is_not_found() {
  let s = store().await;
  let err = s.close_entry(Uuid::new_v4(), t0()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::EntryNotFound(_))));
}

#[tokio::test]
async fn close_entry_before_checkin_is_rejected() {
  let (s, subject, room, _) = seeded().await;
  let entry = s.create_entry(subject, room, t0()).await.unwrap();

  let err = s
    .close_entry(entry.entry_id, t0() - Duration::milliseconds(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::CheckOutBeforeCheckIn { .. })));
  assert!(s.find_open_entry(subject).await.unwrap().is_some());
}

#[tokio::test]
async fn close_entry_at_checkin_instant_is_allowed() {
  let (s, subject, room, _) = seeded().await;
  let entry = s.create_entry(subject, room, t0()).await.unwrap();
  let closed = s.close_entry(entry.entry_id, t0()).await.unwrap();
  assert_eq!(closed.check_out_at, Some(t0()));
}

#[tokio::test]
async fn subject_can_return_after_checkout() {
  let (s, subject, room, lab) = seeded().await;
  let first = s.create_entry(subject, room, t0()).await.unwrap();
  s.close_entry(first.entry_id, t0() + Duration::minutes(10)).await.unwrap();

  let second = s
    .create_entry(subject, lab, t0() + Duration::minutes(20))
    .await
    .unwrap();
  assert_eq!(s.find_open_entry(subject).await.unwrap(), Some(second));
}

#[tokio::test]
async fn timestamps_are_kept_to_the_microsecond() {
  let (s, subject, room, _) = seeded().await;
  let now = t0() + Duration::nanoseconds(1_234_567);

  let entry = s.create_entry(subject, room, now).await.unwrap();
  assert_eq!(entry.check_in_at, t0() + Duration::microseconds(1_234));

  let stored = s.find_open_entry(subject).await.unwrap().unwrap();
  assert_eq!(stored, entry);
}

// ─── Ledger reads ────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_by_subject_is_most_recent_first() {
  let (s, subject, room, lab) = seeded().await;
  for (i, env) in [room, lab, room].into_iter().enumerate() {
    let start = t0() + Duration::hours(i as i64);
    let e = s.create_entry(subject, env, start).await.unwrap();
    s.close_entry(e.entry_id, start + Duration::minutes(30)).await.unwrap();
  }

  let history = s.list_by_subject(subject).await.unwrap();
  assert_eq!(history.len(), 3);
  assert!(history.windows(2).all(|w| w[0].check_in_at > w[1].check_in_at));
}

#[tokio::test]
async fn list_by_environment_and_open_counts() {
  let (s, ana, room, lab) = seeded().await;
  let bruno = s.add_subject(new_subject("Bruno")).await.unwrap().subject_id;
  let carla = s.add_subject(new_subject("Carla")).await.unwrap().subject_id;

  s.create_entry(ana, room, t0()).await.unwrap();
  s.create_entry(bruno, room, t0()).await.unwrap();
  let c = s.create_entry(carla, room, t0()).await.unwrap();
  s.close_entry(c.entry_id, t0() + Duration::hours(1)).await.unwrap();

  assert_eq!(s.list_by_environment(room).await.unwrap().len(), 3);
  assert_eq!(s.count_open_by_environment(room).await.unwrap(), 2);
  assert_eq!(s.count_open_by_environment(lab).await.unwrap(), 0);
  assert_eq!(s.list_open_entries().await.unwrap().len(), 2);
}

// ─── Through the service ─────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_checkins_for_one_subject_admit_exactly_one() {
  let (s, subject, room, lab) = seeded().await;
  let service = PresenceService::new(Arc::new(s));

  let attempts = (0..16).map(|i| {
    let service = service.clone();
    let env = if i % 2 == 0 { room } else { lab };
    tokio::spawn(async move {
      service.checkin(Actor::SelfService(subject), env, t0()).await
    })
  });

  let mut ok = 0;
  for handle in attempts.collect::<Vec<_>>() {
    match handle.await.unwrap() {
      Ok(_) => ok += 1,
      Err(e) => assert!(matches!(e, CoreError::AlreadyPresent { .. }), "{e}"),
    }
  }
  assert_eq!(ok, 1);
  assert_eq!(
    service.store().open_entries_for_subject(subject).await.unwrap().len(),
    1
  );
}

#[tokio::test]
async fn concurrent_checkouts_close_once() {
  let (s, subject, room, _) = seeded().await;
  let service = PresenceService::new(Arc::new(s));
  service
    .checkin(Actor::Operator(subject), room, t0())
    .await
    .unwrap();

  let attempts: Vec<_> = (0..8)
    .map(|_| {
      let service = service.clone();
      tokio::spawn(async move {
        service
          .checkout(Actor::Operator(subject), t0() + Duration::minutes(5))
          .await
      })
    })
    .collect();

  let mut ok = 0;
  for handle in attempts {
    match handle.await.unwrap() {
      Ok(_) => ok += 1,
      Err(e) => assert!(matches!(e, CoreError::NoOpenEntry(_)), "{e}"),
    }
  }
  assert_eq!(ok, 1);
}

#[tokio::test]
async fn service_series_over_sqlite() {
  let (s, ana, room, _) = seeded().await;
  let bruno = s.add_subject(new_subject("Bruno")).await.unwrap().subject_id;
  let service = PresenceService::new(Arc::new(s));

  service.checkin(Actor::Operator(ana), room, t0()).await.unwrap();
  service
    .checkin(Actor::Operator(bruno), room, t0() + Duration::minutes(15))
    .await
    .unwrap();
  service
    .checkout(Actor::Operator(ana), t0() + Duration::minutes(30))
    .await
    .unwrap();

  let points = service.occupancy_series(room).await.unwrap();
  let got: Vec<_> = points.iter().map(|p| (p.at, p.level)).collect();
  assert_eq!(
    got,
    vec![
      (t0(), 1),
      (t0() + Duration::minutes(15), 2),
      (t0() + Duration::minutes(30), 1),
    ]
  );
}
