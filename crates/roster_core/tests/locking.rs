use roster_core::db::{open_db, open_db_in_memory, open_db_with};
use roster_core::{
    LockMode, Member, MemberFilter, MemberRepository, RepoError, Session, Sort,
    SqliteMemberRepository, StoreConfig,
};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

fn seed(path: &Path) {
    let mut conn = open_db(path).unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();
    repo.save(Member::with_age("member1", 10)).unwrap();
    repo.save(Member::with_age("member2", 20)).unwrap();
    session.commit().unwrap();
}

#[test]
fn locked_read_waits_for_holder_to_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.db");
    seed(&path);

    let (locked_tx, locked_rx) = mpsc::channel();
    let holder_path = path.clone();
    let holder = thread::spawn(move || {
        let mut conn = open_db(&holder_path).unwrap();
        let session = Session::begin(&mut conn).unwrap();
        let repo = SqliteMemberRepository::try_new(&session).unwrap();

        let locked = repo.find_lock_by_username("member1").unwrap();
        let id = locked[0].id.unwrap();
        locked_tx.send(()).unwrap();

        thread::sleep(Duration::from_millis(300));
        session.update_member(id, |member| member.age = 11).unwrap();
        session.commit().unwrap();
    });

    locked_rx.recv().unwrap();
    let mut conn = open_db(&path).unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let started_at = Instant::now();
    let locked = repo.find_lock_by_username("member1").unwrap();
    let waited = started_at.elapsed();
    holder.join().unwrap();

    assert_eq!(locked.len(), 1);
    assert_eq!(locked[0].age, 11);
    assert!(waited >= Duration::from_millis(100), "waited {waited:?}");
    session.commit().unwrap();
}

#[test]
fn locked_read_times_out_while_lock_is_held() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.db");
    seed(&path);

    let mut holder_conn = open_db(&path).unwrap();
    let holder = Session::begin(&mut holder_conn).unwrap();
    let holder_repo = SqliteMemberRepository::try_new(&holder).unwrap();
    holder_repo
        .find_with_lock(
            &MemberFilter::all(),
            &Sort::unsorted(),
            LockMode::PessimisticWrite,
        )
        .unwrap();

    let config = StoreConfig {
        busy_timeout_ms: 50,
        ..StoreConfig::default()
    };
    let mut waiter_conn = open_db_with(&path, &config).unwrap();
    let waiter = Session::begin_with(&mut waiter_conn, &config).unwrap();
    let waiter_repo = SqliteMemberRepository::try_new(&waiter).unwrap();

    let err = waiter_repo.find_lock_by_username("member2").unwrap_err();
    assert!(matches!(err, RepoError::LockTimeout(_)), "unexpected: {err}");
}

#[test]
fn plain_reads_are_not_blocked_by_a_held_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.db");
    seed(&path);

    let mut holder_conn = open_db(&path).unwrap();
    let holder = Session::begin(&mut holder_conn).unwrap();
    SqliteMemberRepository::try_new(&holder)
        .unwrap()
        .find_lock_by_username("member1")
        .unwrap();

    let config = StoreConfig {
        busy_timeout_ms: 50,
        ..StoreConfig::default()
    };
    let mut reader_conn = open_db_with(&path, &config).unwrap();
    let reader = Session::begin_with(&mut reader_conn, &config).unwrap();
    let members = SqliteMemberRepository::try_new(&reader)
        .unwrap()
        .find_with_lock(&MemberFilter::all(), &Sort::unsorted(), LockMode::None)
        .unwrap();
    assert_eq!(members.len(), 2);
}

#[test]
fn locking_session_waits_even_after_a_plain_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.db");
    seed(&path);

    let (locked_tx, locked_rx) = mpsc::channel();
    let holder_path = path.clone();
    let holder = thread::spawn(move || {
        let mut conn = open_db(&holder_path).unwrap();
        let session = Session::begin_locking(&mut conn, &StoreConfig::default()).unwrap();
        let repo = SqliteMemberRepository::try_new(&session).unwrap();

        let id = repo.find_lock_by_username("member1").unwrap()[0].id.unwrap();
        locked_tx.send(()).unwrap();

        thread::sleep(Duration::from_millis(300));
        session.update_member(id, |member| member.age = 12).unwrap();
        session.commit().unwrap();
    });

    locked_rx.recv().unwrap();
    let mut conn = open_db(&path).unwrap();
    let started_at = Instant::now();
    let session = Session::begin_locking(&mut conn, &StoreConfig::default()).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    assert_eq!(repo.count().unwrap(), 2);
    let locked = repo.find_lock_by_username("member1").unwrap();
    let waited = started_at.elapsed();
    holder.join().unwrap();

    assert_eq!(locked[0].age, 12);
    assert!(waited >= Duration::from_millis(100), "waited {waited:?}");
    session.commit().unwrap();
}

#[test]
fn locking_session_times_out_while_lock_is_held() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.db");
    seed(&path);

    let mut holder_conn = open_db(&path).unwrap();
    let _holder = Session::begin_locking(&mut holder_conn, &StoreConfig::default()).unwrap();

    let config = StoreConfig {
        busy_timeout_ms: 50,
        ..StoreConfig::default()
    };
    let mut waiter_conn = open_db_with(&path, &config).unwrap();
    let err = Session::begin_locking(&mut waiter_conn, &config)
        .err()
        .unwrap();
    assert!(matches!(err, RepoError::LockTimeout(_)), "unexpected: {err}");
}

#[test]
fn deferred_session_refuses_lock_after_a_plain_read() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();
    repo.save(Member::with_age("member1", 10)).unwrap();
    session.commit().unwrap();

    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();
    assert_eq!(repo.count().unwrap(), 1);
    assert!(matches!(
        repo.find_lock_by_username("member1"),
        Err(RepoError::LockAfterRead)
    ));
}

#[test]
fn deferred_session_that_already_wrote_can_lock() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    repo.save(Member::with_age("member1", 10)).unwrap();
    assert_eq!(repo.count().unwrap(), 1);
    let locked = repo.find_lock_by_username("member1").unwrap();
    assert_eq!(locked.len(), 1);
}
