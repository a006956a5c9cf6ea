use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kiln_core::ErrorKind;
use kiln_data::{
    sql_args, ConnectionHandle, ConnectionProvider, DataError, ExecutorOptions, HealthStatus,
    Pagination, SqlValue, TransactionHandle, TransactionalExecutor,
};

// ── Scripted in-memory backend ──────────────────────────────────────────

#[derive(Default)]
struct Behaviour {
    connect_fails: bool,
    begin_fails: bool,
    affected: u64,
    exec_fails: bool,
    exec_delay: Option<Duration>,
    scalar: Option<SqlValue>,
    scalar_fails: bool,
    commit_fails: bool,
    rollback_fails: bool,
    rows: Vec<i64>,
    query_fails: bool,
    one: Option<i64>,
    count: Option<i64>,
}

#[derive(Default)]
struct FakeDb {
    behaviour: Mutex<Behaviour>,
    events: Mutex<Vec<&'static str>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl FakeDb {
    fn new(configure: impl FnOnce(&mut Behaviour)) -> Arc<Self> {
        let db = Arc::new(FakeDb::default());
        db.set(configure);
        db
    }

    fn set(&self, configure: impl FnOnce(&mut Behaviour)) {
        configure(&mut self.behaviour.lock().unwrap());
    }

    fn record(&self, event: &'static str) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct FakeProvider {
    db: Arc<FakeDb>,
}

impl ConnectionProvider for FakeProvider {
    type Handle = FakeHandle;

    async fn connect(&self) -> Result<FakeHandle, DataError> {
        if self.db.behaviour.lock().unwrap().connect_fails {
            return Err(DataError::Other("connection refused".into()));
        }
        self.db.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle {
            db: Arc::clone(&self.db),
            ping: Ping::Alive,
        })
    }
}

#[derive(Clone, Copy)]
enum Ping {
    Alive,
    Busy,
    Dead,
}

struct FakeHandle {
    db: Arc<FakeDb>,
    ping: Ping,
}

impl FakeHandle {
    fn stale(db: &Arc<FakeDb>) -> Self {
        FakeHandle {
            db: Arc::clone(db),
            ping: Ping::Dead,
        }
    }

    fn busy(db: &Arc<FakeDb>) -> Self {
        FakeHandle {
            db: Arc::clone(db),
            ping: Ping::Busy,
        }
    }
}

impl ConnectionHandle for FakeHandle {
    type Row = i64;
    type Tx = FakeTx;

    async fn ping(&self) -> Result<(), DataError> {
        self.db.record("ping");
        match self.ping {
            Ping::Alive => Ok(()),
            Ping::Busy => Err(DataError::Busy("all connections checked out".into())),
            Ping::Dead => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(DataError::Other("connection reset by peer".into()))
            }
        }
    }

    async fn begin(&self) -> Result<FakeTx, DataError> {
        self.db.record("begin");
        if self.db.behaviour.lock().unwrap().begin_fails {
            return Err(DataError::Other("too many clients".into()));
        }
        Ok(FakeTx {
            db: Arc::clone(&self.db),
        })
    }

    async fn query(&self, _sql: &str, _args: &[SqlValue]) -> Result<Vec<i64>, DataError> {
        let b = self.db.behaviour.lock().unwrap();
        if b.query_fails {
            return Err(DataError::Other("relation does not exist".into()));
        }
        Ok(b.rows.clone())
    }

    async fn query_one(&self, _sql: &str, _args: &[SqlValue]) -> Result<Option<i64>, DataError> {
        Ok(self.db.behaviour.lock().unwrap().one)
    }

    async fn query_scalar(&self, _sql: &str, _args: &[SqlValue]) -> Result<SqlValue, DataError> {
        self.db
            .behaviour
            .lock()
            .unwrap()
            .count
            .map(SqlValue::Int)
            .ok_or_else(|| DataError::Other("count failed".into()))
    }

    async fn close(&self) {
        self.db.record("close");
        self.db.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeTx {
    db: Arc<FakeDb>,
}

impl TransactionHandle for FakeTx {
    async fn exec(&mut self, _sql: &str, _args: &[SqlValue]) -> Result<u64, DataError> {
        self.db.record("exec");
        let (delay, fails, affected) = {
            let b = self.db.behaviour.lock().unwrap();
            (b.exec_delay, b.exec_fails, b.affected)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(DataError::Other("syntax error".into()));
        }
        Ok(affected)
    }

    async fn query_scalar(&mut self, _sql: &str, _args: &[SqlValue]) -> Result<SqlValue, DataError> {
        self.db.record("query");
        let b = self.db.behaviour.lock().unwrap();
        if b.scalar_fails {
            return Err(DataError::Other("duplicate key value".into()));
        }
        b.scalar
            .clone()
            .ok_or_else(|| DataError::NotFound("no rows".into()))
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        self.db.record("commit");
        if self.db.behaviour.lock().unwrap().commit_fails {
            return Err(DataError::Other("could not serialize access".into()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        self.db.record("rollback");
        if self.db.behaviour.lock().unwrap().rollback_fails {
            return Err(DataError::Other("connection lost".into()));
        }
        Ok(())
    }
}

fn executor(db: &Arc<FakeDb>) -> TransactionalExecutor<FakeProvider> {
    TransactionalExecutor::new(FakeProvider { db: Arc::clone(db) })
}

#[derive(Debug, PartialEq)]
struct User {
    id: i64,
}

fn user_mapper(row: &i64) -> Result<User, DataError> {
    Ok(User { id: *row })
}

// ── Create ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_returns_generated_id_and_commits() {
    let db = FakeDb::new(|b| b.scalar = Some(SqlValue::Int(42)));
    let id: i64 = executor(&db)
        .create("INSERT INTO users ... RETURNING id", "user", &sql_args!["a@b.c"])
        .await
        .unwrap();

    assert_eq!(id, 42);
    assert_eq!(db.events(), vec!["begin", "query", "commit"]);
    assert_eq!(db.connects(), 1);
}

#[tokio::test]
async fn create_statement_failure_rolls_back() {
    let db = FakeDb::new(|b| b.scalar_fails = true);
    let err = executor(&db)
        .create::<i64>("INSERT", "user", &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StatementFailed);
    assert_eq!(err.message(), "Failed to create user");
    assert_eq!(db.events(), vec!["begin", "query", "rollback"]);
}

#[tokio::test]
async fn create_commit_failure_attempts_rollback() {
    let db = FakeDb::new(|b| {
        b.scalar = Some(SqlValue::Int(42));
        b.commit_fails = true;
    });
    let err = executor(&db)
        .create::<i64>("INSERT", "user", &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CommitFailed);
    assert!(err.message().contains("indeterminate"));
    assert_eq!(db.events(), vec!["begin", "query", "commit", "rollback"]);
}

#[tokio::test]
async fn create_commit_failure_stays_indeterminate_when_rollback_fails() {
    let db = FakeDb::new(|b| {
        b.scalar = Some(SqlValue::Int(42));
        b.commit_fails = true;
        b.rollback_fails = true;
    });
    let err = executor(&db)
        .create::<i64>("INSERT", "user", &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CommitFailed);
    assert_eq!(
        err.message(),
        "Failed to commit transaction for user; create outcome is indeterminate"
    );
    assert_eq!(db.events(), vec!["begin", "query", "commit", "rollback"]);
}

#[tokio::test]
async fn begin_failure_is_transaction_begin_failed() {
    let db = FakeDb::new(|b| {
        b.begin_fails = true;
        b.scalar = Some(SqlValue::Int(42));
    });
    let err = executor(&db)
        .create::<i64>("INSERT", "user", &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransactionBeginFailed);
    assert_eq!(err.status(), 500);
    assert_eq!(db.events(), vec!["begin"]);
}

#[tokio::test]
async fn create_with_unexpected_id_type_is_scan_failure() {
    let db = FakeDb::new(|b| b.scalar = Some(SqlValue::Text("not-a-number".into())));
    let err = executor(&db)
        .create::<i64>("INSERT", "user", &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ScanFailed);
    assert_eq!(db.events(), vec!["begin", "query", "rollback"]);
}

// ── Update / Delete ─────────────────────────────────────────────────────

#[tokio::test]
async fn update_with_zero_rows_is_not_found_and_never_commits() {
    let db = FakeDb::new(|b| b.affected = 0);
    let err = executor(&db).update("UPDATE", "user", &[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.status(), 404);
    assert_eq!(err.message(), "No user found with the given criteria to update");
    assert!(!db.events().contains(&"commit"));
    assert_eq!(db.events(), vec!["begin", "exec", "rollback"]);
}

#[tokio::test]
async fn update_commits_when_rows_affected() {
    let db = FakeDb::new(|b| b.affected = 1);
    executor(&db).update("UPDATE", "user", &[]).await.unwrap();
    assert_eq!(db.events(), vec!["begin", "exec", "commit"]);
}

#[tokio::test]
async fn update_statement_failure_rolls_back() {
    let db = FakeDb::new(|b| b.exec_fails = true);
    let err = executor(&db).update("UPDATE", "user", &[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StatementFailed);
    assert_eq!(err.message(), "Failed to update user");
    assert_eq!(db.events(), vec!["begin", "exec", "rollback"]);
}

#[tokio::test]
async fn update_failure_is_reported_even_when_rollback_fails() {
    let db = FakeDb::new(|b| {
        b.exec_fails = true;
        b.rollback_fails = true;
    });
    let err = executor(&db).update("UPDATE", "user", &[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StatementFailed);
    assert_eq!(err.message(), "Failed to update user");
    assert_eq!(db.events(), vec!["begin", "exec", "rollback"]);
}

#[tokio::test]
async fn zero_row_update_stays_not_found_when_rollback_fails() {
    let db = FakeDb::new(|b| {
        b.affected = 0;
        b.rollback_fails = true;
    });
    let err = executor(&db).update("UPDATE", "user", &[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn update_commit_failure_is_reported() {
    let db = FakeDb::new(|b| {
        b.affected = 3;
        b.commit_fails = true;
    });
    let err = executor(&db).update("UPDATE", "user", &[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CommitFailed);
    assert_eq!(err.message(), "Failed to commit transaction for user");
}

#[tokio::test]
async fn delete_with_zero_rows_is_success() {
    let db = FakeDb::new(|b| b.affected = 0);
    executor(&db).delete("DELETE", "user", &[]).await.unwrap();

    assert!(!db.events().contains(&"commit"));
    assert_eq!(db.events(), vec!["begin", "exec", "rollback"]);
}

#[tokio::test]
async fn delete_commits_when_rows_affected() {
    let db = FakeDb::new(|b| b.affected = 2);
    executor(&db).delete("DELETE", "user", &[]).await.unwrap();
    assert_eq!(db.events(), vec!["begin", "exec", "commit"]);
}

#[tokio::test]
async fn delete_statement_failure_rolls_back() {
    let db = FakeDb::new(|b| b.exec_fails = true);
    let err = executor(&db).delete("DELETE", "user", &[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StatementFailed);
    assert_eq!(err.message(), "Failed to delete user");
    assert_eq!(db.events(), vec!["begin", "exec", "rollback"]);
}

// ── Reads ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_maps_rows_in_order() {
    let db = FakeDb::new(|b| b.rows = vec![3, 1, 2]);
    let users = executor(&db)
        .get("SELECT", "user", user_mapper, &[])
        .await
        .unwrap();

    assert_eq!(users, vec![User { id: 3 }, User { id: 1 }, User { id: 2 }]);
    assert!(!db.events().contains(&"begin"));
}

#[tokio::test]
async fn get_mapper_failure_aborts_whole_call() {
    let db = FakeDb::new(|b| b.rows = vec![1, -1, 2]);
    let mapper = |row: &i64| {
        if *row < 0 {
            return Err(DataError::Other("negative id".into()));
        }
        Ok(User { id: *row })
    };
    let err = executor(&db).get("SELECT", "user", mapper, &[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ScanFailed);
}

#[tokio::test]
async fn get_query_failure_is_query_execution_failed() {
    let db = FakeDb::new(|b| b.query_fails = true);
    let err = executor(&db)
        .get("SELECT", "user", user_mapper, &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueryExecutionFailed);
    assert_eq!(err.message(), "Failed to execute query");
}

#[tokio::test]
async fn get_one_with_no_rows_is_not_found() {
    let db = FakeDb::new(|b| b.one = None);
    let err = executor(&db)
        .get_one("SELECT", "user", user_mapper, &sql_args![7_i64])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), "No user found with the given criteria");
}

#[tokio::test]
async fn get_one_returns_mapped_row() {
    let db = FakeDb::new(|b| b.one = Some(7));
    let user = executor(&db)
        .get_one("SELECT", "user", user_mapper, &[])
        .await
        .unwrap();
    assert_eq!(user, User { id: 7 });
}

#[tokio::test]
async fn get_one_mapper_not_found_is_not_found() {
    let db = FakeDb::new(|b| b.one = Some(7));
    let mapper = |_: &i64| -> Result<User, DataError> { Err(DataError::NotFound("no rows".into())) };
    let err = executor(&db).get_one("SELECT", "user", mapper, &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn get_one_mapper_failure_is_scan_failed() {
    let db = FakeDb::new(|b| b.one = Some(7));
    let mapper = |_: &i64| -> Result<User, DataError> { Err(DataError::Other("bad column".into())) };
    let err = executor(&db).get_one("SELECT", "user", mapper, &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ScanFailed);
    assert_eq!(err.message(), "Failed to scan row");
}

// ── Pagination ──────────────────────────────────────────────────────────

#[tokio::test]
async fn paginated_single_row_defaults_to_one_page() {
    let db = FakeDb::new(|b| {
        b.rows = vec![1];
        b.count = Some(1);
    });
    let page = executor(&db)
        .get_paginated(
            "SELECT COUNT(*) FROM users",
            "user",
            "SELECT * FROM users",
            user_mapper,
            Pagination::default(),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(page.total_rows(), 1);
    assert_eq!(page.total_pages(), 1);
    assert_eq!(page.rows(), &[User { id: 1 }]);
}

#[tokio::test]
async fn paginated_count_failure_discards_rows() {
    let db = FakeDb::new(|b| {
        b.rows = vec![1, 2];
        b.count = None;
    });
    let err = executor(&db)
        .get_paginated("COUNT", "user", "SELECT", user_mapper, Pagination::new(1, 5), &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueryExecutionFailed);
    assert_eq!(err.message(), "Failed to count total rows");
}

#[tokio::test]
async fn paginated_data_failure_aborts_before_count() {
    let db = FakeDb::new(|b| {
        b.query_fails = true;
        b.count = Some(10);
    });
    let err = executor(&db)
        .get_paginated("COUNT", "user", "SELECT", user_mapper, Pagination::default(), &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryExecutionFailed);
    assert_eq!(err.message(), "Failed to execute query");
}

// ── Connection self-healing ─────────────────────────────────────────────

#[tokio::test]
async fn ensure_healthy_twice_acquires_once() {
    let db = FakeDb::new(|_| {});
    let executor = executor(&db);

    executor.ensure_healthy().await.unwrap();
    executor.ensure_healthy().await.unwrap();

    assert_eq!(db.connects(), 1);
    assert_eq!(db.closes(), 0);
    assert_eq!(db.events(), vec!["ping"]);
}

#[tokio::test]
async fn stale_handle_is_closed_and_replaced() {
    let db = FakeDb::new(|_| {});
    let executor =
        TransactionalExecutor::with_handle(FakeProvider { db: Arc::clone(&db) }, FakeHandle::stale(&db));

    executor.ensure_healthy().await.unwrap();

    assert_eq!(db.connects(), 1);
    assert_eq!(db.closes(), 1);
    assert_eq!(db.events(), vec!["ping", "close"]);
}

#[tokio::test]
async fn busy_handle_is_kept() {
    let db = FakeDb::new(|b| b.affected = 1);
    let executor =
        TransactionalExecutor::with_handle(FakeProvider { db: Arc::clone(&db) }, FakeHandle::busy(&db));

    let first = executor.ensure_healthy().await.unwrap();
    let second = executor.ensure_healthy().await.unwrap();
    executor.update("UPDATE", "user", &[]).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(db.connects(), 0);
    assert_eq!(db.closes(), 0);
    assert!(executor.health().await.is_up());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_trigger_a_single_replacement() {
    let db = FakeDb::new(|b| b.rows = vec![1]);
    let executor = Arc::new(TransactionalExecutor::with_handle(
        FakeProvider { db: Arc::clone(&db) },
        FakeHandle::stale(&db),
    ));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let executor = Arc::clone(&executor);
        tasks.spawn(async move { executor.get("SELECT", "user", user_mapper, &[]).await });
    }
    while let Some(result) = tasks.join_next().await {
        assert_eq!(result.unwrap().unwrap(), vec![User { id: 1 }]);
    }

    assert_eq!(db.connects(), 1);
    assert_eq!(db.closes(), 1);
}

#[tokio::test]
async fn connection_failure_is_unavailable_and_retried_next_call() {
    let db = FakeDb::new(|b| b.connect_fails = true);
    let executor = executor(&db);

    let err = executor.update("UPDATE", "user", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionUnavailable);
    assert_eq!(err.status(), 503);
    assert_eq!(executor.health().await, HealthStatus::Down("Database connection unavailable".into()));

    db.set(|b| {
        b.connect_fails = false;
        b.affected = 1;
    });
    executor.update("UPDATE", "user", &[]).await.unwrap();
    assert!(executor.health().await.is_up());
    assert_eq!(db.connects(), 1);
}

#[tokio::test]
async fn close_releases_the_handle() {
    let db = FakeDb::new(|_| {});
    let executor = executor(&db);
    executor.ensure_healthy().await.unwrap();

    executor.close().await;
    assert_eq!(db.closes(), 1);

    executor.ensure_healthy().await.unwrap();
    assert_eq!(db.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn operation_timeout_aborts_slow_statement() {
    let db = FakeDb::new(|b| {
        b.affected = 1;
        b.exec_delay = Some(Duration::from_secs(5));
    });
    let executor = executor(&db).with_options(ExecutorOptions {
        operation_timeout: Some(Duration::from_millis(100)),
    });

    let err = executor.update("UPDATE", "user", &[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueryExecutionFailed);
    assert_eq!(err.message(), "Operation timed out");
    assert!(!db.events().contains(&"commit"));
}
