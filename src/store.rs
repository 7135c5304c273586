//! The handle to the application database and the primitive for running a
//! unit of work inside a single database transaction.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{Error, db::initialize};

/// How many SQLite virtual machine instructions run between deadline checks.
const DEADLINE_CHECK_PERIOD: i32 = 1_000;

/// A shared handle to the application database.
///
/// Cloning the store is cheap and every clone refers to the same connection.
/// Each call to [Store::exec] or [Store::exec_tx] holds the connection for
/// its whole duration, so concurrent callers never interleave statements
/// inside each other's transactions.
#[derive(Debug, Clone)]
pub struct Store {
    connection: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a store from an open connection.
    ///
    /// This function will initialize the database by enabling foreign keys and
    /// adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        initialize(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Acquire the connection, recovering it if an earlier caller panicked
    /// while holding it.
    ///
    /// A panic inside a transaction drops the transaction guard, which rolls
    /// it back, so a poisoned connection is reused once it is back in
    /// autocommit mode.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        let connection = self.connection.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("recovering database connection after a panic in an earlier call");
            self.connection.clear_poison();
            poisoned.into_inner()
        });

        if !connection.is_autocommit() {
            tracing::warn!("rolling back a transaction left open by an earlier call");
            connection.execute_batch("ROLLBACK").map_err(|error| {
                tracing::error!("could not roll back the abandoned transaction: {error}");
                Error::DatabaseLockError
            })?;
        }

        Ok(connection)
    }

    /// Run `f` against the database outside of an explicit transaction.
    ///
    /// Each statement `f` issues commits on its own.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLockError] if a transaction abandoned by an
    /// earlier call cannot be rolled back, otherwise whatever `f` returns.
    pub fn exec<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> Result<T, Error>,
    {
        let connection = self.lock()?;
        f(&*connection)
    }

    /// Run `f` inside a single database transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back if `f`
    /// returns `Err` or panics. The connection handed to `f` is bound to the
    /// transaction, so every query `f` runs sees the transaction's writes.
    ///
    /// # Errors
    /// - The error returned by `f`, after a clean rollback.
    /// - [Error::RollbackFailed] holding both the error from `f` and the
    ///   rollback error if the rollback failed too.
    /// - The error from beginning or committing the transaction.
    /// - [Error::DatabaseLockError] if a transaction abandoned by an earlier
    ///   call cannot be rolled back.
    pub fn exec_tx<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> Result<T, Error>,
    {
        let connection = self.lock()?;
        run_in_transaction(&connection, None, f)
    }

    /// Run `f` inside a single database transaction that must commit before
    /// `deadline`.
    ///
    /// Behaves like [Store::exec_tx], except that the transaction is aborted
    /// with [Error::DeadlineExceeded] once `deadline` passes: before it
    /// begins, while a statement is running, or after `f` returns but
    /// before the commit.
    ///
    /// # Errors
    /// See [Store::exec_tx], plus [Error::DeadlineExceeded].
    pub fn exec_tx_with_deadline<T, F>(&self, deadline: Instant, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> Result<T, Error>,
    {
        let connection = self.lock()?;

        check_deadline(Some(deadline))?;
        run_in_transaction(&connection, Some(deadline), f)
    }

    /// Run `f` on tokio's blocking thread pool so that waiting on the
    /// connection lock or on SQLite does not stall the async runtime.
    ///
    /// # Errors
    /// Returns [Error::TaskFailed] if the task panicked or was cancelled,
    /// otherwise whatever `f` returns.
    pub async fn run_blocking<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T, Error> + Send + 'static,
    {
        let store = self.clone();

        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|error| {
                tracing::error!("blocking database task failed: {error}");
                Error::TaskFailed(error.to_string())
            })?
    }
}

/// Interrupts statements on a connection once a deadline has passed.
///
/// The progress handler is removed when this guard is dropped.
struct DeadlineInterrupt<'conn> {
    connection: &'conn Connection,
}

impl<'conn> DeadlineInterrupt<'conn> {
    fn install(connection: &'conn Connection, deadline: Instant) -> Result<Self, Error> {
        connection.progress_handler(
            DEADLINE_CHECK_PERIOD,
            Some(move || Instant::now() >= deadline),
        )?;

        Ok(Self { connection })
    }
}

impl Drop for DeadlineInterrupt<'_> {
    fn drop(&mut self) {
        if let Err(error) = self
            .connection
            .progress_handler(0, None::<fn() -> bool>)
        {
            tracing::error!("could not remove the deadline progress handler: {error}");
        }
    }
}

fn check_deadline(deadline: Option<Instant>) -> Result<(), Error> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
        _ => Ok(()),
    }
}

fn run_in_transaction<T, F>(
    connection: &Connection,
    deadline: Option<Instant>,
    f: F,
) -> Result<T, Error>
where
    F: FnOnce(&Connection) -> Result<T, Error>,
{
    // IMMEDIATE takes the write lock up front so a transaction never has to
    // upgrade a read lock halfway through.
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;
    tracing::debug!("began transaction");

    let interrupt = deadline
        .map(|deadline| DeadlineInterrupt::install(connection, deadline))
        .transpose()?;

    // Dropping `transaction` during a panic in `f` rolls it back.
    let result = f(&*transaction).and_then(|value| {
        check_deadline(deadline)?;
        Ok(value)
    });

    // Commit and rollback must not be interrupted.
    drop(interrupt);

    match result {
        Ok(value) => {
            transaction.commit()?;
            tracing::debug!("committed transaction");
            Ok(value)
        }
        Err(error) => Err(finish_rollback(error, || transaction.rollback())),
    }
}

/// Roll back after `error` aborted a transaction and return the error the
/// caller should see.
fn finish_rollback<R>(error: Error, rollback: R) -> Error
where
    R: FnOnce() -> Result<(), rusqlite::Error>,
{
    match rollback() {
        Ok(()) => {
            tracing::debug!("rolled back transaction: {error}");
            error
        }
        Err(rollback_error) => {
            tracing::error!("could not roll back transaction after \"{error}\": {rollback_error}");
            Error::RollbackFailed {
                source: Box::new(error),
                rollback: rollback_error,
            }
        }
    }
}
