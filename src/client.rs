use tracing::warn;

use crate::error::ClientError;
use crate::model::{Row, SqlValue};

/// Options applied to a connect attempt.
///
/// `timeout_secs` bounds the transport-level connect; `login_timeout_secs`
/// bounds the authentication handshake where the backend distinguishes the
/// two (the wire-protocol adapter does, the ODBC adapter folds both into the
/// driver's login timeout). Commands issued after connect have no per-call
/// timeout.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    pub timeout_secs: u64,
    pub login_timeout_secs: u64,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            login_timeout_secs: 10,
        }
    }
}

impl ConnectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_login_timeout(mut self, secs: u64) -> Self {
        self.login_timeout_secs = secs;
        self
    }
}

/// The client contract all driver adapters implement.
///
/// One successful `connect_*` call must precede any other method; calling
/// `execute`/`fetch_all`/`commit`/`rollback` first fails with
/// [`ClientError::QueryExecutionError`]. A client owns at most one live
/// connection at a time; a second connect supersedes the first.
///
/// Parameter values are always bound through the driver's placeholder
/// mechanism (`?` for the ODBC adapter, `@P1..@Pn` for the wire-protocol
/// adapter), never interpolated into the command text.
///
/// Clients are synchronous and blocking, and not safe for concurrent use;
/// construct one client per thread. Teardown is not hooked to `Drop` — wrap
/// the client's lifetime so [`close`](SqlServerClient::close) runs on every
/// exit path.
pub trait SqlServerClient {
    /// Connect with explicit SQL Server credentials.
    fn connect_sql_auth(
        &mut self,
        server: &str,
        database: &str,
        user: &str,
        password: &str,
        opts: &ConnectOptions,
    ) -> Result<(), ClientError>;

    /// Connect with the calling process's ambient host identity.
    ///
    /// Only the ODBC adapter supports this; the wire-protocol adapter fails
    /// immediately with [`ClientError::QueryExecutionError`].
    fn connect_platform_auth(
        &mut self,
        server: &str,
        database: &str,
        opts: &ConnectOptions,
    ) -> Result<(), ClientError>;

    /// Execute one command, binding `params` positionally.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<(), ClientError>;

    /// Apply one command template to an ordered sequence of parameter rows.
    ///
    /// A single forward pass over `rows` suffices; the row count is derived
    /// best-effort for logging only. An empty input completes without
    /// failure and affects zero rows.
    fn execute_many(
        &mut self,
        sql: &str,
        rows: &mut dyn Iterator<Item = Vec<SqlValue>>,
    ) -> Result<(), ClientError>;

    /// Materialize and return all rows pending from the most recently
    /// executed command. After a non-row-returning command this is empty.
    fn fetch_all(&mut self) -> Result<Vec<Row>, ClientError>;

    /// Commit staged changes. A cheap no-op in autocommit mode.
    fn commit(&mut self) -> Result<(), ClientError>;

    /// Roll back staged changes. A cheap no-op in autocommit mode.
    fn rollback(&mut self) -> Result<(), ClientError>;

    /// Release the statement state, then the connection, in that order.
    ///
    /// Idempotent; the connection release is attempted even if releasing the
    /// statement state fails. Teardown never re-raises: failures are logged
    /// at warn level and swallowed.
    fn close(&mut self) -> Result<(), ClientError>;
}

/// Ordered, non-short-circuiting teardown.
///
/// Runs `cursor_close` then `conn_close`; the second always runs. Failures
/// are logged under `context` and swallowed. Returns true when both stages
/// succeeded.
pub(crate) fn close_in_order(
    context: &str,
    cursor_close: impl FnOnce() -> Result<(), String>,
    conn_close: impl FnOnce() -> Result<(), String>,
) -> bool {
    let mut clean = true;
    if let Err(e) = cursor_close() {
        warn!(context, error = %e, "cursor teardown failed");
        clean = false;
    }
    if let Err(e) = conn_close() {
        warn!(context, error = %e, "connection teardown failed");
        clean = false;
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::close_in_order;
    use std::cell::Cell;

    #[test]
    fn teardown_runs_connection_close_after_cursor_failure() {
        let conn_closed = Cell::new(false);
        let clean = close_in_order(
            "test",
            || Err("cursor handle stuck".to_string()),
            || {
                conn_closed.set(true);
                Ok(())
            },
        );
        assert!(conn_closed.get());
        assert!(!clean);
    }

    #[test]
    fn teardown_reports_clean_when_both_stages_succeed() {
        assert!(close_in_order("test", || Ok(()), || Ok(())));
    }

    #[test]
    fn teardown_swallows_connection_close_failure() {
        let clean = close_in_order("test", || Ok(()), || Err("socket already gone".to_string()));
        assert!(!clean);
    }
}
