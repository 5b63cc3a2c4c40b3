//! SQL Server wire-protocol (TDS) adapter via Tiberius.
//!
//! The contract is synchronous, so the adapter owns a private current-thread
//! tokio runtime and blocks on each driver call. One connection per client;
//! a second connect supersedes the first.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use futures_util::TryStreamExt;
use tiberius::{AuthMethod, Query};
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, error, info, warn};

use crate::client::{ConnectOptions, SqlServerClient, close_in_order};
use crate::error::ClientError;
use crate::model::{Row, SqlValue, batch_len_hint};

type WireConn = tiberius::Client<Compat<TcpStream>>;

const DEFAULT_PORT: u16 = 1433;

/// Wire-protocol client for SQL Server.
///
/// Placeholder convention: `@P1..@Pn`, positional, applied left-to-right in
/// declaration order. Platform/trusted-identity auth is not supported by
/// this adapter; callers needing it must use the ODBC adapter.
pub struct TdsClient {
    runtime: Runtime,
    conn: Option<WireConn>,
    autocommit: bool,
    pending: Vec<Row>,
}

fn not_connected() -> ClientError {
    ClientError::query("tds client is not connected")
}

/// Run a parameterless statement, discarding any result.
fn run_simple(
    runtime: &Runtime,
    conn: &mut WireConn,
    sql: &str,
) -> Result<(), tiberius::error::Error> {
    runtime.block_on(async {
        Query::new(sql).execute(conn).await?;
        Ok(())
    })
}

/// `server` may be `host`, `host,port`, or `host:port`.
fn parse_server(server: &str) -> (String, u16) {
    let split = server.split_once(',').or_else(|| server.split_once(':'));
    match split {
        Some((host, port)) => match port.trim().parse::<u16>() {
            Ok(port) => (host.trim().to_string(), port),
            Err(_) => (server.to_string(), DEFAULT_PORT),
        },
        None => (server.to_string(), DEFAULT_PORT),
    }
}

/// Bind positional parameters onto a Tiberius query in declaration order.
fn bind_query_params<'a>(sql: &'a str, params: &[SqlValue]) -> Query<'a> {
    let mut query = Query::new(sql);
    for param in params {
        match param {
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Timestamp(dt) => {
                query.bind(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
            }
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Json(jsval) => query.bind(jsval.to_string()),
            SqlValue::Blob(bytes) => query.bind(bytes.clone()),
        }
    }
    query
}

/// Extract a value from a row at a specific index, trying the narrow types
/// first and degrading to text.
fn extract_value(row: &tiberius::Row, idx: usize) -> SqlValue {
    if let Ok(Some(val)) = row.try_get::<i32, _>(idx) {
        return SqlValue::Int(i64::from(val));
    }
    if let Ok(Some(val)) = row.try_get::<i64, _>(idx) {
        return SqlValue::Int(val);
    }
    if let Ok(Some(val)) = row.try_get::<f32, _>(idx) {
        return SqlValue::Float(f64::from(val));
    }
    if let Ok(Some(val)) = row.try_get::<f64, _>(idx) {
        return SqlValue::Float(val);
    }
    if let Ok(Some(val)) = row.try_get::<bool, _>(idx) {
        return SqlValue::Bool(val);
    }
    if let Ok(Some(val)) = row.try_get::<NaiveDateTime, _>(idx) {
        return SqlValue::Timestamp(val);
    }
    if let Ok(Some(val)) = row.try_get::<&str, _>(idx) {
        return SqlValue::Text(val.to_string());
    }
    if let Ok(Some(val)) = row.try_get::<&[u8], _>(idx) {
        return SqlValue::Blob(val.to_vec());
    }
    SqlValue::Null
}

impl TdsClient {
    /// Build a disconnected client.
    ///
    /// # Errors
    /// Returns `ClientError::DriverNotInstalled` if the driver's runtime
    /// cannot be brought up. No network activity occurs here.
    pub fn new(autocommit: bool) -> Result<Self, ClientError> {
        let runtime = Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(|e| ClientError::driver_not_installed("tds driver runtime unavailable", e))?;
        debug!(autocommit, "tds client created");
        Ok(Self {
            runtime,
            conn: None,
            autocommit,
            pending: Vec::new(),
        })
    }
}

impl SqlServerClient for TdsClient {
    fn connect_sql_auth(
        &mut self,
        server: &str,
        database: &str,
        user: &str,
        password: &str,
        opts: &ConnectOptions,
    ) -> Result<(), ClientError> {
        debug!(server, database, user, "tds connect attempt");

        let (host, port) = parse_server(server);
        let mut config = tiberius::Config::new();
        config.host(&host);
        config.port(port);
        config.database(database);
        config.authentication(AuthMethod::sql_server(user, password));
        config.trust_cert(); // cert validation is the deployment's concern

        let addr = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| ClientError::connection("failed to resolve server address", e))?
            .next()
            .ok_or_else(|| ClientError::DatabaseConnectionError {
                message: format!("no address found for {host}"),
                cause: None,
            })?;

        let connect_timeout = Duration::from_secs(opts.timeout_secs);
        let login_timeout = Duration::from_secs(opts.login_timeout_secs);

        let connected = self.runtime.block_on(async {
            let tcp = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
                .await
                .map_err(|e| ClientError::connection("tds connect timed out", e))?
                .map_err(|e| ClientError::connection("tcp connection failed", e))?;
            tokio::time::timeout(
                login_timeout,
                tiberius::Client::connect(config, tcp.compat_write()),
            )
            .await
            .map_err(|e| ClientError::connection("tds login timed out", e))?
            .map_err(|e| ClientError::connection("tds connection failed", e))
        });

        let mut conn = match connected {
            Ok(conn) => conn,
            Err(e) => {
                error!(server, database, error = %e, "tds connect failed");
                return Err(e);
            }
        };

        // Autocommit is set on the live connection, not only at construction.
        if !self.autocommit {
            if let Err(e) = run_simple(&self.runtime, &mut conn, "SET IMPLICIT_TRANSACTIONS ON") {
                error!(error = %e, "tds failed to enter manual transaction mode");
                return Err(ClientError::connection("failed to disable autocommit", e));
            }
        }

        self.conn = Some(conn);
        self.pending.clear();
        info!(server, database, user, autocommit = self.autocommit, "tds connected");
        Ok(())
    }

    fn connect_platform_auth(
        &mut self,
        _server: &str,
        _database: &str,
        _opts: &ConnectOptions,
    ) -> Result<(), ClientError> {
        // Genuine capability gap in the TDS credential exchange used here;
        // the ODBC adapter carries integrated auth.
        warn!("platform auth requested, but the tds adapter does not support it");
        Err(ClientError::query(
            "platform auth is not supported by the tds adapter",
        ))
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<(), ClientError> {
        debug!(sql, params = params.len(), "tds executing command");
        let Self { runtime, conn, pending, .. } = self;
        let conn = conn.as_mut().ok_or_else(not_connected)?;

        let query = bind_query_params(sql, params);
        let rows = runtime.block_on(async {
            let mut stream = query.query(conn).await?;
            let column_names: Option<Vec<String>> = stream
                .columns()
                .await?
                .map(|cols| cols.iter().map(|c| c.name().to_string()).collect());
            let Some(column_names) = column_names else {
                // Non-row-returning command; drain so the statement completes.
                stream.into_results().await?;
                return Ok::<_, tiberius::error::Error>(Vec::new());
            };
            let shared = Arc::new(column_names);
            let width = shared.len();
            let mut out = Vec::new();
            let mut rows = stream.into_row_stream();
            while let Some(row) = rows.try_next().await? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(extract_value(&row, i));
                }
                out.push(Row::new(Arc::clone(&shared), values));
            }
            Ok(out)
        });

        *pending = rows.map_err(|e| {
            error!(sql, error = %e, "tds command execution failed");
            ClientError::query_with("tds query execution failed", e)
        })?;
        info!(sql, params = params.len(), "tds command executed");
        Ok(())
    }

    fn execute_many(
        &mut self,
        sql: &str,
        rows: &mut dyn Iterator<Item = Vec<SqlValue>>,
    ) -> Result<(), ClientError> {
        let count = match batch_len_hint(rows) {
            Some(n) => n,
            None => {
                warn!(sql, "tds batch row count not derivable, assuming 0");
                0
            }
        };
        debug!(sql, rows = count, "tds executing batch");

        let Self { runtime, conn, pending, .. } = self;
        let conn = conn.as_mut().ok_or_else(not_connected)?;

        let mut applied = 0usize;
        for params in rows {
            let query = bind_query_params(sql, &params);
            runtime.block_on(query.execute(&mut *conn)).map_err(|e| {
                error!(sql, row = applied, error = %e, "tds batch execution failed");
                ClientError::query_with("tds batch execution failed", e)
            })?;
            applied += 1;
        }
        pending.clear();
        info!(sql, rows = applied, "tds batch executed");
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>, ClientError> {
        debug!("tds fetching pending rows");
        if self.conn.is_none() {
            return Err(not_connected());
        }
        let rows = std::mem::take(&mut self.pending);
        info!(rows = rows.len(), "tds fetched pending rows");
        Ok(rows)
    }

    fn commit(&mut self) -> Result<(), ClientError> {
        debug!(autocommit = self.autocommit, "tds commit");
        let Self { runtime, conn, autocommit, .. } = self;
        let conn = conn.as_mut().ok_or_else(not_connected)?;
        if *autocommit {
            return Ok(());
        }
        run_simple(runtime, conn, "IF @@TRANCOUNT > 0 COMMIT TRANSACTION").map_err(|e| {
            error!(error = %e, "tds commit failed");
            ClientError::transaction("tds commit failed", e)
        })?;
        info!("tds changes committed");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ClientError> {
        debug!(autocommit = self.autocommit, "tds rollback");
        let Self { runtime, conn, autocommit, .. } = self;
        let conn = conn.as_mut().ok_or_else(not_connected)?;
        if *autocommit {
            return Ok(());
        }
        run_simple(runtime, conn, "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").map_err(|e| {
            error!(error = %e, "tds rollback failed");
            ClientError::transaction("tds rollback failed", e)
        })?;
        info!("tds changes rolled back");
        Ok(())
    }

    fn close(&mut self) -> Result<(), ClientError> {
        debug!("tds closing connection");
        let conn = self.conn.take();
        let runtime = &self.runtime;
        let pending = &mut self.pending;
        let clean = close_in_order(
            "tds",
            || {
                pending.clear();
                Ok(())
            },
            move || match conn {
                Some(conn) => runtime.block_on(conn.close()).map_err(|e| e.to_string()),
                None => Ok(()),
            },
        );
        if clean {
            info!("tds connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::parse_server;

    #[test]
    fn server_without_port_defaults_to_1433() {
        assert_eq!(
            parse_server("db.example.com"),
            ("db.example.com".to_string(), 1433)
        );
    }

    #[test]
    fn server_with_comma_port_is_split() {
        assert_eq!(
            parse_server("db.example.com,1533"),
            ("db.example.com".to_string(), 1533)
        );
    }

    #[test]
    fn server_with_colon_port_is_split() {
        assert_eq!(parse_server("10.0.0.5:14330"), ("10.0.0.5".to_string(), 14330));
    }

    #[test]
    fn unparseable_port_falls_back_to_default() {
        assert_eq!(parse_server("db,abc"), ("db,abc".to_string(), 1433));
    }
}
