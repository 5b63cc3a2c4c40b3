//! ODBC adapter for SQL Server via `odbc-api`.
//!
//! A process-wide ODBC environment is initialized once; failure to bring it
//! up (no driver manager on the host) surfaces as `DriverNotInstalled`
//! before any network activity. One connection per client; a second connect
//! supersedes the first.

use std::sync::Arc;

use chrono::NaiveDateTime;
use odbc_api::parameter::{InputParameter, VarBinaryBox, VarCharBox};
use odbc_api::{
    Bit, Connection, ConnectionOptions, Cursor, CursorRow, DataType, Environment, Nullable,
};
use once_cell::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::client::{ConnectOptions, SqlServerClient, close_in_order};
use crate::error::ClientError;
use crate::model::{Row, SqlValue, batch_len_hint};

static ENVIRONMENT: OnceCell<Environment> = OnceCell::new();

fn environment() -> Result<&'static Environment, ClientError> {
    ENVIRONMENT.get_or_try_init(|| {
        Environment::new()
            .map_err(|e| ClientError::driver_not_installed("odbc driver manager unavailable", e))
    })
}

fn not_connected() -> ClientError {
    ClientError::query("odbc client is not connected")
}

/// ODBC-style client for SQL Server.
///
/// Placeholder convention: `?`, positional, applied left-to-right in
/// declaration order. Platform/trusted-identity auth is supported through
/// the driver manager's integrated authentication.
pub struct OdbcClient {
    driver: String,
    autocommit: bool,
    conn: Option<Connection<'static>>,
    pending: Vec<Row>,
}

impl OdbcClient {
    pub const DEFAULT_DRIVER: &'static str = "ODBC Driver 18 for SQL Server";

    /// Build a disconnected client against a named ODBC driver.
    ///
    /// # Errors
    /// Returns `ClientError::DriverNotInstalled` if the ODBC driver manager
    /// cannot be initialized. No network activity occurs here.
    pub fn new(driver: impl Into<String>, autocommit: bool) -> Result<Self, ClientError> {
        environment()?;
        let driver = driver.into();
        debug!(driver = %driver, autocommit, "odbc client created");
        Ok(Self {
            driver,
            autocommit,
            conn: None,
            pending: Vec::new(),
        })
    }

    fn connect(
        &mut self,
        env: &'static Environment,
        conn_str: &str,
        opts: &ConnectOptions,
    ) -> Result<(), odbc_api::Error> {
        let login_timeout = u32::try_from(opts.timeout_secs).unwrap_or(u32::MAX);
        let conn = env.connect_with_connection_string(
            conn_str,
            ConnectionOptions {
                login_timeout_sec: Some(login_timeout),
                packet_size: None,
            },
        )?;
        conn.set_autocommit(self.autocommit)?;
        self.conn = Some(conn);
        self.pending.clear();
        Ok(())
    }
}

/// Translate a type-erased value into an owned boxed ODBC input parameter.
fn to_input_parameter(value: &SqlValue) -> Box<dyn InputParameter> {
    match value {
        SqlValue::Int(i) => Box::new(*i),
        SqlValue::Float(f) => Box::new(*f),
        SqlValue::Text(s) => Box::new(VarCharBox::from_string(s.clone())),
        SqlValue::Bool(b) => Box::new(Bit(u8::from(*b))),
        SqlValue::Timestamp(dt) => Box::new(VarCharBox::from_string(
            dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        )),
        SqlValue::Null => Box::new(VarCharBox::null()),
        SqlValue::Json(jsval) => Box::new(VarCharBox::from_string(jsval.to_string())),
        SqlValue::Blob(bytes) => Box::new(VarBinaryBox::from_vec(bytes.clone())),
    }
}

fn convert_params(params: &[SqlValue]) -> Vec<Box<dyn InputParameter>> {
    params.iter().map(to_input_parameter).collect()
}

/// Read one cell, choosing the fetch target from the column's declared type
/// and degrading to text for everything else.
fn read_cell(
    row: &mut CursorRow<'_>,
    col: u16,
    data_type: DataType,
) -> Result<SqlValue, odbc_api::Error> {
    match data_type {
        DataType::BigInt | DataType::Integer | DataType::SmallInt | DataType::TinyInt => {
            let mut target = Nullable::<i64>::null();
            row.get_data(col, &mut target)?;
            Ok(target.into_opt().map_or(SqlValue::Null, SqlValue::Int))
        }
        DataType::Real
        | DataType::Float { .. }
        | DataType::Double
        | DataType::Numeric { .. }
        | DataType::Decimal { .. } => {
            let mut target = Nullable::<f64>::null();
            row.get_data(col, &mut target)?;
            Ok(target.into_opt().map_or(SqlValue::Null, SqlValue::Float))
        }
        DataType::Bit => {
            let mut target = Nullable::<i64>::null();
            row.get_data(col, &mut target)?;
            Ok(target
                .into_opt()
                .map_or(SqlValue::Null, |v| SqlValue::Bool(v != 0)))
        }
        DataType::Binary { .. } | DataType::Varbinary { .. } | DataType::LongVarbinary { .. } => {
            let mut buf = Vec::new();
            let present = row.get_binary(col, &mut buf)?;
            Ok(if present {
                SqlValue::Blob(buf)
            } else {
                SqlValue::Null
            })
        }
        other => {
            let mut buf = Vec::new();
            let present = row.get_text(col, &mut buf)?;
            if !present {
                return Ok(SqlValue::Null);
            }
            let text = String::from_utf8_lossy(&buf).into_owned();
            if matches!(other, DataType::Timestamp { .. } | DataType::Date) {
                if let Ok(dt) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f") {
                    return Ok(SqlValue::Timestamp(dt));
                }
                if let Ok(dt) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S") {
                    return Ok(SqlValue::Timestamp(dt));
                }
            }
            Ok(SqlValue::Text(text))
        }
    }
}

/// Materialize every row of a cursor. The cursor borrows the connection, so
/// buffering here is what lets `fetch_all` run after the statement is gone.
fn buffer_cursor(mut cursor: impl Cursor) -> Result<Vec<Row>, odbc_api::Error> {
    let col_count = u16::try_from(cursor.num_result_cols()?).unwrap_or(0);
    let mut column_names = Vec::with_capacity(col_count as usize);
    let mut column_types = Vec::with_capacity(col_count as usize);
    for col in 1..=col_count {
        column_names.push(cursor.col_name(col)?);
        column_types.push(cursor.col_data_type(col)?);
    }
    let shared = Arc::new(column_names);

    let mut out = Vec::new();
    while let Some(mut row) = cursor.next_row()? {
        let mut values = Vec::with_capacity(col_count as usize);
        for col in 1..=col_count {
            values.push(read_cell(&mut row, col, column_types[(col - 1) as usize].clone())?);
        }
        out.push(Row::new(Arc::clone(&shared), values));
    }
    Ok(out)
}

impl SqlServerClient for OdbcClient {
    fn connect_sql_auth(
        &mut self,
        server: &str,
        database: &str,
        user: &str,
        password: &str,
        opts: &ConnectOptions,
    ) -> Result<(), ClientError> {
        debug!(server, database, user, driver = %self.driver, "odbc connect attempt");
        let env = environment()?;
        let conn_str = format!(
            "DRIVER={{{}}};SERVER={server};DATABASE={database};UID={user};PWD={password};TrustServerCertificate=yes;",
            self.driver
        );
        self.connect(env, &conn_str, opts).map_err(|e| {
            error!(server, database, error = %e, "odbc connect failed");
            ClientError::connection("odbc connection failed", e)
        })?;
        info!(server, database, user, autocommit = self.autocommit, "odbc connected");
        Ok(())
    }

    fn connect_platform_auth(
        &mut self,
        server: &str,
        database: &str,
        opts: &ConnectOptions,
    ) -> Result<(), ClientError> {
        debug!(server, database, driver = %self.driver, "odbc trusted connect attempt");
        let env = environment()?;
        let conn_str = format!(
            "DRIVER={{{}}};SERVER={server};DATABASE={database};Trusted_Connection=yes;TrustServerCertificate=yes;",
            self.driver
        );
        self.connect(env, &conn_str, opts).map_err(|e| {
            error!(server, database, error = %e, "odbc trusted connect failed");
            ClientError::connection("odbc trusted connection failed", e)
        })?;
        info!(server, database, autocommit = self.autocommit, "odbc connected (trusted)");
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<(), ClientError> {
        debug!(sql, params = params.len(), "odbc executing command");
        let conn = self.conn.as_ref().ok_or_else(not_connected)?;
        let bound = convert_params(params);
        let rows = conn
            .execute(sql, bound.as_slice(), None)
            .and_then(|cursor| match cursor {
                Some(cursor) => buffer_cursor(cursor),
                None => Ok(Vec::new()),
            })
            .map_err(|e| {
                error!(sql, error = %e, "odbc command execution failed");
                ClientError::query_with("odbc query execution failed", e)
            })?;
        self.pending = rows;
        info!(sql, params = params.len(), "odbc command executed");
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
                warn!(sql, "odbc batch row count not derivable, assuming 0");
                0
            }
        };
        debug!(sql, rows = count, "odbc executing batch");
        let conn = self.conn.as_ref().ok_or_else(not_connected)?;

        // High-throughput path: prepare once, re-execute per parameter row.
        let mut prepared = conn.prepare(sql).map_err(|e| {
            error!(sql, error = %e, "odbc batch prepare failed");
            ClientError::query_with("odbc batch prepare failed", e)
        })?;
        let mut applied = 0usize;
        for params in rows {
            let bound = convert_params(&params);
            prepared.execute(bound.as_slice()).map_err(|e| {
                error!(sql, row = applied, error = %e, "odbc batch execution failed");
                ClientError::query_with("odbc batch execution failed", e)
            })?;
            applied += 1;
        }
        self.pending.clear();
        info!(sql, rows = applied, "odbc batch executed");
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>, ClientError> {
        debug!("odbc fetching pending rows");
        if self.conn.is_none() {
            return Err(not_connected());
        }
        let rows = std::mem::take(&mut self.pending);
        info!(rows = rows.len(), "odbc fetched pending rows");
        Ok(rows)
    }

    fn commit(&mut self) -> Result<(), ClientError> {
        debug!(autocommit = self.autocommit, "odbc commit");
        let conn = self.conn.as_ref().ok_or_else(not_connected)?;
        if self.autocommit {
            return Ok(());
        }
        conn.commit().map_err(|e| {
            error!(error = %e, "odbc commit failed");
            ClientError::transaction("odbc commit failed", e)
        })?;
        info!("odbc changes committed");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ClientError> {
        debug!(autocommit = self.autocommit, "odbc rollback");
        let conn = self.conn.as_ref().ok_or_else(not_connected)?;
        if self.autocommit {
            return Ok(());
        }
        conn.rollback().map_err(|e| {
            error!(error = %e, "odbc rollback failed");
            ClientError::transaction("odbc rollback failed", e)
        })?;
        info!("odbc changes rolled back");
        Ok(())
    }

    fn close(&mut self) -> Result<(), ClientError> {
        debug!("odbc closing connection");
        let conn = self.conn.take();
        let pending = &mut self.pending;
        let clean = close_in_order(
            "odbc",
            || {
                pending.clear();
                Ok(())
            },
            move || {
                // Dropping the handle performs the ODBC disconnect.
                drop(conn);
                Ok(())
            },
        );
        if clean {
            info!("odbc connection closed");
        }
        Ok(())
    }
}
