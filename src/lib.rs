//! Synchronous SQL Server client abstraction.
//!
//! One contract ([`SqlServerClient`]) covers connections, parameterized
//! commands, batched writes, and transactions; two structurally different
//! drivers are normalized behind it: an ODBC adapter ([`OdbcClient`], `?`
//! placeholders, trusted-identity auth supported) and a TDS wire-protocol
//! adapter ([`TdsClient`], `@P1..@Pn` placeholders, SQL auth only).
//!
//! All native driver failures are translated at the adapter boundary into
//! the five-kind [`ClientError`] taxonomy, with the native description
//! preserved as the cause.
//!
//! ```no_run
//! use sqlserver_client::{ConnectOptions, SqlServerClient, SqlValue, TdsClient};
//!
//! # fn main() -> Result<(), sqlserver_client::ClientError> {
//! let mut client = TdsClient::new(false)?;
//! client.connect_sql_auth(
//!     "192.168.1.210",
//!     "AdventureWorks2017",
//!     "sa",
//!     "P@ssw0rd",
//!     &ConnectOptions::default(),
//! )?;
//! client.execute(
//!     "SELECT FirstName, LastName FROM Person.Person WHERE BusinessEntityID = @P1",
//!     &[SqlValue::Int(1)],
//! )?;
//! for row in client.fetch_all()? {
//!     println!("{:?}", row.values());
//! }
//! client.commit()?;
//! client.close()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

#[cfg(feature = "odbc")]
pub mod odbc;
#[cfg(feature = "tds")]
pub mod tds;

pub use client::{ConnectOptions, SqlServerClient};
pub use config::Settings;
pub use error::ClientError;
pub use logging::LogManager;
pub use model::{QueryAndParams, Row, SqlValue, batch_len_hint};

#[cfg(feature = "odbc")]
pub use odbc::OdbcClient;
#[cfg(feature = "tds")]
pub use tds::TdsClient;

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::client::{ConnectOptions, SqlServerClient};
    pub use crate::error::ClientError;
    pub use crate::model::{QueryAndParams, Row, SqlValue};

    #[cfg(feature = "odbc")]
    pub use crate::odbc::OdbcClient;
    #[cfg(feature = "tds")]
    pub use crate::tds::TdsClient;
}
