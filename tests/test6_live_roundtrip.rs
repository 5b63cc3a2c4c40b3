//! Round-trip tests against a real SQL Server instance.
//!
//! Ignored by default; point SQLSERVER_TEST_SERVER / _DATABASE / _USER /
//! _PASSWORD at a disposable database and run with `--ignored`. The ODBC
//! test additionally needs a driver manager plus the driver named by
//! SQLSERVER_TEST_ODBC_DRIVER.

use std::env;

use sqlserver_client::{ConnectOptions, SqlServerClient, SqlValue};

fn live_env() -> Option<(String, String, String, String)> {
    Some((
        env::var("SQLSERVER_TEST_SERVER").ok()?,
        env::var("SQLSERVER_TEST_DATABASE").ok()?,
        env::var("SQLSERVER_TEST_USER").ok()?,
        env::var("SQLSERVER_TEST_PASSWORD").ok()?,
    ))
}

fn roundtrip(client: &mut dyn SqlServerClient, table: &str, placeholders: [&str; 2]) {
    let [p1, p2] = placeholders;

    client
        .execute(
            &format!(
                "CREATE TABLE {table} (symbol NVARCHAR(16) NOT NULL, close_price FLOAT NOT NULL)"
            ),
            &[],
        )
        .unwrap();

    // Parameterized single insert, then a matching select.
    client
        .execute(
            &format!("INSERT INTO {table} (symbol, close_price) VALUES ({p1}, {p2})"),
            &[SqlValue::Text("BTCUSD".to_string()), SqlValue::Float(64250.5)],
        )
        .unwrap();
    client
        .execute(
            &format!("SELECT symbol, close_price FROM {table} WHERE symbol = {p1}"),
            &[SqlValue::Text("BTCUSD".to_string())],
        )
        .unwrap();
    let rows = client.fetch_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get_named("symbol").and_then(SqlValue::as_text),
        Some("BTCUSD")
    );
    assert_eq!(
        rows[0].get_named("close_price").and_then(SqlValue::as_float),
        Some(64250.5)
    );

    // Fetch after a non-row-returning command yields an empty sequence.
    client
        .execute(
            &format!("INSERT INTO {table} (symbol, close_price) VALUES ({p1}, {p2})"),
            &[SqlValue::Text("ETHUSD".to_string()), SqlValue::Float(3120.0)],
        )
        .unwrap();
    assert!(client.fetch_all().unwrap().is_empty());

    // Batched insert over an iterator, then an empty batch, both succeed.
    let batch = vec![
        vec![SqlValue::Text("SOLUSD".to_string()), SqlValue::Float(148.2)],
        vec![SqlValue::Text("ADAUSD".to_string()), SqlValue::Float(0.39)],
    ];
    client
        .execute_many(
            &format!("INSERT INTO {table} (symbol, close_price) VALUES ({p1}, {p2})"),
            &mut batch.into_iter(),
        )
        .unwrap();
    client
        .execute_many(
            &format!("INSERT INTO {table} (symbol, close_price) VALUES ({p1}, {p2})"),
            &mut std::iter::empty(),
        )
        .unwrap();

    client
        .execute(&format!("SELECT COUNT(*) AS n FROM {table}"), &[])
        .unwrap();
    let rows = client.fetch_all().unwrap();
    assert_eq!(rows[0].get_named("n").and_then(SqlValue::as_int), Some(4));

    client.commit().unwrap();
    client.execute(&format!("DROP TABLE {table}"), &[]).unwrap();
    client.commit().unwrap();
    client.close().unwrap();
}

#[cfg(feature = "tds")]
#[test]
#[ignore = "requires a reachable SQL Server instance"]
fn tds_roundtrip_with_numbered_placeholders() {
    let (server, database, user, password) =
        live_env().expect("SQLSERVER_TEST_* environment variables not set");
    let mut client = sqlserver_client::TdsClient::new(false).unwrap();
    client
        .connect_sql_auth(&server, &database, &user, &password, &ConnectOptions::new())
        .unwrap();
    roundtrip(&mut client, "client_roundtrip_tds", ["@P1", "@P2"]);
}

#[cfg(feature = "odbc")]
#[test]
#[ignore = "requires a reachable SQL Server instance and an ODBC driver"]
fn odbc_roundtrip_with_question_mark_placeholders() {
    let (server, database, user, password) =
        live_env().expect("SQLSERVER_TEST_* environment variables not set");
    let driver = env::var("SQLSERVER_TEST_ODBC_DRIVER")
        .unwrap_or_else(|_| sqlserver_client::OdbcClient::DEFAULT_DRIVER.to_string());
    let mut client = sqlserver_client::OdbcClient::new(driver, false).unwrap();
    client
        .connect_sql_auth(&server, &database, &user, &password, &ConnectOptions::new())
        .unwrap();
    roundtrip(&mut client, "client_roundtrip_odbc", ["?", "?"]);
}

#[cfg(feature = "tds")]
#[test]
#[ignore = "requires a reachable SQL Server instance"]
fn tds_rollback_discards_staged_changes() {
    let (server, database, user, password) =
        live_env().expect("SQLSERVER_TEST_* environment variables not set");
    let mut client = sqlserver_client::TdsClient::new(false).unwrap();
    client
        .connect_sql_auth(&server, &database, &user, &password, &ConnectOptions::new())
        .unwrap();

    client
        .execute("CREATE TABLE client_rollback_probe (n INT NOT NULL)", &[])
        .unwrap();
    client.commit().unwrap();

    client
        .execute("INSERT INTO client_rollback_probe (n) VALUES (@P1)", &[SqlValue::Int(1)])
        .unwrap();
    client.rollback().unwrap();

    client
        .execute("SELECT COUNT(*) AS n FROM client_rollback_probe", &[])
        .unwrap();
    let rows = client.fetch_all().unwrap();
    assert_eq!(rows[0].get_named("n").and_then(SqlValue::as_int), Some(0));

    client.execute("DROP TABLE client_rollback_probe", &[]).unwrap();
    client.commit().unwrap();
    client.close().unwrap();
}
