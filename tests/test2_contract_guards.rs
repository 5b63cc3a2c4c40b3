//! Contract guarantees that hold without any reachable server: pre-connect
//! calls fail with the query-execution kind, platform auth on the wire
//! adapter always fails, and close is idempotent.

use sqlserver_client::{ClientError, ConnectOptions, SqlServerClient, SqlValue};

#[cfg(feature = "tds")]
mod tds {
    use super::*;
    use sqlserver_client::TdsClient;

    #[test]
    fn every_command_method_before_connect_is_a_query_execution_error() {
        let mut client = TdsClient::new(false).unwrap();

        let execute = client.execute("SELECT 1", &[]);
        assert!(matches!(
            execute,
            Err(ClientError::QueryExecutionError { .. })
        ));

        let mut rows = vec![vec![SqlValue::Int(1)]].into_iter();
        let batch = client.execute_many("INSERT INTO t (a) VALUES (@P1)", &mut rows);
        assert!(matches!(batch, Err(ClientError::QueryExecutionError { .. })));

        assert!(matches!(
            client.fetch_all(),
            Err(ClientError::QueryExecutionError { .. })
        ));
        assert!(matches!(
            client.commit(),
            Err(ClientError::QueryExecutionError { .. })
        ));
        assert!(matches!(
            client.rollback(),
            Err(ClientError::QueryExecutionError { .. })
        ));
    }

    #[test]
    fn platform_auth_always_fails_with_the_same_kind() {
        let mut client = TdsClient::new(true).unwrap();
        for (server, database) in [("host", "db"), ("10.0.0.1,1450", "master"), ("", "")] {
            let result =
                client.connect_platform_auth(server, database, &ConnectOptions::default());
            assert!(matches!(
                result,
                Err(ClientError::QueryExecutionError { .. })
            ));
        }
    }

    #[test]
    fn close_is_idempotent_even_without_a_connection() {
        let mut client = TdsClient::new(false).unwrap();
        assert!(client.close().is_ok());
        assert!(client.close().is_ok());
    }

    #[test]
    fn clients_are_usable_through_the_trait_object() {
        let mut client = TdsClient::new(false).unwrap();
        let client: &mut dyn SqlServerClient = &mut client;
        assert!(matches!(
            client.execute("SELECT 1", &[]),
            Err(ClientError::QueryExecutionError { .. })
        ));
        assert!(client.close().is_ok());
    }
}

#[cfg(feature = "odbc")]
mod odbc {
    use super::*;
    use sqlserver_client::OdbcClient;

    // Hosts without an ODBC driver manager must fail at construction with
    // DriverNotInstalled; hosts with one must still guard pre-connect calls.
    #[test]
    fn construction_probes_the_driver_before_any_network_activity() {
        match OdbcClient::new(OdbcClient::DEFAULT_DRIVER, false) {
            Err(e) => assert!(matches!(e, ClientError::DriverNotInstalled { .. })),
            Ok(mut client) => {
                assert!(matches!(
                    client.execute("SELECT 1", &[]),
                    Err(ClientError::QueryExecutionError { .. })
                ));
                assert!(matches!(
                    client.fetch_all(),
                    Err(ClientError::QueryExecutionError { .. })
                ));
                assert!(client.close().is_ok());
                assert!(client.close().is_ok());
            }
        }
    }
}
