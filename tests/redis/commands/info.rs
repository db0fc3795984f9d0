use redis_lite::{commands::CommandError, connection::Link, state::LinkState};

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_handle_info_command_on_master() {
    let env = TestEnv::new_master_server();

    let expected = TestUtils::expected_simple_string(
        "role:master, connected_slaves:0, master_replid:8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb, master_repl_offset:0",
    );

    for section in [None, Some("replication"), Some("REPLICATION")] {
        env.exec_command_ok(TestUtils::info_command(section), &expected)
            .await;
    }
}

#[tokio::test]
async fn test_handle_info_command_counts_replicas() {
    let env = TestEnv::new_master_server();
    let (replica, _replica_outbound) = TestEnv::new_session(&env.state, 41845, Link::Client);

    env.exec_command_on(&replica, TestUtils::replconf_command("listening-port", "6380"))
        .await
        .unwrap();

    env.exec_command_ok(
        TestUtils::info_command(None),
        &TestUtils::expected_simple_string(
            "role:master, connected_slaves:1, master_replid:8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb, master_repl_offset:0",
        ),
    )
    .await;
}

#[tokio::test]
async fn test_handle_info_command_on_replica() {
    let env = TestEnv::new_replica_server(6380);

    env.exec_command_ok(
        TestUtils::info_command(Some("replication")),
        &TestUtils::expected_simple_string(
            "role:slave, connected_slaves:0, master_replid:8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb, master_repl_offset:0, master_host:127.0.0.1, master_port:6379, master_link_status:down",
        ),
    )
    .await;

    env.state.set_link_state(LinkState::Streaming);

    let response = env.exec_command(TestUtils::info_command(None)).await;
    let Ok(redis_lite::commands::CommandResult::Response(response)) = response else {
        panic!("Expected response, got {:?}", response);
    };
    assert!(String::from_utf8_lossy(&response).ends_with("master_link_status:up\r\n"));
}

#[tokio::test]
async fn test_handle_info_command_invalid() {
    let env = TestEnv::new_master_server();

    env.exec_command_err(
        TestUtils::info_command(Some("keyspace")),
        CommandError::InvalidInfoSection,
    )
    .await;

    env.exec_command_err(
        TestUtils::invalid_command(&["INFO", "replication", "server"]),
        CommandError::InvalidInfoCommand,
    )
    .await;
}
