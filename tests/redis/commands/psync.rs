use std::time::Duration;

use bytes::{Bytes, BytesMut};
use redis_lite::{
    commands::{CommandError, CommandResult},
    connection::Link,
    rdb::EMPTY_RDB,
    resp::RespValue,
};
use tokio::time::timeout;

use crate::test_utils::{TestEnv, TestUtils};

fn expected_full_resync(offset: u64) -> BytesMut {
    let mut expected = BytesMut::new();
    expected.extend_from_slice(
        format!("+FULLRESYNC 8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb {}\r\n", offset).as_bytes(),
    );
    RespValue::encode_snapshot(EMPTY_RDB, &mut expected);
    expected
}

#[tokio::test]
async fn test_handle_psync_command() {
    let mut env = TestEnv::new_master_server();

    env.exec_command_ok(
        TestUtils::replconf_command("listening-port", "6380"),
        &TestUtils::expected_simple_string("OK"),
    )
    .await;

    env.exec_command_no_response(TestUtils::psync_command("?", "-1"))
        .await;

    let reply = env.outbound.try_recv().unwrap();
    assert_eq!(&reply[..], &expected_full_resync(0)[..]);

    // Synced: the next write is streamed to this session.
    let (client, _client_outbound) = TestEnv::new_session(&env.state, 41845, Link::Client);
    let set_command = TestUtils::set_command("grape", "mango");
    env.exec_command_on(&client, set_command.clone()).await.unwrap();

    assert_eq!(env.outbound.try_recv().unwrap(), set_command.encode());
}

#[tokio::test]
async fn test_handle_psync_command_with_full_outbound_queue() {
    let env = TestEnv::new_master_server();
    let (replica, mut replica_outbound) =
        TestEnv::new_session_with_capacity(&env.state, 41845, Link::Client, 1);

    env.exec_command_on(&replica, TestUtils::replconf_command("listening-port", "6380"))
        .await
        .unwrap();

    // The only slot is taken by an earlier reply nobody has read yet.
    replica.send(Bytes::from_static(b"+OK\r\n")).await.unwrap();

    let result = timeout(
        Duration::from_secs(1),
        env.exec_command_on(&replica, TestUtils::psync_command("?", "-1")),
    )
    .await
    .expect("PSYNC blocked on a full queue");
    assert_eq!(result, Err(CommandError::ConnectionClosed));

    // The replica set is free and the half-registered replica is gone.
    let replicas = env.state.replicas.try_lock().unwrap();
    assert!(replicas.is_empty());
    drop(replicas);

    assert!(replica.close_handle().is_triggered());
    assert_eq!(replica_outbound.try_recv().unwrap(), Bytes::from_static(b"+OK\r\n"));
    assert!(replica_outbound.try_recv().is_err());
}

#[tokio::test]
async fn test_handle_psync_command_reports_current_offset() {
    let mut env = TestEnv::new_master_server();
    let set_command = TestUtils::set_command("grape", "mango");

    // A master with no replicas still counts propagated bytes.
    env.exec_command_ok(set_command.clone(), &TestUtils::expected_simple_string("OK"))
        .await;
    let offset = set_command.encode().len() as u64;
    assert_eq!(env.state.repl_offset(), offset);

    // Any requested id or offset still gets a full resync.
    env.exec_command_no_response(TestUtils::psync_command(
        "59211996145553b6fd49a914e49210391ac94854",
        "12",
    ))
    .await;

    let reply = env.outbound.try_recv().unwrap();
    assert_eq!(&reply[..], &expected_full_resync(offset)[..]);
}

#[tokio::test]
async fn test_handle_psync_command_on_replica() {
    let env = TestEnv::new_replica_server(6380);

    env.exec_command_err(
        TestUtils::psync_command("?", "-1"),
        CommandError::PsyncOnReplica,
    )
    .await;
}

#[tokio::test]
async fn test_handle_psync_command_invalid() {
    let env = TestEnv::new_master_server();

    let test_cases = vec![
        (
            TestUtils::invalid_command(&["PSYNC", "?"]),
            CommandError::InvalidPsyncCommand,
        ),
        (
            TestUtils::invalid_command(&["PSYNC", "?", "-1", "random"]),
            CommandError::InvalidPsyncCommand,
        ),
        (
            TestUtils::psync_command("?", "latest"),
            CommandError::InvalidPsyncOffset,
        ),
    ];

    for (command, expected_error) in test_cases {
        env.exec_command_err(command, expected_error).await;
    }

    let result = env.exec_command(TestUtils::psync_command("?", "-1")).await;
    assert_eq!(result, Ok(CommandResult::NoResponse));
}
