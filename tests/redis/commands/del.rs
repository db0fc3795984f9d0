use redis_lite::{
    commands::{CommandError, CommandResult},
    connection::Link,
};

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_handle_del_command() {
    let env = TestEnv::new_master_server();

    env.exec_command_ok(
        TestUtils::set_command("grape", "mango"),
        &TestUtils::expected_simple_string("OK"),
    )
    .await;

    env.exec_command_ok(
        TestUtils::del_command("grape"),
        &TestUtils::expected_integer(1),
    )
    .await;

    env.exec_command_ok(
        TestUtils::get_command("grape"),
        &TestUtils::expected_null(),
    )
    .await;

    env.exec_command_ok(
        TestUtils::del_command("grape"),
        &TestUtils::expected_integer(0),
    )
    .await;
}

#[tokio::test]
async fn test_handle_del_command_expired_key() {
    let env = TestEnv::new_master_server();

    env.exec_command_ok(
        TestUtils::set_command_with_expiration("grape", "mango", 20),
        &TestUtils::expected_simple_string("OK"),
    )
    .await;

    TestUtils::sleep_ms(50).await;

    env.exec_command_ok(
        TestUtils::del_command("grape"),
        &TestUtils::expected_integer(0),
    )
    .await;
}

#[tokio::test]
async fn test_handle_del_command_propagates_only_removals() {
    let env = TestEnv::new_master_server();
    let (replica, mut replica_outbound) = TestEnv::new_session(&env.state, 41845, Link::Client);

    env.exec_command_on(&replica, TestUtils::replconf_command("listening-port", "6380"))
        .await
        .unwrap();
    env.exec_command_on(&replica, TestUtils::psync_command("?", "-1"))
        .await
        .unwrap();
    replica_outbound.try_recv().unwrap();

    env.exec_command_ok(
        TestUtils::del_command("missing"),
        &TestUtils::expected_integer(0),
    )
    .await;
    assert!(replica_outbound.try_recv().is_err());

    env.exec_command_ok(
        TestUtils::set_command("grape", "mango"),
        &TestUtils::expected_simple_string("OK"),
    )
    .await;
    env.exec_command_ok(
        TestUtils::del_command("grape"),
        &TestUtils::expected_integer(1),
    )
    .await;

    assert_eq!(
        replica_outbound.try_recv().unwrap(),
        TestUtils::set_command("grape", "mango").encode()
    );
    assert_eq!(
        replica_outbound.try_recv().unwrap(),
        TestUtils::del_command("grape").encode()
    );
}

#[tokio::test]
async fn test_handle_del_command_invalid() {
    let env = TestEnv::new_master_server();

    let test_cases = vec![
        TestUtils::invalid_command(&["DEL"]),
        TestUtils::invalid_command(&["DEL", "grape", "mango"]),
    ];

    for command in test_cases {
        env.exec_command_err(command, CommandError::InvalidDelCommand)
            .await;
    }
}

#[tokio::test]
async fn test_handle_del_command_on_master_link_is_silent() {
    let env = TestEnv::new_replica_server(6380);
    let (master, mut master_outbound) = TestEnv::new_session(&env.state, 6379, Link::Master);

    env.exec_command_ok(
        TestUtils::set_command("grape", "mango"),
        &TestUtils::expected_simple_string("OK"),
    )
    .await;

    let result = env
        .exec_command_on(&master, TestUtils::del_command("grape"))
        .await;
    assert_eq!(result, Ok(CommandResult::NoResponse));
    assert!(master_outbound.try_recv().is_err());

    env.exec_command_ok(
        TestUtils::get_command("grape"),
        &TestUtils::expected_null(),
    )
    .await;
}
