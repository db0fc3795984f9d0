use redis_lite::commands::CommandError;

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_handle_ping_command() {
    let env = TestEnv::new_master_server();

    env.exec_command_ok(
        TestUtils::ping_command(),
        &TestUtils::expected_simple_string("PONG"),
    )
    .await;
}

#[tokio::test]
async fn test_handle_ping_command_is_case_insensitive() {
    let env = TestEnv::new_master_server();

    env.exec_command_ok(
        TestUtils::invalid_command(&["pInG"]),
        &TestUtils::expected_simple_string("PONG"),
    )
    .await;
}

#[tokio::test]
async fn test_handle_ping_command_invalid() {
    let env = TestEnv::new_master_server();

    env.exec_command_err(
        TestUtils::invalid_command(&["PING", "hello"]),
        CommandError::InvalidPingCommand,
    )
    .await;
}
