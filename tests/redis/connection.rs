use std::time::Duration;

use redis_lite::{input::CommandReadError, resp::RespValue};
use tokio::{io::AsyncWriteExt, time::timeout};

use crate::test_utils::TestUtils;

#[tokio::test]
async fn test_basic_commands_over_tcp() {
    let (address, _state, _handle) = TestUtils::start_master().await;
    let (mut reader, mut writer) = TestUtils::connect(address).await;

    let test_cases = vec![
        (TestUtils::ping_command(), RespValue::simple_string("PONG")),
        (
            TestUtils::set_command("test", "value"),
            RespValue::simple_string("OK"),
        ),
        (TestUtils::get_command("test"), RespValue::bulk_string("value")),
        (TestUtils::del_command("foo"), RespValue::Integer(0)),
        (TestUtils::echo_command("hey"), RespValue::bulk_string("hey")),
    ];

    for (command, expected) in test_cases {
        let reply = TestUtils::send_command(&mut reader, &mut writer, command).await;
        assert_eq!(reply, expected);
    }
}

#[tokio::test]
async fn test_unknown_command_gets_no_reply() {
    let (address, _state, _handle) = TestUtils::start_master().await;
    let (mut reader, mut writer) = TestUtils::connect(address).await;

    writer
        .write_all(&TestUtils::invalid_command(&["UNKNOWN"]).encode())
        .await
        .unwrap();

    // The connection stays open and the next reply belongs to PING.
    let reply = TestUtils::send_command(&mut reader, &mut writer, TestUtils::ping_command()).await;
    assert_eq!(reply, RespValue::simple_string("PONG"));
    assert!(reader.buffered().is_empty());
}

#[tokio::test]
async fn test_invalid_arguments_get_null_reply() {
    let (address, _state, _handle) = TestUtils::start_master().await;
    let (mut reader, mut writer) = TestUtils::connect(address).await;

    let test_cases = vec![
        TestUtils::invalid_command(&["GET"]),
        TestUtils::invalid_command(&["SET", "grape", "mango", "px", "soon"]),
        RespValue::Array(vec![]),
        RespValue::Array(vec![RespValue::Array(vec![])]),
        RespValue::bulk_string("PING"),
    ];

    for command in test_cases {
        let reply = TestUtils::send_command(&mut reader, &mut writer, command).await;
        assert_eq!(reply, RespValue::NullBulkString);
    }

    let reply = TestUtils::send_command(&mut reader, &mut writer, TestUtils::ping_command()).await;
    assert_eq!(reply, RespValue::simple_string("PONG"));
}

#[tokio::test]
async fn test_pipelined_commands() {
    let (address, _state, _handle) = TestUtils::start_master().await;
    let (mut reader, mut writer) = TestUtils::connect(address).await;

    let mut pipeline = Vec::new();
    pipeline.extend_from_slice(&TestUtils::set_command("grape", "mango").encode());
    pipeline.extend_from_slice(&TestUtils::get_command("grape").encode());
    pipeline.extend_from_slice(&TestUtils::exists_command("grape").encode());
    pipeline.extend_from_slice(&TestUtils::ping_command().encode());
    writer.write_all(&pipeline).await.unwrap();

    let expected = vec![
        RespValue::simple_string("OK"),
        RespValue::bulk_string("mango"),
        RespValue::Integer(1),
        RespValue::simple_string("PONG"),
    ];

    for expected in expected {
        let frame = timeout(Duration::from_secs(2), reader.read_frame())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.value, expected);
    }
}

#[tokio::test]
async fn test_command_split_across_writes() {
    let (address, _state, _handle) = TestUtils::start_master().await;
    let (mut reader, mut writer) = TestUtils::connect(address).await;

    let command = TestUtils::echo_command("split across writes").encode();
    let (first, second) = command.split_at(7);

    writer.write_all(first).await.unwrap();
    writer.flush().await.unwrap();
    TestUtils::sleep_ms(50).await;
    writer.write_all(second).await.unwrap();

    let frame = timeout(Duration::from_secs(2), reader.read_frame())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.value, RespValue::bulk_string("split across writes"));
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    let (address, _state, _handle) = TestUtils::start_master().await;
    let (mut reader, mut writer) = TestUtils::connect(address).await;

    writer.write_all(b"*1\r\n$x\r\n").await.unwrap();

    let result = timeout(Duration::from_secs(2), reader.read_frame())
        .await
        .unwrap();
    assert!(matches!(result, Err(CommandReadError::ConnectionClosed)));
}

#[tokio::test]
async fn test_clients_share_one_keyspace() {
    let (address, _state, _handle) = TestUtils::start_master().await;
    let (mut reader, mut writer) = TestUtils::connect(address).await;
    let (mut other_reader, mut other_writer) = TestUtils::connect(address).await;

    TestUtils::send_command(
        &mut reader,
        &mut writer,
        TestUtils::set_command("grape", "mango"),
    )
    .await;

    let reply = TestUtils::send_command(
        &mut other_reader,
        &mut other_writer,
        TestUtils::get_command("grape"),
    )
    .await;
    assert_eq!(reply, RespValue::bulk_string("mango"));
}

#[tokio::test]
async fn test_deeply_nested_frame_closes_only_that_connection() {
    let (address, _state, _handle) = TestUtils::start_master().await;
    let (mut reader, mut writer) = TestUtils::connect(address).await;

    // The server may close before the whole payload is written.
    let _ = writer.write_all(&b"*1\r\n".repeat(100_000)).await;

    let result = timeout(Duration::from_secs(2), reader.read_frame())
        .await
        .unwrap();
    assert!(result.is_err());

    let (mut reader, mut writer) = TestUtils::connect(address).await;
    let reply = TestUtils::send_command(&mut reader, &mut writer, TestUtils::ping_command()).await;
    assert_eq!(reply, RespValue::simple_string("PONG"));
}

#[tokio::test]
async fn test_shutdown_completes_while_client_is_not_reading() {
    let (address, state, handle) = TestUtils::start_master().await;
    let (mut reader, mut writer) = TestUtils::connect(address).await;

    let value = "x".repeat(1 << 20);
    TestUtils::send_command(&mut reader, &mut writer, TestUtils::set_command("big", &value)).await;

    // Far more reply bytes than the socket buffers hold, none of them read.
    let mut pipeline = Vec::new();
    for _ in 0..64 {
        pipeline.extend_from_slice(&TestUtils::get_command("big").encode());
    }
    writer.write_all(&pipeline).await.unwrap();
    TestUtils::sleep_ms(200).await;

    state.shutdown().trigger();
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("server kept waiting on a client that is not reading")
        .unwrap();

    drop((reader, writer));
}
