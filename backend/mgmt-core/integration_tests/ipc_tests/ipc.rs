use crate::ipc_tests::helpers::{
    TEST_CAPACITY, connect_raw, current_policy, foreign_gid_policy, foreign_policy,
    read_to_close, start_test_server,
};

use mgmt_core::codec::REQUEST_HEADER_SIZE;
use mgmt_core::error::transport::TransportError;
use mgmt_core::ipc::client::send_request;
use mgmt_core::{Mode, Op, Request};

use std::time::Duration;

use tokio::io::AsyncWriteExt;

const ENOENT: i32 = 2;
const EINVAL: i32 = 22;

const TIMEOUT: Duration = Duration::from_secs(5);

fn create_target(target_id: i32) -> Request {
    Request::new("iscsi", Mode::Target, Op::New).with_target(target_id)
}

fn list_targets() -> Request {
    Request::new("iscsi", Mode::Target, Op::Show).with_target(-1)
}

/// **VALUE**: A permitted client can create a target over the socket.
///
/// **WHY THIS MATTERS**: This is the full path: peer check, framing, actor dispatch,
/// envelope, and the single write back.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The server answers mutating requests with a payload
/// - The header length doesn't match the bytes sent
/// - The connection isn't closed after one request
#[tokio::test]
async fn given_permitted_client_when_creating_target_then_success_header_only() {
    // GIVEN: A server that accepts our own credentials
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");

    // WHEN: Creating target 1
    let response = send_request(handle.socket_name(), &create_target(1))
        .await
        .expect("Request failed");

    // THEN: Success, 8 byte response, no payload
    assert_eq!(response.error_code, 0);
    assert_eq!(response.total_length, 8);
    assert!(response.payload.is_empty());
}

#[tokio::test]
async fn given_created_target_when_listing_then_payload_describes_it() {
    // GIVEN: Target 1 exists
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");
    send_request(handle.socket_name(), &create_target(1))
        .await
        .expect("Create failed");

    // WHEN: Listing all targets
    let response = send_request(handle.socket_name(), &list_targets())
        .await
        .expect("List failed");

    // THEN: The listing names target 1, and the length covers the payload
    let listing = String::from_utf8(response.payload.clone()).expect("UTF-8 listing");
    assert_eq!(response.error_code, 0);
    assert!(listing.contains("Target 1:"), "listing was {listing:?}");
    assert_eq!(response.total_length as usize, 8 + response.payload.len());
}

#[tokio::test]
async fn given_created_target_when_setting_state_then_listing_shows_new_state() {
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");
    send_request(handle.socket_name(), &create_target(1))
        .await
        .expect("Create failed");

    let update = Request::new("iscsi", Mode::Target, Op::Update)
        .with_target(1)
        .with_payload(b"state\0offline\0".to_vec());
    let response = send_request(handle.socket_name(), &update)
        .await
        .expect("Update failed");

    assert_eq!(response.error_code, 0);
    assert!(response.payload.is_empty());

    let listing = send_request(handle.socket_name(), &list_targets())
        .await
        .expect("List failed");
    let listing = String::from_utf8(listing.payload).expect("UTF-8 listing");
    assert!(listing.contains("state offline"), "listing was {listing:?}");
}

#[tokio::test]
async fn given_bad_state_word_when_updating_then_negative_einval() {
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");
    send_request(handle.socket_name(), &create_target(1))
        .await
        .expect("Create failed");

    let update = Request::new("iscsi", Mode::Target, Op::Update)
        .with_target(1)
        .with_payload(b"state\0dreaming".to_vec());
    let response = send_request(handle.socket_name(), &update)
        .await
        .expect("Update failed");

    assert_eq!(response.error_code, -EINVAL);
    assert_eq!(response.total_length, 8);
}

/// **VALUE**: A request naming no registered driver is answered with positive ENOENT.
///
/// **BUG THIS CATCHES**: Would catch the sign being flipped to match other mutating
/// errors, which existing clients rely on not happening.
#[tokio::test]
async fn given_unknown_driver_when_requesting_then_positive_enoent() {
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");

    let request = Request::new("foo", Mode::Target, Op::New).with_target(1);
    let response = send_request(handle.socket_name(), &request)
        .await
        .expect("Request failed");

    assert_eq!(response.error_code, ENOENT);
    assert_eq!(response.total_length, 8);
}

/// **VALUE**: A peer that doesn't match the credential policy gets nothing back.
///
/// **WHY THIS MATTERS**: Any local process can connect to an abstract socket. The
/// credential check is the only thing standing between them and the target registry.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The request is processed before the check
/// - An error response leaks to the unauthorised peer
/// - The rejection kills the accept loop
#[tokio::test]
async fn given_foreign_peer_when_requesting_then_closed_without_response() {
    // GIVEN: A server that only accepts credentials we don't have
    let handle = start_test_server(foreign_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");

    // WHEN: Sending a valid request
    let mut stream = connect_raw(handle.socket_name());
    let bytes = create_target(1).encode().expect("Encode failed");
    let _ = stream.write_all(&bytes).await;

    // THEN: Zero response bytes, then close; the server is still running
    assert!(read_to_close(&mut stream).await.is_empty());
    assert!(handle.is_running());
}

#[tokio::test]
async fn given_peer_with_foreign_gid_when_requesting_then_closed_without_response() {
    // GIVEN: A server that wants our uid but another gid
    let handle = start_test_server(foreign_gid_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");

    // WHEN: Sending a valid request
    let mut stream = connect_raw(handle.socket_name());
    let bytes = create_target(1).encode().expect("Encode failed");
    let _ = stream.write_all(&bytes).await;

    // THEN: Nothing comes back and the server keeps running
    assert!(read_to_close(&mut stream).await.is_empty());
    assert!(handle.is_running());
}

/// **VALUE**: A driver name that isn't UTF-8 is answered, not hung up on.
///
/// **BUG THIS CATCHES**: Would catch the server treating an undecodable name as a
/// framing failure and closing without the ENOENT envelope.
#[tokio::test]
async fn given_non_utf8_driver_name_when_sent_then_positive_enoent_envelope() {
    // GIVEN: A running server and a request whose name bytes are 0xff 0xfe
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");
    let mut bytes = Request::new("ab", Mode::Target, Op::Show)
        .with_target(-1)
        .encode()
        .expect("Encode failed");
    bytes[4] = 0xff;
    bytes[5] = 0xfe;

    // WHEN: Sending it raw
    let mut stream = connect_raw(handle.socket_name());
    stream.write_all(&bytes).await.expect("Write failed");

    // THEN: An 8-byte envelope with +ENOENT, then close
    let received = read_to_close(&mut stream).await;
    assert_eq!(received.len(), 8);
    assert_eq!(&received[0..4], &ENOENT.to_le_bytes());
    assert_eq!(&received[4..8], &8u32.to_le_bytes());
}

#[tokio::test]
async fn given_foreign_peer_when_using_client_then_connection_closed_error() {
    let handle = start_test_server(foreign_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");

    let result = send_request(handle.socket_name(), &list_targets()).await;

    assert!(
        matches!(result, Err(TransportError::ConnectionClosed { .. })),
        "got {result:?}"
    );
}

/// **VALUE**: An oversized declared length closes only that connection.
///
/// **BUG THIS CATCHES**: Would catch a server that allocates the declared size, waits for
/// a megabyte that never comes, or stops serving after the bad request.
#[tokio::test]
async fn given_oversized_declared_length_when_sent_then_closed_and_server_keeps_serving() {
    // GIVEN: A running server
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");

    // WHEN: Sending a header that declares 1,000,000 bytes
    let mut header = create_target(1).encode().expect("Encode failed");
    header[0..4].copy_from_slice(&1_000_000u32.to_le_bytes());
    let mut stream = connect_raw(handle.socket_name());
    stream.write_all(&header).await.expect("Write failed");

    // THEN: The connection closes with no response
    assert!(read_to_close(&mut stream).await.is_empty());

    // THEN: The next well-formed request is still served
    let response = send_request(handle.socket_name(), &create_target(2))
        .await
        .expect("Request after oversized message failed");
    assert_eq!(response.error_code, 0);
}

#[tokio::test]
async fn given_truncated_request_when_peer_closes_then_server_keeps_serving() {
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");

    let bytes = create_target(1).encode().expect("Encode failed");
    let mut stream = connect_raw(handle.socket_name());
    stream
        .write_all(&bytes[..REQUEST_HEADER_SIZE / 2])
        .await
        .expect("Write failed");
    stream.shutdown().await.expect("Shutdown failed");
    assert!(read_to_close(&mut stream).await.is_empty());

    let response = send_request(handle.socket_name(), &create_target(1))
        .await
        .expect("Request after truncated message failed");
    assert_eq!(response.error_code, 0, "truncated create must not have applied");
}

/// **VALUE**: A client that connects and stays silent doesn't hold up anyone else.
///
/// **WHY THIS MATTERS**: Each connection is read under its own deadline in its own task;
/// a stalled peer must not block the accept loop or the controller.
#[tokio::test]
async fn given_silent_peer_when_other_client_requests_then_served_and_silent_peer_dropped() {
    // GIVEN: A server with a short request deadline and a connected, silent peer
    let handle = start_test_server(current_policy(), Duration::from_millis(200))
        .await
        .expect("Failed to start server");
    let mut silent = connect_raw(handle.socket_name());

    // WHEN: Another client sends a request
    let response = send_request(handle.socket_name(), &create_target(1))
        .await
        .expect("Request alongside silent peer failed");

    // THEN: It is served, and the silent peer is closed after the deadline
    assert_eq!(response.error_code, 0);
    assert!(read_to_close(&mut silent).await.is_empty());
}

#[tokio::test]
async fn given_many_sequential_requests_when_sent_then_each_answered_in_order() {
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");

    for target_id in 0..10 {
        let response = send_request(handle.socket_name(), &create_target(target_id))
            .await
            .expect("Create failed");
        assert_eq!(response.error_code, 0, "target {target_id}");
    }

    let duplicate = send_request(handle.socket_name(), &create_target(3))
        .await
        .expect("Duplicate create failed");
    assert_eq!(duplicate.error_code, -17);

    let listing = send_request(handle.socket_name(), &list_targets())
        .await
        .expect("List failed");
    let listing = String::from_utf8(listing.payload).expect("UTF-8 listing");
    assert_eq!(listing.matches("Target ").count(), 10);
}

#[tokio::test]
async fn given_concurrent_clients_when_creating_distinct_targets_then_all_succeed() {
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");

    let mut tasks = Vec::new();
    for target_id in 0..8 {
        let socket_name = handle.socket_name().to_string();
        tasks.push(tokio::spawn(async move {
            send_request(&socket_name, &create_target(target_id)).await
        }));
    }

    for task in tasks {
        let response = task.await.expect("Task panicked").expect("Create failed");
        assert_eq!(response.error_code, 0);
    }
}

#[tokio::test]
async fn given_show_larger_than_capacity_when_listing_then_payload_truncated_to_capacity() {
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");
    for target_id in 0..200 {
        send_request(handle.socket_name(), &create_target(target_id))
            .await
            .expect("Create failed");
    }

    let response = send_request(handle.socket_name(), &list_targets())
        .await
        .expect("List failed");

    assert_eq!(response.error_code, 0);
    assert_eq!(response.total_length as usize, TEST_CAPACITY);
}

#[tokio::test]
async fn given_running_server_when_handle_dropped_then_stops_answering() {
    let handle = start_test_server(current_policy(), TIMEOUT)
        .await
        .expect("Failed to start server");
    let socket_name = handle.socket_name().to_string();
    drop(handle);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = send_request(&socket_name, &list_targets()).await;

    assert!(result.is_err(), "server still answering after drop");
}
