//! End-to-end tests: SPOP in, HTTP out.

use std::time::Duration;

use bytes::Bytes;
use spoa_mirror::spop::{Message, TypedData};

mod common;

use common::{mirror_message, start_agent, start_shadow_backend, test_config, SpopClient};

#[tokio::test]
async fn post_is_mirrored_once() {
    let (shadow_addr, mut captured) = start_shadow_backend().await;
    let agent = start_agent(test_config(&format!("http://{}", shadow_addr))).await;

    let mut client = SpopClient::connect(agent.addr).await;
    client
        .notify(&[mirror_message(
            "POST",
            "/orders",
            "Content-Type: application/json\n",
            b"{\"a\":1}",
        )])
        .await;

    let request = tokio::time::timeout(Duration::from_secs(5), captured.recv())
        .await
        .expect("mirror request never arrived")
        .unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.uri, "/orders");
    assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
    assert_eq!(&request.body[..], b"{\"a\":1}");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(captured.try_recv().is_err(), "request mirrored more than once");

    agent.stop().await;
}

#[tokio::test]
async fn malformed_messages_are_not_mirrored() {
    let (shadow_addr, mut captured) = start_shadow_backend().await;
    let agent = start_agent(test_config(&format!("http://{}", shadow_addr))).await;
    let mut client = SpopClient::connect(agent.addr).await;

    // req.hdrs_bin instead of req.hdrs
    let binary_headers = Message::new("mirror")
        .with_arg("arg_method", TypedData::String("GET".into()))
        .with_arg("arg_path", TypedData::String("/binary".into()))
        .with_arg("arg_hdrs", TypedData::Binary(Bytes::from_static(b"\x04host")))
        .with_arg("arg_body", TypedData::Binary(Bytes::new()));
    let missing_body = Message::new("mirror")
        .with_arg("arg_method", TypedData::String("GET".into()))
        .with_arg("arg_path", TypedData::String("/missing".into()))
        .with_arg("arg_hdrs", TypedData::String(String::new()));
    let unrelated = Message::new("audit").with_arg("arg_path", TypedData::String("/audit".into()));

    client.notify(&[binary_headers]).await;
    client.notify(&[missing_body, unrelated]).await;
    client
        .notify(&[mirror_message("GET", "/valid?x=1", "X-Test: 1\nBad-Line\nY: 2\n", b"")])
        .await;

    let request = tokio::time::timeout(Duration::from_secs(5), captured.recv())
        .await
        .expect("valid request never arrived")
        .unwrap();
    assert_eq!(request.uri, "/valid?x=1");
    assert_eq!(request.headers.get("x-test").unwrap(), "1");
    assert_eq!(request.headers.get("y").unwrap(), "2");

    agent.stop().await;
    assert!(captured.try_recv().is_err());
}

#[tokio::test]
async fn unreachable_mirror_host_does_not_stall_acks() {
    // Nothing listens on port 9 on the loopback interface.
    let agent = start_agent(test_config("http://127.0.0.1:9")).await;
    let mut client = SpopClient::connect(agent.addr).await;

    for i in 0..5 {
        client
            .notify(&[mirror_message("GET", &format!("/{i}"), "", b"")])
            .await;
    }

    agent.stop().await;
}
