use std::time::Duration;

use anyhow::Context as _;
use botload_http::{HttpClient, HttpRequest, HttpTransportErrorKind};
use botload_testserver::{Behavior, TestServer};
use bytes::Bytes;

fn send_message_body(text: &str) -> Bytes {
    Bytes::from(format!(r#"{{"chat_id":"42","text":"{text}"}}"#))
}

#[tokio::test]
async fn post_json_reaches_the_bot_api() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let client = HttpClient::default();

    let url = format!("{}/sendMessage", server.bot_url());
    let res = client
        .request(HttpRequest::post_json(&url, send_message_body("hi #1")))
        .await
        .context("send")?;

    assert_eq!(res.status, 200);
    assert!(res.is_success());
    assert!(res.body_utf8().is_some_and(|b| b.contains(r#""ok":true"#)));
    assert_eq!(server.stats().messages_total(), 1);
    assert_eq!(server.stats().saw_json_content_type(), 1);
    assert_eq!(server.stats().texts(), vec!["hi #1".to_string()]);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn non_2xx_responses_are_returned_not_raised() -> anyhow::Result<()> {
    let server = TestServer::start_with(Behavior::always_status(503))
        .await
        .context("start test server")?;
    let client = HttpClient::default();

    let url = format!("{}/sendMessage", server.bot_url());
    let res = client
        .request(HttpRequest::post_json(&url, send_message_body("x")))
        .await
        .context("send")?;

    assert_eq!(res.status, 503);
    assert!(!res.is_success());
    assert!(res.body_lossy().contains("injected failure"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn request_timeout_covers_slow_responses() -> anyhow::Result<()> {
    let server = TestServer::start_with(Behavior::with_latency(Duration::from_millis(500)))
        .await
        .context("start test server")?;
    let client = HttpClient::default();

    let url = format!("{}/sendMessage", server.bot_url());
    let req = HttpRequest::post_json(&url, send_message_body("slow"))
        .with_timeout(Some(Duration::from_millis(50)));

    let err = match client.request(req).await {
        Ok(res) => anyhow::bail!("expected timeout, got status {}", res.status),
        Err(err) => err,
    };
    assert_eq!(err.transport_error_kind(), HttpTransportErrorKind::Timeout);

    server.shutdown().await;
    Ok(())
}
