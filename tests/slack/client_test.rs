//! Web API calls against a local server.

use formrelay::slack::client::SlackClient;
use formrelay::slack::{ReplyPoster, SlackError};

use crate::server::{request_json, TestServer};

fn client(server: &TestServer) -> SlackClient {
    SlackClient::with_api_base(
        "xoxb-bot-token".to_owned(),
        "xapp-app-token".to_owned(),
        &server.url,
    )
}

#[tokio::test]
async fn auth_test_returns_identity() {
    let server = TestServer::start(vec![(
        "200 OK",
        r#"{"ok":true,"user_id":"UBOT","bot_id":"BBOT","team":"Acme"}"#.to_owned(),
    )])
    .await;

    let identity = match client(&server).auth_test().await {
        Ok(identity) => identity,
        Err(err) => panic!("auth.test should succeed: {err}"),
    };
    assert_eq!(identity.user_id.as_deref(), Some("UBOT"));
    assert_eq!(identity.bot_id.as_deref(), Some("BBOT"));

    let request = &server.requests()[0];
    assert!(request.starts_with("POST /auth.test "));
    assert!(request.to_lowercase().contains("authorization: bearer xoxb-bot-token"));
}

#[tokio::test]
async fn reply_is_posted_in_thread() {
    let server = TestServer::start(vec![("200 OK", r#"{"ok":true,"ts":"2.000"}"#.to_owned())]).await;

    let result = client(&server)
        .post_reply("C01IDEA", "1.000", "Jira Issue Key: SER-42")
        .await;
    assert!(result.is_ok(), "reply failed: {result:?}");

    let request = &server.requests()[0];
    assert!(request.starts_with("POST /chat.postMessage "));
    let body = request_json(request);
    assert_eq!(body["channel"], "C01IDEA");
    assert_eq!(body["thread_ts"], "1.000");
    assert_eq!(body["text"], "Jira Issue Key: SER-42");
}

#[tokio::test]
async fn api_error_is_surfaced() {
    let server = TestServer::start(vec![(
        "200 OK",
        r#"{"ok":false,"error":"channel_not_found"}"#.to_owned(),
    )])
    .await;

    let result = client(&server).post_reply("C404", "1.000", "hi").await;
    match result {
        Err(SlackError::Api { method, error }) => {
            assert_eq!(method, "chat.postMessage");
            assert_eq!(error, "channel_not_found");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn socket_url_must_be_secure() {
    let server = TestServer::start(vec![(
        "200 OK",
        r#"{"ok":true,"url":"ws://wss-primary.slack.com/link"}"#.to_owned(),
    )])
    .await;

    let result = client(&server).open_connection().await;
    assert!(matches!(result, Err(SlackError::Frame(_))));
    assert!(server.requests()[0]
        .to_lowercase()
        .contains("authorization: bearer xapp-app-token"));
}

#[test]
fn debug_output_redacts_tokens() {
    let slack = SlackClient::new("xoxb-bot-token".to_owned(), "xapp-app-token".to_owned());
    let debug = format!("{slack:?}");
    assert!(!debug.contains("xoxb-bot-token"));
    assert!(!debug.contains("xapp-app-token"));
}
