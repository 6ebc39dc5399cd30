#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end calls through `RestClient` against a mock server.

use std::thread::{self, ThreadId};
use std::time::Duration;

use courier::{
    AuthMode, Body, CallbackContext, ErrorKind, HeaderEntry, Outcome, ResponseStrategy, Response,
    RestClient, RestClientBuilder, RestClientConfig, ResultCallback,
};
use httpmock::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;

fn config_for(server: &MockServer) -> RestClientConfig {
    RestClientConfig {
        allow_insecure_http: true,
        request_timeout: Duration::from_secs(5),
        headers: vec![HeaderEntry {
            name: "X-App".into(),
            value: "demo".into(),
        }],
        site: Some(server.base_url()),
        ..RestClientConfig::default()
    }
}

fn client(config: RestClientConfig, context: &CallbackContext) -> RestClient {
    RestClientBuilder::with_config(config)
        .context(context.handle())
        .build()
        .unwrap()
}

#[tokio::test]
async fn oauth2_call_carries_bearer_token() {
    let server = MockServer::start();
    let token = server.mock(|when, then| {
        when.method(POST)
            .path("/oauth/token")
            .header("x-app", "demo")
            .body("grant_type=client_credentials");
        then.status(200)
            .json_body(json!({"access_token": "abc", "token_type": "bearer"}));
    });
    let profile = server.mock(|when, then| {
        when.method(GET)
            .path("/profile")
            .header("authorization", "Bearer abc")
            .header("accept", "application/json")
            .header("os", "rust")
            .header("x-app", "demo");
        then.status(200).json_body(json!({"name": "Ada"}));
    });

    let mut context = CallbackContext::new();
    let client = client(
        RestClientConfig {
            auth_mode: AuthMode::OAuth2,
            client_id: "mobile".into(),
            client_secret: "s3cret".into(),
            ..config_for(&server)
        },
        &context,
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client.get(format!("{}/profile", server.base_url())).send(tx);
    context.run_until(handle.join()).await;

    match rx.try_recv().unwrap() {
        Outcome::Success(response) => {
            assert_eq!(response.body(), &Body::Json(json!({"name": "Ada"})));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    token.assert();
    profile.assert();
    assert!(client.auth_model().headers().get("Authorization").is_none());
}

#[tokio::test]
async fn rejected_token_request_never_reaches_the_api() {
    let server = MockServer::start();
    let _token = server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(401).json_body(json!({"error": "invalid_client"}));
    });
    let api = server.mock(|when, then| {
        when.path("/orders");
        then.status(200);
    });

    let mut context = CallbackContext::new();
    let client = client(
        RestClientConfig {
            auth_mode: AuthMode::OAuth2,
            client_id: "mobile".into(),
            client_secret: "wrong".into(),
            ..config_for(&server)
        },
        &context,
    );

    let url = format!("{}/orders", server.base_url());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client.post(url.clone()).send(tx);
    context.run_until(handle.join()).await;

    match rx.try_recv().unwrap() {
        Outcome::Failure { url: failed, kind } => {
            assert_eq!(failed, url);
            assert_eq!(kind, ErrorKind::AuthorizationException);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    api.assert_hits(0);
}

#[tokio::test]
async fn basic_call_sends_authorization_and_keeps_error_status() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/notes/7")
            .header("authorization", "Basic dXNlcjpwYXNz")
            .header("content-type", "application/text")
            .body("hello");
        then.status(500).body("boom");
    });

    let mut context = CallbackContext::new();
    let client = client(
        RestClientConfig {
            auth_mode: AuthMode::Basic,
            username: Some("user".into()),
            password: Some("pass".into()),
            ..config_for(&server)
        },
        &context,
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client
        .put(format!("{}/notes/7", server.base_url()))
        .params(courier::RequestParams::Text("hello".into()))
        .strategy(ResponseStrategy::Text)
        .send(tx);
    context.run_until(handle.join()).await;

    match rx.try_recv().unwrap() {
        Outcome::Success(response) => {
            assert_eq!(response.status().as_u16(), 500);
            assert!(!response.is_success());
            assert_eq!(response.body(), &Body::Text("boom".into()));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    mock.assert();
}

#[tokio::test]
async fn file_strategy_streams_into_destination() {
    let server = MockServer::start();
    let _m = server.mock(|when, then| {
        when.method(GET)
            .path("/report.csv")
            .header("accept", "application/octet-stream");
        then.status(200).body("a,b\n1,2\n");
    });

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("report.csv");

    let mut context = CallbackContext::new();
    let client = client(config_for(&server), &context);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client
        .get(format!("{}/report.csv", server.base_url()))
        .strategy(ResponseStrategy::File {
            destination: Some(destination.clone()),
        })
        .send(tx);
    context.run_until(handle.join()).await;

    assert!(matches!(
        rx.try_recv().unwrap(),
        Outcome::Success(ref r) if r.body() == &Body::File(destination.clone())
    ));
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "a,b\n1,2\n");
}

#[tokio::test]
async fn cancel_by_tag_reports_connection_error() {
    let server = MockServer::start();
    let _m = server.mock(|when, then| {
        when.method(GET).path("/slow");
        then.status(200).delay(Duration::from_secs(5));
    });

    let mut context = CallbackContext::new();
    let client = client(config_for(&server), &context);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client
        .get(format!("{}/slow", server.base_url()))
        .tag("screen-1")
        .send(tx);

    // The tag is registered once the request reaches the transport
    let mut cancelled = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if client.cancel_call_with_tag("screen-1") {
            cancelled = true;
            break;
        }
    }
    assert!(cancelled);
    context.run_until(handle.join()).await;

    assert_eq!(
        rx.try_recv().unwrap().failure_kind(),
        Some(ErrorKind::ServerConnectionError)
    );
    assert!(!client.cancel_call_with_tag("screen-1"));
}

#[tokio::test]
async fn cancel_by_tag_during_token_exchange_skips_the_api() {
    let server = MockServer::start();
    let _token = server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200)
            .json_body(json!({"access_token": "abc", "token_type": "bearer"}))
            .delay(Duration::from_secs(5));
    });
    let api = server.mock(|when, then| {
        when.path("/cart");
        then.status(200);
    });

    let mut context = CallbackContext::new();
    let client = client(
        RestClientConfig {
            auth_mode: AuthMode::OAuth2,
            client_id: "mobile".into(),
            client_secret: "s3cret".into(),
            ..config_for(&server)
        },
        &context,
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client
        .get(format!("{}/cart", server.base_url()))
        .tag("checkout")
        .send(tx);

    let mut cancelled = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if client.cancel_call_with_tag("checkout") {
            cancelled = true;
            break;
        }
    }
    assert!(cancelled);
    context.run_until(handle.join()).await;

    assert_eq!(
        rx.try_recv().unwrap().failure_kind(),
        Some(ErrorKind::AuthorizationException)
    );
    assert!(rx.try_recv().is_err());
    api.assert_hits(0);
}

#[tokio::test]
async fn unreachable_server_reports_connection_error() {
    let mut context = CallbackContext::new();
    let client = RestClient::builder()
        .context(context.handle())
        .allow_insecure_http()
        .connect_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    // Port 1 is reserved and nothing listens there
    let handle = client.get("http://127.0.0.1:1/").send(tx);
    context.run_until(handle.join()).await;

    assert_eq!(
        rx.try_recv().unwrap().failure_kind(),
        Some(ErrorKind::ServerConnectionError)
    );
}

struct ThreadProbe(std::sync::mpsc::Sender<ThreadId>);

impl ResultCallback for ThreadProbe {
    fn on_success(&mut self, _response: Response) {
        self.0.send(thread::current().id()).unwrap();
    }

    fn on_failure(&mut self, _url: &str, _kind: ErrorKind) {
        self.0.send(thread::current().id()).unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn callbacks_run_on_the_context_thread() {
    let server = MockServer::start();
    let _m = server.mock(|when, then| {
        when.method(GET).path("/ping");
        then.status(204);
    });

    let mut context = CallbackContext::new();
    let client = client(config_for(&server), &context);
    let (tx, rx) = std::sync::mpsc::channel();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            client
                .get(format!("{}/ping", server.base_url()))
                .strategy(ResponseStrategy::Text)
                .send(ThreadProbe(tx.clone()))
        })
        .collect();
    for handle in handles {
        context.run_until(handle.join()).await;
    }

    let owner = thread::current().id();
    let observed: Vec<ThreadId> = rx.try_iter().collect();
    assert_eq!(observed.len(), 4);
    assert!(observed.iter().all(|id| *id == owner));
}
