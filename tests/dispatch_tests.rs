//! End-to-end dispatch over real sockets: mockito backends for servers that
//! answer, dropping listeners and closed ports for servers that don't.

mod common;

use argus::config::ForwardMode;
use argus::proxy::{OutcomeKind, EXHAUSTED_BODY};
use common::{closed_port_url, read, DroppingBackend, TestProxy};
use hyper::{Body, Client, Request};
use mockito::Matcher;

#[tokio::test]
async fn first_backend_success_is_relayed_after_one_attempt() {
    let mut a = mockito::Server::new_async().await;
    let mut b = mockito::Server::new_async().await;
    let hit = a
        .mock("GET", "/")
        .with_status(200)
        .with_body("hello")
        .expect(1)
        .create_async()
        .await;
    let untouched = b.mock("GET", "/").expect(0).create_async().await;

    let mut proxy = TestProxy::start(&[a.url(), b.url()], ForwardMode::Get).await;
    assert_eq!(proxy.get("/any/path").await, (200, "hello".to_string()));

    let outcome = proxy.next_outcome().await;
    assert_eq!(outcome.kind, OutcomeKind::Relayed);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.status.as_u16(), 200);
    assert_eq!(outcome.url.path(), "/any/path");

    hit.assert_async().await;
    untouched.assert_async().await;
}

#[tokio::test]
async fn failed_backend_is_skipped_and_later_backend_never_contacted() {
    let a = DroppingBackend::start().await;
    let mut b = mockito::Server::new_async().await;
    let c = DroppingBackend::start().await;
    let ok = b
        .mock("GET", "/")
        .with_status(200)
        .with_body("ok")
        .expect(1)
        .create_async()
        .await;

    let mut proxy =
        TestProxy::start(&[a.url.clone(), b.url(), c.url.clone()], ForwardMode::Get).await;
    assert_eq!(proxy.get("/").await, (200, "ok".to_string()));

    let outcome = proxy.next_outcome().await;
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.backend, format!("{}/", b.url()));
    assert_eq!(outcome.backend_id, b.host_with_port());

    assert_eq!(a.connections(), 1);
    assert_eq!(c.connections(), 0);
    ok.assert_async().await;
}

#[tokio::test]
async fn backend_error_status_is_relayed_not_retried() {
    let mut a = mockito::Server::new_async().await;
    let mut b = mockito::Server::new_async().await;
    let missing = a
        .mock("GET", "/")
        .with_status(404)
        .with_body("missing")
        .expect(1)
        .create_async()
        .await;
    let untouched = b.mock("GET", "/").expect(0).create_async().await;

    let mut proxy = TestProxy::start(&[a.url(), b.url()], ForwardMode::Get).await;
    assert_eq!(proxy.get("/").await, (404, "missing".to_string()));
    assert_eq!(proxy.next_outcome().await.attempts, 1);

    missing.assert_async().await;
    untouched.assert_async().await;
}

#[tokio::test]
async fn all_backends_down_yields_503_after_one_attempt_each() {
    let backends = vec![
        DroppingBackend::start().await,
        DroppingBackend::start().await,
        DroppingBackend::start().await,
    ];
    let urls: Vec<String> = backends.iter().map(|b| b.url.clone()).collect();

    let mut proxy = TestProxy::start(&urls, ForwardMode::Get).await;
    assert_eq!(proxy.get("/").await, (503, EXHAUSTED_BODY.to_string()));

    let outcome = proxy.next_outcome().await;
    assert_eq!(outcome.kind, OutcomeKind::Exhausted);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.status.as_u16(), 503);
    assert_eq!(outcome.backend, format!("{}/", urls[2]));

    for backend in &backends {
        assert_eq!(backend.connections(), 1);
    }
}

#[tokio::test]
async fn single_unreachable_backend_fails_after_one_attempt() {
    let mut proxy = TestProxy::start(&[closed_port_url()], ForwardMode::Get).await;
    assert_eq!(proxy.get("/").await.0, 503);

    let outcome = proxy.next_outcome().await;
    assert_eq!(outcome.kind, OutcomeKind::Exhausted);
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn successive_requests_rotate_through_backends() {
    let mut a = mockito::Server::new_async().await;
    let mut b = mockito::Server::new_async().await;
    let on_a = a.mock("GET", "/").with_body("a").expect(2).create_async().await;
    let on_b = b.mock("GET", "/").with_body("b").expect(2).create_async().await;

    let proxy = TestProxy::start(&[a.url(), b.url()], ForwardMode::Get).await;
    let mut bodies = Vec::new();
    for _ in 0..4 {
        bodies.push(proxy.get("/").await.1);
    }
    assert_eq!(bodies, vec!["a", "b", "a", "b"]);

    on_a.assert_async().await;
    on_b.assert_async().await;
}

#[tokio::test]
async fn passthrough_mode_forwards_method_path_headers_and_body() {
    let down = DroppingBackend::start().await;
    let mut up = mockito::Server::new_async().await;
    let created = up
        .mock("POST", "/orders")
        .match_query(Matcher::UrlEncoded("id".into(), "3".into()))
        .match_header("x-trace", "abc")
        .match_body("payload")
        .with_status(201)
        .with_body("created")
        .expect(1)
        .create_async()
        .await;

    let mut proxy =
        TestProxy::start(&[down.url.clone(), up.url()], ForwardMode::Passthrough).await;

    let request = Request::post(proxy.url("/orders?id=3"))
        .header("x-trace", "abc")
        .body(Body::from("payload"))
        .unwrap();
    let response = Client::new().request(request).await.unwrap();
    assert_eq!(read(response).await, (201, "created".to_string()));

    // The body survived the failed first attempt.
    assert_eq!(proxy.next_outcome().await.attempts, 2);
    assert_eq!(down.connections(), 1);
    created.assert_async().await;
}
