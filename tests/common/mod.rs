//! Shared fixtures: a running proxy, backends that fail at the transport
//! level, and a sink that hands outcomes back to the test.

#![allow(dead_code)]

use argus::config::ForwardMode;
use argus::load_balancer::BackendRegistry;
use argus::proxy::{Backend, Dispatcher, HyperForwarder, OutcomeSink, Proxy, RequestOutcome};
use argus::server::{RequestHandler, ServerBuilder};
use hyper::{Body, Client, Response};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use url::Url;

pub struct ChannelSink(mpsc::UnboundedSender<RequestOutcome>);

impl OutcomeSink for ChannelSink {
    fn record(&self, outcome: RequestOutcome) {
        let _ = self.0.send(outcome);
    }
}

/// A backend that accepts connections and closes them without answering.
pub struct DroppingBackend {
    pub url: String,
    accepted: Arc<AtomicUsize>,
}

impl DroppingBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        Self {
            url: format!("http://{addr}"),
            accepted,
        }
    }

    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// URL of a port nothing listens on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    format!("http://127.0.0.1:{port}")
}

pub struct TestProxy {
    pub addr: SocketAddr,
    pub outcomes: mpsc::UnboundedReceiver<RequestOutcome>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestProxy {
    /// Starts a proxy whose first request goes to `urls[0]`.
    pub async fn start(urls: &[String], mode: ForwardMode) -> Self {
        let backends: Vec<Backend> = urls
            .iter()
            .map(|u| Backend::new(Url::parse(u).unwrap()).unwrap())
            .collect();
        let start = backends.len() as u64 - 1;
        let registry = Arc::new(BackendRegistry::with_cursor(backends, start).unwrap());

        let (tx, outcomes) = mpsc::unbounded_channel();
        let proxy = Proxy::new(
            Dispatcher::new(registry, HyperForwarder::new(Some(Duration::from_secs(5)))),
            mode,
            Arc::new(ChannelSink(tx)),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, signal) = oneshot::channel::<()>();

        tokio::spawn(async move {
            ServerBuilder::new(addr.to_string())
                .with_listener(listener)
                .with_handler(RequestHandler::new(Arc::new(proxy)))
                .serve_with_shutdown(async move {
                    let _ = signal.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            outcomes,
            shutdown: Some(shutdown),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> (u16, String) {
        let response = Client::new().get(self.url(path).parse().unwrap()).await.unwrap();
        read(response).await
    }

    pub async fn next_outcome(&mut self) -> RequestOutcome {
        tokio::time::timeout(Duration::from_secs(5), self.outcomes.recv())
            .await
            .expect("no outcome recorded")
            .unwrap()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn read(response: Response<Body>) -> (u16, String) {
    let status = response.status().as_u16();
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}
