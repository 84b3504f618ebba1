// src/proxy/mod.rs
mod backend;
mod dispatcher;
mod forward;
mod headers;
mod outcome;
mod proxy;
pub mod relay;

pub use backend::Backend;
pub use dispatcher::{AfterFailure, DispatchAttempt, DispatchOutcome, Dispatcher};
pub use forward::{CaptureError, ForwardError, Forwarder, HyperForwarder, OutboundRequest};
pub use outcome::{OutcomeKind, OutcomeSink, RequestOutcome, NO_BACKEND};
pub use proxy::{Proxy, ProxyError, EXHAUSTED_BODY};
