// src/proxy/backend.rs
use hyper::http::uri::{InvalidUri, PathAndQuery};
use hyper::Uri;
use url::Url;

/// One upstream server eligible to receive forwarded requests.
#[derive(Debug, Clone)]
pub struct Backend {
    /// `host:port`, used as the metrics label.
    pub id: String,
    pub url: Url,
    uri: Uri,
}

impl Backend {
    pub fn new(url: Url) -> Result<Self, InvalidUri> {
        let id = format!(
            "{}:{}",
            url.host_str().unwrap_or("unknown"),
            url.port_or_known_default().unwrap_or(80)
        );
        let uri = url.as_str().parse::<Uri>()?;

        Ok(Self { id, url, uri })
    }

    /// The backend address as it appears in logs.
    pub fn address(&self) -> &str {
        self.url.as_str()
    }

    /// The configured URL, requested as-is in `get` mode.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The configured URL with an inbound path and query appended to its path.
    pub fn target(&self, path_and_query: Option<&PathAndQuery>) -> Result<Uri, InvalidUri> {
        let Some(pq) = path_and_query else {
            return Ok(self.uri.clone());
        };

        let mut url = self.url.clone();
        let base = url.path().trim_end_matches('/');
        let joined = format!("{}{}", base, pq.path());
        url.set_path(&joined);
        url.set_query(pq.query());

        url.as_str().parse()
    }
}
