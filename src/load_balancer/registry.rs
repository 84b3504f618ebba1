// src/load_balancer/registry.rs
use crate::config::BackendConfig;
use crate::load_balancer::RotationCursor;
use crate::proxy::Backend;
use hyper::http::uri::InvalidUri;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("backend registry needs at least one backend")]
    Empty,

    #[error("backend {url} is not a valid request target")]
    InvalidBackend {
        url: String,
        #[source]
        source: InvalidUri,
    },
}

/// The fixed, ordered backend list plus the rotation cursor shared by every
/// in-flight request.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: Vec<Arc<Backend>>,
    cursor: RotationCursor,
}

impl BackendRegistry {
    pub fn new(backends: Vec<Backend>) -> Result<Self, RegistryError> {
        Self::with_cursor(backends, 0)
    }

    /// Like [`new`](Self::new) with the cursor preset, so the first
    /// [`next`](Self::next) returns `(start + 1) % size`.
    pub fn with_cursor(backends: Vec<Backend>, start: u64) -> Result<Self, RegistryError> {
        if backends.is_empty() {
            return Err(RegistryError::Empty);
        }

        Ok(Self {
            backends: backends.into_iter().map(Arc::new).collect(),
            cursor: RotationCursor::starting_at(start),
        })
    }

    pub fn from_config(configs: &[BackendConfig]) -> Result<Self, RegistryError> {
        let backends = configs
            .iter()
            .map(|c| {
                Backend::new(c.url.clone()).map_err(|source| RegistryError::InvalidBackend {
                    url: c.url.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(backends)
    }

    pub fn size(&self) -> usize {
        self.backends.len()
    }

    /// Index of the backend to try next.
    pub fn next(&self) -> usize {
        (self.cursor.advance() % self.backends.len() as u64) as usize
    }

    pub fn backend(&self, index: usize) -> &Arc<Backend> {
        &self.backends[index]
    }

    pub fn address(&self, index: usize) -> &str {
        self.backends[index].address()
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn registry(n: usize, start: u64) -> BackendRegistry {
        let backends = (0..n)
            .map(|i| Backend::new(Url::parse(&format!("http://10.0.0.{}:80", i + 1)).unwrap()).unwrap())
            .collect();
        BackendRegistry::with_cursor(backends, start).unwrap()
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert!(matches!(
            BackendRegistry::new(Vec::new()),
            Err(RegistryError::Empty)
        ));
    }

    #[test]
    fn fresh_registry_starts_at_index_one() {
        let registry = registry(3, 0);
        let picks: Vec<_> = (0..6).map(|_| registry.next()).collect();
        assert_eq!(picks, vec![1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn cursor_preset_selects_first_backend() {
        let registry = registry(3, 2);
        assert_eq!(registry.next(), 0);
        assert_eq!(registry.address(0), "http://10.0.0.1/");
    }

    #[test]
    fn single_backend_always_selected() {
        let registry = registry(1, 0);
        for _ in 0..5 {
            assert_eq!(registry.next(), 0);
        }
    }

    #[test]
    fn each_index_appears_equally_over_full_cycles() {
        let n = 4;
        let k = 25;
        let registry = registry(n, 7);
        let mut counts = vec![0; n];
        for _ in 0..n * k {
            counts[registry.next()] += 1;
        }
        assert!(counts.iter().all(|&c| c == k));
    }

    #[test]
    fn from_config_preserves_order() {
        let configs: Vec<BackendConfig> = ["http://a:1", "http://b:2"]
            .iter()
            .map(|u| BackendConfig {
                url: Url::parse(u).unwrap(),
            })
            .collect();
        let registry = BackendRegistry::from_config(&configs).unwrap();
        assert_eq!(registry.size(), 2);
        assert_eq!(registry.backend(0).id, "a:1");
        assert_eq!(registry.backend(1).id, "b:2");
    }
}
