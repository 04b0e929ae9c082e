//! Process-wide client provider

use crate::backend::ObjectBackend;
use crate::s3::S3Backend;
use coffer_core::{Error, Result, StorageProperties};
use once_cell::sync::{Lazy, OnceCell};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Endpoint and credentials a client is built from
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub path_style: bool,
}

impl ClientSettings {
    pub fn from_properties(props: &StorageProperties) -> Result<Self> {
        props.validate()?;

        let missing = |what: &str| Error::Config(format!("{} not configured", what));
        Ok(Self {
            endpoint: props.endpoint.clone().ok_or_else(|| missing("Endpoint"))?,
            access_key: props.access_key.clone().ok_or_else(|| missing("Access key"))?,
            secret_key: props.secret_key.clone().ok_or_else(|| missing("Secret key"))?,
            region: props.region.clone(),
            path_style: props.path_style,
        })
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .field("path_style", &self.path_style)
            .finish()
    }
}

/// Hands out the shared storage client
pub trait ClientProvider: Send + Sync {
    /// The shared client. Only the first call's settings are used.
    fn client(&self, settings: &ClientSettings) -> Result<Arc<dyn ObjectBackend>>;
}

type BackendFactory = dyn Fn(&ClientSettings) -> Result<Arc<dyn ObjectBackend>> + Send + Sync;

/// Builds the client once and returns the same instance forever after.
///
/// Settings passed after the first successful call are ignored; a
/// mismatch is logged rather than applied.
pub struct SharedClientProvider {
    cell: OnceCell<(ClientSettings, Arc<dyn ObjectBackend>)>,
    factory: Box<BackendFactory>,
}

static GLOBAL: Lazy<SharedClientProvider> = Lazy::new(SharedClientProvider::new);

impl SharedClientProvider {
    /// Provider backed by the AWS SDK client
    pub fn new() -> Self {
        Self::with_factory(|settings| {
            Ok(Arc::new(S3Backend::new(settings)?) as Arc<dyn ObjectBackend>)
        })
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&ClientSettings) -> Result<Arc<dyn ObjectBackend>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    /// The process-global provider
    pub fn global() -> &'static SharedClientProvider {
        &GLOBAL
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl Default for SharedClientProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientProvider for SharedClientProvider {
    fn client(&self, settings: &ClientSettings) -> Result<Arc<dyn ObjectBackend>> {
        let (initial, backend) = self.cell.get_or_try_init(|| {
            info!("Creating storage client for {}", settings.endpoint);
            let backend = (self.factory)(settings)?;
            Ok::<_, Error>((settings.clone(), backend))
        })?;

        if initial != settings {
            warn!(
                "Storage client already created for {}; ignoring settings for {}",
                initial.endpoint, settings.endpoint
            );
        }

        Ok(Arc::clone(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(endpoint: &str, access_key: &str) -> ClientSettings {
        ClientSettings {
            endpoint: endpoint.to_string(),
            access_key: access_key.to_string(),
            secret_key: "secret".to_string(),
            region: "us-east-1".to_string(),
            path_style: true,
        }
    }

    #[test]
    fn test_same_client_for_different_settings() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let provider = SharedClientProvider::with_factory(move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MemoryBackend::from_settings(s)) as Arc<dyn ObjectBackend>)
        });

        let first = provider.client(&settings("http://a:9000", "alice")).unwrap();
        let second = provider.client(&settings("http://b:9000", "bob")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.endpoint(), "http://a:9000");
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let provider = SharedClientProvider::with_factory(move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(MemoryBackend::from_settings(s)) as Arc<dyn ObjectBackend>)
        });

        let clients: Vec<Arc<dyn ObjectBackend>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let provider = &provider;
                    scope.spawn(move || {
                        let endpoint = format!("http://node{}:9000", i);
                        provider.client(&settings(&endpoint, "alice")).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(built.load(Ordering::SeqCst), 1);
        for client in &clients[1..] {
            assert!(Arc::ptr_eq(&clients[0], client));
        }
    }

    #[test]
    fn test_failed_init_can_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let provider = SharedClientProvider::with_factory(move |s| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Error::Config("not yet".into()));
            }
            Ok(Arc::new(MemoryBackend::from_settings(s)) as Arc<dyn ObjectBackend>)
        });

        assert!(provider.client(&settings("http://a:9000", "alice")).is_err());
        assert!(!provider.is_initialized());
        assert!(provider.client(&settings("http://a:9000", "alice")).is_ok());
        assert!(provider.is_initialized());
    }

    #[test]
    fn test_sdk_client_is_shared() {
        let provider = SharedClientProvider::new();
        let first = provider.client(&settings("http://127.0.0.1:9000", "alice")).unwrap();
        let second = provider.client(&settings("http://127.0.0.1:9001", "bob")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.endpoint(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_settings_from_properties() {
        let props = StorageProperties {
            endpoint: Some("http://127.0.0.1:9000".into()),
            access_key: Some("ak".into()),
            secret_key: Some("sk".into()),
            ..Default::default()
        };
        let s = ClientSettings::from_properties(&props).unwrap();
        assert_eq!(s.endpoint, "http://127.0.0.1:9000");
        assert!(!format!("{:?}", s).contains("sk\""));

        assert!(ClientSettings::from_properties(&StorageProperties::default()).is_err());
    }
}
