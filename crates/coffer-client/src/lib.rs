//! Coffer Client
//!
//! The storage service facade and the backends it delegates to.

pub mod backend;
pub mod memory;
pub mod multipart;
pub mod provider;
pub mod s3;
pub mod service;

pub use backend::ObjectBackend;
pub use memory::MemoryBackend;
pub use multipart::{InitOptions, MultipartOptions};
pub use provider::{ClientProvider, ClientSettings, SharedClientProvider};
pub use s3::S3Backend;
pub use service::{
    ListOptions, PostFormOptions, PresignOptions, PutOptions, StorageService, UrlOptions,
};

use coffer_core::{CofferConfig, Result};
use tracing::info;

/// Build the storage service from configuration.
///
/// Returns `Ok(None)` when storage is disabled.
pub fn auto_configure(
    config: &CofferConfig,
    provider: &dyn ClientProvider,
) -> Result<Option<StorageService>> {
    if !config.storage.enabled {
        info!("Object storage disabled, skipping service setup");
        return Ok(None);
    }

    let settings = ClientSettings::from_properties(&config.storage)?;
    let backend = provider.client(&settings)?;

    Ok(Some(StorageService::new(backend, config.storage.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn memory_provider() -> SharedClientProvider {
        SharedClientProvider::with_factory(|settings| {
            Ok(Arc::new(MemoryBackend::from_settings(settings)) as Arc<dyn ObjectBackend>)
        })
    }

    #[test]
    fn test_disabled_storage() {
        let mut config = CofferConfig::default();
        config.storage.enabled = false;

        let service = auto_configure(&config, &memory_provider()).unwrap();
        assert!(service.is_none());
    }

    #[test]
    fn test_missing_endpoint() {
        let config = CofferConfig::default();
        let err = auto_configure(&config, &memory_provider()).err().unwrap();
        assert_eq!(err.kind(), coffer_core::ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_configured_service() {
        let mut config = CofferConfig::default();
        config.storage.endpoint = Some("http://127.0.0.1:9000".into());
        config.storage.access_key = Some("minioadmin".into());
        config.storage.secret_key = Some("minioadmin".into());
        config.storage.bucket_name = Some("uploads".into());

        let service = auto_configure(&config, &memory_provider()).unwrap().unwrap();
        assert_eq!(service.default_bucket().unwrap(), "uploads");
        assert!(service.create_bucket("uploads").await.unwrap());
    }
}
