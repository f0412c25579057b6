use std::sync::Arc;

use super::rest::RestBackend;
use super::traits::Backend;
use crate::errors::CoreError;
use crate::models::settings::BackendConfig;

/// Builds backend connections from one configuration.
///
/// Two variants: the public client used by the viewer and the gates, and the
/// admin client that carries the admin code on every call.
#[derive(Debug, Clone)]
pub struct BackendFactory {
    config: BackendConfig,
}

impl BackendFactory {
    pub fn new(config: BackendConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn public_client(&self) -> Result<Arc<dyn Backend>, CoreError> {
        Ok(Arc::new(RestBackend::public(&self.config)?))
    }

    pub fn admin_client(&self, admin_code: &str) -> Result<Arc<dyn Backend>, CoreError> {
        let code = admin_code.trim();
        if code.is_empty() {
            return Err(CoreError::NotAuthenticated);
        }
        Ok(Arc::new(RestBackend::admin(&self.config, code)?))
    }
}
