//! Builds the model adapter described by configuration.

use std::sync::Arc;
use std::time::Duration;

use quill_config::AppConfig;
use quill_core::error::Result;
use quill_core::plugin::PluginRegistry;
use quill_core::provider::{ModelAdapter, Provider};
use tracing::info;

use crate::mock::MockModelAdapter;
use crate::openai_compat::OpenAiCompatProvider;
use crate::plugin_adapter::PluginModelAdapter;

/// Construct the model adapter for this process.
///
/// Returns the mock adapter when `provider.use_mock` is set; otherwise an
/// API key is required and the OpenAI-compatible provider is wrapped in a
/// [`PluginModelAdapter`] over `registry`.
pub fn build_from_config(
    config: &AppConfig,
    registry: Arc<PluginRegistry>,
) -> Result<Arc<dyn ModelAdapter>> {
    let provider_config = &config.provider;

    if provider_config.use_mock {
        info!("Using mock model (no API calls)");
        return Ok(Arc::new(MockModelAdapter::new(registry)));
    }

    let api_key = config.require_api_key()?;
    let provider = OpenAiCompatProvider::new(
        &provider_config.name,
        &provider_config.base_url,
        api_key,
        Duration::from_secs(provider_config.timeout_secs),
    )?;

    info!(
        provider = %provider_config.name,
        base_url = %provider.base_url(),
        model = %provider_config.model,
        "Model adapter ready"
    );
    let provider: Arc<dyn Provider> = Arc::new(provider);

    let adapter = PluginModelAdapter::new(provider, registry, &provider_config.model)
        .with_temperature(provider_config.temperature)
        .with_max_tokens(provider_config.max_tokens);
    Ok(Arc::new(adapter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::Error;

    #[test]
    fn mock_needs_no_api_key() {
        let mut config = AppConfig::default();
        config.provider.use_mock = true;
        let adapter = build_from_config(&config, Arc::new(PluginRegistry::new())).unwrap();
        assert_eq!(adapter.name(), "mock");
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let config = AppConfig::default();
        let err = build_from_config(&config, Arc::new(PluginRegistry::new()))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn api_key_builds_the_provider_adapter() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("test-key".into());
        let adapter = build_from_config(&config, Arc::new(PluginRegistry::new())).unwrap();
        assert_eq!(adapter.name(), "gemini");
    }
}
