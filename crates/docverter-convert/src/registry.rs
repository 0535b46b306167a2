//! Converter registry and provider selection.

use docverter_core::{ConverterConfig, DocumentConverter, FactoryError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::advanced::{AdvancedConverter, ADVANCED};
use crate::standard::{StandardConverter, STANDARD};

/// Builds a converter from configuration.
pub type ConverterConstructor =
    Arc<dyn Fn(ConverterConfig) -> Arc<dyn DocumentConverter> + Send + Sync>;

/// Registry of converter constructors, keyed by provider name.
pub struct ConverterRegistry {
    constructors: HashMap<String, ConverterConstructor>,
}

impl ConverterRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry holding the `standard` and `advanced` providers.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_converter(
            STANDARD,
            Arc::new(|config: ConverterConfig| {
                Arc::new(StandardConverter::new(config)) as Arc<dyn DocumentConverter>
            }),
        );
        registry.register_converter(
            ADVANCED,
            Arc::new(|config: ConverterConfig| {
                Arc::new(AdvancedConverter::new(config)) as Arc<dyn DocumentConverter>
            }),
        );
        registry
    }

    /// Register a constructor, replacing any previous one with the same name.
    pub fn register_converter(&mut self, name: &str, constructor: ConverterConstructor) {
        if self
            .constructors
            .insert(name.to_string(), constructor)
            .is_some()
        {
            warn!("Converter '{}' re-registered, previous constructor replaced", name);
        } else {
            debug!("Registered converter '{}'", name);
        }
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn list_available_converters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Construct a registered converter without initializing it.
    #[must_use]
    pub fn create_converter(
        &self,
        name: &str,
        config: ConverterConfig,
    ) -> Option<Arc<dyn DocumentConverter>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor(config))
    }

    /// Construct and initialize a converter.
    ///
    /// `name` defaults to `config.default_provider`. With `allow_fallback`
    /// the standard provider is tried after the requested one. The standard
    /// provider is always attempted last if nothing else was usable.
    pub async fn get_document_converter(
        &self,
        name: Option<&str>,
        config: Option<ConverterConfig>,
        allow_fallback: bool,
    ) -> Result<Arc<dyn DocumentConverter>, FactoryError> {
        let config = config.unwrap_or_default();
        let requested = name.unwrap_or(&config.default_provider).to_string();

        let mut candidates = vec![requested.clone()];
        if allow_fallback && requested != STANDARD {
            candidates.push(STANDARD.to_string());
        }

        let mut tried = Vec::new();
        for candidate in &candidates {
            if let Some(converter) = self.try_build(candidate, &config, &mut tried).await {
                return Ok(converter);
            }
        }

        if !tried.iter().any(|name| name == STANDARD) {
            warn!(
                "No usable converter among {:?}, trying '{}' as last resort",
                candidates, STANDARD
            );
            if let Some(converter) = self.try_build(STANDARD, &config, &mut tried).await {
                return Ok(converter);
            }
        }

        Err(FactoryError::NoUsableConverter { requested, tried })
    }

    async fn try_build(
        &self,
        name: &str,
        config: &ConverterConfig,
        tried: &mut Vec<String>,
    ) -> Option<Arc<dyn DocumentConverter>> {
        let Some(converter) = self.create_converter(name, config.clone()) else {
            warn!("Converter '{}' is not registered, skipping", name);
            return None;
        };
        tried.push(name.to_string());

        if converter.initialize().await {
            info!("Using converter '{}'", name);
            Some(converter)
        } else {
            warn!("Converter '{}' failed to initialize", name);
            None
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
