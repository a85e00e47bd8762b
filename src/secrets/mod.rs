//! Named credentials resolved at the moment a step needs them

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Replacement text for secret values in captured output
pub const MASK: &str = "***";

/// Default prefix for [`EnvSecretStore`]
pub const DEFAULT_SECRET_PREFIX: &str = "PIPELINE_SECRET_";

/// Error types for secret resolution
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secret '{0}' is not defined")]
    NotFound(String),

    #[error("Secret store error: {0}")]
    Backend(String),
}

/// A resolved credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for handing to the step that asked for it
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue({})", MASK)
    }
}

/// Source of secrets - allows for different backends
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Look up a secret by name; `Ok(None)` when it is not defined
    async fn resolve(&self, name: &str) -> Result<Option<SecretValue>, SecretError>;
}

#[async_trait]
impl<S: SecretStore + ?Sized> SecretStore for Arc<S> {
    async fn resolve(&self, name: &str) -> Result<Option<SecretValue>, SecretError> {
        (**self).resolve(name).await
    }
}

/// Reads secrets from the process environment as `<prefix><NAME>`
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_PREFIX)
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn resolve(&self, name: &str) -> Result<Option<SecretValue>, SecretError> {
        match std::env::var(format!("{}{}", self.prefix, name)) {
            Ok(value) => Ok(Some(SecretValue::new(value))),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(SecretError::Backend(format!("{}: {}", name, e))),
        }
    }
}

/// Map-backed store that remembers every lookup
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    values: HashMap<String, String>,
    lookups: Mutex<Vec<String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Names looked up so far, in order
    pub async fn lookups(&self) -> Vec<String> {
        self.lookups.lock().await.clone()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn resolve(&self, name: &str) -> Result<Option<SecretValue>, SecretError> {
        self.lookups.lock().await.push(name.to_string());
        Ok(self.values.get(name).cloned().map(SecretValue::new))
    }
}

/// Resolve every name, failing on the first one that is missing
pub async fn resolve_all<S: SecretStore + ?Sized>(
    store: &S,
    names: &[String],
) -> Result<HashMap<String, SecretValue>, SecretError> {
    let mut resolved = HashMap::with_capacity(names.len());
    for name in names {
        let value = store
            .resolve(name)
            .await?
            .ok_or_else(|| SecretError::NotFound(name.clone()))?;
        resolved.insert(name.clone(), value);
    }
    Ok(resolved)
}

/// Replaces known secret values in text
#[derive(Debug, Default, Clone)]
pub struct Masker {
    values: Vec<String>,
}

impl Masker {
    pub fn new<'a>(secrets: impl IntoIterator<Item = &'a SecretValue>) -> Self {
        let mut values: Vec<String> = secrets
            .into_iter()
            .map(|s| s.expose().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        // Longest first so a secret containing another is masked whole
        values.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        values.dedup();
        Self { values }
    }

    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for value in &self.values {
            if masked.contains(value.as_str()) {
                masked = masked.replace(value.as_str(), MASK);
            }
        }
        masked
    }
}
