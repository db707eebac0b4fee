//! Backend selection by configuration string.

use super::backend::{BackendCredentials, HostingBackend};
use super::imgur::ImgurBackend;
use crate::config::ConfigError;

/// Builds a backend from credentials; fails on invalid backend options.
pub type Constructor =
    Box<dyn Fn(BackendCredentials) -> Result<Box<dyn HostingBackend>, ConfigError>>;

/// Maps selector names (case-insensitive) to backend constructors.
pub struct Registry {
    entries: Vec<(String, Constructor)>,
}

impl Registry {
    /// A registry with no backends at all.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register(
        &mut self,
        name: &str,
        constructor: impl Fn(BackendCredentials) -> Result<Box<dyn HostingBackend>, ConfigError>
        + 'static,
    ) {
        self.entries
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.entries.push((name.to_string(), Box::new(constructor)));
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Construct the backend registered as `name`.
    pub fn create(
        &self,
        name: &str,
        credentials: BackendCredentials,
    ) -> Result<Box<dyn HostingBackend>, ConfigError> {
        let (_, constructor) = self
            .entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::UnknownBackend(name.to_string(), self.names().join(", ")))?;
        constructor(credentials)
    }
}

impl Default for Registry {
    /// The stock backends. `ImgurBackend` is accepted for older config files.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("imgur", |credentials| {
            Ok(Box::new(ImgurBackend::new(credentials)?))
        });
        registry.register("ImgurBackend", |credentials| {
            Ok(Box::new(ImgurBackend::new(credentials)?))
        });
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::backend::tests::MockHost;

    #[test]
    fn default_registry_knows_imgur() {
        let registry = Registry::default();
        assert!(registry.contains("imgur"));
        assert!(registry.contains("IMGUR"));
        assert!(registry.contains("ImgurBackend"));
        assert!(!registry.contains("flickr"));
    }

    #[test]
    fn create_imgur_backend() {
        let backend = Registry::default()
            .create("imgur", BackendCredentials::default())
            .unwrap();
        assert_eq!(backend.name(), "Imgur backend");
    }

    #[test]
    fn unknown_backend_lists_alternatives() {
        let err = Registry::default()
            .create("flickr", BackendCredentials::default())
            .err()
            .unwrap();
        let message = err.to_string();
        assert!(matches!(err, ConfigError::UnknownBackend(..)));
        assert!(message.contains("flickr"));
        assert!(message.contains("imgur"));
    }

    #[test]
    fn register_adds_and_replaces() {
        let mut registry = Registry::empty();
        registry.register("mock", |_| Ok(Box::new(MockHost::new())));
        registry.register("MOCK", |_| Ok(Box::new(MockHost::rejecting())));
        assert_eq!(registry.names(), vec!["MOCK"]);

        let mut backend = registry
            .create("mock", BackendCredentials::default())
            .unwrap();
        assert!(backend.authenticate().is_err());
    }
}
