//! Named directive registry.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::directive::{Directive, DirectiveSource};
use crate::error::ConfigError;

lazy_static! {
    static ref API_VIEW_RE: Regex = Regex::new(r"(?i)api.?view").unwrap();
}

/// Directives keyed by camelCase name, in registration order.
///
/// Registration order is the tie-breaker when two matched directives share a
/// priority, so re-registering a name keeps its original slot.
#[derive(Debug, Default, Clone)]
pub struct DirectiveRegistry {
    directives: IndexMap<String, Directive>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or overwrites) `name`.
    ///
    /// Factory sources are resolved here, once. Fails for an empty name or
    /// an api-view directive that declares no `Controller`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: impl Into<DirectiveSource>,
    ) -> Result<&mut Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let directive = source.into().resolve();
        let is_api_view = directive
            .kind
            .as_deref()
            .is_some_and(|kind| API_VIEW_RE.is_match(kind));
        if is_api_view && directive.controller.is_none() {
            return Err(ConfigError::MissingController(name));
        }

        debug!(
            directive = %name,
            restrict = %directive.restrict.as_char(),
            priority = directive.priority,
            "registered directive"
        );
        self.directives.insert(name, directive);
        Ok(self)
    }

    /// Tears down `name`. Later renders no longer see it.
    pub fn unregister(&mut self, name: &str) -> Option<Directive> {
        let removed = self.directives.shift_remove(name);
        if removed.is_some() {
            debug!(directive = %name, "unregistered directive");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&Directive> {
        self.directives.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Directive> {
        self.directives.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Directive)> {
        self.directives.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::Restrict;

    #[test]
    fn test_register_and_unregister() {
        let mut registry = DirectiveRegistry::new();
        registry
            .register("testDir", Directive::new(Restrict::Class))
            .unwrap()
            .register("other", Directive::new(Restrict::Attribute))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("testDir"));
        assert!(registry.unregister("testDir").is_some());
        assert!(registry.unregister("testDir").is_none());
        assert!(!registry.contains("testDir"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistration_overwrites_in_place() {
        let mut registry = DirectiveRegistry::new();
        registry.register("first", Directive::default()).unwrap();
        registry.register("second", Directive::default()).unwrap();
        registry
            .register("first", Directive::new(Restrict::Element).with_priority(9))
            .unwrap();

        let names: Vec<_> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["first", "second"]);
        let first = registry.get("first").unwrap();
        assert_eq!(first.restrict, Restrict::Element);
        assert_eq!(first.priority, 9);
    }

    #[test]
    fn test_api_view_requires_controller() {
        let mut registry = DirectiveRegistry::new();

        let err = registry
            .register("apiThing", Directive::default().with_kind("apiView"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingController(ref name) if name == "apiThing"));

        let err = registry
            .register("other", Directive::default().with_kind("API_VIEW"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingController(_)));

        registry
            .register(
                "apiThing",
                Directive::default()
                    .with_kind("apiView")
                    .with_controller("ThingController"),
            )
            .unwrap();
        registry
            .register("plain", Directive::default().with_kind("view"))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = DirectiveRegistry::new();
        assert!(matches!(
            registry.register(" ", Directive::default()),
            Err(ConfigError::EmptyName)
        ));
    }

    #[test]
    fn test_factory_resolved_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = DirectiveRegistry::new();
        registry
            .register(
                "made",
                DirectiveSource::factory(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Directive::new(Restrict::Class)
                }),
            )
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get("made").unwrap().restrict, Restrict::Class);
    }
}
