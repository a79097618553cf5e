//! Directive definitions.

use futures::future::{self, BoxFuture};
use std::fmt;
use std::sync::Arc;

use crate::dom::Element;
use crate::error::LinkError;
use crate::scope::Scope;

/// How a directive is matched against an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Restrict {
    /// By attribute name.
    #[default]
    Attribute,
    /// By tag name.
    Element,
    /// By class token.
    Class,
}

impl Restrict {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "A" => Some(Restrict::Attribute),
            "E" => Some(Restrict::Element),
            "C" => Some(Restrict::Class),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Restrict::Attribute => 'A',
            Restrict::Element => 'E',
            Restrict::Class => 'C',
        }
    }
}

pub type LinkFuture<'a> = BoxFuture<'a, Result<(), LinkError>>;

/// A directive's link step.
///
/// The returned future completing is the directive's `done` signal. Plain
/// closures `Fn(&Scope, &mut Element) -> Result<(), LinkError>` implement
/// this trait and complete immediately.
pub trait Link: Send + Sync {
    fn link<'a>(&'a self, scope: &'a Scope, element: &'a mut Element) -> LinkFuture<'a>;
}

impl<F> Link for F
where
    F: Fn(&Scope, &mut Element) -> Result<(), LinkError> + Send + Sync,
{
    fn link<'a>(&'a self, scope: &'a Scope, element: &'a mut Element) -> LinkFuture<'a> {
        Box::pin(future::ready(self(scope, element)))
    }
}

#[derive(Clone, Default)]
pub struct Directive {
    pub controller: Option<String>,
    /// Declared kind (`type` in configuration). Only used by the api-view check.
    pub kind: Option<String>,
    pub priority: i32,
    pub replace: bool,
    pub restrict: Restrict,
    pub link: Option<Arc<dyn Link>>,
    pub template: Option<String>,
    pub template_path: Option<String>,
    pub prepend: bool,
}

impl Directive {
    pub fn new(restrict: Restrict) -> Self {
        Self {
            restrict,
            ..Default::default()
        }
    }

    pub fn with_controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn with_link<L: Link + 'static>(mut self, link: L) -> Self {
        self.link = Some(Arc::new(link));
        self
    }

    /// Synchronous link from a closure.
    pub fn with_link_fn<F>(self, link: F) -> Self
    where
        F: Fn(&Scope, &mut Element) -> Result<(), LinkError> + Send + Sync + 'static,
    {
        self.with_link(link)
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_template_path(mut self, path: impl Into<String>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn with_prepend(mut self, prepend: bool) -> Self {
        self.prepend = prepend;
        self
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directive")
            .field("controller", &self.controller)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("replace", &self.replace)
            .field("restrict", &self.restrict)
            .field("link", &self.link.is_some())
            .field("template", &self.template)
            .field("template_path", &self.template_path)
            .field("prepend", &self.prepend)
            .finish()
    }
}

/// What gets handed to the registry: a definition, or a factory producing
/// one. Factories run exactly once, at registration.
pub enum DirectiveSource {
    Inline(Directive),
    Factory(Box<dyn FnOnce() -> Directive + Send>),
}

impl DirectiveSource {
    pub fn factory<F>(factory: F) -> Self
    where
        F: FnOnce() -> Directive + Send + 'static,
    {
        DirectiveSource::Factory(Box::new(factory))
    }

    pub fn resolve(self) -> Directive {
        match self {
            DirectiveSource::Inline(directive) => directive,
            DirectiveSource::Factory(factory) => factory(),
        }
    }
}

impl From<Directive> for DirectiveSource {
    fn from(directive: Directive) -> Self {
        DirectiveSource::Inline(directive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_restrict_parse() {
        assert_eq!(Restrict::parse("A"), Some(Restrict::Attribute));
        assert_eq!(Restrict::parse(" E "), Some(Restrict::Element));
        assert_eq!(Restrict::parse("C"), Some(Restrict::Class));
        assert_eq!(Restrict::parse("AE"), None);
        assert_eq!(Restrict::default().as_char(), 'A');
    }

    #[test]
    fn test_closure_link_completes_immediately() {
        let directive = Directive::new(Restrict::Class).with_link_fn(|scope, el| {
            let value = scope.get("value").and_then(|v| v.as_str()).unwrap_or("none");
            el.set_attr("test", value);
            Ok(())
        });

        let scope = Scope::new().with("value", "set");
        let mut el = Element::new("div");
        let link = directive.link.as_ref().unwrap();
        block_on(link.link(&scope, &mut el)).unwrap();
        assert_eq!(el.attr("test"), Some("set"));
    }

    #[test]
    fn test_factory_source_runs_on_resolve() {
        let source = DirectiveSource::factory(|| Directive::new(Restrict::Element).with_priority(3));
        let directive = source.resolve();
        assert_eq!(directive.restrict, Restrict::Element);
        assert_eq!(directive.priority, 3);
    }
}
