//! Template compilation and rendering.
//!
//! `compile` fixes the template; `render` runs it against a scope. When the
//! registry is empty, rendering is plain interpolation and finishes
//! synchronously. Otherwise the interpolated markup is parsed and every
//! element is matched and linked, with siblings rendered concurrently and
//! reassembled by position.

use futures::future::{self, join_all, BoxFuture};
use std::fmt;
use std::future::IntoFuture;
use tracing::{trace, warn};

use crate::apply::Applicator;
use crate::dom::{parse_markup, Node};
use crate::interpolate::interpolate;
use crate::loader::TemplateLoader;
use crate::matcher::match_directives;
use crate::registry::DirectiveRegistry;
use crate::scope::Scope;

/// How many directive-applied ancestors an element may have before matching
/// stops. Templates that contain their own directive end here.
pub const MAX_DIRECTIVE_DEPTH: usize = 64;

#[derive(Clone, Copy)]
pub struct Compiler<'r> {
    registry: &'r DirectiveRegistry,
    loader: Option<&'r dyn TemplateLoader>,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r DirectiveRegistry) -> Self {
        Self {
            registry,
            loader: None,
        }
    }

    /// Sets where `templatePath` directives load from.
    pub fn with_loader(mut self, loader: &'r dyn TemplateLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn registry(&self) -> &'r DirectiveRegistry {
        self.registry
    }

    /// Compiles `template`, trimmed of surrounding whitespace. An empty
    /// template yields the no-op render function.
    pub fn compile(&self, template: &str) -> RenderFn<'r> {
        let template = template.trim();
        RenderFn {
            compiler: *self,
            template: (!template.is_empty()).then(|| template.to_string()),
        }
    }

    fn render_nodes<'a>(
        self,
        nodes: Vec<Node>,
        scope: &'a Scope,
        depth: usize,
    ) -> BoxFuture<'a, String>
    where
        'r: 'a,
    {
        Box::pin(async move {
            join_all(nodes.into_iter().map(|node| self.render_node(node, scope, depth)))
                .await
                .concat()
        })
    }

    /// `depth` counts the ancestors that had directives applied.
    fn render_node<'a>(self, node: Node, scope: &'a Scope, depth: usize) -> BoxFuture<'a, String>
    where
        'r: 'a,
    {
        Box::pin(async move {
            let mut element = match node {
                Node::Element(element) => element,
                other => return other.to_html(),
            };

            let matches = match_directives(&element, self.registry);
            let mut child_depth = depth;
            let replaced = if matches.is_empty() {
                false
            } else if depth >= MAX_DIRECTIVE_DEPTH {
                warn!(
                    tag = %element.tag,
                    depth,
                    "directive nesting limit reached, rendering element as-is"
                );
                false
            } else {
                trace!(tag = %element.tag, count = matches.len(), "applying directives");
                child_depth += 1;
                Applicator::new(self.loader)
                    .apply(&mut element, &matches, scope)
                    .await
            };

            let inner = if element.is_raw_text() {
                element.inner_html()
            } else {
                let children = std::mem::take(&mut element.children);
                self.render_nodes(children, scope, child_depth).await
            };

            if replaced {
                inner
            } else {
                element.serialize_with_inner(&inner)
            }
        })
    }
}

impl fmt::Debug for Compiler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("directives", &self.registry.len())
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct RenderFn<'r> {
    compiler: Compiler<'r>,
    template: Option<String>,
}

impl<'r> RenderFn<'r> {
    /// True for the render function of an empty template.
    pub fn is_noop(&self) -> bool {
        self.template.is_none()
    }

    pub fn template(&self) -> &str {
        self.template.as_deref().unwrap_or("")
    }

    pub fn render<'a>(&'a self, scope: &'a Scope) -> Rendered<'a> {
        let Some(template) = &self.template else {
            return Rendered::Ready(String::new());
        };

        let text = interpolate(template, scope);
        if self.compiler.registry.is_empty() {
            return Rendered::Ready(text);
        }

        let compiler = self.compiler;
        Rendered::Pending(Box::pin(async move {
            let nodes = parse_markup(&text);
            compiler.render_nodes(nodes, scope, 0).await
        }))
    }
}

/// Result of [`RenderFn::render`]: either finished or still waiting on
/// template loads and directive links. Always awaitable.
pub enum Rendered<'a> {
    Ready(String),
    Pending(BoxFuture<'a, String>),
}

impl<'a> Rendered<'a> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Rendered::Ready(_))
    }

    /// The output, if it was produced synchronously.
    pub fn into_ready(self) -> Option<String> {
        match self {
            Rendered::Ready(html) => Some(html),
            Rendered::Pending(_) => None,
        }
    }
}

impl<'a> IntoFuture for Rendered<'a> {
    type Output = String;
    type IntoFuture = BoxFuture<'a, String>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Rendered::Ready(html) => Box::pin(future::ready(html)),
            Rendered::Pending(pending) => pending,
        }
    }
}

impl fmt::Debug for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendered::Ready(html) => f.debug_tuple("Ready").field(html).finish(),
            Rendered::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}
