//! # Directive Compiler
//!
//! Server-side `$compile`: takes an HTML template, interpolates `{{{ expr }}}`
//! markers against a scope, runs registered directives over the resulting
//! markup and produces the final HTML string.
//!
//! ```no_run
//! use directive_compiler::{Compiler, Directive, DirectiveRegistry, Restrict, Scope};
//!
//! # async fn demo() -> Result<(), directive_compiler::ConfigError> {
//! let mut registry = DirectiveRegistry::new();
//! registry.register(
//!     "testDir",
//!     Directive::new(Restrict::Class).with_link_fn(|_, el| {
//!         el.set_attr("test", "test");
//!         Ok(())
//!     }),
//! )?;
//!
//! let render = Compiler::new(&registry).compile(r#"<div class="testDir"></div>"#);
//! let html = render.render(&Scope::new()).await;
//! assert_eq!(html, r#"<div class="testDir" test="test"></div>"#);
//! # Ok(())
//! # }
//! ```
//!
//! ## Rendering Invariants
//!
//! 1. **Interpolation first**: markers are substituted in the raw template
//!    text before any parsing. Results are HTML-escaped. A marker that fails
//!    to evaluate becomes the empty string and logs one warning. When
//!    directives are registered the markup is then re-serialized, which
//!    escapes only what each position needs.
//!
//! 2. **Synchronous when possible**: with an empty registry the render is
//!    pure interpolation and returns [`Rendered::Ready`].
//!
//! 3. **Directive order**: matched directives start highest priority first.
//!    Equal priorities keep registration order. Links on one element do not
//!    wait for each other, and their changes merge back in that order.
//!
//! 4. **Document order**: sibling elements render concurrently but the
//!    output is always assembled by position.
//!
//! 5. **Failure isolation**: a failing link rolls back that directive's
//!    changes to that element and nothing else, whether it returns an error
//!    or panics. Only registration can fail.
//!
//! 6. **Bounded expansion**: directives stop matching below
//!    [`MAX_DIRECTIVE_DEPTH`] directive-applied ancestors, so a template that
//!    contains its own directive terminates.

mod apply;
mod compile;
mod config;
mod directive;
mod dom;
mod error;
mod eval;
mod interpolate;
mod loader;
mod matcher;
mod registry;
mod scope;
mod value;

pub mod logging;

#[cfg(test)]
mod compile_tests;
#[cfg(test)]
mod expression_tests;

pub use apply::Applicator;
pub use compile::{Compiler, RenderFn, Rendered, MAX_DIRECTIVE_DEPTH};
pub use config::{CompilerConfig, DirectiveConfig};
pub use directive::{Directive, DirectiveSource, Link, LinkFuture, Restrict};
pub use dom::{
    parse_document_nodes, parse_fragment_nodes, parse_markup, serialize, Attributes, Doctype,
    Element, Node,
};
pub use error::{ConfigError, EvalWarning, LinkError, LoadError};
pub use eval::{evaluate, evaluate_value, MAX_NESTING};
pub use interpolate::{has_markers, interpolate};
pub use loader::{FileTemplateLoader, TemplateCache, TemplateLoader};
pub use matcher::{dash_case, match_directives, Matched};
pub use registry::DirectiveRegistry;
pub use scope::{Scope, ScopeFn};
pub use value::{format_number, Value};
