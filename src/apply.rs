//! Applies matched directives to a single element.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::directive::Directive;
use crate::dom::Element;
use crate::interpolate::interpolate;
use crate::loader::TemplateLoader;
use crate::matcher::Matched;
use crate::scope::Scope;

#[derive(Clone, Copy, Default)]
pub struct Applicator<'r> {
    loader: Option<&'r dyn TemplateLoader>,
}

impl<'r> Applicator<'r> {
    pub fn new(loader: Option<&'r dyn TemplateLoader>) -> Self {
        Self { loader }
    }

    /// Runs every match against `element` and returns whether any successful
    /// directive asked for the element to be replaced by its content.
    ///
    /// Links start in priority order but do not wait on each other, so a
    /// higher-priority link may await something a lower-priority link on the
    /// same element provides. Each directive works on its own snapshot of the
    /// element as matched. Successful snapshots are merged back in priority
    /// order, attribute by attribute, with later directives winning a clash.
    /// A failed or panicking link only loses its own snapshot.
    pub async fn apply(&self, element: &mut Element, matches: &[Matched<'_>], scope: &Scope) -> bool {
        let base = element.clone();

        let outcomes = join_all(matches.iter().map(|matched| {
            let mut working = base.clone();
            async move {
                let result = AssertUnwindSafe(self.apply_one(&mut working, matched, scope))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
                (working, result)
            }
        }))
        .await;

        let mut replaced = false;
        for (matched, (working, result)) in matches.iter().zip(outcomes) {
            match result {
                Ok(()) => {
                    merge_changes(element, &base, working);
                    replaced |= matched.directive.replace;
                }
                Err(message) => {
                    error!(
                        directive = matched.name,
                        tag = %base.tag,
                        "directive link failed, changes rolled back: {}",
                        message
                    );
                }
            }
        }

        replaced
    }

    async fn apply_one(
        &self,
        element: &mut Element,
        matched: &Matched<'_>,
        scope: &Scope,
    ) -> Result<(), String> {
        let directive = matched.directive;

        if let Some(template) = &directive.template {
            insert_template(element, directive, &interpolate(template, scope));
        } else if let Some(path) = &directive.template_path {
            if let Some(template) = self.load(matched.name, path).await {
                insert_template(element, directive, &interpolate(&template, scope));
            }
        }

        if let Some(link) = &directive.link {
            link.link(scope, element)
                .await
                .map_err(|e| e.message().to_string())?;
        }

        Ok(())
    }

    async fn load(&self, name: &str, path: &str) -> Option<String> {
        if !path.ends_with(".html") {
            debug!(directive = name, path, "templatePath is not an .html file, ignored");
            return None;
        }
        let Some(loader) = self.loader else {
            warn!(directive = name, path, "no template loader configured");
            return None;
        };
        match loader.load(path).await {
            Ok(template) => Some(template),
            Err(e) => {
                warn!(directive = name, path, "failed to load template: {}", e);
                None
            }
        }
    }
}

/// Copies what `working` changed relative to `base` onto `element`.
fn merge_changes(element: &mut Element, base: &Element, working: Element) {
    if working.tag != base.tag {
        element.tag = working.tag;
    }
    for name in base.attrs.names() {
        if !working.attrs.contains(name) {
            element.remove_attr(name);
        }
    }
    for (name, value) in working.attrs.iter() {
        if base.attr(name) != Some(value) {
            element.set_attr(name, value);
        }
    }
    if working.children != base.children {
        element.children = working.children;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");
    format!("link panicked: {}", detail)
}

fn insert_template(element: &mut Element, directive: &Directive, html: &str) {
    if directive.prepend {
        element.prepend_html(html);
    } else {
        element.set_inner_html(html);
    }
}
