//! Decides which registered directives apply to an element.

use lazy_static::lazy_static;
use regex::Regex;

use crate::directive::{Directive, Restrict};
use crate::dom::Element;
use crate::registry::DirectiveRegistry;

lazy_static! {
    static ref CAMEL_BOUNDARY_RE: Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
}

/// `testDir` -> `test-dir`, `test_dir` -> `test-dir`.
pub fn dash_case(name: &str) -> String {
    CAMEL_BOUNDARY_RE
        .replace_all(name, "${1}-${2}")
        .replace('_', "-")
        .to_lowercase()
}

#[derive(Debug, Clone, Copy)]
pub struct Matched<'r> {
    pub name: &'r str,
    pub directive: &'r Directive,
}

/// Directives matching `element`, highest priority first.
///
/// Equal priorities keep registration order. The element is not modified,
/// so matching the same element twice gives the same list.
pub fn match_directives<'r>(element: &Element, registry: &'r DirectiveRegistry) -> Vec<Matched<'r>> {
    let mut attr_names: Option<Vec<String>> = None;
    let mut tag: Option<String> = None;

    let mut matched: Vec<Matched<'r>> = registry
        .iter()
        .filter(|(name, directive)| match directive.restrict {
            Restrict::Attribute => {
                let wanted = dash_case(name);
                attr_names
                    .get_or_insert_with(|| element.attrs.names().map(dash_case).collect())
                    .iter()
                    .any(|attr| *attr == wanted)
            }
            Restrict::Element => {
                *tag.get_or_insert_with(|| dash_case(&element.tag)) == dash_case(name)
            }
            Restrict::Class => element.has_class(name),
        })
        .map(|(name, directive)| Matched { name, directive })
        .collect();

    matched.sort_by(|a, b| b.directive.priority.cmp(&a.directive.priority));
    matched
}
