//! `{{{ expr }}}` substitution over raw template text.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::warn;

use crate::eval::evaluate;
use crate::scope::Scope;

lazy_static! {
    /// Non-greedy: the first `}}}` closes the marker, markers never nest.
    static ref MARKER_RE: Regex = Regex::new(r"\{\{\{([\s\S]*?)\}\}\}").unwrap();
}

/// Replaces every marker in `text` with its HTML-escaped evaluation result.
///
/// A marker whose expression fails to evaluate is replaced by the empty
/// string and reported once at `warn` level. Text outside markers is copied
/// through unchanged.
pub fn interpolate(text: &str, scope: &Scope) -> String {
    if !text.contains("{{{") {
        return text.to_string();
    }

    MARKER_RE
        .replace_all(text, |caps: &Captures| {
            let expression = &caps[1];
            match evaluate(expression, scope) {
                Ok(value) => escape_html(&value),
                Err(warning) => {
                    warn!(expression = expression.trim(), "interpolation failed: {}", warning);
                    String::new()
                }
            }
        })
        .into_owned()
}

/// True when `text` holds at least one complete marker.
pub fn has_markers(text: &str) -> bool {
    MARKER_RE.is_match(text)
}

/// Escapes `& < > " '` for any position in markup.
///
/// When directives are registered the interpolated markup is parsed and
/// serialized again by [`crate::dom`], which only escapes what each position
/// requires. Quotes in text and `<>` in attribute values then come back
/// literal.
pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
