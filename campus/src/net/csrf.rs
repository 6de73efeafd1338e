//! CSRF token discovery.
//!
//! The server renders the token into a hidden `csrfmiddlewaretoken` input and
//! also sets a `csrftoken` cookie. Either source is accepted; absence is a
//! fatal precondition for mutating calls.

#[cfg(test)]
#[path = "csrf_test.rs"]
mod csrf_test;

use std::fmt;

pub const CSRF_FIELD_NAME: &str = "csrfmiddlewaretoken";
pub const CSRF_COOKIE_NAME: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// A non-empty CSRF token.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Wrap a raw value; blank values are rejected.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Find the hidden form field in rendered page markup.
    #[must_use]
    pub fn from_html(html: &str) -> Option<Self> {
        let needle = format!("name=\"{CSRF_FIELD_NAME}\"");
        let mut rest = html;
        while let Some(pos) = rest.find(&needle) {
            let tag_start = rest[..pos].rfind('<').unwrap_or(0);
            let tag_end = rest[pos..].find('>').map_or(rest.len(), |end| pos + end);
            if let Some(value) = attr_value(&rest[tag_start..tag_end], "value") {
                return Self::new(value);
            }
            rest = &rest[tag_end..];
        }
        None
    }

    /// Find the `csrftoken` entry in a `Cookie` header value.
    #[must_use]
    pub fn from_cookie_header(header: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == CSRF_COOKIE_NAME)
            .and_then(|(_, value)| Self::new(value))
    }
}

// Token values are secrets; keep them out of logs.
impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(..)")
    }
}

fn attr_value<'a>(tag: &'a str, attr: &str) -> Option<&'a str> {
    let needle = format!("{attr}=\"");
    let mut search_from = 0;
    while let Some(found) = tag[search_from..].find(&needle) {
        let start = search_from + found;
        let preceded_by_space = start == 0 || tag[..start].ends_with(char::is_whitespace);
        let value_start = start + needle.len();
        if preceded_by_space {
            let len = tag[value_start..].find('"')?;
            return Some(&tag[value_start..value_start + len]);
        }
        search_from = value_start;
    }
    None
}
