use crate::error::Error;

use std::fmt::Write;

/// One token of a parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A literal path segment, matched case-sensitively.
    Literal(String),
    /// A `{name}` or `{name?}` parameter slot.
    Param { name: String, optional: bool },
}

/// A parsed path template and its matching procedure.
///
/// Templates are anchored: the whole path must be consumed for a match.
/// Parameter values are captured as the raw substring between slashes and
/// are not URL-decoded here.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a path template like `/users/{id}` or `/search/{query?}`.
    ///
    /// Optional parameters may only be followed by other optional
    /// parameters; anything else is a setup mistake and is rejected here
    /// rather than producing a matcher with surprising semantics.
    pub fn parse(path: &str) -> Result<Template, Error> {
        let mut segments = Vec::new();
        let mut saw_optional = false;

        for part in path.split('/') {
            if part.is_empty() {
                continue;
            }

            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    let (name, optional) = match inner.strip_suffix('?') {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if name.is_empty()
                        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    {
                        return Err(Error::config(format!(
                            "invalid parameter name '{name}' in template '{path}'"
                        )));
                    }
                    Segment::Param {
                        name: name.to_owned(),
                        optional,
                    }
                }
                None => Segment::Literal(part.to_owned()),
            };

            match &segment {
                Segment::Param { optional: true, .. } => saw_optional = true,
                _ if saw_optional => {
                    return Err(Error::config(format!(
                        "optional parameters must be trailing in template '{path}'"
                    )));
                }
                _ => {}
            }

            segments.push(segment);
        }

        Ok(Template {
            raw: path.to_owned(),
            segments,
        })
    }

    /// The template string this was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a request path, returning captured parameters in template
    /// order, or `None` if the path does not match.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        if self.segments.is_empty() {
            return (path.is_empty() || path == "/").then(Vec::new);
        }

        let parts: Vec<&str> = path.strip_prefix('/')?.split('/').collect();
        let mut params = Vec::new();
        let mut at = 0;

        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(at).copied() != Some(lit.as_str()) {
                        return None;
                    }
                    at += 1;
                }
                Segment::Param { name, optional } => match parts.get(at) {
                    Some(part) if !part.is_empty() => {
                        params.push((name.clone(), (*part).to_owned()));
                        at += 1;
                    }
                    _ if *optional => {}
                    _ => return None,
                },
            }
        }

        (at == parts.len()).then_some(params)
    }

    /// Build a concrete path by substituting parameter values.
    ///
    /// Values are percent-encoded. A missing required parameter is a
    /// configuration error; a missing optional parameter is omitted along
    /// with its segment.
    pub fn build(&self, params: &[(&str, &str)]) -> Result<String, Error> {
        let mut path = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    path.push('/');
                    path.push_str(lit);
                }
                Segment::Param { name, optional } => {
                    match params.iter().find(|(key, _)| key == name) {
                        Some((_, value)) => {
                            path.push('/');
                            path.push_str(&encode_segment(value));
                        }
                        None if *optional => {}
                        None => {
                            return Err(Error::config(format!(
                                "missing required route parameter '{name}' for '{}'",
                                self.raw
                            )));
                        }
                    }
                }
            }
        }

        if path.is_empty() {
            path.push('/');
        }

        Ok(path)
    }
}

/// Percent-encode a single path segment, leaving RFC 3986 unreserved
/// characters intact.
fn encode_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}
