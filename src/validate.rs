use crate::error::Error;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Which part of the request a route's rules are checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Body,
    Query,
    Params,
}

#[derive(Debug, Clone)]
enum Rule {
    Required,
    Str,
    Email,
    Min(f64),
    Max(f64),
}

/// A parsed rule-set: ordered fields, each with an ordered rule list.
///
/// Rule specs are pipe-delimited, optionally parameterized with `:`, e.g.
/// `"required|email"` or `"required|min:2"`.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    fields: Vec<(String, Vec<Rule>)>,
}

impl Rules {
    /// Parse a rule-set from `(field, spec)` pairs.
    ///
    /// Unknown rule names and malformed parameters are configuration
    /// errors, reported at parse time so a bad rule-set never reaches
    /// request serving.
    pub fn parse(specs: &[(&str, &str)]) -> Result<Rules, Error> {
        let mut fields = Vec::with_capacity(specs.len());

        for (field, spec) in specs {
            let mut rules = Vec::new();
            for part in spec.split('|').filter(|part| !part.is_empty()) {
                let (name, arg) = match part.split_once(':') {
                    Some((name, arg)) => (name, Some(arg)),
                    None => (part, None),
                };

                let rule = match (name, arg) {
                    ("required", None) => Rule::Required,
                    ("string", None) => Rule::Str,
                    ("email", None) => Rule::Email,
                    ("min", Some(arg)) => Rule::Min(parse_bound(field, name, arg)?),
                    ("max", Some(arg)) => Rule::Max(parse_bound(field, name, arg)?),
                    _ => {
                        return Err(Error::config(format!(
                            "unknown validation rule '{part}' for field '{field}'"
                        )));
                    }
                };
                rules.push(rule);
            }
            fields.push(((*field).to_owned(), rules));
        }

        Ok(Rules { fields })
    }

    /// Check `data` against the rule-set, collecting every violation.
    ///
    /// All fields are checked; an empty map means the data passed.
    pub fn validate(&self, data: &Map<String, Value>) -> BTreeMap<String, Vec<String>> {
        let mut violations: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (field, rules) in &self.fields {
            let value = data.get(field);
            for rule in rules {
                if let Some(message) = check(field, rule, value) {
                    violations.entry(field.clone()).or_default().push(message);
                }
            }
        }

        violations
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn parse_bound(field: &str, name: &str, arg: &str) -> Result<f64, Error> {
    arg.parse().map_err(|_| {
        Error::config(format!(
            "rule '{name}:{arg}' for field '{field}' needs a numeric parameter"
        ))
    })
}

fn check(field: &str, rule: &Rule, value: Option<&Value>) -> Option<String> {
    // An absent or empty value only ever violates `required`; bounds and
    // format rules are not meaningful against nothing.
    if is_empty(value) {
        return match rule {
            Rule::Required => Some(format!("The {field} field is required.")),
            _ => None,
        };
    }
    let value = value?;

    match rule {
        Rule::Required => None,
        Rule::Str => match value {
            Value::String(_) => None,
            _ => Some(format!("The {field} field must be a string.")),
        },
        Rule::Email => match value {
            Value::String(s) if is_email(s) => None,
            _ => Some(format!("The {field} field must be a valid email address.")),
        },
        Rule::Min(min) => match measure(value) {
            Some(Measure::Chars(len)) if (len as f64) < *min => Some(format!(
                "The {field} field must be at least {min} characters."
            )),
            Some(Measure::Number(n)) if n < *min => {
                Some(format!("The {field} field must be at least {min}."))
            }
            _ => None,
        },
        Rule::Max(max) => match measure(value) {
            Some(Measure::Chars(len)) if (len as f64) > *max => Some(format!(
                "The {field} field must not be greater than {max} characters."
            )),
            Some(Measure::Number(n)) if n > *max => {
                Some(format!("The {field} field must not be greater than {max}."))
            }
            _ => None,
        },
    }
}

enum Measure {
    Chars(usize),
    Number(f64),
}

/// Length for strings, magnitude for numbers; other types have no
/// meaningful bound.
fn measure(value: &Value) -> Option<Measure> {
    match value {
        Value::String(s) => Some(Measure::Chars(s.chars().count())),
        Value::Number(n) => n.as_f64().map(Measure::Number),
        _ => None,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Basic shape check: one `@`, non-empty local part, domain with an
/// interior dot.
fn is_email(value: &str) -> bool {
    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();

    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !value.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn unknown_rule_is_rejected_at_parse() {
        assert!(Rules::parse(&[("name", "requierd")]).is_err());
        assert!(Rules::parse(&[("name", "min:two")]).is_err());
    }

    #[test]
    fn required_reports_absent_and_empty() {
        let rules = Rules::parse(&[("name", "required")]).unwrap();
        assert!(!rules.validate(&data(json!({}))).is_empty());
        assert!(!rules.validate(&data(json!({ "name": "" }))).is_empty());
        assert!(!rules.validate(&data(json!({ "name": null }))).is_empty());
        assert!(rules.validate(&data(json!({ "name": "ok" }))).is_empty());
    }

    #[test]
    fn bounds_follow_value_type() {
        let rules = Rules::parse(&[("n", "min:2|max:5")]).unwrap();
        assert!(rules.validate(&data(json!({ "n": "abc" }))).is_empty());
        assert!(!rules.validate(&data(json!({ "n": "a" }))).is_empty());
        assert!(!rules.validate(&data(json!({ "n": "abcdef" }))).is_empty());
        assert!(rules.validate(&data(json!({ "n": 3 }))).is_empty());
        assert!(!rules.validate(&data(json!({ "n": 1 }))).is_empty());
        assert!(!rules.validate(&data(json!({ "n": 9 }))).is_empty());
    }

    #[test]
    fn email_shape() {
        let rules = Rules::parse(&[("email", "email")]).unwrap();
        assert!(rules
            .validate(&data(json!({ "email": "a@example.com" })))
            .is_empty());
        for bad in ["a", "a@", "@example.com", "a@example", "a b@example.com"] {
            assert!(
                !rules.validate(&data(json!({ "email": bad }))).is_empty(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn violations_accumulate_across_fields_in_order() {
        let rules =
            Rules::parse(&[("email", "required|email"), ("name", "required|min:2")]).unwrap();
        let violations = rules.validate(&data(json!({})));
        assert_eq!(violations.len(), 2);
        assert!(violations.contains_key("email"));
        assert!(violations.contains_key("name"));
    }

    #[test]
    fn rules_run_in_listed_order() {
        let rules = Rules::parse(&[("name", "string|min:3")]).unwrap();
        let violations = rules.validate(&data(json!({ "name": 1 })));
        let messages = &violations["name"];
        assert_eq!(messages[0], "The name field must be a string.");
    }
}
