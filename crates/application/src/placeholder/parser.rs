//! Placeholder parser for `{{ aws:... }}` syntax
//!
//! ```text
//! placeholder   := "{{" ws "aws:" [role-clause] service ":" selector-list "," "attr=" ident ws "}}"
//! role-clause   := "role=" ident ":"
//! selector-list := selector ("," selector)*
//! selector      := ident "=" value
//! ```
//!
//! `{{ ... }}` blocks that do not start with `aws:` belong to other tools and
//! are left alone. A malformed `aws:` placeholder aborts the whole template.

use std::ops::Range;

use indexmap::IndexMap;
use kustforge_domain::alias::is_valid_alias;
use kustforge_domain::{Reference, Service, TemplateSyntaxError};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const PREFIX: &str = "aws:";
const ROLE_CLAUSE: &str = "role=";
const ATTR_KEY: &str = "attr";

/// Parses a template and extracts every `aws:` reference in order of
/// appearance.
///
/// # Errors
///
/// Returns the first malformed placeholder, with its span.
///
/// # Examples
///
/// ```
/// use kustforge_application::placeholder::parse_references;
///
/// let refs = parse_references("host: {{ aws:rds:name=mydb,attr=endpoint }}").unwrap();
/// assert_eq!(refs.len(), 1);
/// assert_eq!(refs[0].selector("name"), Some("mydb"));
/// assert_eq!(refs[0].attribute, "endpoint");
/// assert_eq!(refs[0].span, 6..43);
/// ```
pub fn parse_references(input: &str) -> Result<Vec<Reference>, TemplateSyntaxError> {
    let mut references = Vec::new();
    let mut cursor = 0;

    while let Some(found) = input[cursor..].find(OPEN) {
        let start = cursor + found;
        let inner = start + OPEN.len();
        let body_start = inner + leading_whitespace(&input[inner..]);

        if !input[body_start..].starts_with(PREFIX) {
            cursor = inner;
            continue;
        }

        let Some(close) = input[body_start..].find(CLOSE) else {
            return Err(TemplateSyntaxError::new(
                "unterminated placeholder, expected '}}'",
                start..input.len(),
            ));
        };
        let close = body_start + close;
        let end = close + CLOSE.len();

        if input[body_start..close].contains(OPEN) {
            return Err(TemplateSyntaxError::new(
                "nested '{{' inside placeholder",
                start..end,
            ));
        }

        let body = input[body_start..close].trim_end();
        references.push(parse_placeholder(body, &input[start..end], start..end)?);
        cursor = end;
    }

    Ok(references)
}

fn leading_whitespace(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

fn parse_placeholder(
    body: &str,
    raw_text: &str,
    span: Range<usize>,
) -> Result<Reference, TemplateSyntaxError> {
    let err = |message: String| TemplateSyntaxError::new(message, span.clone());

    let rest = body
        .strip_prefix(PREFIX)
        .ok_or_else(|| err(format!("placeholder must start with '{PREFIX}'")))?
        .trim_start();

    let (role_alias, rest) = match rest.strip_prefix(ROLE_CLAUSE) {
        Some(clause) => {
            let (alias, rest) = clause
                .split_once(':')
                .ok_or_else(|| err("role clause must be followed by ':'".to_string()))?;
            let alias = alias.trim();
            if !is_valid_alias(alias) {
                return Err(err(format!("invalid role alias '{alias}'")));
            }
            (Some(alias.to_string()), rest)
        }
        None => (None, rest),
    };

    let (token, list) = rest
        .split_once(':')
        .ok_or_else(|| err("expected ':' after service".to_string()))?;
    let token = token.trim();
    let service =
        Service::from_token(token).ok_or_else(|| err(format!("unknown service '{token}'")))?;

    let mut selectors = IndexMap::new();
    let mut attribute: Option<String> = None;

    for pair in list.split(',') {
        let pair = pair.trim();
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| err(format!("expected key=value, found '{pair}'")))?;
        let (key, value) = (key.trim(), value.trim());

        if !is_valid_identifier(key) {
            return Err(err(format!("invalid key '{key}'")));
        }
        if !is_valid_value(value) {
            return Err(err(format!("invalid value '{value}' for '{key}'")));
        }

        if key == ATTR_KEY {
            if !is_valid_identifier(value) {
                return Err(err(format!("invalid attribute '{value}'")));
            }
            if attribute.replace(value.to_string()).is_some() {
                return Err(err("duplicate 'attr' clause".to_string()));
            }
            continue;
        }

        if !service.accepts_selector(key) {
            return Err(err(format!("unknown selector '{key}' for {service}")));
        }
        if selectors.insert(key.to_string(), value.to_string()).is_some() {
            return Err(err(format!("duplicate selector '{key}'")));
        }
    }

    let attribute = attribute.ok_or_else(|| err("missing 'attr=' clause".to_string()))?;

    if let Some(missing) = service
        .required_selectors()
        .iter()
        .find(|key| !selectors.contains_key(**key))
    {
        return Err(err(format!("{service} requires selector '{missing}'")));
    }

    Ok(Reference {
        role_alias,
        service,
        selectors,
        attribute,
        raw_text: raw_text.to_string(),
        span,
    })
}

/// Keys and attributes: ASCII letters, digits and `_`.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_valid_value(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}'))
}
