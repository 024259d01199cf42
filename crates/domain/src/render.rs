//! Substitution of resolved values into template text

use std::collections::HashMap;

use crate::error::{DomainError, DomainResult};
use crate::reference::{CanonicalKey, Reference};

/// Replaces every reference span with its resolved value.
///
/// Spans are applied right to left so that earlier offsets stay valid; all
/// bytes outside the spans are copied unchanged. Every reference must have a
/// value, otherwise nothing is rendered.
///
/// # Errors
///
/// Returns an error if a value is missing, a span does not match the
/// reference's raw text, or two spans overlap.
pub fn render(
    template: &str,
    references: &[Reference],
    values: &HashMap<CanonicalKey, String>,
) -> DomainResult<String> {
    let mut ordered: Vec<(&Reference, &String)> = Vec::with_capacity(references.len());
    for reference in references {
        if template.get(reference.span.clone()) != Some(reference.raw_text.as_str()) {
            return Err(DomainError::SpanMismatch {
                start: reference.span.start,
                end: reference.span.end,
                raw_text: reference.raw_text.clone(),
            });
        }
        let value = values
            .get(&reference.canonical_key())
            .ok_or_else(|| DomainError::MissingValue(reference.raw_text.clone()))?;
        ordered.push((reference, value));
    }

    ordered.sort_by(|(a, _), (b, _)| b.span.start.cmp(&a.span.start));

    let mut output = template.to_string();
    let mut limit = template.len();
    for (reference, value) in ordered {
        if reference.span.end > limit {
            return Err(DomainError::OverlappingSpans(reference.span.start));
        }
        output.replace_range(reference.span.clone(), value);
        limit = reference.span.start;
    }

    Ok(output)
}
