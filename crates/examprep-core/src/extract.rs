//! Structured payload extraction from free-form model output
//!
//! Models often wrap JSON in prose or markdown fences, or return the inner
//! list without the requested wrapper. [`extract`] strips that noise and
//! coerces the payload into the expected top-level shape.
//!
//! The payload is located with "first open marker, last close marker"
//! rather than balanced scanning, so a brace or bracket inside string
//! content outside the real payload will still break extraction.

use serde_json::{Value, json};
use tracing::debug;

/// Title given to a bare question list wrapped into a quiz object
pub const FALLBACK_QUIZ_TITLE: &str = "Practice Quiz";

const FENCE: &str = "```";

/// Expected top-level JSON shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTarget {
    Object,
    Array,
}

impl ExtractionTarget {
    fn markers(self) -> (char, char) {
        match self {
            Self::Object => ('{', '}'),
            Self::Array => ('[', ']'),
        }
    }

    fn other(self) -> Self {
        match self {
            Self::Object => Self::Array,
            Self::Array => Self::Object,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("AI response did not contain valid JSON: no structured payload located")]
    NoPayload,

    #[error("AI response contained malformed JSON: {0}")]
    Parse(String),
}

/// Extract a JSON value of shape `target` from `raw`.
///
/// When only the other shape is present it is wrapped: an array becomes
/// `{"title": "Practice Quiz", "questions": [...]}` for an object target, an
/// object becomes a single-element array for an array target. Malformed
/// JSON is reported, never repaired.
pub fn extract(raw: &str, target: ExtractionTarget) -> Result<Value, ExtractionError> {
    let candidate = strip_fence(raw.trim());
    let fallback = target.other();

    // The shape that opens first encloses the payload
    let slice = match (locate(candidate, target), locate(candidate, fallback)) {
        (Some((start, slice)), other) if other.is_none_or(|(s, _)| start < s) => {
            return parse(slice);
        }
        (_, Some((_, slice))) => slice,
        (_, None) => {
            // An opening marker with no usable close is malformed, not absent
            let tail =
                unterminated(candidate, target).or_else(|| unterminated(candidate, fallback));
            return Err(tail
                .and_then(|t| parse(t).err())
                .unwrap_or(ExtractionError::NoPayload));
        }
    };

    debug!("Expected {:?} payload, wrapping {:?} instead", target, fallback);
    let inner = parse(slice)?;
    Ok(match target {
        ExtractionTarget::Object => json!({
            "title": FALLBACK_QUIZ_TITLE,
            "questions": inner,
        }),
        ExtractionTarget::Array => Value::Array(vec![inner]),
    })
}

/// Take the body of a leading fenced block, dropping a language tag
fn strip_fence(text: &str) -> &str {
    if !text.starts_with(FENCE) {
        return text;
    }
    let mut segments = text.split(FENCE);
    let (Some(_), Some(body), Some(_)) = (segments.next(), segments.next(), segments.next()) else {
        return text;
    };

    let tag_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    if tag_len > 0 && tag_len < body.len() {
        &body[tag_len..]
    } else {
        body
    }
}

/// First open marker through the last close marker, inclusive, with the
/// offset of the open marker
fn locate(text: &str, target: ExtractionTarget) -> Option<(usize, &str)> {
    let (open, close) = target.markers();
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| (start, &text[start..=end]))
}

/// From the first open marker to the end of the text
fn unterminated(text: &str, target: ExtractionTarget) -> Option<&str> {
    let (open, _) = target.markers();
    text.find(open).map(|start| &text[start..])
}

fn parse(slice: &str) -> Result<Value, ExtractionError> {
    serde_json::from_str(slice).map_err(|e| ExtractionError::Parse(e.to_string()))
}
