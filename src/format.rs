//! Rendering of the model's JSON answer into readable text blocks.
//!
//! The generator is asked for a JSON list of location records, but its output
//! is never trusted: fences are stripped, a lone object is promoted to a list,
//! and anything that still fails to parse is shown verbatim under an error
//! line. Formatting never fails.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Placeholder for a missing field
pub const MISSING: &str = "N/A";

/// One filming location as returned by the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationAnswer {
    /// Place name
    #[serde(rename = "장소", default, deserialize_with = "lenient_text")]
    pub place: Option<String>,
    /// Street address
    #[serde(rename = "주소", default, deserialize_with = "lenient_text")]
    pub address: Option<String>,
    /// Scene filmed at the place
    #[serde(rename = "장면_설명", default, deserialize_with = "lenient_text")]
    pub scene_description: Option<String>,
    /// Description of the place itself
    #[serde(rename = "장소_설명", default, deserialize_with = "lenient_text")]
    pub location_description: Option<String>,
    /// Latitude
    #[serde(rename = "위도", default, deserialize_with = "lenient_coordinate")]
    pub latitude: Option<f64>,
    /// Longitude
    #[serde(rename = "경도", default, deserialize_with = "lenient_coordinate")]
    pub longitude: Option<f64>,
}

impl LocationAnswer {
    /// Render as a numbered block
    #[must_use]
    pub fn render(&self, number: usize) -> String {
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| MISSING.to_string());
        let mut block = format!(
            "=== 결과 {number} ===\n장소: {}\n주소: {}\n장면설명: {}\n장소설명: {}",
            field(&self.place),
            field(&self.address),
            field(&self.scene_description),
            field(&self.location_description),
        );
        if let (Some(lat), Some(lng)) = (self.latitude, self.longitude) {
            block.push_str(&format!("\n좌표: {lat}, {lng}"));
        }
        block
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    // Present strings are kept verbatim, even when blank
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

/// Outcome of parsing a raw model answer
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAnswer {
    /// Structured location records, in model order
    Locations(Vec<LocationAnswer>),
    /// The answer could not be interpreted
    Unparsed {
        /// Original text
        raw: String,
        /// Reason parsing failed
        error: String,
    },
}

/// Parse a raw answer into location records
#[must_use]
pub fn parse_answer(raw: &str) -> ParsedAnswer {
    let body = strip_code_fence(raw);
    let unparsed = |error: String| ParsedAnswer::Unparsed {
        raw: raw.to_string(),
        error,
    };

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => return unparsed(e.to_string()),
    };

    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => return unparsed("expected a list of location objects".to_string()),
    };

    let mut locations = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_object() {
            return unparsed("list item is not an object".to_string());
        }
        match serde_json::from_value(item) {
            Ok(location) => locations.push(location),
            Err(e) => return unparsed(e.to_string()),
        }
    }
    ParsedAnswer::Locations(locations)
}

/// Render a raw answer for display
#[must_use]
pub fn format_answer(raw: &str) -> String {
    match parse_answer(raw) {
        ParsedAnswer::Locations(locations) => locations
            .iter()
            .enumerate()
            .map(|(i, location)| location.render(i + 1))
            .collect::<Vec<_>>()
            .join("\n\n"),
        ParsedAnswer::Unparsed { raw, error } => {
            tracing::warn!(%error, "could not parse model answer; showing raw text");
            format!("[응답을 해석하지 못했습니다: {error}]\n{raw}")
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening line
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
