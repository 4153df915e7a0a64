//! Placeholder references
//!
//! A payload value of the form `temp:<item-id>` stands in for the server id
//! that the named queue item will produce once it syncs.

use super::ids::ItemId;
use serde_json::Value;
use std::fmt;

/// Prefix marking a placeholder reference
pub const PLACEHOLDER_PREFIX: &str = "temp:";

/// A reference to the server id of a not-yet-synced queue item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder(ItemId);

impl Placeholder {
    /// Placeholder pointing at the given producing item
    pub fn for_item(id: &ItemId) -> Self {
        Self(id.clone())
    }

    /// Parse a string value; only whole-value placeholders count
    pub fn parse(s: &str) -> Option<Self> {
        let local = s.strip_prefix(PLACEHOLDER_PREFIX)?;
        if local.is_empty() {
            return None;
        }
        Some(Self(ItemId::new(local)))
    }

    /// Parse a JSON value
    pub fn from_json(value: &Value) -> Option<Self> {
        value.as_str().and_then(Self::parse)
    }

    /// The queue item expected to produce the real identifier
    pub fn item_id(&self) -> &ItemId {
        &self.0
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PLACEHOLDER_PREFIX, self.0)
    }
}

/// Collect every placeholder in a payload, depth-first, without duplicates
pub fn collect_placeholders(value: &Value) -> Vec<Placeholder> {
    let mut found = Vec::new();
    walk(value, &mut found);
    found
}

fn walk(value: &Value, found: &mut Vec<Placeholder>) {
    match value {
        Value::String(s) => {
            if let Some(p) = Placeholder::parse(s) {
                if !found.contains(&p) {
                    found.push(p);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| walk(v, found)),
        Value::Object(map) => map.values().for_each(|v| walk(v, found)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_display() {
        let p = Placeholder::parse("temp:Q1").unwrap();
        assert_eq!(p.item_id().as_str(), "Q1");
        assert_eq!(p.to_string(), "temp:Q1");

        assert!(Placeholder::parse("temp:").is_none());
        assert!(Placeholder::parse("Q1").is_none());
        assert!(Placeholder::parse("xtemp:Q1").is_none());
    }

    #[test]
    fn test_collect_nested_and_deduplicated() {
        let payload = json!({
            "id_paciente": "temp:Q1",
            "motivo": "control",
            "contactos": [{ "id_paciente": "temp:Q1" }, { "ref": "temp:Q3" }],
            "nota": "see temp:Q9 later"
        });

        let found = collect_placeholders(&payload);
        let ids: Vec<&str> = found.iter().map(|p| p.item_id().as_str()).collect();
        assert_eq!(found.len(), 2);
        assert!(ids.contains(&"Q1"));
        assert!(ids.contains(&"Q3"));
    }
}
