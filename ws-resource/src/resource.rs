use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount sentinel meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// A quantity of a single resource type.
///
/// Resources are matched by `type_id` only; `amount` and `unit` take part in
/// the arithmetic done by the owning [`crate::ResourceType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub type_id: String,
    pub amount: i64,
    pub unit: String,
}

impl Resource {
    pub fn new(type_id: impl Into<String>, amount: i64, unit: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            amount,
            unit: unit.into(),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.amount == UNLIMITED
    }
}

impl fmt::Display for Resource {
    /// Renders the amount for user-facing messages, e.g. `2048MB`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unlimited() {
            write!(f, "unlimited")
        } else {
            write!(f, "{}{}", self.amount, self.unit.to_uppercase())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_upper_case_unit() {
        assert_eq!(Resource::new("RAM", 2048, "mb").to_string(), "2048MB");
        assert_eq!(Resource::new("RAM", UNLIMITED, "mb").to_string(), "unlimited");
    }

    #[test]
    fn test_serializes_type_field() {
        let json = serde_json::to_value(Resource::new("RAM", 1, "mb")).unwrap();
        assert_eq!(json["type"], "RAM");
        assert_eq!(json["amount"], 1);
    }
}
