use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Category of a test execution as labelled by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TestType {
    Inquiry,
    Compare,
    /// Emitted as either `order` or the older `purchase`.
    Order,
    Unknown,
}

impl TestType {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inquiry" => Self::Inquiry,
            "compare" => Self::Compare,
            "order" | "purchase" => Self::Order,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inquiry => "inquiry",
            Self::Compare => "compare",
            Self::Order => "order",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TestType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TestType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::Unknown, Self::from_wire))
    }
}

/// Identity of one execution for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestKey {
    pub index: u64,
    #[serde(rename = "type")]
    pub test_type: TestType,
}

impl TestKey {
    pub fn new(index: u64, test_type: TestType) -> Self {
        Self { index, test_type }
    }
}

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.index, self.test_type)
    }
}

#[cfg(test)]
mod tests {
    use super::{TestKey, TestType};

    #[test]
    fn unit_test_type_from_wire_folds_purchase_into_order() {
        assert_eq!(TestType::from_wire("purchase"), TestType::Order);
        assert_eq!(TestType::from_wire("order"), TestType::Order);
        assert_eq!(TestType::from_wire(" Inquiry "), TestType::Inquiry);
        assert_eq!(TestType::from_wire("compare"), TestType::Compare);
        assert_eq!(TestType::from_wire("smalltalk"), TestType::Unknown);
    }

    #[test]
    fn unit_test_key_display_matches_backend_key_shape() {
        let key = TestKey::new(7, TestType::Compare);
        assert_eq!(key.to_string(), "7-compare");
    }

    #[test]
    fn functional_test_key_deserializes_from_wire_object() {
        let key: TestKey =
            serde_json::from_str(r#"{"index": 3, "type": "purchase"}"#).expect("decode key");
        assert_eq!(key, TestKey::new(3, TestType::Order));
        let encoded = serde_json::to_value(key).expect("encode key");
        assert_eq!(encoded["type"], "order");
    }

    #[test]
    fn regression_test_type_null_decodes_as_unknown() {
        let key: TestKey =
            serde_json::from_str(r#"{"index": 0, "type": null}"#).expect("decode key");
        assert_eq!(key.test_type, TestType::Unknown);
    }
}
