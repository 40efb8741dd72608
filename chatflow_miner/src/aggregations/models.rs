use chrono::TimeDelta;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

///
/// Information about one variant (distinct activity sequence) of an event table
///
/// Two cases with the same variant String always share the same [`VariantInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantInfo {
    /// Display identifier (`"variant 1"` is the most frequent variant)
    pub variant_id: String,
    /// Content-derived identifier, stable across tables
    pub variant_key: Uuid,
    /// Activity labels joined by the aggregator's joiner
    pub variant: String,
    /// Number of cases with this variant
    pub frequency: usize,
    /// Number of activities in the variant
    pub length: usize,
}

impl VariantInfo {
    /// Content-derived key for a variant String (UUID v5)
    pub fn key_for(variant: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, variant.as_bytes())
    }
}

fn serialize_seconds<S: Serializer>(d: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.num_milliseconds() as f64 / 1000.0)
}

///
/// Per-case result of one of the built-in aggregators
///
/// Used where aggregators are chosen at runtime (see
/// [`build_aggregator_from_spec`](super::build_aggregator_from_spec)).
/// Serializes without a tag: variants as objects, dates as Strings (or `null`), durations in
/// seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CaseValue {
    /// Result of [`CaseVariantAggregator`](super::CaseVariantAggregator)
    Variant(VariantInfo),
    /// Result of [`CaseDateAggregator`](super::CaseDateAggregator)
    Date(Option<String>),
    /// Result of [`CaseDurationAggregator`](super::CaseDurationAggregator)
    Duration(#[serde(serialize_with = "serialize_seconds")] TimeDelta),
}

impl From<VariantInfo> for CaseValue {
    fn from(value: VariantInfo) -> Self {
        Self::Variant(value)
    }
}

impl From<Option<String>> for CaseValue {
    fn from(value: Option<String>) -> Self {
        Self::Date(value)
    }
}

impl From<TimeDelta> for CaseValue {
    fn from(value: TimeDelta) -> Self {
        Self::Duration(value)
    }
}

impl CaseValue {
    /// Returns the variant information, if this is a variant value
    pub fn try_as_variant(&self) -> Option<&VariantInfo> {
        match self {
            CaseValue::Variant(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the ISO date, if this is a (non-missing) date value
    pub fn try_as_date(&self) -> Option<&str> {
        match self {
            CaseValue::Date(d) => d.as_deref(),
            _ => None,
        }
    }

    /// Returns the duration, if this is a duration value
    pub fn try_as_duration(&self) -> Option<&TimeDelta> {
        match self {
            CaseValue::Duration(d) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_key_depends_on_content_only() {
        assert_eq!(
            VariantInfo::key_for("greet>answer"),
            VariantInfo::key_for("greet>answer")
        );
        assert_ne!(
            VariantInfo::key_for("greet>answer"),
            VariantInfo::key_for("answer>greet")
        );
    }

    #[test]
    fn case_values_serialize_untagged() {
        let d = CaseValue::from(TimeDelta::milliseconds(1500));
        assert_eq!(serde_json::to_string(&d).unwrap(), "1.5");
        let date = CaseValue::from(Some("2024-03-04".to_string()));
        assert_eq!(serde_json::to_string(&date).unwrap(), "\"2024-03-04\"");
        assert_eq!(serde_json::to_string(&CaseValue::Date(None)).unwrap(), "null");
    }
}
