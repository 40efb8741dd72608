use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{
    AggregationError, BoxedAggregator, CaseAggregator, CaseDateAggregator,
    CaseDurationAggregator, CaseValue, CaseVariantAggregator,
};

/// Constructor of a [`BoxedAggregator`] from its (already validated) argument object
pub type AggregatorFactory = fn(&Map<String, Value>) -> Result<BoxedAggregator, AggregationError>;

///
/// Build an aggregator by deserializing its arguments
///
/// Unknown arguments are rejected if `A` denies unknown fields (as all built-in aggregators do).
pub fn deserialize_aggregator<A>(args: &Map<String, Value>) -> Result<BoxedAggregator, AggregationError>
where
    A: CaseAggregator + DeserializeOwned + Clone + 'static,
    A::State: 'static,
    A::Value: Into<CaseValue>,
{
    let aggregator: A = serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| AggregationError::InvalidSpec(format!("invalid aggregator arguments: {e}")))?;
    Ok(Box::new(aggregator))
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

///
/// String-keyed registry of aggregator factories
///
/// The default registry knows `variant` ([`CaseVariantAggregator`]), `case_date`
/// ([`CaseDateAggregator`]) and `case_duration` ([`CaseDurationAggregator`]).
/// Names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct AggregatorRegistry {
    factories: HashMap<String, AggregatorFactory>,
}

impl Default for AggregatorRegistry {
    fn default() -> Self {
        let mut factories: HashMap<String, AggregatorFactory> = HashMap::new();
        factories.insert(
            "variant".to_string(),
            deserialize_aggregator::<CaseVariantAggregator>,
        );
        factories.insert(
            "case_date".to_string(),
            deserialize_aggregator::<CaseDateAggregator>,
        );
        factories.insert(
            "case_duration".to_string(),
            deserialize_aggregator::<CaseDurationAggregator>,
        );
        Self { factories }
    }
}

impl AggregatorRegistry {
    /// A registry without any aggregators
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    ///
    /// Register (or replace) an aggregator factory
    ///
    /// Fails if `name` is empty.
    pub fn register(
        &mut self,
        name: &str,
        factory: AggregatorFactory,
    ) -> Result<(), AggregationError> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(AggregationError::InvalidSpec(
                "aggregator name must not be empty".to_string(),
            ));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Registered aggregator names (sorted)
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    ///
    /// Build an aggregator from a declarative specification
    ///
    /// The specification must be an object `{ "type": <name>, "args": { ... } }`, where
    /// `args` is optional but must be an object if present.
    pub fn build(&self, spec: &Value) -> Result<BoxedAggregator, AggregationError> {
        let spec = spec.as_object().ok_or_else(|| {
            AggregationError::InvalidSpec("specification must be an object".to_string())
        })?;
        let kind = spec.get("type").and_then(Value::as_str).ok_or_else(|| {
            AggregationError::InvalidSpec("field 'type' is missing or not a String".to_string())
        })?;
        let factory = self
            .factories
            .get(&normalize_name(kind))
            .ok_or_else(|| AggregationError::UnknownAggregator(kind.to_string()))?;
        let empty = Map::new();
        let args = match spec.get("args") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(args)) => args,
            Some(_) => {
                return Err(AggregationError::InvalidSpec(
                    "field 'args' must be an object".to_string(),
                ))
            }
        };
        factory(args)
    }
}

///
/// Build an aggregator from a declarative specification using the default
/// [`AggregatorRegistry`]
///
/// ```rust
/// use chatflow_miner::aggregations::build_aggregator_from_spec;
///
/// let agg = build_aggregator_from_spec(&serde_json::json!({
///     "type": "variant",
///     "args": { "ignore_syst": true, "joiner": " -> " }
/// }))
/// .unwrap();
/// assert!(build_aggregator_from_spec(&serde_json::json!({ "type": "median" })).is_err());
/// ```
pub fn build_aggregator_from_spec(spec: &Value) -> Result<BoxedAggregator, AggregationError> {
    AggregatorRegistry::default().build(spec)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unknown_type_is_named_in_error() {
        match build_aggregator_from_spec(&json!({"type": "median"})) {
            Err(AggregationError::UnknownAggregator(name)) => assert_eq!(name, "median"),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn malformed_specs_are_rejected() {
        for spec in [
            json!("variant"),
            json!({"args": {}}),
            json!({"type": 3}),
            json!({"type": "variant", "args": [true]}),
            json!({"type": "variant", "args": {"ignore_system": true}}),
            json!({"type": "case_date", "args": {"joiner": ">"}}),
        ] {
            assert!(
                matches!(build_aggregator_from_spec(&spec), Err(AggregationError::InvalidSpec(_))),
                "{spec} should be rejected"
            );
        }
    }

    #[test]
    fn type_is_trimmed_and_case_insensitive() {
        let agg = build_aggregator_from_spec(&json!({"type": "  CASE_Date ", "args": null})).unwrap();
        assert_eq!(agg.name(), "case_date");
    }

    #[test]
    fn custom_aggregators_can_be_registered() {
        let mut registry = AggregatorRegistry::empty();
        assert!(registry
            .register(" ", deserialize_aggregator::<CaseDateAggregator>)
            .is_err());
        registry
            .register("First_Day", deserialize_aggregator::<CaseDateAggregator>)
            .unwrap();
        assert_eq!(registry.names(), vec!["first_day"]);
        assert!(registry.build(&json!({"type": "first_day"})).is_ok());
        assert!(registry.build(&json!({"type": "variant"})).is_err());
    }
}
