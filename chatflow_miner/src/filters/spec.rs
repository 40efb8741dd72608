//! Declarative filter specifications
//!
//! A [`FilterSpec`] is a serializable description of a [`Filter`] tree, e.g. as read from a
//! JSON session configuration:
//!
//! ```json
//! { "type": "and",
//!   "left":  { "type": "agent", "agent": "ai" },
//!   "right": { "type": "not", "inner": { "type": "case_has_activity", "activity": "escalate" } } }
//! ```
use serde::{Deserialize, Serialize};

use crate::table::io::infer_value;

use super::{
    AgentFilter, CaseFilter, CaseHasActivityFilter, DirectlyFollowsFilter,
    EventuallyFollowsFilter, Filter, FilterError, TimeWindowFilter,
};

fn default_true() -> bool {
    true
}

fn default_mode() -> String {
    "touches".to_string()
}

///
/// Serializable description of a [`Filter`]
///
/// Validation (agent names, window bounds and modes) happens in [`FilterSpec::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// See [`AgentFilter`]
    Agent {
        /// `ai` or `human`
        agent: String,
        /// Always keep system events (default: `true`)
        #[serde(default = "default_true")]
        include_syst: bool,
    },
    /// See [`CaseHasActivityFilter`]
    CaseHasActivity {
        /// Activity label
        activity: String,
    },
    /// See [`TimeWindowFilter`]
    TimeWindow {
        /// Lower bound (optional)
        #[serde(default)]
        start: Option<String>,
        /// Upper bound (optional)
        #[serde(default)]
        end: Option<String>,
        /// `touches` (default) or `inside`
        #[serde(default = "default_mode")]
        mode: String,
    },
    /// See [`CaseFilter`]
    Case {
        /// Selected case identifiers
        case_ids: Vec<String>,
        /// Infer the type of the identifiers like CSV cells (e.g. `"7"` matches the integer 7)
        #[serde(default)]
        infer_types: bool,
    },
    /// See [`DirectlyFollowsFilter`]
    DirectlyFollows {
        /// Predecessor activity
        a: String,
        /// Successor activity
        b: String,
    },
    /// See [`EventuallyFollowsFilter`]
    EventuallyFollows {
        /// Predecessor activity
        a: String,
        /// Successor activity
        b: String,
    },
    /// Both children
    And {
        /// Left child
        left: Box<FilterSpec>,
        /// Right child
        right: Box<FilterSpec>,
    },
    /// At least one child
    Or {
        /// Left child
        left: Box<FilterSpec>,
        /// Right child
        right: Box<FilterSpec>,
    },
    /// Negated child
    Not {
        /// Child
        inner: Box<FilterSpec>,
    },
}

impl FilterSpec {
    ///
    /// Build the described [`Filter`]
    ///
    pub fn build(&self) -> Result<Filter, FilterError> {
        Ok(match self {
            FilterSpec::Agent {
                agent,
                include_syst,
            } => AgentFilter::new(agent, *include_syst)?.into(),
            FilterSpec::CaseHasActivity { activity } => {
                CaseHasActivityFilter::new(activity.as_str()).into()
            }
            FilterSpec::TimeWindow { start, end, mode } => {
                TimeWindowFilter::from_strs(start.as_deref(), end.as_deref(), mode)?.into()
            }
            FilterSpec::Case {
                case_ids,
                infer_types,
            } => {
                if *infer_types {
                    CaseFilter::new(case_ids.iter().map(|id| infer_value(id))).into()
                } else {
                    CaseFilter::new(case_ids.iter().map(String::as_str)).into()
                }
            }
            FilterSpec::DirectlyFollows { a, b } => {
                DirectlyFollowsFilter::new(a.as_str(), b.as_str()).into()
            }
            FilterSpec::EventuallyFollows { a, b } => {
                EventuallyFollowsFilter::new(a.as_str(), b.as_str()).into()
            }
            FilterSpec::And { left, right } => left.build()?.and(right.build()?),
            FilterSpec::Or { left, right } => left.build()?.or(right.build()?),
            FilterSpec::Not { inner } => inner.build()?.negated(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::AttributeValue;

    #[test]
    fn nested_spec_from_json() {
        let spec: FilterSpec = serde_json::from_str(
            r#"{ "type": "and",
                 "left":  { "type": "agent", "agent": "AI" },
                 "right": { "type": "not", "inner": { "type": "case_has_activity", "activity": "escalate" } } }"#,
        )
        .unwrap();
        let filter = spec.build().unwrap();
        let expected = Filter::from(AgentFilter::new("ai", true).unwrap())
            .and(Filter::from(CaseHasActivityFilter::new("escalate")).negated());
        assert_eq!(filter, expected);
    }

    #[test]
    fn invalid_arguments_fail_on_build() {
        let spec: FilterSpec =
            serde_json::from_str(r#"{ "type": "time_window", "start": "2024-01-01", "mode": "around" }"#)
                .unwrap();
        assert!(matches!(spec.build(), Err(FilterError::InvalidArgument(_))));
        assert!(serde_json::from_str::<FilterSpec>(r#"{ "type": "agent", "agnet": "ai" }"#).is_err());
        assert!(serde_json::from_str::<FilterSpec>(r#"{ "type": "sample" }"#).is_err());
    }

    #[test]
    fn case_ids_are_strings_unless_inferred() {
        let spec: FilterSpec =
            serde_json::from_str(r#"{ "type": "case", "case_ids": ["7", "conv-1"] }"#).unwrap();
        match spec.build().unwrap() {
            Filter::Case(f) => assert!(f.case_ids().contains(&AttributeValue::from("7"))),
            other => panic!("Unexpected filter: {other:?}"),
        }
        let spec: FilterSpec = serde_json::from_str(
            r#"{ "type": "case", "case_ids": ["7", "conv-1"], "infer_types": true }"#,
        )
        .unwrap();
        match spec.build().unwrap() {
            Filter::Case(f) => {
                assert!(f.case_ids().contains(&AttributeValue::Int(7)));
                assert!(f.case_ids().contains(&AttributeValue::from("conv-1")));
            }
            other => panic!("Unexpected filter: {other:?}"),
        }
    }
}
