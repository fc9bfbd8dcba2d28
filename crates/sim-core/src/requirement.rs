//! Declarative requirement predicates used to gate services, upgrades,
//! staff, campaigns and events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Comparison operator for numeric requirements, applied as
/// `snapshot_value <op> requirement.value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
}

impl Operator {
    pub fn compare(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Gte => lhs >= rhs,
            Operator::Lte => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Lt => lhs < rhs,
            Operator::Eq => lhs == rhs,
        }
    }
}

fn default_expected() -> bool {
    true
}

/// The predicate part of a requirement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RequirementKind {
    Flag {
        id: String,
        #[serde(default = "default_expected")]
        expected: bool,
    },
    Metric {
        id: String,
        operator: Operator,
        value: f64,
    },
    Upgrade {
        id: String,
        operator: Operator,
        value: f64,
    },
    Staff {
        id: String,
        operator: Operator,
        value: f64,
    },
    /// Any `type` this build does not know. Always evaluates to `false`.
    #[serde(other)]
    Unsupported,
}

/// What callers should do with an affordance whose requirements fail.
/// The evaluator itself ignores it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnFail {
    Hide,
    Lock,
}

/// A requirement as it appears in configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    #[serde(flatten)]
    pub kind: RequirementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_fail: Option<OnFail>,
}

impl From<RequirementKind> for Requirement {
    fn from(kind: RequirementKind) -> Self {
        Self {
            kind,
            on_fail: None,
        }
    }
}

/// Read-only view of the state that requirements are checked against.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RequirementSnapshot {
    pub flags: BTreeMap<String, bool>,
    /// Metric values by camelCase name.
    pub metrics: BTreeMap<String, f64>,
    /// Purchased level per upgrade id.
    pub upgrades: BTreeMap<String, u32>,
    /// Hired headcount per staff role id.
    pub staff: BTreeMap<String, u32>,
}

/// Evaluate one requirement. Total: never panics, unknown kinds are `false`.
pub fn evaluate(requirement: &Requirement, snapshot: &RequirementSnapshot) -> bool {
    match &requirement.kind {
        RequirementKind::Flag { id, expected } => snapshot.flags.get(id) == Some(expected),
        RequirementKind::Metric {
            id,
            operator,
            value,
        } => snapshot
            .metrics
            .get(id)
            .is_some_and(|v| operator.compare(*v, *value)),
        RequirementKind::Upgrade {
            id,
            operator,
            value,
        } => {
            let level = snapshot.upgrades.get(id).copied().unwrap_or(0);
            operator.compare(f64::from(level), *value)
        }
        RequirementKind::Staff {
            id,
            operator,
            value,
        } => {
            let count = snapshot.staff.get(id).copied().unwrap_or(0);
            operator.compare(f64::from(count), *value)
        }
        RequirementKind::Unsupported => false,
    }
}

/// Logical AND over `requirements`. `None` or an empty list is satisfied.
pub fn evaluate_all(requirements: Option<&[Requirement]>, snapshot: &RequirementSnapshot) -> bool {
    requirements
        .unwrap_or_default()
        .iter()
        .all(|r| evaluate(r, snapshot))
}

/// The first failing requirement, if any.
pub fn first_failure<'a>(
    requirements: &'a [Requirement],
    snapshot: &RequirementSnapshot,
) -> Option<&'a Requirement> {
    requirements.iter().find(|r| !evaluate(r, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot() -> RequirementSnapshot {
        let mut s = RequirementSnapshot::default();
        s.flags.insert("tutorialDone".into(), true);
        s.flags.insert("lawsuit".into(), false);
        s.metrics.insert("cash".into(), 1200.0);
        s.metrics.insert("level".into(), 3.0);
        s.upgrades.insert("massageTable".into(), 2);
        s.staff.insert("receptionist".into(), 1);
        s
    }

    fn parse(json: &str) -> Requirement {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn flag_defaults_to_expected_true() {
        let s = snapshot();
        assert!(evaluate(&parse(r#"{"type":"flag","id":"tutorialDone"}"#), &s));
        assert!(evaluate(
            &parse(r#"{"type":"flag","id":"lawsuit","expected":false}"#),
            &s
        ));
        assert!(!evaluate(&parse(r#"{"type":"flag","id":"lawsuit"}"#), &s));
    }

    #[test]
    fn missing_flag_fails_even_when_expecting_false() {
        let s = snapshot();
        assert!(!evaluate(
            &parse(r#"{"type":"flag","id":"unknown","expected":false}"#),
            &s
        ));
    }

    #[test]
    fn numeric_operators() {
        let s = snapshot();
        let metric = |id: &str, op: &str, v: f64| {
            let json = format!(r#"{{"type":"metric","id":"{id}","operator":"{op}","value":{v}}}"#);
            evaluate(&parse(&json), &s)
        };
        assert!(metric("cash", ">=", 1200.0));
        assert!(!metric("cash", ">", 1200.0));
        assert!(metric("level", "==", 3.0));
        assert!(metric("level", "<", 4.0));
        assert!(metric("level", "<=", 3.0));
    }

    #[test]
    fn missing_metric_fails() {
        let s = snapshot();
        assert!(!evaluate(
            &parse(r#"{"type":"metric","id":"karma","operator":"<","value":1}"#),
            &s
        ));
    }

    #[test]
    fn upgrade_and_staff_default_to_zero() {
        let s = snapshot();
        let check = |kind: &str, id: &str, op: &str, v: u32| {
            let json = format!(r#"{{"type":"{kind}","id":"{id}","operator":"{op}","value":{v}}}"#);
            evaluate(&parse(&json), &s)
        };
        assert!(check("upgrade", "massageTable", ">=", 2));
        assert!(check("upgrade", "sauna", "==", 0));
        assert!(check("staff", "receptionist", ">", 0));
        assert!(!check("staff", "therapist", ">=", 1));
    }

    #[test]
    fn unknown_type_is_false_not_an_error() {
        let r = parse(r#"{"type":"moonPhase","id":"full","onFail":"hide"}"#);
        assert_eq!(r.kind, RequirementKind::Unsupported);
        assert_eq!(r.on_fail, Some(OnFail::Hide));
        assert!(!evaluate(&r, &snapshot()));
    }

    #[test]
    fn evaluate_all_is_conjunction() {
        let s = snapshot();
        let reqs = vec![
            parse(r#"{"type":"flag","id":"tutorialDone"}"#),
            parse(r#"{"type":"metric","id":"cash","operator":">=","value":5000,"onFail":"lock"}"#),
        ];
        assert!(!evaluate_all(Some(reqs.as_slice()), &s));
        assert!(evaluate_all(Some(&reqs[..1]), &s));
        assert!(evaluate_all(None, &s));
        assert!(evaluate_all(Some(&[][..]), &s));
        assert_eq!(first_failure(&reqs, &s).and_then(|r| r.on_fail), Some(OnFail::Lock));
    }

    fn operator() -> impl Strategy<Value = Operator> {
        prop_oneof![
            Just(Operator::Gte),
            Just(Operator::Lte),
            Just(Operator::Gt),
            Just(Operator::Lt),
            Just(Operator::Eq),
        ]
    }

    /// Ids that exist in [`snapshot`] mixed with ones that do not.
    fn id() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "cash",
            "level",
            "tutorialDone",
            "lawsuit",
            "massageTable",
            "receptionist",
            "karma",
            "",
        ])
        .prop_map(String::from)
    }

    fn value() -> impl Strategy<Value = f64> {
        prop_oneof![
            -1.0e6f64..1.0e6,
            any::<f64>(),
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ]
    }

    fn kind() -> impl Strategy<Value = RequirementKind> {
        prop_oneof![
            (id(), any::<bool>()).prop_map(|(id, expected)| RequirementKind::Flag { id, expected }),
            (id(), operator(), value())
                .prop_map(|(id, operator, value)| RequirementKind::Metric { id, operator, value }),
            (id(), operator(), value())
                .prop_map(|(id, operator, value)| RequirementKind::Upgrade { id, operator, value }),
            (id(), operator(), value())
                .prop_map(|(id, operator, value)| RequirementKind::Staff { id, operator, value }),
            Just(RequirementKind::Unsupported),
        ]
    }

    fn requirement() -> impl Strategy<Value = Requirement> {
        let on_fail = prop::option::of(prop_oneof![Just(OnFail::Hide), Just(OnFail::Lock)]);
        (kind(), on_fail).prop_map(|(kind, on_fail)| Requirement { kind, on_fail })
    }

    proptest! {
        #[test]
        fn metric_gte_matches_float_comparison(
            have in -1.0e6f64..1.0e6,
            want in -1.0e6f64..1.0e6,
        ) {
            let mut s = RequirementSnapshot::default();
            s.metrics.insert("cash".into(), have);
            let r: Requirement = RequirementKind::Metric {
                id: "cash".into(),
                operator: Operator::Gte,
                value: want,
            }
            .into();
            prop_assert_eq!(evaluate(&r, &s), have >= want);
        }

        #[test]
        fn evaluation_is_total(reqs in proptest::collection::vec(requirement(), 0..6)) {
            let s = snapshot();
            let results: Vec<bool> = reqs.iter().map(|r| evaluate(r, &s)).collect();
            for (r, ok) in reqs.iter().zip(&results) {
                match &r.kind {
                    RequirementKind::Unsupported => prop_assert!(!ok),
                    RequirementKind::Metric { id, .. } if !s.metrics.contains_key(id) => {
                        prop_assert!(!ok)
                    }
                    RequirementKind::Flag { id, .. } if !s.flags.contains_key(id) => {
                        prop_assert!(!ok)
                    }
                    RequirementKind::Metric { value, .. }
                    | RequirementKind::Upgrade { value, .. }
                    | RequirementKind::Staff { value, .. }
                        if value.is_nan() =>
                    {
                        prop_assert!(!ok)
                    }
                    _ => {}
                }
            }
            let all = results.iter().all(|ok| *ok);
            prop_assert_eq!(evaluate_all(Some(reqs.as_slice()), &s), all);
            prop_assert_eq!(first_failure(&reqs, &s).is_none(), all);
        }
    }
}
