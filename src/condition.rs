//! # Condition Engine
//!
//! Declarative rule trees that decide AutoPlaylist membership.
//!
//! A tree is plain data: `and`/`or` combinators over child nodes, and leaf
//! comparisons of a song attribute against a rule value. Evaluation is a pure
//! function of the tree and the song, so the same tree always gives the same
//! answer for an unchanged song.
//!
//! ## Serialized form
//!
//! Trees are stored as nested JSON arrays that stay readable and editable by
//! hand:
//!
//! ```text
//! ["or", [
//!     ["artist", "in", ["Gorillaz", "Radiohead"]],
//!     ["genre", "contains", "trip-hop"]
//! ]]
//! ```
//!
//! Combinators are `[name, [children...]]`, leaves are
//! `[attribute, operator phrase, value]`.
//!
//! ## Comparison rules
//!
//! Both the song's value and the rule value(s) are lower-cased and trimmed.
//! An attribute the song doesn't have compares as the empty string, and an
//! empty value never contains anything.

use crate::song::{MetaValue, Song};
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Leaf comparison operators, serialized by their English phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Is,
    IsNot,
    Contains,
    DoesNotContain,
    In,
    NotIn,
    ContainsAll,
    ContainsAny,
    ContainsNone,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Is,
        Operator::IsNot,
        Operator::Contains,
        Operator::DoesNotContain,
        Operator::In,
        Operator::NotIn,
        Operator::ContainsAll,
        Operator::ContainsAny,
        Operator::ContainsNone,
    ];

    pub fn phrase(self) -> &'static str {
        match self {
            Operator::Is => "is",
            Operator::IsNot => "is not",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "does not contain",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::ContainsAll => "contains all",
            Operator::ContainsAny => "contains any",
            Operator::ContainsNone => "contains none",
        }
    }

    pub fn from_phrase(phrase: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.phrase() == phrase)
    }

    /// Whether the operator compares against a list of values.
    pub fn takes_list(self) -> bool {
        matches!(
            self,
            Operator::In
                | Operator::NotIn
                | Operator::ContainsAll
                | Operator::ContainsAny
                | Operator::ContainsNone
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

/// Boolean combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn name(self) -> &'static str {
        match self {
            Combinator::And => "and",
            Combinator::Or => "or",
        }
    }

    fn from_name(name: &str) -> Option<Combinator> {
        match name {
            "and" => Some(Combinator::And),
            "or" => Some(Combinator::Or),
            _ => None,
        }
    }
}

/// Rule value of a leaf as written by the user. Scalars are kept as the
/// JSON value (string, number or boolean) so they serialize back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    Single(Value),
    List(Vec<Value>),
}

impl RuleValue {
    pub fn text(value: impl Into<String>) -> Self {
        RuleValue::Single(Value::String(value.into()))
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RuleValue::List(values.into_iter().map(|v| Value::String(v.into())).collect())
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Array(items) => RuleValue::List(items.clone()),
            other => RuleValue::Single(other.clone()),
        }
    }
}

/// An operator bound to a value of the shape it takes. Scalar operators
/// carry one value, list operators a list, so a leaf can't pair them wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    Is(Value),
    IsNot(Value),
    Contains(Value),
    DoesNotContain(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    ContainsAll(Vec<Value>),
    ContainsAny(Vec<Value>),
    ContainsNone(Vec<Value>),
}

impl Test {
    /// Pairs `op` with `value`, rejecting a value of the wrong shape or a
    /// non-scalar element.
    pub fn new(op: Operator, value: RuleValue) -> Result<Test, String> {
        let single = |v: Value| {
            if is_scalar(&v) {
                Ok(v)
            } else {
                Err(format!("`{op}` expects a single value, found `{v}`"))
            }
        };
        let list = |vs: Vec<Value>| match vs.iter().find(|v| !is_scalar(v)) {
            Some(bad) => Err(format!("`{op}` list contains non-scalar `{bad}`")),
            None => Ok(vs),
        };

        match (op, value) {
            (Operator::Is, RuleValue::Single(v)) => single(v).map(Test::Is),
            (Operator::IsNot, RuleValue::Single(v)) => single(v).map(Test::IsNot),
            (Operator::Contains, RuleValue::Single(v)) => single(v).map(Test::Contains),
            (Operator::DoesNotContain, RuleValue::Single(v)) => single(v).map(Test::DoesNotContain),
            (Operator::In, RuleValue::List(vs)) => list(vs).map(Test::In),
            (Operator::NotIn, RuleValue::List(vs)) => list(vs).map(Test::NotIn),
            (Operator::ContainsAll, RuleValue::List(vs)) => list(vs).map(Test::ContainsAll),
            (Operator::ContainsAny, RuleValue::List(vs)) => list(vs).map(Test::ContainsAny),
            (Operator::ContainsNone, RuleValue::List(vs)) => list(vs).map(Test::ContainsNone),
            (_, RuleValue::Single(v)) => Err(format!("`{op}` expects a list of values, found `{v}`")),
            (_, RuleValue::List(vs)) => Err(format!(
                "`{op}` expects a single value, found `{}`",
                Value::Array(vs)
            )),
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            Test::Is(_) => Operator::Is,
            Test::IsNot(_) => Operator::IsNot,
            Test::Contains(_) => Operator::Contains,
            Test::DoesNotContain(_) => Operator::DoesNotContain,
            Test::In(_) => Operator::In,
            Test::NotIn(_) => Operator::NotIn,
            Test::ContainsAll(_) => Operator::ContainsAll,
            Test::ContainsAny(_) => Operator::ContainsAny,
            Test::ContainsNone(_) => Operator::ContainsNone,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Test::Is(v) | Test::IsNot(v) | Test::Contains(v) | Test::DoesNotContain(v) => v.clone(),
            Test::In(vs)
            | Test::NotIn(vs)
            | Test::ContainsAll(vs)
            | Test::ContainsAny(vs)
            | Test::ContainsNone(vs) => Value::Array(vs.clone()),
        }
    }

    fn evaluate(&self, current: &str) -> bool {
        let cleaned = |vs: &[Value]| vs.iter().map(clean_rule).collect::<Vec<_>>();

        match self {
            Test::Is(rule) => current == clean_rule(rule),
            Test::IsNot(rule) => current != clean_rule(rule),
            Test::Contains(rule) => has(current, &clean_rule(rule)),
            Test::DoesNotContain(rule) => !has(current, &clean_rule(rule)),
            Test::In(rules) => cleaned(rules).iter().any(|r| r == current),
            Test::NotIn(rules) => !cleaned(rules).iter().any(|r| r == current),
            Test::ContainsAll(rules) => cleaned(rules).iter().all(|r| has(current, r)),
            Test::ContainsAny(rules) => cleaned(rules).iter().any(|r| has(current, r)),
            Test::ContainsNone(rules) => !cleaned(rules).iter().any(|r| has(current, r)),
        }
    }
}

/// A node of a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Group {
        combinator: Combinator,
        children: Vec<Condition>,
    },
    Leaf {
        attr: String,
        test: Test,
    },
}

/// Why a node was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {reason}")]
pub struct ParseError {
    /// Position inside the tree, e.g. `conditions[1][0]`.
    pub location: String,
    pub reason: String,
}

impl Condition {
    /// A leaf comparing `attr` with `op`. Fails when `value` doesn't have
    /// the shape `op` takes; the error's location is the attribute name.
    pub fn leaf(attr: impl Into<String>, op: Operator, value: RuleValue) -> Result<Self, ParseError> {
        let attr = attr.into();
        match Test::new(op, value) {
            Ok(test) => Ok(Condition::Leaf { attr, test }),
            Err(reason) => Err(ParseError {
                location: attr,
                reason,
            }),
        }
    }

    pub fn all(children: Vec<Condition>) -> Self {
        Condition::Group {
            combinator: Combinator::And,
            children,
        }
    }

    pub fn any(children: Vec<Condition>) -> Self {
        Condition::Group {
            combinator: Combinator::Or,
            children,
        }
    }

    /// Evaluates the tree against `song`.
    pub fn matches(&self, song: &Song) -> bool {
        match self {
            Condition::Group {
                combinator: Combinator::And,
                children,
            } => children.iter().all(|c| c.matches(song)),
            Condition::Group {
                combinator: Combinator::Or,
                children,
            } => children.iter().any(|c| c.matches(song)),
            Condition::Leaf { attr, test } => {
                let current = song.attr(attr).map(|v| clean(&v)).unwrap_or_default();
                test.evaluate(&current)
            }
        }
    }

    /// Parses one serialized node. `location` names the node in errors.
    pub fn from_json(node: &Value, location: &str) -> Result<Condition, ParseError> {
        let fail = |reason: String| ParseError {
            location: location.to_string(),
            reason,
        };

        let parts = node
            .as_array()
            .ok_or_else(|| fail(format!("expected a list, found `{node}`")))?;

        match parts.as_slice() {
            [name, children] => {
                let name = name
                    .as_str()
                    .ok_or_else(|| fail(format!("expected a combinator name, found `{name}`")))?;
                let combinator = Combinator::from_name(name)
                    .ok_or_else(|| fail(format!("unknown combinator `{name}`, expected `and` or `or`")))?;
                let children = parse_list(children, location)?;
                Ok(Condition::Group {
                    combinator,
                    children,
                })
            }
            [attr, phrase, value] => {
                let attr = attr
                    .as_str()
                    .ok_or_else(|| fail(format!("expected an attribute name, found `{attr}`")))?;
                let phrase = phrase
                    .as_str()
                    .ok_or_else(|| fail(format!("expected an operator, found `{phrase}`")))?;
                let op = Operator::from_phrase(phrase)
                    .ok_or_else(|| fail(format!("unknown operator `{phrase}`")))?;
                let test = Test::new(op, RuleValue::from_json(value)).map_err(fail)?;

                Ok(Condition::Leaf {
                    attr: attr.to_string(),
                    test,
                })
            }
            other => Err(fail(format!(
                "expected 2 or 3 elements, found {}",
                other.len()
            ))),
        }
    }
}

/// Parses a list of serialized nodes, e.g. the top-level `conditions` array.
pub fn parse_list(nodes: &Value, location: &str) -> Result<Vec<Condition>, ParseError> {
    let nodes = nodes.as_array().ok_or_else(|| ParseError {
        location: location.to_string(),
        reason: format!("expected a list of conditions, found `{nodes}`"),
    })?;

    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| Condition::from_json(node, &format!("{location}[{i}]")))
        .collect()
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Condition::Group {
                combinator,
                children,
            } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(combinator.name())?;
                seq.serialize_element(children)?;
                seq.end()
            }
            Condition::Leaf { attr, test } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(attr)?;
                seq.serialize_element(test.operator().phrase())?;
                seq.serialize_element(&test.to_json())?;
                seq.end()
            }
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn clean(value: &MetaValue) -> String {
    value.to_string().trim().to_lowercase()
}

fn clean_rule(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_lowercase(),
        other => other.to_string().trim().to_lowercase(),
    }
}

/// Substring test where an empty haystack contains nothing.
fn has(current: &str, needle: &str) -> bool {
    !current.is_empty() && current.contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::timestamp;
    use serde_json::json;

    fn song(pairs: &[(&str, &str)]) -> Song {
        let mut song = Song::new(
            "song.mp3",
            timestamp::parse("2014-06-01T12:00:00").unwrap(),
        );
        for (k, v) in pairs {
            song.metadata.insert((*k).to_string(), (*v).into());
        }
        song
    }

    #[test]
    fn test_contains_any_matches_substring() {
        let cond = Condition::leaf("genre", Operator::ContainsAny, RuleValue::list(["rock", "pop"])).unwrap();
        assert!(cond.matches(&song(&[("genre", "classic-rock")])));
        assert!(!cond.matches(&song(&[("genre", "jazz")])));
        assert!(!cond.matches(&song(&[])));
    }

    #[test]
    fn test_is_not_matches_missing_attribute() {
        let cond = Condition::leaf("artist", Operator::IsNot, RuleValue::text("Unknown")).unwrap();
        assert!(cond.matches(&song(&[])));
        assert!(cond.matches(&song(&[("artist", "Gorillaz")])));
        assert!(!cond.matches(&song(&[("artist", "  unknown ")])));
    }

    #[test]
    fn test_scalar_operators_normalize_both_sides() {
        let s = song(&[("artist", "  Radiohead ")]);
        assert!(Condition::leaf("artist", Operator::Is, RuleValue::text("RADIOHEAD")).unwrap().matches(&s));
        assert!(Condition::leaf("artist", Operator::Contains, RuleValue::text(" HEAD")).unwrap().matches(&s));
        assert!(!Condition::leaf("artist", Operator::DoesNotContain, RuleValue::text("radio")).unwrap().matches(&s));
        assert!(Condition::leaf("artist", Operator::DoesNotContain, RuleValue::text("blur")).unwrap().matches(&s));
    }

    #[test]
    fn test_missing_value_never_contains() {
        let empty = song(&[]);
        assert!(!Condition::leaf("album", Operator::Contains, RuleValue::text("")).unwrap().matches(&empty));
        assert!(Condition::leaf("album", Operator::DoesNotContain, RuleValue::text("x")).unwrap().matches(&empty));
        assert!(!Condition::leaf("album", Operator::ContainsAll, RuleValue::list(["a"])).unwrap().matches(&empty));
        assert!(Condition::leaf("album", Operator::ContainsNone, RuleValue::list(["a"])).unwrap().matches(&empty));
        assert!(Condition::leaf("album", Operator::Is, RuleValue::text("")).unwrap().matches(&empty));
    }

    #[test]
    fn test_list_operators() {
        let s = song(&[("artist", "Gorillaz"), ("title", "Feel Good Inc")]);
        assert!(Condition::leaf("artist", Operator::In, RuleValue::list(["gorillaz", "blur"])).unwrap().matches(&s));
        assert!(!Condition::leaf("artist", Operator::NotIn, RuleValue::list(["GORILLAZ"])).unwrap().matches(&s));
        assert!(Condition::leaf("title", Operator::ContainsAll, RuleValue::list(["feel", "inc"])).unwrap().matches(&s));
        assert!(!Condition::leaf("title", Operator::ContainsAll, RuleValue::list(["feel", "bad"])).unwrap().matches(&s));
        assert!(Condition::leaf("title", Operator::ContainsNone, RuleValue::list(["bad", "sad"])).unwrap().matches(&s));
    }

    #[test]
    fn test_numeric_rule_values() {
        let mut s = song(&[]);
        s.metadata.insert("tracknumber".into(), MetaValue::Integer(3));
        let cond = Condition::from_json(&json!(["tracknumber", "in", [1, 2, 3]]), "c").unwrap();
        assert!(cond.matches(&s));
    }

    #[test]
    fn test_date_added_attribute() {
        let cond = Condition::leaf("date_added", Operator::Contains, RuleValue::text("2014-06")).unwrap();
        assert!(cond.matches(&song(&[])));
    }

    #[test]
    fn test_combinators_short_circuit_semantics() {
        let s = song(&[("artist", "Blur")]);
        let yes = Condition::leaf("artist", Operator::Is, RuleValue::text("blur")).unwrap();
        let no = Condition::leaf("artist", Operator::Is, RuleValue::text("oasis")).unwrap();

        assert!(Condition::any(vec![no.clone(), yes.clone()]).matches(&s));
        assert!(!Condition::all(vec![yes.clone(), no.clone()]).matches(&s));
        assert!(Condition::all(vec![]).matches(&s));
        assert!(!Condition::any(vec![]).matches(&s));
    }

    #[test]
    fn test_matching_is_deterministic() {
        let s = song(&[("genre", "Trip-Hop")]);
        let cond = Condition::any(vec![
            Condition::leaf("genre", Operator::Contains, RuleValue::text("hop")).unwrap(),
            Condition::leaf("artist", Operator::Is, RuleValue::text("massive attack")).unwrap(),
        ]);
        let first = cond.matches(&s);
        for _ in 0..10 {
            assert_eq!(cond.matches(&s), first);
        }
    }

    #[test]
    fn test_serialized_form_round_trips() {
        let raw = json!([
            "or",
            [
                ["artist", "in", ["Gorillaz", "Radiohead"]],
                ["length", "is not", 0],
                ["and", [["genre", "does not contain", "metal"]]]
            ]
        ]);
        let cond = Condition::from_json(&raw, "conditions[0]").unwrap();
        assert_eq!(serde_json::to_value(&cond).unwrap(), raw);
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        let err = Condition::from_json(&json!(["artist", "in", "Gorillaz"]), "conditions[2]").unwrap_err();
        assert_eq!(err.location, "conditions[2]");
        assert!(err.reason.contains("list"));

        let err = Condition::from_json(&json!(["artist", "is", ["a", "b"]]), "c").unwrap_err();
        assert!(err.reason.contains("single value"));
    }

    #[test]
    fn test_leaf_rejects_wrong_value_shape() {
        let err = Condition::leaf("genre", Operator::ContainsAny, RuleValue::text("rock")).unwrap_err();
        assert_eq!(err.location, "genre");
        assert!(err.reason.contains("list of values"));

        assert!(Condition::leaf("genre", Operator::Is, RuleValue::list(["rock"])).is_err());
        assert!(Condition::leaf("genre", Operator::Is, RuleValue::Single(json!({"a": 1}))).is_err());
        assert!(Condition::leaf("genre", Operator::In, RuleValue::List(vec![json!(["nested"])])).is_err());
    }

    #[test]
    fn test_built_leaf_serializes_to_parseable_form() {
        for op in Operator::ALL {
            let value = if op.takes_list() {
                RuleValue::list(["rock", "pop"])
            } else {
                RuleValue::text("rock")
            };
            let cond = Condition::leaf("genre", op, value).unwrap();
            let json = serde_json::to_value(&cond).unwrap();
            assert_eq!(Condition::from_json(&json, "c").unwrap(), cond);
        }
    }

    #[test]
    fn test_malformed_nodes_are_rejected() {
        assert!(Condition::from_json(&json!(["artist", "is"]), "c").is_err());
        assert!(Condition::from_json(&json!(["xor", []]), "c").is_err());
        assert!(Condition::from_json(&json!(["artist", "resembles", "x"]), "c").is_err());
        assert!(Condition::from_json(&json!("artist is x"), "c").is_err());
        assert!(Condition::from_json(&json!(["a", "b", "c", "d"]), "c").is_err());

        let err = parse_list(&json!([["and", [["x", "is", {}]]]]), "conditions").unwrap_err();
        assert_eq!(err.location, "conditions[0][0]");
    }

    #[test]
    fn test_operator_phrases_are_unique() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_phrase(op.phrase()), Some(op));
        }
    }
}
