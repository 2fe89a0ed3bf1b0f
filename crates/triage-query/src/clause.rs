//! Native filter clauses
//!
//! A [`Clause`] is the compiled form of a filter. Field operands carry the
//! document variable prefix they were compiled with (`d.` by default) so the
//! rendered clause reads like the query the backend executes, e.g.
//! `d.status == "open"`. Evaluation ignores the prefix and resolves the path
//! inside the document it is given.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;

/// Bind variables referenced by `@name` parameters
pub type Vars = BTreeMap<String, Value>;

const LIKE_CACHE_LIMIT: usize = 1024;

/// Compiled LIKE patterns, keyed by pattern text
static LIKE_PATTERNS: Lazy<DashMap<String, Option<Regex>>> = Lazy::new(DashMap::new);

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Operator token
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value position of a clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Document attribute, `prefix` + dotted `path`
    Field {
        /// Document variable prefix, including the trailing dot
        prefix: String,
        /// Attribute path below the document root
        path: Vec<String>,
    },
    /// Constant
    Literal(Value),
    /// Bind parameter `@name`
    Param(String),
    /// List of operands
    List(Vec<Operand>),
}

impl Operand {
    /// Field reference from a dotted path
    #[must_use]
    pub fn field(prefix: impl Into<String>, path: &str) -> Self {
        Self::Field {
            prefix: prefix.into(),
            path: path.split('.').map(str::to_string).collect(),
        }
    }

    /// Bind parameter reference
    #[inline]
    #[must_use]
    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }

    /// Constant operand
    #[inline]
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Resolve against a document and its bind variables
    ///
    /// Missing attributes resolve to `null`.
    ///
    /// # Errors
    /// `QueryError::UnboundParameter` for a parameter absent from `vars`
    pub fn resolve<'a>(&'a self, doc: &'a Value, vars: &'a Vars) -> Result<Cow<'a, Value>, QueryError> {
        match self {
            Self::Field { path, .. } => Ok(lookup(doc, path).map_or(Cow::Owned(Value::Null), Cow::Borrowed)),
            Self::Literal(value) => Ok(Cow::Borrowed(value)),
            Self::Param(name) => vars
                .get(name)
                .map(Cow::Borrowed)
                .ok_or_else(|| QueryError::UnboundParameter(name.clone())),
            Self::List(items) => items
                .iter()
                .map(|item| item.resolve(doc, vars).map(Cow::into_owned))
                .collect::<Result<Vec<_>, _>>()
                .map(|values| Cow::Owned(Value::Array(values))),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { prefix, path } => write!(f, "{prefix}{}", path.join(".")),
            Self::Literal(value) => write!(f, "{value}"),
            Self::Param(name) => write!(f, "@{name}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

fn lookup<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Compiled filter clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    /// All children hold; empty is always true
    And(Vec<Clause>),
    /// Any child holds; empty is always false
    Or(Vec<Clause>),
    /// Negation
    Not(Box<Clause>),
    /// Binary comparison under the total value order
    Compare {
        /// Left operand
        left: Operand,
        /// Operator
        op: CompareOp,
        /// Right operand
        right: Operand,
    },
    /// Membership in a list operand
    In {
        /// Needle
        left: Operand,
        /// Haystack, must resolve to an array
        list: Operand,
        /// `NOT IN`
        negated: bool,
    },
    /// SQL-style pattern match (`%` any run, `_` any single character)
    Like {
        /// Subject, must resolve to a string
        left: Operand,
        /// Pattern, must resolve to a string
        pattern: Operand,
    },
    /// Operand is truthy
    Truthy(Operand),
}

impl Clause {
    /// `left == right`
    #[must_use]
    pub fn eq(left: Operand, right: Operand) -> Self {
        Self::Compare {
            left,
            op: CompareOp::Eq,
            right,
        }
    }

    /// `left IN list`
    #[must_use]
    pub fn is_in(left: Operand, list: Operand) -> Self {
        Self::In {
            left,
            list,
            negated: false,
        }
    }

    /// Conjunction, flattening nested conjunctions
    #[must_use]
    pub fn and(clauses: impl IntoIterator<Item = Clause>) -> Self {
        let mut flat = Vec::new();
        for clause in clauses {
            match clause {
                Self::And(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::And(flat)
        }
    }

    /// Disjunction, flattening nested disjunctions
    #[must_use]
    pub fn or(clauses: impl IntoIterator<Item = Clause>) -> Self {
        let mut flat = Vec::new();
        for clause in clauses {
            match clause {
                Self::Or(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::Or(flat)
        }
    }

    /// Negation
    #[must_use]
    pub fn not(clause: Clause) -> Self {
        Self::Not(Box::new(clause))
    }

    /// Evaluate against a JSON document
    ///
    /// # Errors
    /// `QueryError::UnboundParameter` when a referenced parameter is missing
    pub fn matches(&self, doc: &Value, vars: &Vars) -> Result<bool, QueryError> {
        match self {
            Self::And(children) => {
                for child in children {
                    if !child.matches(doc, vars)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(children) => {
                for child in children {
                    if child.matches(doc, vars)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(inner) => Ok(!inner.matches(doc, vars)?),
            Self::Compare { left, op, right } => {
                let left = left.resolve(doc, vars)?;
                let right = right.resolve(doc, vars)?;
                Ok(op.holds(compare_values(&left, &right)))
            }
            Self::In { left, list, negated } => {
                let needle = left.resolve(doc, vars)?;
                let found = match list.resolve(doc, vars)?.as_ref() {
                    Value::Array(items) => items
                        .iter()
                        .any(|item| compare_values(item, &needle) == Ordering::Equal),
                    _ => false,
                };
                Ok(found != *negated)
            }
            Self::Like { left, pattern } => {
                let subject = left.resolve(doc, vars)?;
                let pattern = pattern.resolve(doc, vars)?;
                match (subject.as_ref(), pattern.as_ref()) {
                    (Value::String(subject), Value::String(pattern)) => Ok(like(subject, pattern)),
                    _ => Ok(false),
                }
            }
            Self::Truthy(operand) => Ok(truthy(operand.resolve(doc, vars)?.as_ref())),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(children) => write_joined(f, children, " AND ", "true"),
            Self::Or(children) => write_joined(f, children, " OR ", "false"),
            Self::Not(inner) => write!(f, "NOT ({inner})"),
            Self::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::In {
                left,
                list,
                negated: false,
            } => write!(f, "{left} IN {list}"),
            Self::In {
                left,
                list,
                negated: true,
            } => write!(f, "{left} NOT IN {list}"),
            Self::Like { left, pattern } => write!(f, "{left} LIKE {pattern}"),
            Self::Truthy(operand) => write!(f, "{operand}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Clause], sep: &str, empty: &str) -> fmt::Result {
    if children.is_empty() {
        return f.write_str(empty);
    }
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values
///
/// `null < bool < number < string < array < object`; arrays compare element
/// by element, objects by their sorted key/value pairs.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => {
            let mut x: Vec<_> = x.iter().collect();
            let mut y: Vec<_> = y.iter().collect();
            x.sort_by(|a, b| a.0.cmp(b.0));
            y.sort_by(|a, b| a.0.cmp(b.0));
            x.iter()
                .zip(&y)
                .map(|((xk, xv), (yk, yv))| xk.cmp(yk).then_with(|| compare_values(xv, yv)))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or_else(|| x.len().cmp(&y.len()))
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Truthiness: `null`, `false`, `0` and `""` are false, everything else true
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn like(subject: &str, pattern: &str) -> bool {
    if let Some(re) = LIKE_PATTERNS.get(pattern) {
        return re.as_ref().is_some_and(|re| re.is_match(subject));
    }
    let re = like_regex(pattern);
    let matched = re.as_ref().is_some_and(|re| re.is_match(subject));
    if LIKE_PATTERNS.len() >= LIKE_CACHE_LIMIT {
        LIKE_PATTERNS.clear();
    }
    LIKE_PATTERNS.insert(pattern.to_string(), re);
    matched
}

fn like_regex(pattern: &str) -> Option<Regex> {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            c => regex.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    regex.push('$');
    Regex::new(&regex).ok()
}

/// Filter exchanged with access-control hooks: an optional clause and the
/// bind variables it references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Clause, `None` matches everything
    pub clause: Option<Clause>,
    /// Bind variables
    #[serde(default)]
    pub vars: Vars,
}

impl FilterClause {
    /// Filter that matches every document
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter with bind variables
    #[inline]
    #[must_use]
    pub fn new(clause: Clause, vars: Vars) -> Self {
        Self {
            clause: Some(clause),
            vars,
        }
    }

    /// Filter without bind variables
    #[inline]
    #[must_use]
    pub fn from_clause(clause: Clause) -> Self {
        Self::new(clause, Vars::new())
    }

    /// Whether this filter is a no-op
    #[inline]
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.clause.is_none()
    }

    /// Conjunction of two filters; variables of `other` win on name clashes
    #[must_use]
    pub fn and(mut self, other: FilterClause) -> Self {
        self.vars.extend(other.vars);
        self.clause = match (self.clause, other.clause) {
            (Some(a), Some(b)) => Some(Clause::and([a, b])),
            (a, b) => a.or(b),
        };
        self
    }

    /// Evaluate against a document
    ///
    /// # Errors
    /// `QueryError::UnboundParameter` when a referenced parameter is missing
    pub fn matches(&self, doc: &Value) -> Result<bool, QueryError> {
        self.clause
            .as_ref()
            .map_or(Ok(true), |clause| clause.matches(doc, &self.vars))
    }
}

impl fmt::Display for FilterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.clause {
            Some(clause) => write!(f, "{clause}"),
            None => f.write_str("true"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "id": 7,
            "name": "Phishing mail",
            "status": "open",
            "details": { "severity": 3, "tags": ["mail", "phish"] },
            "owner": null
        })
    }

    #[test]
    fn renders_like_backend_query() {
        let clause = Clause::eq(Operand::field("d.", "status"), Operand::literal("open"));
        assert_eq!(clause.to_string(), r#"d.status == "open""#);

        let clause = Clause::and([
            clause,
            Clause::is_in(Operand::field("d.", "id"), Operand::literal(json!([1, 2]))),
            Clause::not(Clause::Truthy(Operand::param("closed"))),
        ]);
        assert_eq!(
            clause.to_string(),
            r#"(d.status == "open" AND d.id IN [1,2] AND NOT (@closed))"#
        );
    }

    #[test]
    fn compare_against_nested_fields() {
        let vars = Vars::new();
        let severe = Clause::Compare {
            left: Operand::field("d.", "details.severity"),
            op: CompareOp::Ge,
            right: Operand::literal(3),
        };
        assert!(severe.matches(&doc(), &vars).unwrap());

        let tag = Clause::eq(Operand::field("d.", "details.tags.1"), Operand::literal("phish"));
        assert!(tag.matches(&doc(), &vars).unwrap());

        let missing = Clause::eq(Operand::field("d.", "details.nope"), Operand::Literal(Value::Null));
        assert!(missing.matches(&doc(), &vars).unwrap());
    }

    #[test]
    fn parameters_must_be_bound() {
        let clause = Clause::eq(Operand::field("d.", "status"), Operand::param("status"));
        assert_eq!(
            clause.matches(&doc(), &Vars::new()),
            Err(QueryError::UnboundParameter("status".into()))
        );

        let vars = Vars::from([("status".to_string(), json!("open"))]);
        assert!(clause.matches(&doc(), &vars).unwrap());
    }

    #[test]
    fn in_and_not_in() {
        let vars = Vars::new();
        let mut clause = Clause::is_in(Operand::field("d.", "id"), Operand::literal(json!([1, 7])));
        assert!(clause.matches(&doc(), &vars).unwrap());

        if let Clause::In { negated, .. } = &mut clause {
            *negated = true;
        }
        assert!(!clause.matches(&doc(), &vars).unwrap());
    }

    #[test]
    fn like_uses_sql_wildcards() {
        assert!(like("Phishing mail", "Phish%"));
        assert!(like("Phishing mail", "%mail"));
        assert!(like("abc", "a_c"));
        assert!(!like("abc", "a_"));
        assert!(like("a.c", "a.c"));
        assert!(!like("abc", "a.c"));
    }

    #[test]
    fn truthy_clause_reads_the_document() {
        let vars = Vars::new();
        let owner = Clause::Truthy(Operand::field("d.", "owner"));
        let tags = Clause::Truthy(Operand::field("d.", "details.tags"));
        assert!(!owner.matches(&doc(), &vars).unwrap());
        assert!(tags.matches(&doc(), &vars).unwrap());
    }

    #[test]
    fn like_patterns_are_compiled_once() {
        let pattern = "cached-%-pattern";
        assert!(like("cached-x-pattern", pattern));
        assert!(LIKE_PATTERNS.contains_key(pattern));
        assert!(like("cached-yy-pattern", pattern));
        assert!(!like("cached-pattern", pattern));
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!("x")));
    }

    #[test]
    fn value_order_ranks_types() {
        let ordered = [json!(null), json!(false), json!(true), json!(-1), json!(2.5), json!("a"), json!([]), json!({})];
        for pair in ordered.windows(2) {
            assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less, "{pair:?}");
        }
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Ordering::Equal);
    }

    #[test]
    fn filter_conjunction_merges_vars() {
        let a = FilterClause::new(
            Clause::eq(Operand::field("d.", "status"), Operand::param("status")),
            Vars::from([("status".to_string(), json!("open"))]),
        );
        let b = FilterClause::new(
            Clause::eq(Operand::field("d.", "id"), Operand::param("id")),
            Vars::from([("id".to_string(), json!(7))]),
        );
        let both = FilterClause::all().and(a).and(b);
        assert_eq!(both.vars.len(), 2);
        assert!(both.matches(&doc()).unwrap());
        assert!(FilterClause::all().matches(&doc()).unwrap());
    }

    proptest! {
        #[test]
        fn integer_order_matches_native(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(compare_values(&json!(a), &json!(b)), a.cmp(&b));
        }

        #[test]
        fn string_order_matches_native(a in ".{0,8}", b in ".{0,8}") {
            prop_assert_eq!(compare_values(&json!(a), &json!(b)), a.cmp(&b));
        }
    }
}
