//! Expressions used by rule filters, text labels and glyph attributes.
//!
//! The language is small: attribute references (`[name]`), string and number literals, `true`,
//! `false`, `null`, comparison, logical and arithmetic operators, and two regex methods:
//! `[name].match('pattern')` and `[name].replace('pattern', 'replacement')`.
//!
//! ```
//! use meridian::expression::Expression;
//! use meridian::Feature;
//!
//! let filter: Expression = "[category] = 'road' and [lanes] >= 2".parse().unwrap();
//! let feature = Feature::new().with_attribute("category", "road").with_attribute("lanes", 4);
//! assert!(filter.evaluate_bool(&feature));
//! ```

mod parser;
mod path;
mod value;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub use path::PathExpression;
use regex::Regex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
pub use value::Value;

use crate::error::Error;
use crate::feature::Feature;

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone)]
enum Method {
    Match(Regex),
    Replace(Regex, String),
}

#[derive(Debug, Clone)]
enum Node {
    Literal(Value),
    Attribute(String),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Method(Box<Node>, Method),
}

/// Parsed expression.
///
/// The source text is kept: it is what gets written back when a style is saved, and two expressions
/// are equal when their source texts are equal.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parses an expression.
    pub fn parse(source: &str) -> Result<Self, Error> {
        let root = parser::parse(source)
            .map_err(|reason| Error::config(format!("failed to parse expression '{source}': {reason}")))?;

        Ok(Self {
            source: source.trim().to_string(),
            root,
        })
    }

    /// Expression that evaluates to the given attribute.
    pub fn attribute(name: &str) -> Self {
        Self {
            source: format!("[{name}]"),
            root: Node::Attribute(name.to_string()),
        }
    }

    /// Expression that evaluates to the given constant.
    pub fn literal(value: Value) -> Self {
        let source = match &value {
            Value::String(text) => format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::Null => "null".to_string(),
            other => other.to_string(),
        };

        Self {
            source,
            root: Node::Literal(value),
        }
    }

    /// Source text of the expression.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression against the attributes of the feature.
    pub fn evaluate(&self, feature: &Feature) -> Value {
        eval(&self.root, feature)
    }

    /// Evaluates the expression and converts the result into a boolean.
    pub fn evaluate_bool(&self, feature: &Feature) -> bool {
        self.evaluate(feature).to_bool()
    }

    /// Evaluates the expression and converts the result into a number, if possible.
    pub fn evaluate_f64(&self, feature: &Feature) -> Option<f64> {
        self.evaluate(feature).as_f64()
    }

    /// Names of all attributes the expression references.
    pub fn attribute_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_names(&self.root, &mut names);
        names
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Expression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Expression {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Expression> for String {
    fn from(value: Expression) -> Self {
        value.source
    }
}

fn collect_names(node: &Node, names: &mut BTreeSet<String>) {
    match node {
        Node::Literal(_) => {}
        Node::Attribute(name) => {
            names.insert(name.clone());
        }
        Node::Unary(_, operand) | Node::Method(operand, _) => collect_names(operand, names),
        Node::Binary(_, left, right) => {
            collect_names(left, names);
            collect_names(right, names);
        }
    }
}

fn eval(node: &Node, feature: &Feature) -> Value {
    match node {
        Node::Literal(value) => value.clone(),
        Node::Attribute(name) => feature.attribute(name).cloned().unwrap_or_default(),
        Node::Unary(UnaryOp::Not, operand) => Value::Bool(!eval(operand, feature).to_bool()),
        Node::Unary(UnaryOp::Neg, operand) => match eval(operand, feature) {
            Value::Integer(v) => Value::Integer(-v),
            other => other.as_f64().map(|v| Value::Float(-v)).unwrap_or_default(),
        },
        Node::Binary(BinaryOp::And, left, right) => {
            Value::Bool(eval(left, feature).to_bool() && eval(right, feature).to_bool())
        }
        Node::Binary(BinaryOp::Or, left, right) => {
            Value::Bool(eval(left, feature).to_bool() || eval(right, feature).to_bool())
        }
        Node::Binary(op, left, right) => {
            let left = eval(left, feature);
            let right = eval(right, feature);
            binary(*op, left, right)
        }
        Node::Method(target, method) => {
            let text = eval(target, feature).to_string();
            match method {
                Method::Match(regex) => Value::Bool(regex.is_match(&text)),
                Method::Replace(regex, replacement) => {
                    Value::String(regex.replace_all(&text, replacement.as_str()).into_owned())
                }
            }
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Value {
    let ordering = || left.compare(&right);
    match op {
        BinaryOp::Eq => Value::Bool(ordering() == Some(Ordering::Equal)),
        BinaryOp::Neq => Value::Bool(ordering() != Some(Ordering::Equal)),
        BinaryOp::Lt => Value::Bool(ordering() == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            ordering(),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(ordering() == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            ordering(),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Add => match (&left, &right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{left}{right}"))
            }
            _ => arithmetic(op, &left, &right),
        },
        _ => arithmetic(op, &left, &right),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Value {
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        let result = match op {
            BinaryOp::Add => a.checked_add(*b),
            BinaryOp::Sub => a.checked_sub(*b),
            BinaryOp::Mul => a.checked_mul(*b),
            BinaryOp::Div => a.checked_div(*b),
            BinaryOp::Mod => a.checked_rem(*b),
            _ => None,
        };
        return result.map(Value::Integer).unwrap_or_default();
    }

    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Value::Null;
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b != 0.0 => a / b,
        BinaryOp::Mod if b != 0.0 => a % b,
        _ => return Value::Null,
    };

    Value::Float(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn road() -> Feature {
        Feature::new()
            .with_attribute("category", "road")
            .with_attribute("lanes", 4)
            .with_attribute("name", "Main street")
            .with_attribute("width", 7.5)
    }

    fn check(source: &str) -> bool {
        Expression::parse(source).unwrap().evaluate_bool(&road())
    }

    #[test]
    fn comparisons() {
        assert!(check("[category] = 'road'"));
        assert!(check("[category] != 'river'"));
        assert!(check("[category] <> 'river'"));
        assert!(check("[lanes] >= 4 and [lanes] < 5"));
        assert!(check("[width] > 7"));
        assert!(check("[lanes] = '4'"));
        assert!(!check("[missing] = 0"));
        assert!(check("[missing] = null"));
    }

    #[test]
    fn logic() {
        assert!(check("not [category] = 'river'"));
        assert!(check("![category] = 'river' && ([lanes] = 4 || false)"));
        assert!(check("[category] = 'river' or [category] = 'road'"));
        assert!(!check("[category] = 'river' and [category] = 'road'"));
    }

    #[test]
    fn arithmetic_and_concatenation() {
        let feature = road();
        let value = |source: &str| Expression::parse(source).unwrap().evaluate(&feature);

        assert_eq!(value("[lanes] * 2 + 1"), Value::Integer(9));
        assert_eq!(value("[width] / 2"), Value::Float(3.75));
        assert_eq!(value("[lanes] / 0"), Value::Null);
        assert_eq!(value("-[lanes]"), Value::Integer(-4));
        assert_eq!(
            value("[name] + ' (' + [lanes] + ')'").to_string(),
            "Main street (4)"
        );
    }

    #[test]
    fn regex_methods() {
        assert!(check("[name].match('^Main.*')"));
        let replaced = Expression::parse("[name].replace('street', 'st.')")
            .unwrap()
            .evaluate(&road());
        assert_eq!(replaced.to_string(), "Main st.");
    }

    #[test]
    fn names_and_equality() {
        let a = Expression::parse("[a] = 1 or [b].match('x')").unwrap();
        let names: Vec<_> = a.attribute_names().into_iter().collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        assert_eq!(a, Expression::parse("  [a] = 1 or [b].match('x') ").unwrap());
        assert_ne!(a, Expression::parse("[a]=1 or [b].match('x')").unwrap());
    }

    #[test]
    fn literal_source_round_trips() {
        let literal = Expression::literal(Value::from("it's"));
        let parsed = Expression::parse(literal.source()).unwrap();
        assert_eq!(parsed.evaluate(&Feature::new()).to_string(), "it's");
    }
}
