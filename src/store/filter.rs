use serde_json::Value;
use std::fmt;

/// Record fields the store can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Build,
    Node,
    Timestamp,
}

impl Field {
    pub fn key(self) -> &'static str {
        match self {
            Field::Build => "build",
            Field::Node => "node",
            Field::Timestamp => "timestamp",
        }
    }

    /// Key older shippers wrote the same field under.
    pub fn legacy_key(self) -> Option<&'static str> {
        match self {
            Field::Build => Some("buildId"),
            Field::Node => Some("nodeId"),
            Field::Timestamp => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Text(String),
    Number(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition {
    key: &'static str,
    operand: Operand,
}

impl Condition {
    fn matches(&self, payload: &Value) -> bool {
        match (&self.operand, payload.get(self.key)) {
            (Operand::Text(expected), Some(Value::String(s))) => s == expected,
            (Operand::Number(expected), Some(Value::Number(n))) => n.as_i64() == Some(*expected),
            _ => false,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::Text(s) => write!(f, "($.{} = \"{}\")", self.key, escape(s)),
            Operand::Number(n) => write!(f, "($.{} = {})", self.key, n),
        }
    }
}

/// Conjunction of clauses, each an equality test or a disjunction of them,
/// rendered in the store's `{ ($.field = "value") && ... }` metric filter
/// syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPattern {
    clauses: Vec<Vec<Condition>>,
}

impl FilterPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text_eq(mut self, field: Field, value: impl Into<String>) -> Self {
        self.clauses.push(vec![Condition {
            key: field.key(),
            operand: Operand::Text(value.into()),
        }]);
        self
    }

    pub fn number_eq(mut self, field: Field, value: i64) -> Self {
        self.clauses.push(vec![Condition {
            key: field.key(),
            operand: Operand::Number(value),
        }]);
        self
    }

    /// Match an id however it was shipped: under the current or the legacy
    /// key, as a string or, when it is a plain integer, as a number.
    pub fn id_eq(mut self, field: Field, id: &str) -> Self {
        let number = id.parse::<i64>().ok().filter(|n| n.to_string() == id);
        let mut alternatives = Vec::new();
        for key in std::iter::once(field.key()).chain(field.legacy_key()) {
            alternatives.push(Condition {
                key,
                operand: Operand::Text(id.to_string()),
            });
            if let Some(n) = number {
                alternatives.push(Condition {
                    key,
                    operand: Operand::Number(n),
                });
            }
        }
        self.clauses.push(alternatives);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate against a decoded record payload.
    pub fn matches(&self, payload: &Value) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.iter().any(|c| c.matches(payload)))
    }
}

impl fmt::Display for FilterPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return Ok(());
        }
        f.write_str("{ ")?;
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" && ")?;
            }
            match clause.as_slice() {
                [single] => write!(f, "{}", single)?,
                alternatives => {
                    f.write_str("(")?;
                    for (j, c) in alternatives.iter().enumerate() {
                        if j > 0 {
                            f.write_str(" || ")?;
                        }
                        write!(f, "{}", c)?;
                    }
                    f.write_str(")")?;
                }
            }
        }
        f.write_str(" }")
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
