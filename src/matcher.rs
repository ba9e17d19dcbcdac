use serde_json::{Number, Value};
use std::fmt;

/// Where and how an observed result fails to contain the expected fragment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub(crate) enum Mismatch {
    #[error("missing {path} from result")]
    MissingField { path: Path },
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: Path,
        expected: Kind,
        found: Kind,
    },
    #[error("mismatch at {path}: expected {expected}, found {found}")]
    ValueMismatch {
        path: Path,
        expected: Value,
        found: Value,
    },
}

/// Dotted location inside a document, e.g. `flags.ack` or `items.2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Path(String);

impl Path {
    // keys that would read ambiguously or split the diagnostic line are quoted
    fn field(&self, key: &str) -> Self {
        if key.is_empty() || key.contains('.') || key.chars().any(char::is_control) {
            self.child(format_args!("{key:?}"))
        } else {
            self.child(key)
        }
    }

    fn child(&self, segment: impl fmt::Display) -> Self {
        if self.0.is_empty() {
            Self(segment.to_string())
        } else {
            Self(format!("{}.{segment}", self.0))
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("(root)")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Self(path.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

impl Kind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => Kind::Object,
            Value::Array(_) => Kind::Array,
            Value::String(_) => Kind::String,
            Value::Number(_) => Kind::Number,
            Value::Bool(_) => Kind::Boolean,
            Value::Null => Kind::Null,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Null => "null",
        })
    }
}

/// Checks that `observed` contains `expected`.
///
/// Objects are compared key by key in the order the expected keys were written, and keys only
/// present in `observed` are ignored. Arrays are compared position by position up to the length
/// of the expected array. Anything else must be equal. The first difference found is returned.
pub(crate) fn compare(expected: &Value, observed: &Value) -> Result<(), Mismatch> {
    compare_at(&Path::default(), expected, observed)
}

fn compare_at(path: &Path, expected: &Value, observed: &Value) -> Result<(), Mismatch> {
    match expected {
        Value::Object(expected_fields) => {
            let Value::Object(observed_fields) = observed else {
                return Err(type_mismatch(path, expected, observed));
            };
            for (key, expected) in expected_fields {
                let path = path.field(key);
                match observed_fields.get(key) {
                    Some(observed) => compare_at(&path, expected, observed)?,
                    None => return Err(Mismatch::MissingField { path }),
                }
            }
            Ok(())
        }
        Value::Array(expected_items) => {
            let Value::Array(observed_items) = observed else {
                return Err(type_mismatch(path, expected, observed));
            };
            for (index, expected) in expected_items.iter().enumerate() {
                let path = path.child(index);
                match observed_items.get(index) {
                    Some(observed) => compare_at(&path, expected, observed)?,
                    None => return Err(Mismatch::MissingField { path }),
                }
            }
            Ok(())
        }
        scalar if scalars_equal(scalar, observed) => Ok(()),
        scalar => Err(Mismatch::ValueMismatch {
            path: path.clone(),
            expected: scalar.clone(),
            found: observed.clone(),
        }),
    }
}

fn type_mismatch(path: &Path, expected: &Value, observed: &Value) -> Mismatch {
    Mismatch::TypeMismatch {
        path: path.clone(),
        expected: Kind::of(expected),
        found: Kind::of(observed),
    }
}

// numbers compare by value, so `1` and `1.0` are the same number
fn scalars_equal(expected: &Value, observed: &Value) -> bool {
    match (expected, observed) {
        (Value::Number(e), Value::Number(o)) => numbers_equal(e, o),
        _ => expected == observed,
    }
}

fn numbers_equal(e: &Number, o: &Number) -> bool {
    match (integer(e), integer(o)) {
        (Some(e), Some(o)) => e == o,
        (Some(i), None) => o.as_f64().is_some_and(|f| integer_equals_float(i, f)),
        (None, Some(i)) => e.as_f64().is_some_and(|f| integer_equals_float(i, f)),
        (None, None) => e.as_f64() == o.as_f64(),
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

// exact: no rounding of the integer into f64, the float has to be that integer
fn integer_equals_float(i: i128, f: f64) -> bool {
    f.fract() == 0.0 && f as i128 == i
}
