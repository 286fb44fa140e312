//! Conversion between native values and terms.
//!
//! Native values are `serde_json::Value`s, which gives callers a ready-made
//! dynamic representation and lets the CLI take arguments as JSON.

use crate::error::ConversionError;
use otprpc_protocol::Term;
use serde_json::{Number, Value};

/// Strategy for mapping native values to terms and back.
pub trait TermConverter: Send + Sync {
    fn to_term(&self, value: &Value) -> Result<Term, ConversionError>;

    fn from_term(&self, term: &Term) -> Result<Value, ConversionError>;

    /// Converts call arguments.
    fn to_args(&self, values: &[Value]) -> Result<Vec<Term>, ConversionError> {
        values.iter().map(|v| self.to_term(v)).collect()
    }

    /// Converts the reply of `module:function`.
    ///
    /// Override to decode replies whose shape depends on the function called.
    fn from_rpc(&self, _module: &str, _function: &str, reply: &Term) -> Result<Value, ConversionError> {
        self.from_term(reply)
    }
}

/// Structural mapping.
///
/// | value            | term                          |
/// |------------------|-------------------------------|
/// | `null`           | atom `undefined`              |
/// | `true`/`false`   | atoms `true`/`false`          |
/// | integer          | `Integer`                     |
/// | float            | `Float`                       |
/// | string           | `String`                      |
/// | array            | `List`                        |
/// | object           | proplist of `{atom, value}`   |
///
/// Going back, other atoms become strings, UTF-8 binaries become strings
/// (others become byte arrays) and both tuples and lists become arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleConverter;

impl TermConverter for SimpleConverter {
    fn to_term(&self, value: &Value) -> Result<Term, ConversionError> {
        Ok(match value {
            Value::Null => Term::atom("undefined"),
            Value::Bool(b) => Term::atom(if *b { "true" } else { "false" }),
            Value::Number(n) => number_to_term(n)?,
            Value::String(s) => Term::string(s.as_str()),
            Value::Array(items) => Term::List(self.to_args(items)?),
            Value::Object(fields) => {
                let mut props = Vec::with_capacity(fields.len());
                for (key, value) in fields {
                    props.push(Term::tuple([Term::atom(key.as_str()), self.to_term(value)?]));
                }
                Term::List(props)
            }
        })
    }

    fn from_term(&self, term: &Term) -> Result<Value, ConversionError> {
        Ok(match term {
            Term::Atom(name) => match name.as_str() {
                "undefined" => Value::Null,
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(name.clone()),
            },
            Term::Integer(n) => Value::Number((*n).into()),
            Term::Float(x) => {
                Value::Number(Number::from_f64(*x).ok_or(ConversionError::NonFiniteFloat(*x))?)
            }
            Term::String(s) => Value::String(s.clone()),
            Term::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Value::String(text.to_string()),
                Err(_) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            },
            Term::Tuple(elements) | Term::List(elements) => Value::Array(
                elements
                    .iter()
                    .map(|e| self.from_term(e))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

fn number_to_term(n: &Number) -> Result<Term, ConversionError> {
    if let Some(i) = n.as_i64() {
        return Ok(Term::Integer(i));
    }
    if let Some(u) = n.as_u64() {
        return Err(ConversionError::IntegerOutOfRange(u));
    }
    // serde_json numbers are always one of i64, u64 or f64.
    Ok(Term::Float(n.as_f64().unwrap_or_default()))
}
