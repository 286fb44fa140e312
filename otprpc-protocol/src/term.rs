//! The wire value model exchanged with remote nodes.
//!
//! A `Term` is a small recursive union modelled on Erlang external terms:
//! atoms, tuples, lists and a handful of primitives. The `Display` impl renders
//! Erlang syntax, which is also the text form used when a reply payload has to
//! be reported as a message rather than as a structured value.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A tagged wire value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Atom(String),
    Tuple(Vec<Term>),
    List(Vec<Term>),
    Integer(i64),
    Float(f64),
    Binary(Vec<u8>),
    String(String),
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    pub fn tuple(elements: impl IntoIterator<Item = Term>) -> Self {
        Term::Tuple(elements.into_iter().collect())
    }

    pub fn list(elements: impl IntoIterator<Item = Term>) -> Self {
        Term::List(elements.into_iter().collect())
    }

    pub fn binary(bytes: impl AsRef<[u8]>) -> Self {
        Term::Binary(bytes.as_ref().to_vec())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Term::String(s.into())
    }

    /// The empty list.
    pub fn nil() -> Self {
        Term::List(Vec::new())
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Atom(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Term]> {
        match self {
            Term::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::List(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Term::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Term::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the textual content of an atom, string or binary.
    ///
    /// Binaries that are not valid UTF-8 are decoded lossily.
    pub fn as_str_lossy(&self) -> Option<Cow<'_, str>> {
        match self {
            Term::Atom(s) | Term::String(s) => Some(Cow::Borrowed(s)),
            Term::Binary(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Term::Tuple(_))
    }

    /// Returns true for the atom `name`.
    pub fn is_atom(&self, name: &str) -> bool {
        self.as_atom() == Some(name)
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Integer(n)
    }
}

impl From<f64> for Term {
    fn from(x: f64) -> Self {
        Term::Float(x)
    }
}

fn atom_needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {
            !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@')
        }
        _ => true,
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str, quote: char) -> fmt::Result {
    write!(f, "{}", quote)?;
    for c in s.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c if c == quote => write!(f, "\\{}", c)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "{}", quote)
}

fn write_seq(f: &mut fmt::Formatter<'_>, elements: &[Term]) -> fmt::Result {
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", element)?;
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(name) if atom_needs_quotes(name) => write_escaped(f, name, '\''),
            Term::Atom(name) => write!(f, "{}", name),
            Term::Tuple(elements) => {
                write!(f, "{{")?;
                write_seq(f, elements)?;
                write!(f, "}}")
            }
            Term::List(elements) => {
                write!(f, "[")?;
                write_seq(f, elements)?;
                write!(f, "]")
            }
            Term::Integer(n) => write!(f, "{}", n),
            Term::Float(x) => write!(f, "{:?}", x),
            Term::String(s) => write_escaped(f, s, '"'),
            Term::Binary(bytes) => {
                write!(f, "<<")?;
                match std::str::from_utf8(bytes) {
                    Ok(text) if !text.is_empty() && !text.chars().any(char::is_control) => {
                        write_escaped(f, text, '"')?;
                    }
                    _ => {
                        for (i, byte) in bytes.iter().enumerate() {
                            if i > 0 {
                                write!(f, ",")?;
                            }
                            write!(f, "{}", byte)?;
                        }
                    }
                }
                write!(f, ">>")
            }
        }
    }
}
