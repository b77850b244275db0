// src/data/variant.rs

//! Implements [`Variant`], the tagged value recorded for a field.
//!
//! A `Variant` converts between its kinds following fixed coercion rules:
//!
//! | from \ to        | `b()`                                 | `i()`           | `s()`                 | `as_()`              |
//! |------------------|---------------------------------------|-----------------|-----------------------|----------------------|
//! | `Bool`           | itself                                | `0`/`1`         | `"true"`/`"false"`    | `[s()]` if true      |
//! | `Int`            | `!= 0`                                | itself          | decimal               | `[s()]` if true      |
//! | `UInt`           | `!= 0`                                | wrapping cast   | decimal               | `[s()]` if true      |
//! | `Str`            | non-empty, not `"0"`, not `"false"`   | parsed or `0`   | itself                | `[s()]` if true      |
//! | `StrList`        | non-empty                             | length          | first element or `""` | itself               |
//! | `StrListList`    | non-empty                             | length          | first of first or `""`| first list or `[]`   |
//! | `Invalid`        | `false`                               | `0`             | `""`                  | `[]`                 |

use std::fmt;

/// A value of one of the kinds a field may hold.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum Variant {
    /// never set
    #[default]
    Invalid,
    Bool(bool),
    Int(i32),
    UInt(u32),
    Str(String),
    StrList(Vec<String>),
    StrListList(Vec<Vec<String>>),
}

/// The kind of a [`Variant`], without its payload.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VariantType {
    Invalid,
    Bool,
    Int,
    UInt,
    Str,
    StrList,
    StrListList,
}

impl Variant {
    pub fn type_(&self) -> VariantType {
        match self {
            Variant::Invalid => VariantType::Invalid,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::UInt(_) => VariantType::UInt,
            Variant::Str(_) => VariantType::Str,
            Variant::StrList(_) => VariantType::StrList,
            Variant::StrListList(_) => VariantType::StrListList,
        }
    }

    /// `false` only for a `Variant` that was never set. A `Variant` set to a
    /// falsy value like `Bool(false)` is valid.
    pub const fn is_valid(&self) -> bool {
        !matches!(self, Variant::Invalid)
    }

    /// Boolean coercion.
    pub fn b(&self) -> bool {
        match self {
            Variant::Invalid => false,
            Variant::Bool(b) => *b,
            Variant::Int(i) => *i != 0,
            Variant::UInt(u) => *u != 0,
            Variant::Str(s) => str_is_truthy(s),
            Variant::StrList(l) => !l.is_empty(),
            Variant::StrListList(l) => !l.is_empty(),
        }
    }

    /// Signed integer coercion.
    pub fn i(&self) -> i32 {
        match self {
            Variant::Invalid => 0,
            Variant::Bool(b) => *b as i32,
            Variant::Int(i) => *i,
            Variant::UInt(u) => *u as i32,
            Variant::Str(s) => parse_leading_i32(s),
            Variant::StrList(l) => l.len() as i32,
            Variant::StrListList(l) => l.len() as i32,
        }
    }

    /// Unsigned integer coercion. Negative values become `0`.
    pub fn u(&self) -> u32 {
        match self {
            Variant::UInt(u) => *u,
            _ => {
                let i = self.i();
                if i < 0 { 0 } else { i as u32 }
            }
        }
    }

    /// String coercion.
    pub fn s(&self) -> String {
        match self {
            Variant::Invalid => String::new(),
            Variant::Bool(b) => String::from(if *b { "true" } else { "false" }),
            Variant::Int(i) => i.to_string(),
            Variant::UInt(u) => u.to_string(),
            Variant::Str(s) => s.clone(),
            Variant::StrList(l) => l.first().cloned().unwrap_or_default(),
            Variant::StrListList(l) => l
                .first()
                .and_then(|l2| l2.first())
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// String list coercion. A scalar becomes a one-element list only when
    /// its boolean coercion is `true`.
    pub fn as_(&self) -> Vec<String> {
        match self {
            Variant::StrList(l) => l.clone(),
            Variant::StrListList(l) => l.first().cloned().unwrap_or_default(),
            _ => {
                if self.b() {
                    vec![self.s()]
                } else {
                    Vec::with_capacity(0)
                }
            }
        }
    }

    /// List of string lists coercion.
    pub fn aas(&self) -> Vec<Vec<String>> {
        match self {
            Variant::StrListList(l) => l.clone(),
            _ => {
                if self.b() {
                    vec![self.as_()]
                } else {
                    Vec::with_capacity(0)
                }
            }
        }
    }
}

/// A string is truthy when non-empty and not `"0"` or any casing of
/// `"false"`.
fn str_is_truthy(s: &str) -> bool {
    !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
}

/// Parse the leading decimal integer of `s` after optional whitespace and
/// sign, `0` when there is none. Saturates at the `i32` bounds.
fn parse_leading_i32(s: &str) -> i32 {
    let s = s.trim_start();
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut val: i64 = 0;
    for c in digits.bytes() {
        if !c.is_ascii_digit() {
            break;
        }
        val = val * 10 + (c - b'0') as i64;
        if val > i32::MAX as i64 + 1 {
            break;
        }
    }
    if neg {
        val = -val;
    }
    val.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::StrList(l) => write!(f, "[{}]", l.join(", ")),
            Variant::StrListList(l) => {
                write!(f, "[")?;
                for (i, l2) in l.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}]", l2.join(", "))?;
                }
                write!(f, "]")
            }
            _ => write!(f, "{}", self.s()),
        }
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Bool(b)
    }
}

impl From<i32> for Variant {
    fn from(i: i32) -> Self {
        Variant::Int(i)
    }
}

impl From<u32> for Variant {
    fn from(u: u32) -> Self {
        Variant::UInt(u)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::Str(String::from(s))
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::Str(s)
    }
}

impl From<Vec<String>> for Variant {
    fn from(l: Vec<String>) -> Self {
        Variant::StrList(l)
    }
}

impl From<Vec<Vec<String>>> for Variant {
    fn from(l: Vec<Vec<String>>) -> Self {
        Variant::StrListList(l)
    }
}
