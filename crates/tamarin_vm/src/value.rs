use std::fmt;
use std::rc::Rc;

use crate::object::{BoundMethod, LoxClass, LoxFunction, LoxInstance, Native};

/// A runtime value: nil, a bool, an `f64` number, or a reference to a heap
/// object. Object payloads are shared (`Rc`) rather than owned, so copying a
/// `Value` is always cheap — matching spec's "all `Value` reads are by copy
/// of the tagged variant" resource-model note.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Object(Obj),
}

/// The heap-object sum type: string, function, native, class, instance,
/// bound method. `Class` and `Instance` carry `RefCell` because their
/// method/field maps are mutated after construction (`INHERIT`, `METHOD`,
/// `SET_PROPERTY`); every other variant is built once and never mutated.
#[derive(Clone)]
pub enum Obj {
    Str(Rc<str>),
    Function(Rc<LoxFunction>),
    Native(Rc<Native>),
    Class(Rc<std::cell::RefCell<LoxClass>>),
    Instance(Rc<std::cell::RefCell<LoxInstance>>),
    BoundMethod(Rc<BoundMethod>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::Object(Obj::Str(s.into()))
    }

    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&Rc<str>> {
        match self {
            Value::Object(Obj::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Object(Obj::Str(_)) => "string",
            Value::Object(Obj::Function(_)) => "function",
            Value::Object(Obj::Native(_)) => "native function",
            Value::Object(Obj::Class(_)) => "class",
            Value::Object(Obj::Instance(_)) => "instance",
            Value::Object(Obj::BoundMethod(_)) => "bound method",
        }
    }
}

/// Bit-exact for numbers (so `NaN != NaN`, mirroring IEEE-754), by content
/// for strings, by identity (`Rc::ptr_eq`) for every other heap object.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Object(Obj::Str(a)), Value::Object(Obj::Str(b))) => a == b,
            (Value::Object(Obj::Function(a)), Value::Object(Obj::Function(b))) => Rc::ptr_eq(a, b),
            (Value::Object(Obj::Native(a)), Value::Object(Obj::Native(b))) => Rc::ptr_eq(a, b),
            (Value::Object(Obj::Class(a)), Value::Object(Obj::Class(b))) => Rc::ptr_eq(a, b),
            (Value::Object(Obj::Instance(a)), Value::Object(Obj::Instance(b))) => Rc::ptr_eq(a, b),
            (Value::Object(Obj::BoundMethod(a)), Value::Object(Obj::BoundMethod(b))) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

/// Textual form used by `PRINT` and the REPL's expression-statement echo.
/// Numbers use Rust's default `f64` `Display`, which is already the
/// shortest round-trip representation.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Object(Obj::Str(s)) => write!(f, "{s}"),
            Value::Object(Obj::Function(func)) => match &func.name {
                Some(name) => write!(f, "<fn {name}>"),
                None => write!(f, "<script>"),
            },
            Value::Object(Obj::Native(_)) => write!(f, "<native fn>"),
            Value::Object(Obj::Class(class)) => write!(f, "{}", class.borrow().name),
            Value::Object(Obj::Instance(instance)) => {
                write!(f, "{} instance", instance.borrow().class.borrow().name)
            }
            Value::Object(Obj::BoundMethod(bound)) => match &bound.method.name {
                Some(name) => write!(f, "<fn {name}>"),
                None => write!(f, "<script>"),
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
