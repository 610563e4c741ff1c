use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::chunk::Chunk;
use crate::value::Value;

/// A compiled function (or the implicit top-level script, which has
/// `name = None`). Functions capture nothing — the language has no
/// closures/upvalues — so this is the entire callable payload.
pub struct LoxFunction {
    pub arity: u8,
    pub chunk: Chunk,
    pub name: Option<Rc<str>>,
}

impl LoxFunction {
    pub fn new(name: Option<Rc<str>>, arity: u8, chunk: Chunk) -> LoxFunction {
        LoxFunction { arity, chunk, name }
    }
}

pub type NativeFn = fn(&[Value]) -> Value;

/// A host-provided callable, invoked with the full argument slice regardless
/// of how many arguments the call site passed.
pub struct Native {
    pub name: &'static str,
    pub func: NativeFn,
}

/// A class's identity and its method table. `methods` is mutated after
/// construction by `INHERIT` (copying the superclass's entries in) and by
/// `METHOD` (installing each compiled method), so it lives behind the
/// class's own `RefCell` rather than the class being rebuilt each time.
pub struct LoxClass {
    pub name: Rc<str>,
    pub methods: FxHashMap<Rc<str>, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(name: Rc<str>) -> LoxClass {
        LoxClass { name, methods: FxHashMap::default() }
    }
}

/// A live object: a reference to its class plus its own field map. Fields
/// are created on first assignment and shadow methods of the same name on
/// read (spec's `GET_PROPERTY` rule).
pub struct LoxInstance {
    pub class: Rc<RefCell<LoxClass>>,
    pub fields: FxHashMap<Rc<str>, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<RefCell<LoxClass>>) -> LoxInstance {
        LoxInstance { class, fields: FxHashMap::default() }
    }
}

/// A method value bound to a specific receiver, produced by reading a
/// method off an instance as a value. Calling it installs `receiver` as
/// slot 0 of the callee's frame, exactly as a direct method call would.
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Rc<LoxFunction>,
}
