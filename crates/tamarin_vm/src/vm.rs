use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::chunk::Chunk;
use crate::error::RuntimeError;
use crate::native;
use crate::object::{BoundMethod, LoxClass, LoxFunction, LoxInstance};
use crate::opcode::Op;
use crate::value::{Obj, Value};

/// Initial allocation hint for the value stack (`64 × 256` per the
/// resource-model budget); the `Vec` grows past this on demand and shrinks
/// back down once usage falls below half of a capacity more than double it.
const STACK_INITIAL_CAPACITY: usize = 64 * 256;
const FRAMES_INITIAL_CAPACITY: usize = 64;

/// Hard ceiling on call-frame depth. Recursion this deep is indistinguishable
/// from an infinite loop; without a cap, unbounded recursion would exhaust
/// process memory instead of surfacing as a catchable runtime error.
const FRAMES_HARD_MAX: usize = 16_384;

/// A runtime activation record. `ip` indexes into `function.chunk.code`
/// rather than pointing into it directly, so frames are plain, copyable
/// data with no aliasing concerns.
struct CallFrame {
    function: Rc<LoxFunction>,
    ip: usize,
    slot_base: usize,
}

/// Outcome of a top-level `interpret` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// The stack-based interpreter: a value stack, a call-frame stack, and the
/// globals table. Single-threaded and synchronous — there is exactly one of
/// each, owned outright, no locking.
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: FxHashMap<Rc<str>, Value>,
    init_string: Rc<str>,
}

impl Vm {
    pub fn new() -> Vm {
        let mut globals = FxHashMap::default();
        native::register(&mut globals);
        Vm {
            stack: Vec::with_capacity(STACK_INITIAL_CAPACITY),
            frames: Vec::with_capacity(FRAMES_INITIAL_CAPACITY),
            globals,
            init_string: Rc::from("init"),
        }
    }

    /// Runs a freshly compiled top-level function to completion.
    pub fn run(&mut self, function: Rc<LoxFunction>) -> Result<(), RuntimeError> {
        self.stack.clear();
        self.frames.clear();
        self.push(Value::Object(Obj::Function(function.clone())));
        self.frames.push(CallFrame { function, ip: 0, slot_base: 0 });

        let result = self.run_loop();
        if let Err(err) = &result {
            self.report_runtime_error(err);
            self.stack.clear();
            self.frames.clear();
        }
        self.shrink_if_idle();
        result
    }

    fn report_runtime_error(&self, err: &RuntimeError) {
        eprintln!("{err}");
        for frame in self.frames.iter().rev() {
            let line = frame.function.chunk.line_at(frame.ip.saturating_sub(1));
            let name = frame.function.name.as_deref().unwrap_or("script");
            eprintln!("[line {line}] in {name}");
        }
    }

    fn shrink_if_idle(&mut self) {
        if self.stack.capacity() > 2 * STACK_INITIAL_CAPACITY
            && self.stack.len() <= self.stack.capacity() / 2
        {
            self.stack.shrink_to(STACK_INITIAL_CAPACITY);
        }
        if self.frames.capacity() > 2 * FRAMES_INITIAL_CAPACITY
            && self.frames.len() <= self.frames.capacity() / 2
        {
            self.frames.shrink_to(FRAMES_INITIAL_CAPACITY);
        }
    }

    // ---- stack primitives ----

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("value stack underflow")
    }

    fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }

    // ---- instruction stream reads ----

    fn read_u8(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("read with no active frame");
        let byte = frame.function.chunk.byte_at(frame.ip);
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let frame = self.frames.last_mut().expect("read with no active frame");
        let value = frame.function.chunk.read_u16(frame.ip);
        frame.ip += 2;
        value
    }

    fn read_u24(&mut self) -> usize {
        let frame = self.frames.last_mut().expect("read with no active frame");
        let value = frame.function.chunk.read_u24(frame.ip);
        frame.ip += 3;
        value
    }

    fn read_index(&mut self, long: bool) -> usize {
        if long {
            self.read_u24()
        } else {
            self.read_u8() as usize
        }
    }

    fn chunk(&self) -> &Chunk {
        &self.frames.last().expect("no active frame").function.chunk
    }

    fn read_constant(&mut self, long: bool) -> Value {
        let idx = self.read_index(long);
        self.chunk().constants()[idx].clone()
    }

    fn read_string(&mut self, long: bool) -> Rc<str> {
        match self.read_constant(long) {
            Value::Object(Obj::Str(s)) => s,
            other => unreachable!("name constant must be a string, got {}", other.type_name()),
        }
    }

    // ---- the dispatch loop ----

    fn run_loop(&mut self) -> Result<(), RuntimeError> {
        loop {
            let byte = self.read_u8();
            let op = Op::from_u8(byte).expect("compiled chunk contains an invalid opcode");

            match op {
                Op::Constant => {
                    let v = self.read_constant(false);
                    self.push(v);
                }
                Op::ConstantLong => {
                    let v = self.read_constant(true);
                    self.push(v);
                }
                Op::Nil => self.push(Value::Nil),
                Op::True => self.push(Value::Bool(true)),
                Op::False => self.push(Value::Bool(false)),
                Op::Pop => {
                    self.pop();
                }
                Op::GetLocal => self.get_local(false),
                Op::GetLocalLong => self.get_local(true),
                Op::SetLocal => self.set_local(false),
                Op::SetLocalLong => self.set_local(true),
                Op::GetGlobal => {
                    let name = self.read_string(false);
                    self.get_global(&name)?;
                }
                Op::GetGlobalLong => {
                    let name = self.read_string(true);
                    self.get_global(&name)?;
                }
                Op::DefineGlobal => {
                    let name = self.read_string(false);
                    let value = self.pop();
                    self.globals.insert(name, value);
                }
                Op::DefineGlobalLong => {
                    let name = self.read_string(true);
                    let value = self.pop();
                    self.globals.insert(name, value);
                }
                Op::SetGlobal => {
                    let name = self.read_string(false);
                    self.set_global(name)?;
                }
                Op::SetGlobalLong => {
                    let name = self.read_string(true);
                    self.set_global(name)?;
                }
                Op::GetProperty => {
                    let name = self.read_string(false);
                    self.get_property(&name)?;
                }
                Op::GetPropertyLong => {
                    let name = self.read_string(true);
                    self.get_property(&name)?;
                }
                Op::SetProperty => {
                    let name = self.read_string(false);
                    self.set_property(&name)?;
                }
                Op::SetPropertyLong => {
                    let name = self.read_string(true);
                    self.set_property(&name)?;
                }
                Op::GetSuper => {
                    let name = self.read_string(false);
                    self.get_super(&name)?;
                }
                Op::GetSuperLong => {
                    let name = self.read_string(true);
                    self.get_super(&name)?;
                }
                Op::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                Op::Greater => self.binary_compare(|a, b| a > b)?,
                Op::Less => self.binary_compare(|a, b| a < b)?,
                Op::Add => self.add()?,
                Op::Subtract => self.binary_numeric(|a, b| a - b)?,
                Op::Multiply => self.binary_numeric(|a, b| a * b)?,
                Op::Divide => self.binary_numeric(|a, b| a / b)?,
                Op::Not => {
                    let v = self.pop();
                    self.push(Value::Bool(v.is_falsey()));
                }
                Op::Negate => {
                    let n = self.peek(0).as_number().ok_or(RuntimeError::OperandMustBeNumber)?;
                    self.pop();
                    self.push(Value::Number(-n));
                }
                Op::Print => {
                    let v = self.pop();
                    println!("{v}");
                }
                Op::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().unwrap().ip += offset;
                }
                Op::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().unwrap().ip += offset;
                    }
                }
                Op::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().unwrap().ip -= offset;
                }
                Op::Call => {
                    let argc = self.read_u8() as usize;
                    self.call_value(argc)?;
                }
                Op::Class => {
                    let name = self.read_string(false);
                    self.push_new_class(name);
                }
                Op::ClassLong => {
                    let name = self.read_string(true);
                    self.push_new_class(name);
                }
                Op::Inherit => self.inherit()?,
                Op::Method => {
                    let name = self.read_string(false);
                    self.define_method(name);
                }
                Op::MethodLong => {
                    let name = self.read_string(true);
                    self.define_method(name);
                }
                Op::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("return with no active frame");
                    tracing::trace!(name = frame.function.name.as_deref().unwrap_or("script"), "return");
                    if self.frames.is_empty() {
                        self.pop(); // the script's own callee slot
                        return Ok(());
                    }
                    self.stack.truncate(frame.slot_base);
                    self.push(result);
                }
            }
        }
    }

    fn get_local(&mut self, long: bool) {
        let slot = self.read_index(long);
        let base = self.frames.last().unwrap().slot_base;
        let value = self.stack[base + slot].clone();
        self.push(value);
    }

    fn set_local(&mut self, long: bool) {
        let slot = self.read_index(long);
        let base = self.frames.last().unwrap().slot_base;
        let value = self.peek(0).clone();
        self.stack[base + slot] = value;
    }

    fn get_global(&mut self, name: &Rc<str>) -> Result<(), RuntimeError> {
        match self.globals.get(name) {
            Some(value) => {
                let value = value.clone();
                self.push(value);
                Ok(())
            }
            None => Err(RuntimeError::UndefinedVariable(name.to_string())),
        }
    }

    fn set_global(&mut self, name: Rc<str>) -> Result<(), RuntimeError> {
        if !self.globals.contains_key(&name) {
            return Err(RuntimeError::UndefinedVariable(name.to_string()));
        }
        let value = self.peek(0).clone();
        self.globals.insert(name, value);
        Ok(())
    }

    fn binary_numeric(&mut self, op: fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.peek(0).as_number();
        let a = self.peek(1).as_number();
        match (a, b) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(op(a, b)));
                Ok(())
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    fn binary_compare(&mut self, op: fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let b = self.peek(0).as_number();
        let a = self.peek(1).as_number();
        match (a, b) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Bool(op(a, b)));
                Ok(())
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(_), Value::Number(_)) => self.binary_numeric(|a, b| a + b),
            (Value::Object(Obj::Str(_)), Value::Object(Obj::Str(_))) => {
                let b = self.pop();
                let a = self.pop();
                let (a, b) = match (&a, &b) {
                    (Value::Object(Obj::Str(a)), Value::Object(Obj::Str(b))) => (a, b),
                    _ => unreachable!(),
                };
                let mut combined = String::with_capacity(a.len() + b.len());
                combined.push_str(a);
                combined.push_str(b);
                self.push(Value::string(combined));
                Ok(())
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    fn get_property(&mut self, name: &Rc<str>) -> Result<(), RuntimeError> {
        let instance_rc = match self.peek(0) {
            Value::Object(Obj::Instance(inst)) => inst.clone(),
            _ => return Err(RuntimeError::PropertyAccessOnNonInstance),
        };
        let field = instance_rc.borrow().fields.get(name).cloned();
        if let Some(value) = field {
            self.pop();
            self.push(value);
            return Ok(());
        }
        self.bind_method(&instance_rc, name)
    }

    fn bind_method(
        &mut self,
        instance: &Rc<RefCell<LoxInstance>>,
        name: &Rc<str>,
    ) -> Result<(), RuntimeError> {
        let class = instance.borrow().class.clone();
        let method = class.borrow().methods.get(name).cloned();
        match method {
            Some(method) => {
                self.pop(); // instance
                let bound =
                    BoundMethod { receiver: Value::Object(Obj::Instance(instance.clone())), method };
                self.push(Value::Object(Obj::BoundMethod(Rc::new(bound))));
                Ok(())
            }
            None => Err(RuntimeError::UndefinedProperty(name.to_string())),
        }
    }

    fn set_property(&mut self, name: &Rc<str>) -> Result<(), RuntimeError> {
        let instance_rc = match self.peek(1) {
            Value::Object(Obj::Instance(inst)) => inst.clone(),
            _ => return Err(RuntimeError::PropertyAccessOnNonInstance),
        };
        let value = self.peek(0).clone();
        instance_rc.borrow_mut().fields.insert(name.clone(), value.clone());
        self.pop(); // value
        self.pop(); // instance
        self.push(value);
        Ok(())
    }

    fn get_super(&mut self, name: &Rc<str>) -> Result<(), RuntimeError> {
        let superclass_rc = match self.pop() {
            Value::Object(Obj::Class(c)) => c,
            _ => unreachable!("GET_SUPER operand must be a class"),
        };
        let instance_rc = match self.peek(0) {
            Value::Object(Obj::Instance(inst)) => inst.clone(),
            _ => unreachable!("GET_SUPER receiver must be an instance"),
        };
        let method = superclass_rc.borrow().methods.get(name).cloned();
        match method {
            Some(method) => {
                self.pop(); // receiver
                let bound =
                    BoundMethod { receiver: Value::Object(Obj::Instance(instance_rc)), method };
                self.push(Value::Object(Obj::BoundMethod(Rc::new(bound))));
                Ok(())
            }
            None => Err(RuntimeError::UndefinedProperty(name.to_string())),
        }
    }

    fn push_new_class(&mut self, name: Rc<str>) {
        let class = LoxClass::new(name);
        self.push(Value::Object(Obj::Class(Rc::new(RefCell::new(class)))));
    }

    fn inherit(&mut self) -> Result<(), RuntimeError> {
        let subclass_rc = match self.peek(0) {
            Value::Object(Obj::Class(c)) => c.clone(),
            _ => unreachable!("INHERIT subclass operand must be a class"),
        };
        let superclass_rc = match self.peek(1) {
            Value::Object(Obj::Class(c)) => c.clone(),
            _ => return Err(RuntimeError::SuperclassMustBeClass),
        };
        let inherited = superclass_rc.borrow().methods.clone();
        subclass_rc.borrow_mut().methods.extend(inherited);
        self.pop(); // subclass; superclass stays bound as the enclosing "super" local
        Ok(())
    }

    fn define_method(&mut self, name: Rc<str>) {
        let method_rc = match self.pop() {
            Value::Object(Obj::Function(f)) => f,
            _ => unreachable!("METHOD operand must be a function"),
        };
        let class_rc = match self.peek(0) {
            Value::Object(Obj::Class(c)) => c.clone(),
            _ => unreachable!("METHOD target must be a class"),
        };
        class_rc.borrow_mut().methods.insert(name, method_rc);
    }

    fn call_value(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let callee = self.peek(argc).clone();
        match callee {
            Value::Object(Obj::BoundMethod(bound)) => {
                let slot = self.stack.len() - argc - 1;
                self.stack[slot] = bound.receiver.clone();
                self.call_function(bound.method.clone(), argc)
            }
            Value::Object(Obj::Class(class)) => {
                let instance = Rc::new(RefCell::new(LoxInstance::new(class.clone())));
                let slot = self.stack.len() - argc - 1;
                self.stack[slot] = Value::Object(Obj::Instance(instance));
                let init = class.borrow().methods.get(self.init_string.as_ref()).cloned();
                match init {
                    Some(initializer) => self.call_function(initializer, argc),
                    None if argc == 0 => Ok(()),
                    None => Err(RuntimeError::WrongArity { expected: 0, got: argc }),
                }
            }
            Value::Object(Obj::Function(func)) => self.call_function(func, argc),
            Value::Object(Obj::Native(native)) => {
                let args_start = self.stack.len() - argc;
                let result = (native.func)(&self.stack[args_start..]);
                self.stack.truncate(args_start - 1);
                self.push(result);
                Ok(())
            }
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_function(&mut self, function: Rc<LoxFunction>, argc: usize) -> Result<(), RuntimeError> {
        if argc != function.arity as usize {
            return Err(RuntimeError::WrongArity { expected: function.arity as usize, got: argc });
        }
        if self.frames.len() >= FRAMES_HARD_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        let slot_base = self.stack.len() - argc - 1;
        tracing::trace!(name = function.name.as_deref().unwrap_or("script"), argc, "call");
        self.frames.push(CallFrame { function, ip: 0, slot_base });
        Ok(())
    }
}

impl Default for Vm {
    fn default() -> Vm {
        Vm::new()
    }
}
