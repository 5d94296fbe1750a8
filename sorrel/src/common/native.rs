use std::fmt;
use std::rc::Rc;

use crate::common::value::Value;
use crate::vm::trace::Trace;
use crate::vm::vm::VM;

pub type InnerFn = dyn Fn(&mut VM, Vec<Value>) -> Result<Value, Trace>;

/// A function implemented in Rust and exposed to scripts.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: Box<str>,
    pub fun: Rc<InnerFn>,
    pub arity: u8,
}

impl NativeFunction {
    pub fn new(name: &str, arity: u8, fun: Rc<InnerFn>) -> Self {
        NativeFunction {
            name: name.into(),
            fun,
            arity,
        }
    }

    pub fn call(&self, vm: &mut VM, args: Vec<Value>) -> Result<Value, Trace> {
        (self.fun)(vm, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.fun, &other.fun)
    }
}
