use std::fmt;

use crate::common::heap::Handle;
use crate::common::native::NativeFunction;

/// A Sorrel runtime value.
///
/// Values are copied by value everywhere: stack slots, constants and
/// table entries all hold their own `Value`. Object-typed values carry
/// a handle into the [`Heap`][crate::common::heap::Heap], not the
/// object itself, so cloning one never clones heap data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    NativeFun(NativeFunction),
    Object(Handle),
}

impl Value {
    /// Only `nil` and `false` are falsey; everything else is truthy.
    #[inline]
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Boolean(false))
    }
}

impl From<f64> for Value {
    fn from(num: f64) -> Self {
        Value::Number(num)
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Boolean(val)
    }
}

impl From<Handle> for Value {
    fn from(handle: Handle) -> Self {
        Value::Object(handle)
    }
}

impl fmt::Display for Value {
    /// Heap-free rendering; the VM's `stringify` resolves object
    /// handles to their contents.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Boolean(false) => f.write_str("false"),
            Value::Boolean(true) => f.write_str("true"),
            Value::Number(num) => write!(f, "{}", num),
            Value::NativeFun(_) => f.write_str("<native fn>"),
            Value::Object(_) => f.write_str("<object>"),
        }
    }
}

/// A chunk's constant pool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueArray {
    pub values: Vec<Value>,
}

impl ValueArray {
    pub fn new() -> Self {
        ValueArray { values: Vec::new() }
    }

    /// Append a value, returning its index. With `allow_dup` off, an
    /// equal value already in the pool is reused instead (object
    /// values compare by handle identity, so interned strings
    /// deduplicate too).
    pub fn add(&mut self, value: Value, allow_dup: bool) -> usize {
        if !allow_dup {
            for (index, existing) in self.values.iter().enumerate() {
                if *existing == value {
                    return index;
                }
            }
        }

        self.values.push(value);
        self.values.len() - 1
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(Value::Nil.is_falsey());
        assert!(Value::Boolean(false).is_falsey());
        assert!(!Value::Boolean(true).is_falsey());
        assert!(!Value::Number(0.0).is_falsey());
    }

    #[test]
    fn constant_dedup() {
        let mut constants = ValueArray::new();
        let a = constants.add(Value::Number(1.0), false);
        let b = constants.add(Value::Number(2.0), false);
        let c = constants.add(Value::Number(1.0), false);

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(constants.len(), 2);
    }

    #[test]
    fn constant_allow_dup() {
        let mut constants = ValueArray::new();
        constants.add(Value::Number(1.0), true);
        constants.add(Value::Number(1.0), true);
        assert_eq!(constants.len(), 2);
    }
}
