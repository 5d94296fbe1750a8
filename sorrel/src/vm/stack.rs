use crate::common::value::Value;

/// The VM's operand stack. Underflow is a bug in the compiler or the
/// dispatch loop, not in user code, so it panics rather than reports.
#[derive(Debug, Default)]
pub struct Stack {
    pub values: Vec<Value>,
}

impl Stack {
    pub fn new() -> Stack {
        Stack { values: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Value {
        self.values.pop().expect("stack underflow")
    }

    /// The value `distance` slots down from the top.
    pub fn peek(&self, distance: usize) -> &Value {
        &self.values[self.values.len() - 1 - distance]
    }

    pub fn get(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub fn set(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_peek() {
        let mut stack = Stack::new();
        stack.push(Value::Number(1.0));
        stack.push(Value::Number(2.0));

        assert_eq!(stack.peek(0), &Value::Number(2.0));
        assert_eq!(stack.peek(1), &Value::Number(1.0));
        assert_eq!(stack.pop(), Value::Number(2.0));
        assert_eq!(stack.len(), 1);
    }
}
