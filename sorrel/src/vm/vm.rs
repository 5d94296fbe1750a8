use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::common::heap::{Handle, Heap, MapObj, Object};
use crate::common::native::{InnerFn, NativeFunction};
use crate::common::opcode::Opcode;
use crate::common::source::Source;
use crate::common::table::Table;
use crate::common::value::Value;
use crate::config::Config;
use crate::vm::stack::Stack;
use crate::vm::trace::Trace;

pub const MAX_FRAMES: usize = 64;
pub const MAX_STACK: usize = MAX_FRAMES * 256;

/// One function activation: which function, where in its bytecode, and
/// where its locals start on the shared stack.
#[derive(Debug, Clone, Copy)]
struct CallFrame {
    fun: Handle,
    ip: usize,
    offset: usize,
}

macro_rules! binary_op {
    ($self:ident, $op:tt, $wrap:expr) => {{
        let b = $self.stack.pop();
        let a = $self.stack.pop();
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => $self.stack.push($wrap(a $op b)),
            _ => return Err($self.error("Operands must be numbers.")),
        }
    }};
}

pub struct VM {
    pub config: Rc<Config>,
    pub heap: Heap,
    stack: Stack,
    frames: Vec<CallFrame>,
    globals: Table,
    /// The source of the script being executed, for runtime traces.
    pub(crate) source: Option<Rc<Source>>,
    /// Offset of the opcode currently executing, so errors can recover
    /// its line and column from the chunk.
    current_op: usize,
}

impl VM {
    pub fn new() -> VM {
        VM::with_config(Rc::new(Config::new()))
    }

    pub fn with_config(config: Rc<Config>) -> VM {
        let mut vm = VM {
            config,
            heap: Heap::new(),
            stack: Stack::new(),
            frames: Vec::new(),
            globals: Table::new(),
            source: None,
            current_op: 0,
        };

        vm.load_natives();
        vm
    }

    fn load_natives(&mut self) {
        let clock: Rc<InnerFn> = Rc::new(|_, _| {
            let seconds = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs_f64())
                .unwrap_or(0.0);
            Ok(Value::Number(seconds))
        });
        self.define_native(NativeFunction::new("clock", 0, clock));
    }

    /// Expose a native function to scripts as a global.
    pub fn define_native(&mut self, native: NativeFunction) {
        let name = self.heap.copy_string(&native.name);
        let hash = self.heap.get_str(name).hash;
        self.globals.set(name, hash, Value::NativeFun(native));
    }

    /// Host access to the operand stack, for passing values in and
    /// reading results out.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Value {
        self.stack.pop()
    }

    /// Run a compiled script to completion or to its first fatal
    /// error. On error the stack and frames are reset, so the VM can
    /// execute another script afterwards.
    pub fn execute(&mut self, script: Handle) -> Result<Value, Trace> {
        self.stack.push(Value::Object(script));
        self.call(script, 0)?;
        self.run()
    }

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no call frame")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("no call frame")
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frame();
        let byte = self.heap.get_fun(frame.fun).chunk.code[frame.ip];
        self.frame_mut().ip += 1;
        byte
    }

    fn read_short(&mut self) -> u16 {
        u16::from_be_bytes([self.read_byte(), self.read_byte()])
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        self.heap.get_fun(self.frame().fun).chunk.constants.values[index].clone()
    }

    /// Read an identifier constant: the interned name and its hash.
    fn read_name(&mut self) -> (Handle, u32) {
        match self.read_constant() {
            Value::Object(handle) => {
                let hash = self.heap.get_str(handle).hash;
                (handle, hash)
            }
            other => panic!("identifier constant is not a string: {:?}", other),
        }
    }

    fn is_string(&self, handle: Handle) -> bool {
        matches!(self.heap.get(handle), Object::Str(_))
    }

    fn is_map(&self, handle: Handle) -> bool {
        matches!(self.heap.get(handle), Object::Map(_))
    }

    /// Render a value for `print`, resolving object handles.
    pub fn stringify(&self, value: &Value) -> String {
        match value {
            Value::Object(handle) => match self.heap.get(*handle) {
                Object::Str(string) => string.chars.to_string(),
                Object::Fun(fun) => match fun.name {
                    Some(name) => format!("<fn {}>", self.heap.get_str(name).chars),
                    None => "<script>".to_string(),
                },
                Object::Map(_) => "<map>".to_string(),
            },
            _ => value.to_string(),
        }
    }

    /// Build a runtime error from the current frame stack, then reset
    /// the machine so it stays usable.
    fn error(&mut self, message: impl Into<String>) -> Trace {
        let mut trace = Trace::new(message);
        let path = self
            .source
            .as_ref()
            .map(|source| source.file_name())
            .unwrap_or_else(|| "script".to_string());

        let innermost = self.frames.len().saturating_sub(1);
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            let fun = self.heap.get_fun(frame.fun);
            let chunk = &fun.chunk;

            // The innermost frame failed at the current opcode; the
            // callers are suspended just past their Call operand.
            let index = if depth == innermost {
                self.current_op
            } else {
                frame.ip.saturating_sub(2)
            };

            let (line, column) = if chunk.lines.is_empty() {
                (0, 0)
            } else {
                let index = index.min(chunk.lines.len() - 1);
                (chunk.lines[index], chunk.columns[index])
            };

            let location = match fun.name {
                Some(name) => format!("in {}()", self.heap.get_str(name).chars),
                None => "in script".to_string(),
            };
            trace
                .calls
                .push(format!("[{}:{}:{}] {}", path, line, column, location));
        }

        self.stack.clear();
        self.frames.clear();
        trace
    }

    fn call(&mut self, fun: Handle, arg_count: u8) -> Result<(), Trace> {
        let arity = self.heap.get_fun(fun).arity;
        if arg_count != arity {
            return Err(self.error(format!(
                "Expected {} arguments but got {}.",
                arity, arg_count
            )));
        }

        if self.frames.len() == MAX_FRAMES || self.stack.len() > MAX_STACK {
            return Err(self.error("Stack overflow."));
        }

        self.frames.push(CallFrame {
            fun,
            ip: 0,
            offset: self.stack.len() - arg_count as usize - 1,
        });
        Ok(())
    }

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), Trace> {
        match callee {
            Value::Object(handle) if matches!(self.heap.get(handle), Object::Fun(_)) => {
                self.call(handle, arg_count)
            }
            Value::NativeFun(native) => {
                if arg_count != native.arity {
                    return Err(self.error(format!(
                        "Expected {} arguments but got {}.",
                        native.arity, arg_count
                    )));
                }

                let split = self.stack.len() - arg_count as usize;
                let args = self.stack.values.split_off(split);
                self.stack.pop(); // the callee
                let result = match native.call(self, args) {
                    Ok(value) => value,
                    Err(trace) => {
                        self.stack.clear();
                        self.frames.clear();
                        return Err(trace);
                    }
                };
                self.stack.push(result);
                Ok(())
            }
            _ => Err(self.error("Can only call functions.")),
        }
    }

    /// Mark everything reachable from the VM's roots and sweep. Runs
    /// between instructions only, so every live value is either on the
    /// stack, in a frame, or in the globals.
    pub fn collect_garbage(&mut self) {
        for value in self.stack.values.iter() {
            self.heap.mark_value(value);
        }
        for frame in self.frames.iter() {
            self.heap.mark_object(frame.fun);
        }
        let globals = &self.globals;
        self.heap.mark_table(globals);

        self.heap.trace_references();
        self.heap.sweep();
    }

    fn maybe_collect(&mut self) {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    fn run(&mut self) -> Result<Value, Trace> {
        loop {
            self.current_op = self.frame().ip;

            match Opcode::from(self.read_byte()) {
                Opcode::LoadConst => {
                    let constant = self.read_constant();
                    self.stack.push(constant);
                }
                Opcode::Del => {
                    self.stack.pop();
                }

                Opcode::True => self.stack.push(Value::Boolean(true)),
                Opcode::False => self.stack.push(Value::Boolean(false)),
                Opcode::Nil => self.stack.push(Value::Nil),

                Opcode::Neg => match self.stack.pop() {
                    Value::Number(num) => self.stack.push(Value::Number(-num)),
                    _ => return Err(self.error("Operand must be a number.")),
                },
                Opcode::Not => {
                    let value = self.stack.pop();
                    self.stack.push(Value::Boolean(value.is_falsey()));
                }

                Opcode::Add => {
                    let result = match (self.stack.peek(1), self.stack.peek(0)) {
                        (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                        (Value::Object(a), Value::Object(b))
                            if self.is_string(*a) && self.is_string(*b) =>
                        {
                            let (a, b) = (*a, *b);
                            // The operands stay on the stack while we
                            // may collect, keeping them rooted.
                            self.maybe_collect();
                            let mut text = self.heap.get_str(a).chars.to_string();
                            text.push_str(&self.heap.get_str(b).chars);
                            Value::Object(self.heap.take_string(text))
                        }
                        _ => {
                            return Err(
                                self.error("Operands must be two numbers or two strings.")
                            )
                        }
                    };
                    self.stack.pop();
                    self.stack.pop();
                    self.stack.push(result);
                }
                Opcode::Sub => binary_op!(self, -, Value::Number),
                Opcode::Mul => binary_op!(self, *, Value::Number),
                Opcode::Div => binary_op!(self, /, Value::Number),
                Opcode::CmpLT => binary_op!(self, <, Value::Boolean),
                Opcode::CmpLTEq => binary_op!(self, <=, Value::Boolean),
                Opcode::CmpEq => {
                    let b = self.stack.pop();
                    let a = self.stack.pop();
                    self.stack.push(Value::Boolean(a == b));
                }

                Opcode::DefGlobal => {
                    let (name, hash) = self.read_name();
                    let value = self.stack.pop();
                    self.globals.set(name, hash, value);
                }
                Opcode::LoadGlobal => {
                    let (name, hash) = self.read_name();
                    match self.globals.get(name, hash) {
                        Some(value) => {
                            let value = value.clone();
                            self.stack.push(value);
                        }
                        None => {
                            let name = self.heap.get_str(name).chars.to_string();
                            return Err(self.error(format!("Undefined variable '{}'.", name)));
                        }
                    }
                }
                Opcode::SaveGlobal => {
                    let (name, hash) = self.read_name();
                    let value = self.stack.peek(0).clone();
                    if self.globals.set(name, hash, value) {
                        // Assignment cannot create a global.
                        self.globals.remove(name, hash);
                        let name = self.heap.get_str(name).chars.to_string();
                        return Err(self.error(format!("Undefined variable '{}'.", name)));
                    }
                }

                Opcode::LoadLocal => {
                    let slot = self.read_byte() as usize;
                    let value = self.stack.get(self.frame().offset + slot).clone();
                    self.stack.push(value);
                }
                Opcode::SaveLocal => {
                    let slot = self.read_byte() as usize;
                    let index = self.frame().offset + slot;
                    let value = self.stack.peek(0).clone();
                    self.stack.set(index, value);
                }

                Opcode::JumpIfFalse => {
                    let offset = self.read_short() as usize;
                    if self.stack.peek(0).is_falsey() {
                        self.frame_mut().ip += offset;
                    }
                }
                Opcode::Jump => {
                    let offset = self.read_short() as usize;
                    self.frame_mut().ip += offset;
                }

                Opcode::Call => {
                    let arg_count = self.read_byte();
                    let callee = self.stack.peek(arg_count as usize).clone();
                    self.call_value(callee, arg_count)?;
                }
                Opcode::Return => {
                    let result = self.stack.pop();
                    let frame = self.frames.pop().expect("no call frame");
                    self.stack.truncate(frame.offset);

                    if self.frames.is_empty() {
                        return Ok(result);
                    }
                    self.stack.push(result);
                }

                Opcode::BuildMap => {
                    let count = self.read_byte() as usize;
                    // The elements are still stack-rooted here.
                    self.maybe_collect();

                    let handle = self.heap.alloc(Object::Map(MapObj::default()));
                    let split = self.stack.len() - count;
                    let values = self.stack.values.split_off(split);
                    let map = self.heap.get_map_mut(handle);
                    for (index, value) in values.into_iter().enumerate() {
                        map.index.set((index as f64).to_bits(), value);
                    }
                    self.stack.push(Value::Object(handle));
                }
                Opcode::LoadField => {
                    let (name, hash) = self.read_name();
                    let object = self.stack.pop();
                    let value = match object {
                        Value::Object(handle) if self.is_map(handle) => self
                            .heap
                            .get_map(handle)
                            .fields
                            .get(name, hash)
                            .cloned()
                            .unwrap_or(Value::Nil),
                        _ => return Err(self.error("Only maps have fields.")),
                    };
                    self.stack.push(value);
                }
                Opcode::SaveField => {
                    let (name, hash) = self.read_name();
                    let value = self.stack.pop();
                    let object = self.stack.pop();
                    match object {
                        Value::Object(handle) if self.is_map(handle) => {
                            self.heap
                                .get_map_mut(handle)
                                .fields
                                .set(name, hash, value.clone());
                        }
                        _ => return Err(self.error("Only maps have fields.")),
                    }
                    self.stack.push(value);
                }
                Opcode::LoadIndex => {
                    let key = self.stack.pop();
                    let object = self.stack.pop();
                    let map = match object {
                        Value::Object(handle) if self.is_map(handle) => handle,
                        _ => return Err(self.error("Only maps can be indexed.")),
                    };
                    let value = match key {
                        Value::Number(num) => self
                            .heap
                            .get_map(map)
                            .index
                            .get(num.to_bits())
                            .cloned()
                            .unwrap_or(Value::Nil),
                        Value::Object(handle) if self.is_string(handle) => {
                            let hash = self.heap.get_str(handle).hash;
                            self.heap
                                .get_map(map)
                                .fields
                                .get(handle, hash)
                                .cloned()
                                .unwrap_or(Value::Nil)
                        }
                        _ => {
                            return Err(
                                self.error("Maps can only be indexed by numbers or strings.")
                            )
                        }
                    };
                    self.stack.push(value);
                }
                Opcode::SaveIndex => {
                    let value = self.stack.pop();
                    let key = self.stack.pop();
                    let object = self.stack.pop();
                    let map = match object {
                        Value::Object(handle) if self.is_map(handle) => handle,
                        _ => return Err(self.error("Only maps can be indexed.")),
                    };
                    match key {
                        Value::Number(num) => {
                            self.heap
                                .get_map_mut(map)
                                .index
                                .set(num.to_bits(), value.clone());
                        }
                        Value::Object(handle) if self.is_string(handle) => {
                            let hash = self.heap.get_str(handle).hash;
                            self.heap
                                .get_map_mut(map)
                                .fields
                                .set(handle, hash, value.clone());
                        }
                        _ => {
                            return Err(
                                self.error("Maps can only be indexed by numbers or strings.")
                            )
                        }
                    }
                    self.stack.push(value);
                }

                Opcode::Print => {
                    let count = self.read_byte() as usize;
                    let split = self.stack.len() - count;
                    let values = self.stack.values.split_off(split);
                    let line = values
                        .iter()
                        .map(|value| self.stringify(value))
                        .collect::<Vec<_>>()
                        .join(" ");
                    self.config.stdout.write(&line);
                }

                // TODO: closures. The opcode is reserved but the
                // compiler has no capture scheme yet.
                Opcode::Closure => unreachable!("Closure is never emitted"),
            }
        }
    }
}

impl Default for VM {
    fn default() -> Self {
        VM::new()
    }
}
