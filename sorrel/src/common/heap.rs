use std::fmt;

use crate::common::chunk::Chunk;
use crate::common::table::{HashIndex, Table};
use crate::common::value::Value;

/// Collection doesn't run until this many bytes are live.
const INITIAL_GC_THRESHOLD: usize = 1 << 20;

/// FNV-1a.
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// An index into the [`Heap`]'s slot arena.
///
/// The generation is checked on every dereference, so a handle that
/// outlives its object trips an assertion instead of reading whatever
/// was allocated into the reused slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub fn new(index: u32, generation: u32) -> Handle {
        Handle { index, generation }
    }
}

/// An interned string. The hash is computed once, at intern time.
#[derive(Debug, Clone, PartialEq)]
pub struct StrObj {
    pub chars: Box<str>,
    pub hash: u32,
}

/// A compiled function: its bytecode plus arity and name.
#[derive(Debug, Clone, PartialEq)]
pub struct FunObj {
    pub arity: u8,
    pub chunk: Chunk,
    /// Interned name, `None` for the top-level script.
    pub name: Option<Handle>,
}

/// A map. String keys live in `fields`, number keys in `index`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapObj {
    pub fields: Table,
    pub index: HashIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Str(StrObj),
    Fun(FunObj),
    Map(MapObj),
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    /// Byte size charged against the heap when this slot was filled.
    size: usize,
    marked: bool,
    object: Option<Object>,
}

/// The garbage-collected object heap.
///
/// Objects live in a slot arena addressed by [`Handle`]s. Freed slots
/// go on a free list and are reused with a bumped generation. The
/// string intern table is weak: an unreachable string is dropped from
/// it during the sweep.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Interned strings, keyed by their own handles.
    strings: Table,
    gray: Vec<Handle>,
    allocated: usize,
    next_gc: usize,
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            strings: Table::new(),
            gray: Vec::new(),
            allocated: 0,
            next_gc: INITIAL_GC_THRESHOLD,
        }
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Whether enough has been allocated since the last collection
    /// that the caller should mark its roots and collect.
    pub fn should_collect(&self) -> bool {
        self.allocated > self.next_gc
    }

    fn size_of(object: &Object) -> usize {
        let extra = match object {
            Object::Str(string) => string.chars.len(),
            Object::Fun(fun) => {
                fun.chunk.code.len() * 3 + fun.chunk.constants.len() * std::mem::size_of::<Value>()
            }
            Object::Map(_) => 0,
        };
        std::mem::size_of::<Object>() + extra
    }

    pub fn alloc(&mut self, object: Object) -> Handle {
        let size = Heap::size_of(&object);
        self.allocated += size;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.size = size;
            slot.marked = false;
            slot.object = Some(object);
            Handle::new(index, slot.generation)
        } else {
            self.slots.push(Slot {
                generation: 0,
                size,
                marked: false,
                object: Some(object),
            });
            Handle::new((self.slots.len() - 1) as u32, 0)
        }
    }

    pub fn get(&self, handle: Handle) -> &Object {
        let slot = &self.slots[handle.index as usize];
        assert_eq!(slot.generation, handle.generation, "stale handle");
        slot.object.as_ref().expect("handle to freed slot")
    }

    pub fn get_mut(&mut self, handle: Handle) -> &mut Object {
        let slot = &mut self.slots[handle.index as usize];
        assert_eq!(slot.generation, handle.generation, "stale handle");
        slot.object.as_mut().expect("handle to freed slot")
    }

    pub fn get_str(&self, handle: Handle) -> &StrObj {
        match self.get(handle) {
            Object::Str(string) => string,
            _ => panic!("handle is not a string"),
        }
    }

    pub fn get_fun(&self, handle: Handle) -> &FunObj {
        match self.get(handle) {
            Object::Fun(fun) => fun,
            _ => panic!("handle is not a function"),
        }
    }

    pub fn get_map(&self, handle: Handle) -> &MapObj {
        match self.get(handle) {
            Object::Map(map) => map,
            _ => panic!("handle is not a map"),
        }
    }

    pub fn get_map_mut(&mut self, handle: Handle) -> &mut MapObj {
        match self.get_mut(handle) {
            Object::Map(map) => map,
            _ => panic!("handle is not a map"),
        }
    }

    /// Intern a string, copying it. Returns the existing handle if an
    /// equal string was interned before.
    pub fn copy_string(&mut self, chars: &str) -> Handle {
        let hash = hash_bytes(chars.as_bytes());
        if let Some(handle) = self.find_string(chars, hash) {
            return handle;
        }
        self.intern(chars.into(), hash)
    }

    /// Intern a string, taking ownership of an already-built buffer.
    /// Used for concatenation results.
    pub fn take_string(&mut self, chars: String) -> Handle {
        let hash = hash_bytes(chars.as_bytes());
        if let Some(handle) = self.find_string(&chars, hash) {
            return handle;
        }
        self.intern(chars.into_boxed_str(), hash)
    }

    /// Probe the intern table by content rather than by handle.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<Handle> {
        let entries = self.strings.entries_raw();
        if entries.is_empty() {
            return None;
        }

        let capacity = entries.len();
        let mut index = hash as usize % capacity;
        loop {
            let entry = &entries[index];
            match entry.key {
                None => {
                    // Stop at a truly empty entry, but skip tombstones.
                    if matches!(entry.value, Value::Nil) {
                        return None;
                    }
                }
                Some(key) => {
                    if entry.hash == hash && &*self.get_str(key).chars == chars {
                        return Some(key);
                    }
                }
            }

            index = (index + 1) % capacity;
        }
    }

    fn intern(&mut self, chars: Box<str>, hash: u32) -> Handle {
        let handle = self.alloc(Object::Str(StrObj { chars, hash }));
        self.strings.set(handle, hash, Value::Nil);
        handle
    }

    pub fn mark_value(&mut self, value: &Value) {
        if let Value::Object(handle) = value {
            self.mark_object(*handle);
        }
    }

    pub fn mark_object(&mut self, handle: Handle) {
        let slot = &mut self.slots[handle.index as usize];
        if slot.marked {
            return;
        }
        slot.marked = true;
        self.gray.push(handle);
    }

    pub fn mark_table(&mut self, table: &Table) {
        for (key, value) in table.iter() {
            self.mark_object(key);
            self.mark_value(value);
        }
    }

    /// Drain the gray worklist, marking everything reachable from it.
    pub fn trace_references(&mut self) {
        while let Some(handle) = self.gray.pop() {
            self.blacken(handle);
        }
    }

    fn blacken(&mut self, handle: Handle) {
        let mut children: Vec<Handle> = Vec::new();

        match self.get(handle) {
            Object::Str(_) => {}
            Object::Fun(fun) => {
                if let Some(name) = fun.name {
                    children.push(name);
                }
                for constant in &fun.chunk.constants.values {
                    if let Value::Object(child) = constant {
                        children.push(*child);
                    }
                }
            }
            Object::Map(map) => {
                for (key, value) in map.fields.iter() {
                    children.push(key);
                    if let Value::Object(child) = value {
                        children.push(*child);
                    }
                }
                for value in map.index.values() {
                    if let Value::Object(child) = value {
                        children.push(*child);
                    }
                }
            }
        }

        for child in children {
            self.mark_object(child);
        }
    }

    /// Free every unmarked slot and clear the marks on the survivors.
    /// Callers mark their roots and run [`trace_references`] first.
    ///
    /// [`trace_references`]: Heap::trace_references
    pub fn sweep(&mut self) {
        // Unmarked interned strings are about to die; unlink them so
        // the intern table never hands out a freed handle.
        {
            let slots = &self.slots;
            self.strings
                .retain(|key| slots[key.index() as usize].marked);
        }

        let Heap {
            slots,
            free,
            allocated,
            ..
        } = self;

        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.object.is_none() {
                continue;
            }

            if slot.marked {
                slot.marked = false;
            } else {
                slot.object = None;
                slot.generation += 1;
                *allocated -= slot.size;
                slot.size = 0;
                free.push(index as u32);
            }
        }

        self.next_gc = std::cmp::max(self.allocated * 2, INITIAL_GC_THRESHOLD);
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Handle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_known_values() {
        assert_eq!(hash_bytes(b""), 2166136261);
        assert_eq!(hash_bytes(b"a"), 0xe40c292c);
        assert_eq!(hash_bytes(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn interning_dedups() {
        let mut heap = Heap::new();
        let a = heap.copy_string("hello");
        let b = heap.copy_string("hello");
        let c = heap.copy_string("world");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(&*heap.get_str(a).chars, "hello");
    }

    #[test]
    fn take_string_finds_existing() {
        let mut heap = Heap::new();
        let a = heap.copy_string("abc");
        let b = heap.take_string(String::from("abc"));
        assert_eq!(a, b);
    }

    #[test]
    fn collect_frees_unreachable() {
        let mut heap = Heap::new();
        let keep = heap.copy_string("keep");
        let drop = heap.copy_string("drop");
        let before = heap.allocated();

        heap.mark_object(keep);
        heap.trace_references();
        heap.sweep();

        assert!(heap.allocated() < before);
        assert_eq!(&*heap.get_str(keep).chars, "keep");

        // The dead string also left the intern table.
        let hash = hash_bytes(b"drop");
        assert_eq!(heap.find_string("drop", hash), None);
        let _ = drop;
    }

    #[test]
    fn freed_slot_is_reused_with_new_generation() {
        let mut heap = Heap::new();
        let stale = heap.copy_string("ephemeral");

        heap.trace_references();
        heap.sweep();

        let fresh = heap.copy_string("replacement");
        assert_eq!(fresh.index(), stale.index());
        assert_eq!(fresh.generation(), stale.generation() + 1);
    }

    #[test]
    fn map_children_survive_collection() {
        let mut heap = Heap::new();
        let map = heap.alloc(Object::Map(MapObj::default()));
        let key = heap.copy_string("field");
        let value = heap.copy_string("contents");
        let hash = heap.get_str(key).hash;
        heap.get_map_mut(map)
            .fields
            .set(key, hash, Value::Object(value));

        heap.mark_object(map);
        heap.trace_references();
        heap.sweep();

        assert_eq!(&*heap.get_str(value).chars, "contents");
        let fields = &heap.get_map(map).fields;
        assert_eq!(fields.get(key, hash), Some(&Value::Object(value)));
    }
}
