use indexmap::{IndexMap, IndexSet};

use crate::{object::Variable, stdlib, value::Value};

/// Stack of name scopes backing an interpreter. Bindings are values, most
/// of them `Variable` cells; cloning a context shares the cells, which is
/// what closure capture relies on.
#[derive(Clone, Default)]
pub struct Context {
    frames: Vec<IndexMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            frames: vec![IndexMap::new()],
        }
    }

    pub fn from_base(base: &Context) -> Self {
        base.clone()
    }

    /// Snapshot for closures: copies only bindings for the collected free
    /// names that resolve in the defining context.
    pub fn capture(base: &Context, names: &IndexSet<String>) -> Self {
        let mut frame = IndexMap::new();
        for name in names {
            if let Some(value) = base.lookup(name) {
                frame.insert(name.clone(), value);
            }
        }
        Self {
            frames: vec![frame],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(IndexMap::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }

    /// Resolves a name, searching innermost to outermost and then the
    /// read-only global table. Unknown names vivify a fresh variable cell
    /// in the innermost frame; `local` skips the search (`my`).
    pub fn get(&mut self, name: &str, local: bool) -> Value {
        if !local {
            for frame in self.frames.iter().rev() {
                if let Some(value) = frame.get(name) {
                    return value.clone();
                }
            }
            if let Some(value) = stdlib::global(name) {
                return value;
            }
        }
        let cell = Value::object(Variable::new(Value::Empty));
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_owned(), cell.clone());
        }
        cell
    }

    /// Search without vivification; used for closure capture.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).cloned())
    }

    /// Installs a binding in the root frame (host `bind`, call parameters).
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.first_mut() {
            frame.insert(name.into(), value);
        }
    }
}
