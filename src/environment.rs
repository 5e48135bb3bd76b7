//! Environment arena.
//!
//! Every scope lives in one [`Environments`] arena and is addressed by an
//! [`EnvId`].  The link to the enclosing scope is an id, not an owning
//! pointer, so closures, class bodies and the instances stored in them can
//! refer to each other in cycles without leaking.
//!
//! Reclamation happens two ways:
//! * a scope that no closure ever captured is released as soon as the block
//!   or call that created it exits ([`Environments::release`]);
//! * captured scopes are reclaimed by a mark-and-sweep pass
//!   ([`Environments::collect`]) once the arena has grown past its
//!   threshold.  The interpreter runs it before any statement and at the
//!   top of every loop iteration, passing the scopes of its active frames
//!   and the values it is holding mid-expression as roots.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::value::Value;

const GC_GROW_FACTOR: usize = 2;
const GC_MIN_THRESHOLD: usize = 1024;

/// Opaque handle to a scope in the [`Environments`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(u32);

impl EnvId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Scope {
    values: HashMap<String, Value>,
    enclosing: Option<EnvId>,
    /// Some closure holds this scope (or a descendant of it).  Always true
    /// for every ancestor of a captured scope.
    captured: bool,
    marked: bool,
}

#[derive(Debug)]
pub struct Environments {
    slots: Vec<Option<Scope>>,
    free: Vec<u32>,
    live: usize,
    peak: usize,
    next_gc: usize,
    min_threshold: usize,
}

impl Default for Environments {
    fn default() -> Self {
        Self::with_threshold(GC_MIN_THRESHOLD)
    }
}

impl Environments {
    pub fn new() -> Self {
        Self::default()
    }

    /// `threshold` is the live-scope count below which no collection runs.
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            peak: 0,
            next_gc: threshold,
            min_threshold: threshold,
        }
    }

    /// Create an empty scope chained to `enclosing`.
    pub fn alloc(&mut self, enclosing: Option<EnvId>) -> EnvId {
        let scope = Scope {
            values: HashMap::new(),
            enclosing,
            captured: false,
            marked: false,
        };

        self.live += 1;
        self.peak = self.peak.max(self.live);

        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(scope);
                EnvId(index)
            }
            None => {
                self.slots.push(Some(scope));
                EnvId((self.slots.len() - 1) as u32)
            }
        }
    }

    fn scope(&self, env: EnvId) -> &Scope {
        self.slots[env.index()]
            .as_ref()
            .unwrap_or_else(|| unreachable!("environment {:?} used after release", env))
    }

    fn scope_mut(&mut self, env: EnvId) -> &mut Scope {
        self.slots[env.index()]
            .as_mut()
            .unwrap_or_else(|| unreachable!("environment {:?} used after release", env))
    }

    pub fn enclosing(&self, env: EnvId) -> Option<EnvId> {
        self.scope(env).enclosing
    }

    /// The scope `distance` hops up from `env`.
    pub fn ancestor(&self, env: EnvId, distance: usize) -> Option<EnvId> {
        let mut current = env;
        for _ in 0..distance {
            current = self.enclosing(current)?;
        }
        Some(current)
    }

    /// Bind (or rebind) `name` in `env` itself.
    pub fn define(&mut self, env: EnvId, name: &str, value: Value) {
        self.scope_mut(env).values.insert(name.to_string(), value);
    }

    /// Look `name` up in `env` only.
    pub fn get(&self, env: EnvId, name: &str) -> Option<Value> {
        self.scope(env).values.get(name).cloned()
    }

    pub fn get_at(&self, env: EnvId, distance: usize, name: &str) -> Option<Value> {
        self.get(self.ancestor(env, distance)?, name)
    }

    /// Overwrite an existing binding of `name` in `env`.  Returns `false`
    /// if there is none.
    pub fn assign(&mut self, env: EnvId, name: &str, value: Value) -> bool {
        match self.scope_mut(env).values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn assign_at(&mut self, env: EnvId, distance: usize, name: &str, value: Value) -> bool {
        match self.ancestor(env, distance) {
            Some(target) => self.assign(target, name, value),
            None => false,
        }
    }

    /// Note that a closure now refers to `env`; it and its ancestors must
    /// outlive the frame that created them.
    pub fn capture(&mut self, env: EnvId) {
        let mut current = Some(env);
        while let Some(id) = current {
            let scope = self.scope_mut(id);
            if scope.captured {
                break;
            }
            scope.captured = true;
            current = scope.enclosing;
        }
    }

    /// End of a block or call.  Uncaptured scopes are freed right away;
    /// captured ones wait for [`collect`](Self::collect).
    pub fn release(&mut self, env: EnvId) {
        if self.scope(env).captured {
            return;
        }

        self.free_slot(env.index());
    }

    fn free_slot(&mut self, index: usize) {
        if self.slots[index].take().is_some() {
            self.free.push(index as u32);
            self.live -= 1;
        }
    }

    /// Number of scopes currently allocated.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Highest [`live`](Self::live) count seen so far.
    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn should_collect(&self) -> bool {
        self.live >= self.next_gc
    }

    /// Mark everything reachable from `roots` and `values`, free the rest.
    /// Returns the number of scopes reclaimed.  Every scope the caller
    /// still refers to must be reachable from one of the two.
    pub fn collect(&mut self, roots: &[EnvId], values: &[Value]) -> usize {
        let before = self.live;

        self.mark(roots, values);

        for index in 0..self.slots.len() {
            let marked = match self.slots[index].as_mut() {
                Some(scope) => std::mem::replace(&mut scope.marked, false),
                None => continue,
            };

            if !marked {
                self.free_slot(index);
            }
        }

        let freed = before - self.live;
        self.next_gc = (self.live * GC_GROW_FACTOR).max(self.min_threshold);

        info!(
            "Collected {} environment(s), {} live, next collection at {}",
            freed, self.live, self.next_gc
        );

        freed
    }

    fn mark(&mut self, roots: &[EnvId], values: &[Value]) {
        let mut gray: Vec<EnvId> = roots.to_vec();
        let mut seen_objects: HashSet<usize> = HashSet::new();

        for value in values {
            trace_value(value, &mut gray, &mut seen_objects);
        }

        while let Some(env) = gray.pop() {
            let scope = self.scope_mut(env);
            if scope.marked {
                continue;
            }
            scope.marked = true;

            let scope = self.scope(env);
            if let Some(enclosing) = scope.enclosing {
                gray.push(enclosing);
            }
            for value in scope.values.values() {
                trace_value(value, &mut gray, &mut seen_objects);
            }
        }

        debug!("Mark phase visited {} object(s)", seen_objects.len());
    }
}

/// Push every scope `value` keeps alive onto `gray`.
fn trace_value(value: &Value, gray: &mut Vec<EnvId>, seen: &mut HashSet<usize>) {
    match value {
        Value::Function(function) => gray.push(function.closure()),

        Value::Class(class) => {
            let mut current = Some(class.clone());
            while let Some(class) = current {
                if !seen.insert(std::rc::Rc::as_ptr(&class) as *const () as usize) {
                    break;
                }
                for method in class.methods() {
                    gray.push(method.closure());
                }
                current = class.superclass().cloned();
            }
        }

        Value::Instance(instance) => {
            if !seen.insert(std::rc::Rc::as_ptr(instance) as *const () as usize) {
                return;
            }
            let instance = instance.borrow();
            trace_value(&Value::Class(instance.class().clone()), gray, seen);
            for field in instance.fields() {
                trace_value(field, gray, seen);
            }
        }

        Value::Nil | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Native(_) => {}
    }
}
