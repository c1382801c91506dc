// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Name → value bindings with shadowing.
//!
//! Each name maps to a stack of values; the innermost binding wins. The
//! lowering code never calls `push`/`pop` directly: it calls [`SymbolScope::bind`],
//! which returns a guard that pops exactly what it pushed when dropped,
//! whether the walk underneath finished or bailed out with `?`.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::{CodegenError, CodegenResult};

#[derive(Debug)]
pub struct SymbolScope<V> {
    bindings: HashMap<String, Vec<V>>,
    live: usize,
}

impl<V> Default for SymbolScope<V> {
    fn default() -> Self {
        SymbolScope { bindings: HashMap::new(), live: 0 }
    }
}

impl<V> SymbolScope<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shadow `name` with `value`.
    pub fn push(&mut self, name: impl Into<String>, value: V) {
        self.bindings.entry(name.into()).or_default().push(value);
        self.live += 1;
    }

    /// Remove the innermost binding of `name`, revealing the one it shadowed.
    pub fn pop(&mut self, name: &str) -> CodegenResult<V> {
        let stack = self.bindings.get_mut(name).ok_or_else(|| {
            CodegenError::InvariantViolation(format!("pop of unbound symbol '{}'", name))
        })?;
        let value = stack.pop().ok_or_else(|| {
            CodegenError::InvariantViolation(format!("pop of unbound symbol '{}'", name))
        })?;
        if stack.is_empty() {
            self.bindings.remove(name);
        }
        self.live -= 1;
        Ok(value)
    }

    pub fn get(&self, name: &str) -> CodegenResult<&V> {
        self.lookup(name).ok_or_else(|| {
            CodegenError::InvariantViolation(format!("symbol '{}' is not in scope", name))
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&V> {
        self.bindings.get(name).and_then(|stack| stack.last())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Number of live bindings, shadowed ones included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Push every binding and return a guard that pops them in reverse
    /// order on drop. The guard derefs to the scope, so nested walks take
    /// `&mut guard` wherever they expect `&mut SymbolScope`.
    pub fn bind<I>(&mut self, bindings: I) -> ScopeGuard<'_, V>
    where
        I: IntoIterator<Item = (String, V)>,
    {
        let mut names = Vec::new();
        for (name, value) in bindings {
            self.push(name.clone(), value);
            names.push(name);
        }
        ScopeGuard { scope: self, names }
    }
}

/// Bindings pushed by [`SymbolScope::bind`]; popped on drop.
#[must_use = "bindings are popped as soon as the guard is dropped"]
pub struct ScopeGuard<'a, V> {
    scope: &'a mut SymbolScope<V>,
    names: Vec<String>,
}

impl<V> Deref for ScopeGuard<'_, V> {
    type Target = SymbolScope<V>;

    fn deref(&self) -> &SymbolScope<V> {
        &*self.scope
    }
}

impl<V> DerefMut for ScopeGuard<'_, V> {
    fn deref_mut(&mut self) -> &mut SymbolScope<V> {
        &mut *self.scope
    }
}

impl<V> Drop for ScopeGuard<'_, V> {
    fn drop(&mut self) {
        while let Some(name) = self.names.pop() {
            let popped = self.scope.pop(&name);
            debug_assert!(popped.is_ok(), "guarded binding '{}' vanished", name);
        }
    }
}
