//! Host callables reachable from native code
//!
//! A trampoline either captures its callable by value at construction, or
//! keeps a name and looks it up in a [`FunctionRegistry`] on every call-in,
//! so rebinding the name between calls is observed.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{FfiError, Result};
use crate::value::Value;

/// A host-language function native code can call back into
///
/// Callables may be invoked from any native thread, hence `Send + Sync`.
pub trait HostCallable: Send + Sync {
    fn invoke(&self, args: &[Value]) -> Result<Value>;
}

impl<F> HostCallable for F
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync,
{
    #[inline]
    fn invoke(&self, args: &[Value]) -> Result<Value> {
        self(args)
    }
}

/// Named host functions, rebindable at any time
#[derive(Default)]
pub struct FunctionRegistry {
    functions: DashMap<String, Arc<dyn HostCallable>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) `name`, returning the previous callable
    pub fn bind(
        &self,
        name: impl Into<String>,
        callable: Arc<dyn HostCallable>,
    ) -> Option<Arc<dyn HostCallable>> {
        self.functions.insert(name.into(), callable)
    }

    pub fn unbind(&self, name: &str) -> Option<Arc<dyn HostCallable>> {
        self.functions.remove(name).map(|(_, callable)| callable)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn HostCallable>> {
        self.functions.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// How a trampoline refers to its callable
#[derive(Clone)]
pub enum CallableRef {
    /// Fixed at construction
    Captured(Arc<dyn HostCallable>),
    /// Resolved by name at every call-in
    LateBound {
        name: String,
        registry: Arc<FunctionRegistry>,
    },
}

impl CallableRef {
    pub fn captured(callable: impl HostCallable + 'static) -> Self {
        Self::Captured(Arc::new(callable))
    }

    pub fn late_bound(name: impl Into<String>, registry: Arc<FunctionRegistry>) -> Self {
        Self::LateBound {
            name: name.into(),
            registry,
        }
    }

    /// Name used in logs
    pub fn describe(&self) -> &str {
        match self {
            Self::Captured(_) => "<captured>",
            Self::LateBound { name, .. } => name,
        }
    }

    /// Invoke whatever the reference designates right now
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        match self {
            Self::Captured(callable) => callable.invoke(args),
            Self::LateBound { name, registry } => registry
                .lookup(name)
                .ok_or_else(|| FfiError::HostCall {
                    message: format!("{} is not bound", name),
                })?
                .invoke(args),
        }
    }
}

impl core::fmt::Debug for CallableRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CallableRef({})", self.describe())
    }
}
