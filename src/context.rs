//! Interop facade
//!
//! `FfiContext` bundles a configuration with the resolver it implies, so
//! callers build interfaces and trampolines without threading both around.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::config::FfiConfig;
use crate::error::Result;
use crate::interface::CallInterface;
use crate::trampoline::{CallableRef, Trampoline};
use crate::types::{TypeExpr, TypeResolver};

/// Process-wide context configured from the environment
static DEFAULT_CONTEXT: Lazy<FfiContext> = Lazy::new(|| FfiContext::new(FfiConfig::from_env()));

/// Shared default context
pub fn default_context() -> &'static FfiContext {
    &DEFAULT_CONTEXT
}

pub struct FfiContext {
    config: FfiConfig,
    resolver: TypeResolver,
}

impl FfiContext {
    pub fn new(config: FfiConfig) -> Self {
        let resolver = if config.intern_descriptors {
            TypeResolver::new()
        } else {
            TypeResolver::uncached()
        };
        Self { config, resolver }
    }

    #[inline]
    pub fn config(&self) -> &FfiConfig {
        &self.config
    }

    #[inline]
    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Resolve a signature and prepare its call interface
    pub fn interface(&self, args: &[TypeExpr], ret: &TypeExpr) -> Result<Arc<CallInterface>> {
        CallInterface::from_exprs(&self.resolver, args, ret).map(Arc::new)
    }

    /// [`interface`](Self::interface) from textual type expressions
    pub fn interface_str(&self, args: &[&str], ret: &str) -> Result<Arc<CallInterface>> {
        let args = args
            .iter()
            .map(|a| a.parse())
            .collect::<Result<Vec<TypeExpr>>>()?;
        self.interface(&args, &ret.parse()?)
    }

    /// Build a trampoline under this context's dispatch policy
    pub fn trampoline(
        &self,
        callee: CallableRef,
        interface: Arc<CallInterface>,
    ) -> Result<Trampoline> {
        Trampoline::new(callee, interface, self.config.dispatch)
    }
}

impl Default for FfiContext {
    fn default() -> Self {
        Self::new(FfiConfig::default())
    }
}
