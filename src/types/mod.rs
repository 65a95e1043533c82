//! Type resolution - type-description expressions to native layouts
//!
//! Architecture:
//! - `primitive.rs` - closed tag vocabulary and platform widths
//! - `expr.rs` - expression tree and its textual form
//! - `descriptor.rs` - resolved layouts (libffi-computed)
//! - `cache.rs` - structural interning of resolved descriptors

mod cache;
mod descriptor;
mod expr;
mod primitive;


pub use cache::DescriptorCache;
pub use descriptor::{Shape, TypeDescriptor};
pub use expr::TypeExpr;
pub use primitive::{Primitive, Scalar};

use std::sync::Arc;

use crate::error::{FfiError, Result};

/// Resolves expressions, optionally interning the results
pub struct TypeResolver {
    cache: Option<DescriptorCache>,
}

impl TypeResolver {
    /// Resolver that interns every descriptor it builds
    pub fn new() -> Self {
        Self {
            cache: Some(DescriptorCache::new()),
        }
    }

    /// Resolver that builds a fresh descriptor on every call
    pub fn uncached() -> Self {
        Self { cache: None }
    }

    pub fn cache(&self) -> Option<&DescriptorCache> {
        self.cache.as_ref()
    }

    /// Resolve an expression into a shared descriptor
    ///
    /// New descriptors become visible in the cache only once the whole tree
    /// resolved; a failure leaves no partial entry behind.
    pub fn resolve(&self, expr: &TypeExpr) -> Result<Arc<TypeDescriptor>> {
        let mut pending = Vec::new();
        let descriptor = self.resolve_into(expr, &mut pending)?;
        if let Some(cache) = &self.cache {
            cache.commit(pending);
        }
        Ok(descriptor)
    }

    /// Parse and resolve the textual form
    pub fn resolve_str(&self, text: &str) -> Result<Arc<TypeDescriptor>> {
        self.resolve(&text.parse()?)
    }

    fn resolve_into(
        &self,
        expr: &TypeExpr,
        pending: &mut Vec<(TypeExpr, Arc<TypeDescriptor>)>,
    ) -> Result<Arc<TypeDescriptor>> {
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(expr)) {
            return Ok(hit);
        }
        if let Some((_, done)) = pending.iter().find(|(e, _)| e == expr) {
            return Ok(Arc::clone(done));
        }

        let descriptor = match expr {
            TypeExpr::Tag(tag) => {
                let primitive = Primitive::from_tag(tag).ok_or_else(|| {
                    FfiError::DescriptorResolution {
                        expr: expr.to_string(),
                    }
                })?;
                TypeDescriptor::primitive(primitive)
            }
            TypeExpr::Struct(items) => {
                let elements = items
                    .iter()
                    .map(|item| self.resolve_into(item, pending))
                    .collect::<Result<Vec<_>>>()?;
                TypeDescriptor::structure(elements).map_err(|_| {
                    FfiError::DescriptorResolution {
                        expr: expr.to_string(),
                    }
                })?
            }
        };

        let descriptor = Arc::new(descriptor);
        if self.cache.is_some() {
            pending.push((expr.clone(), Arc::clone(&descriptor)));
        }
        Ok(descriptor)
    }
}

impl Default for TypeResolver {
    fn default() -> Self {
        Self::new()
    }
}
