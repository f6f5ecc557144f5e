//! The span resolver
//!
//! One resolver walks one query level. Subqueries, CTE bodies, view
//! definitions and function bodies each get a child resolver with a derived
//! scope; all of them share the [`AnalysisContext`]. The walk itself is
//! split by clause across `select`, `from`, `cte`, `expression` and
//! `function`.

use spanline_core::SpanError;

use crate::context::AnalysisContext;
use crate::scope::ScopeStack;

pub(crate) struct SpanResolver<'a> {
    pub(crate) ctx: &'a AnalysisContext<'a>,
    pub(crate) scope: ScopeStack,
    depth: usize,
}

impl<'a> SpanResolver<'a> {
    /// Create a top-level resolver with an empty scope
    pub(crate) fn new(ctx: &'a AnalysisContext<'a>) -> Self {
        Self {
            ctx,
            scope: ScopeStack::new(),
            depth: 0,
        }
    }

    fn child(&self, scope: ScopeStack) -> Result<Self, SpanError> {
        let depth = self.depth + 1;
        if depth > self.ctx.max_depth() {
            return Err(SpanError::DepthLimitExceeded {
                limit: self.ctx.max_depth(),
            });
        }
        Ok(Self {
            ctx: self.ctx,
            scope,
            depth,
        })
    }

    /// Child for a correlated subquery; sees this level's FROM sources
    pub(crate) fn nested(&self) -> Result<Self, SpanError> {
        self.child(self.scope.nested())
    }

    /// Child for a non-lateral derived table
    pub(crate) fn derived(&self) -> Result<Self, SpanError> {
        self.child(self.scope.derived())
    }

    /// Child with an empty scope, for view definitions and function bodies
    pub(crate) fn detached(&self) -> Result<Self, SpanError> {
        self.child(ScopeStack::new())
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }
}
