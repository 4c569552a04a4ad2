//! Boundary to the filter engine.
//!
//! The filter language itself lives elsewhere. This module only defines what
//! a compiled filter looks like ([`FlowPredicate`]) and what compiles one
//! ([`FilterCompiler`]), so that [`HttpFlow::matches`](crate::HttpFlow::matches)
//! can accept either.

use crate::error::FilterError;
use crate::flow::HttpFlow;

/// A compiled filter.
pub trait FlowPredicate {
    fn matches(&self, flow: &HttpFlow) -> bool;
}

impl<F> FlowPredicate for F
where
    F: Fn(&HttpFlow) -> bool,
{
    fn matches(&self, flow: &HttpFlow) -> bool {
        self(flow)
    }
}

/// Compiles filter expressions into predicates.
pub trait FilterCompiler {
    fn compile(&self, expr: &str) -> Result<Box<dyn FlowPredicate>, FilterError>;
}

/// What a flow can be matched against.
#[derive(Clone, Copy)]
pub enum Filter<'a> {
    /// Source text, compiled on use. An empty expression matches everything.
    Expression {
        expr: &'a str,
        compiler: &'a dyn FilterCompiler,
    },
    /// An already compiled predicate.
    Compiled(&'a dyn FlowPredicate),
}

impl<'a> Filter<'a> {
    pub fn expression(expr: &'a str, compiler: &'a dyn FilterCompiler) -> Self {
        Filter::Expression { expr, compiler }
    }

    pub fn compiled(predicate: &'a dyn FlowPredicate) -> Self {
        Filter::Compiled(predicate)
    }

    /// Evaluate against `flow`.
    pub fn evaluate(&self, flow: &HttpFlow) -> Result<bool, FilterError> {
        match self {
            Filter::Expression { expr, .. } if expr.trim().is_empty() => Ok(true),
            Filter::Expression { expr, compiler } => {
                let predicate = compiler.compile(expr).inspect_err(|err| {
                    tracing::debug!(target: "httpflow", error = %err, "filter did not compile");
                })?;
                Ok(predicate.matches(flow))
            }
            Filter::Compiled(predicate) => Ok(predicate.matches(flow)),
        }
    }
}

impl std::fmt::Debug for Filter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Expression { expr, .. } => f.debug_tuple("Expression").field(expr).finish(),
            Filter::Compiled(_) => f.write_str("Compiled(..)"),
        }
    }
}
