//! Invokes the resolved middleware for one transformation phase.

use serde_json::Value;

use crate::error::Result;
use crate::kwargs::Kwargs;
use crate::model::ModelFunction;
use crate::persist::Query;
use crate::registry::MiddlewareRegistry;

/// Outcome of a transformation phase.
///
/// `Skipped` means no middleware (or no matching capability) exists and the
/// caller keeps its original value. `Applied` always carries the
/// middleware's result, even when that result is empty, `null` or `false`.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed<T> {
    Applied(T),
    Skipped,
}

impl<T> Transformed<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transformed::Applied(_))
    }
    /// The transformed value, or `original` when the phase was skipped.
    pub fn unwrap_or(self, original: T) -> T {
        match self {
            Transformed::Applied(value) => value,
            Transformed::Skipped => original,
        }
    }
    pub fn into_option(self) -> Option<T> {
        match self {
            Transformed::Applied(value) => Some(value),
            Transformed::Skipped => None,
        }
    }
}

#[derive(Clone, Copy)]
pub struct Transformer<'r> {
    registry: &'r MiddlewareRegistry,
}

impl<'r> Transformer<'r> {
    pub fn new(registry: &'r MiddlewareRegistry) -> Self {
        Self { registry }
    }
    pub fn registry(&self) -> &'r MiddlewareRegistry {
        self.registry
    }
    pub fn transform_inputs(&self, model: &str, kwargs: &Kwargs) -> Result<Transformed<Kwargs>> {
        let Some(middleware) = self.registry.resolve(model) else {
            return Ok(Transformed::Skipped);
        };
        match middleware.input_transformer() {
            Some(transformer) => Ok(Transformed::Applied(
                transformer.transform_inputs(kwargs.clone())?,
            )),
            None => Ok(Transformed::Skipped),
        }
    }
    pub fn transform_function_output(
        &self,
        model: &str,
        function: &ModelFunction,
        kwargs: &Kwargs,
        output: &Value,
    ) -> Result<Transformed<Value>> {
        let Some(middleware) = self.registry.resolve(model) else {
            return Ok(Transformed::Skipped);
        };
        match middleware.output_transformer() {
            Some(transformer) => Ok(Transformed::Applied(
                transformer.transform_function_output(function, kwargs, output.clone())?,
            )),
            None => Ok(Transformed::Skipped),
        }
    }
    pub fn transform_query_output(&self, model: &str, query: &Query<'_>) -> Result<Transformed<Value>> {
        let Some(middleware) = self.registry.resolve(model) else {
            return Ok(Transformed::Skipped);
        };
        match middleware.query_transformer() {
            Some(transformer) => Ok(Transformed::Applied(
                transformer.transform_query_output(query.clone())?,
            )),
            None => Ok(Transformed::Skipped),
        }
    }
}
