//! Middleware registration and lookup.
//!
//! A model named `Order` is served by the middleware registered under
//! `OrderMiddleware`. Middleware is registered explicitly, usually by one
//! initialization routine at process start, and every lookup builds a fresh
//! instance from the registered factory.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::kwargs::Kwargs;
use crate::model::ModelFunction;
use crate::persist::{OtherHasher, Query};

pub const MIDDLEWARE_SUFFIX: &str = "Middleware";

/// Rewrites the keyword arguments of a call before it reaches the database.
pub trait InputTransformer {
    fn transform_inputs(&self, kwargs: Kwargs) -> Result<Kwargs>;
}

/// Rewrites the result of a model function after it has run.
///
/// The engine has already called `function` once with `kwargs` and passes
/// its result as `output`; implementations should not call it again.
pub trait OutputTransformer {
    fn transform_function_output(
        &self,
        function: &ModelFunction,
        kwargs: &Kwargs,
        output: Value,
    ) -> Result<Value>;
}

/// Turns a query into the value handed back to the caller.
pub trait QueryTransformer {
    fn transform_query_output(&self, query: Query<'_>) -> Result<Value>;
}

/// Per-model middleware.
///
/// Implementors expose the capabilities they have by returning `Some(self)`
/// from the matching accessor. A missing capability behaves like a missing
/// middleware for that phase.
pub trait Middleware {
    fn input_transformer(&self) -> Option<&dyn InputTransformer> {
        None
    }
    fn output_transformer(&self) -> Option<&dyn OutputTransformer> {
        None
    }
    fn query_transformer(&self) -> Option<&dyn QueryTransformer> {
        None
    }
}

type Factory = Box<dyn Fn() -> Box<dyn Middleware>>;

/// Name a model's middleware is registered and resolved under.
pub fn middleware_name(model_name: &str) -> String {
    format!("{}{}", model_name.trim(), MIDDLEWARE_SUFFIX)
}

#[derive(Default)]
pub struct MiddlewareRegistry {
    factories: HashMap<String, Factory, OtherHasher>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the middleware serving `model_name`.
    ///
    /// Returns `false` and keeps the existing factory when one is already
    /// registered under the same name, so running an initialization routine
    /// twice leaves the registry unchanged.
    pub fn register<M, F>(&mut self, model_name: &str, factory: F) -> bool
    where
        M: Middleware + 'static,
        F: Fn() -> M + 'static,
    {
        let name = middleware_name(model_name);
        if self.factories.contains_key(&name) {
            warn!(middleware = %name, "middleware already registered, keeping the first");
            return false;
        }
        debug!(middleware = %name, "middleware registered");
        self.factories
            .insert(name, Box::new(move || Box::new(factory()) as Box<dyn Middleware>));
        true
    }

    /// Builds the middleware for `model_name`, or `None` if it has none.
    pub fn resolve(&self, model_name: &str) -> Option<Box<dyn Middleware>> {
        self.factories
            .get(&middleware_name(model_name))
            .map(|factory| factory())
    }

    pub fn contains(&self, model_name: &str) -> bool {
        self.factories.contains_key(&middleware_name(model_name))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
