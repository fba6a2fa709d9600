//! The dispatch engine.
//!
//! [`Engine`] sits between callers and the [`Database`]: every operation
//! first resolves the model's middleware, runs the requested transformation
//! phases around the persistence call and otherwise delegates unchanged.
//! Errors from the database or from middleware are passed through as they are.

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{JambiError, Result};
use crate::kwargs::{Kwargs, MOD_IN, MOD_OUT, MODEL, Phases};
use crate::model::{Model, ModelFunction, Record};
use crate::persist::{Database, Query};
use crate::registry::MiddlewareRegistry;
use crate::transform::{Transformed, Transformer};

/// Result of [`Engine::query`].
#[derive(Debug)]
pub enum QueryOutput<'db> {
    /// The query middleware's result.
    Transformed(Value),
    /// The model has no query middleware; the query is returned unexecuted.
    Unmodified(Query<'db>),
}

impl<'db> QueryOutput<'db> {
    pub fn is_transformed(&self) -> bool {
        matches!(self, QueryOutput::Transformed(_))
    }
    /// Runs an unmodified query and serializes its records; returns a
    /// transformed value as is.
    pub fn into_value(self) -> Result<Value> {
        match self {
            QueryOutput::Transformed(value) => Ok(value),
            QueryOutput::Unmodified(query) => Ok(Value::Array(
                query.execute()?.iter().map(Record::to_value).collect(),
            )),
        }
    }
}

pub struct Engine<'a> {
    database: &'a Database,
    transformer: Transformer<'a>,
    atomic: bool,
}

impl<'a> Engine<'a> {
    pub fn new(database: &'a Database, registry: &'a MiddlewareRegistry) -> Self {
        let models = database.models();
        for model in &models {
            debug!(
                model = model.name(),
                middleware = registry.contains(model.name()),
                "model dispatch"
            );
        }
        info!(
            models = models.len(),
            middleware = registry.len(),
            "dispatch engine ready"
        );
        Self {
            database,
            transformer: Transformer::new(registry),
            atomic: false,
        }
    }
    pub fn database(&self) -> &'a Database {
        self.database
    }
    pub fn registry(&self) -> &'a MiddlewareRegistry {
        self.transformer.registry()
    }
    /// Makes every following `insert_many` run inside one transaction (or not).
    pub fn set_atomic(&mut self, enabled: bool) -> &mut Self {
        self.atomic = enabled;
        self
    }
    pub fn is_atomic(&self) -> bool {
        self.atomic
    }
    /// Creates a row from transformed inputs. The created record is returned
    /// without output transformation.
    pub fn create(&self, model: &Model, kwargs: Kwargs) -> Result<Record> {
        let kwargs = self.prepare_inputs(model, kwargs)?;
        self.database.create(model, &kwargs)
    }
    pub fn insert(&self, model: &Model, kwargs: Kwargs) -> Result<i64> {
        let kwargs = self.prepare_inputs(model, kwargs)?;
        self.database.insert(model, &kwargs)
    }
    pub fn insert_many(&self, model: &Model, records: Vec<Kwargs>) -> Result<usize> {
        self.insert_batch(model, records, self.atomic)
    }
    /// Batch insert with the atomic decision made by the caller instead of
    /// the engine's own flag.
    pub(crate) fn insert_batch(
        &self,
        model: &Model,
        records: Vec<Kwargs>,
        atomic: bool,
    ) -> Result<usize> {
        let records = records
            .into_iter()
            .map(|record| self.prepare_inputs(model, record))
            .collect::<Result<Vec<Kwargs>>>()?;
        debug!(model = model.name(), rows = records.len(), atomic, "insert many");
        if !atomic {
            return self.database.insert_many(model, &records);
        }
        self.database
            .atomic(|database| database.insert_many(model, &records))
    }
    /// Runs a model function with input and output transformation.
    ///
    /// The owning model is taken from a `model` argument when given, otherwise
    /// from the function itself. `mod_in: false` / `mod_out: false` skip the
    /// respective phase. The reserved arguments never reach the function.
    pub fn model_func(&self, function: &ModelFunction, mut kwargs: Kwargs) -> Result<Value> {
        let owner = match kwargs.remove(MODEL) {
            None => function.owner().to_string(),
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(JambiError::TypeConstraint(format!(
                    "`{MODEL}` must name a model, got {other}"
                )));
            }
        };
        let phases = Phases::extract(&mut kwargs);
        if phases.input {
            kwargs = self
                .transformer
                .transform_inputs(&owner, &kwargs)?
                .unwrap_or(kwargs);
        }
        let output = function.call(self.database, &kwargs)?;
        let output = if phases.output {
            self.transformer
                .transform_function_output(&owner, function, &kwargs, &output)?
                .unwrap_or(output)
        } else {
            output
        };
        debug!(
            model = %owner,
            function = function.name(),
            input = phases.input,
            output = phases.output,
            "model function"
        );
        Ok(output)
    }
    /// Runs a model function transforming only its output.
    pub fn model_func_pull(&self, function: &ModelFunction, mut kwargs: Kwargs) -> Result<Value> {
        kwargs.insert(MOD_IN.to_string(), Value::Bool(false));
        self.model_func(function, kwargs)
    }
    /// Runs a model function transforming only its inputs.
    pub fn model_func_push(&self, function: &ModelFunction, mut kwargs: Kwargs) -> Result<Value> {
        kwargs.insert(MOD_OUT.to_string(), Value::Bool(false));
        self.model_func(function, kwargs)
    }
    /// Hands a query over `model` to the model's query middleware.
    pub fn query(&self, model: &Model, query: Query<'a>) -> Result<QueryOutput<'a>> {
        if query.model().name() != model.name() {
            return Err(JambiError::TypeConstraint(format!(
                "query over '{}' dispatched as '{}'",
                query.model().name(),
                model.name()
            )));
        }
        match self.transformer.transform_query_output(model.name(), &query)? {
            Transformed::Applied(value) => Ok(QueryOutput::Transformed(value)),
            Transformed::Skipped => Ok(QueryOutput::Unmodified(query)),
        }
    }
    fn prepare_inputs(&self, model: &Model, mut kwargs: Kwargs) -> Result<Kwargs> {
        let phases = Phases::extract(&mut kwargs);
        if !phases.input {
            return Ok(kwargs);
        }
        let transformed = self.transformer.transform_inputs(model.name(), &kwargs)?;
        debug!(
            model = model.name(),
            applied = transformed.is_applied(),
            "input transformation"
        );
        Ok(transformed.unwrap_or(kwargs))
    }
}
