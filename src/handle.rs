use std::sync::Arc;

use serde_json::Value;

use crate::engine::{Engine, QueryOutput};
use crate::error::{JambiError, Result};
use crate::kwargs::Kwargs;
use crate::model::{Model, Record};
use crate::persist::Query;

/// An [`Engine`] bound to one declared model.
///
/// The handle keeps its own atomic flag, separate from the engine's. It is
/// one-shot: the next `insert_many` consumes it and runs in a transaction,
/// after which batches run without one until the flag is set again.
pub struct ModelHandle<'a> {
    engine: Engine<'a>,
    model: Arc<Model>,
    atomic: bool,
}

impl<'a> ModelHandle<'a> {
    /// Binds `engine` to the model called `model_name`, which must have been
    /// declared on the engine's database.
    pub fn new(engine: Engine<'a>, model_name: &str) -> Result<Self> {
        let model = engine.database().model(model_name).ok_or_else(|| {
            JambiError::TypeConstraint(format!(
                "`{model_name}` must be a model declared on the database"
            ))
        })?;
        Ok(Self {
            engine,
            model,
            atomic: false,
        })
    }
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }
    pub fn engine(&self) -> &Engine<'a> {
        &self.engine
    }
    pub fn set_atomic(&mut self, enabled: bool) -> &mut Self {
        self.atomic = enabled;
        self
    }
    pub fn is_atomic(&self) -> bool {
        self.atomic
    }
    pub fn create(&self, kwargs: Kwargs) -> Result<Record> {
        self.engine.create(&self.model, kwargs)
    }
    pub fn insert(&self, kwargs: Kwargs) -> Result<i64> {
        self.engine.insert(&self.model, kwargs)
    }
    pub fn insert_many(&mut self, records: Vec<Kwargs>) -> Result<usize> {
        if self.atomic {
            self.atomic = false;
            return self.engine.insert_batch(&self.model, records, true);
        }
        self.engine.insert_batch(&self.model, records, false)
    }
    pub fn model_func(&self, function_name: &str, kwargs: Kwargs) -> Result<Value> {
        let function = self.model.get_function(function_name)?;
        self.engine.model_func(function, kwargs)
    }
    pub fn model_func_pull(&self, function_name: &str, kwargs: Kwargs) -> Result<Value> {
        let function = self.model.get_function(function_name)?;
        self.engine.model_func_pull(function, kwargs)
    }
    pub fn model_func_push(&self, function_name: &str, kwargs: Kwargs) -> Result<Value> {
        let function = self.model.get_function(function_name)?;
        self.engine.model_func_push(function, kwargs)
    }
    /// A select over the bound model, ready to be filtered and passed to [`ModelHandle::query`].
    pub fn select(&self) -> Query<'a> {
        self.engine.database().select(&self.model)
    }
    pub fn query(&self, query: Query<'a>) -> Result<QueryOutput<'a>> {
        self.engine.query(&self.model, query)
    }
}
