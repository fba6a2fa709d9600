#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use jambi::{
    Database, Engine, Field, InputTransformer, JambiError, Kwargs, Middleware,
    MiddlewareRegistry, Model, ModelFunction, ModelHandle, OutputTransformer, PersistenceMode,
    Query, QueryTransformer, Record,
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// How often each phase of the order middleware ran.
#[derive(Default)]
pub struct Counters {
    pub inputs: Cell<usize>,
    pub outputs: Cell<usize>,
    pub queries: Cell<usize>,
}

/// Uppercases `status`, wraps function results and summarizes queries.
pub struct OrderMiddleware {
    counters: Rc<Counters>,
}

impl Middleware for OrderMiddleware {
    fn input_transformer(&self) -> Option<&dyn InputTransformer> {
        Some(self)
    }
    fn output_transformer(&self) -> Option<&dyn OutputTransformer> {
        Some(self)
    }
    fn query_transformer(&self) -> Option<&dyn QueryTransformer> {
        Some(self)
    }
}

impl InputTransformer for OrderMiddleware {
    fn transform_inputs(&self, mut kwargs: Kwargs) -> jambi::Result<Kwargs> {
        self.counters.inputs.set(self.counters.inputs.get() + 1);
        if let Some(status) = kwargs.get("status").and_then(Value::as_str) {
            let status = status.to_uppercase();
            kwargs.insert("status".to_string(), Value::String(status));
        }
        Ok(kwargs)
    }
}

impl OutputTransformer for OrderMiddleware {
    fn transform_function_output(
        &self,
        function: &ModelFunction,
        _kwargs: &Kwargs,
        output: Value,
    ) -> jambi::Result<Value> {
        self.counters.outputs.set(self.counters.outputs.get() + 1);
        Ok(json!({ "function": function.name(), "result": output }))
    }
}

impl QueryTransformer for OrderMiddleware {
    fn transform_query_output(&self, query: Query<'_>) -> jambi::Result<Value> {
        self.counters.queries.set(self.counters.queries.get() + 1);
        let statuses: Vec<Value> = query
            .execute()?
            .into_iter()
            .filter_map(|r| r.get("status").cloned())
            .collect();
        Ok(json!({ "count": statuses.len(), "statuses": statuses }))
    }
}

/// Rejects negative amounts.
pub struct InvoiceMiddleware;

impl Middleware for InvoiceMiddleware {
    fn input_transformer(&self) -> Option<&dyn InputTransformer> {
        Some(self)
    }
}

impl InputTransformer for InvoiceMiddleware {
    fn transform_inputs(&self, kwargs: Kwargs) -> jambi::Result<Kwargs> {
        match kwargs.get("amount").and_then(Value::as_i64) {
            Some(amount) if amount < 0 => Err(JambiError::middleware(
                "InvoiceMiddleware",
                "amount must not be negative",
            )),
            _ => Ok(kwargs),
        }
    }
}

/// Replaces every function result with `false`.
pub struct NoteMiddleware;

impl Middleware for NoteMiddleware {
    fn output_transformer(&self) -> Option<&dyn OutputTransformer> {
        Some(self)
    }
}

impl OutputTransformer for NoteMiddleware {
    fn transform_function_output(
        &self,
        _function: &ModelFunction,
        _kwargs: &Kwargs,
        _output: Value,
    ) -> jambi::Result<Value> {
        Ok(Value::Bool(false))
    }
}

fn records(records: Vec<Record>) -> Value {
    Value::Array(records.iter().map(Record::to_value).collect())
}

fn echo(_db: &Database, kwargs: &Kwargs) -> jambi::Result<Value> {
    Ok(Value::Object(kwargs.clone()))
}

pub struct Fixture {
    pub db: Database,
    pub registry: MiddlewareRegistry,
    pub counters: Rc<Counters>,
}

impl Fixture {
    pub fn engine(&self) -> Engine<'_> {
        Engine::new(&self.db, &self.registry)
    }
    pub fn handle(&self, model: &str) -> ModelHandle<'_> {
        ModelHandle::new(self.engine(), model).expect("declared model")
    }
    pub fn model(&self, name: &str) -> Arc<Model> {
        self.db.model(name).expect("declared model")
    }
    pub fn count(&self, name: &str) -> usize {
        self.db.select(&self.model(name)).count().expect("count")
    }
    pub fn transactions(&self) -> u64 {
        self.db.stats().transactions
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Declares `Order`, `Tag`, `Invoice` and `Note`; only `Tag` has no middleware.
pub fn fixture() -> Fixture {
    init_tracing();
    let mut db = Database::open(PersistenceMode::InMemory).expect("in-memory database");
    db.declare(
        Model::new("Order")
            .field(Field::text("status"))
            .field(Field::integer("quantity").nullable())
            .function("echo", echo)
            .function("by_status", |db, kwargs| {
                let order = db.model("Order").expect("declared");
                let status = kwargs.get("status").cloned().unwrap_or(Value::Null);
                Ok(records(db.select(&order).filter("status", status).execute()?))
            }),
    )
    .expect("declare Order");
    db.declare(
        Model::new("Tag")
            .field(Field::text("name").unique())
            .function("echo", echo)
            .function("names", |db, _kwargs| {
                let tag = db.model("Tag").expect("declared");
                let names: Vec<Value> = db
                    .select(&tag)
                    .order_by("id")
                    .execute()?
                    .into_iter()
                    .filter_map(|r| r.get("name").cloned())
                    .collect();
                Ok(Value::Array(names))
            }),
    )
    .expect("declare Tag");
    db.declare(Model::new("Invoice").field(Field::integer("amount")))
        .expect("declare Invoice");
    db.declare(
        Model::new("Note")
            .field(Field::text("body"))
            .function("echo", echo),
    )
    .expect("declare Note");

    let counters = Rc::new(Counters::default());
    let mut registry = MiddlewareRegistry::new();
    let shared = Rc::clone(&counters);
    registry.register("Order", move || OrderMiddleware {
        counters: Rc::clone(&shared),
    });
    registry.register("Invoice", || InvoiceMiddleware);
    registry.register("Note", || NoteMiddleware);

    Fixture {
        db,
        registry,
        counters,
    }
}
