//! Jambi – per-model middleware dispatch over a SQLite model store.
//!
//! Application code talks to models through the dispatcher instead of
//! calling the store directly. For every call the dispatcher looks up the
//! model's middleware and lets it rewrite the call:
//! * A [`model::Model`] is a named table with typed fields and named functions.
//! * A middleware is registered for a model under `<Model>Middleware` and may
//!   implement any of [`registry::InputTransformer`],
//!   [`registry::OutputTransformer`] and [`registry::QueryTransformer`].
//! * Models without middleware are served exactly as the store would serve them.
//!
//! ## Modules
//! * [`persist`] – SQLite persistence: model tables, inserts, transactions, queries.
//! * [`model`] – Model, field and model function definitions.
//! * [`registry`] – Middleware traits and the [`registry::MiddlewareRegistry`].
//! * [`transform`] – Runs one transformation phase; [`transform::Transformed`]
//!   tells "skipped" apart from "applied".
//! * [`engine`] – The [`engine::Engine`] dispatching every operation.
//! * [`handle`] – [`handle::ModelHandle`], an engine bound to one model.
//! * [`config`] – Backend selection from a config file and `JAMBI_*` variables.
//!
//! ## Call arguments
//! Arguments travel as [`Kwargs`] (a JSON object map). `mod_in: false` and
//! `mod_out: false` switch off input or output transformation for one call;
//! both are removed before the store sees the arguments.
//!
//! ## Transactions
//! [`engine::Engine::set_atomic`] wraps every following `insert_many` in one
//! transaction. [`handle::ModelHandle::set_atomic`] does the same for the next
//! `insert_many` only.
//!
//! ## Quick Start
//! ```
//! use jambi::{Database, Engine, Field, InputTransformer, Kwargs, Middleware,
//!     MiddlewareRegistry, Model, ModelHandle, PersistenceMode};
//!
//! struct OrderMiddleware;
//! impl Middleware for OrderMiddleware {
//!     fn input_transformer(&self) -> Option<&dyn InputTransformer> { Some(self) }
//! }
//! impl InputTransformer for OrderMiddleware {
//!     fn transform_inputs(&self, mut kwargs: Kwargs) -> jambi::Result<Kwargs> {
//!         if let Some(status) = kwargs.get("status").and_then(|s| s.as_str()) {
//!             let status = status.to_uppercase();
//!             kwargs.insert("status".into(), status.into());
//!         }
//!         Ok(kwargs)
//!     }
//! }
//!
//! let mut db = Database::open(PersistenceMode::InMemory).unwrap();
//! db.declare(Model::new("Order").field(Field::text("status"))).unwrap();
//! let mut registry = MiddlewareRegistry::new();
//! registry.register("Order", || OrderMiddleware);
//!
//! let orders = ModelHandle::new(Engine::new(&db, &registry), "Order").unwrap();
//! let order = orders.create(jambi::kwargs! { "status" => "pending" }).unwrap();
//! assert_eq!(order.get_str("status"), Some("PENDING"));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod kwargs;
pub mod model;
pub mod persist;
pub mod registry;
pub mod transform;

pub use crate::config::{DbType, Settings};
pub use engine::{Engine, QueryOutput};
pub use error::{JambiError, Result};
pub use handle::ModelHandle;
pub use kwargs::{Kwargs, MOD_IN, MOD_OUT, MODEL, Phases};
pub use model::{Field, FieldKind, Model, ModelFunction, Record};
pub use persist::{Database, DatabaseStats, PersistenceMode, Query};
pub use registry::{
    InputTransformer, Middleware, MiddlewareRegistry, OutputTransformer, QueryTransformer,
    middleware_name,
};
pub use transform::{Transformed, Transformer};

#[doc(hidden)]
pub use serde_json as __serde_json;
