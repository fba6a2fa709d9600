// used for persistence
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Transaction, params_from_iter};
use serde_json::Value;
use tracing::{debug, warn};

use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{JambiError, Result};
use crate::kwargs::Kwargs;
use crate::model::{FieldKind, Model, PRIMARY_KEY, Record};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

/// Counters for the work the database has been asked to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub statements: u64,
    pub transactions: u64,
}

// ------------- Persistence -------------
pub struct Database {
    connection: Connection,
    models: HashMap<String, Arc<Model>, OtherHasher>,
    statements: Cell<u64>,
    transactions: Cell<u64>,
}

impl Database {
    pub fn open(mode: PersistenceMode) -> Result<Self> {
        let connection = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        debug!(?mode, "database opened");
        Ok(Self {
            connection,
            models: HashMap::default(),
            statements: Cell::new(0),
            transactions: Cell::new(0),
        })
    }
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::open(settings.persistence_mode()?)
    }
    /// Creates the model's table if it does not exist and adds the model to the catalog.
    pub fn declare(&mut self, model: Model) -> Result<Arc<Model>> {
        model.validate()?;
        let mut columns = vec![format!(
            "{} integer primary key autoincrement",
            quote(PRIMARY_KEY)
        )];
        for field in model.fields() {
            let mut column = format!("{} {}", quote(field.name()), field.kind().sql_type());
            if !field.is_nullable() {
                column.push_str(" not null");
            }
            if field.is_unique() {
                column.push_str(" unique");
            }
            columns.push(column);
        }
        let sql = format!(
            "create table if not exists {} (\n    {}\n)",
            quote(model.table()),
            columns.join(",\n    ")
        );
        self.run(&sql, Vec::new())?;
        let model = Arc::new(model);
        self.models
            .insert(model.name().to_string(), Arc::clone(&model));
        debug!(model = model.name(), table = model.table(), "model declared");
        Ok(model)
    }
    pub fn model(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name.trim()).map(Arc::clone)
    }
    /// Declared models, ordered by name.
    pub fn models(&self) -> Vec<Arc<Model>> {
        let mut models: Vec<Arc<Model>> = self.models.values().map(Arc::clone).collect();
        models.sort_by(|a, b| a.name().cmp(b.name()));
        models
    }
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            statements: self.statements.get(),
            transactions: self.transactions.get(),
        }
    }
    pub fn is_in_transaction(&self) -> bool {
        !self.connection.is_autocommit()
    }
    /// Inserts one row and returns it as a record carrying the given values.
    pub fn create(&self, model: &Model, kwargs: &Kwargs) -> Result<Record> {
        let id = self.insert(model, kwargs)?;
        Ok(Record {
            id,
            fields: kwargs.clone(),
        })
    }
    /// Inserts one row and returns its row id.
    pub fn insert(&self, model: &Model, kwargs: &Kwargs) -> Result<i64> {
        let sql = if kwargs.is_empty() {
            format!("insert into {} default values", quote(model.table()))
        } else {
            let columns: Vec<String> = kwargs.keys().map(|k| quote(k)).collect();
            format!(
                "insert into {} ({}) values ({})",
                quote(model.table()),
                columns.join(", "),
                vec!["?"; kwargs.len()].join(", ")
            )
        };
        let values = kwargs
            .iter()
            .map(|(name, value)| to_sql(value, model.get_field(name).map(|f| f.kind())))
            .collect::<Result<Vec<_>>>()?;
        self.run(&sql, values)?;
        Ok(self.connection.last_insert_rowid())
    }
    /// Inserts each record with its own statement, in order.
    ///
    /// Outside of [`Database::atomic`] rows inserted before a failing one stay
    /// inserted.
    pub fn insert_many(&self, model: &Model, records: &[Kwargs]) -> Result<usize> {
        for record in records {
            self.insert(model, record)?;
        }
        Ok(records.len())
    }
    /// Runs `scope` inside a single transaction.
    ///
    /// The transaction commits when `scope` returns `Ok` and rolls back on
    /// `Err`, or when unwinding drops it. Inside an open transaction the scope
    /// becomes a savepoint, so nested scopes commit or roll back with the
    /// outer one.
    pub fn atomic<T, F>(&self, scope: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let guard = if self.is_in_transaction() {
            let name = format!("jambi_atomic_{}", self.transactions.get());
            AtomicScope::Savepoint(Savepoint::open(&self.connection, name)?)
        } else {
            AtomicScope::Transaction(self.connection.unchecked_transaction()?)
        };
        self.transactions.set(self.transactions.get() + 1);
        debug!(nested = guard.is_nested(), "atomic scope opened");
        match scope(self) {
            Ok(outcome) => {
                guard.commit()?;
                debug!("atomic scope committed");
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "atomic scope rolled back");
                drop(guard);
                Err(e)
            }
        }
    }
    pub fn select(&self, model: &Arc<Model>) -> Query<'_> {
        Query::new(self, Arc::clone(model))
    }
    fn run(&self, sql: &str, values: Vec<SqlValue>) -> Result<usize> {
        self.statements.set(self.statements.get() + 1);
        let mut statement = self.connection.prepare_cached(sql)?;
        Ok(statement.execute(params_from_iter(values))?)
    }
}

enum AtomicScope<'c> {
    Transaction(Transaction<'c>),
    Savepoint(Savepoint<'c>),
}

impl AtomicScope<'_> {
    fn is_nested(&self) -> bool {
        matches!(self, AtomicScope::Savepoint(_))
    }
    fn commit(self) -> Result<()> {
        match self {
            AtomicScope::Transaction(transaction) => Ok(transaction.commit()?),
            AtomicScope::Savepoint(savepoint) => savepoint.release(),
        }
    }
}

/// A named savepoint on a shared connection; rolled back unless released.
struct Savepoint<'c> {
    connection: &'c Connection,
    name: String,
    released: bool,
}

impl<'c> Savepoint<'c> {
    fn open(connection: &'c Connection, name: String) -> Result<Self> {
        connection.execute_batch(&format!("savepoint {}", quote(&name)))?;
        Ok(Self {
            connection,
            name,
            released: false,
        })
    }
    fn release(mut self) -> Result<()> {
        self.connection
            .execute_batch(&format!("release {}", quote(&self.name)))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let name = quote(&self.name);
        if let Err(e) = self
            .connection
            .execute_batch(&format!("rollback to {name}; release {name}"))
        {
            warn!(error = %e, savepoint = %self.name, "savepoint rollback failed");
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut models: Vec<&String> = self.models.keys().collect();
        models.sort();
        f.debug_struct("Database")
            .field("models", &models)
            .field("stats", &self.stats())
            .finish()
    }
}

// ------------- Query -------------
/// A lazily executed select over one model.
#[derive(Clone)]
pub struct Query<'db> {
    database: &'db Database,
    model: Arc<Model>,
    filters: Vec<(String, Value)>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl<'db> Query<'db> {
    pub fn new(database: &'db Database, model: Arc<Model>) -> Self {
        Self {
            database,
            model,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }
    /// Keeps rows where `field` equals `value` (`null` matches missing values).
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }
    pub fn order_by(mut self, field: &str) -> Self {
        self.order = Some((field.to_string(), false));
        self
    }
    pub fn order_by_desc(mut self, field: &str) -> Self {
        self.order = Some((field.to_string(), true));
        self
    }
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }
    pub fn database(&self) -> &'db Database {
        self.database
    }
    pub fn execute(&self) -> Result<Vec<Record>> {
        let mut columns = vec![quote(PRIMARY_KEY)];
        columns.extend(self.model.fields().iter().map(|f| quote(f.name())));
        let (predicate, values) = self.predicate()?;
        let mut sql = format!(
            "select {} from {}{}",
            columns.join(", "),
            quote(self.model.table()),
            predicate
        );
        if let Some((field, descending)) = &self.order {
            self.check_column(field)?;
            let direction = if *descending { "desc" } else { "asc" };
            sql.push_str(&format!(" order by {} {}", quote(field), direction));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" limit {limit}"));
        }
        self.database
            .statements
            .set(self.database.statements.get() + 1);
        let mut statement = self.database.connection.prepare_cached(&sql)?;
        let mut rows = statement.query(params_from_iter(values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let mut fields = Kwargs::new();
            for (i, field) in self.model.fields().iter().enumerate() {
                let value = from_sql(row.get_ref(i + 1)?, field.kind())?;
                fields.insert(field.name().to_string(), value);
            }
            records.push(Record { id, fields });
        }
        Ok(records)
    }
    pub fn first(&self) -> Result<Option<Record>> {
        Ok(self.clone().limit(1).execute()?.into_iter().next())
    }
    pub fn count(&self) -> Result<usize> {
        let (predicate, values) = self.predicate()?;
        let sql = format!(
            "select count(*) from {}{}",
            quote(self.model.table()),
            predicate
        );
        self.database
            .statements
            .set(self.database.statements.get() + 1);
        let mut statement = self.database.connection.prepare_cached(&sql)?;
        let count: i64 = statement.query_row(params_from_iter(values), |r| r.get(0))?;
        Ok(count as usize)
    }
    fn predicate(&self) -> Result<(String, Vec<SqlValue>)> {
        if self.filters.is_empty() {
            return Ok((String::new(), Vec::new()));
        }
        let mut clauses = Vec::with_capacity(self.filters.len());
        let mut values = Vec::new();
        for (field, value) in &self.filters {
            self.check_column(field)?;
            if value.is_null() {
                clauses.push(format!("{} is null", quote(field)));
            } else {
                clauses.push(format!("{} = ?", quote(field)));
                values.push(to_sql(value, self.model.get_field(field).map(|f| f.kind()))?);
            }
        }
        Ok((format!(" where {}", clauses.join(" and ")), values))
    }
    fn check_column(&self, field: &str) -> Result<()> {
        if self.model.has_column(field) {
            Ok(())
        } else {
            Err(JambiError::UnknownField {
                model: self.model.name().to_string(),
                field: field.to_string(),
            })
        }
    }
}

impl fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Query")
            .field("model", &self.model.name())
            .field("filters", &self.filters)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .finish()
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn to_sql(value: &Value, kind: Option<FieldKind>) -> Result<SqlValue> {
    Ok(match (value, kind) {
        (Value::Null, _) => SqlValue::Null,
        (_, Some(FieldKind::Json)) => SqlValue::Text(value.to_string()),
        (Value::Bool(b), _) => SqlValue::Integer(*b as i64),
        (Value::Number(n), Some(FieldKind::Real)) => SqlValue::Real(real(n)?),
        (Value::Number(n), _) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None if n.is_f64() => SqlValue::Real(real(n)?),
            None => {
                return Err(JambiError::TypeConstraint(format!(
                    "{n} does not fit a 64-bit signed integer"
                )));
            }
        },
        (Value::String(s), _) => SqlValue::Text(s.clone()),
        (Value::Array(_) | Value::Object(_), _) => SqlValue::Text(value.to_string()),
    })
}

fn real(n: &serde_json::Number) -> Result<f64> {
    n.as_f64()
        .ok_or_else(|| JambiError::TypeConstraint(format!("{n} is not representable as a real")))
}

fn from_sql(value: ValueRef<'_>, kind: FieldKind) -> Result<Value> {
    Ok(match (value, kind) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), FieldKind::Boolean) => Value::Bool(i != 0),
        (ValueRef::Integer(i), FieldKind::Real) => Value::from(i as f64),
        (ValueRef::Integer(i), _) => Value::from(i),
        (ValueRef::Real(r), _) => Value::from(r),
        (ValueRef::Text(bytes), FieldKind::Json) => serde_json::from_slice(bytes)?,
        (ValueRef::Text(bytes), _) => Value::String(
            std::str::from_utf8(bytes)
                .map_err(|e| JambiError::Decode(e.to_string()))?
                .to_string(),
        ),
        (ValueRef::Blob(_), _) => {
            return Err(JambiError::Decode(format!(
                "blob values are not supported in {kind:?} fields"
            )));
        }
    })
}
