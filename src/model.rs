//! Model definitions: the entity types the dispatcher works against.
//!
//! A [`Model`] names a table, lists its typed [`Field`]s and carries the named
//! [`ModelFunction`]s callers can invoke through the engine. Every table also
//! gets an implicit integer primary key called `id`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::{JambiError, Result};
use crate::kwargs::Kwargs;
use crate::persist::{Database, OtherHasher};

lazy_static! {
    static ref MODEL_NAME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap();
    static ref FIELD_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

pub const PRIMARY_KEY: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    Boolean,
    Json,
}

impl FieldKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Json => "text",
            FieldKind::Integer | FieldKind::Boolean => "integer",
            FieldKind::Real => "real",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    nullable: bool,
    unique: bool,
}

impl Field {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable: false,
            unique: false,
        }
    }
    pub fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text)
    }
    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldKind::Integer)
    }
    pub fn real(name: &str) -> Self {
        Self::new(name, FieldKind::Real)
    }
    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }
    pub fn json(name: &str) -> Self {
        Self::new(name, FieldKind::Json)
    }
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> FieldKind {
        self.kind
    }
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

type FunctionBody = dyn Fn(&Database, &Kwargs) -> Result<Value>;

/// A named operation bound to the model that owns it.
#[derive(Clone)]
pub struct ModelFunction {
    owner: String,
    name: String,
    body: Arc<FunctionBody>,
}

impl ModelFunction {
    pub fn new<F>(owner: &str, name: &str, body: F) -> Self
    where
        F: Fn(&Database, &Kwargs) -> Result<Value> + 'static,
    {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            body: Arc::new(body),
        }
    }
    /// Name of the model the function was defined on.
    pub fn owner(&self) -> &str {
        &self.owner
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn call(&self, database: &Database, kwargs: &Kwargs) -> Result<Value> {
        (self.body)(database, kwargs)
    }
}

impl fmt::Debug for ModelFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ModelFunction({}::{})", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    table: String,
    fields: Vec<Field>,
    functions: HashMap<String, ModelFunction, OtherHasher>,
}

impl Model {
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        Self {
            name: name.to_string(),
            table: name.to_lowercase(),
            fields: Vec::new(),
            functions: HashMap::default(),
        }
    }
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
    /// Attaches a named function; redefining a name replaces the earlier one.
    pub fn function<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&Database, &Kwargs) -> Result<Value> + 'static,
    {
        let function = ModelFunction::new(&self.name, name, body);
        self.functions.insert(name.to_string(), function);
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn table(&self) -> &str {
        &self.table
    }
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
    pub fn has_column(&self, name: &str) -> bool {
        name == PRIMARY_KEY || self.get_field(name).is_some()
    }
    pub fn get_function(&self, name: &str) -> Result<&ModelFunction> {
        self.functions
            .get(name)
            .ok_or_else(|| JambiError::UnknownFunction {
                model: self.name.clone(),
                function: name.to_string(),
            })
    }
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
    /// Checks that the model and all of its fields can be used as SQL identifiers.
    pub fn validate(&self) -> Result<()> {
        if !MODEL_NAME.is_match(&self.name) {
            return Err(JambiError::InvalidIdentifier(format!(
                "model name '{}'",
                self.name
            )));
        }
        let mut seen = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if !FIELD_NAME.is_match(&field.name) || field.name == PRIMARY_KEY {
                return Err(JambiError::InvalidIdentifier(format!(
                    "field '{}' on model '{}'",
                    field.name, self.name
                )));
            }
            if seen.contains(&field.name.as_str()) {
                return Err(JambiError::InvalidIdentifier(format!(
                    "duplicate field '{}' on model '{}'",
                    field.name, self.name
                )));
            }
            seen.push(field.name.as_str());
        }
        Ok(())
    }
}

/// One row of a model's table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub fields: Kwargs,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|v| v.as_str())
    }
    /// The record as one JSON object, `id` included.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(PRIMARY_KEY.to_string(), Value::from(self.id));
        Value::Object(object)
    }
}
