//! Call arguments passed through every dispatched operation.
//!
//! A [`Kwargs`] map is the keyword-argument bag of a call: field names for
//! `create`/`insert`, arbitrary parameters for model functions. A few keys are
//! reserved by the dispatcher and never reach the persistence layer:
//! * [`MOD_IN`] – set to `false` to skip input transformation for this call.
//! * [`MOD_OUT`] – set to `false` to skip output transformation for this call.
//! * [`MODEL`] – overrides the owning model of a model function call.

use serde_json::Value;

pub type Kwargs = serde_json::Map<String, Value>;

pub const MOD_IN: &str = "mod_in";
pub const MOD_OUT: &str = "mod_out";
pub const MODEL: &str = "model";

/// Which transformation phases run for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phases {
    pub input: bool,
    pub output: bool,
}

impl Default for Phases {
    fn default() -> Self {
        Self { input: true, output: true }
    }
}

impl Phases {
    /// Removes the phase switches from `kwargs` and reports what they asked for.
    ///
    /// Only an explicit JSON `false` disables a phase; a missing key or any
    /// other value leaves it enabled.
    pub fn extract(kwargs: &mut Kwargs) -> Self {
        let input = !matches!(kwargs.remove(MOD_IN), Some(Value::Bool(false)));
        let output = !matches!(kwargs.remove(MOD_OUT), Some(Value::Bool(false)));
        Self { input, output }
    }
}

/// Builds a [`Kwargs`] map, converting each value with `serde_json::json!`.
///
/// ```
/// let kwargs = jambi::kwargs! { "status" => "pending", "quantity" => 3 };
/// assert_eq!(kwargs["quantity"], 3);
/// ```
#[macro_export]
macro_rules! kwargs {
    () => {
        $crate::Kwargs::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Kwargs::new();
        $(
            map.insert(($key).to_string(), $crate::__serde_json::json!($value));
        )+
        map
    }};
}
