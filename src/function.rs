//! Contains the [`Function`] trait, used for free-standing calls in
//! expressions.
//!
//! Unlike a [`Filter`][`crate::filter::Filter`], a `Function` receives no
//! piped input, only the arguments written at the call site:
//!
//! ```html
//! {{ upper(greet("World")) }}
//! ```
//!
//! Names resolve against the engine's function registry at render time,
//! so calls may be nested freely and a template only fails when it is
//! rendered with an engine that is missing the function.
//!
//! ## Examples
//!
//! ```
//! use stencil::{
//!     filter::{
//!         serde::{json, Value},
//!         Error,
//!     },
//!     Store,
//! };
//!
//! fn greet(args: &[Value]) -> Result<Value, Error> {
//!     match args {
//!         [Value::String(name)] => Ok(json!(format!("Hello, {name}!"))),
//!         _ => Err(Error::build("function `greet` expects one string argument")),
//!     }
//! }
//!
//! let engine = stencil::default().with_function_must("greet", greet);
//! let template = engine.compile("{{ greet(\"World\") }}").unwrap();
//! let result = engine.render_template(&template, &Store::new()).unwrap();
//!
//! assert_eq!(result, "Hello, World!");
//! ```

pub use crate::log::Error;

use serde_json::Value;

/// Describes a type that can be called by name from an expression.
pub trait Function: Sync + Send {
    /// Execute the [`Function`] with the given positional arguments and
    /// return a new [`Value`].
    ///
    /// # Errors
    ///
    /// May return an [`Error`] to abort template rendering.
    fn call(&self, args: &[Value]) -> Result<Value, Error>;
}

/// Allows any function with a matching signature to be registered as a [`Function`].
impl<F> Function for F
where
    F: Fn(&[Value]) -> Result<Value, Error> + Sync + Send,
{
    fn call(&self, args: &[Value]) -> Result<Value, Error> {
        self(args)
    }
}

#[cfg(test)]
mod tests {
    use crate::{engine::Engine, log::Error, store::Store};
    use serde_json::{json, Value};

    #[test]
    fn test_nested_call() {
        let engine = Engine::default()
            .with_function_must("greet", greet)
            .with_function_must("shout", shout);
        let result = engine.render_template(
            &engine.compile("{{ shout(greet(name)) }}").unwrap(),
            &Store::new().with_must("name", "world"),
        );

        assert_eq!(result.unwrap(), "HELLO, WORLD!");
    }

    #[test]
    fn test_unknown_function() {
        let engine = Engine::default();
        let result = engine.render_template(
            &engine.compile("{{ ghost() }}").unwrap(),
            &Store::new(),
        );

        assert!(result.is_err());
    }

    /// Wrap the first argument in a greeting.
    fn greet(args: &[Value]) -> Result<Value, Error> {
        match args {
            [Value::String(name)] => Ok(json!(format!("hello, {name}!"))),
            _ => Err(Error::build("function `greet` expects one string argument")),
        }
    }

    /// Uppercase the first argument.
    fn shout(args: &[Value]) -> Result<Value, Error> {
        match args {
            [Value::String(text)] => Ok(json!(text.to_uppercase())),
            _ => Err(Error::build("function `shout` expects one string argument")),
        }
    }
}
