//! Contains the [`Filter`] trait, and types useful for creating and using
//! filters.
//!
//! A `Filter` is a function that transforms a [`Value`] before it is
//! rendered. Any struct that implements the [`Filter`] trait, or function
//! matching the [`apply`][`Filter::apply`] method, can be registered on an
//! [`Engine`][`crate::Engine`], and is then available in every template
//! rendered by that engine.
//!
//! ## Examples
//!
//! This expression looks up a "name" variable in the
//! [`Store`][`crate::Store`] and pushes it through two filters:
//!
//! ```html
//! {{ name | trim | slice(0, 3) }}
//! ```
//!
//! The pipe `|` denotes that the following identifier is a filter name,
//! and the filter chain is applied left to right, so `trim` runs first.
//! Arguments are written in parentheses and may be full expressions.
//!
//! A number of filters such as `length`, `upper`, `join`, `slice` and
//! `batch` are built in. Additional filters are registered as either a
//! struct implementing the trait, or a plain function matching the trait
//! signature:
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
//! fn reverse(value: &Value, _: &[Value]) -> Result<Value, Error> {
//!     match value {
//!         Value::String(string) => Ok(json!(string.chars().rev().collect::<String>())),
//!         _ => Err(Error::build("filter `reverse` expects string input")
//!             .with_help("use quotes to coerce data to string")),
//!     }
//! }
//!
//! let engine = stencil::default().with_filter_must("reverse", reverse);
//! let template = engine.compile("{{ name | reverse }}").unwrap();
//! let result = engine.render_template(
//!     &template,
//!     &Store::new().with_must("name", "taylor"),
//! ).unwrap();
//!
//! assert_eq!(result, "rolyat");
//! ```
//!
//! When a filter returns an [`Error`] without a visualization of its own,
//! the renderer attaches a [`Pointer`][`crate::filter::visual::Pointer`]
//! to the filter name, so printing the error with `{:#}` shows where in
//! the template the call went wrong.

pub mod serde {
    //! Contains types from `serde_json`.
    pub use serde_json::*;
}
pub mod visual {
    //! Contains the `Visual` trait and types that implement `Visual`.
    pub use crate::log::{Pointer, Visual};
}

pub use crate::{log::Error, region::Region};

use serde_json::Value;

/// Describes a type that can be used to transform a [`Value`].
pub trait Filter: Sync + Send {
    /// Apply the [`Filter`] to the given input [`Value`] and positional
    /// arguments, and return a new `Value`.
    ///
    /// # Errors
    ///
    /// May return an [`Error`] to abort template rendering.
    fn apply(&self, input: &Value, args: &[Value]) -> Result<Value, Error>;
}

/// Allows any function with a matching signature to be registered as a [`Filter`].
impl<F> Filter for F
where
    F: Fn(&Value, &[Value]) -> Result<Value, Error> + Sync + Send,
{
    fn apply(&self, input: &Value, args: &[Value]) -> Result<Value, Error> {
        self(input, args)
    }
}

#[cfg(test)]
mod tests {
    use crate::{engine::Engine, log::Error, store::Store};
    use serde_json::{json, Value};

    #[test]
    fn test_call_chain() {
        let engine = get_test_engine();
        let result = engine.render_template(
            &engine.compile("{{ name | to_lowercase | left(3) }}").unwrap(),
            &Store::new().with_must("name", "TAYLOR"),
        );

        assert_eq!(result.unwrap(), "tay");
    }

    #[test]
    fn test_call_chain_error() {
        let engine = get_test_engine();
        let result = engine.render_template(
            &engine
                .compile("{{ name | to_lowercase | left(\"10\") }}")
                .unwrap(),
            &Store::new().with_must("name", "TAYLOR"),
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_filter() {
        let engine = Engine::default();
        let result = engine.render_template(
            &engine.compile("{{ name | ghost }}").unwrap(),
            &Store::new().with_must("name", "taylor"),
        );

        assert!(result.is_err());
    }

    /// Return a new Engine equipped with test filters.
    fn get_test_engine() -> Engine {
        Engine::default()
            .with_filter_must("to_lowercase", to_lowercase)
            .with_filter_must("left", left)
    }

    /// Lowercase the given value.
    fn to_lowercase(value: &Value, _: &[Value]) -> Result<Value, Error> {
        match value {
            Value::String(string) => Ok(json!(string.to_lowercase())),
            _ => Err(Error::build("filter `to_lowercase` expects string input")),
        }
    }

    /// Return the first n characters of the input Value from the left,
    /// where n is the value of the first argument.
    fn left(value: &Value, args: &[Value]) -> Result<Value, Error> {
        if args.len() != 1 {
            return Err(Error::build(format!(
                "filter `left` expects `1` argument, received `{}`",
                args.len()
            )));
        }

        match (value, &args[0]) {
            (Value::String(string), Value::Number(number)) => match number.as_u64() {
                Some(n) => Ok(json!(string.chars().take(n as usize).collect::<String>())),
                None => Err(Error::build(
                    "filter `left` expects an integer that fits in u64",
                )),
            },
            (Value::String(_), argument) => Err(Error::build(format!(
                "filter `left` expects a number argument, received `{}`",
                argument
            ))),
            _ => Err(Error::build("filter `left` expects string input")),
        }
    }
}
