//! A template engine.
//!
//! Expressions write data from the [`Store`] into the rendered output,
//! escaped for HTML by default:
//!
//! ```html
//! hello, {{ name }}!
//! ```
//!
//! Raw expressions write without escaping:
//!
//! ```html
//! {! markup !}
//! ```
//!
//! Blocks provide control structures such as `if`, `for`, `set`,
//! `spaceless`, `verbatim` and `autoescape`:
//!
//! ```html
//! {% for person in people %}
//!   {{ loop.index }}: {{ person.name | upper }}
//! {% endfor %}
//! ```
//!
//! ## Examples
//!
//! ```
//! use stencil::{compile, render, Store};
//!
//! let template = compile("hello, {{ name }}!").unwrap();
//! let store = Store::new().with_must("name", "taylor");
//!
//! assert_eq!(render(&template, &store).unwrap(), "hello, taylor!");
//! ```
//!
//! An [`Engine`] carries configuration and custom filters and functions,
//! and can render templates by name from a directory, backed by an
//! on-disk compilation cache. See [`Settings`].
mod cache;
mod compile;
mod engine;
pub mod filter;
pub mod function;
mod log;
mod pipe;
mod region;
mod render;
mod store;

pub use compile::{compile, Template};
pub use engine::{Engine, Report, Settings};
pub use log::Error;
pub use region::Region;
pub use render::render;
pub use store::Store;

/// Create a new [`Engine`] with default [`Settings`].
///
/// # Examples
///
/// ```
/// let engine = stencil::default();
/// let template = engine.compile("hello, {{ name }}!");
/// assert!(template.is_ok());
/// ```
pub fn default() -> Engine {
    Engine::default()
}
