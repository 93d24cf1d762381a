use crate::compile::parse::scope::Scope;
use serde::{Deserialize, Serialize};

/// A compiled [`Template`] that can be rendered with a `Store`.
///
/// Owns a copy of the source text, so a `Template` pulled out of the
/// compilation cache can still point at the offending text when a
/// render fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// The name of the [`Template`].
    pub(crate) name: Option<String>,
    /// The Abstract Syntax Tree generated during compilation.
    pub(crate) scope: Scope,
    /// The source text from which this [`Template`] was generated.
    pub(crate) source: String,
}

impl Template {
    /// Return the name of the [`Template`], if it has one.
    #[inline]
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Return the source text of the [`Template`].
    #[inline]
    pub fn get_source(&self) -> &str {
        &self.source
    }
}
