use crate::compile::parse::tree::Tree;
use serde::{Deserialize, Serialize};

/// A distinct set of Tree instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scope {
    pub data: Vec<Tree>,
}

impl Scope {
    /// Create a new Scope.
    #[inline]
    pub fn new() -> Self {
        Self { data: vec![] }
    }
}
