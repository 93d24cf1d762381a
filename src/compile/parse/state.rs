use crate::{
    compile::parse::{
        scope::Scope,
        tree::{Branch, Expression, LoopVariables},
    },
    region::Region,
};

/// Describes the internal state of a `Parser`.
///
/// One instance exists for every block that has been opened but not
/// yet closed.
pub enum BlockState {
    /// The `Parser` is evaluating an "if" block.
    If {
        /// Condition of the branch that is currently being collected.
        ///
        /// Moved into `branches` when an "elseif", "else" or "endif"
        /// is found.
        condition: Option<Expression>,
        /// Completed branches.
        branches: Vec<Branch>,
        /// True if an "else" has already been found.
        has_else: bool,
        /// [`Region`] spanning the opening "if" tag.
        region: Region,
    },
    /// The `Parser` is evaluating a "for" block.
    For {
        /// Bindings created on each iteration.
        variables: LoopVariables,
        /// The value being iterated on.
        iterable: Expression,
        /// Populated when an "else" is found, and holds the loop body,
        /// after which the open scope collects the else branch.
        body: Option<Scope>,
        /// [`Region`] spanning the opening "for" tag.
        region: Region,
    },
    /// The `Parser` is evaluating a "spaceless" block.
    Spaceless {
        /// [`Region`] spanning the opening "spaceless" tag.
        region: Region,
    },
    /// The `Parser` is evaluating an "autoescape" block.
    Autoescape {
        /// Escaping mode for the enclosed scope.
        mode: Option<Expression>,
        /// [`Region`] spanning the opening "autoescape" tag.
        region: Region,
    },
}

impl BlockState {
    /// Return the name of the tag that opened this block.
    pub fn name(&self) -> &'static str {
        match self {
            BlockState::If { .. } => "if",
            BlockState::For { .. } => "for",
            BlockState::Spaceless { .. } => "spaceless",
            BlockState::Autoescape { .. } => "autoescape",
        }
    }

    /// Return the name of the tag that closes this block.
    pub fn close_name(&self) -> &'static str {
        match self {
            BlockState::If { .. } => "endif",
            BlockState::For { .. } => "endfor",
            BlockState::Spaceless { .. } => "endspaceless",
            BlockState::Autoescape { .. } => "endautoescape",
        }
    }

    /// Return the [`Region`] spanning the tag that opened this block.
    pub fn get_region(&self) -> Region {
        match self {
            BlockState::If { region, .. }
            | BlockState::For { region, .. }
            | BlockState::Spaceless { region }
            | BlockState::Autoescape { region, .. } => *region,
        }
    }
}
