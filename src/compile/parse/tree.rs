use crate::{
    compile::{parse::scope::Scope, Operator},
    region::Region,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The Abstract Syntax Tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Tree {
    /// Raw text.
    Raw(Region),
    /// Render an expression.
    Output(Output),
    /// Conditional rendering.
    If(IfTree),
    /// A for loop.
    For(ForTree),
    /// An assignment.
    Set(Set),
    /// Dump of one value, or the whole variable scope.
    Debug(DebugTree),
    /// Render the enclosed scope, then collapse whitespace between tags.
    Spaceless(Scope),
    /// Raw text that was captured with zero interpretation.
    Verbatim(Region),
    /// Render the enclosed scope with explicit escaping behavior.
    Autoescape(AutoescapeTree),
}

/// Represents data within an expression or raw expression tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expression {
    /// A literal value located directly in the template source.
    Literal(Literal),
    /// A value located in the Store.
    Variable(Variable),
    /// A call to a registered function.
    Function(FunctionCall),
    /// A call to a registered filter, which receives the value of an
    /// underlying `Expression` as input.
    Filter(FilterCall),
    /// A negation of an underlying `Expression`.
    Not(Negate),
    /// An operation on two underlying `Expression` instances.
    Binary(Binary),
    /// A parenthesized `Expression`.
    Group(Group),
}

impl Expression {
    /// Get the Region from the underlying Expression kind.
    pub fn get_region(&self) -> Region {
        match self {
            Expression::Literal(literal) => literal.region,
            Expression::Variable(variable) => variable.get_region(),
            Expression::Function(function) => function.region,
            Expression::Filter(filter) => filter.region,
            Expression::Not(negate) => negate.region,
            Expression::Binary(binary) => binary.region,
            Expression::Group(group) => group.region,
        }
    }
}

/// Represents a call to render some kind of Expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    /// The `Expression` to render.
    pub expression: Expression,
    /// False when the `Output` comes from a raw expression tag, which
    /// is never escaped.
    pub escape: bool,
    /// Location of the `Output`.
    pub region: Region,
}

/// Literal data that does not need to be evaluated any further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: Value,
    pub region: Region,
}

/// Set of Key instances that can be used to locate data within the Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub path: Vec<Key>,
}

impl Variable {
    /// Get a Region spanning the area from the first and last Key instances.
    pub fn get_region(&self) -> Region {
        self.path
            .first()
            .expect("variable must have at least one key")
            .get_region()
            .combine(
                self.path
                    .last()
                    .expect("variable must have at least one key")
                    .get_region(),
            )
    }
}

/// Path segment in a larger identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub identifier: Identifier,
}

impl Key {
    /// Get a Region from the internal Identifier.
    pub fn get_region(&self) -> Region {
        self.identifier.region
    }
}

impl From<Identifier> for Key {
    fn from(value: Identifier) -> Self {
        Self { identifier: value }
    }
}

/// Area that contains an identifying value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub region: Region,
}

/// Call to some registered function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: Identifier,
    pub arguments: Vec<Expression>,
    pub region: Region,
}

/// Call to some registered filter.
///
/// Refers to an underlying Expression from which the input data
/// is derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCall {
    pub name: Identifier,
    pub receiver: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub region: Region,
}

/// Negation of an underlying Expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negate {
    pub operand: Box<Expression>,
    pub region: Region,
}

/// Operation on two underlying Expression instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binary {
    pub left: Box<Expression>,
    pub operator: Operator,
    pub right: Box<Expression>,
    pub region: Region,
}

/// Parenthesized Expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub inner: Box<Expression>,
    pub region: Region,
}

/// Conditional rendering expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfTree {
    /// Conditional branches, tested in order of appearance.
    pub branches: Vec<Branch>,
    /// Scope to render when no branch condition holds.
    pub else_branch: Option<Scope>,
    /// Location of the whole block, from `if` to `endif`.
    pub region: Region,
}

/// One conditional branch within an [`IfTree`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expression,
    pub scope: Scope,
}

/// Loop rendering expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForTree {
    /// Bindings created on each iteration.
    pub variables: LoopVariables,
    /// The value being iterated on.
    pub iterable: Expression,
    /// Scope rendered once per iteration.
    pub scope: Scope,
    /// Scope to render when the iterable is empty.
    pub else_branch: Option<Scope>,
    /// Location of the whole block, from `for` to `endfor`.
    pub region: Region,
}

/// Variable types derived from a loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopVariables {
    /// A single binding receiving the item.
    Item(Identifier),
    /// A pair of bindings receiving the key and item.
    KeyValue(KeyValue),
}

/// Key/value pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: Identifier,
    pub value: Identifier,
    pub region: Region,
}

/// Assignment of an Expression to a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Set {
    pub name: Identifier,
    pub value: Expression,
    pub region: Region,
}

/// Dump of one value, or the whole variable scope when no
/// Expression is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugTree {
    pub expression: Option<Expression>,
    pub region: Region,
}

/// Scope with explicit escaping behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoescapeTree {
    /// Escaping mode for the enclosed scope.
    ///
    /// Evaluated for truthiness when the block is rendered, `None`
    /// behaves the same as a literal true.
    pub mode: Option<Expression>,
    pub scope: Scope,
    pub region: Region,
}
