//! Compiles source text into a [`Template`].
//!
//! The [`Lexer`][`lex::Lexer`] reads the source as markers and tokens,
//! the [`Parser`] builds the abstract syntax tree from those tokens, and
//! the resulting `Template` owns everything it needs to be rendered or
//! persisted to the compilation cache.
mod lex;
mod parse;
mod syntax;
mod template;

pub use crate::compile::{
    parse::{scope::Scope, tree, Parser},
    template::Template,
};

use crate::{compile::lex::token::Token, log::Error, region::Region};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Result of a single pull on the Lexer.
///
/// A value of `None` indicates the end of the source text.
pub(crate) type TokenResult = Result<Option<(Token, Region)>, Error>;

/// Compile a [`Template`] from the given text.
///
/// Provides a shortcut to quickly compile a `Template` without creating
/// an `Engine`.
///
/// # Examples
///
/// ```
/// use stencil::compile;
///
/// let template = compile("{{ name }}");
/// assert!(template.is_ok())
/// ```
pub fn compile(text: &str) -> Result<Template, Error> {
    Parser::new(text).compile(None)
}

/// Keywords recognized by the Lexer and Parser.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Keyword {
    /// Beginning of an "if" block.
    If,
    /// Continuation of an "if" block with a new condition.
    ElseIf,
    /// Marks the beginning of the alternative branch in an "if" or
    /// "for" block.
    Else,
    /// End of an "if" block.
    EndIf,
    /// Beginning of a loop.
    For,
    /// Divides the bindings from the iterable in a loop.
    ///
    /// In this example, "person" is the binding while "people" is
    /// the iterable:
    ///
    /// "for person in people"
    In,
    /// End of a loop.
    EndFor,
    /// Beginning of an assignment.
    Set,
    /// Dump of one value, or the whole variable scope.
    Debug,
    /// Beginning of a whitespace-collapsed region.
    Spaceless,
    /// End of a whitespace-collapsed region.
    EndSpaceless,
    /// Beginning of an uninterpreted region.
    Verbatim,
    /// End of an uninterpreted region.
    EndVerbatim,
    /// Beginning of a region with explicit escaping behavior.
    Autoescape,
    /// End of a region with explicit escaping behavior.
    EndAutoescape,
    /// Enables negation.
    Not,
    /// Logical conjunction.
    And,
    /// Logical disjunction.
    Or,
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Keyword::If => write!(f, "if"),
            Keyword::ElseIf => write!(f, "elseif"),
            Keyword::Else => write!(f, "else"),
            Keyword::EndIf => write!(f, "endif"),
            Keyword::For => write!(f, "for"),
            Keyword::In => write!(f, "in"),
            Keyword::EndFor => write!(f, "endfor"),
            Keyword::Set => write!(f, "set"),
            Keyword::Debug => write!(f, "debug"),
            Keyword::Spaceless => write!(f, "spaceless"),
            Keyword::EndSpaceless => write!(f, "endspaceless"),
            Keyword::Verbatim => write!(f, "verbatim"),
            Keyword::EndVerbatim => write!(f, "endverbatim"),
            Keyword::Autoescape => write!(f, "autoescape"),
            Keyword::EndAutoescape => write!(f, "endautoescape"),
            Keyword::Not => write!(f, "not"),
            Keyword::And => write!(f, "and"),
            Keyword::Or => write!(f, "or"),
        }
    }
}

/// Operators recognized by the Lexer and Parser.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum Operator {
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// /
    Divide,
    /// >
    Greater,
    /// <
    Lesser,
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// >=
    GreaterOrEqual,
    /// <=
    LesserOrEqual,
    /// and
    And,
    /// or
    Or,
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Add => write!(f, "+"),
            Operator::Subtract => write!(f, "-"),
            Operator::Multiply => write!(f, "*"),
            Operator::Divide => write!(f, "/"),
            Operator::Greater => write!(f, ">"),
            Operator::Lesser => write!(f, "<"),
            Operator::Equal => write!(f, "=="),
            Operator::NotEqual => write!(f, "!="),
            Operator::GreaterOrEqual => write!(f, ">="),
            Operator::LesserOrEqual => write!(f, "<="),
            Operator::And => write!(f, "and"),
            Operator::Or => write!(f, "or"),
        }
    }
}
