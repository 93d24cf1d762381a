use crate::compile::{
    syntax::Marker,
    {Keyword, Operator},
};
use std::fmt::Display;

/// Types emitted by the Lexer.
///
/// An abstraction over raw text to make construction of Tree types easier.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Token {
    /// Raw text.
    Raw,
    /// String literal within a tag.
    String,
    /// Number within a tag.
    Number,
    /// Identifier (unquoted string) within a tag.
    Identifier,
    /// Whitespace within a tag.
    Whitespace,
    /// Beginning of an escaped expression - {{.
    BeginExpression,
    /// End of an escaped expression - }}.
    EndExpression,
    /// Beginning of a raw expression - {!.
    BeginRaw,
    /// End of a raw expression - !}.
    EndRaw,
    /// Beginning of a block - {%.
    BeginBlock,
    /// End of a block - %}.
    EndBlock,
    /// .
    Period,
    /// ,
    Comma,
    /// |
    Pipe,
    /// =
    Assign,
    /// (
    LeftParen,
    /// )
    RightParen,
    /// A boolean true.
    True,
    /// A boolean false.
    False,
    /// A recognized "special" keyword that begins a certain type of block.
    Keyword(Keyword),
    /// Describes an action taken on two values.
    Operator(Operator),
}

impl Token {
    /// Convert a [`Marker`] id into a Token.
    pub(crate) fn from_marker(id: usize) -> Self {
        match Marker::from(id) {
            Marker::BeginExpression => Self::BeginExpression,
            Marker::EndExpression => Self::EndExpression,
            Marker::BeginRaw => Self::BeginRaw,
            Marker::EndRaw => Self::EndRaw,
            Marker::BeginBlock => Self::BeginBlock,
            Marker::EndBlock => Self::EndBlock,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Raw => write!(f, "raw"),
            Token::String => write!(f, "string"),
            Token::Number => write!(f, "number"),
            Token::Identifier => write!(f, "identifier"),
            Token::Whitespace => write!(f, "whitespace"),
            Token::BeginExpression => write!(f, "begin expression (`{{{{`)"),
            Token::EndExpression => write!(f, "end expression (`}}}}`)"),
            Token::BeginRaw => write!(f, "begin raw expression (`{{!`)"),
            Token::EndRaw => write!(f, "end raw expression (`!}}`)"),
            Token::BeginBlock => write!(f, "begin block (`{{%`)"),
            Token::EndBlock => write!(f, "end block (`%}}`)"),
            Token::Period => write!(f, "period (`.`)"),
            Token::Comma => write!(f, "comma (`,`)"),
            Token::Pipe => write!(f, "pipe (`|`)"),
            Token::Assign => write!(f, "assign (`=`)"),
            Token::LeftParen => write!(f, "left parenthesis (`(`)"),
            Token::RightParen => write!(f, "right parenthesis (`)`)"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Keyword(keyword) => write!(f, "keyword `{keyword}`"),
            Token::Operator(operator) => write!(f, "operator `{operator}`"),
        }
    }
}
