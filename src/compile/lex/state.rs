use crate::{compile::lex::Token, region::Region};

/// Describes the internal state of a [`Lexer`][`super::Lexer`].
#[derive(Debug, PartialEq)]
pub enum CursorState {
    /// The [`Lexer`][`super::Lexer`] is reading plain text.
    Default,
    /// The [`Lexer`][`super::Lexer`] is inside of an expression, raw
    /// expression or block.
    Inside {
        /// The [`Token`] that will close the tag.
        end_token: Token,
        /// Location of the marker that opened the tag, kept to
        /// illustrate the error when the tag is never closed.
        begin: Region,
    },
}
