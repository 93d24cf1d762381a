pub mod token;

mod state;

use self::{state::CursorState, token::Token};

use crate::{
    compile::{
        syntax::{self, Marker},
        Keyword, Operator, TokenResult,
    },
    log::{expected_operator, Error, INVALID_SYNTAX, UNEXPECTED_EOF, UNEXPECTED_TOKEN},
    region::Region,
};

use morel::Finder;

/// Provides methods to read a source string as [`Token`] instances.
pub struct Lexer<'source> {
    /// Reference to the source text.
    pub source: &'source str,
    /// Position within source.
    pub cursor: usize,
    /// Compiled [`Finder`] used to search for delimiters in the
    /// source text.
    finder: Finder<&'source str>,
    /// Tracks the [`Lexer`] state and determines the action taken
    /// when `.next` is called.
    state: CursorState,
    /// Temporary storage for a [`Token`] that will be read on the
    /// following call to `.next`
    buffer: Option<(Token, Region)>,
}

impl<'source> Lexer<'source> {
    /// Create a new [`Lexer`] from the given source.
    #[inline]
    pub fn new(source: &'source str) -> Self {
        Self {
            finder: syntax::finder(),
            state: CursorState::Default,
            source,
            cursor: 0,
            buffer: None,
        }
    }

    /// Return the next [`Token`] and [`Region`].
    ///
    /// Any instance of [`Token::Whitespace`] is ignored.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an unexpected [`Token`] is found, or when
    /// the source text ends while a tag is still open.
    pub fn next(&mut self) -> TokenResult {
        loop {
            // Always prefer taking from the buffer when possible.
            if let Some(next) = self.buffer.take() {
                return Ok(Some(next));
            }
            if self.source[self.cursor..].is_empty() {
                return match &self.state {
                    CursorState::Default => Ok(None),
                    CursorState::Inside { end_token, begin } => {
                        Err(Error::build(UNEXPECTED_EOF)
                            .with_pointer(self.source, *begin)
                            .with_help(format!(
                                "this tag is never closed, expected {end_token}"
                            )))
                    }
                };
            }

            let c = self.cursor;
            let result = match self.state {
                CursorState::Default => self.lex_default(c),
                CursorState::Inside { .. } => self.lex_tag(c),
            }?;

            return match result {
                Some((token, region)) => match token {
                    Token::Whitespace => continue,
                    _ => Ok(Some((token, region))),
                },
                None => Ok(None),
            };
        }
    }

    /// Scan ahead for the tag that closes a `verbatim` block.
    ///
    /// Everything between the cursor and that tag is returned untouched
    /// as a [`Region`], and the cursor is left just beyond the tag.
    ///
    /// The given `Region` should point to the opening `verbatim` tag,
    /// it is used to illustrate the error when no closing tag exists.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the closing tag is never found.
    pub fn read_verbatim(&mut self, open: Region) -> Result<Region, Error> {
        debug_assert!(self.buffer.is_none(), "buffer must be empty before verbatim scan");
        debug_assert!(self.state == CursorState::Default, "verbatim scan must begin outside a tag");

        let begin = self.cursor;
        let mut from = begin;
        while let Some((id, marker_begin, marker_end)) = self.finder.next(self.source, from) {
            from = marker_end;
            if id != Marker::BeginBlock as usize {
                continue;
            }
            let Some(found) = self.source[marker_end..].find(syntax::END_BLOCK) else {
                break;
            };
            let content_end = marker_end + found;
            if self.source[marker_end..content_end].trim() == "endverbatim" {
                self.cursor = content_end + syntax::END_BLOCK.len();

                return Ok(Region::new(begin..marker_begin));
            }
        }

        Err(Error::build(INVALID_SYNTAX)
            .with_pointer(self.source, open)
            .with_help("`verbatim` block is never closed, try adding `{% endverbatim %}`"))
    }

    /// Return the next [`Token`] and [`Region`] in [`CursorState::Inside`]
    /// configuration.
    ///
    /// Assumes the cursor is inside of an expression or block.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an unexpected [`Token`] is found.
    fn lex_tag(&mut self, from: usize) -> TokenResult {
        match self.finder.starts(self.source, from) {
            Some((id, length)) => {
                let token = Token::from_marker(id);

                match self.state {
                    CursorState::Inside { ref end_token, .. } => {
                        if token == *end_token {
                            self.state = CursorState::Default;
                            self.cursor = length;

                            Ok(Some((token, (from..length).into())))
                        } else {
                            let which = match end_token {
                                Token::EndExpression => "expression",
                                Token::EndRaw => "raw expression",
                                _ => "block",
                            };

                            Err(Error::build(UNEXPECTED_TOKEN)
                                .with_pointer(self.source, from..length)
                                .with_help(format!("did you close the previous {which}?")))
                        }
                    }
                    _ => panic!("lexer must be in tag state"),
                }
            }
            None => {
                let mut advance = |length: usize, data: Token| {
                    self.cursor += length;

                    Ok(Some((data, (from..from + length).into())))
                };

                let mut iterator = self.source[from..]
                    .char_indices()
                    .map(|(d, c)| (from + d, c));
                let (index, char) = iterator.next().unwrap();

                match char {
                    '*' => advance(1, Token::Operator(Operator::Multiply)),
                    '+' => advance(1, Token::Operator(Operator::Add)),
                    '/' => advance(1, Token::Operator(Operator::Divide)),
                    '-' => advance(1, Token::Operator(Operator::Subtract)),
                    '.' => advance(1, Token::Period),
                    ',' => advance(1, Token::Comma),
                    '|' => advance(1, Token::Pipe),
                    '(' => advance(1, Token::LeftParen),
                    ')' => advance(1, Token::RightParen),
                    '"' => self.lex_string(iterator, index),
                    '=' | '!' | '>' | '<' => self.lex_operator(iterator, index, char),
                    c if c.is_whitespace() => Ok(Some(self.lex_whitespace(iterator, index))),
                    c if c.is_ascii_digit() => Ok(Some(self.lex_digit(iterator, index))),
                    c if is_ident_start(c) => Ok(Some(self.lex_ident_or_keyword(iterator, index))),
                    _ => Err(Error::build(UNEXPECTED_TOKEN)
                        .with_pointer(self.source, index..index + char.len_utf8())
                        .with_help(
                            "expected one of `*`, `+`, `/`, `-`, `.`, `,`, `|`, `(`, `)`, \
                            an identifier, an ascii digit, or beginning of a string literal \
                            marked with `\"`",
                        )),
                }
            }
        }
    }

    /// Return a [`Token`] and [`Region`] based on the previous character.
    ///
    /// Checks the next character via `.next` to ensure the correct `Token` is
    /// returned. All of these are recognized:
    ///
    /// `==`, `!=`, `>=`, `<=`, `=`, `>`, `<`
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an unexpected [`Token`] is found.
    fn lex_operator<T>(&mut self, mut iter: T, from: usize, previous: char) -> TokenResult
    where
        T: Iterator<Item = (usize, char)>,
    {
        let (position, token) = match (previous, iter.next()) {
            // Double:
            ('=', Some((usize, '='))) => (usize, Token::Operator(Operator::Equal)),
            ('!', Some((usize, '='))) => (usize, Token::Operator(Operator::NotEqual)),
            ('>', Some((usize, '='))) => (usize, Token::Operator(Operator::GreaterOrEqual)),
            ('<', Some((usize, '='))) => (usize, Token::Operator(Operator::LesserOrEqual)),
            // Single:
            ('=', _) => (from, Token::Assign),
            ('>', _) => (from, Token::Operator(Operator::Greater)),
            ('<', _) => (from, Token::Operator(Operator::Lesser)),
            ('!', _) => {
                return Err(Error::build(UNEXPECTED_TOKEN)
                    .with_pointer(self.source, from..from + 1)
                    .with_help("`!` is only valid as part of `!=`"));
            }
            _ => {
                return Err(Error::build(UNEXPECTED_TOKEN)
                    .with_pointer(self.source, from..from + 1)
                    .with_help(expected_operator(previous)));
            }
        };
        let position = position + 1;
        self.cursor = position;

        Ok(Some((token, (from..position).into())))
    }

    /// Return a [`Token`] and [`Region`] containing [`Token::Number`].
    fn lex_digit<T>(&mut self, mut iter: T, from: usize) -> (Token, Region)
    where
        T: Iterator<Item = (usize, char)>,
    {
        loop {
            match iter.next() {
                Some((index, char)) if !is_number(char) => {
                    self.cursor = index;

                    break (Token::Number, (from..index).into());
                }
                Some((_, _)) => continue,
                None => {
                    self.cursor = self.source.len();

                    return (Token::Number, (from..self.source.len()).into());
                }
            }
        }
    }

    /// Return a [`Token`] and [`Region`] containing [`Token::Whitespace`].
    fn lex_whitespace<T>(&mut self, mut iter: T, from: usize) -> (Token, Region)
    where
        T: Iterator<Item = (usize, char)>,
    {
        loop {
            match iter.next() {
                Some((index, char)) if !char.is_whitespace() => {
                    self.cursor = index;

                    break (Token::Whitespace, (from..index).into());
                }
                Some((_, _)) => continue,
                None => {
                    self.cursor = self.source.len();

                    return (Token::Whitespace, (from..self.source.len()).into());
                }
            }
        }
    }

    /// Return a [`Token`] and [`Region`] containing [`Token::String`] using
    /// the given iterator.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the string literal is left undelimited.
    fn lex_string<T>(&mut self, mut iter: T, from: usize) -> TokenResult
    where
        T: Iterator<Item = (usize, char)>,
    {
        let mut previous = (from, '"');
        loop {
            match iter.next() {
                Some((index, '"')) if previous.1 != '\\' => {
                    // Accept a double quote as a signal to end the string, unless the previous
                    // character was an escape.
                    //
                    // Add one to the index of the character to comply with string slice
                    // semantics.
                    let to = index + 1;
                    self.cursor = to;

                    return Ok(Some((Token::String, (from..to).into())));
                }
                Some((index, char)) => {
                    // Assign character to "previous" and move on. We use "previous" to
                    // determine if a double quote should be escaped.
                    previous = (index, char);
                }
                None => {
                    let take = if previous.0 - from > 10 {
                        from + 10
                    } else {
                        previous.0
                    };

                    return Err(Error::build(INVALID_SYNTAX)
                        .with_pointer(self.source, from..take)
                        .with_help(
                            "this might be an undelimited string, try closing it with `\"`",
                        ));
                }
            }
        }
    }

    /// Return a [`Token`] and [`Region`] from the given iterator.
    ///
    /// The `Token` will be [`Token::Identifier`] or [`Token::Keyword`].
    fn lex_ident_or_keyword<T>(&mut self, mut iter: T, from: usize) -> (Token, Region)
    where
        T: Iterator<Item = (usize, char)>,
    {
        let mut check_keyword = |to: usize| {
            let range_text = self
                .source
                .get(from..to)
                .expect("valid range is required to check keyword");

            let token = match range_text {
                "not" => Token::Keyword(Keyword::Not),
                "and" => Token::Keyword(Keyword::And),
                "or" => Token::Keyword(Keyword::Or),
                "if" => Token::Keyword(Keyword::If),
                "elseif" => Token::Keyword(Keyword::ElseIf),
                "else" => Token::Keyword(Keyword::Else),
                "endif" => Token::Keyword(Keyword::EndIf),
                "for" => Token::Keyword(Keyword::For),
                "in" => Token::Keyword(Keyword::In),
                "endfor" => Token::Keyword(Keyword::EndFor),
                "set" => Token::Keyword(Keyword::Set),
                "debug" => Token::Keyword(Keyword::Debug),
                "spaceless" => Token::Keyword(Keyword::Spaceless),
                "endspaceless" => Token::Keyword(Keyword::EndSpaceless),
                "verbatim" => Token::Keyword(Keyword::Verbatim),
                "endverbatim" => Token::Keyword(Keyword::EndVerbatim),
                "autoescape" => Token::Keyword(Keyword::Autoescape),
                "endautoescape" => Token::Keyword(Keyword::EndAutoescape),
                "true" => Token::True,
                "false" => Token::False,
                _ => Token::Identifier,
            };
            self.cursor = to;

            (token, (from..to).into())
        };

        loop {
            match iter.next() {
                Some((index, char)) if !is_ident_continue(char) => {
                    break check_keyword(index);
                }
                Some((_, _)) => continue,
                None => break check_keyword(self.source.len()),
            }
        }
    }

    /// Return the next [`Token`] and [`Region`] in [`CursorState::Default`]
    /// configuration.
    ///
    /// Assumes the cursor is outside of an expression or block.
    ///
    /// A closing marker found here has no opening marker before it, so it
    /// is treated as plain text and the scan continues past it.
    fn lex_default(&mut self, from: usize) -> TokenResult {
        let mut search = from;
        while let Some((id, marker_begin, marker_end)) = self.finder.next(self.source, search) {
            let token = Token::from_marker(id);
            let end_token = match token {
                Token::BeginExpression => Token::EndExpression,
                Token::BeginRaw => Token::EndRaw,
                Token::BeginBlock => Token::EndBlock,
                _ => {
                    search = marker_end;
                    continue;
                }
            };
            self.state = CursorState::Inside {
                end_token,
                begin: (marker_begin..marker_end).into(),
            };

            return if from == marker_begin {
                self.cursor = marker_end;

                Ok(Some((token, (marker_begin..marker_end).into())))
            } else {
                self.cursor = marker_end;
                self.buffer = Some((token, (marker_begin..marker_end).into()));

                Ok(Some((Token::Raw, (from..marker_begin).into())))
            };
        }

        let remaining = from..self.source.len();
        self.cursor = self.source.len();

        Ok(Some((Token::Raw, remaining.into())))
    }
}

/// Return true if the given character is a recognized beginning identifier,
/// meaning '_' or an `xid_start`.
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

/// Return true if the given character is a recognized continue identifier,
/// meaning an `xid_continue`.
fn is_ident_continue(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

/// Return true if the given character is a number (0-9) or a period.
fn is_number(c: char) -> bool {
    matches!(c, '0'..='9' | '.')
}

#[cfg(test)]
mod tests {
    use super::Lexer;
    use crate::{
        compile::{
            lex::{state::CursorState, Token},
            Keyword, Operator,
        },
        log::Error,
        region::Region,
    };

    #[test]
    fn test_lex_default_no_match() {
        let expect = vec![(Token::Raw, 0..11)];

        helper_lex_next_auto("lorem ipsum", expect)
    }

    #[test]
    fn test_lex_default_match() {
        let expect = vec![
            (Token::Raw, 0..12),
            (Token::BeginExpression, 12..14),
            (Token::Identifier, 15..20),
        ];

        helper_lex_next_auto("lorem ipsum {{ dolor", expect);
    }

    #[test]
    fn test_lex_state_change() -> Result<(), Error> {
        let mut block_lexer = Lexer::new("lorem {%");
        let mut raw_lexer = Lexer::new("lorem {!");
        let mut expression_lexer = Lexer::new("lorem {{");
        block_lexer.next()?;
        raw_lexer.next()?;
        expression_lexer.next()?;

        assert_eq!(
            block_lexer.state,
            CursorState::Inside {
                end_token: Token::EndBlock,
                begin: Region::new(6..8)
            }
        );
        assert_eq!(
            raw_lexer.state,
            CursorState::Inside {
                end_token: Token::EndRaw,
                begin: Region::new(6..8)
            }
        );
        assert_eq!(
            expression_lexer.state,
            CursorState::Inside {
                end_token: Token::EndExpression,
                begin: Region::new(6..8)
            }
        );

        Ok(())
    }

    #[test]
    fn test_lex_stray_end_marker() {
        let expect = vec![(Token::Raw, 0..6)];

        helper_lex_next_auto("a }} b", expect);
    }

    #[test]
    fn test_lex_stray_end_marker_before_tag() {
        let expect = vec![
            (Token::Raw, 0..5),
            (Token::BeginExpression, 5..7),
            (Token::Identifier, 8..9),
            (Token::EndExpression, 10..12),
        ];

        helper_lex_next_auto("a %} {{ b }}", expect);
    }

    #[test]
    fn test_lex_unclosed_tag() {
        let mut lexer = Lexer::new("hello {{ name");
        // Raw, BeginExpression, Identifier.
        lexer.next().unwrap();
        lexer.next().unwrap();
        lexer.next().unwrap();
        let error = lexer.next().unwrap_err();

        // The report points at the opening marker.
        assert!(format!("{error:#}").contains("1:7"));
    }

    #[test]
    fn test_lex_digit() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::Number, 3..5),
            (Token::EndExpression, 6..8),
        ];

        helper_lex_next_auto("{{ 10 }}", expect);
    }

    #[test]
    fn test_lex_ident() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::Identifier, 3..8),
            (Token::EndExpression, 9..11),
        ];

        helper_lex_next_auto("{{ hello }}", expect);
    }

    #[test]
    fn test_lex_keyword() {
        let expect = vec![
            (Token::BeginBlock, 0..2),
            (Token::Keyword(Keyword::If), 3..5),
            (Token::Identifier, 6..10),
            (Token::EndBlock, 11..13),
        ];

        helper_lex_next_auto("{% if name %}", expect);
    }

    #[test]
    fn test_lex_raw_expression() {
        let expect = vec![
            (Token::BeginRaw, 0..2),
            (Token::Identifier, 3..7),
            (Token::EndRaw, 8..10),
        ];

        helper_lex_next_auto("{! name !}", expect);
    }

    #[test]
    fn test_lex_string() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::String, 3..9),
            (Token::EndExpression, 10..12),
        ];

        helper_lex_next_auto("{{ \"name\" }}", expect);
    }

    #[test]
    fn test_lex_string_escape() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::String, 3..13),
            (Token::EndExpression, 14..16),
        ];

        helper_lex_next_auto(r#"{{ "\"name\"" }}"#, expect);
    }

    #[test]
    fn test_lex_filter_call() {
        let expect = vec![
            (Token::BeginExpression, 0..2),
            (Token::Identifier, 3..7),
            (Token::Pipe, 8..9),
            (Token::Identifier, 10..15),
            (Token::LeftParen, 15..16),
            (Token::Number, 16..17),
            (Token::Comma, 17..18),
            (Token::Number, 19..20),
            (Token::RightParen, 20..21),
            (Token::EndExpression, 22..24),
        ];

        helper_lex_next_auto("{{ name | slice(0, 3) }}", expect);
    }

    #[test]
    fn test_lex_operators() {
        let expect = vec![
            (Token::BeginBlock, 0..2),
            (Token::Keyword(Keyword::If), 3..5),
            (Token::Identifier, 6..7),
            (Token::Operator(Operator::GreaterOrEqual), 8..10),
            (Token::Number, 11..12),
            (Token::Keyword(Keyword::And), 13..16),
            (Token::Identifier, 17..18),
            (Token::Operator(Operator::NotEqual), 19..21),
            (Token::Number, 22..23),
            (Token::EndBlock, 24..26),
        ];

        helper_lex_next_auto("{% if a >= 1 and b != 2 %}", expect);
    }

    #[test]
    fn test_lex_bare_exclamation() {
        let mut lexer = Lexer::new("{{ !name }}");
        lexer.next().unwrap();

        assert!(lexer.next().is_err());
    }

    #[test]
    fn test_error_multiple_opening_tags() {
        let expect = vec![
            (Token::Raw, 0..6),
            (Token::BeginExpression, 6..8),
            (Token::Identifier, 9..13),
        ];

        let mut lexer = Lexer::new("hello {{ name {{ }}");
        for (token, range) in expect {
            assert_eq!(lexer.next(), Ok(Some((token, range.into()))))
        }

        assert!(lexer.next().is_err())
    }

    #[test]
    fn test_read_verbatim() -> Result<(), Error> {
        let source = "{% verbatim %}{{ name }}{% endverbatim %}after";
        let mut lexer = Lexer::new(source);
        // BeginBlock, verbatim keyword, EndBlock.
        lexer.next()?;
        let (_, open) = lexer.next()?.unwrap();
        lexer.next()?;

        let inner = lexer.read_verbatim(open)?;
        assert_eq!(inner.literal(source), "{{ name }}");
        assert_eq!(lexer.next()?, Some((Token::Raw, Region::new(41..46))));

        Ok(())
    }

    #[test]
    fn test_read_verbatim_unclosed() {
        let source = "{% verbatim %}{{ name }}";
        let mut lexer = Lexer::new(source);
        lexer.next().unwrap();
        let (_, open) = lexer.next().unwrap().unwrap();
        lexer.next().unwrap();

        assert!(lexer.read_verbatim(open).is_err());
    }

    /// Helper function which takes in a source string, creates a lexer on that
    /// string and iterates [expect.len()] amount of times and compares the result
    /// against [lexer.next()].
    fn helper_lex_next_auto<T>(source: &str, expect: Vec<(Token, T)>)
    where
        T: Into<Region>,
    {
        let mut lexer = Lexer::new(source);
        for (token, region) in expect {
            assert_eq!(lexer.next(), Ok(Some((token, region.into()))))
        }

        assert_eq!(lexer.next(), Ok(None));
        assert_eq!(lexer.next(), Ok(None));
        assert_eq!(lexer.next(), Ok(None));
    }
}
