//! Builds the abstract syntax tree from tokens pulled off of a Lexer.
//!
//! The parser is a recursive descent over expressions, paired with a
//! stack of open blocks that pairs every block tag with its end tag.
pub mod scope;
pub mod tree;

mod state;

use crate::{
    compile::{
        lex::{token::Token, Lexer},
        parse::{
            scope::Scope,
            state::BlockState,
            tree::{
                AutoescapeTree, Binary, Branch, DebugTree, Expression, FilterCall, ForTree,
                FunctionCall, Group, Identifier, IfTree, Key, KeyValue, Literal, LoopVariables,
                Negate, Output, Set, Tree, Variable,
            },
        },
        Keyword, Operator, Template, TokenResult,
    },
    log::{error_eof, expected_keyword, Error, INVALID_SYNTAX, UNEXPECTED_BLOCK, UNEXPECTED_TOKEN},
    region::Region,
};

use serde_json::{Number, Value};

pub struct Parser<'source> {
    /// Lexer used to pull from source as tokens instead of raw text.
    lexer: Lexer<'source>,
    /// Store peeked tokens.
    ///
    /// Double option is used to remember when the next token is None.
    buffer: Option<Option<(Token, Region)>>,
}

impl<'source> Parser<'source> {
    /// Create a new Parser from the given string.
    #[inline]
    pub fn new(source: &'source str) -> Self {
        Self {
            lexer: Lexer::new(source),
            buffer: None,
        }
    }

    /// Compile the source into a [`Template`].
    ///
    /// Returns a new `Template`, which can be rendered with some `Store`
    /// data to receive output.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the source is not valid, for example
    /// when a block is left unclosed.
    pub fn compile(mut self, name: Option<&str>) -> Result<Template, Error> {
        // One entry for every block that is open but not yet closed.
        let mut states: Vec<BlockState> = vec![];

        // Contains the distinct Tree instances within a specific area of
        // the source.
        //
        // Used to remember what belongs to the "if" branch and what belongs
        // to the "else" branch in an "if" block, for example.
        let mut scopes: Vec<Scope> = vec![Scope::new()];

        while let Some(next) = self.next()? {
            let tree = match next {
                (Token::Raw, region) => Some(Tree::Raw(region)),
                (Token::BeginExpression, region) => {
                    let expression = self.parse_expression()?;
                    let (_, close) = self.next_must(Token::EndExpression)?;

                    Some(Tree::Output(Output {
                        expression,
                        escape: true,
                        region: region.combine(close),
                    }))
                }
                (Token::BeginRaw, region) => {
                    let expression = self.parse_expression()?;
                    let (_, close) = self.next_must(Token::EndRaw)?;

                    Some(Tree::Output(Output {
                        expression,
                        escape: false,
                        region: region.combine(close),
                    }))
                }
                (Token::BeginBlock, region) => {
                    self.parse_block(region, &mut states, &mut scopes)?
                }
                (_, region) => {
                    return Err(Error::build(UNEXPECTED_TOKEN)
                        .with_pointer(self.lexer.source, region)
                        .with_help("expected raw text, an expression, or a block"))
                }
            };

            if let Some(tree) = tree {
                scopes
                    .last_mut()
                    .expect("parser must always have an open scope")
                    .data
                    .push(tree);
            }
        }

        if let Some(open) = states.first() {
            return Err(Error::build(INVALID_SYNTAX)
                .with_pointer(self.lexer.source, open.get_region())
                .with_help(format!(
                    "did you close the `{}` block with `{{% {} %}}`?",
                    open.name(),
                    open.close_name()
                )));
        }

        assert!(
            scopes.len() == 1,
            "parser must have exactly one scope after compilation"
        );

        Ok(Template {
            name: name.map(str::to_owned),
            scope: scopes.remove(0),
            source: self.lexer.source.to_owned(),
        })
    }

    /// Parse a block.
    ///
    /// Blocks that open a scope, such as "if" and "for", push onto the
    /// given state and scope stacks and return `None`. Their matching
    /// end tags pop those stacks and return the assembled [`Tree`].
    ///
    /// Standalone blocks such as "set" return a `Tree` immediately.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the block does not begin with a known
    /// keyword, or an end tag does not pair with the innermost open block.
    fn parse_block(
        &mut self,
        begin: Region,
        states: &mut Vec<BlockState>,
        scopes: &mut Vec<Scope>,
    ) -> Result<Option<Tree>, Error> {
        let (keyword, keyword_region) = self.parse_keyword()?;

        match keyword {
            Keyword::If => {
                let condition = self.parse_expression()?;
                let (_, close) = self.next_must(Token::EndBlock)?;
                states.push(BlockState::If {
                    condition: Some(condition),
                    branches: vec![],
                    has_else: false,
                    region: begin.combine(close),
                });
                scopes.push(Scope::new());

                Ok(None)
            }
            Keyword::ElseIf => {
                let next_condition = self.parse_expression()?;
                self.next_must(Token::EndBlock)?;
                if !matches!(
                    states.last(),
                    Some(BlockState::If {
                        has_else: false,
                        ..
                    })
                ) {
                    return Err(self.error_unexpected_block(keyword, keyword_region, states.last()));
                }

                let Some(BlockState::If {
                    condition, branches, ..
                }) = states.last_mut()
                else {
                    unreachable!()
                };
                let scope = scopes.pop().expect("elseif must close a scope");
                branches.push(Branch {
                    condition: condition.take().expect("open if must hold a condition"),
                    scope,
                });
                *condition = Some(next_condition);
                scopes.push(Scope::new());

                Ok(None)
            }
            Keyword::Else => {
                self.next_must(Token::EndBlock)?;
                let matched = match states.last_mut() {
                    Some(BlockState::If {
                        condition,
                        branches,
                        has_else,
                        ..
                    }) if !*has_else => {
                        let scope = scopes.pop().expect("else must close a scope");
                        branches.push(Branch {
                            condition: condition.take().expect("open if must hold a condition"),
                            scope,
                        });
                        *has_else = true;
                        true
                    }
                    Some(BlockState::For { body, .. }) if body.is_none() => {
                        *body = Some(scopes.pop().expect("else must close a scope"));
                        true
                    }
                    _ => false,
                };
                if !matched {
                    return Err(self.error_unexpected_block(keyword, keyword_region, states.last()));
                }
                scopes.push(Scope::new());

                Ok(None)
            }
            Keyword::EndIf => {
                let (_, close) = self.next_must(Token::EndBlock)?;
                match states.pop() {
                    Some(BlockState::If {
                        condition,
                        mut branches,
                        has_else,
                        region,
                    }) => {
                        let scope = scopes.pop().expect("endif must close a scope");
                        let else_branch = if has_else {
                            Some(scope)
                        } else {
                            branches.push(Branch {
                                condition: condition.expect("open if must hold a condition"),
                                scope,
                            });
                            None
                        };

                        Ok(Some(Tree::If(IfTree {
                            branches,
                            else_branch,
                            region: region.combine(close),
                        })))
                    }
                    other => {
                        Err(self.error_unexpected_block(keyword, keyword_region, other.as_ref()))
                    }
                }
            }
            Keyword::For => {
                let variables = self.parse_loop_variables()?;
                self.next_must(Token::Keyword(Keyword::In))?;
                let iterable = self.parse_expression()?;
                let (_, close) = self.next_must(Token::EndBlock)?;
                states.push(BlockState::For {
                    variables,
                    iterable,
                    body: None,
                    region: begin.combine(close),
                });
                scopes.push(Scope::new());

                Ok(None)
            }
            Keyword::EndFor => {
                let (_, close) = self.next_must(Token::EndBlock)?;
                match states.pop() {
                    Some(BlockState::For {
                        variables,
                        iterable,
                        body,
                        region,
                    }) => {
                        let popped = scopes.pop().expect("endfor must close a scope");
                        let (scope, else_branch) = match body {
                            Some(body) => (body, Some(popped)),
                            None => (popped, None),
                        };

                        Ok(Some(Tree::For(ForTree {
                            variables,
                            iterable,
                            scope,
                            else_branch,
                            region: region.combine(close),
                        })))
                    }
                    other => {
                        Err(self.error_unexpected_block(keyword, keyword_region, other.as_ref()))
                    }
                }
            }
            Keyword::Set => {
                let name = self.parse_ident()?;
                self.next_must(Token::Assign)?;
                let value = self.parse_expression()?;
                let (_, close) = self.next_must(Token::EndBlock)?;

                Ok(Some(Tree::Set(Set {
                    name,
                    value,
                    region: begin.combine(close),
                })))
            }
            Keyword::Debug => {
                let expression = if self.next_is(Token::EndBlock)? {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                let (_, close) = self.next_must(Token::EndBlock)?;

                Ok(Some(Tree::Debug(DebugTree {
                    expression,
                    region: begin.combine(close),
                })))
            }
            Keyword::Spaceless => {
                let (_, close) = self.next_must(Token::EndBlock)?;
                states.push(BlockState::Spaceless {
                    region: begin.combine(close),
                });
                scopes.push(Scope::new());

                Ok(None)
            }
            Keyword::EndSpaceless => {
                self.next_must(Token::EndBlock)?;
                match states.pop() {
                    Some(BlockState::Spaceless { .. }) => {
                        let scope = scopes.pop().expect("endspaceless must close a scope");

                        Ok(Some(Tree::Spaceless(scope)))
                    }
                    other => {
                        Err(self.error_unexpected_block(keyword, keyword_region, other.as_ref()))
                    }
                }
            }
            Keyword::Verbatim => {
                self.next_must(Token::EndBlock)?;
                debug_assert!(self.buffer.is_none(), "buffer must be empty before verbatim");
                let inner = self.lexer.read_verbatim(keyword_region)?;

                Ok(Some(Tree::Verbatim(inner)))
            }
            Keyword::EndVerbatim => Err(Error::build(UNEXPECTED_BLOCK)
                .with_pointer(self.lexer.source, keyword_region)
                .with_help("`endverbatim` has no matching `verbatim` block")),
            Keyword::Autoescape => {
                let mode = if self.next_is(Token::EndBlock)? {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                let (_, close) = self.next_must(Token::EndBlock)?;
                states.push(BlockState::Autoescape {
                    mode,
                    region: begin.combine(close),
                });
                scopes.push(Scope::new());

                Ok(None)
            }
            Keyword::EndAutoescape => {
                let (_, close) = self.next_must(Token::EndBlock)?;
                match states.pop() {
                    Some(BlockState::Autoescape { mode, region }) => {
                        let scope = scopes.pop().expect("endautoescape must close a scope");

                        Ok(Some(Tree::Autoescape(AutoescapeTree {
                            mode,
                            scope,
                            region: region.combine(close),
                        })))
                    }
                    other => {
                        Err(self.error_unexpected_block(keyword, keyword_region, other.as_ref()))
                    }
                }
            }
            Keyword::In | Keyword::Not | Keyword::And | Keyword::Or => {
                Err(Error::build(UNEXPECTED_BLOCK)
                    .with_pointer(self.lexer.source, keyword_region)
                    .with_help(expected_keyword(keyword)))
            }
        }
    }

    /// Parse an expression.
    ///
    /// Binding strength, from weakest to strongest:
    ///
    /// `or`, `and`, `not`, `==` `!=`, `<` `<=` `>` `>=`, `+` `-`,
    /// `*` `/`, `|` (filter), primary.
    pub(crate) fn parse_expression(&mut self) -> Result<Expression, Error> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_and()?;
        while self.next_is(Token::Keyword(Keyword::Or))? {
            self.next()?;
            let right = self.parse_and()?;
            let region = left.get_region().combine(right.get_region());
            left = Expression::Binary(Binary {
                left: Box::new(left),
                operator: Operator::Or,
                right: Box::new(right),
                region,
            });
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_not()?;
        while self.next_is(Token::Keyword(Keyword::And))? {
            self.next()?;
            let right = self.parse_not()?;
            let region = left.get_region().combine(right.get_region());
            left = Expression::Binary(Binary {
                left: Box::new(left),
                operator: Operator::And,
                right: Box::new(right),
                region,
            });
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, Error> {
        if self.next_is(Token::Keyword(Keyword::Not))? {
            let (_, region) = self.next_must(Token::Keyword(Keyword::Not))?;
            let operand = self.parse_not()?;
            let region = region.combine(operand.get_region());

            return Ok(Expression::Not(Negate {
                operand: Box::new(operand),
                region,
            }));
        }

        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_comparison()?;
        while let Some(operator) =
            self.peek_operator(&[Operator::Equal, Operator::NotEqual])?
        {
            self.next()?;
            let right = self.parse_comparison()?;
            let region = left.get_region().combine(right.get_region());
            left = Expression::Binary(Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                region,
            });
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_additive()?;
        while let Some(operator) = self.peek_operator(&[
            Operator::Greater,
            Operator::Lesser,
            Operator::GreaterOrEqual,
            Operator::LesserOrEqual,
        ])? {
            self.next()?;
            let right = self.parse_additive()?;
            let region = left.get_region().combine(right.get_region());
            left = Expression::Binary(Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                region,
            });
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_multiplicative()?;
        while let Some(operator) = self.peek_operator(&[Operator::Add, Operator::Subtract])? {
            self.next()?;
            let right = self.parse_multiplicative()?;
            let region = left.get_region().combine(right.get_region());
            left = Expression::Binary(Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                region,
            });
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_filter()?;
        while let Some(operator) = self.peek_operator(&[Operator::Multiply, Operator::Divide])? {
            self.next()?;
            let right = self.parse_filter()?;
            let region = left.get_region().combine(right.get_region());
            left = Expression::Binary(Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                region,
            });
        }

        Ok(left)
    }

    /// Parse a chain of filter calls.
    ///
    /// The pipe `|` marks the following identifier as a filter name,
    /// and the chain is applied left to right:
    ///
    /// `{{ name | trim | slice(0, 3) }}`
    fn parse_filter(&mut self) -> Result<Expression, Error> {
        let mut expression = self.parse_primary()?;
        while self.next_is(Token::Pipe)? {
            self.next_must(Token::Pipe)?;
            let name = self.parse_ident()?;
            let (arguments, end) = if self.next_is(Token::LeftParen)? {
                self.parse_arguments()?
            } else {
                (vec![], name.region)
            };
            let region = expression.get_region().combine(end);
            expression = Expression::Filter(FilterCall {
                name,
                receiver: Box::new(expression),
                arguments,
                region,
            });
        }

        Ok(expression)
    }

    /// Parse the innermost piece of an expression.
    ///
    /// A primary may be a literal, a variable path such as `person.name`,
    /// a function call, or a parenthesized expression.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the next tokens do not form a primary.
    fn parse_primary(&mut self) -> Result<Expression, Error> {
        match self.next_any_must()? {
            (Token::True, region) => Ok(Expression::Literal(Literal {
                value: Value::Bool(true),
                region,
            })),
            (Token::False, region) => Ok(Expression::Literal(Literal {
                value: Value::Bool(false),
                region,
            })),
            (Token::Number, region) => {
                let literal =
                    self.parse_number_literal(region.literal(self.lexer.source), region)?;

                Ok(Expression::Literal(literal))
            }
            (Token::String, region) => Ok(Expression::Literal(self.parse_string_literal(region)?)),
            (Token::Operator(Operator::Add | Operator::Subtract), region) => {
                let (_, next_region) = self.next_must(Token::Number)?;

                // -1000 | +1000  <- valid, negative/positive numbers
                // - 1000 | + 1000 <- invalid
                if !region.is_neighbor(next_region) {
                    return Err(Error::build(UNEXPECTED_TOKEN)
                        .with_pointer(self.lexer.source, region)
                        .with_help(format!(
                            "to mark `{}` as a positive or negative number, \
                            remove the separating whitespace",
                            next_region.literal(self.lexer.source)
                        )));
                }

                let merge = region.combine(next_region);
                // Number accepts a leading `-` but not a `+`.
                let window = merge.literal(self.lexer.source);
                let window = window.strip_prefix('+').unwrap_or(window);
                let literal = self.parse_number_literal(window, merge)?;

                Ok(Expression::Literal(literal))
            }
            (Token::Identifier, region) => {
                if self.next_is(Token::LeftParen)? {
                    let name = Identifier { region };
                    let (arguments, end) = self.parse_arguments()?;

                    return Ok(Expression::Function(FunctionCall {
                        name,
                        arguments,
                        region: region.combine(end),
                    }));
                }

                let mut path = vec![Key::from(Identifier { region })];

                // Keep chaining keys as long as we see a period.
                while self.next_is(Token::Period)? {
                    self.next_must(Token::Period)?;
                    path.push(self.parse_key()?);
                }

                Ok(Expression::Variable(Variable { path }))
            }
            (Token::LeftParen, open) => {
                let inner = self.parse_expression()?;
                let (_, close) = self.next_must(Token::RightParen)?;

                Ok(Expression::Group(Group {
                    inner: Box::new(inner),
                    region: open.combine(close),
                }))
            }
            (_, region) => Err(Error::build(UNEXPECTED_TOKEN)
                .with_pointer(self.lexer.source, region)
                .with_help(
                    "expected a literal, variable, function call, or parenthesized expression",
                )),
        }
    }

    /// Parse a parenthesized, comma separated list of expressions.
    ///
    /// Returns the expressions and a [`Region`] spanning both parentheses.
    fn parse_arguments(&mut self) -> Result<(Vec<Expression>, Region), Error> {
        let (_, open) = self.next_must(Token::LeftParen)?;
        let mut arguments = vec![];
        if !self.next_is(Token::RightParen)? {
            loop {
                arguments.push(self.parse_expression()?);
                if self.next_is(Token::Comma)? {
                    self.next_must(Token::Comma)?;
                    continue;
                }
                break;
            }
        }
        let (_, close) = self.next_must(Token::RightParen)?;

        Ok((arguments, open.combine(close)))
    }

    /// Parse the bindings of a "for" block.
    ///
    /// Both the `item` and `key, item` forms are recognized.
    fn parse_loop_variables(&mut self) -> Result<LoopVariables, Error> {
        let first = self.parse_ident()?;
        if !self.next_is(Token::Comma)? {
            return Ok(LoopVariables::Item(first));
        }
        self.next_must(Token::Comma)?;
        let second = self.parse_ident()?;
        let region = first.region.combine(second.region);

        Ok(LoopVariables::KeyValue(KeyValue {
            key: first,
            value: second,
            region,
        }))
    }

    /// Parse a Keyword.
    ///
    /// # Errors
    ///
    /// Returns an error if the next token is not a Keyword.
    fn parse_keyword(&mut self) -> Result<(Keyword, Region), Error> {
        match self.next_any_must()? {
            (Token::Keyword(keyword), region) => Ok((keyword, region)),
            (token, region) => Err(Error::build(UNEXPECTED_TOKEN)
                .with_pointer(self.lexer.source, region)
                .with_help(expected_keyword(token))),
        }
    }

    /// Parse an Identifier.
    ///
    /// # Errors
    ///
    /// Propagates an error from next_must if the next token is not an
    /// Identifier.
    fn parse_ident(&mut self) -> Result<Identifier, Error> {
        let (_, region) = self.next_must(Token::Identifier)?;

        Ok(Identifier { region })
    }

    /// Parse a Key.
    ///
    /// # Errors
    ///
    /// Returns an error if the next token is not a valid Identifier
    /// such as "one.two".
    fn parse_key(&mut self) -> Result<Key, Error> {
        match self.next_any_must()? {
            (Token::Identifier, region) => Ok(Key::from(Identifier { region })),
            (_, region) => Err(Error::build(UNEXPECTED_TOKEN)
                .with_pointer(self.lexer.source, region)
                .with_help("expected an unquoted identifier such as `one.two`")),
        }
    }

    /// Parse a Literal containing a Value::String from the literal value
    /// of the given Region.
    ///
    /// # Errors
    ///
    /// Returns an error if an unrecognized escape character is found.
    fn parse_string_literal(&self, region: Region) -> Result<Literal, Error> {
        let value = Value::String(self.parse_string(region)?);

        Ok(Literal { value, region })
    }

    /// Parse a String from the literal value of the given Region.
    ///
    /// # Errors
    ///
    /// Returns an error if an unrecognized escape character is found.
    fn parse_string(&self, region: Region) -> Result<String, Error> {
        let window = region.literal(self.lexer.source);

        let string = if window.contains('\\') {
            let mut iter = window.char_indices().map(|(i, c)| (region.begin + i, c));
            let mut string = String::new();

            while let Some((_, c)) = iter.next() {
                match c {
                    '"' => continue,
                    '\\' => {
                        let Some((_, esc)) = iter.next() else {
                            return Err(Error::build("unexpected escape character")
                                .with_pointer(self.lexer.source, region));
                        };
                        let c = match esc {
                            'n' => '\n',
                            'r' => '\r',
                            't' => '\t',
                            '\\' => '\\',
                            '"' => '"',
                            _ => {
                                return Err(Error::build("unexpected escape character")
                                    .with_pointer(self.lexer.source, region))
                            }
                        };
                        string.push(c);
                    }
                    c => string.push(c),
                }
            }
            string
        } else {
            window[1..window.len() - 1].to_owned()
        };

        Ok(string)
    }

    /// Parse a Literal containing a Value::Number from the given Region.
    ///
    /// # Errors
    ///
    /// Returns an error if the literal value of the Region cannot be
    /// converted to a Value::Number.
    fn parse_number_literal(&self, window: &str, region: Region) -> Result<Literal, Error> {
        let as_number: Number = window.parse().map_err(|_| {
            Error::build("unrecognizable number")
                .with_pointer(self.lexer.source, region)
                .with_help(format!(
                    "numbers may begin with `{}` to indicate a negative \
                    number and must not end with a decimal",
                    Operator::Subtract
                ))
        })?;

        Ok(Literal {
            value: Value::Number(as_number),
            region,
        })
    }

    /// Return an [`Error`] explaining that the given tag does not pair
    /// with the innermost open block.
    fn error_unexpected_block(
        &self,
        found: Keyword,
        region: Region,
        open: Option<&BlockState>,
    ) -> Error {
        let error = Error::build(UNEXPECTED_BLOCK).with_pointer(self.lexer.source, region);

        match open {
            Some(open) => error.with_help(format!(
                "expected `{{% {} %}}` to close the open `{}` block, found `{}`",
                open.close_name(),
                open.name(),
                found
            )),
            None => error.with_help(format!("`{found}` has no matching open block")),
        }
    }

    /// Peek the next token.
    ///
    /// # Errors
    ///
    /// Propagates any error reported by the underlying Lexer.
    fn peek(&mut self) -> TokenResult {
        if let o @ None = &mut self.buffer {
            *o = Some(self.lexer.next()?);
        }

        Ok(self.buffer.unwrap())
    }

    /// Get the next token.
    ///
    /// Prefers to pull a token from the internal buffer first, but will
    /// pull from the lexer when the buffer is empty.
    fn next(&mut self) -> TokenResult {
        match self.buffer.take() {
            Some(t) => Ok(t),
            None => self.lexer.next(),
        }
    }

    /// Returns true if the given token matches the upcoming token.
    ///
    /// # Errors
    ///
    /// Propagates any errors reported by the underlying lexer.
    fn next_is(&mut self, expect: Token) -> Result<bool, Error> {
        Ok(self
            .peek()?
            .map(|(token, _)| token == expect)
            .unwrap_or(false))
    }

    /// Return the upcoming [`Operator`] when it is one of the given
    /// choices, without consuming it.
    ///
    /// # Errors
    ///
    /// Propagates any errors reported by the underlying lexer.
    fn peek_operator(&mut self, choices: &[Operator]) -> Result<Option<Operator>, Error> {
        match self.peek()? {
            Some((Token::Operator(operator), _)) if choices.contains(&operator) => {
                Ok(Some(operator))
            }
            _ => Ok(None),
        }
    }

    /// Get the next token, and compare it to the given token.
    ///
    /// # Errors
    ///
    /// An error is returned if the next token does not match the given
    /// token, or when no tokens are left.
    fn next_must(&mut self, expect: Token) -> Result<(Token, Region), Error> {
        match self.next()? {
            Some((token, region)) => {
                if token == expect {
                    Ok((token, region))
                } else {
                    Err(Error::build(UNEXPECTED_TOKEN)
                        .with_pointer(self.lexer.source, region)
                        .with_help(format!("expected {expect}, found {token}")))
                }
            }
            None => Err(error_eof(self.lexer.source).with_help(format!("expected {expect}"))),
        }
    }

    /// Get the next token.
    ///
    /// Similar to `next`, but requires that a token is returned.
    ///
    /// # Errors
    ///
    /// An error is returned if no more tokens are left.
    fn next_any_must(&mut self) -> Result<(Token, Region), Error> {
        match self.next()? {
            Some((token, region)) => Ok((token, region)),
            None => Err(error_eof(self.lexer.source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Parser;
    use crate::compile::{
        lex::token::Token,
        parse::tree::{Expression, LoopVariables, Tree},
        Operator,
    };

    #[test]
    fn test_parser_lexer_integration() {
        let mut parser = Parser::new("hello");

        assert_eq!(parser.next(), Ok(Some((Token::Raw, (0..5).into()))));
        assert_eq!(parser.next(), Ok(None));
    }

    #[test]
    fn test_peek_multiple() {
        let mut parser = Parser::new("{{ one two");

        assert!(parser.next().is_ok());
        assert_eq!(parser.peek(), Ok(Some((Token::Identifier, (3..6).into()))));
        assert_eq!(parser.peek(), Ok(Some((Token::Identifier, (3..6).into()))));
        assert_eq!(parser.peek(), Ok(Some((Token::Identifier, (3..6).into()))));
    }

    #[test]
    fn test_parse_output() {
        let template = Parser::new("hello, {{ name }}").compile(None).unwrap();

        assert_eq!(template.scope.data.len(), 2);
        assert!(matches!(
            &template.scope.data[1],
            Tree::Output(output) if output.escape
        ));
    }

    #[test]
    fn test_parse_raw_output() {
        let template = Parser::new("{! markup !}").compile(None).unwrap();

        assert!(matches!(
            &template.scope.data[0],
            Tree::Output(output) if !output.escape
        ));
    }

    #[test]
    fn test_parse_filter_chain() {
        let template = Parser::new("{{ name | trim | slice(0, 3) }}")
            .compile(None)
            .unwrap();

        let Tree::Output(output) = &template.scope.data[0] else {
            panic!("expected output");
        };
        let Expression::Filter(slice) = &output.expression else {
            panic!("expected filter call");
        };

        assert_eq!(slice.arguments.len(), 2);
        assert!(matches!(*slice.receiver, Expression::Filter(_)));
    }

    #[test]
    fn test_parse_precedence() {
        let template = Parser::new("{{ 1 + 2 * 3 }}").compile(None).unwrap();

        let Tree::Output(output) = &template.scope.data[0] else {
            panic!("expected output");
        };
        let Expression::Binary(add) = &output.expression else {
            panic!("expected binary expression");
        };

        assert_eq!(add.operator, Operator::Add);
        assert!(matches!(
            &*add.right,
            Expression::Binary(multiply) if multiply.operator == Operator::Multiply
        ));
    }

    #[test]
    fn test_parse_if_branches() {
        let source = "{% if one %}a{% elseif two %}b{% else %}c{% endif %}";
        let template = Parser::new(source).compile(None).unwrap();

        let Tree::If(tree) = &template.scope.data[0] else {
            panic!("expected if");
        };

        assert_eq!(tree.branches.len(), 2);
        assert!(tree.else_branch.is_some());
    }

    #[test]
    fn test_parse_for_key_value() {
        let source = "{% for key, value in pairs %}{{ key }}{% endfor %}";
        let template = Parser::new(source).compile(None).unwrap();

        let Tree::For(tree) = &template.scope.data[0] else {
            panic!("expected for");
        };

        assert!(matches!(tree.variables, LoopVariables::KeyValue(_)));
        assert!(tree.else_branch.is_none());
    }

    #[test]
    fn test_parse_for_else() {
        let source = "{% for item in list %}{{ item }}{% else %}empty{% endfor %}";
        let template = Parser::new(source).compile(None).unwrap();

        let Tree::For(tree) = &template.scope.data[0] else {
            panic!("expected for");
        };

        assert!(tree.else_branch.is_some());
    }

    #[test]
    fn test_parse_verbatim() {
        let source = "{% verbatim %}{{ x }}{% endverbatim %}";
        let template = Parser::new(source).compile(None).unwrap();

        let Tree::Verbatim(region) = &template.scope.data[0] else {
            panic!("expected verbatim");
        };

        assert_eq!(region.literal(source), "{{ x }}");
    }

    #[test]
    fn test_parse_stray_end_marker() {
        let source = "a }} b";
        let template = Parser::new(source).compile(None).unwrap();

        assert_eq!(template.scope.data.len(), 1);
        assert!(matches!(
            &template.scope.data[0],
            Tree::Raw(region) if region.literal(source) == source
        ));
    }

    #[test]
    fn test_parse_unclosed_expression() {
        assert!(Parser::new("{{ name").compile(None).is_err());
    }

    #[test]
    fn test_parse_unclosed_block() {
        assert!(Parser::new("{% if name %}hello").compile(None).is_err());
    }

    #[test]
    fn test_parse_mismatched_end() {
        assert!(Parser::new("{% if name %}hello{% endfor %}")
            .compile(None)
            .is_err());
    }

    #[test]
    fn test_parse_dangling_else() {
        assert!(Parser::new("{% else %}").compile(None).is_err());
    }

    #[test]
    fn test_parse_negative_number_whitespace() {
        assert!(Parser::new("balance: {{ - 1000 }}").compile(None).is_err());
    }
}
