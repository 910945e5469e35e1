use std::rc::Rc;

use crate::{
    common::{
        operator::{BinaryOp, Prec, UnaryOp},
        source::Source,
        span::{Span, Spanned},
    },
    compiler::{
        ast::{Node, NodeId, AST},
        lex::Tokens,
        syntax::{Note, Syntax},
        token::Token,
    },
};

/// A recursive descent parser that builds an [`AST`] arena.
/// Binary expressions are parsed by precedence climbing over [`Prec`].
#[derive(Debug)]
pub struct Parser {
    source: Rc<Source>,
    tokens: Tokens,
    index:  usize,
    ast:    AST,
}

impl Parser {
    /// Parses a token stream into a syntax tree.
    /// The whole file is one expression list,
    /// whose handle is returned alongside the arena.
    pub fn parse(source: Rc<Source>, tokens: Tokens) -> Result<(AST, NodeId), Syntax> {
        let mut parser = Parser {
            source,
            tokens,
            index: 0,
            ast: AST::new(),
        };

        let mut expressions = vec![];
        loop {
            parser.skip_seps();
            if parser.peek().is_none() { break; }
            expressions.push(parser.statement()?);
        }

        let span = Span::new(&parser.source, 0, parser.source.contents.len());
        let root = parser.ast.push(Node::ExprList(expressions), span);
        Ok((parser.ast, root))
    }

    // Token helpers

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|t| &t.item)
    }

    fn skip_seps(&mut self) {
        while let Some(Token::Sep) = self.peek() {
            self.index += 1;
        }
    }

    fn end_of_input(&self) -> Syntax {
        let span = match self.tokens.last() {
            Some(last) => Span::point(&self.source, last.span.end()),
            None => Span::point(&self.source, 0),
        };
        Syntax::error("Unexpected end of input", &span)
    }

    fn advance(&mut self) -> Result<Spanned<Token>, Syntax> {
        let token = self.tokens.get(self.index)
            .cloned()
            .ok_or_else(|| self.end_of_input())?;
        self.index += 1;
        Ok(token)
    }

    /// Consumes a specific token, or fails with `reason`.
    fn consume(&mut self, expected: Token, reason: &str) -> Result<Span, Syntax> {
        let token = self.advance()?;
        if token.item == expected {
            Ok(token.span)
        } else {
            Err(Syntax::error_with_note(
                reason,
                Note::new_with_hint(&format!("found {} instead", token.item), &token.span),
            ))
        }
    }

    fn push(&mut self, node: Node, span: Span) -> NodeId {
        self.ast.push(node, span)
    }

    fn combine(&self, a: NodeId, b: NodeId) -> Span {
        Span::combine(self.ast.span(a), self.ast.span(b))
    }

    // Expressions

    /// An expression, and the separator ending it if there is one.
    fn statement(&mut self) -> Result<NodeId, Syntax> {
        let expression = self.expression()?;
        if let Some(Token::Sep) = self.peek() {
            self.index += 1;
        }
        Ok(expression)
    }

    /// An atom, optionally followed by binary operators and a match.
    fn expression(&mut self) -> Result<NodeId, Syntax> {
        let atom = self.atom()?;

        match self.peek() {
            None
            | Some(Token::Sep)
            | Some(Token::ParenRight)
            | Some(Token::BracketRight)
            | Some(Token::BraceRight)
            | Some(Token::Colon)
            | Some(Token::CaseArrow) => Ok(atom),
            Some(Token::Op(_)) => {
                let binary = self.binary(atom, Prec::None)?;
                match self.peek() {
                    Some(Token::MatchColon) => self.match_body(binary),
                    _ => Ok(binary),
                }
            },
            Some(Token::MatchColon) => self.match_body(atom),
            Some(_) => {
                let token = &self.tokens[self.index];
                Err(Syntax::error(
                    &format!("Unexpected {} following an expression", token.item),
                    &token.span,
                ))
            },
        }
    }

    fn peek_op(&self) -> Option<BinaryOp> {
        match self.peek() {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    /// Precedence climbing.
    /// `:=` associates right, everything else associates left.
    fn binary(&mut self, mut left: NodeId, min: Prec) -> Result<NodeId, Syntax> {
        while let Some(op) = self.peek_op() {
            let prec = op.prec();
            if prec < min { break; }
            self.index += 1;

            let mut right = self.atom()?;
            while let Some(next) = self.peek_op() {
                let tighter = next.prec() > prec;
                let right_assoc = next == BinaryOp::Define && prec == Prec::Define;
                if !(tighter || right_assoc) { break; }
                right = self.binary(right, if tighter { prec.right() } else { prec })?;
            }

            let span = self.combine(left, right);
            left = self.push(Node::Binary(op, left, right), span);
        }

        Ok(left)
    }

    fn match_body(&mut self, cond: NodeId) -> Result<NodeId, Syntax> {
        self.consume(Token::MatchColon, "Expected `::` to begin a match")?;
        self.consume(Token::BraceLeft, "Expected `{` to open the clauses of a match")?;

        let mut clauses = vec![];
        let end = loop {
            self.skip_seps();
            if let Some(Token::BraceRight) = self.peek() {
                break self.advance()?.span;
            }
            let target = self.expression()?;
            self.consume(Token::CaseArrow, "Expected `->` after the target of a match clause")?;
            let result = self.statement()?;
            clauses.push((target, result));
        };

        let span = Span::combine(self.ast.span(cond), &end);
        Ok(self.push(Node::Match { cond, clauses }, span))
    }

    /// Parses expressions up to a closing delimiter,
    /// returning them and the span of the delimiter.
    fn group(&mut self, close: Token) -> Result<(Vec<NodeId>, Span), Syntax> {
        let mut expressions = vec![];
        loop {
            self.skip_seps();
            let closed = match self.peek() {
                None => return Err(self.end_of_input()),
                Some(t) => *t == close,
            };

            if closed {
                return Ok((expressions, self.advance()?.span));
            }
            expressions.push(self.statement()?);
        }
    }

    // Atoms

    fn atom(&mut self) -> Result<NodeId, Syntax> {
        let token = self.advance()?;
        let start = token.span.clone();

        let mut node = match token.item {
            Token::Negate => {
                let operand = self.atom()?;
                let span = Span::combine(&start, self.ast.span(operand));
                return Ok(self.push(Node::Unary(UnaryOp::Negate, operand), span));
            },
            Token::Number(n)  => self.push(Node::Number(n), start),
            Token::String(s)  => self.push(Node::String(s), start),
            Token::Boolean(b) => self.push(Node::Boolean(b), start),

            Token::Iden(name) => {
                let param = self.push(Node::Iden(name), start.clone());
                if let Some(Token::Arrow) = self.peek() {
                    return self.function(vec![param], start);
                }
                param
            },
            Token::Empty => {
                let param = self.push(Node::Empty, start.clone());
                if let Some(Token::Arrow) = self.peek() {
                    return self.function(vec![param], start);
                }
                param
            },

            Token::ParenLeft => {
                let (expressions, end) = self.group(Token::ParenRight)?;
                if let Some(Token::Arrow) = self.peek() {
                    self.params(&expressions)?;
                    return self.function(expressions, start);
                }
                self.push(Node::ExprList(expressions), Span::combine(&start, &end))
            },
            Token::BracketLeft => {
                let (items, end) = self.group(Token::BracketRight)?;
                self.push(Node::List(items), Span::combine(&start, &end))
            },
            Token::BraceLeft => self.composite(start)?,

            other => return Err(Syntax::error(
                &format!("Expected an expression, found {}", other),
                &start,
            )),
        };

        // calls and accessors chain onto the atom
        loop {
            match self.peek() {
                Some(Token::ParenLeft) => {
                    self.index += 1;
                    let (args, end) = self.group(Token::ParenRight)?;
                    let span = Span::combine(self.ast.span(node), &end);
                    node = self.push(Node::Call { callee: node, args }, span);
                },
                Some(Token::Dot) => {
                    self.index += 1;
                    let key = self.key()?;
                    let span = self.combine(node, key);
                    node = self.push(Node::Binary(BinaryOp::Access, node, key), span);
                },
                _ => return Ok(node),
            }
        }
    }

    /// The right side of an accessor: a bare atom, with no calls of its own.
    fn key(&mut self) -> Result<NodeId, Syntax> {
        let token = self.advance()?;
        match token.item {
            Token::Iden(name) => Ok(self.push(Node::Iden(name), token.span)),
            Token::Number(n)  => Ok(self.push(Node::Number(n), token.span)),
            Token::String(s)  => Ok(self.push(Node::String(s), token.span)),
            Token::ParenLeft => {
                let (expressions, end) = self.group(Token::ParenRight)?;
                Ok(self.push(Node::ExprList(expressions), Span::combine(&token.span, &end)))
            },
            other => Err(Syntax::error_with_note(
                &format!("Expected a key after `.`, found {}", other),
                Note::new_with_hint(
                    "keys are names, numbers, strings, or parenthesized expressions",
                    &token.span,
                ),
            )),
        }
    }

    fn params(&self, params: &[NodeId]) -> Result<(), Syntax> {
        for param in params {
            match self.ast.node(*param) {
                Node::Iden(_) | Node::Empty => (),
                _ => return Err(Syntax::error(
                    "Function parameters must be identifiers or `_`",
                    self.ast.span(*param),
                )),
            }
        }
        Ok(())
    }

    /// Expects the `=>` to be next.
    fn function(&mut self, params: Vec<NodeId>, start: Span) -> Result<NodeId, Syntax> {
        self.consume(Token::Arrow, "Expected `=>` after function parameters")?;
        let body = self.expression()?;
        let span = Span::combine(&start, self.ast.span(body));
        Ok(self.push(Node::Function { params, body }, span))
    }

    /// Expects the opening brace to have been consumed.
    fn composite(&mut self, start: Span) -> Result<NodeId, Syntax> {
        let mut entries = vec![];
        let end = loop {
            self.skip_seps();
            if let Some(Token::BraceRight) = self.peek() {
                break self.advance()?.span;
            }

            let key = self.statement()?;
            if let Some(Token::Colon) = self.peek() {
                self.index += 1;
                let value = self.statement()?;
                entries.push((key, value));
                continue;
            }

            // `{a}` is short for `{a: a}`
            match self.ast.node(key).clone() {
                Node::Iden(name) => {
                    let span = self.ast.span(key).clone();
                    let value = self.push(Node::Iden(name), span);
                    entries.push((key, value));
                },
                _ => return Err(Syntax::error_with_note(
                    "Expected `:` after a composite key",
                    Note::new_with_hint(
                        "only a bare name can stand for both key and value",
                        self.ast.span(key),
                    ),
                )),
            }
        };

        Ok(self.push(Node::Composite(entries), Span::combine(&start, &end)))
    }
}
