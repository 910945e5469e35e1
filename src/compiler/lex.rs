use std::{
    rc::Rc,
    str::{Chars, FromStr},
};

use crate::common::{
    operator::BinaryOp,
    source::Source,
    span::{Span, Spanned},
};

use crate::compiler::{
    syntax::{Note, Syntax},
    token::Token,
};

pub type Tokens = Vec<Spanned<Token>>;

fn is_iden_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '?' || c == '!'
}

fn is_iden(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '?' || c == '!'
}

#[derive(Debug)]
pub struct Lexer {
    source: Rc<Source>,
    index:  usize,
    tokens: Tokens,
}

impl Lexer {
    /// Lexes a source file into a stream of tokens.
    /// Separators are inserted wherever a line break
    /// or closing delimiter could end an expression.
    pub fn lex(source: Rc<Source>) -> Result<Tokens, Syntax> {
        // build a base lexer for this file
        let mut lexer = Lexer {
            source,
            index: 0,
            tokens: vec![],
        };

        // prime the lexer
        lexer.strip()?;

        // consume!
        while lexer.index < lexer.source.contents.len() {
            lexer.next_token()?;
            // Strip whitespace, but not newlines, and comments
            lexer.strip()?;
        }

        // the last expression in a file needs ending, too
        lexer.ensure_sep();

        // phew, nothing broke. Your tokens, sir!
        Ok(lexer.tokens)
    }

    /// Selects a range of a string of length `len` from the current index position.
    fn grab_from_index(&self, len: usize) -> &str {
        &self.source.contents[self.index..self.index + len]
    }

    /// Returns all characters after the current index position.
    fn remaining(&self) -> Chars {
        self.source.contents[self.index..].chars()
    }

    /// Byte length of the run of characters matching `pred`,
    /// starting `offset` bytes past the current index.
    fn take_while(&self, offset: usize, pred: impl Fn(char) -> bool) -> usize {
        self.source.contents[self.index + offset..]
            .chars()
            .take_while(|c| pred(*c))
            .map(char::len_utf8)
            .sum()
    }

    fn strip(&mut self) -> Result<(), Syntax> {
        loop {
            let old_index = self.index;

            // strip whitespace, but don't strip newlines!
            self.index += self.take_while(0, |c| c.is_whitespace() && c != '\n');

            match self.remaining().next() {
                // line comment, eaten up to (not including) the newline
                Some('#') => self.index += self.take_while(0, |c| c != '\n'),
                // block comment, between backticks
                Some('`') => {
                    let len = self.source.contents[self.index + 1..]
                        .find('`')
                        .ok_or_else(|| Syntax::error(
                            "Unexpected end of input while parsing block comment",
                            &Span::new(&self.source, self.index, 1),
                        ))?;
                    self.index += len + 2;
                },
                _ => (),
            }

            // If nothing was stripped, we're done
            if old_index == self.index { return Ok(()); }
        }
    }

    fn push(&mut self, token: Token, offset: usize, len: usize) {
        self.tokens.push(Spanned::new(token, Span::new(&self.source, offset, len)));
    }

    /// Inserts a separator, unless the previous token can't end an expression.
    fn ensure_sep(&mut self) {
        let ends = self.tokens.last()
            .map_or(false, |t| t.item.ends_expression());

        if ends {
            self.push(Token::Sep, self.index, 0);
        }
    }

    fn string(&self) -> Result<(Token, usize), Syntax> {
        // expects opening quote to have been parsed
        let mut len    = 1;
        let mut escape = false;
        let mut string = String::new();

        for c in self.remaining().skip(1) {
            let bytes = c.len_utf8();
            len += bytes;
            if escape {
                escape = false;
                string.push(match c {
                    '\\' => '\\',
                    '\'' => '\'',
                    'n'  => '\n',
                    'r'  => '\r',
                    't'  => '\t',
                    o    => return Err(
                        Syntax::error_with_note(
                            &format!("Unknown escape code `\\{}` in string literal", o),
                            Note::new_with_hint(
                                "To include a single backslash `\\`, escape it first: `\\\\`",
                                &Span::new(&self.source, self.index + len - bytes - 1, 1 + bytes),
                            ),
                        )
                    ),
                })
            } else {
                match c {
                    '\\' => escape = true,
                    '\'' => return Ok((Token::String(string), len)),
                    c    => string.push(c),
                }
            }
        }

        Err(Syntax::error(
            "Unexpected end of input while parsing string literal",
            &Span::point(&self.source, self.index + len),
        ))
    }

    /// Numbers are digits, optionally followed by a `.` and more digits.
    /// A dot not followed by a digit is an accessor.
    fn number(&self) -> Result<(Token, usize), Syntax> {
        let mut len = self.take_while(0, |c| c.is_ascii_digit());

        let mut after = self.source.contents[self.index + len..].chars();
        if let (Some('.'), Some(d)) = (after.next(), after.next()) {
            if d.is_ascii_digit() {
                len += 1 + self.take_while(len + 1, |c| c.is_ascii_digit());
            }
        }

        // `12abc` is neither a number nor an identifier
        let trailing = self.take_while(len, is_iden);
        if trailing > 0 {
            return Err(Syntax::error_with_note(
                &format!("Malformed number literal `{}`", self.grab_from_index(len + trailing)),
                Note::new_with_hint(
                    "Identifiers can't start with a digit",
                    &Span::new(&self.source, self.index, len + trailing),
                ),
            ));
        }

        let number = f64::from_str(self.grab_from_index(len))
            .map_err(|_| Syntax::error(
                "Number literal does not fit in a 64-bit floating-point number",
                &Span::new(&self.source, self.index, len),
            ))?;

        Ok((Token::Number(number), len))
    }

    fn iden(&self) -> (Token, usize) {
        let len = self.take_while(0, is_iden);
        let token = match self.grab_from_index(len) {
            "_"     => Token::Empty,
            "true"  => Token::Boolean(true),
            "false" => Token::Boolean(false),
            name    => Token::Iden(name.to_string()),
        };
        (token, len)
    }

    /// Parses the next token.
    /// Expects all whitespace and comments to be stripped.
    fn next_token(&mut self) -> Result<(), Syntax> {
        let mut remaining = self.remaining();
        let (c, next) = match remaining.next() {
            Some(c) => (c, remaining.next()),
            None => return Ok(()),
        };

        let (token, len) = match (c, next) {
            // line breaks may end an expression, but aren't tokens themselves
            ('\n', _) => {
                self.ensure_sep();
                self.index += 1;
                return Ok(());
            },
            (',', _) => (Token::Sep, 1),

            // Grouping
            ('(', _) => (Token::ParenLeft, 1),
            ('[', _) => (Token::BracketLeft, 1),
            ('{', _) => (Token::BraceLeft, 1),
            (')', _) => { self.ensure_sep(); (Token::ParenRight, 1) },
            (']', _) => { self.ensure_sep(); (Token::BracketRight, 1) },
            ('}', _) => { self.ensure_sep(); (Token::BraceRight, 1) },

            // Op
            ('~', _) => (Token::Negate, 1),
            ('+', _) => (Token::Op(BinaryOp::Add), 1),
            ('*', _) => (Token::Op(BinaryOp::Mul), 1),
            ('/', _) => (Token::Op(BinaryOp::Div), 1),
            ('%', _) => (Token::Op(BinaryOp::Mod), 1),
            ('&', _) => (Token::Op(BinaryOp::And), 1),
            ('|', _) => (Token::Op(BinaryOp::Or), 1),
            ('^', _) => (Token::Op(BinaryOp::Xor), 1),
            ('<', _) => (Token::Op(BinaryOp::Less), 1),
            ('>', _) => (Token::Op(BinaryOp::Greater), 1),
            ('.', _) => (Token::Dot, 1),
            (':', Some('=')) => (Token::Op(BinaryOp::Define), 2),
            (':', Some(':')) => (Token::MatchColon, 2),
            // keys are expressions, so they need ending before the colon
            (':', _) => { self.ensure_sep(); (Token::Colon, 1) },
            ('=', Some('>')) => (Token::Arrow, 2),
            ('=', _) => (Token::Op(BinaryOp::Equal), 1),
            ('-', Some('>')) => (Token::CaseArrow, 2),
            ('-', _) => (Token::Op(BinaryOp::Sub), 1),

            // Literals
            ('\'', _) => self.string()?,
            (c, _) if c.is_ascii_digit() => self.number()?,
            (c, _) if is_iden_start(c) => self.iden(),

            // Unrecognized char
            (unknown, _) => return Err(Syntax::error(
                &format!(
                    "Hmm... The character `{}` is not recognized - check for encoding issues or typos",
                    unknown,
                ),
                &Span::new(&self.source, self.index, unknown.len_utf8()),
            )),
        };

        self.push(token, self.index, len);
        self.index += len;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn items(source: &str) -> Vec<Token> {
        Lexer::lex(Source::source(source))
            .unwrap()
            .into_iter()
            .map(|t| t.item)
            .collect()
    }

    fn iden(name: &str) -> Token {
        Token::Iden(name.to_string())
    }

    #[test]
    fn new_empty() {
        assert_eq!(items(""), vec![]);
        assert_eq!(items("  # just a comment"), vec![]);
    }

    #[test]
    fn newline_separates() {
        assert_eq!(
            items("a := 1\nb"),
            vec![
                iden("a"),
                Token::Op(BinaryOp::Define),
                Token::Number(1.0),
                Token::Sep,
                iden("b"),
                Token::Sep,
            ],
        );
    }

    #[test]
    fn operator_continues_line() {
        assert_eq!(
            items("1 +\n2"),
            vec![Token::Number(1.0), Token::Op(BinaryOp::Add), Token::Number(2.0), Token::Sep],
        );
        assert_eq!(
            items("f := x =>\n  x"),
            vec![
                iden("f"),
                Token::Op(BinaryOp::Define),
                iden("x"),
                Token::Arrow,
                iden("x"),
                Token::Sep,
            ],
        );
    }

    #[test]
    fn closing_delimiters_separate() {
        assert_eq!(
            items("(1)"),
            vec![Token::ParenLeft, Token::Number(1.0), Token::Sep, Token::ParenRight, Token::Sep],
        );
        assert_eq!(
            items("[1, 2,\n]"),
            vec![
                Token::BracketLeft,
                Token::Number(1.0),
                Token::Sep,
                Token::Number(2.0),
                Token::Sep,
                Token::BracketRight,
                Token::Sep,
            ],
        );
    }

    #[test]
    fn key_colon() {
        assert_eq!(
            items("{a: 1}"),
            vec![
                Token::BraceLeft,
                iden("a"),
                Token::Sep,
                Token::Colon,
                Token::Number(1.0),
                Token::Sep,
                Token::BraceRight,
                Token::Sep,
            ],
        );
    }

    #[test]
    fn match_tokens() {
        assert_eq!(
            items("n :: { 1 -> x }"),
            vec![
                iden("n"),
                Token::MatchColon,
                Token::BraceLeft,
                Token::Number(1.0),
                Token::CaseArrow,
                iden("x"),
                Token::Sep,
                Token::BraceRight,
                Token::Sep,
            ],
        );
    }

    #[test]
    fn numbers_and_accessors() {
        assert_eq!(
            items("3.14 10 .5"),
            vec![Token::Number(3.14), Token::Number(10.0), Token::Dot, Token::Number(5.0), Token::Sep],
        );
        assert_eq!(
            items("l.0"),
            vec![iden("l"), Token::Dot, Token::Number(0.0), Token::Sep],
        );
        assert_eq!(
            items("1.x"),
            vec![Token::Number(1.0), Token::Dot, iden("x"), Token::Sep],
        );
    }

    #[test]
    fn identifiers() {
        assert_eq!(
            items("_ _x is? ok! true false"),
            vec![
                Token::Empty,
                iden("_x"),
                iden("is?"),
                iden("ok!"),
                Token::Boolean(true),
                Token::Boolean(false),
                Token::Sep,
            ],
        );
    }

    #[test]
    fn escapes() {
        assert_eq!(
            items("'it\\'s\\n\\t\\\\'"),
            vec![Token::String("it's\n\t\\".to_string()), Token::Sep],
        );
    }

    #[test]
    fn comments() {
        assert_eq!(
            items("1 # one\n`a block\ncomment` 2"),
            vec![Token::Number(1.0), Token::Sep, Token::Number(2.0), Token::Sep],
        );
    }

    #[test]
    fn spans() {
        let tokens = Lexer::lex(Source::source("a := 'hi'")).unwrap();
        assert_eq!(tokens[2].span.offset(), 5);
        assert_eq!(tokens[2].span.len(), 4);
    }

    #[test]
    fn invalid() {
        let cases = &[
            ("'\\q'", "Unknown escape code"),
            ("'abc", "Unexpected end of input"),
            ("12abc", "Malformed number literal `12abc`"),
            ("a $ b", "is not recognized"),
            ("`never closed", "Unexpected end of input"),
        ];

        for (case, reason) in cases.iter() {
            match Lexer::lex(Source::source(case)) {
                Ok(t) => panic!("{:?} lexed to {:?}", case, t),
                Err(e) => assert!(e.reason.contains(reason), "{}", e),
            }
        }
    }

    proptest! {
        #[test]
        fn doesnt_crash(s in "\\PC*") {
            let result = Lexer::lex(Source::source(&s));
            format!("{:?}", result);
        }

        #[test]
        fn integers(n in 0u32..1_000_000) {
            let tokens = items(&n.to_string());
            prop_assert_eq!(tokens, vec![Token::Number(n as f64), Token::Sep]);
        }

        #[test]
        fn multiline_ops(splits: Vec<bool>) {
            // an expression broken after each operator is still one expression
            let mut buffer = "2".to_string();
            for split in splits.iter() {
                buffer.push_str(if *split { " +\n2" } else { " + 2" });
            }
            let tokens = items(&buffer);
            let seps = tokens.iter().filter(|t| **t == Token::Sep).count();
            prop_assert_eq!(seps, 1);
        }
    }
}
