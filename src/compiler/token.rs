use std::fmt::Display;

use crate::common::operator::BinaryOp;

/// These are the different tokens the lexer will output.
/// `Token`s with data contain that data,
/// e.g. a number will be a `Token::Number(...)`, not just a string.
/// `Token`s can be spanned using `Spanned<Token>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Delimiters
    ParenLeft,
    ParenRight,
    BracketLeft,
    BracketRight,
    BraceLeft,
    BraceRight,
    /// An explicit `,` or a separator inserted at the end of a line.
    Sep,

    // Operators
    /// Binary operators, including `:=`.
    Op(BinaryOp),
    /// `~`
    Negate,
    /// `.`
    Dot,
    /// `=>`
    Arrow,
    /// `::`
    MatchColon,
    /// `->`
    CaseArrow,
    /// The `:` between a key and its value.
    Colon,

    // Atoms
    Iden(String),
    /// `_`
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
}

impl Token {
    /// Whether an implicit separator may follow this token.
    /// Expressions can't end on an operator or opening delimiter,
    /// so a line break after one continues the expression.
    pub fn ends_expression(&self) -> bool {
        !matches!(
            self,
            Token::Sep
            | Token::ParenLeft
            | Token::BracketLeft
            | Token::BraceLeft
            | Token::Op(BinaryOp::Add)
            | Token::Op(BinaryOp::Sub)
            | Token::Op(BinaryOp::Mul)
            | Token::Op(BinaryOp::Div)
            | Token::Op(BinaryOp::Mod)
            | Token::Op(BinaryOp::Greater)
            | Token::Op(BinaryOp::Less)
            | Token::Op(BinaryOp::Equal)
            | Token::Op(BinaryOp::Define)
            | Token::Negate
            | Token::Dot
            | Token::Colon
            | Token::Arrow
            | Token::MatchColon
            | Token::CaseArrow
        )
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // pretty formatting for tokens
        // just use debug if you're not printing a message or something.
        match self {
            Token::ParenLeft    => write!(f, "an opening paren"),
            Token::ParenRight   => write!(f, "a closing paren"),
            Token::BracketLeft  => write!(f, "an opening bracket"),
            Token::BracketRight => write!(f, "a closing bracket"),
            Token::BraceLeft    => write!(f, "an opening brace"),
            Token::BraceRight   => write!(f, "a closing brace"),
            Token::Sep          => write!(f, "a separator"),
            Token::Op(op)       => write!(f, "the operator `{}`", op),
            Token::Negate       => write!(f, "the operator `~`"),
            Token::Dot          => write!(f, "an accessor `.`"),
            Token::Arrow        => write!(f, "a function arrow `=>`"),
            Token::MatchColon   => write!(f, "a match `::`"),
            Token::CaseArrow    => write!(f, "a case arrow `->`"),
            Token::Colon        => write!(f, "a key separator `:`"),
            Token::Iden(name)   => write!(f, "the identifier `{}`", name),
            Token::Empty        => write!(f, "the wildcard `_`"),
            Token::Number(_)    => write!(f, "a number"),
            Token::String(_)    => write!(f, "a string"),
            Token::Boolean(_)   => write!(f, "a boolean, like 'true' or 'false'"),
        }
    }
}
