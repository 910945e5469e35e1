use std::fmt::{self, Display, Formatter};

/// Binding power of binary operators, lowest first.
/// Deriving `PartialOrd` on a `#[repr(u8)]` enum
/// lets the parser compare precedences directly.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Prec {
    None = 0,
    Define,
    Or,
    Xor,
    And,
    Compare,
    Sum,
    Product,
    Modulus,
    Access,
}

impl Prec {
    /// Returns the next-highest precedence,
    /// used when parsing the right operand of a left-associative operator.
    pub fn right(&self) -> Prec {
        match self {
            Prec::None    => Prec::Define,
            Prec::Define  => Prec::Or,
            Prec::Or      => Prec::Xor,
            Prec::Xor     => Prec::And,
            Prec::And     => Prec::Compare,
            Prec::Compare => Prec::Sum,
            Prec::Sum     => Prec::Product,
            Prec::Product => Prec::Modulus,
            Prec::Modulus => Prec::Access,
            Prec::Access  => Prec::Access,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `~`, negates numbers and inverts booleans.
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// `&`: bitwise on integers and strings, logical on booleans.
    And,
    /// `|`: bitwise on integers and strings, logical on booleans.
    Or,
    /// `^`: bitwise on integers and strings, logical on booleans.
    Xor,
    Greater,
    Less,
    Equal,
    /// `.`, indexes into composites, lists and strings.
    Access,
    /// `:=`, only ever lowered by the compiler, never executed.
    Define,
}

impl BinaryOp {
    pub fn prec(&self) -> Prec {
        match self {
            BinaryOp::Access => Prec::Access,
            BinaryOp::Mod => Prec::Modulus,
            BinaryOp::Mul | BinaryOp::Div => Prec::Product,
            BinaryOp::Add | BinaryOp::Sub => Prec::Sum,
            BinaryOp::Greater | BinaryOp::Less | BinaryOp::Equal => Prec::Compare,
            BinaryOp::And => Prec::And,
            BinaryOp::Xor => Prec::Xor,
            BinaryOp::Or => Prec::Or,
            BinaryOp::Define => Prec::Define,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add     => "+",
            BinaryOp::Sub     => "-",
            BinaryOp::Mul     => "*",
            BinaryOp::Div     => "/",
            BinaryOp::Mod     => "%",
            BinaryOp::And     => "&",
            BinaryOp::Or      => "|",
            BinaryOp::Xor     => "^",
            BinaryOp::Greater => ">",
            BinaryOp::Less    => "<",
            BinaryOp::Equal   => "=",
            BinaryOp::Access  => ".",
            BinaryOp::Define  => ":=",
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Negate => write!(f, "~"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn precedence_order() {
        assert!(BinaryOp::Access.prec() > BinaryOp::Mod.prec());
        assert!(BinaryOp::Mod.prec() > BinaryOp::Mul.prec());
        assert!(BinaryOp::Mul.prec() > BinaryOp::Add.prec());
        assert!(BinaryOp::Add.prec() > BinaryOp::Equal.prec());
        assert!(BinaryOp::Equal.prec() > BinaryOp::And.prec());
        assert!(BinaryOp::And.prec() > BinaryOp::Xor.prec());
        assert!(BinaryOp::Xor.prec() > BinaryOp::Or.prec());
        assert!(BinaryOp::Or.prec() > BinaryOp::Define.prec());
    }
}
