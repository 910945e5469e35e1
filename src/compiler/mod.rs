//! This module contains the compiler implementation.
//! Note that these modules are public for documentation visiblility,
//! But should never be used outside of the module by `common` or `vm`.
//!
//! Each step in the compiler pipeline turns one datatype into another.
//! loosely, starting with `Source` (string + path):
//!
//! 1. Tokens:   `lex.rs`
//! 2. AST arena: `parse.rs`
//! 3. Folded AST: `fold.rs`, optional
//! 4. Bytecode: `gen.rs`

pub mod ast;
pub mod fold;
pub mod gen;
pub mod lex;
pub mod parse;
pub mod token;

pub mod syntax;

use std::rc::Rc;

use crate::common::{lambda::Program, source::Source};
use lex::Lexer;
use parse::Parser;
use syntax::Syntax;

/// Runs the whole pipeline over a source unit.
/// `globals` names the natives in the root scope, in slot order.
pub fn compile(source: &Rc<Source>, globals: &[String], fold: bool) -> Result<Program, Syntax> {
    let tokens = Lexer::lex(Rc::clone(source))?;
    log::debug!("lexed {} into {} tokens", source.path.display(), tokens.len());

    let (mut ast, root) = Parser::parse(Rc::clone(source), tokens)?;
    log::debug!("parsed {} into {} nodes", source.path.display(), ast.len());

    if fold {
        let folded = fold::fold(&mut ast);
        log::debug!("folded {} constant expressions", folded);
    }

    let program = gen::gen(&ast, root, globals)?;
    log::debug!("generated {} functions for {}", program.functions.len(), source.path.display());
    Ok(program)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::opcode::Opcode;

    #[test]
    fn folding_is_optional() {
        let source = Source::source("1 + 2");
        let plain = compile(&source, &[], false).unwrap();
        let folded = compile(&source, &[], true).unwrap();
        assert_eq!(plain.functions[0].code.len(), 6);
        assert_eq!(folded.functions[0].code, vec![
            Opcode::ScopePush,
            Opcode::Con(0),
            Opcode::ScopePop,
            Opcode::Return,
        ]);
    }

    #[test]
    fn errors_stop_the_pipeline() {
        assert!(compile(&Source::source("'open"), &[], false).is_err());
        assert!(compile(&Source::source("(1"), &[], false).is_err());
        assert!(compile(&Source::source("nope"), &[], false).is_err());
    }
}
