use crate::{
    common::{
        lambda::{Lambda, Pattern, Program},
        lit::Lit,
        number,
        opcode::{Opcode, ScopeIndex},
        operator::BinaryOp,
        span::Span,
    },
    compiler::{
        ast::{Node, NodeId, AST},
        syntax::{Note, Syntax},
    },
};

/// Generates bytecode for a parsed program.
/// `globals` names the slots of the root scope, in order.
pub fn gen(ast: &AST, root: NodeId, globals: &[String]) -> Result<Program, Syntax> {
    let mut compiler = Compiler::new(ast, globals);
    compiler.walk(root)?;
    compiler.emit(Opcode::Return, root);
    Ok(Program { functions: compiler.functions })
}

/// Compiler is a bytecode generator that walks an AST and produces (unoptimized) bytecode.
/// Variables are resolved as they are walked:
/// each one becomes a `(depth, slot)` pair,
/// counting scopes outward from the innermost.
pub struct Compiler<'a> {
    ast:       &'a AST,
    functions: Vec<Lambda>,
    /// The function currently being emitted into.
    current:   usize,
    /// Names declared in each scope, outermost first.
    /// Slots are assigned in declaration order.
    scopes:    Vec<Vec<String>>,
}

impl<'a> Compiler<'a> {
    pub fn new(ast: &'a AST, globals: &[String]) -> Compiler<'a> {
        Compiler {
            ast,
            functions: vec![Lambda::empty(0)],
            current: 0,
            scopes: vec![globals.to_vec()],
        }
    }

    fn lambda(&mut self) -> &mut Lambda {
        &mut self.functions[self.current]
    }

    /// Nodes borrow from the arena, not the compiler,
    /// so they can be held across emits.
    fn node(&self, id: NodeId) -> &'a Node {
        self.ast.node(id)
    }

    fn span(&self, id: NodeId) -> Span {
        self.ast.span(id).clone()
    }

    fn emit(&mut self, op: Opcode, at: NodeId) -> usize {
        let span = self.span(at);
        self.lambda().emit(op, &span)
    }

    fn constant(&mut self, lit: Lit, at: NodeId) {
        let index = self.lambda().index_data(lit);
        self.emit(Opcode::Con(index), at);
    }

    /// Points the jump at `address` to whatever is emitted next.
    fn patch(&mut self, address: usize) {
        self.lambda().patch(address);
    }

    // Scopes

    fn enter_scope(&mut self) {
        self.scopes.push(vec![]);
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    fn resolve(&self, name: &str) -> Option<ScopeIndex> {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            // later declarations shadow earlier ones
            if let Some(slot) = scope.iter().rposition(|n| n == name) {
                return Some(ScopeIndex::new(depth, slot));
            }
        }
        None
    }

    /// Declares `name` in the innermost scope, reusing its slot if it is already there.
    fn declare(&mut self, name: &str) -> ScopeIndex {
        let innermost = self.scopes.len() - 1;
        let scope = &mut self.scopes[innermost];
        let slot = match scope.iter().position(|n| n == name) {
            Some(slot) => slot,
            None => {
                scope.push(name.to_string());
                scope.len() - 1
            },
        };
        ScopeIndex::new(0, slot)
    }

    /// Walks an AST to generate bytecode.
    /// Every node leaves exactly one value on the stack.
    fn walk(&mut self, id: NodeId) -> Result<(), Syntax> {
        match self.node(id) {
            Node::Iden(name)    => self.symbol(name, id)?,
            Node::Empty         => self.constant(Lit::Empty, id),
            Node::Number(n)     => self.constant(Lit::Number(*n), id),
            Node::String(s)     => self.constant(Lit::String(s.clone()), id),
            Node::Boolean(b)    => self.constant(Lit::Boolean(*b), id),
            Node::List(items)   => self.list(items, id)?,
            Node::Composite(entries) => self.composite(entries, id)?,
            Node::Function { params, body } => self.function(params, *body, id)?,
            Node::Unary(op, operand) => {
                self.walk(*operand)?;
                self.emit(Opcode::Unary(*op), id);
            },
            Node::Binary(BinaryOp::Define, left, right) => self.define(*left, *right, id)?,
            Node::Binary(op @ (BinaryOp::And | BinaryOp::Or), left, right) => {
                self.short_circuit(*op, *left, *right, id)?
            },
            Node::Binary(BinaryOp::Access, receiver, key) => {
                self.walk(*receiver)?;
                self.key(*key)?;
                self.emit(Opcode::Binary(BinaryOp::Access), id);
            },
            Node::Binary(op, left, right) => {
                self.walk(*left)?;
                self.walk(*right)?;
                self.emit(Opcode::Binary(*op), id);
            },
            Node::ExprList(expressions) => self.block(expressions, id)?,
            Node::Match { cond, clauses } => self.match_expr(*cond, clauses, id)?,
            Node::Call { callee, args } => {
                for arg in args {
                    self.walk(*arg)?;
                }
                self.walk(*callee)?;
                self.emit(Opcode::Call(args.len()), id);
            },
        }

        Ok(())
    }

    /// Takes a symbol leaf, and produces some code to load the variable.
    fn symbol(&mut self, name: &str, id: NodeId) -> Result<(), Syntax> {
        match self.resolve(name) {
            Some(index) => {
                self.emit(Opcode::Load(index), id);
                Ok(())
            },
            None => Err(Syntax::error_with_note(
                &format!("`{}` is not defined", name),
                Note::new_with_hint("variables must be defined before they are used", &self.span(id)),
            )),
        }
    }

    /// A bare name after `.` is a string key; anything else is evaluated.
    fn key(&mut self, key: NodeId) -> Result<(), Syntax> {
        match self.node(key) {
            Node::Iden(name) => self.constant(Lit::String(name.clone()), key),
            _ => self.walk(key)?,
        }
        Ok(())
    }

    fn list(&mut self, items: &[NodeId], id: NodeId) -> Result<(), Syntax> {
        for item in items {
            self.walk(*item)?;
        }
        self.emit(Opcode::List(items.len()), id);
        Ok(())
    }

    /// Keys are names, strings, or numbers written in the literal,
    /// or expressions to evaluate.
    fn composite(&mut self, entries: &[(NodeId, NodeId)], id: NodeId) -> Result<(), Syntax> {
        for (key, value) in entries {
            match self.node(*key) {
                Node::Number(n) => self.constant(Lit::String(number::format(*n)), *key),
                _ => self.key(*key)?,
            }
            self.walk(*value)?;
        }
        self.emit(Opcode::Composite(entries.len()), id);
        Ok(())
    }

    /// A block is a series of expressions where the last is returned.
    /// Each block gets a scope of its own.
    fn block(&mut self, expressions: &[NodeId], id: NodeId) -> Result<(), Syntax> {
        if expressions.is_empty() {
            self.constant(Lit::Null, id);
            return Ok(());
        }

        self.emit(Opcode::ScopePush, id);
        self.enter_scope();

        for (i, expression) in expressions.iter().enumerate() {
            if i > 0 {
                self.emit(Opcode::Del, id);
            }
            self.walk(*expression)?;
        }

        self.exit_scope();
        self.emit(Opcode::ScopePop, id);
        Ok(())
    }

    /// `&` and `|` only evaluate their right side
    /// when the left side does not already decide the result.
    /// A non-boolean left side never short-circuits.
    fn short_circuit(
        &mut self,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        id: NodeId,
    ) -> Result<(), Syntax> {
        self.walk(left)?;
        self.emit(Opcode::Copy, id);
        let jump = match op {
            BinaryOp::And => self.emit(Opcode::JumpIfFalse(0), id),
            _             => self.emit(Opcode::JumpIfTrue(0), id),
        };
        self.walk(right)?;
        self.emit(Opcode::Binary(op), id);
        self.patch(jump);
        self.emit(Opcode::Nop, id);
        Ok(())
    }

    /// Clauses are tried in order; the first whose target equals the condition wins.
    /// If none do, the match is `()`.
    fn match_expr(
        &mut self,
        cond: NodeId,
        clauses: &[(NodeId, NodeId)],
        id: NodeId,
    ) -> Result<(), Syntax> {
        self.walk(cond)?;

        let mut ends = vec![];
        let mut fail = None;

        for (target, result) in clauses {
            if let Some(fail) = fail {
                self.patch(fail);
            }
            self.walk(*target)?;
            self.emit(Opcode::Match, *target);
            fail = Some(self.emit(Opcode::JumpIfFalse(0), *target));
            self.walk(*result)?;
            ends.push(self.emit(Opcode::Jump(0), *result));
        }

        if let Some(fail) = fail {
            self.patch(fail);
        }
        self.constant(Lit::Null, id);

        for end in ends {
            self.patch(end);
        }
        self.emit(Opcode::MatchClear, id);
        Ok(())
    }

    /// Compiles a function literal into a new lambda,
    /// leaving a closure over the current scope chain on the stack.
    fn function(&mut self, params: &[NodeId], body: NodeId, id: NodeId) -> Result<(), Syntax> {
        let function = self.functions.len();
        self.functions.push(Lambda::empty(params.len()));
        let enclosing = std::mem::replace(&mut self.current, function);

        self.emit(Opcode::ScopePush, id);
        self.enter_scope();

        // arguments are pushed in order, so they are bound last to first
        let mut bindings = vec![];
        for param in params {
            let binding = match self.node(*param) {
                Node::Iden(name) => Some(self.declare(name)),
                _ => None,
            };
            bindings.push((binding, *param));
        }
        for (binding, param) in bindings.into_iter().rev() {
            if let Some(index) = binding {
                self.emit(Opcode::Save(index), param);
            }
            self.emit(Opcode::Del, param);
        }

        let result = self.walk(body);
        self.exit_scope();
        self.emit(Opcode::ScopePop, id);
        self.emit(Opcode::Return, id);
        self.current = enclosing;
        result?;

        self.emit(Opcode::Closure(function), id);
        Ok(())
    }

    /// `:=` binds a name in the innermost scope,
    /// destructures a list or composite literal,
    /// or assigns into a container through an accessor.
    fn define(&mut self, left: NodeId, right: NodeId, id: NodeId) -> Result<(), Syntax> {
        match self.node(left) {
            Node::Iden(name) => {
                // only a function may refer to the name it is being bound to
                let index = if let Node::Function { .. } = self.node(right) {
                    let index = self.declare(name);
                    self.walk(right)?;
                    index
                } else {
                    self.walk(right)?;
                    self.declare(name)
                };
                self.emit(Opcode::Save(index), id);
            },
            Node::Empty => self.walk(right)?,
            Node::List(_) | Node::Composite(_) => {
                self.walk(right)?;
                let pattern = self.pattern(left)?;
                let index = self.lambda().index_pattern(pattern);
                self.emit(Opcode::Destructure(index), id);
            },
            Node::Binary(BinaryOp::Access, _, _) => self.assign(left, right, id)?,
            _ => return Err(Syntax::error_with_note(
                "Invalid left-hand side of a definition",
                Note::new_with_hint(
                    "only names, accessors, and list or composite literals can be defined",
                    &self.span(left),
                ),
            )),
        }

        Ok(())
    }

    /// Builds the pattern for a destructuring definition,
    /// declaring every name it binds.
    fn pattern(&mut self, id: NodeId) -> Result<Pattern, Syntax> {
        let pattern = match self.node(id) {
            Node::Iden(name) => Pattern::Bind(self.declare(name)),
            Node::Empty => Pattern::Ignore,
            Node::List(items) => Pattern::List(
                items.iter()
                    .map(|item| self.pattern(*item))
                    .collect::<Result<_, _>>()?
            ),
            Node::Composite(entries) => {
                let mut fields = vec![];
                for (key, value) in entries {
                    let key = match self.node(*key) {
                        Node::Iden(name) | Node::String(name) => name.clone(),
                        Node::Number(n) => number::format(*n),
                        _ => return Err(Syntax::error(
                            "Keys in a destructuring pattern must be written out",
                            &self.span(*key),
                        )),
                    };
                    fields.push((key, self.pattern(*value)?));
                }
                Pattern::Composite(fields)
            },
            _ => return Err(Syntax::error(
                "Only names, `_`, and list or composite literals can be destructured into",
                &self.span(id),
            )),
        };

        Ok(pattern)
    }

    /// `a.b.c := v` evaluates `v`, the keys from the root out, then `a`.
    fn assign(&mut self, left: NodeId, right: NodeId, id: NodeId) -> Result<(), Syntax> {
        let mut keys = vec![];
        let mut root = left;
        while let Node::Binary(BinaryOp::Access, receiver, key) = self.node(root) {
            keys.push(*key);
            root = *receiver;
        }

        self.walk(right)?;
        for key in keys.iter().rev() {
            self.key(*key)?;
        }
        self.walk(root)?;
        self.emit(Opcode::SubSet(keys.len()), id);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;
    use crate::{
        common::{operator::UnaryOp, source::Source},
        compiler::{lex::Lexer, parse::Parser},
    };

    fn compile(source: &str) -> Result<Program, Syntax> {
        let source = Source::source(source);
        let tokens = Lexer::lex(Rc::clone(&source))?;
        let (ast, root) = Parser::parse(source, tokens)?;
        gen(&ast, root, &["out".to_string()])
    }

    fn code(source: &str) -> Vec<Opcode> {
        compile(source).unwrap().functions[0].code.clone()
    }

    fn at(depth: usize, slot: usize) -> ScopeIndex {
        ScopeIndex::new(depth, slot)
    }

    #[test]
    fn empty_program() {
        assert_eq!(code(""), vec![Opcode::Con(0), Opcode::Return]);
    }

    #[test]
    fn sequence() {
        assert_eq!(code("1, 2"), vec![
            Opcode::ScopePush,
            Opcode::Con(0),
            Opcode::Del,
            Opcode::Con(1),
            Opcode::ScopePop,
            Opcode::Return,
        ]);
    }

    #[test]
    fn short_circuit_and() {
        assert_eq!(code("false & true"), vec![
            Opcode::ScopePush,
            Opcode::Con(0),
            Opcode::Copy,
            Opcode::JumpIfFalse(6),
            Opcode::Con(1),
            Opcode::Binary(BinaryOp::And),
            Opcode::Nop,
            Opcode::ScopePop,
            Opcode::Return,
        ]);
    }

    #[test]
    fn short_circuit_or() {
        assert_eq!(code("true | false"), vec![
            Opcode::ScopePush,
            Opcode::Con(0),
            Opcode::Copy,
            Opcode::JumpIfTrue(6),
            Opcode::Con(1),
            Opcode::Binary(BinaryOp::Or),
            Opcode::Nop,
            Opcode::ScopePop,
            Opcode::Return,
        ]);
    }

    #[test]
    fn match_clauses() {
        // constants: 2, 1, 'a', 'b', ()
        assert_eq!(code("2 :: { 1 -> 'a', 2 -> 'b' }"), vec![
            Opcode::ScopePush,
            Opcode::Con(0),
            Opcode::Con(1),
            Opcode::Match,
            Opcode::JumpIfFalse(7),
            Opcode::Con(2),
            Opcode::Jump(13),
            Opcode::Con(0),
            Opcode::Match,
            Opcode::JumpIfFalse(12),
            Opcode::Con(3),
            Opcode::Jump(13),
            Opcode::Con(4),
            Opcode::MatchClear,
            Opcode::ScopePop,
            Opcode::Return,
        ]);
    }

    #[test]
    fn definitions_resolve() {
        assert_eq!(code("x := 1, ~x"), vec![
            Opcode::ScopePush,
            Opcode::Con(0),
            Opcode::Save(at(0, 0)),
            Opcode::Del,
            Opcode::Load(at(0, 0)),
            Opcode::Unary(UnaryOp::Negate),
            Opcode::ScopePop,
            Opcode::Return,
        ]);
    }

    #[test]
    fn globals_resolve() {
        assert_eq!(code("out"), vec![
            Opcode::ScopePush,
            Opcode::Load(at(1, 0)),
            Opcode::ScopePop,
            Opcode::Return,
        ]);
    }

    #[test]
    fn functions() {
        let program = compile("f := (a, _) => a").unwrap();
        assert_eq!(program.functions.len(), 2);
        assert_eq!(program.functions[0].code, vec![
            Opcode::ScopePush,
            Opcode::Closure(1),
            Opcode::Save(at(0, 0)),
            Opcode::ScopePop,
            Opcode::Return,
        ]);

        let body = &program.functions[1];
        assert_eq!(body.arity, 2);
        assert_eq!(body.code, vec![
            Opcode::ScopePush,
            Opcode::Del,
            Opcode::Save(at(0, 0)),
            Opcode::Del,
            Opcode::Load(at(0, 0)),
            Opcode::ScopePop,
            Opcode::Return,
        ]);
    }

    #[test]
    fn recursion_sees_own_name() {
        let program = compile("f := n => f(n)").unwrap();
        assert!(program.functions[1].code.contains(&Opcode::Load(at(1, 0))));
    }

    #[test]
    fn no_forward_references() {
        assert!(compile("f := () => g()\ng := () => 1").is_err());
        assert!(compile("x := x").is_err());
    }

    #[test]
    fn unbound_names() {
        let error = compile("y + 1").unwrap_err();
        assert_eq!(error.reason, "`y` is not defined");
    }

    #[test]
    fn accessor_assignment() {
        // constants: 5, 'a', 'b'
        assert_eq!(code("c := {}\nc.a.b := 5"), vec![
            Opcode::ScopePush,
            Opcode::Composite(0),
            Opcode::Save(at(0, 0)),
            Opcode::Del,
            Opcode::Con(0),
            Opcode::Con(1),
            Opcode::Con(2),
            Opcode::Load(at(0, 0)),
            Opcode::SubSet(2),
            Opcode::ScopePop,
            Opcode::Return,
        ]);
    }

    #[test]
    fn destructuring_patterns() {
        let program = compile("[a, {k: b}, _] := x := [1, {k: 2}, 3]").unwrap();
        assert_eq!(program.functions[0].patterns, vec![Pattern::List(vec![
            Pattern::Bind(at(0, 1)),
            Pattern::Composite(vec![("k".to_string(), Pattern::Bind(at(0, 2)))]),
            Pattern::Ignore,
        ])]);
    }

    #[test]
    fn invalid_targets() {
        assert!(compile("1 := 2").is_err());
        assert!(compile("[1] := [1]").is_err());
        assert!(compile("f() := 2").is_err());
    }

    fn expression() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![
            (0u32..100).prop_map(|n| n.to_string()),
            Just("x".to_string()),
            Just("'s'".to_string()),
            Just("_".to_string()),
        ];

        leaf.prop_recursive(4, 32, 4, |inner| {
            let ops = vec!["+", "-", "*", "/", "%", "&", "|", "^", "<", ">", "="];
            prop_oneof![
                (inner.clone(), prop::sample::select(ops), inner.clone())
                    .prop_map(|(a, op, b)| format!("{} {} {}", a, op, b)),
                inner.clone().prop_map(|a| format!("({})", a)),
                prop::collection::vec(inner.clone(), 0..3)
                    .prop_map(|items| format!("[{}]", items.join(", "))),
                (inner.clone(), inner.clone())
                    .prop_map(|(f, a)| format!("({})({})", f, a)),
                inner.clone().prop_map(|body| format!("(x => {})", body)),
                (inner.clone(), inner.clone())
                    .prop_map(|(c, r)| format!("({}) :: {{ 1 -> {} }}", c, r)),
            ]
        })
    }

    proptest! {
        #[test]
        fn jumps_resolve(body in expression()) {
            let source = format!("x := 1\n{}", body);
            let program = compile(&source);
            prop_assert!(program.is_ok(), "{:?} failed to compile", source);

            for lambda in program.unwrap().functions {
                prop_assert_eq!(lambda.code.len(), lambda.spans.len());
                for (address, op) in lambda.code.iter().enumerate() {
                    if let Opcode::JumpIfFalse(target)
                    | Opcode::JumpIfTrue(target)
                    | Opcode::Jump(target) = op {
                        prop_assert!(*target > address && *target < lambda.code.len());
                    }
                }
            }
        }
    }
}
