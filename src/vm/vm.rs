use std::rc::Rc;

use crate::{
    common::{
        closure::Closure,
        lambda::{Pattern, Program},
        lit::Lit,
        opcode::{Opcode, ScopeIndex},
        operator::{BinaryOp, UnaryOp},
        span::Span,
        value::{ErrorKind, Value},
    },
    core::{self, access, ffi::Args},
    engine::Context,
    vm::{frame::Frame, scope::Scope, trace::Trace},
};

/// An invariant the compiler should have upheld did not hold.
fn fatal(message: &str) -> Trace {
    Trace::error("Assertion", message, vec![])
}

/// A `VM` executes compiled programs.
/// Each VM's state is self-contained,
/// so more than one can be spawned if needed:
/// imports and callbacks each get a fresh one.
#[derive(Debug)]
pub struct VM {
    frames:     Vec<Frame>,
    stack:      Vec<Value>,
    max_frames: usize,
}

// this impl contains initialization, helper functions, and the core interpreter loop
// the next impl contains opcode implementations
impl VM {
    /// Initialize a new VM.
    /// To run the VM, a program must be passed to it through `run`.
    pub fn new(max_frames: usize) -> VM {
        VM { frames: vec![], stack: vec![], max_frames }
    }

    /// Runs the top-level function of a program in the root scope of `context`,
    /// returning the value of its last expression.
    pub fn run(&mut self, context: &mut Context, program: &Rc<Program>) -> Result<Value, Trace> {
        if program.main().is_none() {
            return Err(fatal("program has no top-level function"));
        }
        let closure = Closure::new(program, 0, &context.root);
        let base = self.frames.len();
        self.enter(closure, vec![])?;
        self.execute(context, base)
    }

    /// Calls a function value with arguments, running it to completion.
    /// Natives are called directly, with `span` as the call site.
    pub fn call(
        &mut self,
        context: &mut Context,
        callee: Value,
        args: Args,
        span: &Span,
    ) -> Result<Value, Trace> {
        match callee {
            Value::Function(closure) => {
                let base = self.frames.len();
                self.enter(closure, args)?;
                self.execute(context, base)
            },
            Value::Native(native) => {
                let result = native.call(context, span, args);
                match context.fault.take() {
                    Some(trace) => Err(trace),
                    None => Ok(result),
                }
            },
            Value::Error(_) => Ok(callee),
            other => Ok(not_callable(&other, span)),
        }
    }

    fn frame(&self) -> Result<&Frame, Trace> {
        self.frames.last().ok_or_else(|| fatal("no frame to run"))
    }

    fn frame_mut(&mut self) -> Result<&mut Frame, Trace> {
        self.frames.last_mut().ok_or_else(|| fatal("no frame to run"))
    }

    fn span(&self) -> Result<Span, Trace> {
        self.frame()?.span().ok_or_else(|| fatal("instruction has no span"))
    }

    fn pop(&mut self) -> Result<Value, Trace> {
        self.stack.pop().ok_or_else(|| fatal("operand stack underflow"))
    }

    fn peek(&self) -> Result<&Value, Trace> {
        self.stack.last().ok_or_else(|| fatal("operand stack is empty"))
    }

    /// Pops the topmost `n` values, in the order they were pushed.
    fn pop_many(&mut self, n: usize) -> Result<Vec<Value>, Trace> {
        if self.stack.len() < n {
            return Err(fatal("operand stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    /// Builds a runtime error value at the current instruction.
    fn error(&self, message: String) -> Result<Value, Trace> {
        Ok(Value::error(ErrorKind::Runtime, message, Some(self.span()?)))
    }

    /// Pushes the result of an operator, turning a failure into an error value.
    fn push_result(&mut self, result: Result<Value, String>) -> Result<(), Trace> {
        let value = match result {
            Ok(value) => value,
            Err(message) => self.error(message)?,
        };
        self.stack.push(value);
        Ok(())
    }

    /// Arguments are padded with `()`, or cut down, to the function's arity.
    fn enter(&mut self, closure: Closure, mut args: Args) -> Result<(), Trace> {
        if self.frames.len() >= self.max_frames {
            return Err(Trace::error(
                "Stack Overflow",
                &format!("call depth exceeded the limit of {} frames", self.max_frames),
                vec![],
            ));
        }

        args.resize(closure.lambda().arity, Value::Null);
        let base = self.stack.len();
        self.stack.extend(args);
        self.frames.push(Frame::new(closure, base));
        Ok(())
    }

    /// Replaces the current frame with a call, for calls in tail position.
    fn replace(&mut self, closure: Closure, mut args: Args) -> Result<(), Trace> {
        let frame = self.frames.pop().ok_or_else(|| fatal("no frame to replace"))?;
        self.stack.truncate(frame.base);

        args.resize(closure.lambda().arity, Value::Null);
        self.stack.extend(args);
        self.frames.push(Frame::new(closure, frame.base));
        Ok(())
    }

    /// Drops every frame above `base`, and everything they left on the stack.
    fn unwind(&mut self, base: usize) {
        if let Some(frame) = self.frames.get(base) {
            let height = frame.base;
            self.stack.truncate(height);
        }
        self.frames.truncate(base);
    }

    /// Runs frames until the one entered above `base` returns.
    fn execute(&mut self, context: &mut Context, base: usize) -> Result<Value, Trace> {
        while self.frames.len() > base {
            if context.exit.is_some() {
                self.unwind(base);
                return Ok(Value::Null);
            }

            if let Err(mut trace) = self.step(context) {
                for frame in self.frames.iter().skip(base).rev() {
                    if let Some(span) = frame.span() {
                        trace.add_context(span);
                    }
                }
                self.unwind(base);
                return Err(trace);
            }
        }

        self.pop()
    }

    /// Dissasembles and interprets a single (potentially fallible) bytecode op.
    /// The op definitions follow in the proceeding impl block.
    fn step(&mut self, context: &mut Context) -> Result<(), Trace> {
        let frame = self.frame_mut()?;
        let opcode = frame.current().ok_or_else(|| fatal("ran past the end of a function"))?;
        log::trace!("#{} {:>4}  {}", frame.closure.id, frame.ip, opcode);
        frame.ip += 1;

        match opcode {
            Opcode::Con(index)         => self.con(index),
            Opcode::Closure(id)        => self.closure(id),
            Opcode::Load(index)        => self.load(index),
            Opcode::Save(index)        => self.save(index),
            Opcode::Destructure(index) => self.destructure(index),
            Opcode::SubSet(n)          => self.sub_set(n),
            Opcode::Unary(op)          => self.unary(op),
            Opcode::Binary(op)         => self.binary(op),
            Opcode::List(n)            => self.list(n),
            Opcode::Composite(n)       => self.composite(n),
            Opcode::Call(n)            => self.call_op(context, n),
            Opcode::Return             => self.return_val(),
            Opcode::Match              => self.match_op(),
            Opcode::MatchClear         => self.match_clear(),
            Opcode::JumpIfFalse(addr)  => self.jump_if(addr, false),
            Opcode::JumpIfTrue(addr)   => self.jump_if(addr, true),
            Opcode::Jump(addr)         => self.jump(addr),
            Opcode::Copy               => self.copy_val(),
            Opcode::Del                => self.del(),
            Opcode::ScopePush          => self.scope_push(),
            Opcode::ScopePop           => self.scope_pop(),
            Opcode::Nop                => Ok(()),
        }
    }
}

fn not_callable(value: &Value, span: &Span) -> Value {
    Value::error(
        ErrorKind::Runtime,
        format!("cannot call non-function value {}", value),
        Some(span.clone()),
    )
}

/// Binds a value against a destructuring pattern.
/// The compiler only builds patterns for literal shapes,
/// so a value of the wrong shape is a fatal error, not a runtime one.
fn bind(scope: &Scope, pattern: &Pattern, value: Value) -> Result<(), Trace> {
    match pattern {
        Pattern::Ignore => Ok(()),
        Pattern::Bind(index) => {
            if scope.set(*index, value) {
                Ok(())
            } else {
                Err(fatal(&format!("no scope at depth {}", index.depth)))
            }
        },
        Pattern::List(patterns) => {
            let items = match &value {
                Value::List(items) => items.borrow().clone(),
                other => return Err(fatal(&format!("cannot destructure {} as a list", other))),
            };
            if items.len() != patterns.len() {
                return Err(fatal(&format!(
                    "cannot destructure a list of {} items into {} names",
                    items.len(),
                    patterns.len(),
                )));
            }
            for (pattern, item) in patterns.iter().zip(items) {
                bind(scope, pattern, access::detach(item))?;
            }
            Ok(())
        },
        Pattern::Composite(entries) => {
            let map = match &value {
                Value::Composite(map) => map.borrow().clone(),
                other => return Err(fatal(&format!("cannot destructure {} as a composite", other))),
            };
            for (key, pattern) in entries {
                let item = map.get(key.as_bytes()).cloned().ok_or_else(|| {
                    fatal(&format!("missing key {} while destructuring {}", key, value))
                })?;
                bind(scope, pattern, access::detach(item))?;
            }
            Ok(())
        },
    }
}

/// Walks `keys` from `root`, writing `value` at the last one.
fn assign(root: &Value, keys: &[Value], value: Value) -> Result<(), String> {
    let (last, path) = keys.split_last().ok_or("nothing to assign to")?;
    let mut target = root.clone();
    for key in path {
        target = access::walk(&target, key)?;
    }
    access::set(&target, last, value)
}

impl VM {
    /// Load a constant and push it onto the stack.
    fn con(&mut self, index: usize) -> Result<(), Trace> {
        let value = self.frame()?
            .lambda()
            .constants
            .get(index)
            .map(Lit::value)
            .ok_or_else(|| fatal("constant out of range"))?;
        self.stack.push(value);
        Ok(())
    }

    /// Wraps a function with the scope chain as it is right now.
    fn closure(&mut self, id: usize) -> Result<(), Trace> {
        let frame = self.frame()?;
        if id >= frame.closure.program.functions.len() {
            return Err(fatal("function out of range"));
        }
        let closure = Closure::new(&frame.closure.program, id, &frame.scope);
        self.stack.push(Value::Function(closure));
        Ok(())
    }

    /// Push a copy of a variable's value onto the stack.
    fn load(&mut self, index: ScopeIndex) -> Result<(), Trace> {
        let value = self.frame()?
            .scope
            .get(index)
            .ok_or_else(|| fatal(&format!("no scope at depth {}", index.depth)))?;
        self.stack.push(value);
        Ok(())
    }

    /// Save the topmost value on the stack into a variable, leaving it there.
    fn save(&mut self, index: ScopeIndex) -> Result<(), Trace> {
        let value = self.peek()?.clone();
        if self.frame()?.scope.set(index, value) {
            Ok(())
        } else {
            Err(fatal(&format!("no scope at depth {}", index.depth)))
        }
    }

    /// Binds the topmost value against a pattern, leaving it on the stack.
    /// An error value is left alone, and binds nothing.
    fn destructure(&mut self, index: usize) -> Result<(), Trace> {
        let pattern = self.frame()?
            .lambda()
            .patterns
            .get(index)
            .cloned()
            .ok_or_else(|| fatal("pattern out of range"))?;
        let value = self.peek()?.clone();
        if value.is_error() {
            return Ok(());
        }
        let scope = Rc::clone(&self.frame()?.scope);
        bind(&scope, &pattern, value)
    }

    /// Expects `[..., value, key 1, ..., key n, root]`, keys ordered from the root out.
    /// Leaves the root on the stack.
    fn sub_set(&mut self, n: usize) -> Result<(), Trace> {
        let root = self.pop()?;
        let keys = self.pop_many(n)?;
        let value = self.pop()?;

        if root.is_error() {
            self.stack.push(root);
            return Ok(());
        }

        match assign(&root, &keys, value) {
            Ok(()) => self.stack.push(root),
            Err(message) => {
                let error = self.error(message)?;
                self.stack.push(error);
            },
        }
        Ok(())
    }

    fn unary(&mut self, op: UnaryOp) -> Result<(), Trace> {
        let operand = self.pop()?;
        self.push_result(core::unary(op, &operand))
    }

    fn binary(&mut self, op: BinaryOp) -> Result<(), Trace> {
        let right = self.pop()?;
        let left = self.pop()?;
        self.push_result(core::binary(op, &left, &right))
    }

    fn list(&mut self, n: usize) -> Result<(), Trace> {
        let items = self.pop_many(n)?;
        self.stack.push(Value::list(items));
        Ok(())
    }

    /// Expects `n` key-value pairs, keys first.
    fn composite(&mut self, n: usize) -> Result<(), Trace> {
        let flat = self.pop_many(n * 2)?;
        let mut entries = std::collections::BTreeMap::new();

        for pair in flat.chunks(2) {
            let key = match access::composite_key(&pair[0]) {
                Ok(key) => key,
                Err(message) => {
                    let error = self.error(message)?;
                    self.stack.push(error);
                    return Ok(());
                },
            };
            entries.insert(key, pair[1].clone());
        }

        self.stack.push(Value::composite(entries));
        Ok(())
    }

    /// Expects `[..., arg 1, ..., arg n, callee]`.
    /// Function calls push a frame; natives run right away.
    fn call_op(&mut self, context: &mut Context, n: usize) -> Result<(), Trace> {
        let callee = self.pop()?;
        let args = self.pop_many(n)?;

        match callee {
            Value::Function(closure) => {
                let frame = self.frame()?;
                if frame.in_tail_position(frame.ip - 1) {
                    self.replace(closure, args)
                } else {
                    self.enter(closure, args)
                }
            },
            Value::Native(native) => {
                let span = self.span()?;
                let result = native.call(context, &span, args);
                if let Some(trace) = context.fault.take() {
                    return Err(trace);
                }
                self.stack.push(result);
                Ok(())
            },
            Value::Error(_) => {
                self.stack.push(callee);
                Ok(())
            },
            other => {
                let span = self.span()?;
                self.stack.push(not_callable(&other, &span));
                Ok(())
            },
        }
    }

    /// Return a value from a function,
    /// clearing anything the frame left beneath it.
    fn return_val(&mut self) -> Result<(), Trace> {
        let value = self.pop()?;
        let frame = self.frames.pop().ok_or_else(|| fatal("return without a frame"))?;
        self.stack.truncate(frame.base);
        self.stack.push(value);
        Ok(())
    }

    /// Expects `[..., condition, target]`, and leaves the condition in place.
    fn match_op(&mut self) -> Result<(), Trace> {
        let target = self.pop()?;
        let matched = target.equals(self.peek()?);
        self.stack.push(Value::Boolean(matched));
        Ok(())
    }

    fn match_clear(&mut self) -> Result<(), Trace> {
        let result = self.pop()?;
        self.pop()?;
        self.stack.push(result);
        Ok(())
    }

    /// Jumps if the popped value is exactly the boolean `when`.
    /// Any other value falls through.
    fn jump_if(&mut self, address: usize, when: bool) -> Result<(), Trace> {
        if let Value::Boolean(condition) = self.pop()? {
            if condition == when {
                self.frame_mut()?.ip = address;
            }
        }
        Ok(())
    }

    fn jump(&mut self, address: usize) -> Result<(), Trace> {
        self.frame_mut()?.ip = address;
        Ok(())
    }

    fn copy_val(&mut self) -> Result<(), Trace> {
        let value = self.peek()?.clone();
        self.stack.push(value);
        Ok(())
    }

    /// Delete the top item of the stack.
    fn del(&mut self) -> Result<(), Trace> {
        self.pop()?;
        Ok(())
    }

    fn scope_push(&mut self) -> Result<(), Trace> {
        let frame = self.frame_mut()?;
        frame.scope = Scope::push(&frame.scope);
        log::debug!("pushed scope in fn #{}", frame.closure.id);
        Ok(())
    }

    fn scope_pop(&mut self) -> Result<(), Trace> {
        let frame = self.frame_mut()?;
        let parent = frame.scope
            .parent()
            .cloned()
            .ok_or_else(|| fatal("popped the root scope"))?;
        frame.scope = parent;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        common::source::Source,
        compiler,
        config::Config,
        engine::Engine,
    };

    fn eval(source: &str) -> Value {
        let (mut engine, _) = Engine::captured(Config::default());
        engine.eval_str(source).unwrap()
    }

    fn eval_shows(source: &str, expected: &str) {
        assert_eq!(eval(source).to_string(), expected, "evaluating {:?}", source);
    }

    #[test]
    fn arithmetic() {
        eval_shows("2+2", "4");
        eval_shows("(1+2)*3", "9");
        eval_shows("1 + 2 * 3 - 4 / 2", "5");
        eval_shows("7 % 3", "1");
        eval_shows("~(1 + 1)", "-2");
    }

    #[test]
    fn empty_program() {
        assert!(matches!(eval(""), Value::Null));
        assert!(matches!(eval("# just a comment\n"), Value::Null));
    }

    #[test]
    fn definitions() {
        eval_shows("a := 3\nb := a * 2\na + b", "9");
        eval_shows("a := 1\na := a + 1\na", "2");
    }

    #[test]
    fn short_circuit() {
        eval_shows("false & (1/0)", "false");
        eval_shows("true | (1/0)", "true");
        eval_shows("true & false", "false");
        eval_shows("6 & 3", "2");
    }

    #[test]
    fn functions() {
        eval_shows("double := x => x * 2\ndouble(21)", "42");
        eval_shows("add := (a, b) => a + b\nadd(1, 2)", "3");
        eval_shows("f := (a, b) => b\nf(1)", "()");
        eval_shows("f := a => a\nf(1, 2, 3)", "1");
        eval_shows("(() => 5)()", "5");
    }

    #[test]
    fn recursion() {
        let source = "
            fact := n => n :: {
                0 -> 1
                _ -> n * fact(n - 1)
            }
            fact(10)
        ";
        eval_shows(source, "3628800");
    }

    #[test]
    fn deep_tail_calls() {
        let source = "
            count := (n, acc) => n :: {
                0 -> acc
                _ -> count(n - 1, acc + 1)
            }
            count(200000, 0)
        ";
        eval_shows(source, "200000");
    }

    #[test]
    fn stack_overflow_is_fatal() {
        let (mut engine, _) = Engine::captured(Config { max_frames: 50, ..Config::default() });
        let source = "f := n => 1 + f(n + 1)\nf(0)";
        match engine.eval_str(source) {
            Err(crate::engine::EngineError::Trace(trace)) => {
                assert_eq!(trace.kind(), "Stack Overflow");
            },
            other => panic!("expected a stack overflow, got {:?}", other),
        }
    }

    #[test]
    fn matching() {
        eval_shows("5 :: { 1 -> 'a', 2 -> 'b' }", "()");
        eval_shows("2 :: { 1 -> 'a', 2 -> 'b' }", "'b'");
        eval_shows("[1, 2] :: { [1, _] -> 'yes', _ -> 'no' }", "'yes'");
        eval_shows("x := (3 :: { 3 -> 'three' })\nx", "'three'");
    }

    #[test]
    fn containers() {
        eval_shows("l := [1, 2, 3]\nl.3 := 4\nl", "[1, 2, 3, 4]");
        eval_shows("type(([1, 2, 3]).5 := 9)", "'error'");
        eval_shows("c := {a: 1}\nc.b := 2\nc", "{a: 1, b: 2}");
        eval_shows("c := {a: {b: 1}}\nc.a.b := 5\nc.a.b", "5");
        eval_shows("[10, 20, 30].1", "20");
        eval_shows("{a: 1}.b", "()");
        eval_shows("k := 'a'\n{a: 7}.(k)", "7");
    }

    #[test]
    fn string_immutability() {
        let source = "
            a := 'ab'
            b := a + 'c'
            b.0 := 'x'
            [a, b]
        ";
        eval_shows(source, "['ab', 'xbc']");
    }

    #[test]
    fn destructuring() {
        eval_shows("[a, b] := [1, 2]\na + b", "3");
        eval_shows("{x, y: z} := {x: 1, y: 2}\nx + z", "3");
        eval_shows("[a, [b, _]] := [1, [2, 3]]\na + b", "3");
    }

    #[test]
    fn destructuring_shape_mismatch_is_fatal() {
        let (mut engine, _) = Engine::captured(Config::default());
        assert!(engine.eval_str("[a, b] := [1]").is_err());
    }

    #[test]
    fn errors_are_values() {
        eval_shows("type(1 / 0)", "'error'");
        eval_shows("type('a' - 1)", "'error'");
        eval_shows("type((1 / 0) + 1)", "'error'");
        eval_shows("type(3())", "'error'");
    }

    #[test]
    fn closures_capture_by_reference() {
        let source = "
            counter := {n: 0}
            make := () => () => counter.n
            get := make()
            counter.n := 5
            get()
        ";
        eval_shows(source, "5");
    }

    #[test]
    fn bindings_are_fresh_per_call() {
        let source = "
            make := i => (
                x := i * 10
                () => x
            )
            fns := [make(1), make(2), make(3)]
            [(fns.0)(), (fns.1)(), (fns.2)()]
        ";
        eval_shows(source, "[10, 20, 30]");
    }

    #[test]
    fn natives() {
        eval_shows("len('hello')", "5");
        eval_shows("string(12)", "'12'");
        eval_shows("type(len)", "'function'");
        eval_shows("floor(2.7)", "2");
    }

    #[test]
    fn callback_through_call() {
        let (mut engine, _) = Engine::captured(Config::default());
        let f = engine.eval_str("x => x + 1").unwrap();
        let span = Span::point(&Source::source(""), 0);
        let result = VM::new(100)
            .call(engine.context(), f, vec![Value::Number(2.0)], &span)
            .unwrap();
        assert!(result.equals(&Value::Number(3.0)));
    }

    #[test]
    fn runs_compiled_program() {
        let (mut engine, _) = Engine::captured(Config::default());
        let source = Source::source("[1, 2].0");
        let context = engine.context();
        let program = compiler::compile(&source, &context.globals, false).unwrap();
        let result = VM::new(100).run(context, &Rc::new(program)).unwrap();
        assert!(result.equals(&Value::Number(1.0)));
    }
}
