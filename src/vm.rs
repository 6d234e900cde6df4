//! The bytecode virtual machine.

use std::io::{self, Write as _};

use crate::compiler;
use crate::interner::Interner;
use crate::prelude::{Chunk, InterpretationError, OpCode, Value};
use crate::table::Table;
use crate::value::values_equal;

/// Used as the minimum capacity of the stack.
/// Since we're using a growable [Vec], the stack size can be arbitrarily large.
const STACK_SIZE: usize = 256;

/// Maintains state for the Lox virtual machine across a single [VM::interpret] call's worth of
/// globals and interned strings. A fresh [VM] sees neither the globals nor the interned strings
/// of any prior run.
#[derive(Default)]
pub struct VM {
    interner: Interner,
    globals: Table,
}

/// A VM with an active chunk, stack, and instruction pointer -- the state that only exists while a
/// chunk is actually running.
struct Frame<'a, 'v, W> {
    /// Instruction pointer -- index into the chunk for the next opcode to be executed.
    ip: usize,
    /// Value stack -- modified as elements are pushed and popped from the stack.
    stack: Vec<Value>,
    chunk: &'a Chunk,
    interner: &'v mut Interner,
    globals: &'v mut Table,
    output: W,
}

/// Fetches the next bytecode in the chunk, **AND** increments the instruction pointer.
macro_rules! next_bytecode {
    ($self: ident) => {{
        let byte = $self.chunk.get($self.ip);
        $self.ip += 1;
        byte
    }};
}

impl VM {
    pub fn new() -> Self {
        VM::default()
    }

    /// Interpret Lox source, writing `print` output (and nothing else) to stdout.
    pub fn interpret(&mut self, source: &[u8]) -> crate::Result<()> {
        self.interpret_with_output(source, io::stdout())
    }

    /// Interpret Lox source, writing `print` output to the given sink instead of stdout.
    ///
    /// Exists so tests (and embedders) can capture a program's output without scraping stdout.
    pub fn interpret_with_output<W: io::Write>(
        &mut self,
        source: &[u8],
        output: W,
    ) -> crate::Result<()> {
        let chunk = compiler::compile(source, &mut self.interner)?;

        let mut frame = Frame {
            ip: 0,
            stack: Vec::with_capacity(STACK_SIZE),
            chunk: &chunk,
            interner: &mut self.interner,
            globals: &mut self.globals,
            output,
        };
        frame.run()
    }
}

impl<'a, 'v, W: io::Write> Frame<'a, 'v, W> {
    /// The main opcode interpreter loop.
    fn run(&mut self) -> crate::Result<()> {
        use OpCode::*;

        loop {
            if cfg!(feature = "trace_execution") {
                use crate::debug::disassemble_instruction;

                print!("        ");
                for value in self.stack.iter() {
                    print!("[ {value:?} ]")
                }
                println!();

                disassemble_instruction(self.chunk, self.ip);
            }

            let opcode = next_bytecode!(self)
                .expect("instruction pointer is always within bounds of well-formed bytecode")
                .as_opcode()
                .unwrap_or_else(|| panic!("fetched invalid opcode at {}", self.ip - 1));

            match opcode {
                Constant => {
                    let constant = self.read_constant();
                    self.push(constant);
                }
                Nil => self.push(Value::Nil),
                True => self.push(true.into()),
                False => self.push(false.into()),
                Pop => {
                    self.pop();
                }
                GetLocal => {
                    let slot = self.read_byte();
                    self.push(self.stack[slot as usize].clone());
                }
                SetLocal => {
                    let slot = self.read_byte();
                    self.stack[slot as usize] = self.peek(0).clone();
                }
                DefineGlobal => {
                    let name = self.read_constant_string();
                    let value = self.pop();
                    self.globals.set(name, value);
                }
                GetGlobal => {
                    let name = self.read_constant_string();
                    match self.globals.get(&name) {
                        Some(value) => self.push(value),
                        None => {
                            let message = format!(
                                "Undefined variable '{}'.",
                                String::from_utf8_lossy(name.as_bytes())
                            );
                            self.runtime_error(&message)?;
                        }
                    }
                }
                SetGlobal => {
                    let name = self.read_constant_string();
                    let value = self.peek(0).clone();
                    if self.globals.set(name.clone(), value) {
                        // `set` just created a new entry for an undefined variable; assignment
                        // must not implicitly declare globals, so undo it.
                        self.globals.delete(&name);
                        let message = format!(
                            "Undefined variable '{}'.",
                            String::from_utf8_lossy(name.as_bytes())
                        );
                        self.runtime_error(&message)?;
                    }
                }
                Equal => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.push(values_equal(&lhs, &rhs).into());
                }
                Greater => self.number_binary_op("Operands must be numbers.", |a, b| a > b)?,
                Less => self.number_binary_op("Operands must be numbers.", |a, b| a < b)?,
                Add => self.add()?,
                Subtract => self.number_binary_op("Operands must be numbers.", |a, b| a - b)?,
                Multiply => self.number_binary_op("Operands must be numbers.", |a, b| a * b)?,
                Divide => self.number_binary_op("Operands must be numbers.", |a, b| a / b)?,
                Not => {
                    let value = self.pop();
                    self.push(value.is_falsy().into());
                }
                Negate => {
                    if let Some(number) = self.peek(0).as_number() {
                        self.pop();
                        self.push((-number).into());
                    } else {
                        self.runtime_error("Operand must be a number.")?;
                    }
                }
                Print => {
                    let value = self.pop();
                    writeln!(self.output, "{value}").expect("writing program output");
                }
                Return => {
                    return Ok(());
                }
            }
        }
    }

    fn runtime_error<T>(&mut self, message: &str) -> crate::Result<T> {
        eprintln!("{message}");

        let line = self
            .chunk
            .line_number_for(self.ip - 1)
            .expect("every emitted instruction has a line number");
        eprintln!("[line {line}] in script");

        self.reset_stack();

        Err(InterpretationError::RuntimeError)
    }

    /// `+` is overloaded: number addition, or string concatenation. Concatenation interns the
    /// result so it participates in the rest of the program like any other string.
    fn add(&mut self) -> crate::Result<()> {
        let rhs = self.peek(0).clone();
        let lhs = self.peek(1).clone();

        match (lhs.as_string(), rhs.as_string()) {
            (Some(a), Some(b)) => {
                let concatenated = self.interner.concat(a.as_bytes(), b.as_bytes());
                self.pop();
                self.pop();
                self.push(concatenated.into());
                Ok(())
            }
            _ => match (lhs.as_number(), rhs.as_number()) {
                (Some(a), Some(b)) => {
                    self.pop();
                    self.pop();
                    self.push((a + b).into());
                    Ok(())
                }
                _ => self.runtime_error("Operands must be two numbers or two strings."),
            },
        }
    }

    /// Pops two operands, both of which must be numbers, to perform a binary operation.
    fn number_binary_op<F, T>(&mut self, error_message: &str, op: F) -> crate::Result<()>
    where
        F: Fn(f64, f64) -> T,
        T: Into<Value>,
    {
        let rhs = self.peek(0).as_number();
        let lhs = self.peek(1).as_number();

        match (lhs, rhs) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(op(a, b).into());
                Ok(())
            }
            _ => self.runtime_error(error_message),
        }
    }

    /// Reads the constant-pool index that follows the current opcode, and resolves it.
    fn read_constant(&mut self) -> Value {
        next_bytecode!(self)
            .expect("there should be an operand")
            .resolve_constant()
            .expect("there should be a constant at this index")
    }

    /// Like [Frame::read_constant], but for constants that are known to be interned strings (used
    /// by global-variable opcodes, whose operand is always a name).
    fn read_constant_string(&mut self) -> crate::object::StringRef {
        self.read_constant()
            .as_string()
            .expect("global-variable opcodes always reference a string constant")
            .clone()
    }

    fn read_byte(&mut self) -> u8 {
        next_bytecode!(self)
            .expect("there should be an operand")
            .as_constant_index() as u8
    }

    /// Pushes a [Value] on to the value stack.
    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops and returns the top [Value] on the value stack.
    ///
    /// # Panics
    ///
    /// Panics when the value stack is empty. Given well-formed Lox bytecode, a pop cannot occur
    /// when the value stack is empty; therefore the interpreter panics if it is in this state.
    #[inline(always)]
    fn pop(&mut self) -> Value {
        self.stack.pop().expect("value stack is empty")
    }

    /// Peeks at the value relative to the top of the stack.
    ///
    /// # Panics
    ///
    ///  * When the stack is empty
    ///  * When the distance goes off the end of the stack
    #[inline(always)]
    fn peek(&self, distance: usize) -> &Value {
        self.stack
            .get(self.stack.len() - 1 - distance)
            .expect("peeked past the bottom of the stack")
    }

    #[inline(always)]
    fn reset_stack(&mut self) {
        self.stack.clear()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(source: &[u8]) -> (crate::Result<()>, String) {
        let mut vm = VM::new();
        let mut output = Vec::new();
        let result = vm.interpret_with_output(source, &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn prints_arithmetic() {
        let (result, output) = run(b"print 1 + 2 * 3;");
        assert!(result.is_ok());
        assert_eq!("7\n", output);
    }

    #[test]
    fn concatenates_strings() {
        let (result, output) = run(b"print \"foo\" + \"bar\";");
        assert!(result.is_ok());
        assert_eq!("foobar\n", output);
    }

    #[test]
    fn globals_round_trip() {
        let (result, output) = run(b"var a = 1; var b = 2; print a + b;");
        assert!(result.is_ok());
        assert_eq!("3\n", output);
    }

    #[test]
    fn locals_shadow_and_mutate() {
        let (result, output) = run(b"var a = 1; { var a = 2; a = a + 1; print a; } print a;");
        assert!(result.is_ok());
        assert_eq!("3\n1\n", output);
    }

    #[test]
    fn reading_undefined_global_is_a_runtime_error() {
        let (result, _) = run(b"print nope;");
        assert_eq!(Err(InterpretationError::RuntimeError), result);
    }

    #[test]
    fn assigning_to_undefined_global_is_a_runtime_error_and_does_not_define_it() {
        let (result, _) = run(b"nope = 1;");
        assert_eq!(Err(InterpretationError::RuntimeError), result);
    }

    #[test]
    fn adding_number_to_string_is_a_runtime_error() {
        let (result, _) = run(b"print 1 + \"a\";");
        assert_eq!(Err(InterpretationError::RuntimeError), result);
    }

    #[test]
    fn negating_a_string_is_a_runtime_error() {
        let (result, _) = run(b"print -\"a\";");
        assert_eq!(Err(InterpretationError::RuntimeError), result);
    }
}
