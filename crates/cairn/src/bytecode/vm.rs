//! The stack virtual machine.
//!
//! The loaded word vector is both instruction memory and working stack:
//! code sits at the bottom, the activation records and temporaries grow
//! above it. Addresses are plain word indices, so pointer arithmetic is
//! integer arithmetic.

use std::time::Instant;

use crate::{
    bytecode::{
        op::{self, BinaryFn, Opcode, SysFn, UnaryFn},
        program::Program,
    },
    error::VmError,
    io::Console,
    tracer::{ExecStats, VmTracer},
};

/// Single-threaded interpreter over one program-and-stack vector.
#[derive(Debug)]
pub struct Vm<C, T> {
    stack: Vec<u32>,
    ip: usize,
    bp: usize,
    console: C,
    tracer: T,
    stats: ExecStats,
}

impl<C: Console, T: VmTracer> Vm<C, T> {
    pub fn new(program: Program, console: C, tracer: T) -> Self {
        Self {
            stack: program.into_words(),
            ip: 0,
            bp: 0,
            console,
            tracer,
            stats: ExecStats::default(),
        }
    }

    /// Runs to `SYSCALL Exit` and returns its operand as the exit code.
    ///
    /// Running off the end of the code is reported to stderr and returns
    /// `-1` (as `u32::MAX`).
    pub fn run(&mut self) -> Result<u32, VmError> {
        let start = Instant::now();
        self.stats.completed = 0;
        let result = self.exec();
        self.stats.elapsed = start.elapsed();
        result
    }

    pub fn stats(&self) -> &ExecStats {
        &self.stats
    }

    /// The combined code-and-data stack, for inspection.
    pub fn stack(&self) -> &[u32] {
        &self.stack
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    fn exec(&mut self) -> Result<u32, VmError> {
        while self.ip < self.stack.len() {
            let ip = self.ip;
            let (opcode, funccode, has_immediate) = op::decode(self.stack[ip], ip)?;
            self.tracer.on_instr(ip, opcode, funccode);

            let mut operand = 0u32;
            if has_immediate {
                let Some(&word) = self.stack.get(ip + 1) else {
                    break;
                };
                operand = word;
                self.ip += 1;
            } else if opcode != Opcode::Nop
                && !(opcode == Opcode::SysCall && funccode == SysFn::GetC as u8)
            {
                operand = self.pop(ip)?;
            }

            match opcode {
                Opcode::Nop | Opcode::Pop => {}
                Opcode::SysCall => match SysFn::try_from(funccode) {
                    Ok(SysFn::Exit) => {
                        self.stats.completed += 1;
                        return Ok(operand);
                    }
                    Ok(SysFn::PutC) => {
                        let result = self.console.put_byte(operand);
                        self.stack.push(result as u32);
                    }
                    Ok(SysFn::GetC) => {
                        let result = self.console.get_byte();
                        self.stack.push(result as u32);
                    }
                    _ => return Err(VmError::BadInstruction { ip, word: self.stack[ip] }),
                },
                Opcode::Unary => {
                    let a = operand as i32;
                    let y = match UnaryFn::try_from(funccode) {
                        Ok(UnaryFn::Nop) => a,
                        Ok(UnaryFn::Neg) => a.wrapping_neg(),
                        Err(_) => {
                            return Err(VmError::BadInstruction { ip, word: self.stack[ip] });
                        }
                    };
                    self.stack.push(y as u32);
                }
                Opcode::Binary => self.binary(ip, funccode, operand)?,
                Opcode::Push => self.stack.push(operand),
                Opcode::AddSp => {
                    let delta = i64::from(operand as i32);
                    let new_len = self.stack.len() as i64 + delta;
                    if new_len < 0 {
                        return Err(VmError::BadAddress { ip, addr: new_len });
                    }
                    self.stack.resize(new_len as usize, 0);
                }
                Opcode::LoadRel => {
                    let addr = self.bp as i64 + i64::from(operand as i32);
                    let value = self.load(ip, addr)?;
                    self.stack.push(value);
                }
                Opcode::LoadAbs => {
                    let value = self.load(ip, i64::from(operand))?;
                    self.stack.push(value);
                }
                Opcode::LoadAddrRel => {
                    let addr = self.bp as i64 + i64::from(operand as i32);
                    self.stack.push(addr as u32);
                }
                Opcode::DupLoad => {
                    self.stack.push(operand);
                    let value = self.load(ip, i64::from(operand))?;
                    self.stack.push(value);
                }
                Opcode::Dup => {
                    self.stack.push(operand);
                    self.stack.push(operand);
                }
                Opcode::Call => {
                    // Arguments, the argument count, and the callee
                    // address are already on the stack or in the operand.
                    self.stack.push(self.bp as u32);
                    self.stack.push(self.ip as u32);
                    self.bp = self.stack.len();
                    self.ip = (operand as usize).wrapping_sub(1);
                }
                Opcode::Ret => {
                    if self.bp < 3 {
                        return Err(VmError::StackUnderflow { ip });
                    }
                    let n_args = self.stack[self.bp - 3];
                    let saved_bp = self.stack[self.bp - 2];
                    let saved_ip = self.stack[self.bp - 1];
                    let new_len = self.bp as i64 - 3 - i64::from(n_args);
                    if new_len < 0 {
                        return Err(VmError::StackUnderflow { ip });
                    }
                    self.stack.truncate(new_len as usize);
                    self.stack.push(operand);
                    self.bp = saved_bp as usize;
                    self.ip = saved_ip as usize;
                }
                Opcode::Jump => {
                    self.ip = (operand as usize).wrapping_sub(1);
                }
                Opcode::BrTrue | Opcode::BrFalse => {
                    let v = self.pop(ip)?;
                    if (v != 0) == (opcode == Opcode::BrTrue) {
                        self.ip = (operand as usize).wrapping_sub(1);
                    }
                }
            }
            self.stats.completed += 1;
            self.ip = self.ip.wrapping_add(1);
        }
        eprintln!("Instruction fetch overread at {}", self.ip);
        Ok(u32::MAX)
    }

    /// `BINARY`: the left operand is the stack top, the right operand is
    /// the instruction operand, and the result replaces the top.
    fn binary(&mut self, ip: usize, funccode: u8, operand: u32) -> Result<(), VmError> {
        let Some(&top) = self.stack.last() else {
            return Err(VmError::StackUnderflow { ip });
        };
        let a = top as i32;
        let b = operand as i32;
        let y = match BinaryFn::try_from(funccode) {
            Ok(BinaryFn::Nop) => a,
            Ok(BinaryFn::Add) => a.wrapping_add(b),
            Ok(BinaryFn::Sub) => a.wrapping_sub(b),
            Ok(BinaryFn::Mul) => a.wrapping_mul(b),
            Ok(BinaryFn::Div) => {
                if b == 0 {
                    return Err(VmError::DivisionByZero { ip });
                }
                a.wrapping_div(b)
            }
            Ok(BinaryFn::Mod) => {
                if b == 0 {
                    return Err(VmError::DivisionByZero { ip });
                }
                a.wrapping_rem(b)
            }
            Ok(BinaryFn::Equals) => i32::from(a == b),
            Ok(BinaryFn::NotEquals) => i32::from(a != b),
            Ok(BinaryFn::LessThan) => i32::from(a < b),
            Ok(BinaryFn::LessEquals) => i32::from(a <= b),
            Ok(BinaryFn::Assign) => {
                // left is the destination address, right the value
                let addr = i64::from(a);
                if addr < 0 || addr as usize >= self.stack.len() {
                    return Err(VmError::BadAddress { ip, addr });
                }
                self.stack[addr as usize] = b as u32;
                b
            }
            Err(_) => return Err(VmError::BadInstruction { ip, word: self.stack[ip] }),
        };
        *self.stack.last_mut().expect("stack checked non-empty") = y as u32;
        Ok(())
    }

    fn pop(&mut self, ip: usize) -> Result<u32, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow { ip })
    }

    fn load(&self, ip: usize, addr: i64) -> Result<u32, VmError> {
        if addr < 0 || addr as usize >= self.stack.len() {
            return Err(VmError::BadAddress { ip, addr });
        }
        Ok(self.stack[addr as usize])
    }
}
