//! Execution tracing and run statistics.
//!
//! The VM reports each dispatched instruction through [`VmTracer`]; the
//! no-op implementation compiles away for production runs, the stderr
//! implementation gives a live instruction log for debugging, and the
//! recording implementation backs tests.

use std::time::Duration;

use crate::bytecode::op::{self, Opcode};

/// Receives one callback per dispatched instruction.
pub trait VmTracer {
    fn on_instr(&mut self, ip: usize, opcode: Opcode, funccode: u8) {
        let _ = (ip, opcode, funccode);
    }
}

/// Tracer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Tracer that logs every instruction to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrTracer;

impl VmTracer for StderrTracer {
    fn on_instr(&mut self, ip: usize, opcode: Opcode, funccode: u8) {
        match op::funccode_name(opcode, funccode) {
            Some(name) => eprintln!("{ip:>6}: {opcode} {name}"),
            None => eprintln!("{ip:>6}: {opcode}"),
        }
    }
}

/// Tracer that records the dispatched opcodes, for tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracer {
    pub opcodes: Vec<Opcode>,
}

impl VmTracer for RecordingTracer {
    fn on_instr(&mut self, _ip: usize, opcode: Opcode, _funccode: u8) {
        self.opcodes.push(opcode);
    }
}

/// Instruction count and wall-clock time of one run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecStats {
    pub completed: u64,
    pub elapsed: Duration,
}

impl ExecStats {
    /// The `--stats` report.
    pub fn analytics(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        let per_instr = if self.completed == 0 {
            0.0
        } else {
            secs / self.completed as f64
        };
        let per_sec = if secs == 0.0 {
            0
        } else {
            (self.completed as f64 / secs) as u64
        };
        format!(
            "Instructions completed:  {}\n\
             Execution time:          {secs}\n\
             Seconds per instruction: {per_instr}\n\
             Instructions per second: {per_sec}\n",
            self.completed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytics_reports_all_counters() {
        let stats = ExecStats {
            completed: 4,
            elapsed: Duration::from_secs(2),
        };
        let report = stats.analytics();
        assert!(report.contains("Instructions completed:  4"));
        assert!(report.contains("Instructions per second: 2"));
    }
}
