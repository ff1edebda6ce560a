//! Byte I/O endpoint for the VM's `PutC`/`GetC` syscalls.
//!
//! Going through a trait keeps the VM testable: tests script input and
//! collect output without touching the process's stdio.

use std::io::{Read, Write};

/// One-byte-at-a-time console the VM talks to.
pub trait Console {
    /// Writes one byte; returns the byte written, or -1 on failure.
    fn put_byte(&mut self, byte: u32) -> i32;
    /// Reads one byte; returns -1 at end of input.
    fn get_byte(&mut self) -> i32;
}

/// Production console bound to the process's stdout and stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConsole;

impl Console for StdConsole {
    fn put_byte(&mut self, byte: u32) -> i32 {
        let b = byte as u8;
        match std::io::stdout().write_all(&[b]) {
            Ok(()) => i32::from(b),
            Err(_) => -1,
        }
    }

    fn get_byte(&mut self) -> i32 {
        let mut buf = [0u8; 1];
        match std::io::stdin().read(&mut buf) {
            Ok(1) => i32::from(buf[0]),
            _ => -1,
        }
    }
}

/// Console with scripted input and collected output, for tests.
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
    input: Vec<u8>,
    cursor: usize,
    output: Vec<u8>,
}

impl BufferConsole {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.to_vec(),
            cursor: 0,
            output: vec![],
        }
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Console for BufferConsole {
    fn put_byte(&mut self, byte: u32) -> i32 {
        let b = byte as u8;
        self.output.push(b);
        i32::from(b)
    }

    fn get_byte(&mut self) -> i32 {
        match self.input.get(self.cursor) {
            Some(&b) => {
                self.cursor += 1;
                i32::from(b)
            }
            None => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_console_scripts_input_and_collects_output() {
        let mut console = BufferConsole::new(b"hi");
        assert_eq!(console.get_byte(), i32::from(b'h'));
        assert_eq!(console.get_byte(), i32::from(b'i'));
        assert_eq!(console.get_byte(), -1);
        assert_eq!(console.put_byte(u32::from(b'!')), i32::from(b'!'));
        assert_eq!(console.output_string(), "!");
    }
}
