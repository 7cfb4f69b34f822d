//! Output and input callbacks.
//!
//! The engine never talks to stdio directly. Every `.` goes through an
//! [`OutputSink`] and every `,` through an [`InputSource`], invoked
//! synchronously in execution order.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::error::CallbackError;

/// Receives one byte per output instruction.
pub trait OutputSink {
    fn emit(&mut self, byte: u8) -> Result<(), CallbackError>;
}

/// Supplies one value per input instruction. The engine stores it mod 256.
pub trait InputSource {
    fn read(&mut self) -> Result<i32, CallbackError>;
}

impl<T: OutputSink + ?Sized> OutputSink for &mut T {
    fn emit(&mut self, byte: u8) -> Result<(), CallbackError> {
        (**self).emit(byte)
    }
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn emit(&mut self, byte: u8) -> Result<(), CallbackError> {
        (**self).emit(byte)
    }
}

impl<T: InputSource + ?Sized> InputSource for &mut T {
    fn read(&mut self) -> Result<i32, CallbackError> {
        (**self).read()
    }
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn read(&mut self) -> Result<i32, CallbackError> {
        (**self).read()
    }
}

/// Collects output in memory.
impl OutputSink for Vec<u8> {
    fn emit(&mut self, byte: u8) -> Result<(), CallbackError> {
        self.push(byte);
        Ok(())
    }
}

/// Scripted input; yields 0 once exhausted.
impl InputSource for VecDeque<u8> {
    fn read(&mut self) -> Result<i32, CallbackError> {
        Ok(self.pop_front().map_or(0, i32::from))
    }
}

/// Discards all output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _byte: u8) -> Result<(), CallbackError> {
        Ok(())
    }
}

/// Returns the same value for every input instruction.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantInput(pub i32);

impl InputSource for ConstantInput {
    fn read(&mut self) -> Result<i32, CallbackError> {
        Ok(self.0)
    }
}

/// Scripted byte input; yields 0 at EOF.
#[derive(Debug, Default, Clone)]
pub struct ByteInput {
    bytes: VecDeque<u8>,
}

impl ByteInput {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into().into(),
        }
    }
}

impl InputSource for ByteInput {
    fn read(&mut self) -> Result<i32, CallbackError> {
        InputSource::read(&mut self.bytes)
    }
}

/// Writes raw bytes to stdout, flushing after each one so output keeps
/// pace with execution.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, byte: u8) -> Result<(), CallbackError> {
        let mut out = io::stdout().lock();
        out.write_all(&[byte])?;
        out.flush()?;
        Ok(())
    }
}

/// Reads exactly one byte from stdin per input instruction; EOF reads as 0.
#[derive(Debug, Default)]
pub struct StdinSource;

impl InputSource for StdinSource {
    fn read(&mut self) -> Result<i32, CallbackError> {
        let mut buf = [0u8; 1];
        match io::stdin().read(&mut buf)? {
            0 => Ok(0),
            _ => Ok(i32::from(buf[0])),
        }
    }
}

/// Adapts an infallible closure into an [`OutputSink`].
pub struct FnOutput<F>(pub F);

impl<F: FnMut(u8)> OutputSink for FnOutput<F> {
    fn emit(&mut self, byte: u8) -> Result<(), CallbackError> {
        (self.0)(byte);
        Ok(())
    }
}

/// Adapts an infallible closure into an [`InputSource`].
pub struct FnInput<F>(pub F);

impl<F: FnMut() -> i32> InputSource for FnInput<F> {
    fn read(&mut self) -> Result<i32, CallbackError> {
        Ok((self.0)())
    }
}
