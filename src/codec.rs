//! AXCP framing: encode/decode a `(opcode, payload)` command over any
//! `Read`/`Write` byte stream.
//!
//! Grounded on the teacher's `io.rs` extension-trait pattern
//! (`ReadAs`/`WriteAs` wrapping per-type `ReadFrom`/`WriteTo` impls) and on
//! `axcp.c`'s `axcpEncodeAndSend`/`axcpReceiveAndDecode`. Multi-byte integers
//! on the wire are big-endian per spec.md §6, unlike the teacher's
//! little-endian HCI integers.

use std::io::{self, Read, Write};

use crate::error::CodecError;
use crate::opcode::{payload_class, PayloadClass};

/// A decoded command: opcode plus its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl Command {
    pub fn new(opcode: u8, payload: Vec<u8>) -> Self {
        Command { opcode, payload }
    }
}

/// Loop-driven "read exactly this many bytes" helper. Partial reads are
/// tolerated; only an explicit I/O error or EOF aborts.
pub trait ReadFullExt: Read {
    fn read_full(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "EOF mid-command",
                ));
            }
            filled += n;
        }
        Ok(())
    }
}
impl<R: Read + ?Sized> ReadFullExt for R {}

/// Loop-driven "write exactly this many bytes" helper.
pub trait WriteFullExt: Write {
    fn write_full(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned 0",
                ));
            }
            written += n;
        }
        Ok(())
    }
}
impl<W: Write + ?Sized> WriteFullExt for W {}

/// Encodes `command` onto `writer` per its opcode's payload class.
pub fn encode<W: Write>(command: &Command, writer: &mut W) -> Result<(), CodecError> {
    match payload_class(command.opcode) {
        PayloadClass::Fixed(n) => {
            if command.payload.len() != n as usize {
                return Err(CodecError::LengthMismatch {
                    opcode: command.opcode,
                    expected: n,
                    actual: command.payload.len(),
                });
            }
            writer.write_full(&[command.opcode])?;
            writer.write_full(&command.payload)?;
            Ok(())
        }
        PayloadClass::Variable => {
            writer.write_full(&[command.opcode])?;
            let mut offset = 0;
            loop {
                let remaining = command.payload.len() - offset;
                let chunk_len = remaining.min(255);
                writer.write_full(&[chunk_len as u8])?;
                writer.write_full(&command.payload[offset..offset + chunk_len])?;
                offset += chunk_len;
                if chunk_len < 255 {
                    break;
                }
            }
            Ok(())
        }
        PayloadClass::Unknown => Err(CodecError::UnknownOpcode(command.opcode)),
    }
}

/// Decodes one command from `reader`.
///
/// Returns `Ok(Command)` for a recognized opcode. An unknown opcode yields
/// `Err(CodecError::UnknownOpcode)` after consuming just the one byte — the
/// caller logs it and moves on, per spec.md §4.A.
pub fn decode<R: Read>(reader: &mut R) -> Result<Command, CodecError> {
    let mut opcode_buf = [0u8; 1];
    reader.read_full(&mut opcode_buf)?;
    let opcode = opcode_buf[0];

    match payload_class(opcode) {
        PayloadClass::Unknown => Err(CodecError::UnknownOpcode(opcode)),
        PayloadClass::Fixed(n) => {
            let mut payload = vec![0u8; n as usize];
            reader.read_full(&mut payload)?;
            Ok(Command::new(opcode, payload))
        }
        PayloadClass::Variable => {
            let mut payload = Vec::new();
            loop {
                let mut len_buf = [0u8; 1];
                reader.read_full(&mut len_buf)?;
                let chunk_len = len_buf[0] as usize;
                let start = payload.len();
                payload.resize(start + chunk_len, 0);
                reader.read_full(&mut payload[start..])?;
                if chunk_len < 255 {
                    break;
                }
            }
            Ok(Command::new(opcode, payload))
        }
    }
}

/// Reads a big-endian `u16` from `reader`.
pub fn read_u16_be<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_full(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Reads a big-endian `i32` from `reader`.
pub fn read_i32_be<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_full(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}
