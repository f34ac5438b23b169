//! Process-wide mutable state, collected into one owned struct rather than
//! scattered across module-level globals (`hwc_type`, the debugger
//! descriptors and the running-program bookkeeping were separate statics in
//! the original source).

use std::fs::File;
use std::path::PathBuf;

use crate::ringbuffer::RingBuffer;

/// A `(name, version)` pair identifying a program on disk and on the wire.
///
/// `name` is stored already trimmed of its wire-format trailing spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramId {
    pub name: String,
    pub version: u16,
}

impl ProgramId {
    /// Directory the program's source, binary and compiler output live under.
    pub fn directory(&self) -> PathBuf {
        PathBuf::from(&self.name)
    }

    /// Base filename shared by the source and binary (`<name>_v<version>`).
    pub fn base_filename(&self) -> String {
        format!("{}_v{}", self.name, self.version)
    }

    /// Decodes a program identity from its 32-byte name field plus a 16-bit
    /// big-endian version field, trimming the name's trailing space padding.
    pub fn decode(name_field: &[u8; 32], version: u16) -> Self {
        let name = String::from_utf8_lossy(name_field)
            .trim_end_matches(' ')
            .to_string();
        ProgramId { name, version }
    }

    /// Encodes the name back into its 32-byte space-padded wire field.
    pub fn encode_name(&self) -> [u8; 32] {
        let mut field = [b' '; 32];
        let bytes = self.name.as_bytes();
        let n = bytes.len().min(32);
        field[..n].copy_from_slice(&bytes[..n]);
        field
    }
}

/// A user-program child process and its pipes, live between execute and exit.
pub struct RunningProgram {
    pub id: ProgramId,
    pub pid: libc::pid_t,
    /// Write end of the SWC-to-program pipe (fd `PROGRAM_IN_FD` in the child).
    pub in_pipe_w: File,
    /// Read end of the program-to-SWC reply pipe.
    pub reply_pipe_r: File,
    /// Read end of the program's combined stdout/stderr pipe.
    pub stdout_pipe_r: File,
    pub custom_data_buffer: RingBuffer,
}

/// The debugger child process: created once at startup, lives for the SWC's
/// lifetime, re-targeted at a new program pid on each `DEBUGGING_BREAK_ACTION`.
pub struct DebuggerState {
    pub pid: libc::pid_t,
    pub cmd_w: File,
    pub out_r: File,
    pub attached: bool,
    pub breaked: bool,
}

/// The single outstanding sensor/battery-query correlation held by the
/// mediator. At most one may exist at a time (§3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReply {
    pub expected_opcode: u8,
    /// Meaningful only for port-keyed opcodes; `None` for battery queries.
    pub expected_port: Option<u8>,
}

/// All process-wide mutable state threaded through the event loop and every
/// handler it calls.
pub struct SwcState {
    /// 0 means no hardware controller has announced itself yet.
    pub hwc_type: u8,
    pub program: Option<RunningProgram>,
    pub debugger: DebuggerState,
    pub restart_pending: bool,
    pub pending_reply: Option<PendingReply>,
    /// Identity of the most recently executed program, kept around so an
    /// `EXECUTION_RESTART_ACTION` can re-execute it once `program` has gone
    /// back to `None` and the identity can no longer be read off it: either
    /// immediately, if no program was running when the restart arrived, or
    /// after a deferred restart's predecessor finishes tearing down.
    pub last_program_id: Option<ProgramId>,
}

impl SwcState {
    pub fn new(debugger: DebuggerState) -> Self {
        SwcState {
            hwc_type: 0,
            program: None,
            debugger,
            restart_pending: false,
            pending_reply: None,
            last_program_id: None,
        }
    }
}
