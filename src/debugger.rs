//! Scans the debugger child's line-oriented stdout for breakpoint hits and
//! sentinel-bracketed structured reports.
//!
//! Grounded on `gdb_out_received_command` and the `pfds[3]` handling in the
//! original `main()` loop. `_Hedgehog_` sentinel lines bracket a report the
//! coordinator injected itself (via `DEBUGGING_BREAK_ACTION`'s `echo`
//! sequence or an add/remove-breakpoint command), so an unrecognized inner
//! command indicates the coordinator and the debugger have desynchronized.

use crate::codec::Command;
use crate::error::SwcError;
use crate::opcode::DEBUGGING_BREAKED_ACTION;
use crate::state::{DebuggerState, ProgramId};

const SENTINEL: &str = "_Hedgehog_";

/// Injected when a `Breakpoint` line is seen, so the next lines become a
/// structured, sentinel-bracketed "breaked" report. The `\n` inside each
/// `echo` argument is passed through literally so gdb's `echo` emits it as a
/// newline in its own output; the bare newlines between commands just
/// terminate each gdb command line.
pub const BREAKED_INJECTION: &str =
    "echo _Hedgehog_:breaked\\n\nframe\ninfo locals\necho _Hedgehog_\\n\n";

/// Tracks state across calls to [`Scanner::feed_line`] while a sentinel
/// block is being captured.
#[derive(Default)]
pub struct Scanner {
    capturing: Option<Vec<String>>,
}

/// What the caller should do in response to one debugger stdout line.
pub enum DebuggerEvent {
    /// Nothing actionable yet (still capturing, or an ignored line).
    None,
    /// Write this raw text to the debugger's command pipe.
    Inject(String),
    /// Emit this command to the UART.
    Emit(Command),
}

impl Scanner {
    pub fn new() -> Self {
        Scanner { capturing: None }
    }

    /// Processes one line (without its trailing newline) of debugger stdout.
    pub fn feed_line(
        &mut self,
        line: &str,
        debugger: &mut DebuggerState,
        id: &ProgramId,
    ) -> Result<DebuggerEvent, SwcError> {
        if let Some(captured) = &mut self.capturing {
            if line == SENTINEL {
                let captured = self.capturing.take().unwrap();
                return dispatch_captured(captured, debugger, id);
            }
            captured.push(line.to_string());
            return Ok(DebuggerEvent::None);
        }

        if line.starts_with("Breakpoint") {
            return Ok(DebuggerEvent::Inject(BREAKED_INJECTION.to_string()));
        }

        if let Some(rest) = line.strip_prefix(SENTINEL) {
            if let Some(cmd) = rest.strip_prefix(':') {
                self.capturing = Some(vec![cmd.to_string()]);
                return Ok(DebuggerEvent::None);
            }
        }

        Ok(DebuggerEvent::None)
    }
}

/// C's `atoi`: skip leading whitespace, take an optional sign and as many
/// decimal digits as follow, and return 0 if none are found. Mirrors the
/// original's `atoi(lines[2])` — gdb's `frame` line carries trailing source
/// text after the number (`"15\tsome_code();"`), so a strict numeric parse
/// would reject exactly the input this is meant to handle.
fn atoi(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let mut chars = trimmed.chars().peekable();
    let negative = match chars.peek() {
        Some('-') => {
            chars.next();
            true
        }
        Some('+') => {
            chars.next();
            false
        }
        _ => false,
    };
    let digits: String = chars.take_while(|c| c.is_ascii_digit()).collect();
    let value: i64 = digits.parse().unwrap_or(0);
    if negative {
        -value
    } else {
        value
    }
}

fn dispatch_captured(
    mut captured: Vec<String>,
    debugger: &mut DebuggerState,
    id: &ProgramId,
) -> Result<DebuggerEvent, SwcError> {
    // captured[0] is the `<command>` name from the opening `_Hedgehog_:<command>`
    // line; everything after it is the report body.
    if captured.is_empty() {
        return Err(SwcError::DebuggerProtocol(
            "sentinel block closed with no command".to_string(),
        ));
    }
    let command = captured.remove(0);
    match command.as_str() {
        "breaked" => {
            debugger.breaked = true;
            if captured.len() < 2 {
                return Err(SwcError::DebuggerProtocol(
                    "breaked report too short to contain a frame line".to_string(),
                ));
            }
            let frame_line = atoi(&captured[1]);
            let user_line = (frame_line - 3).max(0) as u16;
            let locals = captured[2..].join("\n");

            let mut payload = Vec::with_capacity(36 + locals.len());
            payload.extend_from_slice(&id.encode_name());
            payload.extend_from_slice(&id.version.to_be_bytes());
            payload.extend_from_slice(&user_line.to_be_bytes());
            payload.extend_from_slice(locals.as_bytes());
            Ok(DebuggerEvent::Emit(Command::new(
                DEBUGGING_BREAKED_ACTION,
                payload,
            )))
        }
        "ignore" => Ok(DebuggerEvent::None),
        other => Err(SwcError::DebuggerProtocol(format!(
            "unknown injected gdb command: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debugger_state() -> DebuggerState {
        let Pipe { read: out_r, write: cmd_w } = crate::process::pipe().unwrap();
        DebuggerState {
            pid: 1,
            cmd_w,
            out_r,
            attached: false,
            breaked: false,
        }
    }
    use crate::process::Pipe;

    fn id() -> ProgramId {
        ProgramId {
            name: "follower".to_string(),
            version: 2,
        }
    }

    #[test]
    fn breakpoint_line_injects_sentinel_sequence() {
        let mut scanner = Scanner::new();
        let mut dbg = debugger_state();
        let event = scanner
            .feed_line("Breakpoint 1, main () at follower.c:12", &mut dbg, &id())
            .unwrap();
        match event {
            DebuggerEvent::Inject(text) => assert_eq!(text, BREAKED_INJECTION),
            _ => panic!("expected an injection"),
        }
    }

    #[test]
    fn breaked_report_emits_debugging_breaked_action() {
        let mut scanner = Scanner::new();
        let mut dbg = debugger_state();

        assert!(matches!(
            scanner
                .feed_line("_Hedgehog_:breaked", &mut dbg, &id())
                .unwrap(),
            DebuggerEvent::None
        ));
        // gdb's `frame` prints a header line and then the source line
        // prefixed by its line number; the second is what we parse.
        scanner
            .feed_line("#0  main () at follower_v2.c:15", &mut dbg, &id())
            .unwrap();
        scanner.feed_line("15\tsome_code();", &mut dbg, &id()).unwrap();
        scanner.feed_line("x = 1", &mut dbg, &id()).unwrap();
        scanner.feed_line("y = 2", &mut dbg, &id()).unwrap();
        let event = scanner.feed_line(SENTINEL, &mut dbg, &id()).unwrap();
        match event {
            DebuggerEvent::Emit(cmd) => {
                assert_eq!(cmd.opcode, DEBUGGING_BREAKED_ACTION);
                let line = u16::from_be_bytes([cmd.payload[34], cmd.payload[35]]);
                assert_eq!(line, 12);
                let locals = String::from_utf8(cmd.payload[36..].to_vec()).unwrap();
                assert_eq!(locals, "x = 1\ny = 2");
            }
            _ => panic!("expected an emit"),
        }
        assert!(dbg.breaked);
    }

    #[test]
    fn ignore_command_produces_no_event() {
        let mut scanner = Scanner::new();
        let mut dbg = debugger_state();
        scanner
            .feed_line("_Hedgehog_:ignore", &mut dbg, &id())
            .unwrap();
        let event = scanner.feed_line(SENTINEL, &mut dbg, &id()).unwrap();
        assert!(matches!(event, DebuggerEvent::None));
    }

    #[test]
    fn atoi_stops_at_first_non_digit() {
        assert_eq!(atoi("15\tsome_code();"), 15);
        assert_eq!(atoi("   42 trailing junk"), 42);
        assert_eq!(atoi("no digits here"), 0);
        assert_eq!(atoi(""), 0);
    }

    #[test]
    fn unknown_command_is_a_protocol_error() {
        let mut scanner = Scanner::new();
        let mut dbg = debugger_state();
        scanner
            .feed_line("_Hedgehog_:whatever", &mut dbg, &id())
            .unwrap();
        let err = scanner.feed_line(SENTINEL, &mut dbg, &id()).unwrap_err();
        assert!(matches!(err, SwcError::DebuggerProtocol(_)));
    }
}
