//! The five-source poll loop: the event multiplexer (§4.C).
//!
//! Each iteration reaps the program child, handles a pending restart, polls
//! all currently-open sources with `timeout = 0`, and for each ready source
//! decodes and dispatches at most one framed command before moving to the
//! next. Grounded on `andrixswc.c`'s `main()` loop body.

use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use log::{info, warn};

use crate::codec::{self, Command};
use crate::config::Config;
use crate::debugger::{DebuggerEvent, Scanner};
use crate::error::SwcError;
use crate::handler;
use crate::mediator::{self, MediatorAction};
use crate::opcode::*;
use crate::program::{self, ReapOutcome};
use crate::state::{ProgramId, SwcState};

/// Signals the loop should stop after this iteration.
struct Shutdown;

/// Runs the event loop until `SW_CONTROLLER_OFF_ACTION` is received on the
/// UART or a fatal I/O error occurs.
pub fn run(
    state: &mut SwcState,
    config: &Config,
    uart: &mut File,
    stdin: &mut File,
) -> Result<(), SwcError> {
    write_uart(uart, &Command::new(HW_CONTROLLER_TYPE_REQUEST, vec![]))?;

    let mut debugger_scanner = Scanner::new();

    loop {
        reap_program(state, uart)?;
        handle_restart_pending(state, config, uart)?;

        match poll_and_dispatch(state, config, uart, stdin, &mut debugger_scanner)? {
            Some(Shutdown) => {
                info!("SW_CONTROLLER_OFF_ACTION received, shutting down");
                return Ok(());
            }
            None => {}
        }
    }
}

/// §4.C step 1: non-blocking reap of the running program child.
fn reap_program(state: &mut SwcState, uart: &mut File) -> Result<(), SwcError> {
    let Some(program) = &state.program else {
        return Ok(());
    };
    let pid = program.pid;
    let outcome = program::reap(pid).map_err(|e| SwcError::Syscall {
        call: "waitpid",
        source: e,
    })?;
    let Some(outcome) = outcome else {
        return Ok(());
    };

    let id = state.program.as_ref().unwrap().id.clone();
    match outcome {
        ReapOutcome::Done(status) => {
            info!("program {} v{} exited with status {}", id.name, id.version, status);
            let mut payload = Vec::with_capacity(38);
            payload.extend_from_slice(&id.encode_name());
            payload.extend_from_slice(&id.version.to_be_bytes());
            payload.extend_from_slice(&status.to_be_bytes());
            write_uart(uart, &Command::new(EXECUTION_DONE_ACTION, payload))?;
        }
        ReapOutcome::Stopped => {
            info!("program {} v{} stopped via SIGTERM", id.name, id.version);
            let mut payload = Vec::with_capacity(34);
            payload.extend_from_slice(&id.encode_name());
            payload.extend_from_slice(&id.version.to_be_bytes());
            write_uart(uart, &Command::new(EXECUTION_STOPPED_ACTION, payload))?;
        }
        ReapOutcome::Other(sig) => {
            // Not translated to a wire event; `program` is left in place,
            // matching the original's missing `else` branch for this case.
            warn!(
                "program {} v{} died from untranslated signal {sig}, state not cleared",
                id.name, id.version
            );
            return Ok(());
        }
    }
    state.program = None;
    state.debugger.attached = false;
    state.debugger.breaked = false;
    Ok(())
}

/// §4.C step 2: re-execute a program whose restart was deferred until its
/// predecessor finished tearing down.
fn handle_restart_pending(
    state: &mut SwcState,
    config: &Config,
    uart: &mut File,
) -> Result<(), SwcError> {
    if !state.restart_pending || state.program.is_some() {
        return Ok(());
    }
    let Some(id) = last_program_id(state) else {
        state.restart_pending = false;
        return Ok(());
    };
    match program::execute(config, &id, &mut state.debugger.cmd_w) {
        Ok(running) => {
            let mut payload = Vec::with_capacity(34);
            payload.extend_from_slice(&running.id.encode_name());
            payload.extend_from_slice(&running.id.version.to_be_bytes());
            write_uart(uart, &Command::new(EXECUTION_STARTED_ACTION, payload))?;
            state.program = Some(running);
            state.restart_pending = false;
        }
        Err(program::ExecuteError::NotFound) => {
            write_uart(
                uart,
                &Command::new(
                    ERROR_ACTION,
                    vec![ERRORCODE_PROGRAM_NOT_FOUND, EXECUTION_RESTART_ACTION],
                ),
            )?;
            state.restart_pending = false;
        }
        Err(program::ExecuteError::AlreadyRunning) => {
            // Previous child hasn't finished tearing down; retry next iteration.
        }
        Err(program::ExecuteError::Io(e)) => return Err(e.into()),
    }
    Ok(())
}

/// The program identity to restart is the one most recently executed;
/// `reap_program` clears `state.program` but we still need its identity, so
/// the caller of `EXECUTION_RESTART_ACTION` stashes it here before signaling.
fn last_program_id(state: &SwcState) -> Option<ProgramId> {
    state.last_program_id.clone()
}

/// One poll-and-dispatch pass across all five sources, fixed priority order.
fn poll_and_dispatch(
    state: &mut SwcState,
    config: &Config,
    uart: &mut File,
    stdin: &mut File,
    debugger_scanner: &mut Scanner,
) -> Result<Option<Shutdown>, SwcError> {
    let program_fds = state
        .program
        .as_ref()
        .map(|p| (p.reply_pipe_r.as_raw_fd(), p.stdout_pipe_r.as_raw_fd()));

    let mut pollfds = vec![
        pollfd_for(uart.as_raw_fd()),
        pollfd_for(program_fds.map(|(r, _)| r).unwrap_or(-1)),
        pollfd_for(program_fds.map(|(_, s)| s).unwrap_or(-1)),
        pollfd_for(state.debugger.out_r.as_raw_fd()),
        pollfd_for(stdin.as_raw_fd()),
    ];

    let ready = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, 0) };
    if ready < 0 {
        return Err(SwcError::Syscall {
            call: "poll",
            source: std::io::Error::last_os_error(),
        });
    }

    if is_readable(&pollfds[0]) {
        if let Some(shutdown) = dispatch_uart(state, config, uart)? {
            return Ok(Some(shutdown));
        }
    }
    if program_fds.is_some() && is_readable(&pollfds[1]) {
        dispatch_program_reply(state, uart)?;
    }
    if program_fds.is_some() && is_readable(&pollfds[2]) {
        dispatch_program_stdout(state, uart)?;
    }
    if is_readable(&pollfds[3]) {
        dispatch_debugger_stdout(state, uart, debugger_scanner)?;
    }
    if is_readable(&pollfds[4]) {
        dispatch_stdin(uart, stdin)?;
    }

    Ok(None)
}

fn pollfd_for(fd: RawFd) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: if fd >= 0 { libc::POLLIN } else { 0 },
        revents: 0,
    }
}

fn is_readable(pfd: &libc::pollfd) -> bool {
    pfd.fd >= 0 && (pfd.revents & libc::POLLIN) != 0
}

fn dispatch_uart(
    state: &mut SwcState,
    config: &Config,
    uart: &mut File,
) -> Result<Option<Shutdown>, SwcError> {
    let command = match codec::decode(uart) {
        Ok(c) => c,
        Err(crate::error::CodecError::UnknownOpcode(op)) => {
            warn!("dropping unknown UART opcode {op}");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if command.opcode == SW_CONTROLLER_OFF_ACTION {
        return Ok(Some(Shutdown));
    }
    if command.opcode == SW_CONTROLLER_RESET_ACTION {
        reset_controller(state)?;
        return Ok(None);
    }

    // A sensor/battery reply destined for the running program is forwarded
    // to its input pipe *before* any further UART command in this iteration
    // is processed, per spec.md §5 ordering guarantee 4.
    if let Some(program) = &mut state.program {
        if mediator::try_forward_reply_to_program(&command, &mut state.pending_reply) {
            let mut buf = Vec::new();
            codec::encode(&command, &mut buf)?;
            program.in_pipe_w.write_all(&buf)?;
            return Ok(None);
        }
    }

    if command.opcode == PROGRAM_EXECUTE_ACTION || command.opcode == PROGRAM_COMPILE_EXECUTE_REQUEST
    {
        state.last_program_id = Some(decode_program_id(&command.payload));
    }
    if command.opcode == EXECUTION_RESTART_ACTION {
        if let Some(program) = &state.program {
            state.last_program_id = Some(program.id.clone());
        }
    }

    let outputs = handler::handle_uart_command(state, config, command)?;
    for out in outputs {
        write_uart(uart, &out)?;
    }
    Ok(None)
}

fn decode_program_id(payload: &[u8]) -> ProgramId {
    let name: [u8; 32] = payload[0..32].try_into().unwrap();
    let version = u16::from_be_bytes([payload[32], payload[33]]);
    ProgramId::decode(&name, version)
}

fn reset_controller(state: &mut SwcState) -> Result<(), SwcError> {
    let cwd = std::env::current_dir()?;
    for entry in std::fs::read_dir(&cwd)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(entry.path())?;
        }
    }
    state.hwc_type = 0;
    Ok(())
}

fn dispatch_program_reply(state: &mut SwcState, uart: &mut File) -> Result<(), SwcError> {
    let command = {
        let program = state.program.as_mut().unwrap();
        codec::decode(&mut program.reply_pipe_r)
    };
    let command = match command {
        Ok(c) => c,
        Err(crate::error::CodecError::UnknownOpcode(op)) => {
            warn!("dropping unknown opcode {op} from program reply pipe");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let program = state.program.as_mut().unwrap();
    match mediator::handle_program_command(command, program, &mut state.pending_reply) {
        MediatorAction::ReplyToProgram(reply) => {
            let mut buf = Vec::new();
            codec::encode(&reply, &mut buf)?;
            program.in_pipe_w.write_all(&buf)?;
        }
        MediatorAction::ForwardToUart(cmd) => write_uart(uart, &cmd)?,
    }
    Ok(())
}

fn dispatch_program_stdout(state: &mut SwcState, uart: &mut File) -> Result<(), SwcError> {
    let program = state.program.as_mut().unwrap();
    let mut byte = [0u8; 1];
    let mut line = Vec::new();
    loop {
        let n = program.stdout_pipe_r.read(&mut byte)?;
        if n == 0 {
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    if line.is_empty() {
        return Ok(());
    }
    let cmd = mediator::wrap_printout(program, &line);
    write_uart(uart, &cmd)
}

fn dispatch_debugger_stdout(
    state: &mut SwcState,
    uart: &mut File,
    scanner: &mut Scanner,
) -> Result<(), SwcError> {
    let mut byte = [0u8; 1];
    let mut line = String::new();
    loop {
        let n = state.debugger.out_r.read(&mut byte)?;
        if n == 0 {
            return Ok(());
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0] as char);
    }

    let id = match &state.program {
        Some(p) => p.id.clone(),
        None => return Ok(()),
    };

    match scanner.feed_line(&line, &mut state.debugger, &id)? {
        DebuggerEvent::None => Ok(()),
        DebuggerEvent::Inject(text) => {
            state.debugger.cmd_w.write_all(text.as_bytes())?;
            Ok(())
        }
        DebuggerEvent::Emit(cmd) => write_uart(uart, &cmd),
    }
}

/// Reads one `\n`-terminated line from stdin: whitespace-separated decimal
/// byte values, first value the opcode. A recognized opcode is run through
/// the codec, so a Variable-class payload gets chunked and a Fixed-class one
/// gets length-checked; an unrecognized opcode is written through raw.
fn dispatch_stdin(uart: &mut File, stdin: &mut File) -> Result<(), SwcError> {
    let mut byte = [0u8; 1];
    let mut line = String::new();
    loop {
        let n = stdin.read(&mut byte)?;
        if n == 0 {
            return Ok(());
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0] as char);
    }

    let bytes: Vec<u8> = line
        .split_whitespace()
        .filter_map(|tok| tok.parse::<u8>().ok())
        .collect();
    let Some(&opcode) = bytes.first() else {
        return Ok(());
    };
    if matches!(crate::opcode::payload_class(opcode), crate::opcode::PayloadClass::Unknown) {
        uart.write_all(&bytes)?;
        return Ok(());
    }
    write_uart(uart, &Command::new(opcode, bytes[1..].to_vec()))
}

/// Writes a command to the UART. The UART is the sole communication channel
/// with the HLC/HWC; per spec.md §5 a partial frame would corrupt the
/// stream, so any I/O error here is fatal and propagates out of `run`.
fn write_uart(uart: &mut File, command: &Command) -> Result<(), SwcError> {
    let mut buf = Vec::new();
    codec::encode(command, &mut buf)?;
    uart.write_all(&buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Pipe;
    use crate::state::DebuggerState;

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

    #[test]
    fn dispatch_stdin_runs_known_opcode_through_codec() {
        let Pipe { read: mut uart_r, write: mut uart_w } = crate::process::pipe().unwrap();
        let Pipe { read: mut stdin_r, write: mut stdin_w } = crate::process::pipe().unwrap();

        // opcode 150 (PROGRAM_COMPILE_REQUEST) is Variable-class; a raw write
        // of these bytes would omit the chunk-length byte the codec inserts.
        stdin_w.write_all(b"150 65 66\n").unwrap();
        dispatch_stdin(&mut uart_w, &mut stdin_r).unwrap();
        drop(uart_w);

        let mut buf = [0u8; 16];
        let n = uart_r.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[PROGRAM_COMPILE_REQUEST, 2, 65, 66]);
    }

    #[test]
    fn dispatch_stdin_writes_unknown_opcode_raw() {
        let Pipe { read: mut uart_r, write: mut uart_w } = crate::process::pipe().unwrap();
        let Pipe { read: mut stdin_r, write: mut stdin_w } = crate::process::pipe().unwrap();

        // opcode 1 is unassigned; nothing should be dropped, and no codec
        // framing (length byte) should be inserted.
        stdin_w.write_all(b"1 2 3\n").unwrap();
        dispatch_stdin(&mut uart_w, &mut stdin_r).unwrap();
        drop(uart_w);

        let mut buf = [0u8; 16];
        let n = uart_r.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
    }

    #[test]
    fn handle_restart_pending_without_last_program_id_clears_flag() {
        let mut state = SwcState::new(debugger_state());
        state.restart_pending = true;
        let Pipe { read: mut uart_r, write: mut uart_w } = crate::process::pipe().unwrap();

        handle_restart_pending(&mut state, &Config::default(), &mut uart_w).unwrap();

        assert!(!state.restart_pending);
        drop(uart_w);
        let mut buf = [0u8; 1];
        assert_eq!(uart_r.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn handle_restart_pending_reports_not_found_for_missing_binary() {
        let mut state = SwcState::new(debugger_state());
        state.restart_pending = true;
        state.last_program_id = Some(ProgramId {
            name: "no-such-program".to_string(),
            version: 1,
        });
        let Pipe { read: mut uart_r, write: mut uart_w } = crate::process::pipe().unwrap();

        handle_restart_pending(&mut state, &Config::default(), &mut uart_w).unwrap();

        assert!(!state.restart_pending);
        drop(uart_w);
        let mut buf = [0u8; 16];
        let n = uart_r.read(&mut buf).unwrap();
        assert_eq!(
            &buf[..n],
            &[ERROR_ACTION, ERRORCODE_PROGRAM_NOT_FOUND, EXECUTION_RESTART_ACTION]
        );
    }
}
