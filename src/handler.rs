//! HLC command dispatch (§4.D): the request/reply semantics of each
//! UART-originated opcode.
//!
//! Grounded on `uart_cmd_received` in the original source. Each arm returns
//! the UART-bound commands the caller should write, in order; state
//! mutation happens here but I/O against the UART itself is left to the
//! caller so this module stays testable against a plain `Vec<Command>`.

use std::io::Write;

use log::{info, warn};

use crate::codec::Command;
use crate::config::Config;
use crate::opcode::*;
use crate::program::{self, ExecuteError};
use crate::state::{ProgramId, SwcState};

/// Builds an `ERROR_ACTION(code, causing_opcode)` reply.
fn error_action(code: u8, causing_opcode: u8) -> Command {
    Command::new(ERROR_ACTION, vec![code, causing_opcode])
}

fn decode_id(payload: &[u8]) -> ProgramId {
    let name: [u8; 32] = payload[0..32].try_into().unwrap();
    let version = u16::from_be_bytes([payload[32], payload[33]]);
    ProgramId::decode(&name, version)
}

fn execution_event(opcode: u8, id: &ProgramId) -> Command {
    let mut payload = Vec::with_capacity(34);
    payload.extend_from_slice(&id.encode_name());
    payload.extend_from_slice(&id.version.to_be_bytes());
    Command::new(opcode, payload)
}

/// Dispatches one decoded UART command, mutating `state` and returning the
/// commands to write back to the UART, in order.
pub fn handle_uart_command(
    state: &mut SwcState,
    config: &Config,
    command: Command,
) -> Result<Vec<Command>, crate::error::SwcError> {
    match command.opcode {
        HW_CONTROLLER_TYPE_REPLY => {
            state.hwc_type = command.payload[0];
            Ok(vec![])
        }

        SW_CONTROLLER_TYPE_REQUEST => Ok(vec![Command::new(SW_CONTROLLER_TYPE_REPLY, vec![1])]),

        PROGRAM_COMPILE_REQUEST => Ok(handle_compile(state, config, &command, PROGRAM_COMPILE_REPLY)?.0),

        PROGRAM_EXECUTE_ACTION => Ok(handle_execute(state, config, &command, PROGRAM_EXECUTE_ACTION)?),

        PROGRAM_COMPILE_EXECUTE_REQUEST => {
            let (mut out, ok) =
                handle_compile(state, config, &command, PROGRAM_COMPILE_EXECUTE_REPLY)?;
            if ok {
                out.extend(handle_execute(state, config, &command, PROGRAM_COMPILE_EXECUTE_REQUEST)?);
            }
            Ok(out)
        }

        PROGRAMS_FETCH_SUBSCRIPTION => {
            let mut out = Vec::new();
            for id in program::list_programs()? {
                let source = program::read_source_body(&id)?;
                let mut payload = Vec::with_capacity(34 + source.len());
                payload.extend_from_slice(&id.encode_name());
                payload.extend_from_slice(&id.version.to_be_bytes());
                payload.extend_from_slice(&source);
                out.push(Command::new(PROGRAMS_FETCH_UPDATE, payload));
            }
            out.push(Command::new(PROGRAMS_FETCH_DONE_UPDATE, vec![]));
            Ok(out)
        }

        EXECUTION_STOP_ACTION => {
            let Some(program) = &state.program else {
                return Ok(vec![error_action(
                    ERRORCODE_PROGRAM_IS_NOT_RUNNING,
                    EXECUTION_STOP_ACTION,
                )]);
            };
            if state.debugger.breaked {
                state.debugger.cmd_w.write_all(b"signal SIGTERM\n")?;
            } else {
                crate::process::send_signal(program.pid, libc::SIGTERM)?;
            }
            Ok(vec![])
        }

        EXECUTION_RESTART_ACTION => {
            let Some(program) = &state.program else {
                let Some(id) = state.last_program_id.clone() else {
                    return Ok(vec![error_action(
                        ERRORCODE_PROGRAM_NOT_FOUND,
                        EXECUTION_RESTART_ACTION,
                    )]);
                };
                return handle_execute_id(state, config, &id, EXECUTION_RESTART_ACTION);
            };
            crate::process::send_signal(program.pid, libc::SIGTERM)?;
            state.restart_pending = true;
            Ok(vec![])
        }

        EXECUTION_DATA_ACTION => {
            let Some(program) = &mut state.program else {
                return Ok(vec![error_action(
                    ERRORCODE_PROGRAM_IS_NOT_RUNNING,
                    EXECUTION_DATA_ACTION,
                )]);
            };
            let data = &command.payload[34..];
            for (i, &byte) in data.iter().enumerate() {
                if program.custom_data_buffer.append(byte).is_err() {
                    warn!(
                        "custom-data buffer full, dropping {} of {} bytes",
                        data.len() - i,
                        data.len()
                    );
                    break;
                }
            }
            Ok(vec![])
        }

        DEBUGGING_BREAK_ACTION => {
            let Some(program) = &state.program else {
                return Ok(vec![error_action(
                    ERRORCODE_PROGRAM_IS_NOT_RUNNING,
                    DEBUGGING_BREAK_ACTION,
                )]);
            };
            if !state.debugger.attached {
                write!(state.debugger.cmd_w, "attach {}\n", program.pid)?;
                state.debugger.attached = true;
                state.debugger.breaked = true;
            } else {
                crate::process::send_signal(program.pid, libc::SIGINT)?;
                state.debugger.breaked = true;
            }
            Ok(vec![])
        }

        DEBUGGING_CONTINUE_ACTION => {
            if state.program.is_none() {
                return Ok(vec![error_action(
                    ERRORCODE_PROGRAM_IS_NOT_RUNNING,
                    DEBUGGING_CONTINUE_ACTION,
                )]);
            }
            if !state.debugger.breaked {
                return Ok(vec![error_action(
                    ERRORCODE_PROGRAM_IS_NOT_BREAKED,
                    DEBUGGING_CONTINUE_ACTION,
                )]);
            }
            state.debugger.cmd_w.write_all(b"continue\n")?;
            state.debugger.breaked = false;
            Ok(vec![])
        }

        DEBUGGING_ADD_BREAKPOINT_ACTION | DEBUGGING_REMOVE_BREAKPOINT_ACTION => {
            if state.program.is_none() {
                return Ok(vec![error_action(
                    ERRORCODE_PROGRAM_IS_NOT_RUNNING,
                    command.opcode,
                )]);
            }
            if !state.debugger.breaked {
                return Ok(vec![error_action(
                    ERRORCODE_PROGRAM_IS_NOT_BREAKED,
                    command.opcode,
                )]);
            }
            let requested_line = u16::from_be_bytes([command.payload[34], command.payload[35]]);
            let effective_line = requested_line + 3;
            if command.opcode == DEBUGGING_ADD_BREAKPOINT_ACTION {
                write!(
                    state.debugger.cmd_w,
                    "echo _Hedgehog_:ignore\\n\nbreak {effective_line}\necho _Hedgehog_\\n\n"
                )?;
            } else {
                write!(state.debugger.cmd_w, "clear {effective_line}\n")?;
            }
            Ok(vec![])
        }

        ERROR_ACTION => {
            warn!(
                "HLC reported ERROR_ACTION code={} causing_opcode={}",
                command.payload[0], command.payload[1]
            );
            Ok(vec![])
        }

        _ => {
            info!("ignoring UART opcode {} with no handler arm", command.opcode);
            Ok(vec![])
        }
    }
}

/// Runs §4.D.1. Returns the UART-bound replies plus whether compilation (and
/// link) succeeded, so `PROGRAM_COMPILE_EXECUTE_REQUEST` can gate the
/// subsequent execute step on it.
fn handle_compile(
    state: &mut SwcState,
    config: &Config,
    command: &Command,
    reply_opcode: u8,
) -> Result<(Vec<Command>, bool), crate::error::SwcError> {
    if state.hwc_type == 0 {
        return Ok((
            vec![
                Command::new(HW_CONTROLLER_TYPE_REQUEST, vec![]),
                error_action(ERRORCODE_NO_HW_CONTROLLER_CONNECTED, command.opcode),
            ],
            false,
        ));
    }

    let id = decode_id(&command.payload);
    let source = &command.payload[34..];
    let result = program::compile(config, state.hwc_type, &id, source)?;

    let mut payload = Vec::with_capacity(35 + result.diagnostics.len());
    payload.extend_from_slice(&id.encode_name());
    payload.extend_from_slice(&id.version.to_be_bytes());
    payload.push(if result.ok { 0 } else { 1 });
    payload.extend_from_slice(&result.diagnostics);

    Ok((vec![Command::new(reply_opcode, payload)], result.ok))
}

/// Runs §4.D.2, translating `ExecuteError` into the matching `ERROR_ACTION`.
fn handle_execute(
    state: &mut SwcState,
    config: &Config,
    command: &Command,
    causing_opcode: u8,
) -> Result<Vec<Command>, crate::error::SwcError> {
    let id = decode_id(&command.payload);
    handle_execute_id(state, config, &id, causing_opcode)
}

/// Executes a program by identity, translating `ExecuteError` into the
/// matching `ERROR_ACTION`. Shared by `PROGRAM_EXECUTE_ACTION`/
/// `PROGRAM_COMPILE_EXECUTE_REQUEST` (identity from the command payload) and
/// the immediate `EXECUTION_RESTART_ACTION` path (identity from
/// `state.last_program_id`).
fn handle_execute_id(
    state: &mut SwcState,
    config: &Config,
    id: &ProgramId,
    causing_opcode: u8,
) -> Result<Vec<Command>, crate::error::SwcError> {
    if state.program.is_some() {
        return Ok(vec![error_action(
            ERRORCODE_PROGRAM_ALREADY_RUNNING,
            causing_opcode,
        )]);
    }

    match program::execute(config, id, &mut state.debugger.cmd_w) {
        Ok(running) => {
            let reply = execution_event(EXECUTION_STARTED_ACTION, &running.id);
            state.program = Some(running);
            Ok(vec![reply])
        }
        Err(ExecuteError::AlreadyRunning) => Ok(vec![error_action(
            ERRORCODE_PROGRAM_ALREADY_RUNNING,
            causing_opcode,
        )]),
        Err(ExecuteError::NotFound) => Ok(vec![error_action(
            ERRORCODE_PROGRAM_NOT_FOUND,
            causing_opcode,
        )]),
        Err(ExecuteError::Io(e)) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Pipe;
    use crate::state::DebuggerState;

    fn state() -> SwcState {
        let Pipe { read: out_r, write: cmd_w } = crate::process::pipe().unwrap();
        SwcState::new(DebuggerState {
            pid: 1,
            cmd_w,
            out_r,
            attached: false,
            breaked: false,
        })
    }

    #[test]
    fn sw_controller_type_request_replies_with_constant_tag() {
        let mut s = state();
        let out = handle_uart_command(
            &mut s,
            &Config::default(),
            Command::new(SW_CONTROLLER_TYPE_REQUEST, vec![]),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].opcode, SW_CONTROLLER_TYPE_REPLY);
        assert_eq!(out[0].payload, vec![1]);
    }

    #[test]
    fn hw_controller_type_reply_updates_state() {
        let mut s = state();
        let out = handle_uart_command(
            &mut s,
            &Config::default(),
            Command::new(HW_CONTROLLER_TYPE_REPLY, vec![3]),
        )
        .unwrap();
        assert!(out.is_empty());
        assert_eq!(s.hwc_type, 3);
    }

    #[test]
    fn compile_without_hw_controller_probes_and_errors() {
        let mut s = state();
        let mut payload = vec![b' '; 32];
        payload[0..4].copy_from_slice(b"prog");
        payload.extend_from_slice(&1u16.to_be_bytes());
        payload.extend_from_slice(b"int main(){return 0;}\n");
        let out = handle_uart_command(
            &mut s,
            &Config::default(),
            Command::new(PROGRAM_COMPILE_REQUEST, payload),
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].opcode, HW_CONTROLLER_TYPE_REQUEST);
        assert_eq!(out[1].opcode, ERROR_ACTION);
        assert_eq!(
            out[1].payload,
            vec![ERRORCODE_NO_HW_CONTROLLER_CONNECTED, PROGRAM_COMPILE_REQUEST]
        );
    }

    #[test]
    fn execute_without_running_program_reports_not_found() {
        let mut s = state();
        let mut payload = vec![b' '; 32];
        payload[0..7].copy_from_slice(b"nothere");
        payload.extend_from_slice(&1u16.to_be_bytes());
        let out = handle_uart_command(
            &mut s,
            &Config::default(),
            Command::new(PROGRAM_EXECUTE_ACTION, payload),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].opcode, ERROR_ACTION);
        assert_eq!(
            out[0].payload,
            vec![ERRORCODE_PROGRAM_NOT_FOUND, PROGRAM_EXECUTE_ACTION]
        );
    }

    #[test]
    fn stop_without_running_program_reports_not_running() {
        let mut s = state();
        let out = handle_uart_command(
            &mut s,
            &Config::default(),
            Command::new(EXECUTION_STOP_ACTION, vec![b' '; 34]),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].opcode, ERROR_ACTION);
        assert_eq!(
            out[0].payload,
            vec![ERRORCODE_PROGRAM_IS_NOT_RUNNING, EXECUTION_STOP_ACTION]
        );
    }

    #[test]
    fn restart_without_running_program_uses_last_program_id() {
        let mut s = state();
        s.last_program_id = Some(ProgramId {
            name: "nothere".to_string(),
            version: 1,
        });
        // The command's own payload is all spaces (no identity), so a pass
        // is only possible if this branch looked up `last_program_id`
        // instead of decoding the restart command's payload.
        let out = handle_uart_command(
            &mut s,
            &Config::default(),
            Command::new(EXECUTION_RESTART_ACTION, vec![b' '; 34]),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].opcode, ERROR_ACTION);
        assert_eq!(
            out[0].payload,
            vec![ERRORCODE_PROGRAM_NOT_FOUND, EXECUTION_RESTART_ACTION]
        );
    }

    #[test]
    fn restart_without_running_program_or_last_id_reports_not_found() {
        let mut s = state();
        let out = handle_uart_command(
            &mut s,
            &Config::default(),
            Command::new(EXECUTION_RESTART_ACTION, vec![b' '; 34]),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].opcode, ERROR_ACTION);
        assert_eq!(
            out[0].payload,
            vec![ERRORCODE_PROGRAM_NOT_FOUND, EXECUTION_RESTART_ACTION]
        );
    }

    #[test]
    fn debugging_continue_requires_breaked() {
        let mut s = state();
        let Pipe { read: reply_pipe_r, write: in_pipe_w } = crate::process::pipe().unwrap();
        let Pipe { read: stdout_pipe_r, write: _ } = crate::process::pipe().unwrap();
        s.program = Some(crate::state::RunningProgram {
            id: ProgramId { name: "prog".to_string(), version: 1 },
            pid: 1,
            in_pipe_w,
            reply_pipe_r,
            stdout_pipe_r,
            custom_data_buffer: crate::ringbuffer::RingBuffer::new(8),
        });
        let out = handle_uart_command(
            &mut s,
            &Config::default(),
            Command::new(DEBUGGING_CONTINUE_ACTION, vec![b' '; 34]),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].opcode, ERROR_ACTION);
        assert_eq!(
            out[0].payload,
            vec![ERRORCODE_PROGRAM_IS_NOT_BREAKED, DEBUGGING_CONTINUE_ACTION]
        );
    }
}
