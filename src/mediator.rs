//! Translates commands arriving on the running program's reply pipe into
//! UART traffic, or answers them locally when they're purely local queries
//! (custom-data buffer size/contents).
//!
//! Grounded on `uprog_cmd_received` in the original source.

use crate::codec::Command;
use crate::opcode::*;
use crate::state::{PendingReply, ProgramId, RunningProgram};

/// What the caller should do with a command the mediator has processed.
pub enum MediatorAction {
    /// Write this command straight back to the program's input pipe (a
    /// local answer that never touches the UART).
    ReplyToProgram(Command),
    /// Forward this command to the UART unchanged.
    ForwardToUart(Command),
}

/// Processes one command read from the program's reply pipe.
pub fn handle_program_command(
    command: Command,
    program: &mut RunningProgram,
    pending_reply: &mut Option<PendingReply>,
) -> MediatorAction {
    match command.opcode {
        CUSTOM_DATA_AVAILABLE_REQUEST => {
            let size = program.custom_data_buffer.available() as u32;
            MediatorAction::ReplyToProgram(Command::new(
                CUSTOM_DATA_AVAILABLE_REPLY,
                size.to_be_bytes().to_vec(),
            ))
        }
        READ_CUSTOM_DATA_REQUEST => {
            let size = u32::from_be_bytes(command.payload[..4].try_into().unwrap()) as usize;
            let mut payload = Vec::with_capacity(size);
            for _ in 0..size {
                payload.push(program.custom_data_buffer.read().unwrap_or(0));
            }
            MediatorAction::ReplyToProgram(Command::new(READ_CUSTOM_DATA_REPLY, payload))
        }
        SEND_CUSTOM_DATA_ACTION => {
            let wrapped = wrap_with_program_identity(
                EXECUTION_DATA_ACTION,
                &program.id,
                &command.payload,
            );
            MediatorAction::ForwardToUart(wrapped)
        }
        ANALOG_SENSOR_REQUEST | DIGITAL_SENSOR_REQUEST | MOTOR_POSITION_REQUEST
        | MOTOR_VELOCITY_REQUEST => {
            let expected_opcode = reply_opcode_for(command.opcode);
            *pending_reply = Some(PendingReply {
                expected_opcode,
                expected_port: command.payload.first().copied(),
            });
            MediatorAction::ForwardToUart(command)
        }
        CONTROLLER_BATTERY_CHARGE_REQUEST
        | CONTROLLER_BATTERY_CHARGING_STATE_REQUEST
        | PHONE_BATTERY_CHARGE_REQUEST
        | PHONE_BATTERY_CHARGING_STATE_REQUEST => {
            let expected_opcode = reply_opcode_for(command.opcode);
            *pending_reply = Some(PendingReply {
                expected_opcode,
                expected_port: None,
            });
            MediatorAction::ForwardToUart(command)
        }
        _ => MediatorAction::ForwardToUart(command),
    }
}

/// Wraps a running program's stdout/stderr text into an
/// `EXECUTION_PRINTOUT_ACTION`, carrying its identity ahead of the payload.
pub fn wrap_printout(program: &RunningProgram, text: &[u8]) -> Command {
    wrap_with_program_identity(EXECUTION_PRINTOUT_ACTION, &program.id, text)
}

fn wrap_with_program_identity(opcode: u8, id: &ProgramId, body: &[u8]) -> Command {
    let mut payload = Vec::with_capacity(34 + body.len());
    payload.extend_from_slice(&id.encode_name());
    payload.extend_from_slice(&id.version.to_be_bytes());
    payload.extend_from_slice(body);
    Command::new(opcode, payload)
}

fn reply_opcode_for(request_opcode: u8) -> u8 {
    match request_opcode {
        ANALOG_SENSOR_REQUEST => ANALOG_SENSOR_REPLY,
        DIGITAL_SENSOR_REQUEST => DIGITAL_SENSOR_REPLY,
        MOTOR_POSITION_REQUEST => MOTOR_POSITION_REPLY,
        MOTOR_VELOCITY_REQUEST => MOTOR_VELOCITY_REPLY,
        CONTROLLER_BATTERY_CHARGE_REQUEST => CONTROLLER_BATTERY_CHARGE_REPLY,
        CONTROLLER_BATTERY_CHARGING_STATE_REQUEST => CONTROLLER_BATTERY_CHARGING_STATE_REPLY,
        PHONE_BATTERY_CHARGE_REQUEST => PHONE_BATTERY_CHARGE_REPLY,
        PHONE_BATTERY_CHARGING_STATE_REQUEST => PHONE_BATTERY_CHARGING_STATE_REPLY,
        other => other,
    }
}

/// Forwards a matching HWC reply on to the program, clearing the pending
/// correlation. Returns `true` if `command` matched and was forwarded.
pub fn try_forward_reply_to_program(
    command: &Command,
    pending_reply: &mut Option<PendingReply>,
) -> bool {
    let Some(pending) = *pending_reply else {
        return false;
    };
    if command.opcode != pending.expected_opcode {
        return false;
    }
    if let Some(port) = pending.expected_port {
        if command.payload.first() != Some(&port) {
            return false;
        }
    }
    *pending_reply = None;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Pipe;
    use crate::ringbuffer::RingBuffer;

    fn dummy_program() -> RunningProgram {
        let Pipe { read: reply_pipe_r, write: in_pipe_w } = crate::process::pipe().unwrap();
        let Pipe { read: stdout_pipe_r, write: _ } = crate::process::pipe().unwrap();
        RunningProgram {
            id: ProgramId {
                name: "follower".to_string(),
                version: 1,
            },
            pid: 1,
            in_pipe_w,
            reply_pipe_r,
            stdout_pipe_r,
            custom_data_buffer: RingBuffer::new(8),
        }
    }

    #[test]
    fn custom_data_available_reports_ring_buffer_size() {
        let mut program = dummy_program();
        program.custom_data_buffer.append(1).unwrap();
        program.custom_data_buffer.append(2).unwrap();
        let mut pending = None;
        let action = handle_program_command(
            Command::new(CUSTOM_DATA_AVAILABLE_REQUEST, vec![]),
            &mut program,
            &mut pending,
        );
        match action {
            MediatorAction::ReplyToProgram(cmd) => {
                assert_eq!(cmd.opcode, CUSTOM_DATA_AVAILABLE_REPLY);
                assert_eq!(cmd.payload, 2u32.to_be_bytes().to_vec());
            }
            _ => panic!("expected a local reply"),
        }
    }

    #[test]
    fn read_custom_data_pads_with_zero_when_underfilled() {
        let mut program = dummy_program();
        program.custom_data_buffer.append(9).unwrap();
        let mut pending = None;
        let request = Command::new(READ_CUSTOM_DATA_REQUEST, 3u32.to_be_bytes().to_vec());
        let action = handle_program_command(request, &mut program, &mut pending);
        match action {
            MediatorAction::ReplyToProgram(cmd) => {
                assert_eq!(cmd.opcode, READ_CUSTOM_DATA_REPLY);
                assert_eq!(cmd.payload, vec![9, 0, 0]);
            }
            _ => panic!("expected a local reply"),
        }
    }

    #[test]
    fn send_custom_data_wraps_with_identity_and_forwards() {
        let mut program = dummy_program();
        let mut pending = None;
        let action = handle_program_command(
            Command::new(SEND_CUSTOM_DATA_ACTION, vec![1, 2, 3]),
            &mut program,
            &mut pending,
        );
        match action {
            MediatorAction::ForwardToUart(cmd) => {
                assert_eq!(cmd.opcode, EXECUTION_DATA_ACTION);
                assert_eq!(&cmd.payload[34..], &[1, 2, 3]);
            }
            _ => panic!("expected a UART forward"),
        }
    }

    #[test]
    fn sensor_request_sets_pending_reply_and_forwards_verbatim() {
        let mut program = dummy_program();
        let mut pending = None;
        let action = handle_program_command(
            Command::new(ANALOG_SENSOR_REQUEST, vec![4]),
            &mut program,
            &mut pending,
        );
        assert_eq!(
            pending,
            Some(PendingReply {
                expected_opcode: ANALOG_SENSOR_REPLY,
                expected_port: Some(4)
            })
        );
        match action {
            MediatorAction::ForwardToUart(cmd) => assert_eq!(cmd.opcode, ANALOG_SENSOR_REQUEST),
            _ => panic!("expected a UART forward"),
        }
    }

    #[test]
    fn matching_reply_clears_pending_and_forwards() {
        let mut pending = Some(PendingReply {
            expected_opcode: ANALOG_SENSOR_REPLY,
            expected_port: Some(4),
        });
        let reply = Command::new(ANALOG_SENSOR_REPLY, vec![4, 0, 1]);
        assert!(try_forward_reply_to_program(&reply, &mut pending));
        assert_eq!(pending, None);
    }

    #[test]
    fn mismatched_port_does_not_clear_pending() {
        let mut pending = Some(PendingReply {
            expected_opcode: ANALOG_SENSOR_REPLY,
            expected_port: Some(4),
        });
        let reply = Command::new(ANALOG_SENSOR_REPLY, vec![5, 0, 1]);
        assert!(!try_forward_reply_to_program(&reply, &mut pending));
        assert!(pending.is_some());
    }
}
