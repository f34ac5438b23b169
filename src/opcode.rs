//! AXCP opcode table: the closed enumeration of wire opcodes and the total
//! function mapping each one to its payload length class.
//!
//! Mirrors `axcp.h`'s `#define`s and `axcp.c`'s `payloadLength()` switch.

/// How many payload bytes follow an opcode on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadClass {
    /// Exactly `n` bytes follow, always.
    Fixed(u8),
    /// A length-prefixed chunk sequence follows (see `crate::codec`).
    Variable,
    /// The opcode is not in the table.
    Unknown,
}

// Opcode constants, numeric values per spec.md §6 / axcp.h.
pub const NOP: u8 = 0;
pub const NOP2: u8 = 248;

pub const SEND_CUSTOM_DATA_ACTION: u8 = 5;
pub const CUSTOM_DATA_AVAILABLE_REQUEST: u8 = 6;
pub const CUSTOM_DATA_AVAILABLE_REPLY: u8 = 7;
pub const READ_CUSTOM_DATA_REQUEST: u8 = 8;
pub const READ_CUSTOM_DATA_REPLY: u8 = 9;

pub const ANALOG_SENSOR_REQUEST: u8 = 10;
pub const ANALOG_SENSOR_REPLY: u8 = 11;
pub const ANALOG_SENSOR_SUBSCRIPTION: u8 = 12;
pub const ANALOG_SENSOR_UPDATE: u8 = 13;
pub const ANALOG_PULLUP_ACTION: u8 = 14;

pub const DIGITAL_SENSOR_REQUEST: u8 = 20;
pub const DIGITAL_SENSOR_REPLY: u8 = 21;
pub const DIGITAL_SENSOR_SUBSCRIPTION: u8 = 22;
pub const DIGITAL_SENSOR_UPDATE: u8 = 23;
pub const DIGITAL_PULLUP_ACTION: u8 = 24;
pub const DIGITAL_OUTPUT_MODE_ACTION: u8 = 25;
pub const DIGITAL_OUTPUT_LEVEL_ACTION: u8 = 26;

pub const MOTOR_POWER_ACTION: u8 = 30;
pub const MOTOR_VELOCITY_ACTION: u8 = 31;
pub const MOTOR_POWER_ABSOLUTE_POSITION_ACTION: u8 = 32;
pub const MOTOR_VELOCITY_ABSOLUTE_POSITION_ACTION: u8 = 33;
pub const MOTOR_POWER_RELATIVE_POSITION_ACTION: u8 = 34;
pub const MOTOR_VELOCITY_RELATIVE_POSITION_ACTION: u8 = 35;
pub const MOTOR_FREEZE_ACTION: u8 = 36;
pub const MOTOR_BRAKE_ACTION: u8 = 37;
pub const MOTOR_OFF_ACTION: u8 = 38;
pub const MOTOR_POSITION_REQUEST: u8 = 40;
pub const MOTOR_POSITION_REPLY: u8 = 41;
pub const MOTOR_POSITION_REACHED_ACTION: u8 = 42;
pub const MOTOR_POSITION_SUBSCRIPTION: u8 = 43;
pub const MOTOR_POSITION_UPDATE: u8 = 44;
pub const MOTOR_CLEAR_POSITION_ACTION: u8 = 45;
pub const MOTOR_VELOCITY_REQUEST: u8 = 46;
pub const MOTOR_VELOCITY_REPLY: u8 = 47;
pub const MOTOR_VELOCITY_SUBSCRIPTION: u8 = 48;
pub const MOTOR_VELOCITY_UPDATE: u8 = 49;

pub const SERVO_ONOFF_ACTION: u8 = 50;
pub const SERVO_DRIVE_ACTION: u8 = 51;

pub const CONTROLLER_BATTERY_CHARGE_REQUEST: u8 = 60;
pub const CONTROLLER_BATTERY_CHARGE_REPLY: u8 = 61;
pub const CONTROLLER_BATTERY_CHARGING_STATE_REQUEST: u8 = 62;
pub const CONTROLLER_BATTERY_CHARGING_STATE_REPLY: u8 = 63;
pub const PHONE_BATTERY_CHARGE_REQUEST: u8 = 64;
pub const PHONE_BATTERY_CHARGE_REPLY: u8 = 65;
pub const PHONE_BATTERY_CHARGING_STATE_REQUEST: u8 = 66;
pub const PHONE_BATTERY_CHARGING_STATE_REPLY: u8 = 67;
pub const CONTROLLER_BATTERY_UPDATE: u8 = 68;

pub const PHONE_SENSOR_REQUEST: u8 = 70;
pub const PHONE_SENSOR_REPLY: u8 = 71;
pub const PHONE_SENSOR_AVAILABILITY_REQUEST: u8 = 72;
pub const PHONE_SENSOR_AVAILABILITY_REPLY: u8 = 73;
pub const PHONE_CAMERA_TAKE_PICTURE_ACTION: u8 = 80;
pub const PHONE_CAMERA_GET_BLOB_COUNT_REQUEST: u8 = 81;
pub const PHONE_CAMERA_GET_BLOB_COUNT_REPLY: u8 = 82;
pub const PHONE_CAMERA_GET_BLOB_REQUEST: u8 = 83;
pub const PHONE_CAMERA_GET_BLOB_REPLY: u8 = 84;
pub const PHONE_CAMERA_SET_CHANNEL_ACTION: u8 = 85;

pub const HW_CONTROLLER_OFF_ACTION: u8 = 90;
pub const HW_CONTROLLER_RESET_ACTION: u8 = 91;
pub const SW_CONTROLLER_OFF_ACTION: u8 = 92;
pub const SW_CONTROLLER_RESET_ACTION: u8 = 93;
pub const PHONE_OFF_ACTION: u8 = 94;
pub const PHONE_RESET_ACTION: u8 = 95;

pub const ERROR_ACTION: u8 = 96;
pub const CUSTOM_ACTION: u8 = 97;
pub const DEBUG_INFORMATION_UPDATE: u8 = 100;

pub const HW_CONTROLLER_TYPE_REQUEST: u8 = 110;
pub const HW_CONTROLLER_TYPE_REPLY: u8 = 111;
pub const SW_CONTROLLER_TYPE_REQUEST: u8 = 112;
pub const SW_CONTROLLER_TYPE_REPLY: u8 = 113;
pub const PHONE_TYPE_REQUEST: u8 = 114;
pub const PHONE_TYPE_REPLY: u8 = 115;
pub const HW_CONTROLLER_SET_MEMORY_ACTION: u8 = 116;

pub const ENVIRONMENT_SCAN_SUBSCRIPTION: u8 = 120;
pub const ENVIRONMENT_SCAN_HW_CONTROLLER_UPDATE: u8 = 121;
pub const ENVIRONMENT_SCAN_SW_CONTROLLER_UPDATE: u8 = 122;
pub const ENVIRONMENT_SCAN_PHONE_UPDATE: u8 = 123;

pub const CONTROLLER_AUTHENTICATE_REQUEST: u8 = 124;
pub const CONTROLLER_AUTHENTICATE_REPLY: u8 = 125;
pub const HW_CONTROLLER_GET_MEMORY_REQUEST: u8 = 126;
pub const HW_CONTROLLER_GET_MEMORY_REPLY: u8 = 127;

pub const PROGRAM_COMPILE_REQUEST: u8 = 150;
pub const PROGRAM_COMPILE_REPLY: u8 = 151;
pub const PROGRAM_EXECUTE_ACTION: u8 = 152;
pub const PROGRAM_COMPILE_EXECUTE_REQUEST: u8 = 153;
pub const PROGRAM_COMPILE_EXECUTE_REPLY: u8 = 154;
pub const PROGRAMS_FETCH_SUBSCRIPTION: u8 = 155;
pub const PROGRAMS_FETCH_UPDATE: u8 = 156;
pub const PROGRAMS_FETCH_DONE_UPDATE: u8 = 157;
pub const EXECUTION_STARTED_ACTION: u8 = 160;
pub const EXECUTION_STOP_ACTION: u8 = 161;
pub const EXECUTION_RESTART_ACTION: u8 = 162;
pub const EXECUTION_STOPPED_ACTION: u8 = 163;
pub const EXECUTION_DONE_ACTION: u8 = 164;
pub const EXECUTION_PRINTOUT_ACTION: u8 = 165;
pub const EXECUTION_DATA_ACTION: u8 = 166;

pub const DEBUGGING_BREAK_ACTION: u8 = 170;
pub const DEBUGGING_BREAKED_ACTION: u8 = 171;
pub const DEBUGGING_CONTINUE_ACTION: u8 = 172;
pub const DEBUGGING_ADD_BREAKPOINT_ACTION: u8 = 173;
pub const DEBUGGING_REMOVE_BREAKPOINT_ACTION: u8 = 174;

// Error codes, per spec.md §6.
pub const ERRORCODE_UNSPECIFIED_OPCODE: u8 = 1;
pub const ERRORCODE_ANALOG_PORT_OUT_OF_RANGE: u8 = 2;
pub const ERRORCODE_DIGITAL_PORT_OUT_OF_RANGE: u8 = 3;
pub const ERRORCODE_MOTOR_PORT_OUT_OF_RANGE: u8 = 4;
pub const ERRORCODE_SERVO_PORT_OUT_OF_RANGE: u8 = 5;
pub const ERRORCODE_SERVO_IS_OFF: u8 = 6;
pub const ERRORCODE_PHONE_SENSOR_TYPE_NOT_SUPPORTED: u8 = 7;
pub const ERRORCODE_PHONE_SENSOR_TYPE_DOES_NOT_EXIST: u8 = 8;
pub const ERRORCODE_CHANNEL_NOT_CONFIGURED: u8 = 9;
pub const ERRORCODE_NO_BLOB_AT_INDEX: u8 = 10;
pub const ERRORCODE_OPERATION_NOT_SUPPORTED: u8 = 11;
pub const ERRORCODE_PAYLOAD_LENGTH_OUT_OF_RANGE: u8 = 12;
pub const ERRORCODE_INCOMPLETE_COMMAND_TIMEOUT: u8 = 13;
pub const ERRORCODE_PROGRAM_NOT_FOUND: u8 = 150;
pub const ERRORCODE_PROGRAM_ALREADY_RUNNING: u8 = 151;
pub const ERRORCODE_NO_HW_CONTROLLER_CONNECTED: u8 = 152;
pub const ERRORCODE_PROGRAM_IS_NOT_RUNNING: u8 = 153;
pub const ERRORCODE_PROGRAM_IS_NOT_BREAKED: u8 = 154;
pub const ERRORCODE_UNSPECIFIED: u8 = 255;

/// Returns the payload length class for `opcode`. Total over all 256 byte values.
pub const fn payload_class(opcode: u8) -> PayloadClass {
    use PayloadClass::{Fixed, Unknown, Variable};
    match opcode {
        NOP => Fixed(0),
        NOP2 => Fixed(0),

        SEND_CUSTOM_DATA_ACTION => Variable,
        CUSTOM_DATA_AVAILABLE_REQUEST => Fixed(0),
        CUSTOM_DATA_AVAILABLE_REPLY => Fixed(4),
        READ_CUSTOM_DATA_REQUEST => Fixed(4),
        READ_CUSTOM_DATA_REPLY => Variable,

        ANALOG_SENSOR_REQUEST => Fixed(1),
        ANALOG_SENSOR_REPLY => Fixed(3),
        ANALOG_SENSOR_SUBSCRIPTION => Variable,
        ANALOG_SENSOR_UPDATE => Variable,
        ANALOG_PULLUP_ACTION => Variable,

        DIGITAL_SENSOR_REQUEST => Fixed(1),
        DIGITAL_SENSOR_REPLY => Fixed(2),
        DIGITAL_SENSOR_SUBSCRIPTION => Variable,
        DIGITAL_SENSOR_UPDATE => Variable,
        DIGITAL_PULLUP_ACTION => Variable,
        DIGITAL_OUTPUT_MODE_ACTION => Variable,
        DIGITAL_OUTPUT_LEVEL_ACTION => Fixed(2),

        MOTOR_POWER_ACTION => Fixed(3),
        MOTOR_VELOCITY_ACTION => Fixed(3),
        MOTOR_POWER_ABSOLUTE_POSITION_ACTION => Fixed(6),
        MOTOR_VELOCITY_ABSOLUTE_POSITION_ACTION => Fixed(6),
        MOTOR_POWER_RELATIVE_POSITION_ACTION => Fixed(6),
        MOTOR_VELOCITY_RELATIVE_POSITION_ACTION => Fixed(6),
        MOTOR_FREEZE_ACTION => Fixed(1),
        MOTOR_BRAKE_ACTION => Fixed(2),
        MOTOR_OFF_ACTION => Fixed(1),
        MOTOR_POSITION_REQUEST => Fixed(1),
        MOTOR_POSITION_REPLY => Fixed(5),
        MOTOR_POSITION_REACHED_ACTION => Fixed(1),
        MOTOR_POSITION_SUBSCRIPTION => Variable,
        MOTOR_POSITION_UPDATE => Variable,
        MOTOR_CLEAR_POSITION_ACTION => Fixed(1),
        MOTOR_VELOCITY_REQUEST => Fixed(1),
        MOTOR_VELOCITY_REPLY => Fixed(3),
        MOTOR_VELOCITY_SUBSCRIPTION => Variable,
        MOTOR_VELOCITY_UPDATE => Variable,

        SERVO_ONOFF_ACTION => Fixed(2),
        SERVO_DRIVE_ACTION => Fixed(2),

        CONTROLLER_BATTERY_CHARGE_REQUEST => Fixed(0),
        CONTROLLER_BATTERY_CHARGE_REPLY => Fixed(1),
        CONTROLLER_BATTERY_CHARGING_STATE_REQUEST => Fixed(0),
        CONTROLLER_BATTERY_CHARGING_STATE_REPLY => Fixed(1),
        PHONE_BATTERY_CHARGE_REQUEST => Fixed(0),
        PHONE_BATTERY_CHARGE_REPLY => Fixed(1),
        PHONE_BATTERY_CHARGING_STATE_REQUEST => Fixed(0),
        PHONE_BATTERY_CHARGING_STATE_REPLY => Fixed(1),
        CONTROLLER_BATTERY_UPDATE => Fixed(2),

        PHONE_SENSOR_REQUEST => Fixed(1),
        PHONE_SENSOR_REPLY => Variable,
        PHONE_SENSOR_AVAILABILITY_REQUEST => Fixed(0),
        PHONE_SENSOR_AVAILABILITY_REPLY => Fixed(4),
        PHONE_CAMERA_TAKE_PICTURE_ACTION => Fixed(0),
        PHONE_CAMERA_GET_BLOB_COUNT_REQUEST => Fixed(1),
        PHONE_CAMERA_GET_BLOB_COUNT_REPLY => Fixed(2),
        PHONE_CAMERA_GET_BLOB_REQUEST => Fixed(2),
        PHONE_CAMERA_GET_BLOB_REPLY => Fixed(10),
        PHONE_CAMERA_SET_CHANNEL_ACTION => Fixed(7),

        HW_CONTROLLER_OFF_ACTION => Fixed(0),
        HW_CONTROLLER_RESET_ACTION => Fixed(0),
        SW_CONTROLLER_OFF_ACTION => Fixed(0),
        SW_CONTROLLER_RESET_ACTION => Fixed(0),
        PHONE_OFF_ACTION => Fixed(0),
        PHONE_RESET_ACTION => Fixed(0),

        ERROR_ACTION => Fixed(2),
        CUSTOM_ACTION => Variable,
        DEBUG_INFORMATION_UPDATE => Variable,

        HW_CONTROLLER_TYPE_REQUEST => Fixed(0),
        HW_CONTROLLER_TYPE_REPLY => Fixed(1),
        SW_CONTROLLER_TYPE_REQUEST => Fixed(0),
        SW_CONTROLLER_TYPE_REPLY => Fixed(1),
        PHONE_TYPE_REQUEST => Fixed(0),
        PHONE_TYPE_REPLY => Fixed(1),
        HW_CONTROLLER_SET_MEMORY_ACTION => Variable,

        ENVIRONMENT_SCAN_SUBSCRIPTION => Fixed(0),
        ENVIRONMENT_SCAN_HW_CONTROLLER_UPDATE => Fixed(33),
        ENVIRONMENT_SCAN_SW_CONTROLLER_UPDATE => Fixed(1),
        ENVIRONMENT_SCAN_PHONE_UPDATE => Fixed(1),

        CONTROLLER_AUTHENTICATE_REQUEST => Variable,
        CONTROLLER_AUTHENTICATE_REPLY => Fixed(1),
        HW_CONTROLLER_GET_MEMORY_REQUEST => Fixed(1),
        HW_CONTROLLER_GET_MEMORY_REPLY => Variable,

        PROGRAM_COMPILE_REQUEST => Variable,
        PROGRAM_COMPILE_REPLY => Variable,
        PROGRAM_EXECUTE_ACTION => Fixed(34),
        PROGRAM_COMPILE_EXECUTE_REQUEST => Variable,
        PROGRAM_COMPILE_EXECUTE_REPLY => Variable,
        PROGRAMS_FETCH_SUBSCRIPTION => Fixed(0),
        PROGRAMS_FETCH_UPDATE => Variable,
        PROGRAMS_FETCH_DONE_UPDATE => Fixed(0),
        EXECUTION_STARTED_ACTION => Fixed(34),
        EXECUTION_STOP_ACTION => Fixed(34),
        EXECUTION_RESTART_ACTION => Fixed(34),
        EXECUTION_STOPPED_ACTION => Fixed(34),
        EXECUTION_DONE_ACTION => Fixed(38),
        EXECUTION_PRINTOUT_ACTION => Variable,
        EXECUTION_DATA_ACTION => Variable,

        DEBUGGING_BREAK_ACTION => Fixed(34),
        DEBUGGING_BREAKED_ACTION => Variable,
        DEBUGGING_CONTINUE_ACTION => Fixed(34),
        DEBUGGING_ADD_BREAKPOINT_ACTION => Fixed(36),
        DEBUGGING_REMOVE_BREAKPOINT_ACTION => Fixed(36),

        _ => Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_total() {
        // Every byte value must map to something; this just exercises the
        // full domain for panics (none expected, it's a plain match).
        for op in 0u8..=255 {
            let _ = payload_class(op);
        }
    }

    #[test]
    fn known_fixed_opcodes() {
        assert_eq!(payload_class(NOP), PayloadClass::Fixed(0));
        assert_eq!(payload_class(ANALOG_SENSOR_REQUEST), PayloadClass::Fixed(1));
        assert_eq!(payload_class(PROGRAM_EXECUTE_ACTION), PayloadClass::Fixed(34));
        assert_eq!(payload_class(EXECUTION_DONE_ACTION), PayloadClass::Fixed(38));
    }

    #[test]
    fn known_variable_opcodes() {
        assert_eq!(payload_class(PROGRAM_COMPILE_REQUEST), PayloadClass::Variable);
        assert_eq!(payload_class(EXECUTION_DATA_ACTION), PayloadClass::Variable);
        assert_eq!(payload_class(PROGRAMS_FETCH_UPDATE), PayloadClass::Variable);
    }

    #[test]
    fn unknown_opcode() {
        // 1, 2, 3, 4 and most of the gaps between families are unassigned.
        assert_eq!(payload_class(1), PayloadClass::Unknown);
        assert_eq!(payload_class(200), PayloadClass::Unknown);
    }
}
