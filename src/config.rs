//! Runtime configuration.
//!
//! There is no command-line surface: every knob is an environment variable
//! with a default matching the original deployment (a fixed UART device and
//! a fixed-size custom-data ring buffer). Grounded on the env-var-driven
//! `Config` pattern used for host configuration elsewhere in the pack.

use std::env;
use std::path::PathBuf;

const DEFAULT_UART_DEVICE: &str = "/dev/ttyAMA0";
const DEFAULT_CUSTOM_DATA_BUFFER_SIZE: usize = 256;
const DEFAULT_COMPILER: &str = "gcc";
const DEFAULT_LINKER: &str = "gcc";
const DEFAULT_DEBUGGER: &str = "gdb";

/// Process configuration, assembled once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Character device the HLC/HWC link is attached to.
    pub uart_device: PathBuf,
    /// Capacity, in bytes, of the custom-data ring buffer fed by
    /// `SEND_CUSTOM_DATA_ACTION` and drained by `READ_CUSTOM_DATA_REQUEST`.
    pub custom_data_buffer_size: usize,
    /// Compiler invoked to build a fetched program's translation units.
    pub compiler: String,
    /// Linker invoked to produce the final executable.
    pub linker: String,
    /// Debugger spawned alongside a running program.
    pub debugger: String,
}

impl Config {
    /// Reads configuration from the environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        Config {
            uart_device: env::var("SWC_UART_DEVICE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_UART_DEVICE)),
            custom_data_buffer_size: env::var("SWC_CUSTOM_DATA_BUFFER_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CUSTOM_DATA_BUFFER_SIZE),
            compiler: env::var("SWC_COMPILER").unwrap_or_else(|_| DEFAULT_COMPILER.to_string()),
            linker: env::var("SWC_LINKER").unwrap_or_else(|_| DEFAULT_LINKER.to_string()),
            debugger: env::var("SWC_DEBUGGER").unwrap_or_else(|_| DEFAULT_DEBUGGER.to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            uart_device: PathBuf::from(DEFAULT_UART_DEVICE),
            custom_data_buffer_size: DEFAULT_CUSTOM_DATA_BUFFER_SIZE,
            compiler: DEFAULT_COMPILER.to_string(),
            linker: DEFAULT_LINKER.to_string(),
            debugger: DEFAULT_DEBUGGER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let cfg = Config::default();
        assert_eq!(cfg.uart_device, PathBuf::from("/dev/ttyAMA0"));
        assert_eq!(cfg.custom_data_buffer_size, 256);
        assert_eq!(cfg.debugger, "gdb");
    }
}
