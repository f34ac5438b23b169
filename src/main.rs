//! Process entry point: reads configuration from the environment, opens the
//! UART, spawns the debugger child, and runs the event loop.
//!
//! Grounded on `andrixswc.c`'s `main()` setup section (termios configuration,
//! debugger fork, initial `HW_CONTROLLER_TYPE_REQUEST` probe).

use std::fs::File;
use std::os::unix::io::FromRawFd;
use std::process::ExitCode;

use log::{error, info};

use hedgehog_swc::config::Config;
use hedgehog_swc::state::{DebuggerState, SwcState};
use hedgehog_swc::{eventloop, process, serial};

fn main() -> ExitCode {
    env_logger::init();

    let config = Config::from_env();
    info!("starting with config: {config:?}");

    let mut uart = match serial::open_uart(&config.uart_device) {
        Ok(f) => f,
        Err(e) => {
            error!("failed to open UART {}: {e}", config.uart_device.display());
            return ExitCode::FAILURE;
        }
    };

    let (_debugger_child, cmd_w, out_r) = match process::spawn_debugger(&config.debugger) {
        Ok(v) => v,
        Err(e) => {
            error!("failed to spawn debugger {}: {e}", config.debugger);
            return ExitCode::FAILURE;
        }
    };
    let debugger_pid = _debugger_child.id() as libc::pid_t;

    let mut state = SwcState::new(DebuggerState {
        pid: debugger_pid,
        cmd_w,
        out_r,
        attached: false,
        breaked: false,
    });

    // SAFETY: fd 0 is the process's own stdin, open for the lifetime of main.
    let mut stdin = unsafe { File::from_raw_fd(0) };

    match eventloop::run(&mut state, &config, &mut uart, &mut stdin) {
        Ok(()) => {
            info!("shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("fatal error, exiting: {e}");
            ExitCode::FAILURE
        }
    }
}
