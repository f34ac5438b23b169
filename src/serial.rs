//! UART device setup: open the character device and configure it
//! 115200 8N1, matching the original `main()` termios block.

use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::unix::io::{FromRawFd, RawFd};
use std::path::Path;

macro_rules! syscall {
    ($fn:ident ( $($arg:expr),* $(,)* ) ) => {{
        #[allow(unused_unsafe)]
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

/// Opens `device` and configures it for the HLC/HWC link: 115200 baud, 8
/// data bits, no parity, local line (no modem control), input parity errors
/// ignored, canonical/echo/signal processing off, input queue flushed.
pub fn open_uart(device: &Path) -> io::Result<File> {
    let path = CString::new(device.as_os_str().as_encoded_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "nul byte in device path"))?;

    let fd: RawFd = syscall!(open(path.as_ptr(), libc::O_RDWR | libc::O_NOCTTY))?;

    let mut options: libc::termios = unsafe { std::mem::zeroed() };
    syscall!(tcgetattr(fd, &mut options))?;

    options.c_cflag = libc::B115200 | libc::CS8 | libc::CLOCAL | libc::CREAD;
    options.c_iflag = libc::IGNPAR;
    options.c_oflag = 0;
    options.c_lflag = 0;

    syscall!(tcflush(fd, libc::TCIFLUSH))?;
    syscall!(tcsetattr(fd, libc::TCSANOW, &options))?;

    // SAFETY: fd was just opened above and is owned by this call.
    Ok(unsafe { File::from_raw_fd(fd) })
}
