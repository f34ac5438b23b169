//! Program lifecycle: compiling a fetched source into a binary (4.D.1) and
//! executing a compiled binary as a monitored child (4.D.2).
//!
//! Grounded on `compileProgram`/`executeProgram` in the original source.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::config::Config;
use crate::process::{self, ExitReason, Pipe};
use crate::state::{ProgramId, RunningProgram};

/// Result of a compile attempt: `ok` mirrors the wire `status` byte (`false`
/// maps to `1`), `diagnostics` is the captured compiler/linker stderr.
pub struct CompileResult {
    pub ok: bool,
    pub diagnostics: Vec<u8>,
}

/// Why `execute` could not start the program.
#[derive(Debug)]
pub enum ExecuteError {
    AlreadyRunning,
    NotFound,
    /// Fork/pipe/exec setup failed — a fatal condition upstream, distinct
    /// from the two ordinary protocol preconditions above.
    Io(io::Error),
}

impl From<io::Error> for ExecuteError {
    fn from(e: io::Error) -> Self {
        ExecuteError::Io(e)
    }
}

/// Writes the program's source (with injected includes), invokes the
/// compiler and, on success, the linker, and returns the captured
/// diagnostics. Caller is responsible for the `hwc_type != 0` precondition.
pub fn compile(
    config: &Config,
    hwc_type: u8,
    id: &ProgramId,
    source: &[u8],
) -> io::Result<CompileResult> {
    let dir = id.directory();
    fs::create_dir_all(&dir)?;

    let source_path = dir.join(format!("{}.c", id.base_filename()));
    let object_path = dir.join(format!("{}.o", id.base_filename()));
    let binary_path = dir.join(id.base_filename());
    let diagnostics_path = dir.join("compiler_output");
    let hwc_object = PathBuf::from(format!("./andrixhwtype{hwc_type}.o"));

    {
        let mut source_file = fs::File::create(&source_path)?;
        write!(source_file, "#include \"../andrixhwtype{hwc_type}.h\"\n")?;
        write!(source_file, "#include \"../userprogram.h\"\n\n")?;
        source_file.write_all(source)?;
    }
    info!("saved {}", source_path.display());

    let compile_status = std::process::Command::new(&config.compiler)
        .args(["-Wall", "-ggdb3", "-std=c99", "-pedantic", "-c", "-o"])
        .arg(&object_path)
        .arg(&source_path)
        .stderr(std::fs::File::create(&diagnostics_path)?)
        .status()?;
    debug!("compiler exit status: {compile_status}");

    let mut link_ok = true;
    if compile_status.success() {
        let diagnostics_append = fs::OpenOptions::new().append(true).open(&diagnostics_path)?;
        let link_status = std::process::Command::new(&config.linker)
            .arg("-o")
            .arg(&binary_path)
            .arg(&object_path)
            .args(["./tools.o", "./axcp.o", "./userprogram.o"])
            .arg(&hwc_object)
            .stderr(diagnostics_append)
            .status()?;
        debug!("linker exit status: {link_status}");
        link_ok = link_status.success();
    } else {
        warn!("compile of {} failed, skipping link", id.base_filename());
    }

    let diagnostics = fs::read(&diagnostics_path)?;
    Ok(CompileResult {
        ok: compile_status.success() && link_ok,
        diagnostics,
    })
}

/// Spawns the program binary and wires up its pipes. `running` must be
/// `None` on entry (checked by the caller per §4.D.2's precondition).
pub fn execute(
    config: &Config,
    id: &ProgramId,
    debugger_cmd_w: &mut fs::File,
) -> Result<RunningProgram, ExecuteError> {
    let binary_path = id.directory().join(id.base_filename());
    if !binary_path.exists() {
        return Err(ExecuteError::NotFound);
    }

    let (child, Pipe { read: reply_pipe_r, write: in_pipe_w }, stdout_pipe_r) =
        process::spawn_program(&binary_path)?;

    info!(
        "program {} started with pid {}",
        id.name,
        child.id()
    );

    // Prime the debugger: drop any previously set breakpoints, then load
    // the freshly built binary's symbols.
    let _ = debugger_cmd_w.write_all(b"delete\n");
    let _ = write!(debugger_cmd_w, "file {}\n", binary_path.display());

    Ok(RunningProgram {
        id: id.clone(),
        pid: child.id() as libc::pid_t,
        in_pipe_w,
        reply_pipe_r,
        stdout_pipe_r,
        custom_data_buffer: crate::ringbuffer::RingBuffer::new(config.custom_data_buffer_size),
    })
}

/// Non-blocking reap; translates the child's fate into the protocol event
/// the caller should emit, per §4.C step 1.
pub fn reap(pid: libc::pid_t) -> io::Result<Option<ReapOutcome>> {
    match process::try_wait(pid)? {
        None => Ok(None),
        Some(ExitReason::Exited(code)) => Ok(Some(ReapOutcome::Done(code))),
        Some(ExitReason::Signaled(sig)) if sig == libc::SIGTERM => Ok(Some(ReapOutcome::Stopped)),
        // Per spec.md §4.C: other signals are observed but not translated —
        // the original source has no `else` branch here, so program state is
        // left exactly as it was (the wire protocol never hears about it).
        Some(ExitReason::Signaled(sig)) => Ok(Some(ReapOutcome::Other(sig))),
    }
}

/// What happened to a reaped program child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// Exited on its own; carries the exit status to report upstream.
    Done(i32),
    /// Killed by `SIGTERM`, i.e. a deliberate stop.
    Stopped,
    /// Killed by some other signal; observed but not translated into a wire
    /// event, and the caller must not clear `program` (see spec.md §9(b)'s
    /// sibling ambiguity — mirrored here for signals instead of opcodes).
    Other(i32),
}

/// Lists every `(name, version)` pair with a built binary under the current
/// working directory, for `PROGRAMS_FETCH_SUBSCRIPTION`.
pub fn list_programs() -> io::Result<Vec<ProgramId>> {
    let mut found = Vec::new();
    let cwd = std::env::current_dir()?;
    for entry in fs::read_dir(&cwd)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        for file in fs::read_dir(entry.path())? {
            let file = file?;
            let fname = file.file_name().to_string_lossy().into_owned();
            if let Some(version) = parse_versioned_source(&name, &fname) {
                found.push(ProgramId {
                    name: name.clone(),
                    version,
                });
            }
        }
    }
    Ok(found)
}

/// Reads back a versioned source file's body, skipping the two injected
/// include lines and the blank line after them, for `PROGRAMS_FETCH_UPDATE`.
pub fn read_source_body(id: &ProgramId) -> io::Result<Vec<u8>> {
    let path = id.directory().join(format!("{}.c", id.base_filename()));
    let mut contents = Vec::new();
    fs::File::open(path)?.read_to_end(&mut contents)?;
    let mut newlines_seen = 0;
    for (i, &b) in contents.iter().enumerate() {
        if b == b'\n' {
            newlines_seen += 1;
            if newlines_seen == 3 {
                return Ok(contents[i + 1..].to_vec());
            }
        }
    }
    Ok(Vec::new())
}

fn parse_versioned_source(name: &str, filename: &str) -> Option<u16> {
    let prefix = format!("{name}_v");
    let suffix = ".c";
    let rest = filename.strip_prefix(&prefix)?.strip_suffix(suffix)?;
    rest.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_source_name_parses() {
        assert_eq!(parse_versioned_source("follower", "follower_v3.c"), Some(3));
        assert_eq!(parse_versioned_source("follower", "follower_v3.o"), None);
        assert_eq!(parse_versioned_source("follower", "other_v3.c"), None);
    }
}
