//! Software controller (SWC): multiplexes the AXCP wire protocol between the
//! HLC/HWC serial link and a user-program/debugger pair of child processes.
//!
//! The binary crate (`src/main.rs`) wires [`config::Config`] into an
//! [`state::SwcState`] and hands both to [`eventloop::run`]; this library
//! crate exists mainly so the component modules can be unit-tested in
//! isolation.

pub mod codec;
pub mod config;
pub mod debugger;
pub mod error;
pub mod eventloop;
pub mod handler;
pub mod mediator;
pub mod opcode;
pub mod process;
pub mod program;
pub mod ringbuffer;
pub mod serial;
pub mod state;
