#![cfg_attr(not(feature = "std"), no_std)]

//! Interpreter for "modules": short, immutable bytecode programs that
//! write parameter fields into one or both channel blocks.
//!
//! A module is nothing more than a `&[u8]`; [`run_module`] executes one
//! to completion against a shared [`chan_block::Registers`] space and
//! the [system PRNG][Rng]. Modules never fail — an unrecognized opcode
//! just advances one byte, matching the "single-threaded, run to
//! completion, no error code" contract this interpreter is built to.

mod interp;
mod rng;

pub use interp::run_module;
pub use rng::Rng;
