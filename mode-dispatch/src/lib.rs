#![cfg_attr(not(feature = "std"), no_std)]

//! Mode dispatcher: mode table, split-mode isolation, Random-1
//! rotation, the deferred-command mailbox, and the output-copy/
//! intensity-scaling stage that turns live register state into
//! pulse-generator and DAC parameters.
//!
//! [`EngineContext`] is the one thing a firmware binary (or test)
//! instantiates: it owns both channels' [`chan_block::Registers`], the
//! direction shadows and timers [`param_engine`] needs, and the mode
//! index. [`compute_output`] is a pure function the foreground calls
//! once per pass after [`EngineContext::tick`] to derive what to submit
//! to the (out-of-scope) DAC and pulse generator.

mod context;
mod modules;
mod output;

pub use context::{DeferredCommand, EngineContext};
pub use modules::{lookup_module, Mode, MODULES};
pub use output::{compute_output, ChannelOutput, PowerLevel};
