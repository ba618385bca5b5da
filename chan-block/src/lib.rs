#![cfg_attr(not(feature = "std"), no_std)]

//! The 64-byte per-channel register block that is the stimulation
//! engine's entire live state.
//!
//! Field order is contractual: both the bytecode interpreter and the
//! external serial protocol address this block by byte offset. See
//! [`ChannelBlock`] for the layout.

mod action;
mod block;
mod group;
mod registers;
mod select;

pub use action::Action;
pub use block::{ChannelBlock, GateValue, Group, BLOCK_LEN};
pub use group::{ParamGroupView, ParamGroupViewMut, GROUP_LEN};
pub use registers::{Channel, Registers, BASE_A, BASE_B};
pub use select::{RateSource, Select, Source, SourceBase};
