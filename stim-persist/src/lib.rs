#![cfg_attr(not(feature = "std"), no_std)]

//! `SystemConfig` and its persistence (spec §4.7): magic+checksum
//! load/save, the split A/B selection bytes, and the seven fixed
//! 32-byte user-module slots.

mod config;
mod store;
mod user_module;

pub use config::{
    load, load_split, save, save_split, AdvancedSettings, PowerLevel, SystemConfig,
    CONFIG_BLOCK_LEN, CONFIG_PHYS_OFFSET, SPLIT_OFFSET,
};
pub use store::{MockStore, PersistentStore};
pub use user_module::{
    load_user_module, save_user_module, USER_MODULE_BASE_OFFSET, USER_MODULE_COUNT,
    USER_MODULE_MAGIC, USER_MODULE_PAYLOAD_LEN, USER_MODULE_SLOT_LEN,
};
