//! User-module slots (spec §4.7): fixed 32-byte regions, one per
//! `User1`..`User7` mode, each slot's first byte a validity magic.
//! The payload itself is SET-opcode-only bytecode (spec §4.5's
//! User1-7 row); this crate only stores/retrieves the raw bytes, the
//! same way it never runs the main config's bytecode either — running
//! it is `bytecode`/`mode-dispatch`'s job.

use crate::config::SPLIT_OFFSET;
use crate::store::PersistentStore;

/// Validity magic written as a user-module slot's first byte.
pub const USER_MODULE_MAGIC: u8 = 0x5A;

/// Size of one user-module slot, magic byte included.
pub const USER_MODULE_SLOT_LEN: usize = 32;
/// Number of user-module slots (`User1`..`User7`).
pub const USER_MODULE_COUNT: usize = 7;
/// Usable bytecode bytes per slot, after the magic byte.
pub const USER_MODULE_PAYLOAD_LEN: usize = USER_MODULE_SLOT_LEN - 1;

/// Physical offset of the first user-module slot: just above the
/// split-selection bytes.
pub const USER_MODULE_BASE_OFFSET: u16 = SPLIT_OFFSET + 2;

fn slot_offset(slot: usize) -> u16 {
    USER_MODULE_BASE_OFFSET + (slot as u16) * USER_MODULE_SLOT_LEN as u16
}

/// Read user-module `slot` (`0..USER_MODULE_COUNT`). Returns `None` if
/// the slot's magic byte doesn't validate, matching the "integrity
/// failure recovered locally, never surfaced" policy — callers treat a
/// missing user module as an empty (single `END` byte) program.
pub fn load_user_module<S: PersistentStore>(
    store: &mut S,
    slot: usize,
) -> Option<[u8; USER_MODULE_PAYLOAD_LEN]> {
    let mut buf = [0u8; USER_MODULE_SLOT_LEN];
    store.read(slot_offset(slot), &mut buf);
    if buf[0] != USER_MODULE_MAGIC {
        return None;
    }
    let mut payload = [0u8; USER_MODULE_PAYLOAD_LEN];
    payload.copy_from_slice(&buf[1..]);
    Some(payload)
}

pub fn save_user_module<S: PersistentStore>(
    store: &mut S,
    slot: usize,
    payload: &[u8; USER_MODULE_PAYLOAD_LEN],
) {
    let mut buf = [0u8; USER_MODULE_SLOT_LEN];
    buf[0] = USER_MODULE_MAGIC;
    buf[1..].copy_from_slice(payload);
    store.write(slot_offset(slot), &buf);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MockStore;

    #[test]
    fn round_trip_valid_slot() {
        let mut store = MockStore::<512>::new();
        let mut payload = [0u8; USER_MODULE_PAYLOAD_LEN];
        payload[0] = 0x80;
        payload[1] = 0x42;
        save_user_module(&mut store, 3, &payload);
        assert_eq!(load_user_module(&mut store, 3), Some(payload));
    }

    #[test]
    fn blank_slot_has_no_magic() {
        let mut store = MockStore::<512>::new();
        assert_eq!(load_user_module(&mut store, 0), None);
    }

    #[test]
    fn slots_are_independent() {
        let mut store = MockStore::<512>::new();
        let mut a = [0u8; USER_MODULE_PAYLOAD_LEN];
        a[0] = 1;
        let mut b = [0u8; USER_MODULE_PAYLOAD_LEN];
        b[0] = 2;
        save_user_module(&mut store, 0, &a);
        save_user_module(&mut store, 1, &b);
        assert_eq!(load_user_module(&mut store, 0), Some(a));
        assert_eq!(load_user_module(&mut store, 1), Some(b));
    }

    #[test]
    fn all_slots_fit_within_physical_store_budget() {
        let last = slot_offset(USER_MODULE_COUNT - 1) as usize + USER_MODULE_SLOT_LEN;
        let budget = (stim_protocol::address::STORE_END - stim_protocol::address::STORE_BASE) as usize;
        assert!(last <= budget);
    }
}
