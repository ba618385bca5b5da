use crate::action::Action;
use crate::select::Select;

const VALUE: usize = 0;
const MIN: usize = 1;
const MAX: usize = 2;
const RATE: usize = 3;
const STEP: usize = 4;
const ACTION_MIN: usize = 5;
const ACTION_MAX: usize = 6;
const SELECT: usize = 7;
const TIMER: usize = 8;

/// Length in bytes of a single parameter group.
pub const GROUP_LEN: usize = 9;

/// A read-only view onto one 9-byte parameter group (ramp, intensity,
/// frequency, or width) within a [`ChannelBlock`](crate::ChannelBlock).
///
/// Byte order within the group is `value, min, max, rate, step,
/// action_min, action_max, select, timer`.
pub struct ParamGroupView<'a> {
    bytes: &'a [u8],
}

impl<'a> ParamGroupView<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len(), GROUP_LEN);
        Self { bytes }
    }

    pub fn value(&self) -> u8 {
        self.bytes[VALUE]
    }

    pub fn min(&self) -> u8 {
        self.bytes[MIN]
    }

    pub fn max(&self) -> u8 {
        self.bytes[MAX]
    }

    /// The configured sweep rate. Bytecode may legally write `0`; per
    /// the invariant, that is treated as `1` everywhere it's consumed.
    pub fn rate(&self) -> u8 {
        self.bytes[RATE]
    }

    /// `rate()`, normalized so `0` reads as `1`.
    pub fn rate_or_one(&self) -> u8 {
        let r = self.rate();
        if r == 0 {
            1
        } else {
            r
        }
    }

    pub fn step(&self) -> u8 {
        self.bytes[STEP]
    }

    pub fn action_min(&self) -> Action {
        Action::from_byte(self.bytes[ACTION_MIN])
    }

    pub fn action_max(&self) -> Action {
        Action::from_byte(self.bytes[ACTION_MAX])
    }

    pub fn select(&self) -> Select {
        Select::from_bits(self.bytes[SELECT])
    }

    /// Internal sweep-timer countdown. Not externally meaningful.
    pub fn timer(&self) -> u8 {
        self.bytes[TIMER]
    }
}

/// A mutable view onto one 9-byte parameter group. See
/// [`ParamGroupView`] for field layout.
pub struct ParamGroupViewMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> ParamGroupViewMut<'a> {
    pub(crate) fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len(), GROUP_LEN);
        Self { bytes }
    }

    pub fn as_ref(&self) -> ParamGroupView<'_> {
        ParamGroupView::new(self.bytes)
    }

    pub fn value(&self) -> u8 {
        self.bytes[VALUE]
    }

    pub fn set_value(&mut self, v: u8) {
        self.bytes[VALUE] = v;
    }

    pub fn min(&self) -> u8 {
        self.bytes[MIN]
    }

    pub fn set_min(&mut self, v: u8) {
        self.bytes[MIN] = v;
    }

    pub fn max(&self) -> u8 {
        self.bytes[MAX]
    }

    pub fn set_max(&mut self, v: u8) {
        self.bytes[MAX] = v;
    }

    pub fn rate(&self) -> u8 {
        self.bytes[RATE]
    }

    pub fn set_rate(&mut self, v: u8) {
        self.bytes[RATE] = v;
    }

    pub fn rate_or_one(&self) -> u8 {
        let r = self.rate();
        if r == 0 {
            1
        } else {
            r
        }
    }

    pub fn step(&self) -> u8 {
        self.bytes[STEP]
    }

    pub fn set_step(&mut self, v: u8) {
        self.bytes[STEP] = v;
    }

    pub fn action_min(&self) -> Action {
        Action::from_byte(self.bytes[ACTION_MIN])
    }

    pub fn set_action_min(&mut self, a: Action) {
        self.bytes[ACTION_MIN] = a.into_byte();
    }

    pub fn action_max(&self) -> Action {
        Action::from_byte(self.bytes[ACTION_MAX])
    }

    pub fn set_action_max(&mut self, a: Action) {
        self.bytes[ACTION_MAX] = a.into_byte();
    }

    pub fn select(&self) -> Select {
        Select::from_bits(self.bytes[SELECT])
    }

    pub fn set_select(&mut self, s: Select) {
        self.bytes[SELECT] = s.into_bits();
    }

    pub fn timer(&self) -> u8 {
        self.bytes[TIMER]
    }

    pub fn set_timer(&mut self, v: u8) {
        self.bytes[TIMER] = v;
    }
}
