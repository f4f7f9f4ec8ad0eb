use serde::{Deserialize, Serialize};

/// IE, IF, WAITCNT, IME and POSTFLG.
///
/// The request register is acknowledged by writing ones to the bits to
/// clear; the bus write path implements that quirk.
#[derive(Default, Serialize, Deserialize)]
pub struct InterruptControl {
    pub interrupt_enable: u16,
    pub interrupt_request: u16,
    pub wait_state_control: u16,
    pub interrupt_master_enable: u16,
    pub post_boot_flag: u16,
}

impl InterruptControl {
    /// An IRQ reaches the CPU when IME bit 0 is set and some interrupt is
    /// both enabled and requested.
    #[must_use]
    pub const fn pending(&self) -> bool {
        self.interrupt_master_enable & 1 != 0
            && self.interrupt_enable & self.interrupt_request != 0
    }
}
