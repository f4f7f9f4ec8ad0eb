use serde::{Deserialize, Serialize};

/// Button input state. KEYINPUT is active-low: a clear bit means pressed,
/// and the idle value is all ten buttons released.
#[derive(Serialize, Deserialize)]
pub struct Keypad {
    /// KEYINPUT, read-only through the bus; the front end writes it.
    pub key_input: u16,
    /// KEYCNT.
    pub key_interrupt_control: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self {
            key_input: 0x03FF,
            key_interrupt_control: 0,
        }
    }
}
