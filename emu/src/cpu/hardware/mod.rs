//! Hardware behind the memory bus.
//!
//! | Module                | I/O range             |
//! |-----------------------|-----------------------|
//! | [`internal_memory`]   | BIOS/RAM/ROM regions  |
//! | [`lcd`]               | `0x0400_0000-0056`    |
//! | [`sound`]             | `0x0400_0060-00A8`    |
//! | [`dma`]               | `0x0400_00B0-00DF`    |
//! | [`keypad`]            | `0x0400_0130-0133`    |
//! | [`interrupt_control`] | `0x0400_0200-0301`    |

pub mod dma;
pub mod internal_memory;
pub mod interrupt_control;
pub mod keypad;
pub mod lcd;
pub mod sound;
