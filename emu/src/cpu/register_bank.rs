//! Storage for the registers that are swapped on mode changes.
//!
//! Each exception mode banks its own R13 (SP), R14 (LR) and SPSR; FIQ
//! additionally banks R8-R12. The `_old` slots hold the User/System copies
//! while an exception mode is active.

use serde::{Deserialize, Serialize};

use crate::cpu::psr::Psr;

#[derive(Default, Serialize, Deserialize)]
pub struct RegisterBank {
    /// R8-R14 as seen outside FIQ mode (saved when entering FIQ).
    pub r8_old: u32,
    pub r9_old: u32,
    pub r10_old: u32,
    pub r11_old: u32,
    pub r12_old: u32,
    pub r13_old: u32,
    pub r14_old: u32,

    /// FIQ banked registers.
    pub r8_fiq: u32,
    pub r9_fiq: u32,
    pub r10_fiq: u32,
    pub r11_fiq: u32,
    pub r12_fiq: u32,
    pub r13_fiq: u32,
    pub r14_fiq: u32,

    /// Supervisor banked registers.
    pub r13_svc: u32,
    pub r14_svc: u32,

    /// Abort banked registers.
    pub r13_abt: u32,
    pub r14_abt: u32,

    /// IRQ banked registers.
    pub r13_irq: u32,
    pub r14_irq: u32,

    /// Undefined banked registers.
    pub r13_und: u32,
    pub r14_und: u32,

    /// Saved program status registers, one per exception mode.
    pub spsr_fiq: Psr,
    pub spsr_svc: Psr,
    pub spsr_abt: Psr,
    pub spsr_irq: Psr,
    pub spsr_und: Psr,
}
