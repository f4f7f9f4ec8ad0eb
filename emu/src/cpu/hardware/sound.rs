use serde::{Deserialize, Serialize};

/// The slice of the sound register file the core needs: the direct-sound
/// FIFOs (DMA 1/2 destinations) and the control words that route them. The
/// APU itself lives outside the core.
#[derive(Default, Serialize, Deserialize)]
pub struct Sound {
    /// SOUNDCNT_L.
    pub control_stereo_volume: u16,
    /// SOUNDCNT_H: direct-sound mixing and DMA routing.
    pub control_mixing_dma: u16,
    /// SOUNDCNT_X.
    pub control_sound_on_off: u16,
    /// FIFO_A, write-only sink at 0x0400_00A0.
    pub fifo_a: u32,
    /// FIFO_B, write-only sink at 0x0400_00A4.
    pub fifo_b: u32,
}

/// The two direct-sound FIFOs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fifo {
    A,
    B,
}

impl Fifo {
    /// The fixed destination address DMA 1/2 write to in FIFO mode.
    #[must_use]
    pub const fn address(self) -> u32 {
        match self {
            Self::A => 0x0400_00A0,
            Self::B => 0x0400_00A4,
        }
    }
}
