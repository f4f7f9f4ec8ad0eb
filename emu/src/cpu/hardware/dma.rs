//! The four DMA channels.
//!
//! Channel registers are plain storage; the transfer machinery itself lives
//! in the bus, which owns both the channels and the memory they move. This
//! module tracks the latched (internal) copies of source, destination and
//! count, plus the per-channel pending flag the triggers set.
//!
//! Control word layout: `{dst_ctl 6-5, src_ctl 8-7, repeat 9,
//! transfer_width 10, gamepak_drq 11, timing 13-12, irq_on_end 14,
//! enable 15}`.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// When a channel fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Immediate,
    VBlank,
    HBlank,
    /// FIFO refill on channels 1-2, video capture on channel 3.
    Special,
}

impl From<u16> for Timing {
    fn from(bits: u16) -> Self {
        match bits {
            0b00 => Self::Immediate,
            0b01 => Self::VBlank,
            0b10 => Self::HBlank,
            0b11 => Self::Special,
            _ => unreachable!(),
        }
    }
}

/// How an address advances after each unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressControl {
    Increment,
    Decrement,
    Fixed,
    /// Increment during the transfer, reload the latch when it repeats.
    IncrementReload,
}

impl From<u16> for AddressControl {
    fn from(bits: u16) -> Self {
        match bits {
            0b00 => Self::Increment,
            0b01 => Self::Decrement,
            0b10 => Self::Fixed,
            0b11 => Self::IncrementReload,
            _ => unreachable!(),
        }
    }
}

/// One DMA channel: the programmable registers plus the latched copies used
/// while a transfer runs.
#[derive(Default, Serialize, Deserialize)]
pub struct Channel {
    pub source_address: u32,
    pub destination_address: u32,
    pub word_count: u16,
    pub control: u16,

    pub(crate) internal_source: u32,
    pub(crate) internal_destination: u32,
    pub(crate) internal_count: u32,
    pub(crate) pending: bool,
}

impl Channel {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.control.get_bit(15)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.control.set_bit(15, enabled);
    }

    #[must_use]
    pub fn timing(&self) -> Timing {
        self.control.get_bits(12..=13).into()
    }

    #[must_use]
    pub fn repeat(&self) -> bool {
        self.control.get_bit(9)
    }

    #[must_use]
    pub fn irq_on_end(&self) -> bool {
        self.control.get_bit(14)
    }

    /// Transfer width bit: 0 = halfword, 1 = word.
    #[must_use]
    pub fn is_word_transfer(&self) -> bool {
        self.control.get_bit(10)
    }

    #[must_use]
    pub fn destination_control(&self) -> AddressControl {
        self.control.get_bits(5..=6).into()
    }

    #[must_use]
    pub fn source_control(&self) -> AddressControl {
        self.control.get_bits(7..=8).into()
    }
}

#[derive(Default, Serialize, Deserialize)]
pub struct Dma {
    pub channels: [Channel; 4],
}

impl Dma {
    /// Source addresses are 27 bits on channel 0 (internal memory only,
    /// which is also what keeps DMA 0 out of cartridge space) and 28 bits
    /// elsewhere.
    const SOURCE_MASK: [u32; 4] = [0x07FF_FFFF, 0x0FFF_FFFF, 0x0FFF_FFFF, 0x0FFF_FFFF];

    /// Destination addresses are 27 bits except on channel 3.
    const DESTINATION_MASK: [u32; 4] = [0x07FF_FFFF, 0x07FF_FFFF, 0x07FF_FFFF, 0x0FFF_FFFF];

    /// Word counts are 14 bits except on channel 3; zero means full range.
    const COUNT_MASK: [u32; 4] = [0x3FFF, 0x3FFF, 0x3FFF, 0xFFFF];

    /// Latches source, destination and count. Called on an enable-bit
    /// rising edge.
    pub fn latch(&mut self, channel_idx: usize) {
        let channel = &mut self.channels[channel_idx];
        channel.internal_source = channel.source_address & Self::SOURCE_MASK[channel_idx];
        channel.internal_destination =
            channel.destination_address & Self::DESTINATION_MASK[channel_idx];
        channel.internal_count = Self::masked_count(channel.word_count, channel_idx);

        if channel.timing() == Timing::Immediate {
            channel.pending = true;
        }
    }

    /// Reloads the latched count (and destination, for increment-reload)
    /// when a repeating channel refires.
    pub(crate) fn reload_for_repeat(&mut self, channel_idx: usize) {
        let channel = &mut self.channels[channel_idx];
        channel.internal_count = Self::masked_count(channel.word_count, channel_idx);
        if channel.destination_control() == AddressControl::IncrementReload {
            channel.internal_destination =
                channel.destination_address & Self::DESTINATION_MASK[channel_idx];
        }
    }

    fn masked_count(word_count: u16, channel_idx: usize) -> u32 {
        let count = word_count as u32 & Self::COUNT_MASK[channel_idx];
        if count == 0 {
            Self::COUNT_MASK[channel_idx] + 1
        } else {
            count
        }
    }

    /// Marks the channels woken by VBlank entry.
    pub fn on_vblank(&mut self) {
        for channel in &mut self.channels {
            if channel.enabled() && channel.timing() == Timing::VBlank {
                channel.pending = true;
            }
        }
    }

    /// Marks the channels woken by HBlank entry on a visible scanline.
    /// Channel 3 in special timing is video capture: it refires on lines
    /// 2..=161 and switches off after line 161.
    pub fn on_hblank(&mut self, vcount: u16) {
        for channel in &mut self.channels[..3] {
            if channel.enabled() && channel.timing() == Timing::HBlank && vcount < 160 {
                channel.pending = true;
            }
        }

        let channel = &mut self.channels[3];
        if channel.enabled() {
            match channel.timing() {
                Timing::HBlank if vcount < 160 => channel.pending = true,
                Timing::Special => {
                    if (2..=161).contains(&vcount) {
                        channel.pending = true;
                    } else if vcount == 162 {
                        channel.set_enabled(false);
                    }
                }
                _ => {}
            }
        }
    }

    /// Marks a FIFO channel (1 or 2) for an audio refill.
    pub fn on_fifo_refill(&mut self, channel_idx: usize) {
        debug_assert!(channel_idx == 1 || channel_idx == 2);
        let channel = &mut self.channels[channel_idx];
        if channel.enabled() && channel.timing() == Timing::Special {
            channel.pending = true;
        }
    }

    /// The highest-priority pending channel; channel 0 wins ties.
    #[must_use]
    pub fn next_pending(&self) -> Option<usize> {
        self.channels
            .iter()
            .position(|channel| channel.pending && channel.enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn control_fields() {
        let mut channel = Channel::default();
        // enable | irq | timing=01 | width=word | repeat | src fixed | dst decrement
        channel.control = 0b1101_0111_0010_0000;
        assert!(channel.enabled());
        assert!(channel.irq_on_end());
        assert_eq!(channel.timing(), Timing::VBlank);
        assert!(channel.is_word_transfer());
        assert!(channel.repeat());
        assert_eq!(channel.source_control(), AddressControl::Fixed);
        assert_eq!(channel.destination_control(), AddressControl::Decrement);
    }

    #[test]
    fn latch_masks_addresses() {
        let mut dma = Dma::default();
        dma.channels[0].source_address = 0xFFFF_FFFF;
        dma.channels[0].destination_address = 0xFFFF_FFFF;
        dma.channels[0].word_count = 0;
        dma.latch(0);
        // Channel 0 cannot address the cartridge bus.
        assert_eq!(dma.channels[0].internal_source, 0x07FF_FFFF);
        assert_eq!(dma.channels[0].internal_destination, 0x07FF_FFFF);
        assert_eq!(dma.channels[0].internal_count, 0x4000);

        dma.channels[3].source_address = 0xFFFF_FFFF;
        dma.channels[3].word_count = 0;
        dma.latch(3);
        assert_eq!(dma.channels[3].internal_source, 0x0FFF_FFFF);
        assert_eq!(dma.channels[3].internal_count, 0x1_0000);
    }

    #[test]
    fn immediate_timing_is_pending_after_latch() {
        let mut dma = Dma::default();
        dma.channels[1].control = 1 << 15;
        dma.latch(1);
        assert!(dma.channels[1].pending);
        assert_eq!(dma.next_pending(), Some(1));
    }

    #[test]
    fn priority_order() {
        let mut dma = Dma::default();
        for idx in [3, 1] {
            dma.channels[idx].control = 1 << 15;
            dma.channels[idx].pending = true;
        }
        assert_eq!(dma.next_pending(), Some(1));
    }

    #[test]
    fn vblank_trigger() {
        let mut dma = Dma::default();
        dma.channels[2].control = (1 << 15) | (0b01 << 12);
        dma.on_vblank();
        assert!(dma.channels[2].pending);
        // Disabled channels stay idle.
        dma.channels[2].pending = false;
        dma.channels[2].set_enabled(false);
        dma.on_vblank();
        assert!(!dma.channels[2].pending);
    }

    #[test]
    fn video_capture_window() {
        let mut dma = Dma::default();
        dma.channels[3].control = (1 << 15) | (0b11 << 12);

        dma.on_hblank(1);
        assert!(!dma.channels[3].pending);

        dma.on_hblank(2);
        assert!(dma.channels[3].pending);
        dma.channels[3].pending = false;

        dma.on_hblank(161);
        assert!(dma.channels[3].pending);
        dma.channels[3].pending = false;

        dma.on_hblank(162);
        assert!(!dma.channels[3].pending);
        assert!(!dma.channels[3].enabled());
    }
}
