/*!
    register-level seam between the driver and the hardware

    everything the driver asks of the chip goes through [UartPort]: dma
    stream control, transfer programming, status flags, and the uart line
    status. a port implementation owns the actual register layout and the
    peripheral clock bring-up; the driver never touches an address itself.
*/

use bilge::prelude::*;

/// the two dma directions a uart owns
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Transmit,
    Receive,
}

/// what a dma stream moves, and which side increments
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferKind {
    MemoryToPeripheral,
    PeripheralToMemory,
}

/// one-time stream setup applied at driver construction
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StreamConfig {
    /// request channel multiplexed onto the stream
    pub channel: u8,
    pub kind: TransferKind,
    /// wrap at the end of the transfer and keep going
    pub circular: bool,
    /// move 16 bit words instead of bytes
    pub halfword: bool,
}

/// transfer status flags of one dma stream
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq, Default)]
pub struct DmaStatus {
    pub complete: bool,
    pub half: bool,
    pub error: bool,
    pub fifo_error: bool,
    _reserved: u4,
}

impl DmaStatus {
    /// raw flag bits
    pub fn raw(self) -> u8 {
        self.value.value()
    }
    pub fn mask_complete() -> Self {
        Self::from(0b0000_0001)
    }
    pub fn mask_error() -> Self {
        Self::from(0b0000_0100)
    }
    pub fn mask_fifo() -> Self {
        Self::from(0b0000_1000)
    }
    pub fn mask_all() -> Self {
        Self::from(0b0000_1111)
    }
}

/// line status flags of the uart receiver
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq, Default)]
pub struct LineStatus {
    pub overrun: bool,
    pub framing: bool,
    pub noise: bool,
    /// the bus went quiet after traffic
    pub idle: bool,
    _reserved: u4,
}

impl LineStatus {
    /// raw flag bits
    pub fn raw(self) -> u8 {
        self.value.value()
    }
    pub fn mask_overrun() -> Self {
        Self::from(0b0000_0001)
    }
    pub fn mask_framing() -> Self {
        Self::from(0b0000_0010)
    }
    pub fn mask_noise() -> Self {
        Self::from(0b0000_0100)
    }
    pub fn mask_idle() -> Self {
        Self::from(0b0000_1000)
    }
}

/**
    register primitives of one uart instance and its two dma streams

    implementations are resolved once at driver construction and are
    expected to have enabled their peripheral clocks by then. all methods
    may be called from interrupt context, so implementations must be
    [Sync] and must not block.
*/
pub trait UartPort: Sync {
    /// bring the uart itself up: word format and baud rate
    fn init(&self, baud_rate: u32);

    /// apply one-time stream setup; configuring a stream also enables its
    /// transfer-complete and transfer-error interrupts
    fn configure_stream(&self, direction: Direction, config: StreamConfig);
    fn enable_stream(&self, direction: Direction);
    fn disable_stream(&self, direction: Direction);
    fn stream_enabled(&self, direction: Direction) -> bool;

    /// program the memory address and transfer count of a stream
    fn set_transfer(&self, direction: Direction, address: usize, count: usize);
    /// items the stream has not transferred yet
    fn transfer_remaining(&self, direction: Direction) -> usize;

    fn read_status(&self, direction: Direction) -> DmaStatus;
    fn clear_status(&self, direction: Direction, mask: DmaStatus);

    /// let the uart raise dma requests for this direction
    fn enable_request(&self, direction: Direction);
    fn disable_request(&self, direction: Direction);

    fn read_line_status(&self) -> LineStatus;
    fn clear_line_status(&self);
    /// raise the uart interrupt on an idle line
    fn enable_idle_interrupt(&self);
}
