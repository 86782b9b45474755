use core::sync::atomic::{AtomicU8, Ordering::*};
use thiserror::Error;

/// error reported through a completion callback
#[derive(Error, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    #[default]
    #[error("no error")]
    None = 0,
    /// the dma controller reported a transfer error on the stream
    #[error("dma stream transfer error")]
    DmaTransfer = 1,
    /// the dma controller reported a fifo error on the stream
    #[error("dma stream fifo error")]
    DmaFifo = 2,
    /// the uart receiver was overrun before dma could drain it
    #[error("uart overrun")]
    UartOverrun = 3,
    #[error("uart framing error")]
    UartFraming = 4,
    #[error("uart noise detected")]
    UartNoise = 5,
    /// software lost synchronization with the hardware receive ring
    #[error("receive buffer overrun")]
    BufferOverrun = 6,
}

impl ErrorCode {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::DmaTransfer,
            2 => Self::DmaFifo,
            3 => Self::UartOverrun,
            4 => Self::UartFraming,
            5 => Self::UartNoise,
            6 => Self::BufferOverrun,
            _ => Self::None,
        }
    }
}

/**
    pending error slot shared between interrupt and task context

    interrupt handlers record the classification of a fault here; the
    deferred receive task consumes it when it completes the outstanding
    read. a later fault overwrites an unconsumed earlier one.
*/
pub(crate) struct ErrorCell(AtomicU8);

impl ErrorCell {
    pub const fn new() -> Self {
        Self(AtomicU8::new(ErrorCode::None as u8))
    }

    pub fn set(&self, code: ErrorCode) {
        self.0.store(code as u8, Release);
    }

    pub fn get(&self) -> ErrorCode {
        ErrorCode::from_raw(self.0.load(Acquire))
    }

    /// read and clear in one step
    pub fn take(&self) -> ErrorCode {
        ErrorCode::from_raw(self.0.swap(ErrorCode::None as u8, AcqRel))
    }
}
