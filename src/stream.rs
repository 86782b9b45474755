/*!
    byte stream seams over the callback transport

    consumers that only need "some bytes in, some bytes out" semantics can
    be written against these traits instead of the concrete driver, which
    keeps them portable across transports.
*/

use crate::{
    error::ErrorCode,
    events::EventQueue,
    port::UartPort,
    uart::AsyncUart,
};

/// source of bytes with completion callbacks
pub trait AsyncReadStream {
    /// fill up to `dest.len()` bytes; exactly one callback per request,
    /// at most one request outstanding
    fn read_some<F>(&'static self, dest: &'static mut [u8], callback: F)
    where
        F: FnMut(ErrorCode, usize) + Send + 'static;
}

/// sink of bytes with completion callbacks
pub trait AsyncWriteStream {
    /// send up to `source.len()` bytes; exactly one callback per request,
    /// at most one request outstanding
    fn write_some<F>(&'static self, source: &'static [u8], callback: F)
    where
        F: FnMut(ErrorCode, usize) + Send + 'static;
}

impl<P, Q> AsyncReadStream for AsyncUart<P, Q>
where
    P: UartPort + 'static,
    Q: EventQueue + 'static,
{
    fn read_some<F>(&'static self, dest: &'static mut [u8], callback: F)
    where
        F: FnMut(ErrorCode, usize) + Send + 'static,
    {
        AsyncUart::read_some(self, dest, callback)
    }
}

impl<P, Q> AsyncWriteStream for AsyncUart<P, Q>
where
    P: UartPort + 'static,
    Q: EventQueue + 'static,
{
    fn write_some<F>(&'static self, source: &'static [u8], callback: F)
    where
        F: FnMut(ErrorCode, usize) + Send + 'static,
    {
        AsyncUart::write_some(self, source, callback)
    }
}
