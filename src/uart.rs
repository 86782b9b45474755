/*!
    the dma driven uart transport

    reception runs continuously: the receive dma stream circles over a slot
    ring regardless of whether anyone is reading, and a read request only
    decides where buffered bytes get copied. transmission is a single-shot
    dma transfer per request. interrupt handlers stay minimal: classify the
    event, clear hardware status, record a pending fault and defer the real
    bookkeeping to task context through the event queue.

    at most one read and one write may be outstanding at a time; submitting
    a second one is a programming error and halts. completion callbacks
    always fire from the deferred queue, never from the caller's stack and
    never from interrupt context.
*/

use core::sync::atomic::{AtomicUsize, Ordering::*};
use log::*;

use crate::{
    binding::{self, DmaBinding, PinName, UartId},
    error::{ErrorCell, ErrorCode},
    events::{EventQueue, Task},
    func::StaticFn,
    irq::{Handler, InterruptRegistrar},
    mutex::TaskMutex,
    port::{Direction, DmaStatus, StreamConfig, TransferKind, UartPort},
    ring::{RX_RING_LEN, ReceiveRing, VACANT},
};

/// completion callback: the error code and the bytes actually transferred
pub type SizeCallback = StaticFn<(ErrorCode, usize), 4>;

/// construction options; leave a pin unassigned to skip that direction
#[derive(Copy, Clone, Debug)]
pub struct Options {
    pub tx: Option<PinName>,
    pub rx: Option<PinName>,
    pub baud_rate: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tx: None,
            rx: None,
            baud_rate: 115_200,
        }
    }
}

/// receive side state, task context only
struct ReadState {
    /// next ring slot to consume
    cursor: usize,
    pending: Option<&'static mut [u8]>,
    callback: SizeCallback,
}

/// transmit side state, task context only
struct WriteState {
    callback: SizeCallback,
}

pub struct AsyncUart<P, Q> {
    port: P,
    queue: Q,
    uart: UartId,
    options: Options,
    tx_binding: DmaBinding,
    rx_binding: DmaBinding,
    ring: ReceiveRing<RX_RING_LEN>,
    /// fault recorded in interrupt context, consumed in task context
    rx_error: ErrorCell,
    /// length of the outstanding write, read back in interrupt context
    tx_size: AtomicUsize,
    rx: TaskMutex<ReadState>,
    tx: TaskMutex<WriteState>,
}

impl<P, Q> AsyncUart<P, Q>
where
    P: UartPort + 'static,
    Q: EventQueue + 'static,
{
    /// resolve the peripheral identity from the pins; fatal on a pin pair
    /// that does not map to one uart
    pub fn new(port: P, queue: Q, options: Options) -> Self {
        let uart = binding::merge_pins(options.tx, options.rx);
        let (tx_binding, rx_binding) = binding::dma_bindings(uart);
        Self {
            port,
            queue,
            uart,
            options,
            tx_binding,
            rx_binding,
            ring: ReceiveRing::new(),
            rx_error: ErrorCell::new(),
            tx_size: AtomicUsize::new(0),
            rx: TaskMutex::new(ReadState {
                cursor: 0,
                pending: None,
                callback: SizeCallback::empty(),
            }),
            tx: TaskMutex::new(WriteState {
                callback: SizeCallback::empty(),
            }),
        }
    }

    /**
        bring the hardware up and start reception

        configures both dma streams, binds the three interrupt handlers and
        leaves the receive stream circling over the ring. directions whose
        pin is unassigned are skipped entirely.
    */
    pub fn start(&'static self, registrar: &impl InterruptRegistrar) {
        self.port.init(self.options.baud_rate);
        debug!(
            "{:?}: tx {:?}, rx {:?}",
            self.uart, self.tx_binding, self.rx_binding
        );

        if self.options.tx.is_some() {
            self.port.configure_stream(
                Direction::Transmit,
                StreamConfig {
                    channel: self.tx_binding.channel,
                    kind: TransferKind::MemoryToPeripheral,
                    circular: false,
                    halfword: false,
                },
            );
            let this = self;
            registrar.bind(self.tx_binding.irq, Handler::new(move || this.on_transmit_dma()));
        }

        if self.options.rx.is_some() {
            self.port.configure_stream(
                Direction::Receive,
                StreamConfig {
                    channel: self.rx_binding.channel,
                    kind: TransferKind::PeripheralToMemory,
                    circular: true,
                    halfword: true,
                },
            );
            let this = self;
            registrar.bind(self.rx_binding.irq, Handler::new(move || this.on_receive_dma()));

            // a quiet line flushes partial runs without waiting for a wrap
            self.port.enable_idle_interrupt();
            let this = self;
            registrar.bind(
                binding::line_irq(self.uart),
                Handler::new(move || this.on_line_status()),
            );

            // reception runs from here on whether or not a read is pending
            self.port
                .set_transfer(Direction::Receive, self.ring.base_address(), RX_RING_LEN);
            self.port.clear_status(Direction::Receive, DmaStatus::mask_all());
            self.port.enable_stream(Direction::Receive);
            self.port.enable_request(Direction::Receive);
        }
    }

    /**
        ask for up to `dest.len()` received bytes

        fatal if a read is already outstanding. already buffered data may
        satisfy the request during this call, but the callback still fires
        through the deferred queue.
    */
    pub fn read_some<F>(&'static self, dest: &'static mut [u8], callback: F)
    where
        F: FnMut(ErrorCode, usize) + Send + 'static,
    {
        {
            let mut rx = self.rx.lock();
            assert!(
                rx.pending.is_none() && rx.callback.is_empty(),
                "a read is already outstanding",
            );
            rx.pending = Some(dest);
            rx.callback = SizeCallback::new(callback);
        }
        self.process_data();
    }

    /**
        send `source` as one dma transfer

        fatal if a write is already outstanding. the transfer proceeds
        entirely in hardware; the callback fires once the completion
        interrupt has been serviced.
    */
    pub fn write_some<F>(&'static self, source: &'static [u8], callback: F)
    where
        F: FnMut(ErrorCode, usize) + Send + 'static,
    {
        {
            let mut tx = self.tx.lock();
            assert!(tx.callback.is_empty(), "a write is already outstanding");
            tx.callback = SizeCallback::new(callback);
        }
        self.tx_size.store(source.len(), Release);

        // stale flags of a previous transfer must not alias into this one
        self.port.clear_status(Direction::Transmit, DmaStatus::mask_all());
        self.port
            .set_transfer(Direction::Transmit, source.as_ptr() as usize, source.len());
        self.port.enable_stream(Direction::Transmit);
        self.port.enable_request(Direction::Transmit);
    }

    /// the hardware port, mainly for inspection
    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn uart(&self) -> UartId {
        self.uart
    }

    /// invoked in interrupt context
    fn on_transmit_dma(&'static self) {
        let total = self.tx_size.load(Acquire);
        let sent = total - self.port.transfer_remaining(Direction::Transmit);

        // a finished single-shot transfer leaves the stream disabled
        assert!(
            !self.port.stream_enabled(Direction::Transmit),
            "transmit interrupt with the stream still running",
        );
        self.port.disable_request(Direction::Transmit);

        let status = self.port.read_status(Direction::Transmit);
        let error = if status.error() {
            self.port.clear_status(Direction::Transmit, DmaStatus::mask_error());
            ErrorCode::DmaTransfer
        } else if status.fifo_error() {
            self.port.clear_status(Direction::Transmit, DmaStatus::mask_fifo());
            ErrorCode::DmaFifo
        } else if status.complete() {
            self.port.clear_status(Direction::Transmit, DmaStatus::mask_complete());
            ErrorCode::None
        } else {
            panic!("transmit interrupt with no status flag")
        };

        let this = self;
        self.post(Task::new(move || this.finish_transmit(error, sent)));
    }

    /// invoked in interrupt context
    fn on_receive_dma(&'static self) {
        let status = self.port.read_status(Direction::Receive);
        if status.error() {
            self.port.clear_status(Direction::Receive, DmaStatus::mask_error());
            // a stream error accompanied by a line error has the line as
            // its root cause
            let line = self.port.read_line_status();
            self.port.clear_line_status();
            self.rx_error.set(if line.overrun() {
                ErrorCode::UartOverrun
            } else if line.framing() {
                ErrorCode::UartFraming
            } else if line.noise() {
                ErrorCode::UartNoise
            } else {
                ErrorCode::DmaTransfer
            });
        } else if status.fifo_error() {
            self.port.clear_status(Direction::Receive, DmaStatus::mask_fifo());
            self.rx_error.set(ErrorCode::DmaFifo);
        } else if status.complete() {
            // the ring wrapped, nothing to record
            self.port.clear_status(Direction::Receive, DmaStatus::mask_complete());
        } else {
            panic!("receive interrupt with no status flag");
        }
        self.schedule_process();
    }

    /// invoked in interrupt context
    fn on_line_status(&'static self) {
        if self.port.read_line_status().idle() {
            self.port.clear_line_status();
            self.schedule_process();
        }
    }

    fn schedule_process(&'static self) {
        let this = self;
        self.post(Task::new(move || this.process_data()));
    }

    fn post(&self, task: Task) {
        assert!(self.queue.post(task).is_ok(), "deferred event queue overflow");
    }

    /// deferred transmit completion, task context
    fn finish_transmit(&'static self, error: ErrorCode, sent: usize) {
        let mut callback = self.tx.lock().callback.take();
        self.post(Task::new(move || callback.call((error, sent))));
    }

    /**
        deferred receive bookkeeping, task context

        harmless when redundant: with no outstanding read or nothing new in
        the ring it returns without touching anything. otherwise it drains
        buffered slots into the caller's span, detects loss of
        synchronization with the hardware, and restarts reception over a
        clean ring when the stream was stopped for recovery.
    */
    fn process_data(&'static self) {
        let mut rx = self.rx.lock();
        let state = &mut *rx;

        // data with no one to hand it to stays buffered for a future read
        let Some(dest) = state.pending.as_mut() else { return };

        if self.ring.read(state.cursor) == VACANT && self.rx_error.get() == ErrorCode::None {
            return;
        }

        // an occupied slot one full lap behind the cursor means the
        // hardware lapped us and slot order can no longer be trusted
        let behind = (state.cursor + RX_RING_LEN - 1) % RX_RING_LEN;
        if self.ring.read(behind) != VACANT {
            self.rx_error.set(ErrorCode::BufferOverrun);
            warn!("{:?}: receive ring overrun, resynchronizing", self.uart);
            if self.port.stream_enabled(Direction::Receive) {
                // stop the writer first; the completion interrupt of the
                // forced stop brings us back here for the recovery below
                self.port.disable_stream(Direction::Receive);
                return;
            }
        }

        let mut drained = 0;
        while drained < dest.len() {
            let slot = self.ring.read(state.cursor);
            if slot == VACANT {
                break;
            }
            dest[drained] = slot as u8;
            self.ring.clear(state.cursor);
            state.cursor = (state.cursor + 1) % RX_RING_LEN;
            drained += 1;
        }

        let error = self.rx_error.take();
        let mut callback = state.callback.take();
        state.pending = None;
        trace!("{:?}: delivering {} bytes, {:?}", self.uart, drained, error);
        self.post(Task::new(move || callback.call((error, drained))));

        // recovery path: restart reception over a clean ring
        if !self.port.stream_enabled(Direction::Receive) {
            self.ring.reset();
            state.cursor = 0;
            self.port.enable_stream(Direction::Receive);
            self.port.enable_request(Direction::Receive);
        }
    }
}
