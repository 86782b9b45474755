/*!
    software doubles of the external collaborators

    a register-model [SimPort], a fifo [SimQueue] and a handler table
    [SimRegistrar] stand in for the chip, the firmware's deferred event
    queue and the vector table, so the transport can be exercised entirely
    on a host. tests drive them explicitly: feed bytes, raise flags, fire
    interrupts, then drain the queue.
*/

use core::ptr;
use core::sync::atomic::{AtomicU32, Ordering::*};
use heapless::{Deque, Vec};

use crate::{
    events::{EventQueue, QueueFull, Task, TaskId},
    irq::{Handler, InterruptRegistrar, IrqId},
    mutex::TaskMutex,
    port::{Direction, DmaStatus, LineStatus, StreamConfig, UartPort},
};

const QUEUE_DEPTH: usize = 32;
const HANDLER_SLOTS: usize = 8;

fn index(direction: Direction) -> usize {
    match direction {
        Direction::Transmit => 0,
        Direction::Receive => 1,
    }
}

#[derive(Default)]
struct StreamState {
    config: Option<StreamConfig>,
    enabled: bool,
    request: bool,
    /// raw transfer status flags, [DmaStatus] layout
    status: u8,
    address: usize,
    count: usize,
    /// next slot the simulated engine writes (receive side)
    position: usize,
    /// items left in the current transfer (transmit side)
    remaining: usize,
}

#[derive(Default)]
struct PortState {
    baud: Option<u32>,
    streams: [StreamState; 2],
    /// raw line status flags, [LineStatus] layout
    line: u8,
    idle_interrupt: bool,
}

/// register model of one uart instance and its two dma streams
#[derive(Default)]
pub struct SimPort {
    state: TaskMutex<PortState>,
}

impl SimPort {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        push bytes through the receive stream the way the dma engine would:
        16 bit writes at the programmed address, wrapping at the transfer
        count and raising transfer-complete on every lap. the interrupt is
        not fired automatically, the test decides when.
    */
    pub fn feed(&self, bytes: &[u8]) {
        let mut state = self.state.lock();
        let stream = &mut state.streams[index(Direction::Receive)];
        assert!(
            stream.enabled && stream.request,
            "feeding a stopped receive stream",
        );
        for &byte in bytes {
            unsafe {
                ptr::write_volatile((stream.address as *mut u16).add(stream.position), byte as u16)
            }
            stream.position += 1;
            if stream.position == stream.count {
                stream.position = 0;
                stream.status |= DmaStatus::mask_complete().raw();
            }
        }
    }

    /// assert transfer status flags, as the controller would
    pub fn raise_status(&self, direction: Direction, mask: DmaStatus) {
        self.state.lock().streams[index(direction)].status |= mask.raw();
    }

    /// assert line status flags, as the receiver would
    pub fn raise_line(&self, flags: LineStatus) {
        self.state.lock().line |= flags.raw();
    }

    /// finish the programmed transmit transfer: the stream self-disables
    /// and transfer-complete is raised
    pub fn complete_transmit(&self) {
        let mut state = self.state.lock();
        let stream = &mut state.streams[index(Direction::Transmit)];
        stream.enabled = false;
        stream.remaining = 0;
        stream.status |= DmaStatus::mask_complete().raw();
    }

    /// abort the transmit transfer after `sent` items with a stream error
    pub fn fail_transmit_at(&self, sent: usize) {
        let mut state = self.state.lock();
        let stream = &mut state.streams[index(Direction::Transmit)];
        assert!(sent <= stream.count, "aborting past the transfer count");
        stream.enabled = false;
        stream.remaining = stream.count - sent;
        stream.status |= DmaStatus::mask_error().raw();
    }

    /// programmed (address, count) of a stream
    pub fn transfer(&self, direction: Direction) -> (usize, usize) {
        let state = self.state.lock();
        let stream = &state.streams[index(direction)];
        (stream.address, stream.count)
    }

    pub fn stream_config(&self, direction: Direction) -> Option<StreamConfig> {
        self.state.lock().streams[index(direction)].config
    }

    pub fn request_enabled(&self, direction: Direction) -> bool {
        self.state.lock().streams[index(direction)].request
    }

    pub fn baud(&self) -> Option<u32> {
        self.state.lock().baud
    }

    pub fn idle_interrupt_enabled(&self) -> bool {
        self.state.lock().idle_interrupt
    }
}

impl UartPort for SimPort {
    fn init(&self, baud_rate: u32) {
        self.state.lock().baud = Some(baud_rate);
    }

    fn configure_stream(&self, direction: Direction, config: StreamConfig) {
        self.state.lock().streams[index(direction)].config = Some(config);
    }

    fn enable_stream(&self, direction: Direction) {
        let mut state = self.state.lock();
        let stream = &mut state.streams[index(direction)];
        // enabling reloads the programmed transfer, like the controller
        stream.position = 0;
        stream.remaining = stream.count;
        stream.enabled = true;
    }

    fn disable_stream(&self, direction: Direction) {
        let mut state = self.state.lock();
        let stream = &mut state.streams[index(direction)];
        // forcing an active stream off makes the controller report the
        // stop through transfer-complete
        if stream.enabled {
            stream.status |= DmaStatus::mask_complete().raw();
        }
        stream.enabled = false;
    }

    fn stream_enabled(&self, direction: Direction) -> bool {
        self.state.lock().streams[index(direction)].enabled
    }

    fn set_transfer(&self, direction: Direction, address: usize, count: usize) {
        let mut state = self.state.lock();
        let stream = &mut state.streams[index(direction)];
        stream.address = address;
        stream.count = count;
        stream.position = 0;
        stream.remaining = count;
    }

    fn transfer_remaining(&self, direction: Direction) -> usize {
        self.state.lock().streams[index(direction)].remaining
    }

    fn read_status(&self, direction: Direction) -> DmaStatus {
        DmaStatus::from(self.state.lock().streams[index(direction)].status)
    }

    fn clear_status(&self, direction: Direction, mask: DmaStatus) {
        self.state.lock().streams[index(direction)].status &= !mask.raw();
    }

    fn enable_request(&self, direction: Direction) {
        self.state.lock().streams[index(direction)].request = true;
    }

    fn disable_request(&self, direction: Direction) {
        self.state.lock().streams[index(direction)].request = false;
    }

    fn read_line_status(&self) -> LineStatus {
        LineStatus::from(self.state.lock().line)
    }

    fn clear_line_status(&self) {
        self.state.lock().line = 0;
    }

    fn enable_idle_interrupt(&self) {
        self.state.lock().idle_interrupt = true;
    }
}

/// bounded fifo of deferred tasks, drained on demand
#[derive(Default)]
pub struct SimQueue {
    tasks: TaskMutex<Deque<Task, QUEUE_DEPTH>>,
    next_id: AtomicU32,
}

impl SimQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// run deferred tasks in submission order until none remain, including
    /// tasks submitted along the way
    pub fn run_until_idle(&self) {
        loop {
            let task = self.tasks.lock().pop_front();
            let Some(mut task) = task else { break };
            task.call(());
        }
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl EventQueue for SimQueue {
    fn post(&self, task: Task) -> Result<TaskId, QueueFull> {
        self.tasks.lock().push_back(task).map_err(|_| QueueFull)?;
        Ok(TaskId(self.next_id.fetch_add(1, Relaxed) + 1))
    }
}

/// stand-in for the vector table: holds bound handlers, fires on demand
#[derive(Default)]
pub struct SimRegistrar {
    handlers: TaskMutex<Vec<(IrqId, Handler), HANDLER_SLOTS>>,
}

impl SimRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// invoke the handler bound to `irq`, as the hardware would
    pub fn fire(&self, irq: IrqId) {
        let mut handlers = self.handlers.lock();
        let Some((_, handler)) = handlers.iter_mut().find(|(bound, _)| *bound == irq) else {
            panic!("no handler bound to {irq:?}")
        };
        handler.call(());
    }

    pub fn bound(&self, irq: IrqId) -> bool {
        self.handlers.lock().iter().any(|(bound, _)| *bound == irq)
    }
}

impl InterruptRegistrar for SimRegistrar {
    fn bind(&self, irq: IrqId, handler: Handler) {
        let mut handlers = self.handlers.lock();
        assert!(
            !handlers.iter().any(|(bound, _)| *bound == irq),
            "{irq:?} bound twice",
        );
        assert!(handlers.push((irq, handler)).is_ok(), "handler table full");
    }
}
