use crate::func::StaticFn;

/// closure deferred from interrupt context to task context
pub type Task = StaticFn<(), 8>;

/// handle of a successfully submitted task
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskId(pub u32);

/// submission failed, the queue is out of slots
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueFull;

/**
    deferred event queue run by the surrounding firmware

    submitted tasks must run outside interrupt context, strictly in
    submission order, one at a time and never re-entrantly.
    [EventQueue::post] may be called from interrupt context. the driver
    treats a full queue as an
    unrecoverable design violation, so implementations should size their
    storage generously rather than shed load.
*/
pub trait EventQueue: Sync {
    fn post(&self, task: Task) -> Result<TaskId, QueueFull>;
}
