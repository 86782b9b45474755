/*!
    asynchronous exclusive ownership of one shared resource

    operations contending for a resource take turns owning it without ever
    blocking: [AsyncExclusive::start] either invokes the operation right
    away or parks it in a fixed arena of wait slots. each operation receives
    the resource and a [Release] handle; dropping work on the floor is not
    possible since the handle must be consumed to pass the turn on.

    waiters are stored in the first vacant slot in index order and restarted
    from the lowest occupied slot, so service order is first submitted,
    first served. there is no timeout: an operation that never releases
    starves the queue, by contract.
*/

use core::marker::PhantomData;
use core::mem::{self, MaybeUninit};
use core::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::mutex::TaskMutex;

/// inline words available to a parked operation's captured state
const OP_WORDS: usize = 6;

/// the wait arena is out of slots
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
#[error("too many operations waiting for the resource")]
pub struct Saturated;

struct OpVTable<R: 'static, const N: usize> {
    call: unsafe fn(*mut (), &mut R, Release<R, N>),
    drop: unsafe fn(*mut ()),
}

unsafe fn op_call_raw<R, const N: usize, F>(env: *mut (), resource: &mut R, release: Release<R, N>)
where
    F: FnMut(&mut R, Release<R, N>) + Send,
{
    unsafe { (*env.cast::<F>())(resource, release) }
}

unsafe fn op_drop_raw<F>(env: *mut ()) {
    unsafe { env.cast::<F>().drop_in_place() }
}

struct OpErased<R: 'static, const N: usize, F>(PhantomData<(fn(R), fn(F))>);
impl<R: 'static, const N: usize, F> OpErased<R, N, F>
where
    F: FnMut(&mut R, Release<R, N>) + Send,
{
    const VTABLE: OpVTable<R, N> = OpVTable {
        call: op_call_raw::<R, N, F>,
        drop: op_drop_raw::<F>,
    };
}

/// a parked operation, stored inline like the other function objects
struct QueuedOp<R: 'static, const N: usize> {
    env: MaybeUninit<[usize; OP_WORDS]>,
    vtable: Option<&'static OpVTable<R, N>>,
}

impl<R: 'static, const N: usize> QueuedOp<R, N> {
    const fn empty() -> Self {
        Self {
            env: MaybeUninit::uninit(),
            vtable: None,
        }
    }

    fn new<F>(operation: F) -> Self
    where
        F: FnMut(&mut R, Release<R, N>) + Send + 'static,
    {
        const {
            assert!(
                mem::size_of::<F>() <= mem::size_of::<[usize; OP_WORDS]>(),
                "operation captures exceed the inline capacity",
            );
            assert!(
                mem::align_of::<F>() <= mem::align_of::<usize>(),
                "operation captures are over-aligned for word storage",
            );
        }
        let mut env = MaybeUninit::<[usize; OP_WORDS]>::uninit();
        unsafe { env.as_mut_ptr().cast::<F>().write(operation) }
        Self {
            env,
            vtable: Some(&OpErased::<R, N, F>::VTABLE),
        }
    }

    fn is_empty(&self) -> bool {
        self.vtable.is_none()
    }

    fn take(&mut self) -> Self {
        mem::replace(self, Self::empty())
    }

    fn call(&mut self, resource: &mut R, release: Release<R, N>) {
        let Some(vtable) = self.vtable else {
            panic!("started an empty operation")
        };
        unsafe { (vtable.call)(self.env.as_mut_ptr().cast(), resource, release) }
    }
}

impl<R: 'static, const N: usize> Drop for QueuedOp<R, N> {
    fn drop(&mut self) {
        if let Some(vtable) = self.vtable {
            unsafe { (vtable.drop)(self.env.as_mut_ptr().cast()) }
        }
    }
}

unsafe impl<R: 'static, const N: usize> Send for QueuedOp<R, N> {}

/**
    serializes asynchronous operations over one resource instance

    up to `N` operations may wait at a time; a further submission through
    [AsyncExclusive::start] is fatal, [AsyncExclusive::try_start] reports it
    instead.
*/
pub struct AsyncExclusive<R: 'static, const N: usize = 3> {
    resource: TaskMutex<R>,
    /// an operation currently owns the resource
    locked: AtomicBool,
    /// re-entrancy guard of [Self::pump]
    pumping: AtomicBool,
    waiters: TaskMutex<[QueuedOp<R, N>; N]>,
}

impl<R: Send + 'static, const N: usize> AsyncExclusive<R, N> {
    pub const fn new(resource: R) -> Self {
        Self {
            resource: TaskMutex::new(resource),
            locked: AtomicBool::new(false),
            pumping: AtomicBool::new(false),
            waiters: TaskMutex::new([const { QueuedOp::empty() }; N]),
        }
    }

    /**
        run `operation` as soon as the resource is free

        with the resource free that is right now, synchronously on the
        caller's context. otherwise the operation parks until every earlier
        submission has released; exceeding the wait capacity is fatal.
    */
    pub fn start<F>(&'static self, operation: F)
    where
        F: FnMut(&mut R, Release<R, N>) + Send + 'static,
    {
        assert!(
            self.try_start(operation).is_ok(),
            "too many operations waiting for the resource",
        );
    }

    /// like [Self::start], reporting a full wait arena instead of halting
    pub fn try_start<F>(&'static self, operation: F) -> Result<(), Saturated>
    where
        F: FnMut(&mut R, Release<R, N>) + Send + 'static,
    {
        self.enqueue(QueuedOp::new(operation))?;
        self.pump();
        Ok(())
    }

    fn enqueue(&self, operation: QueuedOp<R, N>) -> Result<(), Saturated> {
        let mut waiters = self.waiters.lock();
        let Some(slot) = waiters.iter_mut().find(|slot| slot.is_empty()) else {
            return Err(Saturated);
        };
        *slot = operation;
        Ok(())
    }

    fn dequeue(&self) -> Option<QueuedOp<R, N>> {
        let mut waiters = self.waiters.lock();
        waiters
            .iter_mut()
            .find(|slot| !slot.is_empty())
            .map(|slot| slot.take())
    }

    /**
        start parked operations while the resource is free

        re-entrant calls fold into the outermost loop, so an operation that
        releases synchronously never has its successor started under it:
        the successor runs once the current operation has returned and its
        resource borrow is gone.
    */
    fn pump(&'static self) {
        if self.pumping.swap(true, Ordering::Acquire) {
            return;
        }
        while !self.locked.load(Ordering::Acquire) {
            let Some(mut operation) = self.dequeue() else { break };
            self.locked.store(true, Ordering::Release);
            let mut resource = self.resource.lock();
            operation.call(&mut *resource, Release { owner: self });
        }
        self.pumping.store(false, Ordering::Release);
    }

    fn released(&'static self) {
        self.locked.store(false, Ordering::Release);
        self.pump();
    }
}

/**
    turn-passing handle given to every operation

    consuming it through [Release::release] frees the resource and starts
    the next parked operation. being consumed by value, a double release
    cannot be written.
*/
pub struct Release<R: 'static, const N: usize> {
    owner: &'static AsyncExclusive<R, N>,
}

impl<R: Send + 'static, const N: usize> Release<R, N> {
    pub fn release(self) {
        self.owner.released();
    }
}
