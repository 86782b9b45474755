use core::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    sync::atomic::AtomicBool,
    sync::atomic::Ordering::*,
};

/**
    exclusion cell for state that is only ever touched from task context

    the deferred event queue runs one closure to completion at a time, so a
    lock on this cell can never legitimately be contended: [TaskMutex::lock]
    treats contention as a violated contract and halts instead of spinning.
    [TaskMutex::try_lock] is available where the caller wants to decide.
*/
pub struct TaskMutex<T> {
    value: UnsafeCell<T>,
    locked: AtomicBool,
}

impl<T> TaskMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
            locked: AtomicBool::new(false),
        }
    }

    pub fn try_lock(&self) -> Option<TaskMutexGuard<'_, T>> {
        TaskMutexGuard::try_new(self)
    }

    /// acquire the cell, halting if it is already held
    pub fn lock(&self) -> TaskMutexGuard<'_, T> {
        let Some(guard) = self.try_lock() else {
            panic!("task state accessed concurrently")
        };
        guard
    }
}

impl<T: Default> Default for TaskMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

// the cell hands out &mut T across contexts, hence T: Send; exclusion itself
// comes from the atomic flag
unsafe impl<T: Send> Sync for TaskMutex<T> {}
unsafe impl<T: Send> Send for TaskMutex<T> {}

pub struct TaskMutexGuard<'m, T> {
    mutex: &'m TaskMutex<T>,
}
impl<'m, T> TaskMutexGuard<'m, T> {
    fn try_new(mutex: &'m TaskMutex<T>) -> Option<Self> {
        if mutex.locked.swap(true, Acquire) {
            None
        } else {
            Some(Self { mutex })
        }
    }
}
impl<T> Deref for TaskMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}
impl<T> DerefMut for TaskMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}
impl<T> Drop for TaskMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.locked.store(false, Release);
    }
}
