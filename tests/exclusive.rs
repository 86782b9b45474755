use uartdma::{
    exclusive::{AsyncExclusive, Release, Saturated},
    mutex::TaskMutex,
};

fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// parking place for a release handle held across calls, the way a real
/// asynchronous operation would keep it until its completion callback
type Parked = TaskMutex<Option<Release<u32, 3>>>;

#[test]
fn a_free_resource_starts_the_operation_synchronously() {
    let exclusive = leak(AsyncExclusive::<u32, 3>::new(7));
    let seen = leak(TaskMutex::new(Vec::new()));

    exclusive.start(move |value, release| {
        seen.lock().push(*value);
        *value += 1;
        release.release();
    });
    // ran during the call, not later
    assert_eq!(*seen.lock(), [7]);

    // the mutation stuck and the resource is free again
    exclusive.start(move |value, release| {
        seen.lock().push(*value);
        release.release();
    });
    assert_eq!(*seen.lock(), [7, 8]);
}

#[test]
fn parked_operations_start_in_submission_order() {
    let exclusive = leak(AsyncExclusive::<u32, 3>::new(0));
    let order = leak(TaskMutex::new(Vec::new()));
    let parked: &'static Parked = leak(TaskMutex::new(None));

    // the holder keeps the resource beyond its own invocation
    exclusive.start(move |_, release| {
        order.lock().push('g');
        *parked.lock() = Some(release);
    });
    for name in ['a', 'b', 'c'] {
        exclusive.start(move |_, release| {
            order.lock().push(name);
            release.release();
        });
    }
    assert_eq!(*order.lock(), ['g']);

    // handing the turn on drains the whole queue, first submitted first.
    // the guard on the parking slot must be gone before releasing, since
    // release() starts the successors on this very stack
    let handle = parked.lock().take().unwrap();
    handle.release();
    assert_eq!(*order.lock(), ['g', 'a', 'b', 'c']);
}

#[test]
fn releases_between_waiters_keep_the_order() {
    let exclusive = leak(AsyncExclusive::<u32, 3>::new(0));
    let order = leak(TaskMutex::new(Vec::new()));
    let parked: &'static Parked = leak(TaskMutex::new(None));

    exclusive.start(move |_, release| {
        *parked.lock() = Some(release);
    });
    // every waiter parks its handle too, so turns pass one at a time
    for name in ['a', 'b', 'c'] {
        exclusive.start(move |_, release| {
            order.lock().push(name);
            *parked.lock() = Some(release);
        });
    }

    for expected in [vec!['a'], vec!['a', 'b'], vec!['a', 'b', 'c']] {
        let handle = parked.lock().take().unwrap();
        handle.release();
        assert_eq!(*order.lock(), expected);
    }
}

#[test]
fn a_nested_submission_waits_for_the_running_operation() {
    let exclusive = leak(AsyncExclusive::<u32, 3>::new(0));
    let order = leak(TaskMutex::new(Vec::new()));

    exclusive.start(move |_, release| {
        order.lock().push("outer");
        exclusive.start(move |_, inner| {
            order.lock().push("inner");
            inner.release();
        });
        // even a synchronous release only queues the successor; it must
        // not run while the resource is still borrowed here
        release.release();
        assert_eq!(*order.lock(), ["outer"]);
    });
    assert_eq!(*order.lock(), ["outer", "inner"]);
}

#[test]
#[should_panic(expected = "too many operations")]
fn exceeding_the_wait_capacity_is_fatal() {
    let exclusive = leak(AsyncExclusive::<u32, 2>::new(0));
    let parked = leak(TaskMutex::new(None::<Release<u32, 2>>));

    exclusive.start(move |_, release| {
        *parked.lock() = Some(release);
    });
    // two wait slots fill up fine, the third submission is one too many
    exclusive.start(move |_, release| release.release());
    exclusive.start(move |_, release| release.release());
    exclusive.start(move |_, release| release.release());
}

#[test]
fn try_start_reports_saturation_instead_of_halting() {
    let exclusive = leak(AsyncExclusive::<u32, 2>::new(0));
    let done = leak(TaskMutex::new(0));
    let parked = leak(TaskMutex::new(None::<Release<u32, 2>>));

    exclusive.start(move |_, release| {
        *parked.lock() = Some(release);
    });
    for _ in 0..2 {
        let accepted = exclusive.try_start(move |_, release| {
            *done.lock() += 1;
            release.release();
        });
        assert_eq!(accepted, Ok(()));
    }
    let rejected = exclusive.try_start(move |_, release| {
        *done.lock() += 1;
        release.release();
    });
    assert_eq!(rejected, Err(Saturated));

    // the rejected operation is gone; the accepted ones all run
    let handle = parked.lock().take().unwrap();
    handle.release();
    assert_eq!(*done.lock(), 2);
}
