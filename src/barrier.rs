//! Completion barrier for dispatched tasks.
//!
//! The driver calls [`CompletionBarrier::register`] once per task *before*
//! handing the task to a worker, and moves the returned [`TaskToken`] into
//! the task. The token completes exactly once: explicitly through
//! [`TaskToken::complete`], or implicitly when dropped (including while
//! unwinding from a panic), so a crashing task can never leave
//! [`CompletionBarrier::await_all`] blocked forever.
//!
//! Because `complete` consumes the token, double completion is impossible
//! through this API; the counter still checks for underflow and panics, as
//! that would mean the accounting itself is broken.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Counts {
    registered: usize,
    completed: usize,
}

impl Counts {
    fn pending(&self) -> usize {
        self.registered - self.completed
    }
}

/// Counter plus condition variable shared by the driver and every task.
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    counts: Mutex<Counts>,
    all_done: Condvar,
}

impl CompletionBarrier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // A poisoned lock only means another thread panicked while holding it;
    // the counts themselves are always consistent.
    fn lock(&self) -> MutexGuard<'_, Counts> {
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Account for one more task and hand back its completion token.
    pub fn register(self: &Arc<Self>) -> TaskToken {
        let mut counts = self.lock();
        counts.registered += 1;
        TaskToken {
            barrier: Arc::clone(self),
            id: counts.registered,
            done: false,
        }
    }

    fn finish(&self) {
        let mut counts = self.lock();
        assert!(
            counts.completed < counts.registered,
            "completion barrier: more completions than registrations"
        );
        counts.completed += 1;
        if counts.pending() == 0 {
            self.all_done.notify_all();
        }
    }

    /// Block until every registered task has completed.
    ///
    /// Returns immediately when nothing is pending. Tasks registered while
    /// waiting are waited for as well.
    pub fn await_all(&self) {
        let mut counts = self.lock();
        while counts.pending() > 0 {
            counts = self
                .all_done
                .wait(counts)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().pending()
    }

    pub fn registered(&self) -> usize {
        self.lock().registered
    }

    pub fn completed(&self) -> usize {
        self.lock().completed
    }
}

/// Proof that one task was registered; completes it exactly once.
#[derive(Debug)]
pub struct TaskToken {
    barrier: Arc<CompletionBarrier>,
    id: usize,
    done: bool,
}

impl TaskToken {
    /// 1-based registration order.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn complete(mut self) {
        self.done = true;
        self.barrier.finish();
    }
}

impl Drop for TaskToken {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            self.barrier.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn await_all_returns_immediately_when_empty() {
        let barrier = CompletionBarrier::new();
        barrier.await_all();
        assert_eq!(barrier.pending(), 0);
    }

    #[test]
    fn register_and_complete_balance() {
        let barrier = CompletionBarrier::new();
        let a = barrier.register();
        let b = barrier.register();
        assert_eq!((a.id(), b.id()), (1, 2));
        assert_eq!(barrier.pending(), 2);

        a.complete();
        assert_eq!(barrier.pending(), 1);
        drop(b);
        assert_eq!(barrier.pending(), 0);
        assert_eq!(barrier.completed(), 2);
    }

    #[test]
    fn await_all_waits_for_every_task() {
        const N: usize = 64;
        let barrier = CompletionBarrier::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..N)
            .map(|i| {
                let token = barrier.register();
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis((i % 7) as u64 * 3));
                    log.lock().unwrap().push(token.id());
                    token.complete();
                })
            })
            .collect();

        barrier.await_all();
        assert_eq!(log.lock().unwrap().len(), N);
        assert_eq!(barrier.pending(), 0);

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn await_all_blocks_while_a_task_is_pending() {
        let barrier = CompletionBarrier::new();
        let token = barrier.register();
        let (tx, rx) = mpsc::channel();

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.await_all();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        token.complete();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn panicking_task_still_completes() {
        let barrier = CompletionBarrier::new();
        let token = barrier.register();

        let result = thread::spawn(move || {
            let _token = token;
            panic!("task blew up");
        })
        .join();

        assert!(result.is_err());
        barrier.await_all();
        assert_eq!(barrier.completed(), 1);
    }
}
