//! CPU timeline semaphores.
//!
//! A timeline semaphore is a monotonic counter over the stages of a
//! multi-step operation. Unlike binary/counting semaphores one primitive
//! encodes the state of every stage, can be awaited by many consumers at
//! once, and can never deadlock: it only ever moves from stage `i` to stage
//! `j >= i`, and once `stage == num_stages` it is completed forever.
//!
//! Producers publish with [`Semaphore::signal`]/[`Semaphore::increment`]
//! (release ordering); consumers observe with [`Semaphore::stage`] or
//! [`await_semaphores`] (acquire ordering). That pair is the only
//! happens-before edge tasks get for data handoffs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::backoff::sleepy_backoff;

/// Monotonic multi-stage synchronization primitive.
///
/// Identity is the allocation address: consumers hold `Arc<Semaphore>`
/// clones, so a semaphore may outlive its producer and is never moved after
/// construction.
pub struct Semaphore {
    num_stages: u64,
    stage: AtomicU64,
}

impl Semaphore {
    /// Create an independently allocated semaphore with `num_stages > 0`
    /// stages.
    pub fn new(num_stages: u64) -> Arc<Self> {
        assert!(num_stages > 0, "semaphore must have at least one stage");
        Arc::new(Self {
            num_stages,
            stage: AtomicU64::new(0),
        })
    }

    pub fn num_stages(&self) -> u64 {
        self.num_stages
    }

    /// Current stage. Acquire-ordered: observing stage `s` also makes all
    /// writes published before the signal of `s` visible.
    pub fn stage(&self) -> u64 {
        self.stage.load(Ordering::Acquire)
    }

    pub fn is_completed(&self) -> bool {
        self.stage() == self.num_stages
    }

    /// Advance to stage `next`, clamped to `num_stages`.
    ///
    /// Panics if `next` is below an already observed stage: stages must be
    /// signalled in monotonically non-decreasing order.
    pub fn signal(&self, next: u64) {
        let next = next.min(self.num_stages);
        let mut current = 0;
        loop {
            match self
                .stage
                .compare_exchange(current, next, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(observed) => {
                    assert!(
                        observed <= next,
                        "semaphore signalled backwards: stage {observed} -> {next}"
                    );
                    current = observed;
                }
            }
        }
    }

    /// Advance by up to `inc` stages, saturating at `num_stages`.
    /// An increment of `>= num_stages` drives the semaphore to completion.
    pub fn increment(&self, inc: u64) {
        let inc = inc.min(self.num_stages);
        let mut current = 0;
        let mut target = inc;
        while let Err(observed) =
            self.stage
                .compare_exchange(current, target, Ordering::Release, Ordering::Relaxed)
        {
            current = observed;
            target = observed.saturating_add(inc).min(self.num_stages);
        }
    }
}

const AWAIT_SLEEP: Duration = Duration::from_micros(100);

/// Block until the given `stages` are reached on the given semaphores, or
/// `timeout` elapses.
///
/// With `any == false` every semaphore must reach its stage; with
/// `any == true` one suffices. A stage of `u64::MAX` means completion of all
/// stages. A zero `timeout` makes this a single non-blocking poll; no
/// syscalls are made in that case.
pub fn await_semaphores(
    semaphores: &[Arc<Semaphore>],
    stages: &[u64],
    timeout: Duration,
    any: bool,
) -> bool {
    assert_eq!(semaphores.len(), stages.len());
    for (sem, &stage) in semaphores.iter().zip(stages) {
        assert!(
            stage == u64::MAX || stage <= sem.num_stages(),
            "awaited stage {stage} exceeds num_stages {}",
            sem.num_stages()
        );
    }

    // track which semaphores are still pending so each is re-checked at
    // most until it first reaches its stage
    let mut pending: SmallVec<[usize; 8]> = (0..semaphores.len()).collect();
    let begin = Instant::now();
    let mut poll = 0;

    loop {
        pending.retain(|i| {
            let target = stages[*i].min(semaphores[*i].num_stages());
            semaphores[*i].stage() < target
        });

        if pending.is_empty() || (any && pending.len() < semaphores.len()) {
            return true;
        }

        if begin.elapsed() >= timeout {
            return false;
        }

        sleepy_backoff(poll, AWAIT_SLEEP);
        poll += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signal_clamps_to_num_stages() {
        let sem = Semaphore::new(3);
        sem.signal(10);
        assert_eq!(sem.stage(), 3);
        assert!(sem.is_completed());
    }

    #[test]
    fn test_increment_saturates() {
        let sem = Semaphore::new(4);
        sem.increment(3);
        assert_eq!(sem.stage(), 3);
        sem.increment(3);
        assert_eq!(sem.stage(), 4);
        assert!(sem.is_completed());
    }

    #[test]
    #[should_panic(expected = "backwards")]
    fn test_signal_backwards_panics() {
        let sem = Semaphore::new(10);
        sem.signal(5);
        sem.signal(2);
    }

    #[test]
    fn test_concurrent_signals_converge() {
        // property 7: concurrent signal(1) and increment(5) converge to
        // min(max, num_stages) and the stage is never observed decreasing
        for _ in 0..50 {
            let sem = Semaphore::new(3);
            let a = sem.clone();
            let b = sem.clone();
            let ta = thread::spawn(move || a.signal(1));
            let tb = thread::spawn(move || b.increment(5));
            ta.join().unwrap();
            tb.join().unwrap();
            assert_eq!(sem.stage(), 3);
            assert!(sem.is_completed());
        }
    }

    #[test]
    fn test_await_zero_timeout_is_poll() {
        let sem = Semaphore::new(2);
        assert!(!await_semaphores(
            &[sem.clone()],
            &[2],
            Duration::ZERO,
            false
        ));
        sem.signal(2);
        assert!(await_semaphores(
            &[sem.clone()],
            &[2],
            Duration::ZERO,
            false
        ));
    }

    #[test]
    fn test_await_any() {
        let a = Semaphore::new(1);
        let b = Semaphore::new(1);
        b.signal(1);
        assert!(await_semaphores(
            &[a.clone(), b.clone()],
            &[1, 1],
            Duration::ZERO,
            true
        ));
        assert!(!await_semaphores(&[a, b], &[1, 1], Duration::ZERO, false));
    }

    #[test]
    fn test_await_cross_thread() {
        let sem = Semaphore::new(1);
        let producer = sem.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.signal(1);
        });
        assert!(await_semaphores(
            &[sem],
            &[u64::MAX],
            Duration::from_secs(5),
            false
        ));
        t.join().unwrap();
    }
}
