//! Spin-based locks.
//!
//! Rarely-contended locks for very short critical sections: task queues,
//! counters. Both escalate through [`yielding_backoff`] under contention.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backoff::yielding_backoff;

/// A rarely-contended mutual exclusion lock.
///
/// Desirable for low-latency scenarios where the guarded operation takes
/// constant, very short time. Not suitable for frequently contended state.
pub struct SpinLock<T: ?Sized> {
    flag: AtomicBool,
    value: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

pub struct SpinGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            flag: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized> SpinLock<T> {
    pub fn lock(&self) -> SpinGuard<'_, T> {
        let mut poll = 0;
        while self
            .flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            yielding_backoff(poll);
            poll += 1;
        }
        SpinGuard { lock: self }
    }

    pub fn try_lock(&self) -> Option<SpinGuard<'_, T>> {
        self.flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinGuard { lock: self })
    }
}

impl<T: ?Sized> Deref for SpinGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: the flag is held for the guard's lifetime.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the flag is held for the guard's lifetime.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for SpinGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.flag.store(false, Ordering::Release);
    }
}

/// Reader/writer counters layered under a [`SpinLock`]; writers get
/// exclusivity, readers share.
pub struct ReadWriteLock<T: ?Sized> {
    state: SpinLock<RwState>,
    value: UnsafeCell<T>,
}

#[derive(Default)]
struct RwState {
    num_readers: usize,
    num_writers: usize,
}

unsafe impl<T: ?Sized + Send> Send for ReadWriteLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for ReadWriteLock<T> {}

pub struct ReadGuard<'a, T: ?Sized> {
    lock: &'a ReadWriteLock<T>,
}

pub struct WriteGuard<'a, T: ?Sized> {
    lock: &'a ReadWriteLock<T>,
}

impl<T> ReadWriteLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: SpinLock::new(RwState {
                num_readers: 0,
                num_writers: 0,
            }),
            value: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized> ReadWriteLock<T> {
    pub fn lock_read(&self) -> ReadGuard<'_, T> {
        let mut poll = 0;
        loop {
            {
                let mut state = self.state.lock();
                if state.num_writers == 0 {
                    state.num_readers += 1;
                    return ReadGuard { lock: self };
                }
            }
            yielding_backoff(poll);
            poll += 1;
        }
    }

    pub fn lock_write(&self) -> WriteGuard<'_, T> {
        let mut poll = 0;
        loop {
            {
                let mut state = self.state.lock();
                if state.num_writers == 0 && state.num_readers == 0 {
                    state.num_writers += 1;
                    return WriteGuard { lock: self };
                }
            }
            yielding_backoff(poll);
            poll += 1;
        }
    }
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: readers are admitted only while num_writers == 0.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.lock().num_readers -= 1;
    }
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: a writer is exclusive.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: a writer is exclusive.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.lock().num_writers -= 1;
    }
}

/// Shared cooperative-cancellation flag.
///
/// Tasks observe the token inside their bodies and terminate on their own;
/// the scheduler never preempts.
#[derive(Clone, Default)]
pub struct StopToken {
    stop: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronizes with `request_stop` on any thread.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}
