//! Vellum Task
//!
//! Cooperative multitasking primitives for UI-independent work:
//!
//! - **Backoff**: escalating spin → yield → sleep wait loops
//! - **Locks**: `SpinLock` and `ReadWriteLock` built on the backoff ladder
//! - **Timeline semaphores**: monotonically advancing stage counters that
//!   establish the only cross-task ordering in the system
//! - **Scheduler**: dedicated + worker thread pools with a cooperatively
//!   pumped main-thread queue
//!
//! Tasks are plain functions returning a re-queue bool; nothing here
//! suspends. Long-running work checkpoints internally and cancellation is
//! observed through shared [`StopToken`]s.

pub mod backoff;
pub mod lock;
pub mod scheduler;
pub mod semaphore;

pub use backoff::{sleepy_backoff, yielding_backoff};
pub use lock::{ReadWriteLock, SpinLock, StopToken};
pub use scheduler::{Scheduler, SchedulerConfig, TaskInfo, TaskPriority};
pub use semaphore::{await_semaphores, Semaphore};
