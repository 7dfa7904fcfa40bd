//! Static thread-pool scheduler.
//!
//! Two kinds of pool threads plus the main thread:
//!
//! - **dedicated threads** process latency-sensitive work (audio, video);
//!   each has its own queue and its own sleep interval
//! - **worker threads** process general work from one shared queue
//! - the **main-thread queue** is drained only inside
//!   [`Scheduler::execute_main_thread_work`] pump windows; work submitted
//!   there must be extremely light-weight and non-blocking
//!
//! Tasks on the same queue run out-of-order; only semaphores establish
//! cross-task ordering. Selection is starvation-resistant: the highest
//! priority wins only among tasks whose readiness age is within one
//! starvation window of the most-starved task, so a stream of high-priority
//! submissions cannot park an old low-priority task forever.
//!
//! Cancellation is in-task: bodies observe [`crate::StopToken`]s and return
//! `false`; the scheduler has no kill path.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::lock::{SpinLock, StopToken};

/// Scheduling priority. Higher wins within a starvation window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskPriority(pub u8);

impl TaskPriority {
    pub const LOW: Self = Self(0);
    pub const NORMAL: Self = Self(64);
    pub const HIGH: Self = Self(128);
    pub const CRITICAL: Self = Self(255);
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// How long a task may be outprioritized before it is considered starved
/// and competes regardless of priority.
const STARVATION_PERIOD: Duration = Duration::from_millis(64);

type TaskFn = Box<dyn FnMut(*mut u8) -> bool + Send>;
type InitFn = Box<dyn FnOnce(*mut u8) + Send>;
type PollFn = Box<dyn Fn(*mut u8) -> bool + Send>;
type UninitFn = Box<dyn Fn(*mut u8) + Send>;

/// Task description: body, context layout, and the callbacks that manage the
/// context block.
///
/// The scheduler allocates a block of `ctx_layout` bytes, runs `init` to
/// construct the task state into it, then on every turn runs `poll` and, if
/// ready, `task`. A `task` returning `true` is re-queued with the same
/// block; otherwise `uninit` destroys the state and the block is freed.
///
/// Use [`TaskInfo::with_state`] / [`TaskInfo::with_state_and_poll`] instead
/// of touching raw blocks.
pub struct TaskInfo {
    task: TaskFn,
    ctx_layout: Layout,
    init: InitFn,
    poll: PollFn,
    uninit: UninitFn,
    priority: TaskPriority,
}

impl TaskInfo {
    /// Task that is always ready.
    pub fn with_state<S, T>(state: S, task: T) -> Self
    where
        S: Send + 'static,
        T: FnMut(&mut S) -> bool + Send + 'static,
    {
        Self::with_state_and_poll(state, |_| true, task)
    }

    /// Task gated by a readiness poll. `poll` must be extremely
    /// light-weight and non-blocking.
    pub fn with_state_and_poll<S, P, T>(state: S, poll: P, mut task: T) -> Self
    where
        S: Send + 'static,
        P: Fn(&S) -> bool + Send + 'static,
        T: FnMut(&mut S) -> bool + Send + 'static,
    {
        let mut state = Some(state);
        Self {
            // Safety of every cast below: the block is allocated with
            // Layout::new::<S>() and initialized by `init` before any other
            // callback runs.
            task: Box::new(move |ctx| task(unsafe { &mut *(ctx as *mut S) })),
            ctx_layout: Layout::new::<S>(),
            init: Box::new(move |ctx| unsafe {
                (ctx as *mut S).write(state.take().expect("task init ran twice"));
            }),
            poll: Box::new(move |ctx| poll(unsafe { &*(ctx as *const S) })),
            uninit: Box::new(|ctx| unsafe { std::ptr::drop_in_place(ctx as *mut S) }),
            priority: TaskPriority::NORMAL,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Owned context block. The pointee was constructed by `TaskInfo::init` and
/// is destroyed by `TaskInfo::uninit` before deallocation.
struct TaskBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

// Safety: the block holds a `Send` state type (enforced by the TaskInfo
// constructors) and is only ever accessed by one thread at a time.
unsafe impl Send for TaskBlock {}

impl TaskBlock {
    fn alloc(layout: Layout) -> Self {
        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            // Safety: non-zero size.
            let raw = unsafe { std::alloc::alloc(layout) };
            NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout))
        };
        Self { ptr, layout }
    }

    fn free(self) {
        if self.layout.size() != 0 {
            // Safety: allocated with this exact layout in `alloc`.
            unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }
}

struct Scheduled {
    task: TaskFn,
    poll: PollFn,
    uninit: UninitFn,
    block: TaskBlock,
    priority: TaskPriority,
    ready_since: Instant,
}

impl Scheduled {
    fn new(info: TaskInfo) -> Self {
        let block = TaskBlock::alloc(info.ctx_layout);
        (info.init)(block.ptr.as_ptr());
        Self {
            task: info.task,
            poll: info.poll,
            uninit: info.uninit,
            block,
            priority: info.priority,
            ready_since: Instant::now(),
        }
    }

    fn finish(self) {
        (self.uninit)(self.block.ptr.as_ptr());
        self.block.free();
    }
}

type TaskQueue = SpinLock<Vec<Scheduled>>;

/// Pick the task to run next: the highest priority among entries within one
/// starvation window of the most-starved entry.
fn select_task(queue: &[Scheduled]) -> Option<usize> {
    let oldest = queue.iter().map(|t| t.ready_since).min()?;
    let window_end = oldest + STARVATION_PERIOD;

    queue
        .iter()
        .enumerate()
        .filter(|(_, t)| t.ready_since <= window_end)
        .max_by(|(_, a), (_, b)| {
            a.priority
                .cmp(&b.priority)
                // tie: prefer the longer-waiting task
                .then(b.ready_since.cmp(&a.ready_since))
        })
        .map(|(i, _)| i)
}

/// One sweep over a queue: select, poll, run, requeue or retire.
/// Returns true if a task body actually ran.
fn run_one(queue: &TaskQueue) -> bool {
    let mut scheduled = {
        let mut q = queue.lock();
        match select_task(&q) {
            Some(i) => q.swap_remove(i),
            None => return false,
        }
    };

    if !(scheduled.poll)(scheduled.block.ptr.as_ptr()) {
        // not ready: refresh its age so it cannot pin the starvation
        // window and shadow tasks that are actually runnable
        scheduled.ready_since = Instant::now();
        queue.lock().push(scheduled);
        return false;
    }

    if (scheduled.task)(scheduled.block.ptr.as_ptr()) {
        scheduled.ready_since = Instant::now();
        queue.lock().push(scheduled);
    } else {
        scheduled.finish();
    }
    true
}

fn drain_queue(queue: &TaskQueue) {
    let tasks = std::mem::take(&mut *queue.lock());
    for task in tasks {
        task.finish();
    }
}

struct SchedulerState {
    dedicated: Vec<TaskQueue>,
    worker: TaskQueue,
    main: TaskQueue,
    stop: StopToken,
}

/// Configuration: one sleep interval per pool thread. The vector lengths
/// decide the pool sizes.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub dedicated_thread_sleep: Vec<Duration>,
    pub worker_thread_sleep: Vec<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dedicated_thread_sleep: vec![Duration::from_micros(500)],
            worker_thread_sleep: vec![Duration::from_millis(1); 2],
        }
    }
}

/// Static thread-pool scheduler. Create one per process.
pub struct Scheduler {
    state: Arc<SchedulerState>,
    threads: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let state = Arc::new(SchedulerState {
            dedicated: config
                .dedicated_thread_sleep
                .iter()
                .map(|_| SpinLock::new(Vec::new()))
                .collect(),
            worker: SpinLock::new(Vec::new()),
            main: SpinLock::new(Vec::new()),
            stop: StopToken::new(),
        });

        let mut threads = Vec::new();

        for (i, &sleep) in config.dedicated_thread_sleep.iter().enumerate() {
            let state = state.clone();
            threads.push(
                thread::Builder::new()
                    .name(format!("vellum-dedicated-{i}"))
                    .spawn(move || {
                        tracing::debug!("dedicated thread {i} up, sleep interval {sleep:?}");
                        while !state.stop.is_stop_requested() {
                            if !run_one(&state.dedicated[i]) {
                                thread::sleep(sleep);
                            }
                        }
                        drain_queue(&state.dedicated[i]);
                    })
                    .expect("failed to spawn dedicated thread"),
            );
        }

        for (i, &sleep) in config.worker_thread_sleep.iter().enumerate() {
            let state = state.clone();
            threads.push(
                thread::Builder::new()
                    .name(format!("vellum-worker-{i}"))
                    .spawn(move || {
                        tracing::debug!("worker thread {i} up, sleep interval {sleep:?}");
                        while !state.stop.is_stop_requested() {
                            if !run_one(&state.worker) {
                                thread::sleep(sleep);
                            }
                        }
                    })
                    .expect("failed to spawn worker thread"),
            );
        }

        Self { state, threads }
    }

    pub fn num_dedicated_threads(&self) -> usize {
        self.state.dedicated.len()
    }

    /// Queue a task on dedicated thread `thread`.
    pub fn schedule_dedicated(&self, thread: usize, info: TaskInfo) {
        self.state.dedicated[thread].lock().push(Scheduled::new(info));
    }

    /// Queue a task on the shared worker pool.
    pub fn schedule_worker(&self, info: TaskInfo) {
        self.state.worker.lock().push(Scheduled::new(info));
    }

    /// Queue a task on the main thread. It only runs inside
    /// [`Scheduler::execute_main_thread_work`].
    pub fn schedule_main(&self, info: TaskInfo) {
        self.state.main.lock().push(Scheduled::new(info));
    }

    /// Pump the main-thread queue for at most `timeout`.
    ///
    /// Each currently queued task gets at most one turn per pump; tasks
    /// queued by running tasks wait for the next pump. A zero timeout still
    /// gives every already queued task one turn.
    pub fn execute_main_thread_work(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let turns = self.state.main.lock().len();
        for _ in 0..turns {
            run_one(&self.state.main);
            if Instant::now() >= deadline {
                break;
            }
        }
    }

    /// Cooperative shutdown: stop pool threads, then drop queued tasks
    /// without running them (their `uninit` still runs).
    pub fn join(mut self) {
        self.state.stop.request_stop();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        drain_queue(&self.state.worker);
        drain_queue(&self.state.main);
        for queue in &self.state.dedicated {
            drain_queue(queue);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.state.stop.request_stop();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        drain_queue(&self.state.worker);
        drain_queue(&self.state.main);
        for queue in &self.state.dedicated {
            drain_queue(queue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semaphore::{await_semaphores, Semaphore};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig {
            dedicated_thread_sleep: vec![Duration::from_micros(200)],
            worker_thread_sleep: vec![Duration::from_micros(200); 2],
        })
    }

    #[test]
    fn test_worker_runs_task() {
        let sched = scheduler();
        let sem = Semaphore::new(1);
        let producer = sem.clone();
        sched.schedule_worker(TaskInfo::with_state((), move |_| {
            producer.signal(1);
            false
        }));
        assert!(await_semaphores(
            &[sem],
            &[1],
            Duration::from_secs(5),
            false
        ));
        sched.join();
    }

    #[test]
    fn test_requeue_until_done() {
        let sched = scheduler();
        let sem = Semaphore::new(5);
        let producer = sem.clone();
        sched.schedule_worker(TaskInfo::with_state(0u64, move |count| {
            *count += 1;
            producer.increment(1);
            *count < 5
        }));
        assert!(await_semaphores(
            &[sem.clone()],
            &[5],
            Duration::from_secs(5),
            false
        ));
        sched.join();
        assert_eq!(sem.stage(), 5);
    }

    #[test]
    fn test_poll_gates_execution() {
        let sched = scheduler();
        let gate = Semaphore::new(1);
        let done = Semaphore::new(1);
        let observed = gate.clone();
        let producer = done.clone();
        sched.schedule_worker(TaskInfo::with_state_and_poll(
            (),
            move |_| observed.is_completed(),
            move |_| {
                producer.signal(1);
                false
            },
        ));
        assert!(!await_semaphores(
            &[done.clone()],
            &[1],
            Duration::from_millis(50),
            false
        ));
        gate.signal(1);
        assert!(await_semaphores(
            &[done],
            &[1],
            Duration::from_secs(5),
            false
        ));
        sched.join();
    }

    #[test]
    fn test_dedicated_thread_targeting() {
        let sched = scheduler();
        let sem = Semaphore::new(1);
        let producer = sem.clone();
        sched.schedule_dedicated(
            0,
            TaskInfo::with_state((), move |_| {
                assert!(thread::current()
                    .name()
                    .unwrap_or_default()
                    .starts_with("vellum-dedicated"));
                producer.signal(1);
                false
            }),
        );
        assert!(await_semaphores(
            &[sem],
            &[1],
            Duration::from_secs(5),
            false
        ));
        sched.join();
    }

    #[test]
    fn test_main_queue_only_runs_in_pump() {
        let sched = scheduler();
        let ran = Arc::new(AtomicU32::new(0));
        let counter = ran.clone();
        sched.schedule_main(TaskInfo::with_state((), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        }));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        sched.execute_main_thread_work(Duration::from_millis(10));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        sched.join();
    }

    #[test]
    fn test_state_dropped_on_shutdown_without_running() {
        struct Tracked(Arc<AtomicU32>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicU32::new(0));
        let sched = Scheduler::new(SchedulerConfig {
            dedicated_thread_sleep: Vec::new(),
            worker_thread_sleep: Vec::new(),
        });
        // no worker threads exist, so the task can never run
        sched.schedule_worker(TaskInfo::with_state(
            Tracked(drops.clone()),
            move |_| false,
        ));
        sched.join();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_selection_prefers_priority_within_window() {
        let queue: Vec<Scheduled> = vec![
            Scheduled::new(TaskInfo::with_state((), |_| false).with_priority(TaskPriority::LOW)),
            Scheduled::new(TaskInfo::with_state((), |_| false).with_priority(TaskPriority::HIGH)),
        ];
        assert_eq!(select_task(&queue), Some(1));
        for t in queue {
            t.finish();
        }
    }

    #[test]
    fn test_selection_rescues_starved_task() {
        let mut low =
            Scheduled::new(TaskInfo::with_state((), |_| false).with_priority(TaskPriority::LOW));
        low.ready_since = Instant::now() - STARVATION_PERIOD * 4;
        let high =
            Scheduled::new(TaskInfo::with_state((), |_| false).with_priority(TaskPriority::HIGH));
        // the fresh high-priority task is outside the starvation window of
        // the old low-priority task and must not be selected over it
        let queue = vec![high, low];
        assert_eq!(select_task(&queue), Some(1));
        for t in queue {
            t.finish();
        }
    }
}
