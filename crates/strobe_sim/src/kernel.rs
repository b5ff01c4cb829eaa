//! Simulation kernel: task scheduling, settle loop and simulated time.
//!
//! [`Simulator`] owns every spawned task and runs the event loop. Tasks are
//! plain futures polled on one thread; they talk to the kernel through a
//! cloneable [`SimHandle`] and through the [`Signal`]s they hold.
//!
//! One time step runs in phases:
//!
//! 1. timers due at this time fire;
//! 2. every runnable task is polled until it suspends;
//! 3. settle: pending writes land, value changes are recorded and edge
//!    triggers fire. Phases 2 and 3 repeat (delta cycles) until no write is
//!    pending;
//! 4. read-only point: read-only waiters resume. Anything they write waits
//!    for the next settle;
//! 5. time advances to the next timer.
//!
//! A task woken by an edge therefore reads the values that were settled
//! before the edge, and its own writes become visible one settle later.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Wake, Waker};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace, warn};

use crate::error::SimError;
use crate::signal::{mask, Signal, SignalCell, SignalId, MAX_WIDTH};
use crate::time::{SimTime, TimeUnit};
use crate::trigger::{Edge, TimerEntry, Trigger, TriggerKind, Waiter};
use crate::waveform::WaveformRecorder;
use crate::SimConfig;

/// Identifier of a spawned task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Returns the raw index.
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

type WakeQueue = Arc<Mutex<VecDeque<TaskId>>>;

fn lock(queue: &Mutex<VecDeque<TaskId>>) -> MutexGuard<'_, VecDeque<TaskId>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pushes its task back on the run queue when woken.
struct TaskWaker {
    id: TaskId,
    queue: WakeQueue,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let mut queue = lock(&self.queue);
        if !queue.contains(&self.id) {
            queue.push_back(self.id);
        }
    }
}

type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

/// A task spawned but not yet picked up by the scheduler.
struct NewTask {
    id: TaskId,
    name: String,
    future: LocalFuture,
}

/// A live task owned by the [`Simulator`].
struct TaskSlot {
    name: String,
    future: LocalFuture,
    waker: Waker,
}

/// A task that returned an error.
#[derive(Clone, Debug)]
pub struct TaskFailure {
    /// Name given at spawn time.
    pub task: String,
    /// Simulation time at which the task failed.
    pub at: SimTime,
    /// The error the task returned.
    pub error: SimError,
}

/// Totals reported after one or more runs.
#[derive(Clone, Debug)]
pub struct SimSummary {
    /// Simulation time when the last run ended.
    pub final_time: SimTime,
    /// Settle passes executed across all runs.
    pub total_deltas: u64,
    /// Tasks spawned so far, including each run's test task.
    pub tasks_spawned: u64,
    /// Every task failure recorded so far.
    pub failures: Vec<TaskFailure>,
}

/// Kernel state shared by the simulator, its handles and its signals.
pub(crate) struct Shared {
    now: Cell<SimTime>,
    next_signal: Cell<u32>,
    next_task: Cell<u64>,
    next_seq: Cell<u64>,
    signals: RefCell<Vec<Rc<SignalCell>>>,
    dirty: RefCell<Vec<Rc<SignalCell>>>,
    timers: RefCell<BinaryHeap<Reverse<TimerEntry>>>,
    edge_waiters: RefCell<HashMap<SignalId, Vec<(Edge, Waiter)>>>,
    read_only_waiters: RefCell<Vec<Waiter>>,
    spawned: RefCell<Vec<NewTask>>,
    wake_queue: WakeQueue,
    failures: RefCell<Vec<TaskFailure>>,
    rng: RefCell<StdRng>,
    recorder: RefCell<Option<Box<dyn WaveformRecorder>>>,
    traced: RefCell<HashSet<SignalId>>,
}

impl Shared {
    fn new(seed: u64) -> Self {
        Self {
            now: Cell::new(SimTime::zero()),
            next_signal: Cell::new(0),
            next_task: Cell::new(0),
            next_seq: Cell::new(0),
            signals: RefCell::new(Vec::new()),
            dirty: RefCell::new(Vec::new()),
            timers: RefCell::new(BinaryHeap::new()),
            edge_waiters: RefCell::new(HashMap::new()),
            read_only_waiters: RefCell::new(Vec::new()),
            spawned: RefCell::new(Vec::new()),
            wake_queue: Arc::new(Mutex::new(VecDeque::new())),
            failures: RefCell::new(Vec::new()),
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
            recorder: RefCell::new(None),
            traced: RefCell::new(HashSet::new()),
        }
    }

    pub(crate) fn mark_dirty(&self, cell: Rc<SignalCell>) {
        self.dirty.borrow_mut().push(cell);
    }

    pub(crate) fn register(&self, kind: TriggerKind, waiter: Waiter) {
        match kind {
            TriggerKind::Edge(id, edge) => {
                self.edge_waiters
                    .borrow_mut()
                    .entry(id)
                    .or_default()
                    .push((edge, waiter));
            }
            TriggerKind::ReadOnly => self.read_only_waiters.borrow_mut().push(waiter),
            TriggerKind::Timer(delay_fs) => {
                let seq = self.next_seq.get();
                self.next_seq.set(seq + 1);
                let due_fs = self.now.get().fs.saturating_add(delay_fs);
                self.timers.borrow_mut().push(Reverse(TimerEntry {
                    due_fs,
                    seq,
                    waiter,
                }));
            }
        }
    }

    fn has_pending_writes(&self) -> bool {
        !self.dirty.borrow().is_empty()
    }

    /// Applies pending writes and fires edge triggers. Returns false if
    /// nothing was pending.
    fn settle(&self) -> Result<bool, SimError> {
        let dirty = std::mem::take(&mut *self.dirty.borrow_mut());
        if dirty.is_empty() {
            return Ok(false);
        }
        let now = self.now.get().next_delta();
        self.now.set(now);

        let mut changes = Vec::new();
        for cell in dirty {
            let Some(new) = cell.pending.take() else {
                continue;
            };
            let old = cell.value.replace(new);
            if old != new {
                changes.push((cell.id, old, new));
            }
        }

        self.record_changes(now.fs, &changes)?;
        for (id, old, new) in changes {
            self.fire_edges(id, old, new);
        }
        Ok(true)
    }

    fn record_changes(
        &self,
        time_fs: u64,
        changes: &[(SignalId, u128, u128)],
    ) -> Result<(), SimError> {
        let mut recorder = self.recorder.borrow_mut();
        let Some(rec) = recorder.as_mut() else {
            return Ok(());
        };
        let traced = self.traced.borrow();
        for &(id, _, new) in changes {
            if traced.contains(&id) {
                rec.record_change(time_fs, id, new)?;
            }
        }
        Ok(())
    }

    fn fire_edges(&self, id: SignalId, old: u128, new: u128) {
        let hits: Vec<Waiter> = {
            let mut map = self.edge_waiters.borrow_mut();
            let Some(waiting) = map.get_mut(&id) else {
                return;
            };
            let (hit, keep): (Vec<_>, Vec<_>) = waiting
                .drain(..)
                .partition(|(edge, _)| edge.matches(old, new));
            *waiting = keep;
            hit.into_iter().map(|(_, waiter)| waiter).collect()
        };
        for waiter in hits {
            waiter.fire();
        }
    }

    fn fire_read_only(&self) -> usize {
        let waiting = std::mem::take(&mut *self.read_only_waiters.borrow_mut());
        let count = waiting.len();
        for waiter in waiting {
            waiter.fire();
        }
        count
    }

    fn next_timer_fs(&self) -> Option<u64> {
        self.timers.borrow().peek().map(|Reverse(entry)| entry.due_fs)
    }

    fn fire_timers(&self, up_to_fs: u64) {
        let mut due = Vec::new();
        {
            let mut timers = self.timers.borrow_mut();
            while timers
                .peek()
                .is_some_and(|Reverse(entry)| entry.due_fs <= up_to_fs)
            {
                if let Some(Reverse(entry)) = timers.pop() {
                    due.push(entry.waiter);
                }
            }
        }
        for waiter in due {
            waiter.fire();
        }
    }

    fn record_failure(&self, task: &str, error: SimError) {
        let at = self.now.get();
        warn!(task, %at, %error, "task failed");
        self.failures.borrow_mut().push(TaskFailure {
            task: task.to_string(),
            at,
            error,
        });
    }
}

/// Completion slot shared between a task and its [`JoinHandle`].
struct JoinState<T> {
    result: Option<Result<T, SimError>>,
    finished: bool,
    waker: Option<Waker>,
}

impl<T> JoinState<T> {
    fn complete(&mut self, result: Result<T, SimError>) {
        self.result = Some(result);
        self.finished = true;
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// Handle to a spawned task's result.
///
/// Awaiting the handle yields the task's `Result`. The result can be taken
/// once, either by awaiting or by [`try_take`](JoinHandle::try_take).
pub struct JoinHandle<T> {
    state: Rc<RefCell<JoinState<T>>>,
}

impl<T> JoinHandle<T> {
    /// Returns true once the task has returned, whether or not the result was taken.
    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    /// Takes the result if the task has finished.
    pub fn try_take(&self) -> Option<Result<T, SimError>> {
        self.state.borrow_mut().result.take()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, SimError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        match state.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Cloneable access to a running simulator from inside tasks.
#[derive(Clone)]
pub struct SimHandle {
    shared: Rc<Shared>,
}

impl SimHandle {
    pub(crate) fn from_shared(shared: Rc<Shared>) -> Self {
        Self { shared }
    }

    /// Returns the current simulation time.
    pub fn now(&self) -> SimTime {
        self.shared.now.get()
    }

    /// Creates a signal of `width` bits, initialized to 0.
    ///
    /// Signals created before the first run are recorded in the waveform.
    pub fn signal(&self, name: impl Into<String>, width: u32) -> Result<Signal, SimError> {
        let name = name.into();
        if width == 0 || width > MAX_WIDTH {
            return Err(SimError::config(format!(
                "signal '{name}' has width {width}; widths must be 1..={MAX_WIDTH}"
            )));
        }
        let id = SignalId::from_raw(self.shared.next_signal.get());
        self.shared.next_signal.set(id.as_raw() + 1);
        let cell = Rc::new(SignalCell::new(id, name, width));
        self.shared.signals.borrow_mut().push(Rc::clone(&cell));
        Ok(Signal {
            cell,
            shared: Rc::clone(&self.shared),
        })
    }

    /// Starts `future` as a new task. It first runs in the current step.
    pub fn spawn<T, F>(&self, name: &str, future: F) -> JoinHandle<T>
    where
        T: 'static,
        F: Future<Output = Result<T, SimError>> + 'static,
    {
        let name = name.to_string();
        let id = TaskId(self.shared.next_task.get());
        self.shared.next_task.set(id.0 + 1);

        let state = Rc::new(RefCell::new(JoinState {
            result: None,
            finished: false,
            waker: None,
        }));
        let task_state = Rc::clone(&state);
        let shared = Rc::clone(&self.shared);
        let task_name = name.clone();
        let wrapped = async move {
            let result = future.await;
            if let Err(error) = &result {
                shared.record_failure(&task_name, error.clone());
            }
            task_state.borrow_mut().complete(result);
        };

        debug!(task = %name, id = id.0, at = %self.now(), "task spawned");
        self.shared.spawned.borrow_mut().push(NewTask {
            id,
            name,
            future: Box::pin(wrapped),
        });
        JoinHandle { state }
    }

    /// Suspension point: resumes after `amount` of `unit` has elapsed.
    pub fn timer(&self, amount: u64, unit: TimeUnit) -> Trigger {
        self.timer_fs(unit.to_fs(amount))
    }

    /// Suspension point: resumes after `fs` femtoseconds. Zero completes at once.
    pub fn timer_fs(&self, fs: u64) -> Trigger {
        Trigger::new(Rc::clone(&self.shared), TriggerKind::Timer(fs))
    }

    /// Suspension point: resumes at the read-only point of the current step.
    pub fn read_only_point(&self) -> Trigger {
        Trigger::new(Rc::clone(&self.shared), TriggerKind::ReadOnly)
    }

    /// Draws a uniformly random value in `[0, 2^width - 1]` from the seeded source.
    pub fn random_bits(&self, width: u32) -> u128 {
        let max = mask(width);
        self.shared.rng.borrow_mut().gen_range(0..=max)
    }
}

/// The simulation kernel: owns every task and runs the event loop.
///
/// Construct with [`Simulator::new`], create signals, spawn background tasks
/// (clocks, watchdogs, drivers), then call [`run`](Simulator::run) with the
/// test body.
pub struct Simulator {
    shared: Rc<Shared>,
    tasks: HashMap<TaskId, TaskSlot>,
    config: SimConfig,
    total_deltas: u64,
    trace_started: bool,
}

impl Simulator {
    /// Creates an idle simulator at time zero.
    pub fn new(config: SimConfig) -> Self {
        Self {
            shared: Rc::new(Shared::new(config.seed)),
            tasks: HashMap::new(),
            config,
            total_deltas: 0,
            trace_started: false,
        }
    }

    /// Returns a handle usable from inside tasks.
    pub fn handle(&self) -> SimHandle {
        SimHandle::from_shared(Rc::clone(&self.shared))
    }

    /// Creates a signal; see [`SimHandle::signal`].
    pub fn signal(&self, name: impl Into<String>, width: u32) -> Result<Signal, SimError> {
        self.handle().signal(name, width)
    }

    /// Starts a background task; see [`SimHandle::spawn`].
    pub fn spawn<T, F>(&self, name: &str, future: F) -> JoinHandle<T>
    where
        T: 'static,
        F: Future<Output = Result<T, SimError>> + 'static,
    {
        self.handle().spawn(name, future)
    }

    /// Attaches a waveform recorder. Its header is written when the next run starts.
    pub fn set_recorder(&mut self, recorder: Box<dyn WaveformRecorder>) {
        *self.shared.recorder.borrow_mut() = Some(recorder);
        self.trace_started = false;
    }

    /// Returns the current simulation time.
    pub fn now(&self) -> SimTime {
        self.shared.now.get()
    }

    /// Returns the configuration this simulator was built with.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Returns every task failure recorded so far.
    pub fn failures(&self) -> Vec<TaskFailure> {
        self.shared.failures.borrow().clone()
    }

    /// Returns run totals.
    pub fn summary(&self) -> SimSummary {
        SimSummary {
            final_time: self.now(),
            total_deltas: self.total_deltas,
            tasks_spawned: self.shared.next_task.get(),
            failures: self.failures(),
        }
    }

    /// Runs the event loop until `test` completes.
    ///
    /// Background tasks keep running alongside the test and are left
    /// suspended when it returns. With `fail_fast` set, the first failure of
    /// any task started during this run ends the run with that error.
    pub fn run<T, F>(&mut self, test: F) -> Result<T, SimError>
    where
        T: 'static,
        F: Future<Output = Result<T, SimError>> + 'static,
    {
        self.start_trace()?;
        let baseline = self.shared.failures.borrow().len();
        let handle = self.handle().spawn("test", test);
        info!(at = %self.now(), "run started");

        let mut read_only_rounds = 0u32;
        loop {
            self.evaluate()?;
            if let Some(outcome) = self.outcome(&handle, baseline) {
                return self.conclude(outcome);
            }

            if self.shared.fire_read_only() > 0 {
                self.poll_ready();
                if let Some(outcome) = self.outcome(&handle, baseline) {
                    return self.conclude(outcome);
                }
                // Writes made at the read-only point settle in this step,
                // before the next timer can raise an edge.
                if self.shared.has_pending_writes() {
                    read_only_rounds += 1;
                    if read_only_rounds >= self.config.max_deltas {
                        return Err(SimError::DeltaCycleLimit {
                            fs: self.now().fs,
                            max_deltas: self.config.max_deltas,
                        });
                    }
                    continue;
                }
            }

            read_only_rounds = 0;
            self.advance()?;
        }
    }

    /// Polls tasks and settles writes until the current step is quiet.
    fn evaluate(&mut self) -> Result<(), SimError> {
        let mut deltas = 0u32;
        loop {
            self.poll_ready();
            if !self.shared.settle()? {
                return Ok(());
            }
            deltas += 1;
            self.total_deltas += 1;
            if deltas >= self.config.max_deltas {
                return Err(SimError::DeltaCycleLimit {
                    fs: self.now().fs,
                    max_deltas: self.config.max_deltas,
                });
            }
        }
    }

    /// Moves the clock to the next timer and fires everything due then.
    fn advance(&mut self) -> Result<(), SimError> {
        match self.shared.next_timer_fs() {
            Some(due) => {
                if let Some(limit) = self.config.time_limit {
                    if due > limit {
                        return Err(SimError::TimeLimitExceeded { limit_fs: limit });
                    }
                }
                let now = self.now().advance_to(due);
                self.shared.now.set(now);
                trace!(at = %now, "time advanced");
                self.shared.fire_timers(due);
                Ok(())
            }
            None => Err(SimError::Starved { at: self.now() }),
        }
    }

    fn poll_ready(&mut self) {
        loop {
            self.adopt_spawned();
            let next = lock(&self.shared.wake_queue).pop_front();
            let Some(id) = next else {
                break;
            };
            let Some(task) = self.tasks.get_mut(&id) else {
                continue;
            };
            let waker = task.waker.clone();
            let mut cx = Context::from_waker(&waker);
            if task.future.as_mut().poll(&mut cx).is_ready() {
                if let Some(done) = self.tasks.remove(&id) {
                    trace!(task = %done.name, at = %self.now(), "task finished");
                }
            }
        }
    }

    fn adopt_spawned(&mut self) {
        let spawned = std::mem::take(&mut *self.shared.spawned.borrow_mut());
        for new in spawned {
            let waker = Waker::from(Arc::new(TaskWaker {
                id: new.id,
                queue: Arc::clone(&self.shared.wake_queue),
            }));
            self.tasks.insert(
                new.id,
                TaskSlot {
                    name: new.name,
                    future: new.future,
                    waker,
                },
            );
            lock(&self.shared.wake_queue).push_back(new.id);
        }
    }

    fn outcome<T>(&self, handle: &JoinHandle<T>, baseline: usize) -> Option<Result<T, SimError>> {
        if let Some(outcome) = handle.try_take() {
            return Some(outcome);
        }
        if self.config.fail_fast {
            if let Some(failure) = self.shared.failures.borrow().get(baseline) {
                return Some(Err(failure.error.clone()));
            }
        }
        None
    }

    fn conclude<T>(&mut self, outcome: Result<T, SimError>) -> Result<T, SimError> {
        if let Some(rec) = self.shared.recorder.borrow_mut().as_mut() {
            rec.finalize()?;
        }
        match &outcome {
            Ok(_) => info!(at = %self.now(), deltas = self.total_deltas, "run passed"),
            Err(error) => warn!(at = %self.now(), %error, "run failed"),
        }
        outcome
    }

    /// Writes the waveform header and initial values on the first run.
    fn start_trace(&mut self) -> Result<(), SimError> {
        if self.trace_started {
            return Ok(());
        }
        self.trace_started = true;
        let mut recorder = self.shared.recorder.borrow_mut();
        let Some(rec) = recorder.as_mut() else {
            return Ok(());
        };
        let signals = self.shared.signals.borrow();
        let mut traced = self.shared.traced.borrow_mut();
        rec.begin_scope("bench")?;
        for cell in signals.iter() {
            rec.register_signal(cell.id, &cell.name, cell.width)?;
            traced.insert(cell.id);
        }
        rec.end_scope()?;
        let now = self.shared.now.get().fs;
        for cell in signals.iter() {
            rec.record_change(now, cell.id, cell.value.get())?;
        }
        Ok(())
    }
}
