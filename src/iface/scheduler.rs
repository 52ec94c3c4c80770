use core::cmp::Ordering;

use heapless::binary_heap::{BinaryHeap, Max};
use heapless::Vec;

use crate::storage::{Diagnostic, Diagnostics};
use crate::time::{Duration, Instant};
use crate::{Error, Result};

/// Number of tasks that can wait in a [TaskQueue].
pub const TASK_QUEUE_LEN: usize = 8;
/// Number of timers a [Timers] instance can run.
pub const MAX_TIMERS: usize = 4;

/// A unit of deferred work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Task {
    /// The DIO announcement timer expired.
    DioTimerFired,
    /// The DAO announcement timer expired.
    DaoTimerFired,
}

/// Scheduling priority of a task. Higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    Low,
    Rpl,
}

#[derive(Debug)]
struct Entry {
    priority: Priority,
    sequence: u32,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// Higher priority first, then older first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// A fixed-capacity priority queue of tasks, FIFO within a priority.
#[derive(Debug)]
pub struct TaskQueue {
    heap: BinaryHeap<Entry, Max, TASK_QUEUE_LEN>,
    next_sequence: u32,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub const fn new() -> Self {
        TaskQueue {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Queue a task. Returns `Err(Error::Exhausted)` when the queue is full.
    pub fn push(&mut self, task: Task, priority: Priority) -> Result<()> {
        let entry = Entry {
            priority,
            sequence: self.next_sequence,
            task,
        };
        self.heap.push(entry).map_err(|_| Error::Exhausted)?;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Ok(())
    }

    /// Take the next task to run.
    pub fn pop(&mut self) -> Option<Task> {
        self.heap.pop().map(|entry| entry.task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Handle to a timer started with [Timers::start_periodic].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerHandle(usize);

#[derive(Debug, Clone, Copy)]
struct Timer {
    task: Task,
    priority: Priority,
    period: Duration,
    started: Instant,
    running: bool,
}

impl Timer {
    fn deadline(&self) -> Instant {
        self.started + self.period
    }
}

/// Periodic timers that turn expiries into tasks.
///
/// Timers never run anything themselves: [poll] queues the task of every expired timer, and
/// whoever drains the [TaskQueue] runs it.
///
/// [poll]: #method.poll
#[derive(Debug)]
pub struct Timers {
    timers: Vec<Timer, MAX_TIMERS>,
    now: Instant,
}

impl Timers {
    pub fn new(now: Instant) -> Timers {
        Timers {
            timers: Vec::new(),
            now,
        }
    }

    /// Return the time of the last [poll].
    ///
    /// [poll]: #method.poll
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Start a timer that queues `task` every `period`, starting one period from now.
    pub fn start_periodic(
        &mut self,
        period: Duration,
        task: Task,
        priority: Priority,
    ) -> Result<TimerHandle> {
        let timer = Timer {
            task,
            priority,
            period,
            started: self.now,
            running: true,
        };
        self.timers.push(timer).map_err(|_| Error::Exhausted)?;
        Ok(TimerHandle(self.timers.len() - 1))
    }

    /// Change the period of a timer. The current round is rescheduled to end one new period
    /// after it started.
    pub fn set_period(&mut self, handle: TimerHandle, period: Duration) {
        if let Some(timer) = self.timers.get_mut(handle.0) {
            timer.period = period;
        }
    }

    /// Return the current period of a timer.
    pub fn period(&self, handle: TimerHandle) -> Option<Duration> {
        self.timers.get(handle.0).map(|timer| timer.period)
    }

    pub fn stop(&mut self, handle: TimerHandle) {
        if let Some(timer) = self.timers.get_mut(handle.0) {
            timer.running = false;
        }
    }

    /// Advance to `now` and queue the task of every expired timer. Each timer fires at most
    /// once per call; a timer that fell more than a period behind restarts from `now`.
    ///
    /// Returns the number of tasks queued.
    pub fn poll<const N: usize>(
        &mut self,
        now: Instant,
        queue: &mut TaskQueue,
        diagnostics: &mut Diagnostics<N>,
    ) -> usize {
        self.now = now;
        let mut fired = 0;

        for timer in self.timers.iter_mut().filter(|timer| timer.running) {
            let deadline = timer.deadline();
            if deadline > now {
                continue;
            }

            timer.started = if deadline + timer.period > now {
                deadline
            } else {
                now
            };

            match queue.push(timer.task, timer.priority) {
                Ok(()) => fired += 1,
                Err(_) => diagnostics.push(Diagnostic::TaskQueueFull),
            }
        }

        fired
    }

    /// Return the earliest deadline of a running timer.
    pub fn poll_at(&self) -> Option<Instant> {
        self.timers
            .iter()
            .filter(|timer| timer.running)
            .map(Timer::deadline)
            .min()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn queue_priority_then_fifo() {
        let mut queue = TaskQueue::new();
        queue.push(Task::DaoTimerFired, Priority::Low).unwrap();
        queue.push(Task::DioTimerFired, Priority::Rpl).unwrap();
        queue.push(Task::DaoTimerFired, Priority::Rpl).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(Task::DioTimerFired));
        assert_eq!(queue.pop(), Some(Task::DaoTimerFired));
        assert_eq!(queue.pop(), Some(Task::DaoTimerFired));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn queue_full() {
        let mut queue = TaskQueue::new();
        for _ in 0..TASK_QUEUE_LEN {
            queue.push(Task::DioTimerFired, Priority::Rpl).unwrap();
        }
        assert_eq!(
            queue.push(Task::DioTimerFired, Priority::Rpl),
            Err(Error::Exhausted)
        );
    }

    #[test]
    fn periodic_fires_each_period() {
        let mut timers = Timers::new(Instant::ZERO);
        let mut queue = TaskQueue::new();
        let mut diagnostics = Diagnostics::<4>::new();

        let handle = timers
            .start_periodic(Duration::from_millis(100), Task::DioTimerFired, Priority::Rpl)
            .unwrap();
        assert_eq!(timers.poll_at(), Some(Instant::from_millis(100)));

        assert_eq!(timers.poll(Instant::from_millis(99), &mut queue, &mut diagnostics), 0);
        assert_eq!(timers.poll(Instant::from_millis(100), &mut queue, &mut diagnostics), 1);
        assert_eq!(queue.pop(), Some(Task::DioTimerFired));
        assert_eq!(timers.poll_at(), Some(Instant::from_millis(200)));

        timers.set_period(handle, Duration::from_millis(50));
        assert_eq!(timers.period(handle), Some(Duration::from_millis(50)));
        assert_eq!(timers.poll_at(), Some(Instant::from_millis(150)));

        timers.stop(handle);
        assert_eq!(timers.poll_at(), None);
        assert_eq!(timers.poll(Instant::from_millis(1000), &mut queue, &mut diagnostics), 0);
    }

    #[test]
    fn late_poll_restarts_from_now() {
        let mut timers = Timers::new(Instant::ZERO);
        let mut queue = TaskQueue::new();
        let mut diagnostics = Diagnostics::<4>::new();

        timers
            .start_periodic(Duration::from_millis(100), Task::DaoTimerFired, Priority::Rpl)
            .unwrap();
        assert_eq!(timers.poll(Instant::from_millis(450), &mut queue, &mut diagnostics), 1);
        assert_eq!(timers.poll_at(), Some(Instant::from_millis(550)));
    }

    #[test]
    fn full_queue_is_reported() {
        let mut timers = Timers::new(Instant::ZERO);
        let mut queue = TaskQueue::new();
        let mut diagnostics = Diagnostics::<4>::new();
        for _ in 0..TASK_QUEUE_LEN {
            queue.push(Task::DaoTimerFired, Priority::Low).unwrap();
        }

        timers
            .start_periodic(Duration::from_millis(10), Task::DioTimerFired, Priority::Rpl)
            .unwrap();
        assert_eq!(timers.poll(Instant::from_millis(10), &mut queue, &mut diagnostics), 0);
        assert_eq!(diagnostics.pop(), Some(Diagnostic::TaskQueueFull));
    }
}
