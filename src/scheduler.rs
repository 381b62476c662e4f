use std::{
  collections::{BTreeMap, VecDeque},
  time::{Duration, Instant},
};

use crate::script::{CallStack, Snapshot};

pub type TimerId = u64;

#[derive(Debug)]
struct Timer {
  due: Instant,
  snapshot: Snapshot,
}

/// Holds every call stack that is not finished: the one running, the ones
/// waiting to resume, the ones starting next tick and the ones asleep.
#[derive(Debug)]
pub struct Scheduler {
  active: Option<CallStack>,
  continuation: VecDeque<CallStack>,
  tick_starts: Vec<CallStack>,
  timers: BTreeMap<TimerId, Timer>,
  next_timer: TimerId,
  eval_counter: u32,
  now: Instant,
}

impl Scheduler {
  pub fn new(now: Instant) -> Scheduler {
    Scheduler {
      active: None,
      continuation: VecDeque::new(),
      tick_starts: vec![],
      timers: BTreeMap::new(),
      next_timer: 0,
      eval_counter: 0,
      now,
    }
  }

  pub fn now(&self) -> Instant {
    self.now
  }

  pub fn is_idle(&self) -> bool {
    self.active.is_none()
  }

  /// True while anything could still run, now or later.
  pub fn has_work(&self) -> bool {
    self.active.is_some()
      || !self.continuation.is_empty()
      || !self.tick_starts.is_empty()
      || !self.timers.is_empty()
  }

  pub fn active(&self) -> Option<&CallStack> {
    self.active.as_ref()
  }

  pub fn continuation_len(&self) -> usize {
    self.continuation.len()
  }

  pub fn tick_start_len(&self) -> usize {
    self.tick_starts.len()
  }

  pub fn timer_count(&self) -> usize {
    self.timers.len()
  }

  pub fn eval_counter(&self) -> u32 {
    self.eval_counter
  }

  pub(crate) fn take_active(&mut self) -> Option<CallStack> {
    self.active.take()
  }

  pub(crate) fn set_active(&mut self, stack: CallStack) {
    self.active = Some(stack);
  }

  /// Makes `stack` active when idle, otherwise queues it behind the running
  /// stacks. Returns whether it became active.
  pub fn start_stack(&mut self, stack: CallStack) -> bool {
    if self.active.is_none() {
      log::debug!("starting stack on page `{}`", stack.page);
      self.active = Some(stack);
      true
    } else {
      self.continuation.push_back(stack);
      false
    }
  }

  /// Runs `stack` right away; the interrupted stack resumes after what is
  /// already queued.
  pub fn interrupt_and_start_thread(&mut self, stack: CallStack) {
    if let Some(interrupted) = self.active.replace(stack) {
      self.continuation.push_back(interrupted);
    }
  }

  /// Starts `stack` when the next tick begins.
  pub fn queue_parallel_start(&mut self, stack: CallStack) {
    self.tick_starts.push(stack);
  }

  /// Activates the next queued stack. With nothing queued the scheduler goes
  /// idle and the evaluation counter resets.
  pub fn resume_next(&mut self) -> bool {
    self.active = self.continuation.pop_front();
    if self.active.is_none() {
      self.eval_counter = 0;
    }
    self.active.is_some()
  }

  /// Snapshots `stack` and resumes the copy once `duration` has elapsed.
  pub fn suspend_for_duration(&mut self, stack: &CallStack, duration: Duration) -> TimerId {
    let id = self.next_timer;
    self.next_timer += 1;
    self.timers.insert(
      id,
      Timer {
        due: self.now + duration,
        snapshot: Snapshot::capture(stack),
      },
    );
    log::debug!("timer {id} set for {duration:?}");
    id
  }

  pub fn cancel_timer(&mut self, id: TimerId) -> bool {
    self.timers.remove(&id).is_some()
  }

  pub fn cancel_all_timers(&mut self) {
    if !self.timers.is_empty() {
      log::debug!("cancelling {} timers", self.timers.len());
    }
    self.timers.clear();
  }

  pub fn clear_all_queues(&mut self) {
    self.continuation.clear();
    self.tick_starts.clear();
  }

  pub fn clear_active_stack(&mut self) {
    self.active = None;
  }

  pub fn next_due(&self) -> Option<Instant> {
    self.timers.values().map(|timer| timer.due).min()
  }

  /// Counts one evaluation. At `ceiling` the counter resets and the caller
  /// must give up the rest of the tick.
  pub(crate) fn count_evaluation(&mut self, ceiling: u32) -> bool {
    self.eval_counter += 1;
    if self.eval_counter >= ceiling {
      self.eval_counter = 0;
      true
    } else {
      false
    }
  }

  /// Puts `stack` back at the head of the queue to pick up where it left off.
  pub(crate) fn reschedule(&mut self, stack: CallStack) {
    self.continuation.push_front(stack);
  }

  /// Starts a tick at `now`: expired timers resume ahead of everything
  /// already queued, earliest first, then this tick's fresh starts join the
  /// back of the queue.
  pub fn begin_tick(&mut self, now: Instant) {
    self.now = now;
    let mut expired: Vec<(Instant, TimerId)> = self
      .timers
      .iter()
      .filter(|(_, timer)| timer.due <= now)
      .map(|(id, timer)| (timer.due, *id))
      .collect();
    expired.sort();
    for (_, id) in expired.into_iter().rev() {
      if let Some(timer) = self.timers.remove(&id) {
        log::debug!("timer {id} expired");
        self.continuation.push_front(timer.snapshot.restore());
      }
    }
    self.continuation.extend(self.tick_starts.drain(..));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stack(page: &str) -> CallStack {
    CallStack::new(page)
  }

  #[test]
  fn resume_next_is_fifo_and_resets_when_idle() {
    let mut scheduler = Scheduler::new(Instant::now());
    assert!(scheduler.start_stack(stack("a")));
    assert!(!scheduler.start_stack(stack("b")));
    assert!(!scheduler.start_stack(stack("c")));
    scheduler.count_evaluation(150);

    assert!(scheduler.resume_next());
    assert_eq!(scheduler.active().unwrap().page, "b");
    assert!(scheduler.resume_next());
    assert_eq!(scheduler.active().unwrap().page, "c");
    assert_eq!(scheduler.eval_counter(), 1);
    assert!(!scheduler.resume_next());
    assert_eq!(scheduler.eval_counter(), 0);
  }

  #[test]
  fn interrupted_stack_waits_behind_the_queue() {
    let mut scheduler = Scheduler::new(Instant::now());
    scheduler.start_stack(stack("caller"));
    scheduler.start_stack(stack("queued"));
    scheduler.interrupt_and_start_thread(stack("thread"));
    assert_eq!(scheduler.active().unwrap().page, "thread");
    scheduler.resume_next();
    assert_eq!(scheduler.active().unwrap().page, "queued");
    scheduler.resume_next();
    assert_eq!(scheduler.active().unwrap().page, "caller");
  }

  #[test]
  fn expired_timers_jump_the_queue_in_due_order() {
    let start = Instant::now();
    let mut scheduler = Scheduler::new(start);
    scheduler.suspend_for_duration(&stack("late"), Duration::from_millis(300));
    scheduler.suspend_for_duration(&stack("early"), Duration::from_millis(100));
    scheduler.suspend_for_duration(&stack("never"), Duration::from_secs(60));
    scheduler.start_stack(stack("running"));
    scheduler.start_stack(stack("queued"));
    scheduler.queue_parallel_start(stack("fresh"));

    scheduler.begin_tick(start + Duration::from_millis(99));
    assert_eq!(scheduler.timer_count(), 3);

    scheduler.begin_tick(start + Duration::from_millis(500));
    assert_eq!(scheduler.timer_count(), 1);
    let mut order = vec![];
    while scheduler.resume_next() {
      order.push(scheduler.active().unwrap().page.clone());
    }
    assert_eq!(order, vec!["early", "late", "queued", "fresh"]);
  }

  #[test]
  fn trampoline_ceiling_resets_the_counter() {
    let mut scheduler = Scheduler::new(Instant::now());
    for _ in 0..2 {
      assert!(!scheduler.count_evaluation(3));
    }
    assert!(scheduler.count_evaluation(3));
    assert_eq!(scheduler.eval_counter(), 0);
  }

  #[test]
  fn stop_helpers_empty_everything() {
    let mut scheduler = Scheduler::new(Instant::now());
    scheduler.start_stack(stack("a"));
    scheduler.start_stack(stack("b"));
    scheduler.queue_parallel_start(stack("c"));
    scheduler.suspend_for_duration(&stack("d"), Duration::from_millis(1));
    scheduler.cancel_all_timers();
    scheduler.clear_all_queues();
    scheduler.clear_active_stack();
    assert!(!scheduler.has_work());
  }
}
