use std::{rc::Rc, time::Instant};

use crate::{
  block::{Block, BlockRef},
  context::Context,
  entity::GameModel,
  error::{BlockError, Diagnostics, Warning},
  input::{as_entity_list, entity_socket, resolve_entity_text, ParamKind, ParamSpec},
  program::Program,
  project::{Config, Project},
  registry::{ControlSignal, Exec, Registry, StopScope},
  scheduler::Scheduler,
  script::{CallStack, Frame, LoopContext},
  value::Value,
};

/// Outcome of one dispatcher step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  /// Something ran; step again.
  Continued,
  /// The evaluation ceiling was hit and the stack was requeued. The rest of
  /// the tick is given up.
  Yielded,
  /// Nothing is active.
  Idle,
}

/// Where the stepped stack goes next.
enum Disposition {
  Keep,
  Finish,
  Park,
  Sleep(std::time::Duration),
  Spawn(CallStack),
}

/// Decides whether an event root may start.
pub type Restriction = Box<dyn Fn(&Block) -> bool>;

/// The root's field `name` reads `value`.
pub fn field_equals(name: &str, value: &str) -> Restriction {
  let (name, value) = (name.to_string(), value.to_string());
  Box::new(move |block| block.field(&name) == Some(value.as_str()))
}

/// The root's field at `index` reads `value`.
pub fn field_at_equals(index: usize, value: &str) -> Restriction {
  let value = value.to_string();
  Box::new(move |block| block.field_at(index) == Some(value.as_str()))
}

/// The root's entity field names `entity`, its parent, or any entity.
pub fn entity_field_matches(name: &str, entity: &str, parent: Option<&str>) -> Restriction {
  let name = name.to_string();
  let entity = entity.to_string();
  let parent = parent.map(str::to_string);
  Box::new(move |block| match block.field(&name) {
    Some(text) if text.starts_with("any:") || text.starts_with("all:") => true,
    Some(text) => match text.strip_prefix("id:") {
      Some(id) => id == entity || parent.as_deref() == Some(id),
      None => false,
    },
    None => false,
  })
}

/// One running game session: the program, its block behaviors, the
/// scheduler and every call stack it holds, the game's global variables and
/// the game model scripts act on.
#[derive(Debug)]
pub struct Interpreter<M: GameModel> {
  pub config: Config,
  program: Program,
  registry: Registry,
  scheduler: Scheduler,
  globals: Context,
  diagnostics: Diagnostics,
  model: M,
}

impl<M: GameModel> Interpreter<M> {
  pub fn new(config: Config, program: Program, registry: Registry, model: M) -> Interpreter<M> {
    Interpreter {
      config,
      program,
      registry,
      scheduler: Scheduler::new(Instant::now()),
      globals: Context::new(),
      diagnostics: Diagnostics::default(),
      model,
    }
  }

  /// Interpreter for a loaded project with the built-in blocks.
  pub fn from_project(project: Project, model: M) -> Interpreter<M> {
    Interpreter::new(
      project.config,
      project.program,
      Registry::with_builtins(),
      model,
    )
  }

  pub fn program(&self) -> &Program {
    &self.program
  }

  pub fn registry_mut(&mut self) -> &mut Registry {
    &mut self.registry
  }

  pub fn scheduler(&self) -> &Scheduler {
    &self.scheduler
  }

  pub fn scheduler_mut(&mut self) -> &mut Scheduler {
    &mut self.scheduler
  }

  pub fn globals(&self) -> &Context {
    &self.globals
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn model_mut(&mut self) -> &mut M {
    &mut self.model
  }

  /// Warnings since the last [`Interpreter::take_warnings`]. The log holds
  /// at most [`crate::error::MAX_WARNINGS`]; hosts should drain it every tick.
  pub fn warnings(&self) -> &[Warning] {
    self.diagnostics.warnings()
  }

  pub fn take_warnings(&mut self) -> Vec<Warning> {
    self.diagnostics.drain()
  }

  /// True while any stack is running, queued or asleep.
  pub fn is_running(&self) -> bool {
    self.scheduler.has_work()
  }

  /// A stack for `root`: the root frame plus the frame that runs first.
  /// Header roots run their body first; other roots run the blocks that
  /// follow them and are evaluated themselves once those finish.
  pub fn root_stack(&self, page: &str, root: &BlockRef, context: Context) -> CallStack {
    let mut base = Frame::new(Some(root.clone()), context.clone());
    let successor = if self.registry.role(&root.kind).is_header {
      base.loop_context = Some(LoopContext::Entered);
      root.body().cloned()
    } else {
      root.next.clone()
    };
    CallStack::with_frames(page, vec![base, Frame::new(successor, context)])
  }

  pub fn start_stack(&mut self, page: &str, root: &BlockRef, context: Context) -> bool {
    let stack = self.root_stack(page, root, context);
    self.scheduler.start_stack(stack)
  }

  /// Starts every top-level `root_kind` block that passes all
  /// `restrictions`, each with its own copy of `context`. The first becomes
  /// active when the scheduler is idle; the rest queue behind it. Returns
  /// whether anything started.
  pub fn start_scripts_matching(
    &mut self,
    root_kind: &str,
    context: &Context,
    restrictions: &[Restriction],
  ) -> bool {
    let matches: Vec<(String, BlockRef)> = self
      .program
      .roots(root_kind)
      .filter(|&(_, block)| restrictions.iter().all(|restriction| restriction(block)))
      .map(|(page, block)| (page.to_string(), block.clone()))
      .collect();
    for (page, root) in &matches {
      self.start_stack(page, root, context.fork());
    }
    if !matches.is_empty() {
      log::debug!("started {} `{root_kind}` scripts", matches.len());
    }
    !matches.is_empty()
  }

  /// Initialises global variables, then starts the game's start scripts.
  /// Every initialiser has finished before the first start script runs.
  pub fn start_game(&mut self) -> bool {
    let context = Context::new();
    let mut started = self.start_scripts_matching("variables_init_global_type", &context, &[]);
    started |= self.start_scripts_matching("variables_init", &context, &[]);
    self.run_past_ceiling();
    started |= self.start_scripts_matching("game_start", &context, &[]);
    self.kick(started);
    started
  }

  pub fn key_pressed(&mut self, key: &str) -> bool {
    let context = Context::new();
    context.bind_raw("keyPressed", Value::text(key));
    let started = self.start_scripts_matching("key_pressed", &context, &[field_at_equals(0, key)]);
    self.kick(started);
    started
  }

  pub fn entity_clicked(&mut self, id: &str) -> bool {
    let context = Context::new();
    context.bind_raw("msg:VARIABLE_CLICKED_OBJECT", Value::text(id));
    let restriction = entity_field_matches("ENTITY", id, self.parent_of(id).as_deref());
    let started = self.start_scripts_matching("entity_clicked", &context, &[restriction]);
    self.kick(started);
    started
  }

  /// Both orderings of the pair are tried, so scripts fire whichever way
  /// round their entity fields name the two.
  pub fn entities_collided(&mut self, first: &str, second: &str) -> bool {
    let mut started = false;
    for (one, two) in [(first, second), (second, first)] {
      let context = Context::new();
      context.bind_raw("msg:VARIABLE_COLLIDEE_1", Value::text(one));
      context.bind_raw("msg:VARIABLE_COLLIDEE_2", Value::text(two));
      let restrictions = [
        entity_field_matches("ENTITY1", one, self.parent_of(one).as_deref()),
        entity_field_matches("ENTITY2", two, self.parent_of(two).as_deref()),
      ];
      started |= self.start_scripts_matching("when_collide", &context, &restrictions);
      if first == second {
        break;
      }
    }
    self.kick(started);
    started
  }

  pub fn message_received(&mut self, message: &str) -> bool {
    let context = Context::new();
    context.bind_raw("msg:VARIABLE_MESSAGE", Value::text(message));
    let started =
      self.start_scripts_matching("receive_message", &context, &[field_at_equals(0, message)]);
    self.kick(started);
    started
  }

  fn parent_of(&self, id: &str) -> Option<String> {
    self
      .model
      .lookup_entity(id)
      .and_then(|entity| entity.parent.clone())
  }

  fn kick(&mut self, started: bool) {
    if started {
      self.run();
      self.model.flush_mutations();
    }
  }

  /// One frame of the game: wakes expired timers, starts this tick's
  /// queued stacks and runs until idle or the evaluation ceiling. Queued
  /// model updates are flushed at the end.
  pub fn tick(&mut self, now: Instant) -> Step {
    self.scheduler.begin_tick(now);
    if self.scheduler.is_idle() {
      self.scheduler.resume_next();
    }
    let step = self.run();
    self.model.flush_mutations();
    step
  }

  pub fn run(&mut self) -> Step {
    loop {
      match self.step() {
        Step::Continued => continue,
        step => return step,
      }
    }
  }

  /// Like [`Interpreter::run`], but a stack requeued at the evaluation
  /// ceiling is picked up again straight away instead of waiting for the
  /// next tick.
  fn run_past_ceiling(&mut self) -> Step {
    loop {
      match self.run() {
        Step::Yielded => {
          self.scheduler.resume_next();
        }
        step => return step,
      }
    }
  }

  pub fn step(&mut self) -> Step {
    let Some(mut stack) = self.scheduler.take_active() else {
      return Step::Idle;
    };
    if stack.is_empty() {
      self.finish(stack);
      return Step::Continued;
    }
    if self.scheduler.count_evaluation(self.config.max_calls) {
      log::debug!("evaluation ceiling reached on page `{}`, yielding", stack.page);
      self.scheduler.reschedule(stack);
      return Step::Yielded;
    }
    match self.dispatch(&mut stack) {
      Ok(Disposition::Keep) => self.scheduler.set_active(stack),
      Ok(Disposition::Finish) => self.finish(stack),
      Ok(Disposition::Park) => {
        self.scheduler.queue_parallel_start(stack);
        self.scheduler.resume_next();
      }
      Ok(Disposition::Sleep(duration)) => {
        self.scheduler.suspend_for_duration(&stack, duration);
        self.scheduler.resume_next();
      }
      Ok(Disposition::Spawn(thread)) => {
        self.scheduler.set_active(stack);
        self.scheduler.interrupt_and_start_thread(thread);
      }
      Err(error) => {
        let block = stack
          .top()
          .and_then(|frame| frame.block.as_ref())
          .map(|block| block.id.as_str())
          .unwrap_or("");
        log::warn!("aborting stack on page `{}` at block `{block}`: {error}", stack.page);
        self.scheduler.resume_next();
      }
    }
    Step::Continued
  }

  fn finish(&mut self, stack: CallStack) {
    log::debug!("stack on page `{}` finished", stack.page);
    self.scheduler.resume_next();
  }

  fn dispatch(&mut self, stack: &mut CallStack) -> Result<Disposition, BlockError> {
    let top = stack.len() - 1;
    let Some(block) = stack[top].block.clone() else {
      return Ok(self.complete_frame(stack));
    };
    let behavior = self.registry.lookup(&block.kind)?;
    let specs = behavior.params(&block);
    if !self.resolve_params(stack, top, &block, &specs) {
      return Ok(Disposition::Keep);
    }

    let params = std::mem::take(&mut stack[top].params);
    let signal = behavior.execute(&mut Exec {
      block: &block,
      params: &params,
      stack: &mut *stack,
      index: top,
      scheduler: &mut self.scheduler,
      program: &self.program,
      globals: &self.globals,
      model: &mut self.model,
      diagnostics: &mut self.diagnostics,
    })?;
    // a block that is entered again keeps what it resolved
    if let Some(frame) = stack.frame_mut(top) {
      let same_block = frame
        .block
        .as_ref()
        .map_or(false, |current| Rc::ptr_eq(current, &block));
      if same_block && frame.params.is_empty() {
        frame.params = params;
      }
    }
    self.apply(signal, stack, top, &block)
  }

  /// Pops a finished frame and re-activates the one below.
  fn complete_frame(&mut self, stack: &mut CallStack) -> Disposition {
    let child = stack.pop();
    let Some(parent) = stack.top_index() else {
      return Disposition::Finish;
    };
    if let Some(child) = child {
      let adopts = stack[parent]
        .kind()
        .map_or(false, |kind| self.registry.role(kind).adopts_child_context);
      if adopts {
        stack[parent].context = child.context;
      }
    }
    Disposition::Keep
  }

  /// Resolves parameters in declared order. Returns false after pushing a
  /// frame for the first socket that still needs evaluating.
  fn resolve_params(
    &self,
    stack: &mut CallStack,
    top: usize,
    block: &BlockRef,
    specs: &[ParamSpec],
  ) -> bool {
    for spec in specs {
      if stack[top].params.contains_key(&spec.name) {
        continue;
      }
      let (socket, returns_entity) = match &spec.kind {
        ParamKind::Value { socket } => (block.value(socket), false),
        ParamKind::Entity { field } => (block.value(&entity_socket(field)), true),
        _ => (None, false),
      };
      if let Some(child) = socket {
        let frame = &mut stack[top];
        frame.pending_param = Some(spec.name.clone());
        let context = frame.context.clone();
        stack.push(Frame::value_request(child.clone(), context, top, returns_entity));
        return false;
      }
      let value = match &spec.kind {
        ParamKind::Value { .. } => Value::Null,
        ParamKind::Field { name } => block.field(name).map(Value::text).unwrap_or(Value::Null),
        ParamKind::Entity { field } => match block.field(field) {
          Some(text) => Value::from_entity_ids(resolve_entity_text(
            text,
            &stack[top].context,
            &self.globals,
            &self.model,
          )),
          None => Value::list(vec![]),
        },
        ParamKind::VariableName { socket } => block
          .value(socket)
          .and_then(|declarator| declarator.field_at(0))
          .map(Value::text)
          .unwrap_or(Value::Null),
      };
      stack[top].params.insert(spec.name.clone(), value);
    }
    true
  }

  fn apply(
    &mut self,
    signal: ControlSignal,
    stack: &mut CallStack,
    top: usize,
    block: &BlockRef,
  ) -> Result<Disposition, BlockError> {
    Ok(match signal {
      ControlSignal::Advance(next) => {
        stack[top].advance(next);
        Disposition::Keep
      }
      ControlSignal::Suspend => Disposition::Keep,
      ControlSignal::Return(value) => {
        let frame = &mut stack[top];
        let value = if frame.returns_entity {
          as_entity_list(value)
        } else {
          value
        };
        frame.advance(None);
        if let Some(parent) = frame.return_to.and_then(|parent| stack.frame_mut(parent)) {
          if let Some(slot) = parent.pending_param.take() {
            parent.params.insert(slot, value);
          }
        }
        Disposition::Keep
      }
      ControlSignal::Break => self.unwind_to_loop(stack, top, block, true),
      ControlSignal::Continue => self.unwind_to_loop(stack, top, block, false),
      ControlSignal::ProcedureReturn(value) => {
        let registry = &self.registry;
        let definition = stack
          .rposition(|frame| {
            frame
              .kind()
              .map_or(false, |kind| registry.role(kind).defines_procedure)
          })
          .ok_or_else(|| BlockError::ReturnOutsideProcedure {
            block: block.id.clone(),
          })?;
        let caller = stack[definition].return_to;
        stack.truncate(definition);
        if let Some(caller) = caller.and_then(|caller| stack.frame_mut(caller)) {
          if caller.call_pending {
            caller.return_value = Some(value);
          }
        }
        if stack.is_empty() {
          Disposition::Finish
        } else {
          Disposition::Keep
        }
      }
      ControlSignal::StopScripts(scope) => match scope {
        StopScope::AllScripts => {
          log::info!("stopping all scripts");
          self.scheduler.cancel_all_timers();
          self.scheduler.clear_all_queues();
          self.scheduler.clear_active_stack();
          Disposition::Finish
        }
        StopScope::OtherScripts => {
          log::info!("stopping other scripts");
          self.scheduler.cancel_all_timers();
          self.scheduler.clear_all_queues();
          stack[top].advance(block.next.clone());
          Disposition::Keep
        }
        StopScope::Sprites => {
          stack[top].advance(block.next.clone());
          Disposition::Keep
        }
      },
      ControlSignal::EndStack => Disposition::Finish,
      ControlSignal::Park => Disposition::Park,
      ControlSignal::Sleep(duration) => {
        stack[top].advance(block.next.clone());
        Disposition::Sleep(duration)
      }
      ControlSignal::Spawn(thread) => Disposition::Spawn(thread),
    })
  }

  /// Truncates the stack to the innermost loop that is running its body,
  /// which then decides whether to run again. A loop block waiting below as
  /// the successor of a conditional or call has not been entered and does
  /// not count.
  fn unwind_to_loop(
    &mut self,
    stack: &mut CallStack,
    top: usize,
    block: &BlockRef,
    stop: bool,
  ) -> Disposition {
    let registry = &self.registry;
    let target = stack.rposition(|frame| {
      frame.loop_context.is_some()
        && frame
          .kind()
          .map_or(false, |kind| registry.role(kind).is_loop)
    });
    match target {
      Some(index) => {
        stack.truncate(index + 1);
        if stop {
          stack[index].break_requested = true;
        }
      }
      None => {
        self.diagnostics.warn(Warning::StrayLoopControl {
          block: block.id.clone(),
        });
        stack[top].advance(block.next.clone());
      }
    }
    Disposition::Keep
  }
}
