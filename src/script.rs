use std::{
  cell::RefCell,
  collections::HashMap,
  ops::{Index, IndexMut},
  rc::Rc,
};

use crate::{
  block::BlockRef,
  context::{Binding, Context},
  value::{ListRef, Value},
};

/// Loop-private state that survives every re-entry into the same frame.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopContext {
  /// Header blocks (forever loops, procedure bodies, local scopes) that have
  /// already pushed their body once.
  Entered,
  Range { current: f64, end: f64, step: f64 },
  Items { index: usize, items: Vec<Value> },
}

/// One nesting level of a call stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  /// `None` once the frame has nothing left to run.
  pub block: Option<BlockRef>,
  pub context: Context,
  /// Resolved parameters of `block`; cleared whenever the frame advances.
  pub params: HashMap<String, Value>,
  /// Parameter slot waiting for the child frame currently above this one.
  pub pending_param: Option<String>,
  /// Set on frames evaluating an entity socket: their result is wrapped as
  /// an entity list before it reaches the parent.
  pub returns_entity: bool,
  /// Index of the frame that receives this frame's value.
  pub return_to: Option<usize>,
  pub loop_context: Option<LoopContext>,
  pub break_requested: bool,
  /// Written by a procedure return into the synchronous value call below it.
  pub return_value: Option<Value>,
  pub call_pending: bool,
}

impl Frame {
  pub fn new(block: Option<BlockRef>, context: Context) -> Frame {
    Frame {
      block,
      context,
      params: HashMap::new(),
      pending_param: None,
      returns_entity: false,
      return_to: None,
      loop_context: None,
      break_requested: false,
      return_value: None,
      call_pending: false,
    }
  }

  /// A frame evaluating a value socket for the frame at `return_to`.
  pub fn value_request(
    block: BlockRef,
    context: Context,
    return_to: usize,
    returns_entity: bool,
  ) -> Frame {
    Frame {
      returns_entity,
      return_to: Some(return_to),
      ..Frame::new(Some(block), context)
    }
  }

  pub fn kind(&self) -> Option<&str> {
    self.block.as_ref().map(|block| block.kind.as_str())
  }

  /// Moves the frame on to `next`, dropping everything that belonged to the
  /// block it just finished.
  pub fn advance(&mut self, next: Option<BlockRef>) {
    self.block = next;
    self.params.clear();
    self.pending_param = None;
    self.loop_context = None;
    self.break_requested = false;
    self.return_value = None;
    self.call_pending = false;
  }
}

/// One logical thread of script execution; the last frame is active.
#[derive(Debug, PartialEq)]
pub struct CallStack {
  /// Script page the stack was started from. Procedure lookups use it.
  pub page: String,
  frames: Vec<Frame>,
}

impl CallStack {
  pub fn new(page: &str) -> CallStack {
    CallStack {
      page: page.to_string(),
      frames: vec![],
    }
  }

  pub fn with_frames(page: &str, frames: Vec<Frame>) -> CallStack {
    CallStack {
      page: page.to_string(),
      frames,
    }
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn frames(&self) -> &[Frame] {
    &self.frames
  }

  pub fn frame(&self, index: usize) -> Option<&Frame> {
    self.frames.get(index)
  }

  pub fn frame_mut(&mut self, index: usize) -> Option<&mut Frame> {
    self.frames.get_mut(index)
  }

  pub fn top(&self) -> Option<&Frame> {
    self.frames.last()
  }

  pub fn top_mut(&mut self) -> Option<&mut Frame> {
    self.frames.last_mut()
  }

  pub fn top_index(&self) -> Option<usize> {
    self.frames.len().checked_sub(1)
  }

  pub fn push(&mut self, frame: Frame) {
    self.frames.push(frame);
  }

  pub fn pop(&mut self) -> Option<Frame> {
    self.frames.pop()
  }

  /// Slides `frame` in directly beneath the active frame, so it runs once
  /// the active frame completes.
  pub fn insert_below_top(&mut self, frame: Frame) {
    let index = self.frames.len().saturating_sub(1);
    self.frames.insert(index, frame);
  }

  pub fn truncate(&mut self, len: usize) {
    self.frames.truncate(len);
  }

  /// Index of the innermost frame satisfying `predicate`, scanning from the
  /// top down.
  pub fn rposition(&self, predicate: impl Fn(&Frame) -> bool) -> Option<usize> {
    self.frames.iter().rposition(predicate)
  }

  /// Copies every frame, context, cell and list reachable from the stack.
  /// Sharing inside the stack is preserved; nothing is shared with the
  /// original. Blocks are immutable and stay shared.
  pub fn deep_copy(&self) -> CallStack {
    let mut copier = DeepCopy::default();
    CallStack {
      page: self.page.clone(),
      frames: self
        .frames
        .iter()
        .map(|frame| copier.frame(frame))
        .collect(),
    }
  }
}

impl Index<usize> for CallStack {
  type Output = Frame;

  fn index(&self, index: usize) -> &Frame {
    &self.frames[index]
  }
}

impl IndexMut<usize> for CallStack {
  fn index_mut(&mut self, index: usize) -> &mut Frame {
    &mut self.frames[index]
  }
}

/// Detached copy of a suspended call stack, waiting on a timer.
#[derive(Debug)]
pub struct Snapshot {
  stack: CallStack,
}

impl Snapshot {
  pub fn capture(stack: &CallStack) -> Snapshot {
    Snapshot {
      stack: stack.deep_copy(),
    }
  }

  pub fn stack(&self) -> &CallStack {
    &self.stack
  }

  pub fn restore(self) -> CallStack {
    self.stack
  }
}

#[derive(Default)]
struct DeepCopy {
  contexts: HashMap<*const RefCell<HashMap<String, Binding>>, Context>,
  cells: HashMap<*const RefCell<Value>, Rc<RefCell<Value>>>,
  lists: HashMap<*const RefCell<Vec<Value>>, ListRef>,
}

impl DeepCopy {
  fn frame(&mut self, frame: &Frame) -> Frame {
    Frame {
      block: frame.block.clone(),
      context: self.context(&frame.context),
      params: frame
        .params
        .iter()
        .map(|(name, value)| (name.clone(), self.value(value)))
        .collect(),
      pending_param: frame.pending_param.clone(),
      returns_entity: frame.returns_entity,
      return_to: frame.return_to,
      loop_context: frame.loop_context.as_ref().map(|loop_context| match loop_context {
        LoopContext::Items { index, items } => LoopContext::Items {
          index: *index,
          items: items.iter().map(|item| self.value(item)).collect(),
        },
        other => other.clone(),
      }),
      break_requested: frame.break_requested,
      return_value: frame.return_value.as_ref().map(|value| self.value(value)),
      call_pending: frame.call_pending,
    }
  }

  fn context(&mut self, context: &Context) -> Context {
    if let Some(copy) = self.contexts.get(&context.key()) {
      return copy.clone();
    }
    let copy = Context::new();
    self.contexts.insert(context.key(), copy.clone());
    let bindings: Vec<(String, Binding)> = context.with_bindings(|bindings| {
      bindings
        .iter()
        .map(|(name, binding)| (name.clone(), binding.clone()))
        .collect()
    });
    for (name, binding) in bindings {
      let binding = self.binding(&binding);
      copy.bind(&name, binding);
    }
    copy
  }

  fn binding(&mut self, binding: &Binding) -> Binding {
    match binding {
      Binding::Raw(value) => Binding::Raw(self.value(value)),
      Binding::Cell(cell) => {
        let key = Rc::as_ptr(cell);
        if let Some(copy) = self.cells.get(&key) {
          return Binding::Cell(copy.clone());
        }
        let value = self.value(&cell.borrow());
        let copy = Rc::new(RefCell::new(value));
        self.cells.insert(key, copy.clone());
        Binding::Cell(copy)
      }
    }
  }

  fn value(&mut self, value: &Value) -> Value {
    match value {
      Value::List(items) => {
        let key = Rc::as_ptr(items);
        if let Some(copy) = self.lists.get(&key) {
          return Value::List(copy.clone());
        }
        let copy: ListRef = Rc::new(RefCell::new(vec![]));
        self.lists.insert(key, copy.clone());
        let copied: Vec<Value> = items.borrow().iter().map(|item| self.value(item)).collect();
        *copy.borrow_mut() = copied;
        Value::List(copy)
      }
      other => other.clone(),
    }
  }
}
