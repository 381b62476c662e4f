use std::{borrow::Cow, collections::HashMap, rc::Rc, time::Duration};

use derivative::Derivative;

use crate::{
  block::{Block, BlockRef},
  context::Context,
  entity::{Entity, GameModel},
  error::{BlockError, Diagnostics, Warning},
  input::ParamSpec,
  program::Program,
  scheduler::Scheduler,
  script::{CallStack, Frame},
  value::Value,
};

/// What the dispatcher does once a block's effect has run.
#[derive(Debug)]
pub enum ControlSignal {
  /// Move the active frame on to the given block.
  Advance(Option<BlockRef>),
  /// The effect already rearranged the stack; step it again as it is.
  Suspend,
  /// Hand a value to the frame that asked for it.
  Return(Value),
  Break,
  Continue,
  /// Unwind to the enclosing procedure definition.
  ProcedureReturn(Value),
  StopScripts(StopScope),
  /// Drop the whole stack.
  EndStack,
  /// Resume the stack on the next tick.
  Park,
  /// Snapshot the stack and resume it once the duration has passed.
  Sleep(Duration),
  /// Start a new stack now; the current one waits in the continuation queue.
  Spawn(CallStack),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopScope {
  /// Everything: this stack, both queues and all timers.
  AllScripts,
  /// Both queues and all timers; this stack carries on.
  OtherScripts,
  /// Scripts keep running.
  Sprites,
}

/// Structural properties the dispatcher needs without running a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockRole {
  /// `break` and `continue` unwind to the innermost frame of this kind.
  pub is_loop: bool,
  /// Started as a root, the block's body runs first and the block itself
  /// starts out entered.
  pub is_header: bool,
  /// The frame takes over its finished child's context.
  pub adopts_child_context: bool,
  /// Target of procedure returns.
  pub defines_procedure: bool,
}

impl BlockRole {
  pub fn looping() -> BlockRole {
    BlockRole {
      is_loop: true,
      ..BlockRole::default()
    }
  }

  pub fn header() -> BlockRole {
    BlockRole {
      is_header: true,
      ..BlockRole::default()
    }
  }
}

pub trait BlockBehavior {
  fn params<'a>(&'a self, block: &Block) -> Cow<'a, [ParamSpec]>;
  fn execute(&self, exec: &mut Exec) -> Result<ControlSignal, BlockError>;
  fn role(&self) -> BlockRole {
    BlockRole::default()
  }
}

type Effect = dyn Fn(&mut Exec) -> Result<ControlSignal, BlockError>;
type ParamsFn = dyn Fn(&Block) -> Vec<ParamSpec>;

#[derive(Derivative)]
#[derivative(Debug)]
enum Params {
  Fixed(Vec<ParamSpec>),
  Computed(#[derivative(Debug = "ignore")] Rc<ParamsFn>),
}

/// A behavior assembled from a parameter list and an effect closure.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Behavior {
  params: Params,
  #[derivative(Debug = "ignore")]
  effect: Rc<Effect>,
  role: BlockRole,
}

impl Behavior {
  pub fn new(
    params: Vec<ParamSpec>,
    effect: impl Fn(&mut Exec) -> Result<ControlSignal, BlockError> + 'static,
  ) -> Behavior {
    Behavior {
      params: Params::Fixed(params),
      effect: Rc::new(effect),
      role: BlockRole::default(),
    }
  }

  /// For variadic blocks whose parameters depend on the block's mutation.
  pub fn computed(
    params: impl Fn(&Block) -> Vec<ParamSpec> + 'static,
    effect: impl Fn(&mut Exec) -> Result<ControlSignal, BlockError> + 'static,
  ) -> Behavior {
    Behavior {
      params: Params::Computed(Rc::new(params)),
      effect: Rc::new(effect),
      role: BlockRole::default(),
    }
  }

  pub fn with_role(mut self, role: BlockRole) -> Behavior {
    self.role = role;
    self
  }
}

impl BlockBehavior for Behavior {
  fn params<'a>(&'a self, block: &Block) -> Cow<'a, [ParamSpec]> {
    match &self.params {
      Params::Fixed(params) => Cow::Borrowed(params.as_slice()),
      Params::Computed(params) => Cow::Owned(params(block)),
    }
  }

  fn execute(&self, exec: &mut Exec) -> Result<ControlSignal, BlockError> {
    (self.effect)(exec)
  }

  fn role(&self) -> BlockRole {
    self.role
  }
}

/// Block kind to behavior table. Built-ins are installed separately so
/// hosts can add or replace kinds.
#[derive(Default)]
pub struct Registry {
  behaviors: HashMap<String, Rc<dyn BlockBehavior>>,
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut kinds: Vec<&String> = self.behaviors.keys().collect();
    kinds.sort();
    f.debug_struct("Registry").field("kinds", &kinds).finish()
  }
}

impl Registry {
  pub fn new() -> Registry {
    Registry::default()
  }

  pub fn with_builtins() -> Registry {
    let mut registry = Registry::new();
    crate::blocks::install(&mut registry);
    registry
  }

  pub fn register(&mut self, kind: &str, behavior: impl BlockBehavior + 'static) {
    self.behaviors.insert(kind.to_string(), Rc::new(behavior));
  }

  pub fn contains(&self, kind: &str) -> bool {
    self.behaviors.contains_key(kind)
  }

  pub fn lookup(&self, kind: &str) -> Result<Rc<dyn BlockBehavior>, BlockError> {
    self
      .behaviors
      .get(kind)
      .cloned()
      .ok_or_else(|| BlockError::UnknownBlockKind(kind.to_string()))
  }

  /// Role of `kind`; unknown kinds have none.
  pub fn role(&self, kind: &str) -> BlockRole {
    self
      .behaviors
      .get(kind)
      .map(|behavior| behavior.role())
      .unwrap_or_default()
  }
}

/// Everything a block effect may touch while it runs.
pub struct Exec<'a> {
  pub block: &'a BlockRef,
  pub params: &'a HashMap<String, Value>,
  pub stack: &'a mut CallStack,
  /// Position of the executing block's frame in `stack`.
  pub index: usize,
  pub scheduler: &'a mut Scheduler,
  pub program: &'a Program,
  pub globals: &'a Context,
  pub model: &'a mut dyn GameModel,
  pub diagnostics: &'a mut Diagnostics,
}

impl<'a> Exec<'a> {
  pub fn id(&self) -> &str {
    &self.block.id
  }

  pub fn next(&self) -> Option<BlockRef> {
    self.block.next.clone()
  }

  pub fn frame(&self) -> &Frame {
    &self.stack[self.index]
  }

  pub fn frame_mut(&mut self) -> &mut Frame {
    &mut self.stack[self.index]
  }

  pub fn context(&self) -> Context {
    self.frame().context.clone()
  }

  pub fn warn(&mut self, warning: Warning) {
    self.diagnostics.warn(warning);
  }

  pub fn param(&self, name: &str) -> Value {
    self.params.get(name).cloned().unwrap_or(Value::Null)
  }

  pub fn is_empty(&self, name: &str) -> bool {
    self.param(name).is_null()
  }

  pub fn text(&self, name: &str) -> String {
    self.param(name).to_string()
  }

  /// Numeric parameter; empty sockets and non-numbers become 0 with a
  /// warning.
  pub fn number(&mut self, name: &str) -> f64 {
    match self.param(name) {
      Value::Null => {
        self.empty_socket(name);
        0.
      }
      value => match value.as_number() {
        Some(number) => number,
        None => {
          let warning = Warning::NotANumber {
            block: self.block.id.clone(),
            socket: name.to_string(),
          };
          self.warn(warning);
          0.
        }
      },
    }
  }

  /// Boolean parameter; empty sockets are false with a warning.
  pub fn boolean(&mut self, name: &str) -> bool {
    match self.param(name) {
      Value::Null => {
        self.empty_socket(name);
        false
      }
      value => value.to_bool(),
    }
  }

  pub fn empty_socket(&mut self, name: &str) {
    let warning = Warning::EmptySocket {
      block: self.block.id.clone(),
      socket: name.to_string(),
    };
    self.warn(warning);
  }

  pub fn entity_ids(&self, name: &str) -> Vec<String> {
    self.param(name).entity_ids()
  }

  /// Looks up an entity the block is about to use.
  pub fn entity(&self, id: &str) -> Result<&Entity, BlockError> {
    self
      .model
      .lookup_entity(id)
      .ok_or_else(|| BlockError::UnresolvableReference {
        block: self.block.id.clone(),
        entity: id.to_string(),
      })
  }

  /// Local binding first, then the game's globals.
  pub fn variable(&self, name: &str) -> Option<Value> {
    self
      .frame()
      .context
      .get(name)
      .or_else(|| self.globals.get(name))
  }

  /// Pushes a frame running `body` in this frame's context.
  pub fn push_body(&mut self, body: Option<BlockRef>) {
    let frame = Frame::new(body, self.context());
    self.stack.push(frame);
  }
}
