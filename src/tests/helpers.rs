//! Builders for test programs and an interpreter with a `trace` block.
//!
//! `trace` records its `MSG` field, followed by `=<VALUE>` when its `VALUE`
//! socket holds something, so tests can assert on execution order.

use std::{
  cell::RefCell,
  rc::Rc,
  time::{Duration, Instant},
};

use serde_json::{json, Value as Json};

use crate::{
  entity::{Entity, World},
  input::ParamSpec,
  interpreter::Interpreter,
  project::Project,
  registry::{Behavior, ControlSignal},
};

pub type Trace = Rc<RefCell<Vec<String>>>;

pub struct Game {
  pub interpreter: Interpreter<World>,
  pub trace: Trace,
  pub now: Instant,
}

impl Game {
  pub fn log(&self) -> Vec<String> {
    self.trace.borrow().clone()
  }

  /// Advances the clock by `elapsed` and runs one tick.
  pub fn tick_after(&mut self, elapsed: Duration) {
    self.now += elapsed;
    self.interpreter.tick(self.now);
  }

  /// Ticks one frame at a time until nothing is left to run.
  pub fn run_to_completion(&mut self) {
    for _ in 0..1_000 {
      if !self.interpreter.is_running() {
        return;
      }
      self.tick_after(Duration::from_millis(33));
    }
    panic!("program did not finish");
  }
}

/// A game with one page holding `blocks` and the given entities.
pub fn game_with(blocks: Vec<Json>, entities: Vec<Entity>) -> Game {
  load(json!({ "max_calls": 10_000 }), blocks, entities)
}

pub fn game(blocks: Vec<Json>) -> Game {
  game_with(blocks, vec![])
}

pub fn load(config: Json, blocks: Vec<Json>, entities: Vec<Entity>) -> Game {
  let project = Project::from_value(json!({
    "config": config,
    "pages": [{ "id": "main", "blocks": blocks }]
  }))
  .expect("test project loads");
  let mut interpreter = Interpreter::from_project(project, World::from_entities(entities));
  let trace: Trace = Rc::default();
  let recorder = trace.clone();
  interpreter.registry_mut().register(
    "trace",
    Behavior::new(
      vec![ParamSpec::field("MSG"), ParamSpec::value("VALUE")],
      move |exec| {
        let message = exec.text("MSG");
        let entry = match exec.param("VALUE") {
          value if value.is_null() => message,
          value => format!("{message}={value}"),
        };
        recorder.borrow_mut().push(entry);
        Ok(ControlSignal::Advance(exec.next()))
      },
    ),
  );
  let now = interpreter.scheduler().now();
  Game {
    interpreter,
    trace,
    now,
  }
}

/// Links `blocks` through their `next` pointers, returning the head.
pub fn chain(blocks: Vec<Json>) -> Json {
  blocks.into_iter().rev().fold(Json::Null, |next, mut block| {
    if !next.is_null() {
      block["next"] = next;
    }
    block
  })
}

/// A `game_start` script running `body`.
pub fn on_start(body: Vec<Json>) -> Json {
  let mut root = json!({ "type": "game_start" });
  if !body.is_empty() {
    root["next"] = chain(body);
  }
  root
}

pub fn trace(message: &str) -> Json {
  json!({ "type": "trace", "fields": { "MSG": message } })
}

pub fn trace_value(message: &str, value: Json) -> Json {
  json!({ "type": "trace", "fields": { "MSG": message }, "values": { "VALUE": value } })
}

pub fn number(number: f64) -> Json {
  json!({ "type": "math_number", "fields": { "NUM": number } })
}

pub fn text(text: &str) -> Json {
  json!({ "type": "text", "fields": { "TEXT": text } })
}

pub fn get(name: &str) -> Json {
  json!({ "type": "variables_get", "fields": { "VAR": name } })
}

pub fn set(name: &str, value: Json) -> Json {
  json!({ "type": "variables_set", "fields": { "VAR": name }, "values": { "VALUE": value } })
}

pub fn arithmetic(op: &str, a: Option<Json>, b: Option<Json>) -> Json {
  let mut block = json!({ "type": "math_arithmetic", "fields": { "OP": op }, "values": {} });
  if let Some(a) = a {
    block["values"]["A"] = a;
  }
  if let Some(b) = b {
    block["values"]["B"] = b;
  }
  block
}

/// `for <var> from <from> to <to> by <step>` around `body`.
pub fn for_range(var: &str, from: f64, to: f64, step: f64, body: Vec<Json>) -> Json {
  let mut block = json!({
    "type": "controls_for_range",
    "fields": { "VAR": var },
    "values": { "FROM": number(from), "TO": number(to), "STEP": number(step) }
  });
  if !body.is_empty() {
    block["statements"] = json!({ "DO": chain(body) });
  }
  block
}

pub fn flow(kind: &str) -> Json {
  json!({ "type": "controls_flow_statements", "fields": { "FLOW": kind } })
}

pub fn wait(seconds: f64) -> Json {
  json!({ "type": "wait", "values": { "SECONDS": number(seconds) } })
}

/// A declared global, boxed so scripts can change it in place.
pub fn global(name: &str, value: Json) -> Json {
  json!({
    "type": "variables_init_global_type",
    "fields": { "VAR": name, "TYPE": "type:value" },
    "values": { "VALUE": value }
  })
}

pub fn compare(op: &str, a: Json, b: Json) -> Json {
  json!({ "type": "logic_compare", "fields": { "OP": op }, "values": { "A": a, "B": b } })
}

/// `if guard { then } else { otherwise }`; an empty `otherwise` leaves the
/// else branch out.
pub fn if_else(guard: Json, then: Vec<Json>, otherwise: Vec<Json>) -> Json {
  let mut block = json!({
    "type": "controls_if",
    "values": { "IF0": guard },
    "statements": { "DO0": chain(then) }
  });
  if !otherwise.is_empty() {
    block["statements"]["ELSE"] = chain(otherwise);
  }
  block
}

pub fn forever(body: Vec<Json>) -> Json {
  json!({ "type": "forever_loop", "statements": { "DO": chain(body) } })
}

/// A procedure taking boxed value parameters.
pub fn define(name: &str, parameters: &[&str], body: Vec<Json>) -> Json {
  json!({
    "type": "procedures_def",
    "fields": { "NAME": name },
    "mutation": { "parameters": value_parameters(parameters) },
    "statements": { "STACK": chain(body) }
  })
}

pub fn call(name: &str, call_type: &str, arguments: Vec<Json>) -> Json {
  let names: Vec<String> = (0..arguments.len()).map(|i| format!("p{i}")).collect();
  call_with(name, call_type, names.iter().map(String::as_str).zip(arguments).collect())
}

/// Like [`call`], but naming the parameters the callee declares.
pub fn call_with(name: &str, call_type: &str, arguments: Vec<(&str, Json)>) -> Json {
  let names: Vec<&str> = arguments.iter().map(|(name, _)| *name).collect();
  let mut block = json!({
    "type": "procedures_call",
    "fields": { "NAME": name },
    "values": {},
    "mutation": { "callType": call_type, "parameters": value_parameters(&names) }
  });
  for (index, (_, argument)) in arguments.into_iter().enumerate() {
    block["values"][format!("CALL{index}")] = argument;
  }
  block
}

pub fn procedure_return(value: Option<Json>) -> Json {
  match value {
    Some(value) => json!({
      "type": "procedures_return",
      "values": { "VALUE": value },
      "mutation": { "returnsValue": true }
    }),
    None => json!({ "type": "procedures_return" }),
  }
}

fn value_parameters(names: &[&str]) -> Json {
  names
    .iter()
    .map(|name| json!({ "name": name, "type": "type:value" }))
    .collect()
}
