use std::time::Duration;

use crate::{
  block::Block,
  error::BlockError,
  input::ParamSpec,
  registry::{Behavior, BlockRole, ControlSignal, Exec, Registry, StopScope},
  script::{CallStack, Frame, LoopContext},
  value::Value,
};

pub fn install(registry: &mut Registry) {
  let for_each = BlockRole {
    is_loop: true,
    adopts_child_context: true,
    ..BlockRole::default()
  };
  let forever = BlockRole {
    is_loop: true,
    is_header: true,
    ..BlockRole::default()
  };

  registry.register("controls_if", Behavior::computed(if_params, controls_if));
  registry.register(
    "controls_for_range",
    Behavior::new(
      vec![
        ParamSpec::value("FROM"),
        ParamSpec::value("TO"),
        ParamSpec::value("STEP"),
        ParamSpec::field("VAR"),
      ],
      range_loop,
    )
    .with_role(BlockRole::looping()),
  );
  registry.register(
    "controls_for_count",
    Behavior::new(
      vec![
        ParamSpec::value("FROM"),
        ParamSpec::value("TO"),
        ParamSpec::value("STEP"),
        ParamSpec::variable_name("VAR"),
      ],
      range_loop,
    )
    .with_role(BlockRole::looping()),
  );
  registry.register(
    "controls_for_each_list",
    Behavior::new(
      vec![ParamSpec::value("LIST"), ParamSpec::variable_name("VAR")],
      for_each_list,
    )
    .with_role(for_each),
  );
  registry.register(
    "controls_forEachEntity",
    Behavior::new(
      vec![ParamSpec::field("VAR"), ParamSpec::entity("ENTITY")],
      for_each_entity,
    )
    .with_role(for_each),
  );
  registry.register(
    "forever_loop",
    Behavior::new(vec![], forever_loop).with_role(forever),
  );
  registry.register(
    "forever_procedure",
    Behavior::new(vec![], forever_procedure).with_role(forever),
  );
  registry.register(
    "controls_flow_statements",
    Behavior::new(vec![ParamSpec::field("FLOW")], |exec| {
      Ok(match exec.text("FLOW").as_str() {
        "BREAK" => ControlSignal::Break,
        _ => ControlSignal::Continue,
      })
    }),
  );
  registry.register(
    "stop_blocks",
    Behavior::new(vec![ParamSpec::field("STOP_TYPE")], stop_blocks),
  );
  registry.register(
    "wait",
    Behavior::new(vec![ParamSpec::value("SECONDS")], |exec| {
      let seconds = exec.number("SECONDS");
      let duration = if seconds.is_finite() && seconds > 0. {
        Duration::from_secs_f64(seconds)
      } else {
        Duration::ZERO
      };
      Ok(ControlSignal::Sleep(duration))
    }),
  );
}

/// Guard sockets (`IF0`, `IF1`, ...) in block order.
fn if_params(block: &Block) -> Vec<ParamSpec> {
  block
    .values
    .iter()
    .filter(|socket| socket.name.starts_with("IF"))
    .map(|socket| ParamSpec::value(&socket.name))
    .collect()
}

fn controls_if(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let guards: Vec<String> = if_params(exec.block)
    .into_iter()
    .map(|param| param.name)
    .collect();
  let mut branch = None;
  let mut matched = false;
  for guard in guards {
    if exec.boolean(&guard) {
      let statement = format!("DO{}", &guard[2..]);
      branch = exec.block.statement(&statement).cloned();
      matched = true;
      break;
    }
  }
  if !matched {
    branch = exec.block.statement("ELSE").cloned();
  }
  let Some(branch) = branch else {
    return Ok(ControlSignal::Advance(exec.next()));
  };
  // the branch runs in this frame; what follows the conditional waits below
  let successor = Frame::new(exec.next(), exec.context());
  exec.frame_mut().advance(Some(branch));
  exec.stack.insert_below_top(successor);
  Ok(ControlSignal::Suspend)
}

fn range_loop(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let (current, end, step) = match exec.frame_mut().loop_context.take() {
    Some(LoopContext::Range { current, end, step }) => (current + step, end, step),
    _ => (exec.number("FROM"), exec.number("TO"), exec.number("STEP")),
  };
  let finished = current.is_nan()
    || (step > 0. && current > end)
    || (step < 0. && current < end)
    || step == 0.
    || exec.frame().break_requested;
  if finished {
    return Ok(ControlSignal::Advance(exec.next()));
  }
  let variable = exec.text("VAR");
  let frame = exec.frame_mut();
  frame.loop_context = Some(LoopContext::Range { current, end, step });
  frame.context.bind_cell(&variable, Value::Number(current));
  let body = exec.block.body().cloned();
  exec.push_body(body);
  Ok(ControlSignal::Suspend)
}

fn for_each_list(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let (index, items) = match exec.frame_mut().loop_context.take() {
    Some(LoopContext::Items { index, items }) => (index + 1, items),
    _ => {
      let list = exec.param("LIST");
      let items = match list.items() {
        Some(items) => items,
        None if list.is_null() => {
          exec.empty_socket("LIST");
          vec![]
        }
        None => vec![list],
      };
      (0, items)
    }
  };
  next_item(exec, index, items, true)
}

fn for_each_entity(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let (index, items) = match exec.frame_mut().loop_context.take() {
    Some(LoopContext::Items { index, items }) => (index + 1, items),
    _ => {
      let ids = exec.entity_ids("ENTITY");
      (0, ids.into_iter().map(Value::Text).collect())
    }
  };
  next_item(exec, index, items, false)
}

/// Binds item `index` and runs the body, or leaves the loop. Values are
/// boxed; entity ids are bound raw.
fn next_item(
  exec: &mut Exec,
  index: usize,
  items: Vec<Value>,
  boxed: bool,
) -> Result<ControlSignal, BlockError> {
  if index >= items.len() || exec.frame().break_requested {
    return Ok(ControlSignal::Advance(exec.next()));
  }
  let variable = exec.text("VAR");
  let item = items[index].clone();
  let frame = exec.frame_mut();
  if boxed {
    frame.context.bind_cell(&variable, item);
  } else {
    frame.context.bind_raw(&variable, item);
  }
  frame.loop_context = Some(LoopContext::Items { index, items });
  let body = exec.block.body().cloned();
  exec.push_body(body);
  Ok(ControlSignal::Suspend)
}

/// One pass per tick: the body runs, then the stack sleeps until the next
/// tick and runs it again.
fn forever_loop(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  if exec.frame().loop_context.is_none() {
    exec.frame_mut().loop_context = Some(LoopContext::Entered);
    let body = exec.block.body().cloned();
    exec.push_body(body);
    return Ok(ControlSignal::Suspend);
  }
  if exec.frame().break_requested {
    return Ok(ControlSignal::Advance(exec.next()));
  }
  let body = exec.block.body().cloned();
  exec.push_body(body);
  Ok(ControlSignal::Park)
}

/// Each pass queues the next one as a fresh stack for the next tick, so a
/// `break` only has to stop that from happening.
fn forever_procedure(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  if exec.frame().loop_context.is_none() {
    exec.frame_mut().loop_context = Some(LoopContext::Entered);
    let body = exec.block.body().cloned();
    exec.push_body(body);
    return Ok(ControlSignal::Suspend);
  }
  if !exec.frame().break_requested {
    let context = exec.context();
    let mut root = Frame::new(Some(exec.block.clone()), context.clone());
    root.loop_context = Some(LoopContext::Entered);
    let body = Frame::new(exec.block.body().cloned(), context);
    let stack = CallStack::with_frames(&exec.stack.page, vec![root, body]);
    exec.scheduler.queue_parallel_start(stack);
  }
  Ok(ControlSignal::Advance(None))
}

fn stop_blocks(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let scope = match exec.text("STOP_TYPE").as_str() {
    "ALL_SCRIPTS" | "ALL_SCRIPTS_SPRITES" => StopScope::AllScripts,
    "OTHER_SCRIPTS" => StopScope::OtherScripts,
    "ALL_SPRITES" => StopScope::Sprites,
    other => {
      log::warn!("block `{}` has unknown stop type `{other}`", exec.id());
      return Ok(ControlSignal::Advance(exec.next()));
    }
  };
  Ok(ControlSignal::StopScripts(scope))
}
