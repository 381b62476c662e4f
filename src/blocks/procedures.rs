use crate::{
  block::{Block, CallType},
  context::Context,
  error::BlockError,
  input::ParamSpec,
  registry::{Behavior, BlockRole, ControlSignal, Exec, Registry},
  script::{CallStack, Frame, LoopContext},
  value::Value,
};

pub fn install(registry: &mut Registry) {
  registry.register(
    "procedures_def",
    Behavior::new(vec![], |exec| {
      if exec.frame().loop_context.is_some() {
        return Ok(ControlSignal::Advance(None));
      }
      exec.frame_mut().loop_context = Some(LoopContext::Entered);
      let body = exec.block.body().cloned();
      exec.push_body(body);
      Ok(ControlSignal::Suspend)
    })
    .with_role(BlockRole {
      is_header: true,
      defines_procedure: true,
      ..BlockRole::default()
    }),
  );
  registry.register("procedures_call", Behavior::computed(call_params, call));
  registry.register(
    "procedures_return",
    Behavior::computed(
      |block| {
        if block.mutation.returns_value {
          vec![ParamSpec::value("VALUE")]
        } else {
          vec![]
        }
      },
      |exec| Ok(ControlSignal::ProcedureReturn(exec.param("VALUE"))),
    ),
  );
}

/// `NAME`, then one `CALL<n>` argument socket per declared parameter.
fn call_params(block: &Block) -> Vec<ParamSpec> {
  let mut params = vec![ParamSpec::field("NAME")];
  params.extend(super::numbered_values("CALL", block.mutation.parameters.len()));
  params
}

/// A fresh context holding the arguments. Value parameters are boxed.
fn arguments(exec: &Exec) -> Context {
  let context = Context::new();
  for (index, parameter) in exec.block.mutation.parameters.iter().enumerate() {
    let argument = exec.param(&format!("CALL{index}"));
    if parameter.is_value() {
      context.bind_cell(&parameter.name, argument);
    } else {
      context.bind_raw(&parameter.name, argument);
    }
  }
  context
}

fn call(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let call_type = exec.block.call_type();
  if call_type == CallType::Value {
    if let Some(value) = exec.frame_mut().return_value.take() {
      return Ok(ControlSignal::Return(value));
    }
    if exec.frame().call_pending {
      return Ok(ControlSignal::Return(Value::Null));
    }
  }

  let name = exec.text("NAME");
  let page = exec.stack.page.clone();
  let definition = match exec.program.find_procedure(&page, &name) {
    Some(definition) => definition.clone(),
    None => return Err(BlockError::UnknownProcedure { page, name }),
  };
  let context = arguments(exec);
  match call_type {
    CallType::Thread => {
      let next = exec.next();
      exec.frame_mut().advance(next);
      let mut root = Frame::new(Some(definition.clone()), context.clone());
      root.loop_context = Some(LoopContext::Entered);
      let body = Frame::new(definition.body().cloned(), context);
      Ok(ControlSignal::Spawn(CallStack::with_frames(
        &page,
        vec![root, body],
      )))
    }
    CallType::Statement => {
      let next = exec.next();
      exec.frame_mut().advance(next);
      exec.stack.push(Frame::new(Some(definition), context));
      Ok(ControlSignal::Suspend)
    }
    CallType::Value => {
      exec.frame_mut().call_pending = true;
      let mut frame = Frame::new(Some(definition), context);
      frame.return_to = Some(exec.index);
      exec.stack.push(frame);
      Ok(ControlSignal::Suspend)
    }
  }
}
