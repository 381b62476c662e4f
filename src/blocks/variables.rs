use crate::{
  block::Block,
  error::BlockError,
  input::ParamSpec,
  registry::{Behavior, ControlSignal, Exec, Registry},
  script::LoopContext,
  value::Value,
};

pub fn install(registry: &mut Registry) {
  registry.register(
    "variables_init_global_type",
    Behavior::new(
      vec![
        ParamSpec::field("VAR"),
        ParamSpec::value("VALUE"),
        ParamSpec::field("TYPE"),
      ],
      init_global,
    ),
  );
  registry.register(
    "variables_init",
    Behavior::new(
      vec![
        ParamSpec::variable_name("VAR"),
        ParamSpec::value("VALUE"),
        ParamSpec::field("TYPE"),
      ],
      init_global,
    ),
  );
  registry.register("variables_local", Behavior::computed(local_params, local));
  registry.register(
    "variables_set",
    Behavior::new(
      vec![ParamSpec::field("VAR"), ParamSpec::value("VALUE")],
      |exec| {
        let (name, value) = (exec.text("VAR"), exec.param("VALUE"));
        if !exec.frame().context.set(&name, value.clone()) && !exec.globals.set(&name, value) {
          log::debug!("block `{}` sets unknown variable `{name}`", exec.id());
        }
        Ok(ControlSignal::Advance(exec.next()))
      },
    ),
  );
  registry.register(
    "variables_change_by",
    Behavior::new(
      vec![ParamSpec::field("VAR"), ParamSpec::value("VALUE")],
      |exec| {
        let name = exec.text("VAR");
        let delta = exec.number("VALUE");
        let context = exec.context();
        let changed = if context.contains(&name) {
          context.change_by(&name, delta)
        } else {
          exec.globals.change_by(&name, delta)
        };
        if !changed {
          log::debug!("block `{}` cannot change `{name}`", exec.id());
        }
        Ok(ControlSignal::Advance(exec.next()))
      },
    ),
  );
  registry.register(
    "variables_get",
    Behavior::new(vec![ParamSpec::field("VAR")], |exec| {
      let value = exec.variable(&exec.text("VAR")).unwrap_or(Value::Null);
      Ok(ControlSignal::Return(value))
    }),
  );
}

/// Assigns a game-wide variable, then ends the initialising script.
fn init_global(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let name = exec.text("VAR");
  let value = exec.param("VALUE");
  if exec.text("TYPE") == "type:value" {
    exec.globals.bind_cell(&name, value);
  } else {
    exec.globals.bind_raw(&name, value);
  }
  Ok(ControlSignal::EndStack)
}

/// `DECL<n>` initial values, one per declared local.
fn local_params(block: &Block) -> Vec<ParamSpec> {
  super::numbered_values("DECL", block.item_count())
}

/// Declares `TEXT<n>` locals, runs the body once, then moves on.
fn local(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  if exec.frame().loop_context.is_some() {
    return Ok(ControlSignal::Advance(exec.next()));
  }
  let context = exec.context();
  for index in 0..exec.block.item_count() {
    if let Some(name) = exec.block.field(&format!("TEXT{index}")) {
      context.bind_cell(name, exec.param(&format!("DECL{index}")));
    }
  }
  exec.frame_mut().loop_context = Some(LoopContext::Entered);
  let body = exec.block.body().cloned();
  exec.push_body(body);
  Ok(ControlSignal::Suspend)
}
