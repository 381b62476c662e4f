use crate::{
  entity::{ModelUpdate, UpdateOp},
  error::BlockError,
  input::ParamSpec,
  registry::{Behavior, ControlSignal, Exec, Registry},
  value::Value,
};

pub fn install(registry: &mut Registry) {
  registry.register(
    "is_entity_in_game",
    Behavior::new(vec![ParamSpec::entity("ENTITY")], |exec| {
      let ids = exec.entity_ids("ENTITY");
      let present = !ids.is_empty() && ids.iter().all(|id| exec.model.lookup_entity(id).is_some());
      Ok(ControlSignal::Return(Value::Bool(present)))
    }),
  );
  registry.register(
    "property_value",
    Behavior::new(
      vec![ParamSpec::entity("ENTITY"), ParamSpec::field("PROPERTY")],
      |exec| {
        let Some(id) = exec.entity_ids("ENTITY").into_iter().next() else {
          exec.empty_socket("ENTITY");
          return Ok(ControlSignal::Return(Value::Null));
        };
        let property = exec.text("PROPERTY");
        let value = exec.entity(&id)?.property(&property).cloned();
        Ok(ControlSignal::Return(value.unwrap_or(Value::Null)))
      },
    ),
  );
  registry.register(
    "set_property",
    Behavior::new(update_params(), |exec| update(exec, UpdateOp::Set)),
  );
  registry.register(
    "change_property",
    Behavior::new(update_params(), |exec| update(exec, UpdateOp::Change)),
  );
}

fn update_params() -> Vec<ParamSpec> {
  vec![
    ParamSpec::entity("ENTITY"),
    ParamSpec::field("PROPERTY"),
    ParamSpec::value("VALUE"),
  ]
}

/// Queues the change for every referenced entity. It lands at the next flush.
fn update(exec: &mut Exec, op: UpdateOp) -> Result<ControlSignal, BlockError> {
  let ids = exec.entity_ids("ENTITY");
  for id in &ids {
    exec.entity(id)?;
  }
  let value = match op {
    UpdateOp::Change => Value::Number(exec.number("VALUE")),
    _ => exec.param("VALUE"),
  };
  let property = exec.text("PROPERTY");
  if !ids.is_empty() {
    exec
      .model
      .queue_mutation(ModelUpdate::new(ids, op, &property, value));
  }
  Ok(ControlSignal::Advance(exec.next()))
}
