use crate::{
  context::{Binding, Context},
  entity::GameModel,
  random,
  value::Value,
};

/// How one parameter of a block is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
  /// An expression socket, evaluated in a child frame. Empty sockets resolve
  /// to `Value::Null`.
  Value { socket: String },
  /// Literal text stored on the block.
  Field { name: String },
  /// A list of entity ids, from the `<field>_SOCKET` expression when present,
  /// otherwise from the field text.
  Entity { field: String },
  /// The name held by a declarator block plugged into `socket`. The
  /// declarator is never evaluated.
  VariableName { socket: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
  pub name: String,
  pub kind: ParamKind,
}

impl ParamSpec {
  pub fn value(socket: &str) -> ParamSpec {
    ParamSpec {
      name: socket.to_string(),
      kind: ParamKind::Value {
        socket: socket.to_string(),
      },
    }
  }

  pub fn field(name: &str) -> ParamSpec {
    ParamSpec {
      name: name.to_string(),
      kind: ParamKind::Field {
        name: name.to_string(),
      },
    }
  }

  pub fn entity(field: &str) -> ParamSpec {
    ParamSpec {
      name: field.to_string(),
      kind: ParamKind::Entity {
        field: field.to_string(),
      },
    }
  }

  pub fn variable_name(socket: &str) -> ParamSpec {
    ParamSpec {
      name: socket.to_string(),
      kind: ParamKind::VariableName {
        socket: socket.to_string(),
      },
    }
  }
}

pub fn entity_socket(field: &str) -> String {
  format!("{field}_SOCKET")
}

/// Turns entity field text into ids.
///
/// `id:<id>` names one entity, `any:<kind>` and `all:<kind>` every entity of
/// a kind, `random:<kind>` one of them. `pointer:` text passes through
/// untouched. Anything else (optionally prefixed `userDefinedContext:`) is a
/// variable holding ids, looked up locally first and then globally. Ids are
/// not checked for existence here.
pub fn resolve_entity_text(
  text: &str,
  context: &Context,
  globals: &Context,
  model: &dyn GameModel,
) -> Vec<String> {
  if let Some(id) = text.strip_prefix("id:") {
    return vec![id.to_string()];
  }
  if let Some(kind) = text
    .strip_prefix("any:")
    .or_else(|| text.strip_prefix("all:"))
  {
    return model
      .list_entities(kind)
      .into_iter()
      .map(|entity| entity.id.clone())
      .collect();
  }
  if let Some(kind) = text.strip_prefix("random:") {
    let entities = model.list_entities(kind);
    if entities.is_empty() {
      return vec![];
    }
    return vec![entities[random::index(entities.len())].id.clone()];
  }
  if text.starts_with("pointer:") {
    return vec![text.to_string()];
  }
  let name = text.strip_prefix("userDefinedContext:").unwrap_or(text);
  match context.binding(name).or_else(|| globals.binding(name)) {
    Some(Binding::Cell(cell)) => match &*cell.borrow() {
      Value::Null => vec![],
      value => vec![value.to_string()],
    },
    Some(Binding::Raw(value)) => value.entity_ids(),
    None => vec![],
  }
}

/// Shapes a value produced for an entity socket into an id list.
pub fn as_entity_list(value: Value) -> Value {
  match value {
    Value::List(_) => value,
    Value::Null => Value::list(vec![]),
    other => Value::list(vec![other]),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entity::{Entity, World};

  fn world() -> World {
    World::from_entities(vec![
      Entity::new("1", "piece"),
      Entity::new("2", "piece"),
      Entity::new("3", "sound"),
    ])
  }

  #[test]
  fn prefixes_select_entities() {
    let (context, globals, world) = (Context::new(), Context::new(), world());
    assert_eq!(resolve_entity_text("id:9", &context, &globals, &world), vec!["9"]);
    assert_eq!(
      resolve_entity_text("all:piece", &context, &globals, &world),
      vec!["1", "2"]
    );
    assert_eq!(
      resolve_entity_text("any:sound", &context, &globals, &world),
      vec!["3"]
    );
    let random = resolve_entity_text("random:piece", &context, &globals, &world);
    assert_eq!(random.len(), 1);
    assert!(random[0] == "1" || random[0] == "2");
    assert!(resolve_entity_text("random:ghost", &context, &globals, &world).is_empty());
    assert_eq!(
      resolve_entity_text("pointer:active", &context, &globals, &world),
      vec!["pointer:active"]
    );
  }

  #[test]
  fn variables_hold_entity_ids() {
    let (context, globals, world) = (Context::new(), Context::new(), world());
    context.bind_raw("target", Value::list(vec![Value::text("2")]));
    context.bind_cell("boxed", Value::Number(1.));
    globals.bind_raw("player", Value::text("1"));

    assert_eq!(resolve_entity_text("target", &context, &globals, &world), vec!["2"]);
    assert_eq!(
      resolve_entity_text("userDefinedContext:boxed", &context, &globals, &world),
      vec!["1"]
    );
    assert_eq!(resolve_entity_text("player", &context, &globals, &world), vec!["1"]);
    assert!(resolve_entity_text("nobody", &context, &globals, &world).is_empty());
  }

  #[test]
  fn entity_results_are_wrapped() {
    assert_eq!(as_entity_list(Value::text("4")).entity_ids(), vec!["4"]);
    assert!(as_entity_list(Value::Null).entity_ids().is_empty());
  }
}
