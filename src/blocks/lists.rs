use crate::{
  block::Block,
  error::BlockError,
  input::ParamSpec,
  random,
  registry::{Behavior, ControlSignal, Exec, Registry},
  value::Value,
};

pub fn install(registry: &mut Registry) {
  registry.register(
    "create_list",
    Behavior::computed(
      |block: &Block| super::numbered_values("ADD", block.item_count()),
      |exec| {
        let items = (0..exec.block.item_count())
          .map(|index| exec.param(&format!("ADD{index}")))
          .collect();
        Ok(ControlSignal::Return(Value::list(items)))
      },
    ),
  );
  registry.register(
    "list_length",
    Behavior::new(vec![ParamSpec::value("LIST")], |exec| {
      let length = items(exec).len();
      Ok(ControlSignal::Return(Value::Number(length as f64)))
    }),
  );
  registry.register(
    "item_from_list",
    Behavior::new(
      vec![ParamSpec::value("INDEX"), ParamSpec::value("LIST")],
      |exec| {
        let items = items(exec);
        let index = exec.number("INDEX");
        let item = position(index, items.len())
          .map(|index| items[index].clone())
          .unwrap_or(Value::Null);
        Ok(ControlSignal::Return(item))
      },
    ),
  );
  registry.register(
    "list_contains",
    Behavior::new(
      vec![ParamSpec::value("VAR"), ParamSpec::value("LIST")],
      |exec| {
        let item = exec.param("VAR");
        let found = items(exec).iter().any(|other| other.loosely_equals(&item));
        Ok(ControlSignal::Return(Value::Bool(found)))
      },
    ),
  );

  registry.register(
    "add_to_list",
    Behavior::new(
      vec![ParamSpec::value("LIST"), ParamSpec::value("VAR")],
      |exec| {
        let item = insertable(exec, "VAR");
        hybrid(exec, move |items| items.push(item))
      },
    ),
  );
  registry.register(
    "insert_into_list",
    Behavior::new(
      vec![
        ParamSpec::value("LIST"),
        ParamSpec::value("INDEX"),
        ParamSpec::value("VAR"),
      ],
      |exec| {
        let (index, item) = (exec.number("INDEX"), insertable(exec, "VAR"));
        hybrid(exec, move |items| {
          let at = position(index, items.len() + 1).unwrap_or(0);
          items.insert(at, item);
        })
      },
    ),
  );
  registry.register(
    "change_item_from_list",
    Behavior::new(
      vec![
        ParamSpec::value("LIST"),
        ParamSpec::value("INDEX"),
        ParamSpec::value("VAR"),
      ],
      |exec| {
        let (index, item) = (exec.number("INDEX"), insertable(exec, "VAR"));
        hybrid(exec, move |items| {
          if let Some(at) = position(index, items.len()) {
            items[at] = item;
          }
        })
      },
    ),
  );
  registry.register(
    "remove_from_list",
    Behavior::new(
      vec![ParamSpec::value("LIST"), ParamSpec::value("INDEX")],
      |exec| {
        let index = exec.number("INDEX");
        hybrid(exec, move |items| {
          if let Some(at) = position(index, items.len()) {
            items.remove(at);
          }
        })
      },
    ),
  );
  registry.register(
    "shuffle_list",
    Behavior::new(vec![ParamSpec::value("LIST")], |exec| {
      hybrid(exec, |items| {
        for last in (1..items.len()).rev() {
          items.swap(last, random::index(last + 1));
        }
      })
    }),
  );
  registry.register(
    "empty_list",
    Behavior::new(vec![ParamSpec::value("LIST")], |exec| {
      hybrid(exec, |items| items.clear())
    }),
  );
}

/// Items of the `LIST` parameter. A non-list value counts as a one-item
/// list; an empty socket as an empty one.
fn items(exec: &mut Exec) -> Vec<Value> {
  let list = exec.param("LIST");
  match list.items() {
    Some(items) => items,
    None if list.is_null() => {
      exec.empty_socket("LIST");
      vec![]
    }
    None => vec![list],
  }
}

/// Zero-based position for a one-based list index, clamped into `0..len`.
fn position(index: f64, len: usize) -> Option<usize> {
  if len == 0 {
    return None;
  }
  let index = if index.is_nan() { 1. } else { index.round() };
  Some((index.clamp(1., len as f64) as usize) - 1)
}

/// The `socket` parameter, ready to go into the `LIST` list. When changing
/// the list in place would make it contain itself, a detached copy goes in
/// instead.
fn insertable(exec: &Exec, socket: &str) -> Value {
  let item = exec.param(socket);
  match exec.param("LIST") {
    Value::List(list) if !exec.block.mutation.has_output && item.reaches(&list) => {
      log::debug!("block `{}` inserts a copy of a list holding its target", exec.id());
      item.detached()
    }
    _ => item,
  }
}

/// With an output the block returns a changed copy; as a statement it
/// changes the list in place, visible through every binding holding it.
fn hybrid(
  exec: &mut Exec,
  change: impl FnOnce(&mut Vec<Value>),
) -> Result<ControlSignal, BlockError> {
  if exec.block.mutation.has_output {
    let mut items = items(exec);
    change(&mut items);
    return Ok(ControlSignal::Return(Value::list(items)));
  }
  match exec.param("LIST") {
    Value::List(list) => change(&mut list.borrow_mut()),
    Value::Null => exec.empty_socket("LIST"),
    other => log::warn!("block `{}` cannot change non-list `{other}`", exec.id()),
  }
  Ok(ControlSignal::Advance(exec.next()))
}
