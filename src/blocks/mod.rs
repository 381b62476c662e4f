//! Built-in block kinds.

use crate::{input::ParamSpec, registry::Registry};

mod control;
mod entities;
mod events;
mod lists;
mod operators;
mod procedures;
mod variables;

pub fn install(registry: &mut Registry) {
  control::install(registry);
  procedures::install(registry);
  variables::install(registry);
  events::install(registry);
  operators::install(registry);
  lists::install(registry);
  entities::install(registry);
}

/// `<prefix>0`, `<prefix>1`, ... value sockets, one per mutation item.
fn numbered_values(prefix: &str, count: usize) -> Vec<ParamSpec> {
  (0..count)
    .map(|index| ParamSpec::value(&format!("{prefix}{index}")))
    .collect()
}
