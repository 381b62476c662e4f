use crate::registry::{Behavior, ControlSignal, Registry};

/// Event roots. Their scripts run first; the root itself ends the stack.
const EVENT_KINDS: [&str; 5] = [
  "game_start",
  "key_pressed",
  "entity_clicked",
  "receive_message",
  "when_collide",
];

pub fn install(registry: &mut Registry) {
  for kind in EVENT_KINDS {
    registry.register(kind, Behavior::new(vec![], |_| Ok(ControlSignal::EndStack)));
  }
}
