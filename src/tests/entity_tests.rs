use serde_json::{json, Value as Json};

use super::helpers::*;
use crate::{
  entity::{Entity, GameModel},
  value::Value,
};

fn pieces() -> Vec<Entity> {
  vec![
    Entity::new("1", "piece").with_property("score", Value::Number(1.)),
    Entity::new("2", "piece").with_property("score", Value::Number(5.)),
    Entity::new("9", "sound"),
  ]
}

fn property(entity: &str, name: &str) -> Json {
  json!({ "type": "property_value", "fields": { "ENTITY": entity, "PROPERTY": name } })
}

#[test]
fn property_updates_land_at_flush() {
  let mut game = game_with(
    vec![on_start(vec![
      json!({
        "type": "set_property",
        "fields": { "ENTITY": "id:1", "PROPERTY": "score" },
        "values": { "VALUE": number(10.) }
      }),
      trace_value("seen", property("id:1", "score")),
      json!({
        "type": "change_property",
        "fields": { "ENTITY": "all:piece", "PROPERTY": "score" },
        "values": { "VALUE": number(2.) }
      }),
    ])],
    pieces(),
  );
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["seen=1"]);
  let world = game.interpreter.model();
  assert_eq!(
    world.lookup_entity("1").unwrap().property("score"),
    Some(&Value::Number(12.))
  );
  assert_eq!(
    world.lookup_entity("2").unwrap().property("score"),
    Some(&Value::Number(7.))
  );
}

#[test]
fn entity_socket_overrides_the_field() {
  let mut game = game_with(
    vec![on_start(vec![trace_value(
      "score",
      json!({
        "type": "property_value",
        "fields": { "ENTITY": "id:1", "PROPERTY": "score" },
        "values": { "ENTITY_SOCKET": text("2") }
      }),
    )])],
    pieces(),
  );
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["score=5"]);
}

#[test]
fn missing_entity_aborts_the_stack() {
  let mut game = game_with(
    vec![on_start(vec![
      trace_value("score", property("id:404", "score")),
      trace("unreachable"),
    ])],
    pieces(),
  );
  game.interpreter.start_game();
  assert!(game.log().is_empty());
  assert!(!game.interpreter.is_running());
}

#[test]
fn for_each_entity_binds_ids() {
  let each = json!({
    "type": "controls_forEachEntity",
    "fields": { "VAR": "who", "ENTITY": "any:piece" },
    "statements": { "DO": trace_value("who", get("who")) }
  });
  let mut game = game_with(vec![on_start(vec![each, trace("done")])], pieces());
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["who=1", "who=2", "done"]);
}

#[test]
fn presence_checks() {
  let in_game = |entity: &str| json!({ "type": "is_entity_in_game", "fields": { "ENTITY": entity } });
  let mut game = game_with(
    vec![on_start(vec![
      trace_value("one", in_game("id:1")),
      trace_value("gone", in_game("id:404")),
      trace_value("sounds", in_game("all:sound")),
    ])],
    pieces(),
  );
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["one=true", "gone=false", "sounds=true"]);
}
