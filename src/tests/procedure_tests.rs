use serde_json::json;

use super::helpers::*;

fn is_null(value: serde_json::Value) -> serde_json::Value {
  json!({ "type": "is_null", "values": { "ENTITY": value } })
}

#[test]
fn value_call_without_return_yields_null() {
  let mut game = game(vec![
    define("nothing", &[], vec![trace("inside")]),
    on_start(vec![
      trace_value("null", is_null(call("nothing", "value", vec![]))),
      trace("after"),
    ]),
  ]);
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["inside", "null=true", "after"]);
}

#[test]
fn value_call_returns_through_nested_frames() {
  let double = define(
    "double",
    &["x"],
    vec![
      trace("doubling"),
      procedure_return(Some(arithmetic("MULTIPLY", Some(get("x")), Some(number(2.))))),
      trace("unreachable"),
    ],
  );
  let mut game = game(vec![
    double,
    on_start(vec![trace_value(
      "result",
      call_with("double", "value", vec![("x", number(21.))]),
    )]),
  ]);
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["doubling", "result=42"]);
  assert!(!game.interpreter.is_running());
}

#[test]
fn recursive_value_calls() {
  let fact = define(
    "fact",
    &["n"],
    vec![
      if_else(
        compare("LTE", get("n"), number(1.)),
        vec![procedure_return(Some(number(1.)))],
        vec![],
      ),
      procedure_return(Some(arithmetic(
        "MULTIPLY",
        Some(get("n")),
        Some(call_with(
          "fact",
          "value",
          vec![("n", arithmetic("MINUS", Some(get("n")), Some(number(1.))))],
        )),
      ))),
    ],
  );
  let mut game = game(vec![
    fact,
    on_start(vec![trace_value(
      "fact",
      call_with("fact", "value", vec![("n", number(5.))]),
    )]),
  ]);
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["fact=120"]);
}

#[test]
fn statement_call_runs_callee_then_continues() {
  let mut game = game(vec![
    define("greet", &["who"], vec![trace_value("hello", get("who"))]),
    on_start(vec![
      call_with("greet", "statement", vec![("who", text("world"))]),
      trace("after"),
    ]),
  ]);
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["hello=world", "after"]);
}

#[test]
fn arguments_do_not_leak_into_the_caller() {
  let mut game = game(vec![
    define("shadow", &["v"], vec![set("v", number(99.))]),
    on_start(vec![
      json!({
        "type": "variables_local",
        "fields": { "TEXT0": "v" },
        "values": { "DECL0": number(1.) },
        "mutation": { "items": 1 },
        "statements": { "STACK": chain(vec![
          call_with("shadow", "statement", vec![("v", get("v"))]),
          trace_value("v", get("v")),
        ]) }
      }),
    ]),
  ]);
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["v=1"]);
}

#[test]
fn thread_call_resumes_caller_after_queued_stacks() {
  let mut game = game(vec![
    define("worker", &[], vec![trace("worker")]),
    on_start(vec![call("worker", "thread", vec![]), trace("caller")]),
    on_start(vec![trace("second")]),
  ]);
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["worker", "second", "caller"]);
}

#[test]
fn unknown_procedure_aborts_only_that_stack() {
  let mut game = game(vec![
    on_start(vec![call("missing", "statement", vec![]), trace("unreachable")]),
    on_start(vec![trace("other")]),
  ]);
  game.interpreter.start_game();
  assert_eq!(game.log(), vec!["other"]);
  assert!(!game.interpreter.is_running());
}

#[test]
fn return_outside_procedure_aborts_the_stack() {
  let mut game = game(vec![on_start(vec![
    procedure_return(None),
    trace("unreachable"),
  ])]);
  game.interpreter.start_game();
  assert!(game.log().is_empty());
  assert!(!game.interpreter.is_running());
}
