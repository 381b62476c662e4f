use std::cmp::Ordering;

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
    "math_number",
    Behavior::new(vec![ParamSpec::field("NUM")], |exec| {
      Ok(ControlSignal::Return(Value::Number(exec.number("NUM"))))
    }),
  );
  registry.register(
    "math_arithmetic",
    Behavior::new(
      vec![
        ParamSpec::field("OP"),
        ParamSpec::value("A"),
        ParamSpec::value("B"),
      ],
      arithmetic,
    ),
  );
  registry.register(
    "math_round",
    Behavior::new(vec![ParamSpec::field("OP"), ParamSpec::value("NUM")], round),
  );
  registry.register(
    "math_max_min",
    Behavior::computed(
      |block| {
        let mut params = vec![ParamSpec::field("OP")];
        params.extend(join_params(block));
        params
      },
      max_min,
    ),
  );
  registry.register(
    "math_random_int",
    Behavior::new(vec![ParamSpec::value("FROM"), ParamSpec::value("TO")], |exec| {
      let (from, to) = (exec.number("FROM"), exec.number("TO"));
      Ok(ControlSignal::Return(Value::Number(random::between(from, to))))
    }),
  );
  registry.register(
    "logic_boolean",
    Behavior::new(vec![ParamSpec::field("BOOL")], |exec| {
      Ok(ControlSignal::Return(Value::Bool(exec.text("BOOL") == "TRUE")))
    }),
  );
  registry.register(
    "logic_compare",
    Behavior::new(
      vec![
        ParamSpec::field("OP"),
        ParamSpec::value("A"),
        ParamSpec::value("B"),
      ],
      compare,
    ),
  );
  registry.register(
    "logic_operation",
    Behavior::new(
      vec![
        ParamSpec::field("OP"),
        ParamSpec::value("A"),
        ParamSpec::value("B"),
      ],
      |exec| {
        let (a, b) = (exec.boolean("A"), exec.boolean("B"));
        let result = match exec.text("OP").as_str() {
          "OR" => a || b,
          _ => a && b,
        };
        Ok(ControlSignal::Return(Value::Bool(result)))
      },
    ),
  );
  registry.register(
    "logic_negate",
    Behavior::new(vec![ParamSpec::value("BOOL")], |exec| {
      Ok(ControlSignal::Return(Value::Bool(!exec.boolean("BOOL"))))
    }),
  );
  registry.register(
    "null_block",
    Behavior::new(vec![], |_| Ok(ControlSignal::Return(Value::Null))),
  );
  registry.register(
    "is_null",
    Behavior::new(vec![ParamSpec::value("ENTITY")], |exec| {
      let value = exec.param("ENTITY");
      let null = match &value {
        Value::List(items) => items.borrow().is_empty(),
        other => other.is_null(),
      };
      Ok(ControlSignal::Return(Value::Bool(null)))
    }),
  );
  registry.register(
    "text",
    Behavior::new(vec![ParamSpec::field("TEXT")], |exec| {
      Ok(ControlSignal::Return(exec.param("TEXT")))
    }),
  );
  registry.register("text_join", Behavior::computed(join_params, join));
}

/// Keeps float noise such as `0.1 + 0.2` out of results.
fn limit_precision(number: f64) -> f64 {
  (number * 1e10).round() / 1e10
}

fn arithmetic(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  if exec.is_empty("A") && exec.is_empty("B") {
    exec.empty_socket("A");
    exec.empty_socket("B");
    return Ok(ControlSignal::Return(Value::Number(0.)));
  }
  let (a, b) = (exec.number("A"), exec.number("B"));
  let result = match exec.text("OP").as_str() {
    "ADD" => a + b,
    "MINUS" => a - b,
    "MULTIPLY" => a * b,
    "DIVIDE" => a / b,
    "POWER" => a.powf(b),
    "MOD" => {
      let result = a % b;
      if result != 0. && (result < 0.) != (b < 0.) {
        result + b
      } else {
        result
      }
    }
    other => {
      log::warn!("block `{}` has unknown operator `{other}`", exec.id());
      0.
    }
  };
  Ok(ControlSignal::Return(Value::Number(limit_precision(result))))
}

fn round(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let number = exec.number("NUM");
  let result = match exec.text("OP").as_str() {
    "ROUND" => number.round(),
    "ROUNDUP" => number.ceil(),
    "ROUNDDOWN" => number.floor(),
    "ABSOLUTE" => number.abs(),
    "NEGATIVE" => -number,
    "ROOT" if number < 0. => return Ok(ControlSignal::Return(Value::Null)),
    "ROOT" => limit_precision(number.sqrt()),
    other => {
      log::warn!("block `{}` has unknown rounding `{other}`", exec.id());
      number
    }
  };
  Ok(ControlSignal::Return(Value::Number(result)))
}

fn max_min(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let count = exec.block.item_count();
  if count == 0 {
    exec.empty_socket("ADD0");
    return Ok(ControlSignal::Return(Value::Number(0.)));
  }
  let max = exec.text("OP") != "MIN";
  let mut result: Option<f64> = None;
  for index in 0..count {
    let number = exec.number(&format!("ADD{index}"));
    result = Some(match result {
      Some(best) if max => best.max(number),
      Some(best) => best.min(number),
      None => number,
    });
  }
  Ok(ControlSignal::Return(Value::Number(result.unwrap_or(0.))))
}

fn compare(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  for socket in ["A", "B"] {
    if exec.is_empty(socket) {
      exec.empty_socket(socket);
      return Ok(ControlSignal::Return(Value::Bool(false)));
    }
  }
  let (a, b) = (exec.param("A"), exec.param("B"));
  let ordering = a.compare(&b);
  let result = match exec.text("OP").as_str() {
    "EQ" => a.loosely_equals(&b),
    "NEQ" => !a.loosely_equals(&b),
    "LT" => ordering == Ordering::Less,
    "LTE" => ordering != Ordering::Greater,
    "GT" => ordering == Ordering::Greater,
    "GTE" => ordering != Ordering::Less,
    other => {
      log::warn!("block `{}` has unknown comparison `{other}`", exec.id());
      false
    }
  };
  Ok(ControlSignal::Return(Value::Bool(result)))
}

fn join_params(block: &Block) -> Vec<ParamSpec> {
  super::numbered_values("ADD", block.item_count())
}

/// Empty pieces join as "".
fn join(exec: &mut Exec) -> Result<ControlSignal, BlockError> {
  let mut text = String::new();
  for index in 0..exec.block.item_count() {
    let name = format!("ADD{index}");
    if exec.is_empty(&name) {
      exec.empty_socket(&name);
    }
    text.push_str(&exec.text(&name));
  }
  Ok(ControlSignal::Return(Value::Text(text)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn precision_is_limited() {
    assert_eq!(limit_precision(0.1 + 0.2), 0.3);
    assert_eq!(limit_precision(2.5), 2.5);
  }
}
