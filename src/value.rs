use std::{cell::RefCell, cmp::Ordering, fmt, rc::Rc};

/// Lists are shared so that "add to list" style blocks can mutate a list in
/// place and every binding holding it observes the change. A list never
/// contains itself, directly or through nested lists.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// A runtime value. `Null` is the sentinel produced by empty sockets and by
/// procedures that return nothing; it is never a native absence.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Bool(bool),
  Number(f64),
  Text(String),
  List(ListRef),
}

impl Value {
  pub fn list(items: Vec<Value>) -> Value {
    Value::List(Rc::new(RefCell::new(items)))
  }

  pub fn text(text: impl Into<String>) -> Value {
    Value::Text(text.into())
  }

  /// A copy of the items when the value is a list.
  pub fn items(&self) -> Option<Vec<Value>> {
    match self {
      Value::List(items) => Some(items.borrow().clone()),
      _ => None,
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  pub fn to_f64(&self) -> f64 {
    self.as_number().unwrap_or(0.)
  }

  /// Strict numeric view: `None` for null, lists and text that does not
  /// parse as a number.
  pub fn as_number(&self) -> Option<f64> {
    match self {
      Value::Null | Value::List(_) => None,
      Value::Bool(bool) => Some(if *bool { 1. } else { 0. }),
      Value::Number(number) => Some(*number),
      Value::Text(text) => {
        let text = text.trim();
        if text.is_empty() {
          None
        } else {
          text.parse::<f64>().ok()
        }
      }
    }
  }

  pub fn to_bool(&self) -> bool {
    match self {
      Value::Null => false,
      Value::Bool(bool) => *bool,
      Value::Number(number) => *number != 0. && !number.is_nan(),
      Value::Text(text) => !text.is_empty(),
      Value::List(_) => true,
    }
  }

  pub fn is_int(&self) -> bool {
    match self.as_number() {
      Some(number) => number.fract() == 0.,
      None => false,
    }
  }

  pub fn map_as_str<T, F: FnOnce(&str) -> T>(&self, map: F) -> T {
    match self {
      Value::Text(text) => map(text.as_str()),
      other => map(other.to_string().as_str()),
    }
  }

  /// Numeric comparison when both sides are numbers, otherwise a
  /// case-insensitive text comparison.
  pub fn compare(&self, other: &Value) -> Ordering {
    match (self, other) {
      (Value::Null, Value::Null) => Ordering::Equal,
      (Value::Null, _) => Ordering::Less,
      (_, Value::Null) => Ordering::Greater,
      _ => match (self.as_number(), other.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => self
          .to_string()
          .to_lowercase()
          .cmp(&other.to_string().to_lowercase()),
      },
    }
  }

  pub fn loosely_equals(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
      (Value::List(_), _) | (_, Value::List(_)) => false,
      _ => self.compare(other) == Ordering::Equal,
    }
  }

  /// Flattens the value into an ordered list of entity identifiers.
  pub fn entity_ids(&self) -> Vec<String> {
    match self {
      Value::Null => vec![],
      Value::List(items) => items
        .borrow()
        .iter()
        .flat_map(|item| item.entity_ids())
        .collect(),
      other => vec![other.to_string()],
    }
  }

  /// Whether `list` is this value or is nested somewhere inside it.
  pub fn reaches(&self, list: &ListRef) -> bool {
    match self {
      Value::List(items) => {
        Rc::ptr_eq(items, list) || items.borrow().iter().any(|item| item.reaches(list))
      }
      _ => false,
    }
  }

  /// A copy sharing no list with the original.
  pub fn detached(&self) -> Value {
    match self {
      Value::List(items) => Value::list(items.borrow().iter().map(Value::detached).collect()),
      other => other.clone(),
    }
  }

  pub fn from_entity_ids(ids: Vec<String>) -> Value {
    Value::list(ids.into_iter().map(Value::Text).collect())
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => Ok(()),
      Value::Bool(bool) => write!(f, "{bool}"),
      Value::Number(number) => {
        if number.fract() == 0. && number.abs() < 1e15 {
          write!(f, "{number:.0}")
        } else {
          write!(f, "{number}")
        }
      }
      Value::Text(text) => f.write_str(text),
      Value::List(items) => {
        let items = items.borrow();
        for (index, item) in items.iter().enumerate() {
          if index > 0 {
            f.write_str(",")?;
          }
          write!(f, "{item}")?;
        }
        Ok(())
      }
    }
  }
}

impl From<f64> for Value {
  fn from(number: f64) -> Self {
    Value::Number(number)
  }
}

impl From<bool> for Value {
  fn from(bool: bool) -> Self {
    Value::Bool(bool)
  }
}

impl From<&str> for Value {
  fn from(text: &str) -> Self {
    Value::Text(text.to_string())
  }
}

impl From<String> for Value {
  fn from(text: String) -> Self {
    Value::Text(text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn numbers_display_without_trailing_zero() {
    assert_eq!(Value::Number(5.).to_string(), "5");
    assert_eq!(Value::Number(2.5).to_string(), "2.5");
  }

  #[test]
  fn text_coerces_to_number_when_it_parses() {
    assert_eq!(Value::text(" 12 ").to_f64(), 12.);
    assert_eq!(Value::text("twelve").as_number(), None);
    assert_eq!(Value::Null.to_f64(), 0.);
  }

  #[test]
  fn compare_prefers_numeric_ordering() {
    assert_eq!(Value::text("10").compare(&Value::Number(9.)), Ordering::Greater);
    assert_eq!(Value::text("Apple").compare(&Value::text("apple")), Ordering::Equal);
    assert!(Value::Number(3.).loosely_equals(&Value::text("3")));
  }

  #[test]
  fn entity_ids_flatten_nested_lists() {
    let value = Value::list(vec![
      Value::text("a"),
      Value::list(vec![Value::text("b"), Value::Number(7.)]),
    ]);
    assert_eq!(value.entity_ids(), vec!["a", "b", "7"]);
    assert!(Value::Null.entity_ids().is_empty());
  }

  #[test]
  fn detached_copies_share_nothing() {
    let inner = Value::list(vec![Value::Number(1.)]);
    let outer = Value::list(vec![inner.clone(), Value::text("x")]);
    let Value::List(inner_ref) = &inner else { unreachable!() };
    assert!(outer.reaches(inner_ref));
    assert!(!Value::text("x").reaches(inner_ref));

    let copy = outer.detached();
    assert_eq!(copy, outer);
    assert!(!copy.reaches(inner_ref));
  }

  #[test]
  fn null_is_falsy_and_lists_are_shared() {
    assert!(!Value::Null.to_bool());
    let list = Value::list(vec![]);
    let alias = list.clone();
    if let Value::List(items) = &list {
      items.borrow_mut().push(Value::Number(1.));
    }
    assert_eq!(alias.to_string(), "1");
  }
}
