use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::value::Value;

/// A variable binding. Value-typed variables live in a boxed cell so every
/// frame sharing the context mutates the same slot; entity references are
/// stored raw and replaced wholesale on assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
  Raw(Value),
  Cell(Rc<RefCell<Value>>),
}

impl Binding {
  pub fn cell(value: Value) -> Binding {
    Binding::Cell(Rc::new(RefCell::new(value)))
  }

  pub fn get(&self) -> Value {
    match self {
      Binding::Raw(value) => value.clone(),
      Binding::Cell(cell) => cell.borrow().clone(),
    }
  }

  pub fn is_cell(&self) -> bool {
    matches!(self, Binding::Cell(_))
  }
}

/// Variable bindings of one logical thread. Cloning a `Context` shares it;
/// use [`Context::fork`] for an independent copy.
#[derive(Debug, Clone, Default)]
pub struct Context(Rc<RefCell<HashMap<String, Binding>>>);

impl Context {
  pub fn new() -> Context {
    Context::default()
  }

  pub fn from_bindings(bindings: HashMap<String, Binding>) -> Context {
    Context(Rc::new(RefCell::new(bindings)))
  }

  /// Shallow copy: a fresh map holding the same bindings.
  pub fn fork(&self) -> Context {
    Context::from_bindings(self.0.borrow().clone())
  }

  pub fn ptr_eq(&self, other: &Context) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }

  pub fn get(&self, name: &str) -> Option<Value> {
    self.0.borrow().get(name).map(Binding::get)
  }

  pub fn binding(&self, name: &str) -> Option<Binding> {
    self.0.borrow().get(name).cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.borrow().contains_key(name)
  }

  pub fn bind(&self, name: &str, binding: Binding) {
    self.0.borrow_mut().insert(name.to_string(), binding);
  }

  pub fn bind_raw(&self, name: &str, value: Value) {
    self.bind(name, Binding::Raw(value));
  }

  pub fn bind_cell(&self, name: &str, value: Value) {
    self.bind(name, Binding::cell(value));
  }

  /// Assigns an existing variable: boxed cells are updated in place, raw
  /// bindings are replaced. Returns `false` when the name is unbound.
  pub fn set(&self, name: &str, value: Value) -> bool {
    let mut bindings = self.0.borrow_mut();
    match bindings.get_mut(name) {
      Some(Binding::Cell(cell)) => {
        *cell.borrow_mut() = value;
        true
      }
      Some(binding) => {
        *binding = Binding::Raw(value);
        true
      }
      None => false,
    }
  }

  /// Adds `delta` to a boxed numeric variable. Raw bindings are left alone.
  pub fn change_by(&self, name: &str, delta: f64) -> bool {
    match self.0.borrow().get(name) {
      Some(Binding::Cell(cell)) => {
        let current = cell.borrow().to_f64();
        *cell.borrow_mut() = Value::Number(current + delta);
        true
      }
      _ => false,
    }
  }

  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.0.borrow().keys().cloned().collect();
    names.sort();
    names
  }

  pub(crate) fn with_bindings<T>(&self, f: impl FnOnce(&HashMap<String, Binding>) -> T) -> T {
    f(&self.0.borrow())
  }

  pub(crate) fn key(&self) -> *const RefCell<HashMap<String, Binding>> {
    Rc::as_ptr(&self.0)
  }
}

impl PartialEq for Context {
  fn eq(&self, other: &Self) -> bool {
    self.ptr_eq(other) || *self.0.borrow() == *other.0.borrow()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shared_contexts_see_cell_updates() {
    let context = Context::new();
    context.bind_cell("score", Value::Number(1.));
    let alias = context.clone();
    assert!(alias.change_by("score", 4.));
    assert_eq!(context.get("score"), Some(Value::Number(5.)));
  }

  #[test]
  fn set_replaces_raw_and_updates_cells() {
    let context = Context::new();
    context.bind_raw("target", Value::text("7"));
    context.bind_cell("count", Value::Number(0.));
    let fork = context.fork();

    assert!(context.set("target", Value::text("8")));
    assert!(context.set("count", Value::Number(3.)));
    assert!(!context.set("missing", Value::Null));

    // the fork kept the old raw binding but shares the boxed cell
    assert_eq!(fork.get("target"), Some(Value::text("7")));
    assert_eq!(fork.get("count"), Some(Value::Number(3.)));
  }

  #[test]
  fn change_by_ignores_raw_bindings() {
    let context = Context::new();
    context.bind_raw("hero", Value::text("12"));
    assert!(!context.change_by("hero", 1.));
    assert_eq!(context.get("hero"), Some(Value::text("12")));
  }
}
