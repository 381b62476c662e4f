use std::collections::{BTreeMap, HashMap};

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
  pub id: String,
  pub kind: String,
  pub parent: Option<String>,
  pub properties: BTreeMap<String, Value>,
}

impl Entity {
  pub fn new(id: &str, kind: &str) -> Entity {
    Entity {
      id: id.to_string(),
      kind: kind.to_string(),
      parent: None,
      properties: BTreeMap::new(),
    }
  }

  pub fn with_parent(mut self, parent: &str) -> Entity {
    self.parent = Some(parent.to_string());
    self
  }

  pub fn with_property(mut self, name: &str, value: Value) -> Entity {
    self.properties.insert(name.to_string(), value);
    self
  }

  pub fn property(&self, name: &str) -> Option<&Value> {
    self.properties.get(name)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
  Set,
  /// Numeric increment.
  Change,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelUpdate {
  pub ids: Vec<String>,
  pub op: UpdateOp,
  pub field: String,
  pub value: Value,
}

impl ModelUpdate {
  pub fn new(ids: Vec<String>, op: UpdateOp, field: &str, value: Value) -> ModelUpdate {
    ModelUpdate {
      ids,
      op,
      field: field.to_string(),
      value,
    }
  }
}

/// The live game the interpreter drives. Updates are batched and become
/// visible only once flushed.
pub trait GameModel {
  fn lookup_entity(&self, id: &str) -> Option<&Entity>;
  /// Entities of `kind`, in a stable order.
  fn list_entities(&self, kind: &str) -> Vec<&Entity>;
  fn queue_mutation(&mut self, update: ModelUpdate);
  /// Commits every queued update; returns how many were applied.
  fn flush_mutations(&mut self) -> usize;
}

/// In-memory game model.
#[derive(Debug, Default)]
pub struct World {
  entities: Vec<Entity>,
  index: HashMap<String, usize>,
  pending: Vec<ModelUpdate>,
}

impl World {
  pub fn new() -> World {
    World::default()
  }

  pub fn from_entities(entities: Vec<Entity>) -> World {
    let mut world = World::new();
    for entity in entities {
      world.add_entity(entity);
    }
    world
  }

  pub fn add_entity(&mut self, entity: Entity) {
    match self.index.get(&entity.id) {
      Some(&index) => self.entities[index] = entity,
      None => {
        self.index.insert(entity.id.clone(), self.entities.len());
        self.entities.push(entity);
      }
    }
  }

  pub fn remove_entity(&mut self, id: &str) -> Option<Entity> {
    let index = self.index.remove(id)?;
    let entity = self.entities.remove(index);
    for position in self.index.values_mut() {
      if *position > index {
        *position -= 1;
      }
    }
    Some(entity)
  }

  pub fn entities(&self) -> &[Entity] {
    &self.entities
  }

  pub fn pending(&self) -> &[ModelUpdate] {
    &self.pending
  }

  fn apply(&mut self, update: ModelUpdate) {
    for id in &update.ids {
      let Some(&index) = self.index.get(id) else {
        log::warn!("dropping update of `{}` for missing entity `{id}`", update.field);
        continue;
      };
      let properties = &mut self.entities[index].properties;
      let next = match update.op {
        UpdateOp::Set => update.value.clone(),
        UpdateOp::Change => {
          let current = properties.get(&update.field).map_or(0., Value::to_f64);
          Value::Number(current + update.value.to_f64())
        }
      };
      properties.insert(update.field.clone(), next);
    }
  }
}

impl GameModel for World {
  fn lookup_entity(&self, id: &str) -> Option<&Entity> {
    self.index.get(id).map(|&index| &self.entities[index])
  }

  fn list_entities(&self, kind: &str) -> Vec<&Entity> {
    self
      .entities
      .iter()
      .filter(|entity| entity.kind == kind)
      .collect()
  }

  fn queue_mutation(&mut self, update: ModelUpdate) {
    self.pending.push(update);
  }

  fn flush_mutations(&mut self) -> usize {
    let pending = std::mem::take(&mut self.pending);
    let count = pending.len();
    for update in pending {
      self.apply(update);
    }
    count
  }
}
