//! The on-disk project format.

use std::{collections::BTreeMap, fmt, marker::PhantomData, rc::Rc};

use serde::{
  de::{MapAccess, Visitor},
  Deserialize, Deserializer,
};

use crate::{
  block::{self, BlockRef, Mutation},
  entity::Entity,
  error::LoadError,
  program::{Program, ScriptPage},
  project::{self, Config},
  value::Value,
};

#[derive(Deserialize)]
pub struct Document {
  #[serde(default)]
  config: Config,
  pages: Vec<Page>,
  #[serde(default)]
  entities: Vec<EntityRecord>,
}

#[derive(Deserialize)]
struct Page {
  id: String,
  #[serde(default)]
  blocks: Vec<BlockRecord>,
}

#[derive(Deserialize)]
struct BlockRecord {
  #[serde(default)]
  id: Option<String>,
  #[serde(rename = "type")]
  kind: String,
  #[serde(default)]
  fields: Ordered<FieldText>,
  #[serde(default)]
  values: Ordered<BlockRecord>,
  #[serde(default)]
  statements: Ordered<BlockRecord>,
  #[serde(default)]
  next: Option<Box<BlockRecord>>,
  #[serde(default)]
  mutation: Mutation,
}

#[derive(Deserialize)]
struct EntityRecord {
  id: String,
  kind: String,
  #[serde(default)]
  parent: Option<String>,
  #[serde(default)]
  properties: BTreeMap<String, serde_json::Value>,
}

/// Field text as the editor writes it: usually a string, sometimes a bare
/// number or boolean.
struct FieldText(String);

impl<'de> Deserialize<'de> for FieldText {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum T {
      String(String),
      Number(f64),
      Bool(bool),
    }
    Ok(FieldText(match T::deserialize(de)? {
      T::String(string) => string,
      T::Number(number) => Value::Number(number).to_string(),
      T::Bool(bool) => bool.to_string(),
    }))
  }
}

/// A JSON object read as key/value pairs in document order. Socket order is
/// significant: guards are tried and fields matched by position.
struct Ordered<T>(Vec<(String, T)>);

impl<T> Default for Ordered<T> {
  fn default() -> Self {
    Ordered(vec![])
  }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ordered<T> {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    struct MapVisitor<T>(PhantomData<T>);
    impl<'de, T: Deserialize<'de>> Visitor<'de> for MapVisitor<T> {
      type Value = Ordered<T>;
      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an object")
      }
      fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry::<String, T>()? {
          entries.push(entry);
        }
        Ok(Ordered(entries))
      }
    }
    de.deserialize_map(MapVisitor(PhantomData))
  }
}

pub fn value_from_json(value: serde_json::Value) -> Value {
  match value {
    serde_json::Value::Null => Value::Null,
    serde_json::Value::Bool(bool) => Value::Bool(bool),
    serde_json::Value::Number(number) => Value::Number(number.as_f64().unwrap_or(0.)),
    serde_json::Value::String(string) => Value::Text(string),
    serde_json::Value::Array(items) => Value::list(items.into_iter().map(value_from_json).collect()),
    object => Value::Text(object.to_string()),
  }
}

/// Assigns `<page>:<n>` ids to blocks that have none, counting in pre-order.
fn build_block(record: BlockRecord, page: &str, counter: &mut usize) -> BlockRef {
  *counter += 1;
  let id = record.id.unwrap_or_else(|| format!("{page}:{counter}"));
  let fields = record
    .fields
    .0
    .into_iter()
    .map(|(name, text)| block::Field { name, text: text.0 })
    .collect();
  let sockets =|entries: Ordered<BlockRecord>, counter: &mut usize| -> Vec<block::Socket> {
    entries
      .0
      .into_iter()
      .map(|(name, record)| block::Socket {
        name,
        block: build_block(record, page, counter),
      })
      .collect()
  };
  let values = sockets(record.values, counter);
  let statements = sockets(record.statements, counter);
  let next = record
    .next
    .map(|next| build_block(*next, page, counter));
  Rc::new(block::Block {
    id,
    kind: record.kind,
    fields,
    values,
    statements,
    next,
    mutation: record.mutation,
  })
}

pub fn load(document: Document) -> Result<project::Project, LoadError> {
  if document.pages.is_empty() {
    return Err(LoadError::EmptyProject);
  }
  let pages = document
    .pages
    .into_iter()
    .map(|page| {
      let mut counter = 0;
      let blocks = page
        .blocks
        .into_iter()
        .map(|record| build_block(record, &page.id, &mut counter))
        .collect();
      ScriptPage { id: page.id, blocks }
    })
    .collect();
  let entities = document
    .entities
    .into_iter()
    .map(|record| Entity {
      id: record.id,
      kind: record.kind,
      parent: record.parent,
      properties: record
        .properties
        .into_iter()
        .map(|(name, value)| (name, value_from_json(value)))
        .collect(),
    })
    .collect();
  Ok(project::Project {
    config: document.config,
    program: Program::new(pages),
    entities,
  })
}
