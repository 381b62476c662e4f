use std::rc::Rc;

use serde::Deserialize;

/// Blocks are immutable once loaded; frames hold shared references to them.
pub type BlockRef = Rc<Block>;

#[derive(Debug, PartialEq)]
pub struct Block {
  pub id: String,
  pub kind: String,
  pub fields: Vec<Field>,
  pub values: Vec<Socket>,
  pub statements: Vec<Socket>,
  pub next: Option<BlockRef>,
  pub mutation: Mutation,
}

#[derive(Debug, PartialEq)]
pub struct Field {
  pub name: String,
  pub text: String,
}

#[derive(Debug, PartialEq)]
pub struct Socket {
  pub name: String,
  pub block: BlockRef,
}

/// Shape metadata attached by the editor to variadic and procedure blocks.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Mutation {
  pub items: Option<usize>,
  pub call_type: Option<CallType>,
  pub parameters: Vec<ProcedureParameter>,
  pub returns_value: bool,
  pub has_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
  Thread,
  Statement,
  Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcedureParameter {
  pub name: String,
  #[serde(rename = "type", default)]
  pub type_tag: String,
}

impl ProcedureParameter {
  /// `type:value` parameters are bound as boxed cells; everything else
  /// (entity references) is bound raw.
  pub fn is_value(&self) -> bool {
    self.type_tag.strip_prefix("type:") == Some("value")
  }
}

impl Block {
  pub fn field(&self, name: &str) -> Option<&str> {
    self
      .fields
      .iter()
      .find(|field| field.name == name)
      .map(|field| field.text.as_str())
  }

  pub fn field_at(&self, index: usize) -> Option<&str> {
    self.fields.get(index).map(|field| field.text.as_str())
  }

  pub fn value(&self, socket: &str) -> Option<&BlockRef> {
    self
      .values
      .iter()
      .find(|value| value.name == socket)
      .map(|value| &value.block)
  }

  pub fn statement(&self, socket: &str) -> Option<&BlockRef> {
    self
      .statements
      .iter()
      .find(|statement| statement.name == socket)
      .map(|statement| &statement.block)
  }

  /// The body of a compound block with a single statement socket.
  pub fn body(&self) -> Option<&BlockRef> {
    self.statements.first().map(|statement| &statement.block)
  }

  pub fn call_type(&self) -> CallType {
    self.mutation.call_type.unwrap_or(CallType::Thread)
  }

  pub fn item_count(&self) -> usize {
    self.mutation.items.unwrap_or(0)
  }
}

/// Builds block trees in code; the JSON loader is the other way in.
#[derive(Debug)]
pub struct BlockBuilder {
  block: Block,
}

impl BlockBuilder {
  pub fn new(kind: &str) -> Self {
    BlockBuilder {
      block: Block {
        id: String::new(),
        kind: kind.to_string(),
        fields: vec![],
        values: vec![],
        statements: vec![],
        next: None,
        mutation: Mutation::default(),
      },
    }
  }

  pub fn id(mut self, id: &str) -> Self {
    self.block.id = id.to_string();
    self
  }

  pub fn field(mut self, name: &str, text: &str) -> Self {
    self.block.fields.push(Field {
      name: name.to_string(),
      text: text.to_string(),
    });
    self
  }

  pub fn value(mut self, socket: &str, block: BlockRef) -> Self {
    self.block.values.push(Socket {
      name: socket.to_string(),
      block,
    });
    self
  }

  pub fn statement(mut self, socket: &str, block: BlockRef) -> Self {
    self.block.statements.push(Socket {
      name: socket.to_string(),
      block,
    });
    self
  }

  pub fn next(mut self, block: BlockRef) -> Self {
    self.block.next = Some(block);
    self
  }

  pub fn mutation(mut self, mutation: Mutation) -> Self {
    self.block.mutation = mutation;
    self
  }

  pub fn build(self) -> BlockRef {
    Rc::new(self.block)
  }
}
