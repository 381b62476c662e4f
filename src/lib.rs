//! An interpreter for block-based game scripts. Scripts are trees of
//! blocks; each running script is an explicit call stack that a cooperative
//! scheduler steps one block at a time, so waits, procedure calls and loops
//! never recurse on the native stack.

pub mod block;
pub mod blocks;
pub mod context;
pub mod entity;
pub mod error;
pub mod input;
pub mod interpreter;
pub mod json;
pub mod program;
pub mod project;
pub mod random;
pub mod registry;
pub mod scheduler;
pub mod script;
pub mod value;

pub use block::{Block, BlockBuilder, BlockRef};
pub use context::Context;
pub use entity::{Entity, GameModel, World};
pub use error::{BlockError, LoadError, Warning};
pub use interpreter::{Interpreter, Step};
pub use project::{Config, Project};
pub use registry::Registry;
pub use value::Value;

#[cfg(test)]
mod tests;
