use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use crate::{entity::Entity, error::LoadError, json, program::Program};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
  /// Ticks per second for the headless runner.
  #[serde(default = "default_frame_rate")]
  pub frame_rate: u32,
  /// Evaluations a stack may run before it yields the rest of the tick.
  #[serde(default = "default_max_calls")]
  pub max_calls: u32,
  #[serde(default)]
  pub max_ticks: Option<u64>,
}

fn default_frame_rate() -> u32 {
  30
}

fn default_max_calls() -> u32 {
  150
}

impl Default for Config {
  fn default() -> Self {
    Config {
      frame_rate: default_frame_rate(),
      max_calls: default_max_calls(),
      max_ticks: None,
    }
  }
}

#[derive(Debug)]
pub struct Project {
  pub config: Config,
  pub program: Program,
  pub entities: Vec<Entity>,
}

impl Project {
  pub fn load(path: impl AsRef<Path>) -> Result<Project, LoadError> {
    let reader = BufReader::new(File::open(path)?);
    json::load(serde_json::from_reader(reader)?)
  }

  pub fn from_json(text: &str) -> Result<Project, LoadError> {
    json::load(serde_json::from_str(text)?)
  }

  pub fn from_value(value: serde_json::Value) -> Result<Project, LoadError> {
    json::load(serde_json::from_value(value)?)
  }
}
