use thiserror::Error;

/// Errors raised while executing a block. They abort the call stack that
/// raised them and never reach the host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockError {
  #[error("unknown block kind `{0}`")]
  UnknownBlockKind(String),
  #[error("block `{block}` refers to entity `{entity}`, which does not exist")]
  UnresolvableReference { block: String, entity: String },
  #[error("no procedure named `{name}` on page `{page}`")]
  UnknownProcedure { page: String, name: String },
  #[error("block `{block}` returned outside of a procedure")]
  ReturnOutsideProcedure { block: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
  #[error("could not read project: {0}")]
  Io(#[from] std::io::Error),
  #[error("malformed project: {0}")]
  Json(#[from] serde_json::Error),
  #[error("project has no script pages")]
  EmptyProject,
}

/// Soft problems: execution continues with a default.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
  #[error("block `{block}` has nothing in `{socket}`, using a default")]
  EmptySocket { block: String, socket: String },
  #[error("block `{block}` got a non-number in `{socket}`, using 0")]
  NotANumber { block: String, socket: String },
  #[error("block `{block}` breaks or continues outside of a loop")]
  StrayLoopControl { block: String },
}

/// Warnings kept between drains. Past this many, new ones are only counted.
pub const MAX_WARNINGS: usize = 1024;

/// Warnings recorded since the host last drained them.
#[derive(Debug, Default)]
pub struct Diagnostics {
  warnings: Vec<Warning>,
  dropped: usize,
}

impl Diagnostics {
  pub fn warn(&mut self, warning: Warning) {
    log::debug!("{warning}");
    if self.warnings.len() < MAX_WARNINGS {
      self.warnings.push(warning);
    } else {
      self.dropped += 1;
    }
  }

  pub fn warnings(&self) -> &[Warning] {
    &self.warnings
  }

  /// Warnings discarded because the log was full.
  pub fn dropped(&self) -> usize {
    self.dropped
  }

  pub fn drain(&mut self) -> Vec<Warning> {
    if self.dropped > 0 {
      log::debug!("{} warnings dropped since the last drain", self.dropped);
      self.dropped = 0;
    }
    std::mem::take(&mut self.warnings)
  }
}
