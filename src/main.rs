use std::{
  env, process,
  time::{Duration, Instant},
};

use blockflow::{Interpreter, Project, World};

fn main() {
  pretty_env_logger::init();
  let Some(path) = env::args().nth(1) else {
    eprintln!("usage: blockflow <project.json>");
    process::exit(2);
  };
  let project = match Project::load(&path) {
    Ok(project) => project,
    Err(error) => {
      log::error!("{path}: {error}");
      process::exit(1);
    }
  };
  let world = World::from_entities(project.entities.clone());
  let mut interpreter = Interpreter::from_project(project, world);
  let frame = Duration::from_secs(1) / interpreter.config.frame_rate.max(1);
  let max_ticks = interpreter.config.max_ticks;

  interpreter.start_game();
  let mut ticks: u64 = 0;
  let mut warnings = interpreter.take_warnings().len();
  while interpreter.is_running() && max_ticks.map_or(true, |max| ticks < max) {
    ::std::thread::sleep(frame);
    interpreter.tick(Instant::now());
    warnings += interpreter.take_warnings().len();
    ticks += 1;
  }
  log::info!("stopped after {ticks} ticks with {warnings} warnings");
  for entity in interpreter.model().entities() {
    log::info!("{}: {:?}", entity.id, entity.properties);
  }
}
