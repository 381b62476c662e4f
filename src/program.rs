use crate::block::BlockRef;

#[derive(Debug, Default)]
pub struct Program {
  pub pages: Vec<ScriptPage>,
}

/// One workspace of top-level scripts.
#[derive(Debug)]
pub struct ScriptPage {
  pub id: String,
  pub blocks: Vec<BlockRef>,
}

impl Program {
  pub fn new(pages: Vec<ScriptPage>) -> Program {
    Program { pages }
  }

  pub fn page(&self, id: &str) -> Option<&ScriptPage> {
    self.pages.iter().find(|page| page.id == id)
  }

  /// The `procedures_def` on `page` whose `NAME` field is `name`.
  pub fn find_procedure(&self, page: &str, name: &str) -> Option<&BlockRef> {
    self.page(page)?.blocks.iter().find(|block| {
      block.kind == "procedures_def" && block.field("NAME") == Some(name)
    })
  }

  /// Top-level blocks of `kind`, page by page.
  pub fn roots<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = (&'a str, &'a BlockRef)> + 'a {
    self.pages.iter().flat_map(move |page| {
      page
        .blocks
        .iter()
        .filter(move |block| block.kind == kind)
        .map(move |block| (page.id.as_str(), block))
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::BlockBuilder;

  #[test]
  fn procedures_are_found_per_page() {
    let program = Program::new(vec![
      ScriptPage {
        id: "a".into(),
        blocks: vec![
          BlockBuilder::new("procedures_def").field("NAME", "jump").build(),
          BlockBuilder::new("game_start").build(),
        ],
      },
      ScriptPage {
        id: "b".into(),
        blocks: vec![BlockBuilder::new("game_start").build()],
      },
    ]);
    assert!(program.find_procedure("a", "jump").is_some());
    assert!(program.find_procedure("b", "jump").is_none());
    let pages: Vec<&str> = program.roots("game_start").map(|(page, _)| page).collect();
    assert_eq!(pages, vec!["a", "b"]);
  }
}
