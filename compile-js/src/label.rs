use crate::dump::Dumper;
use crate::error::CompileResult;
use bitflags::bitflags;
use bytecode_js::InstrIdx;
use bytecode_js::LitId;

bitflags! {
  #[derive(Clone, Copy, Debug, PartialEq, Eq)]
  pub struct LabelFlags: u8 {
    const NAMED = 1 << 0;
    const UNNAMED_BREAKS = 1 << 1;
    const UNNAMED_CONTINUES = 1 << 2;
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelId(pub usize);

/// One entry of the label stack.
///
/// Pending break/continue jumps form linked chains threaded through the
/// jumps' own displacement fields; only the most recent jump is held here.
struct Label {
  flags: LabelFlags,
  name: Option<LitId>,
  break_chain: Option<InstrIdx>,
  continue_chain: Option<InstrIdx>,
  /// Jumpable border: break/continue crossing this entry cannot use a plain
  /// jump and must go through the VM's unwind machinery.
  is_border: bool,
}

/// Label stack of the function currently being parsed. Labels of enclosing
/// functions are masked out while an inner function body is parsed.
#[derive(Default)]
pub struct LabelSet {
  labels: Vec<Label>,
  masked_bases: Vec<usize>,
}

impl LabelSet {
  pub fn new() -> LabelSet {
    LabelSet::default()
  }

  fn visible_base(&self) -> usize {
    self.masked_bases.last().copied().unwrap_or(0)
  }

  pub fn push(&mut self, flags: LabelFlags, name: Option<LitId>) -> LabelId {
    debug_assert_eq!(flags.contains(LabelFlags::NAMED), name.is_some());
    self.labels.push(Label {
      flags,
      name,
      break_chain: None,
      continue_chain: None,
      is_border: false,
    });
    LabelId(self.labels.len() - 1)
  }

  /// Labels do not cross function boundaries; hides the current set until
  /// [`LabelSet::restore_set`].
  pub fn mask_set(&mut self) {
    self.masked_bases.push(self.labels.len());
  }

  pub fn restore_set(&mut self) {
    let base = self.masked_bases.pop().unwrap();
    debug_assert_eq!(self.labels.len(), base);
  }

  /// Raises a jumpable border unless one is already on top. Returns whether
  /// a border was raised (and must later be removed).
  pub fn raise_nested_jumpable_border(&mut self) -> bool {
    if self.labels.len() > self.visible_base() && self.labels.last().unwrap().is_border {
      return false;
    }
    self.labels.push(Label {
      flags: LabelFlags::empty(),
      name: None,
      break_chain: None,
      continue_chain: None,
      is_border: true,
    });
    true
  }

  pub fn remove_nested_jumpable_border(&mut self) {
    let top = self.labels.pop().unwrap();
    debug_assert!(top.is_border);
    debug_assert!(top.break_chain.is_none() && top.continue_chain.is_none());
  }

  /// Finds the innermost visible label matching `flags` (and `name`, for
  /// named lookups). The second result is whether a simple jump may reach
  /// it, i.e. no jumpable border lies in between.
  pub fn find(&self, flags: LabelFlags, name: Option<LitId>) -> Option<(LabelId, bool)> {
    let mut simply_jumpable = true;
    for (i, label) in self.labels.iter().enumerate().skip(self.visible_base()).rev() {
      if label.is_border {
        simply_jumpable = false;
        continue;
      }
      if !label.flags.intersects(flags) {
        continue;
      }
      if flags.contains(LabelFlags::NAMED) && label.name != name {
        continue;
      }
      return Some((LabelId(i), simply_jumpable));
    }
    None
  }

  /// Dumps a forward jump to the label's (not yet known) break or continue
  /// target and links it into the label's chain.
  pub fn add_jump(
    &mut self,
    dumper: &mut Dumper,
    id: LabelId,
    is_simply_jumpable: bool,
    is_break: bool,
  ) -> CompileResult<()> {
    let chain = {
      let label = &self.labels[id.0];
      if is_break {
        label.break_chain
      } else {
        label.continue_chain
      }
    };
    let oc = dumper.dump_simple_or_nested_jump_for_rewrite(is_simply_jumpable, chain)?;
    let label = &mut self.labels[id.0];
    if is_break {
      label.break_chain = Some(oc);
    } else {
      label.continue_chain = Some(oc);
    }
    Ok(())
  }

  /// Resolves the continue chains of `outermost` and every label above it to
  /// `target`. Loops call this once the position of their iteration step is
  /// known.
  pub fn setup_continue_target(
    &mut self,
    dumper: &mut Dumper,
    outermost: LabelId,
    target: InstrIdx,
  ) -> CompileResult<()> {
    for i in outermost.0..self.labels.len() {
      let mut chain = self.labels[i].continue_chain.take();
      while let Some(oc) = chain {
        chain = dumper.rewrite_simple_or_nested_jump_and_get_next(oc, target)?;
      }
    }
    Ok(())
  }

  /// Resolves every remaining jump of the topmost label to `target` and pops
  /// it.
  pub fn rewrite_jumps_and_pop(
    &mut self,
    dumper: &mut Dumper,
    target: InstrIdx,
  ) -> CompileResult<()> {
    let label = self.labels.pop().unwrap();
    debug_assert!(!label.is_border);
    let mut chain = label.break_chain;
    while let Some(oc) = chain {
      chain = dumper.rewrite_simple_or_nested_jump_and_get_next(oc, target)?;
    }
    let mut chain = label.continue_chain;
    while let Some(oc) = chain {
      chain = dumper.rewrite_simple_or_nested_jump_and_get_next(oc, target)?;
    }
    Ok(())
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}
