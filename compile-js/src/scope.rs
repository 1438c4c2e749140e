use bytecode_js::InstrBuffer;
use bytecode_js::LitId;
use bytecode_js::OpMeta;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
  Global,
  Function,
  Eval,
}

#[derive(Clone, Copy, Debug)]
pub struct ScopeVariable {
  pub lit: LitId,
  pub is_param: bool,
}

/// One node of the scope tree.
///
/// Owns its instruction buffer and, once child function scopes complete,
/// their finalized blocks. Children reference parents by [`ScopeId`]; the
/// arena owns every node and frees them in bulk when compilation ends.
pub struct Scope {
  pub parent: Option<ScopeId>,
  pub kind: ScopeKind,
  pub strict_mode: bool,
  pub ref_arguments: bool,
  pub ref_eval: bool,
  pub contains_with: bool,
  pub contains_try: bool,
  pub contains_delete: bool,
  pub contains_functions: bool,
  /// Parameters first (in declaration order), then locals.
  pub variables: Vec<ScopeVariable>,
  pub param_count: usize,
  pub instrs: InstrBuffer,
  /// Finalized blocks of completed child scopes, concatenated. Spliced after
  /// this scope's header on finalization; their length feeds inter-scope
  /// jump distances.
  pub subscope_instrs: Vec<OpMeta>,
  pub children: Vec<ScopeId>,
  /// Highest position any resolved forward jump lands on. An instruction is
  /// only a merge target for the redundant-assignment rewrite if no jump can
  /// land past it.
  pub resolved_jump_max: u16,
}

impl Scope {
  fn new(parent: Option<ScopeId>, kind: ScopeKind) -> Scope {
    Scope {
      parent,
      kind,
      strict_mode: false,
      ref_arguments: false,
      ref_eval: false,
      contains_with: false,
      contains_try: false,
      contains_delete: false,
      contains_functions: false,
      variables: Vec::new(),
      param_count: 0,
      instrs: InstrBuffer::new(),
      subscope_instrs: Vec::new(),
      children: Vec::new(),
      resolved_jump_max: 0,
    }
  }

  /// Registers a parameter or local. Duplicated locals collapse into one
  /// entry; duplicated parameters are kept (the last one wins at runtime,
  /// which the optimizer's empty-marker pass relies on).
  pub fn add_variable(&mut self, lit: LitId, is_param: bool) {
    if !is_param && self.variables.iter().any(|v| v.lit == lit) {
      return;
    }
    debug_assert!(!is_param || self.variables.iter().all(|v| v.is_param));
    self.variables.push(ScopeVariable { lit, is_param });
    if is_param {
      self.param_count += 1;
    }
  }

  pub fn variable_exists(&self, lit: LitId) -> bool {
    self.variables.iter().any(|v| v.lit == lit)
  }

  pub fn local_count(&self) -> usize {
    self.variables.len() - self.param_count
  }
}

/// Arena of scope nodes indexed by integer, avoiding owning parent/child
/// pointers in the cyclic scope tree.
#[derive(Default)]
pub struct ScopeArena {
  scopes: Vec<Scope>,
}

impl ScopeArena {
  pub fn new() -> ScopeArena {
    ScopeArena::default()
  }

  pub fn alloc(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
    let id = ScopeId(self.scopes.len() as u32);
    self.scopes.push(Scope::new(parent, kind));
    if let Some(parent) = parent {
      self.get_mut(parent).children.push(id);
    }
    id
  }

  pub fn get(&self, id: ScopeId) -> &Scope {
    &self.scopes[id.0 as usize]
  }

  pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
    &mut self.scopes[id.0 as usize]
  }
}
