//! Symbol table and scope tree shared by the binder and IR builder.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
}

/// A named entity: a local/parameter variable or a function. Once inserted,
/// `name`, `kind`, and `params` never change — only `stack_offset` is filled
/// in later for variables (it starts `None` and is assigned exactly once).
#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub mutable: bool,
    pub public: bool,
    pub external: bool,
    pub stack_offset: Option<u32>,
    pub params: Vec<SymbolHandle>,
}

/// Append-only pool of symbols, addressed by dense handles.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn insert(&mut self, symbol: Symbol) -> SymbolHandle {
        let handle = SymbolHandle(self.symbols.len() as u32);
        self.symbols.push(symbol);
        handle
    }

    pub fn get(&self, handle: SymbolHandle) -> &Symbol {
        &self.symbols[handle.0 as usize]
    }

    pub fn set_stack_offset(&mut self, handle: SymbolHandle, offset: u32) {
        self.symbols[handle.0 as usize].stack_offset = Some(offset);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// One lexical scope. `order` preserves insertion order for deterministic
/// enumeration (e.g. a function's declared-order param list); `by_name`
/// gives O(1) lookup and must stay injective within the scope.
#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeHandle>,
    order: Vec<SymbolHandle>,
    by_name: HashMap<String, SymbolHandle>,
}

impl Scope {
    fn new(parent: Option<ScopeHandle>) -> Self {
        Scope {
            parent,
            order: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<SymbolHandle> {
        self.by_name.get(name).copied()
    }

    pub fn declared_order(&self) -> &[SymbolHandle] {
        &self.order
    }
}

/// The tree of scopes rooted at the module scope, plus a "current scope"
/// cursor the binder pushes/pops as it walks the AST.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    module_scope: ScopeHandle,
    current: ScopeHandle,
}

impl ScopeTree {
    pub fn new() -> Self {
        let module = Scope::new(None);
        ScopeTree {
            scopes: vec![module],
            module_scope: ScopeHandle(0),
            current: ScopeHandle(0),
        }
    }

    pub fn module_scope(&self) -> ScopeHandle {
        self.module_scope
    }

    pub fn current(&self) -> ScopeHandle {
        self.current
    }

    /// Enter a fresh child scope of the current one, making it current.
    pub fn push_scope(&mut self) -> ScopeHandle {
        let handle = ScopeHandle(self.scopes.len() as u32);
        self.scopes.push(Scope::new(Some(self.current)));
        self.current = handle;
        handle
    }

    /// Leave the current scope, restoring its parent as current. Fatal if
    /// called at the module scope.
    pub fn pop_scope(&mut self) -> Result<(), String> {
        if self.current == self.module_scope {
            return Err("cannot leave the module scope".to_string());
        }
        let parent = self.scopes[self.current.0 as usize]
            .parent
            .expect("non-module scope always has a parent");
        self.current = parent;
        Ok(())
    }

    /// Insert `symbol` into `scope`, returning its handle. Fatal on a name
    /// collision within the same scope.
    pub fn declare(
        &mut self,
        scope: ScopeHandle,
        table: &mut SymbolTable,
        symbol: Symbol,
    ) -> Result<SymbolHandle, String> {
        let name = symbol.name.clone();
        if self.scopes[scope.0 as usize].by_name.contains_key(&name) {
            return Err(format!("duplicate name '{}' in the same scope", name));
        }
        let handle = table.insert(symbol);
        let s = &mut self.scopes[scope.0 as usize];
        s.by_name.insert(name, handle);
        s.order.push(handle);
        Ok(handle)
    }

    /// Resolve `name` by walking from `from` through `parent` links.
    pub fn resolve(&self, from: ScopeHandle, name: &str) -> Option<SymbolHandle> {
        let mut cursor = Some(from);
        while let Some(handle) = cursor {
            let scope = &self.scopes[handle.0 as usize];
            if let Some(sym) = scope.lookup_local(name) {
                return Some(sym);
            }
            cursor = scope.parent;
        }
        None
    }

    pub fn scope(&self, handle: ScopeHandle) -> &Scope {
        &self.scopes[handle.0 as usize]
    }

    /// True if `ancestor` is `scope` itself or one of its transitive
    /// parents — used to check symbol-resolution soundness.
    pub fn is_ancestor(&self, ancestor: ScopeHandle, scope: ScopeHandle) -> bool {
        let mut cursor = Some(scope);
        while let Some(handle) = cursor {
            if handle == ancestor {
                return true;
            }
            cursor = self.scopes[handle.0 as usize].parent;
        }
        false
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
