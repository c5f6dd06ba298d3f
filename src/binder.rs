//! Name resolution, scope construction, and stack layout.
//!
//! A single depth-first walk of the AST that threads three concerns at
//! once: resolving imports into the module scope, registering function and
//! parameter symbols, and assigning 8-byte stack slots to locals in
//! declaration order. See [`Binder::bind_module`].

use std::collections::HashMap;

use crate::ast::{Ast, AstHandle, AstNode};
use crate::symbol::{ScopeTree, Symbol, SymbolHandle, SymbolKind, SymbolTable};

/// A function exported by an already-compiled module, as produced by the
/// interface loader. Parameters are plain names: externally-declared
/// parameter symbols exist only to populate `FuncSem.params` and are never
/// visible in any scope (spec's module-resolver behaviour).
#[derive(Debug, Clone)]
pub struct ImportedFunction {
    pub name: String,
    pub params: Vec<String>,
}

/// Callback the binder uses to resolve `import` statements. Implemented by
/// the module resolver; kept as a trait here so `binder.rs` has no
/// dependency on filesystem or sub-compilation machinery.
pub trait ImportLoader {
    fn load(&mut self, module_name: &str) -> Result<Vec<ImportedFunction>, String>;
}

/// Per-function side table populated during binding and consumed by the IR
/// builder to size the frame.
#[derive(Debug, Clone, Default)]
pub struct FuncSem {
    pub local_bytes: u32,
    pub params: Vec<SymbolHandle>,
}

/// The output of a full bind pass: a populated symbol/scope tree plus the
/// side tables the IR builder needs.
pub struct BoundModule {
    pub symbols: SymbolTable,
    pub scopes: ScopeTree,
    pub func_sem: HashMap<AstHandle, FuncSem>,
    pub node_symbols: HashMap<AstHandle, SymbolHandle>,
}

pub struct Binder<'a> {
    ast: &'a Ast,
    symbols: SymbolTable,
    scopes: ScopeTree,
    func_sem: HashMap<AstHandle, FuncSem>,
    node_symbols: HashMap<AstHandle, SymbolHandle>,
    stack_cursor: u32,
}

impl<'a> Binder<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Binder {
            ast,
            symbols: SymbolTable::new(),
            scopes: ScopeTree::new(),
            func_sem: HashMap::new(),
            node_symbols: HashMap::new(),
            stack_cursor: 0,
        }
    }

    pub fn bind_module(
        mut self,
        root: AstHandle,
        loader: &mut dyn ImportLoader,
    ) -> Result<BoundModule, String> {
        let AstNode::TranslationUnit { items } = self.ast.get(root) else {
            return Err("binder expected a TranslationUnit at the AST root".to_string());
        };
        // First pass: imports go straight into the module scope, function
        // declarations are bound recursively as they're encountered, in
        // source order — matching spec's single DFS pass exactly.
        for &item in items {
            self.bind_top_level(item, loader)?;
        }
        Ok(BoundModule {
            symbols: self.symbols,
            scopes: self.scopes,
            func_sem: self.func_sem,
            node_symbols: self.node_symbols,
        })
    }

    fn bind_top_level(&mut self, handle: AstHandle, loader: &mut dyn ImportLoader) -> Result<(), String> {
        match self.ast.get(handle).clone() {
            AstNode::Import { name, .. } => self.bind_import(&name, loader),
            AstNode::FunctionDef {
                name,
                params,
                body,
                public,
                ..
            } => self.bind_function(handle, &name, &params, body, public),
            other => Err(format!(
                "unexpected top-level AST kind {}",
                other.kind_name()
            )),
        }
    }

    fn bind_import(&mut self, module_name: &str, loader: &mut dyn ImportLoader) -> Result<(), String> {
        let imported = loader.load(module_name)?;
        let module_scope = self.scopes.module_scope();
        for func in imported {
            let param_handles = func
                .params
                .iter()
                .map(|p| {
                    self.symbols.insert(Symbol {
                        kind: SymbolKind::Variable,
                        name: p.clone(),
                        mutable: true,
                        public: false,
                        external: true,
                        stack_offset: None,
                        params: Vec::new(),
                    })
                })
                .collect();
            self.scopes.declare(
                module_scope,
                &mut self.symbols,
                Symbol {
                    kind: SymbolKind::Function,
                    name: func.name,
                    mutable: false,
                    public: false,
                    external: true,
                    stack_offset: None,
                    params: param_handles,
                },
            )?;
        }
        Ok(())
    }

    fn bind_function(
        &mut self,
        node: AstHandle,
        name: &str,
        params: &[crate::ast::ParamDecl],
        body: AstHandle,
        public: bool,
    ) -> Result<(), String> {
        let saved_cursor = self.stack_cursor;
        self.stack_cursor = 0;

        let body_scope = self.scopes.push_scope();
        let mut param_handles = Vec::with_capacity(params.len());
        for param in params {
            let offset = self.next_stack_offset();
            let handle = self.scopes.declare(
                body_scope,
                &mut self.symbols,
                Symbol {
                    kind: SymbolKind::Variable,
                    name: param.name.clone(),
                    mutable: true,
                    public: false,
                    external: false,
                    stack_offset: Some(offset),
                    params: Vec::new(),
                },
            )?;
            param_handles.push(handle);
        }

        self.bind_block_stmts(body)?;
        self.scopes.pop_scope()?;

        self.func_sem.insert(
            node,
            FuncSem {
                local_bytes: self.stack_cursor,
                params: param_handles.clone(),
            },
        );
        self.stack_cursor = saved_cursor;

        let module_scope = self.scopes.module_scope();
        let symbol = self.scopes.declare(
            module_scope,
            &mut self.symbols,
            Symbol {
                kind: SymbolKind::Function,
                name: name.to_string(),
                mutable: false,
                public,
                external: false,
                stack_offset: None,
                params: param_handles,
            },
        )?;
        self.node_symbols.insert(node, symbol);
        Ok(())
    }

    fn next_stack_offset(&mut self) -> u32 {
        self.stack_cursor += 8;
        self.stack_cursor
    }

    /// Binds the statements of a `Block` node directly into the scope
    /// already current (used for function bodies, which share a scope with
    /// their parameter list rather than opening a nested one).
    fn bind_block_stmts(&mut self, block: AstHandle) -> Result<(), String> {
        let AstNode::Block { stmts } = self.ast.get(block).clone() else {
            return Err("expected a Block node".to_string());
        };
        for stmt in stmts {
            self.bind_stmt(stmt)?;
        }
        Ok(())
    }

    fn bind_nested_block(&mut self, block: AstHandle) -> Result<(), String> {
        self.scopes.push_scope();
        self.bind_block_stmts(block)?;
        self.scopes.pop_scope()
    }

    fn bind_stmt(&mut self, handle: AstHandle) -> Result<(), String> {
        match self.ast.get(handle).clone() {
            AstNode::Let { name, mutable, .. } => {
                let offset = self.next_stack_offset();
                let scope = self.scopes.current();
                let symbol = self.scopes.declare(
                    scope,
                    &mut self.symbols,
                    Symbol {
                        kind: SymbolKind::Variable,
                        name,
                        mutable,
                        public: false,
                        external: false,
                        stack_offset: Some(offset),
                        params: Vec::new(),
                    },
                )?;
                self.node_symbols.insert(handle, symbol);
                Ok(())
            }
            AstNode::Import { .. } => {
                Err("import is only valid at module scope".to_string())
            }
            AstNode::Return { value } => self.bind_expr(value),
            AstNode::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.bind_expr(cond)?;
                self.bind_nested_block(then_branch)?;
                if let Some(else_branch) = else_branch {
                    match self.ast.get(else_branch) {
                        AstNode::Block { .. } => self.bind_nested_block(else_branch)?,
                        AstNode::If { .. } => self.bind_stmt(else_branch)?,
                        other => {
                            return Err(format!(
                                "expected Block or If as else-branch, found {}",
                                other.kind_name()
                            ))
                        }
                    }
                }
                Ok(())
            }
            AstNode::While { cond, body } => {
                self.bind_expr(cond)?;
                self.bind_nested_block(body)
            }
            AstNode::Assign { name, value, .. } => {
                self.bind_expr(value)?;
                let scope = self.scopes.current();
                self.scopes
                    .resolve(scope, &name)
                    .map(|_| ())
                    .ok_or_else(|| format!("undefined identifier '{}'", name))?;
                self.node_symbols.insert(
                    handle,
                    self.scopes.resolve(scope, &name).expect("just checked"),
                );
                Ok(())
            }
            AstNode::ExprStmt { expr } => self.bind_expr(expr),
            AstNode::Block { .. } => self.bind_nested_block(handle),
            other => Err(format!("unexpected statement AST kind {}", other.kind_name())),
        }
    }

    fn bind_expr(&mut self, handle: AstHandle) -> Result<(), String> {
        match self.ast.get(handle).clone() {
            AstNode::Number { .. } | AstNode::Str { .. } => Ok(()),
            AstNode::Ident { name, .. } => {
                let scope = self.scopes.current();
                let resolved = self
                    .scopes
                    .resolve(scope, &name)
                    .ok_or_else(|| format!("undefined identifier '{}'", name))?;
                self.node_symbols.insert(handle, resolved);
                Ok(())
            }
            AstNode::Call { callee, args, .. } => {
                let scope = self.scopes.current();
                let resolved = self
                    .scopes
                    .resolve(scope, &callee)
                    .ok_or_else(|| format!("call to undefined function '{}'", callee))?;
                self.node_symbols.insert(handle, resolved);
                for arg in args {
                    self.bind_expr(arg)?;
                }
                Ok(())
            }
            AstNode::Binary { lhs, rhs, .. } => {
                self.bind_expr(lhs)?;
                self.bind_expr(rhs)
            }
            AstNode::Switch { cond, arms } => {
                self.bind_expr(cond)?;
                for arm in arms {
                    self.scopes.push_scope();
                    let AstNode::Case { value, result } = self.ast.get(arm).clone() else {
                        self.scopes.pop_scope()?;
                        return Err("expected a Case node in switch arm".to_string());
                    };
                    self.bind_expr(value)?;
                    self.bind_expr(result)?;
                    self.scopes.pop_scope()?;
                }
                Ok(())
            }
            other => Err(format!("unexpected expression AST kind {}", other.kind_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    struct NoImports;
    impl ImportLoader for NoImports {
        fn load(&mut self, module_name: &str) -> Result<Vec<ImportedFunction>, String> {
            Err(format!("unexpected import of '{}'", module_name))
        }
    }

    fn bind(src: &str) -> BoundModule {
        let (ast, root) = Parser::new(src).unwrap().parse().unwrap();
        Binder::new(&ast).bind_module(root, &mut NoImports).unwrap()
    }

    #[test]
    fn stack_offsets_are_monotonic_and_reset_per_function() {
        let bound = bind(
            "fn f() { let mut a; let mut b; return a; } \
             fn g() { let mut c; return c; }",
        );
        let mut fs = bound.func_sem.values().collect::<Vec<_>>();
        fs.sort_by_key(|f| f.local_bytes);
        assert_eq!(fs[0].local_bytes, 8);
        assert_eq!(fs[1].local_bytes, 16);
    }

    #[test]
    fn params_get_stack_slots_starting_at_eight() {
        let bound = bind("fn add(a, b) { return a + b; }");
        let sem = bound.func_sem.values().next().unwrap();
        assert_eq!(sem.params.len(), 2);
        let offsets: Vec<_> = sem
            .params
            .iter()
            .map(|h| bound.symbols.get(*h).stack_offset.unwrap())
            .collect();
        assert_eq!(offsets, vec![8, 16]);
    }

    #[test]
    fn undefined_identifier_is_fatal() {
        let (ast, root) = Parser::new("fn main() { return missing; }").unwrap().parse().unwrap();
        let result = Binder::new(&ast).bind_module(root, &mut NoImports);
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_let_in_same_scope_is_fatal() {
        let (ast, root) = Parser::new("fn main() { let mut x; let mut x; return x; }")
            .unwrap()
            .parse()
            .unwrap();
        let result = Binder::new(&ast).bind_module(root, &mut NoImports);
        assert!(result.is_err());
    }

    #[test]
    fn shadowing_in_nested_block_is_allowed() {
        let bound = bind(
            "fn main() { let mut x; if x < 1 { let mut x; x = 2; } return x; }",
        );
        assert_eq!(bound.func_sem.len(), 1);
    }

    #[test]
    fn forward_call_to_function_declared_later_is_fatal() {
        let (ast, root) = Parser::new(
            "fn main() { return helper(); } fn helper() { return 1; }",
        )
        .unwrap()
        .parse()
        .unwrap();
        let result = Binder::new(&ast).bind_module(root, &mut NoImports);
        assert!(result.is_err());
    }

    #[test]
    fn import_inserts_symbols_into_module_scope() {
        struct OneFn;
        impl ImportLoader for OneFn {
            fn load(&mut self, _module_name: &str) -> Result<Vec<ImportedFunction>, String> {
                Ok(vec![ImportedFunction {
                    name: "helper".to_string(),
                    params: vec!["a".to_string()],
                }])
            }
        }
        let (ast, root) = Parser::new("import other; fn main() { return helper(1); }")
            .unwrap()
            .parse()
            .unwrap();
        let bound = Binder::new(&ast).bind_module(root, &mut OneFn).unwrap();
        assert_eq!(bound.func_sem.len(), 1);
    }
}
