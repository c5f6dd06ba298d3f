//! Linear three-address IR over virtual registers, and the syntax-directed
//! lowering pass that produces it from a bound AST.

use std::collections::HashMap;

use crate::ast::{Ast, AstHandle, AstNode, BinOp};
use crate::binder::{BoundModule, FuncSem};
use crate::regalloc::PhysReg;
use crate::symbol::{ScopeTree, SymbolHandle, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VReg(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VRegKind {
    Temp,
    Imm,
    LVarAddr,
}

#[derive(Debug, Clone)]
pub struct VRegInfo {
    pub kind: VRegKind,
    pub immediate_value: Option<i32>,
    pub assigned: Option<PhysReg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Lshift,
    Rshift,
    LogicalAnd,
    LogicalOr,
    Equal,
    NotEqual,
    Lt,
    Le,
    Mov,
    MovImm,
    Load,
    Save,
    FrameAddr,
    LeaString,
    Label,
    Jmp,
    Jz,
    Jnz,
    Call,
    Ret,
}

/// One IR instruction. Unused slots are `None`; `args` is populated only by
/// `Call`.
#[derive(Debug, Clone)]
pub struct Instr {
    pub op: Op,
    pub s1: Option<VReg>,
    pub s2: Option<VReg>,
    pub t: Option<VReg>,
    pub imm: Option<i32>,
    pub args: Vec<VReg>,
}

impl Instr {
    fn new(op: Op) -> Self {
        Instr {
            op,
            s1: None,
            s2: None,
            t: None,
            imm: None,
            args: Vec::new(),
        }
    }
}

pub struct IrFunc {
    pub name: String,
    pub local_stack_bytes: u32,
    pub params: Vec<SymbolHandle>,
    pub instrs: Vec<Instr>,
    pub vregs: Vec<VRegInfo>,
    next_label_id: u32,
}

impl IrFunc {
    fn new(name: String, local_stack_bytes: u32, params: Vec<SymbolHandle>) -> Self {
        IrFunc {
            name,
            local_stack_bytes,
            params,
            instrs: Vec::new(),
            vregs: Vec::new(),
            next_label_id: 0,
        }
    }

    fn new_vreg(&mut self, kind: VRegKind, immediate_value: Option<i32>) -> VReg {
        let handle = VReg(self.vregs.len() as u32);
        self.vregs.push(VRegInfo {
            kind,
            immediate_value,
            assigned: None,
        });
        handle
    }

    fn new_label(&mut self) -> i32 {
        let id = self.next_label_id;
        self.next_label_id += 1;
        id as i32
    }

    fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }
}

/// A module's exported public function, ready for the interface writer.
#[derive(Debug, Clone)]
pub struct PublicFunction {
    pub name: String,
    pub params: Vec<String>,
}

pub struct IrModule {
    pub functions: Vec<IrFunc>,
    pub symbols: SymbolTable,
    pub scopes: ScopeTree,
    pub strings: Vec<String>,
    pub public_functions: Vec<PublicFunction>,
}

pub struct IrBuilder<'a> {
    ast: &'a Ast,
    symbols: SymbolTable,
    scopes: ScopeTree,
    func_sem: HashMap<AstHandle, FuncSem>,
    node_symbols: HashMap<AstHandle, SymbolHandle>,
    strings: Vec<String>,
}

impl<'a> IrBuilder<'a> {
    pub fn new(ast: &'a Ast, bound: BoundModule) -> Self {
        IrBuilder {
            ast,
            symbols: bound.symbols,
            scopes: bound.scopes,
            func_sem: bound.func_sem,
            node_symbols: bound.node_symbols,
            strings: Vec::new(),
        }
    }

    pub fn lower_module(mut self, root: AstHandle) -> Result<IrModule, String> {
        let AstNode::TranslationUnit { items } = self.ast.get(root) else {
            return Err("IR builder expected a TranslationUnit at the AST root".to_string());
        };
        let items = items.clone();
        let mut functions = Vec::new();
        let mut public_functions = Vec::new();

        for item in items {
            if let AstNode::FunctionDef { body, .. } = self.ast.get(item) {
                let body = *body;
                let sem = self
                    .func_sem
                    .get(&item)
                    .cloned()
                    .ok_or_else(|| "missing FuncSem for a function definition".to_string())?;
                let symbol_handle = *self
                    .node_symbols
                    .get(&item)
                    .ok_or_else(|| "missing resolved symbol for a function definition".to_string())?;
                let symbol = self.symbols.get(symbol_handle).clone();

                let mut func = IrFunc::new(symbol.name.clone(), sem.local_bytes, sem.params.clone());
                self.lower_block(&mut func, body)?;

                if symbol.public {
                    public_functions.push(PublicFunction {
                        name: symbol.name.clone(),
                        params: sem
                            .params
                            .iter()
                            .map(|p| self.symbols.get(*p).name.clone())
                            .collect(),
                    });
                }
                functions.push(func);
            }
        }

        Ok(IrModule {
            functions,
            symbols: self.symbols,
            scopes: self.scopes,
            strings: self.strings,
            public_functions,
        })
    }

    fn lower_block(&mut self, func: &mut IrFunc, block: AstHandle) -> Result<(), String> {
        let AstNode::Block { stmts } = self.ast.get(block).clone() else {
            return Err("expected a Block node while lowering".to_string());
        };
        for stmt in stmts {
            self.lower_stmt(func, stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, func: &mut IrFunc, handle: AstHandle) -> Result<(), String> {
        match self.ast.get(handle).clone() {
            AstNode::Let { .. } => Ok(()), // the stack slot was reserved during binding
            AstNode::Return { value } => {
                let v = self.lower_expr(func, value)?;
                let mut instr = Instr::new(Op::Ret);
                instr.s1 = Some(v);
                func.emit(instr);
                Ok(())
            }
            AstNode::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(func, cond, then_branch, else_branch),
            AstNode::While { cond, body } => {
                let start = func.new_label();
                let end = func.new_label();
                func.emit(Self::label(start));
                let cv = self.lower_expr(func, cond)?;
                func.emit(Self::jump(Op::Jz, cv, end));
                self.lower_block(func, body)?;
                func.emit(Self::jump_unconditional(Op::Jmp, start));
                func.emit(Self::label(end));
                Ok(())
            }
            AstNode::Assign { value, .. } => {
                let val = self.lower_expr(func, value)?;
                let symbol = *self
                    .node_symbols
                    .get(&handle)
                    .ok_or_else(|| "assignment target not resolved by the binder".to_string())?;
                let addr = self.lower_variable_address(func, symbol)?;
                let mut instr = Instr::new(Op::Save);
                instr.s1 = Some(addr);
                instr.s2 = Some(val);
                func.emit(instr);
                Ok(())
            }
            AstNode::ExprStmt { expr } => self.lower_expr(func, expr).map(drop),
            AstNode::Block { .. } => self.lower_block(func, handle),
            other => Err(format!("unhandled statement AST kind {}", other.kind_name())),
        }
    }

    fn lower_if(
        &mut self,
        func: &mut IrFunc,
        cond: AstHandle,
        then_branch: AstHandle,
        else_branch: Option<AstHandle>,
    ) -> Result<(), String> {
        let else_label = func.new_label();
        let cv = self.lower_expr(func, cond)?;
        func.emit(Self::jump(Op::Jz, cv, else_label));
        self.lower_block(func, then_branch)?;
        match else_branch {
            Some(else_body) => {
                let end_label = func.new_label();
                func.emit(Self::jump_unconditional(Op::Jmp, end_label));
                func.emit(Self::label(else_label));
                match self.ast.get(else_body) {
                    AstNode::Block { .. } => self.lower_block(func, else_body)?,
                    AstNode::If { .. } => self.lower_stmt(func, else_body)?,
                    other => return Err(format!("unexpected else-branch kind {}", other.kind_name())),
                }
                func.emit(Self::label(end_label));
            }
            None => func.emit(Self::label(else_label)),
        }
        Ok(())
    }

    fn lower_expr(&mut self, func: &mut IrFunc, handle: AstHandle) -> Result<VReg, String> {
        match self.ast.get(handle).clone() {
            AstNode::Number { value } => {
                let t = func.new_vreg(VRegKind::Imm, Some(value));
                let mut instr = Instr::new(Op::MovImm);
                instr.t = Some(t);
                instr.imm = Some(value);
                func.emit(instr);
                Ok(t)
            }
            AstNode::Str { value } => {
                let id = self.intern_string(value);
                let t = func.new_vreg(VRegKind::Temp, None);
                let mut instr = Instr::new(Op::LeaString);
                instr.t = Some(t);
                instr.imm = Some(id);
                func.emit(instr);
                Ok(t)
            }
            AstNode::Ident { .. } => {
                let symbol = *self
                    .node_symbols
                    .get(&handle)
                    .ok_or_else(|| "identifier use not resolved by the binder".to_string())?;
                let addr = self.lower_variable_address(func, symbol)?;
                let t = func.new_vreg(VRegKind::Temp, None);
                let mut instr = Instr::new(Op::Load);
                instr.s1 = Some(addr);
                instr.t = Some(t);
                func.emit(instr);
                Ok(t)
            }
            AstNode::Binary { op, lhs, rhs } => {
                let l = self.lower_expr(func, lhs)?;
                let r = self.lower_expr(func, rhs)?;
                let t = func.new_vreg(VRegKind::Temp, None);
                let mut instr = Instr::new(binop_to_ir_op(op));
                instr.s1 = Some(l);
                instr.s2 = Some(r);
                instr.t = Some(t);
                func.emit(instr);
                Ok(t)
            }
            AstNode::Call { args, .. } => {
                let symbol = *self
                    .node_symbols
                    .get(&handle)
                    .ok_or_else(|| "call target not resolved by the binder".to_string())?;
                let mut arg_vregs = Vec::with_capacity(args.len());
                for arg in args {
                    arg_vregs.push(self.lower_expr(func, arg)?);
                }
                let t = func.new_vreg(VRegKind::Temp, None);
                let mut instr = Instr::new(Op::Call);
                instr.imm = Some(symbol.0 as i32);
                instr.args = arg_vregs;
                instr.t = Some(t);
                func.emit(instr);
                Ok(t)
            }
            AstNode::Switch { cond, arms } => self.lower_switch(func, cond, arms),
            other => Err(format!("unhandled expression AST kind {}", other.kind_name())),
        }
    }

    fn lower_switch(&mut self, func: &mut IrFunc, cond: AstHandle, arms: Vec<AstHandle>) -> Result<VReg, String> {
        let cv = self.lower_expr(func, cond)?;
        let result = func.new_vreg(VRegKind::Temp, None);
        let end_label = func.new_label();

        for arm in arms {
            let AstNode::Case { value, result: arm_result } = self.ast.get(arm).clone() else {
                return Err("expected a Case node in switch arm".to_string());
            };
            let next_label = func.new_label();
            let case_val = self.lower_expr(func, value)?;
            let cmp = func.new_vreg(VRegKind::Temp, None);
            let mut eq = Instr::new(Op::Equal);
            eq.s1 = Some(cv);
            eq.s2 = Some(case_val);
            eq.t = Some(cmp);
            func.emit(eq);
            func.emit(Self::jump(Op::Jz, cmp, next_label));

            let arm_val = self.lower_expr(func, arm_result)?;
            let mut mv = Instr::new(Op::Mov);
            mv.s1 = Some(arm_val);
            mv.t = Some(result);
            func.emit(mv);
            func.emit(Self::jump_unconditional(Op::Jmp, end_label));
            func.emit(Self::label(next_label));
        }
        func.emit(Self::label(end_label));
        Ok(result)
    }

    fn lower_variable_address(&mut self, func: &mut IrFunc, symbol: SymbolHandle) -> Result<VReg, String> {
        let sym = self.symbols.get(symbol);
        let offset = sym
            .stack_offset
            .ok_or_else(|| format!("symbol '{}' has no stack slot", sym.name))?;
        let addr = func.new_vreg(VRegKind::LVarAddr, None);
        let mut instr = Instr::new(Op::FrameAddr);
        instr.t = Some(addr);
        instr.imm = Some(offset as i32);
        func.emit(instr);
        Ok(addr)
    }

    fn intern_string(&mut self, value: String) -> i32 {
        let id = self.strings.len() as i32;
        self.strings.push(value);
        id
    }

    fn label(id: i32) -> Instr {
        let mut instr = Instr::new(Op::Label);
        instr.imm = Some(id);
        instr
    }

    fn jump(op: Op, cond: VReg, target: i32) -> Instr {
        let mut instr = Instr::new(op);
        instr.s1 = Some(cond);
        instr.imm = Some(target);
        instr
    }

    fn jump_unconditional(op: Op, target: i32) -> Instr {
        let mut instr = Instr::new(op);
        instr.imm = Some(target);
        instr
    }
}

fn binop_to_ir_op(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
        BinOp::Mod => Op::Mod,
        BinOp::BitAnd => Op::BitAnd,
        BinOp::BitOr => Op::BitOr,
        BinOp::BitXor => Op::BitXor,
        BinOp::Shl => Op::Lshift,
        BinOp::Shr => Op::Rshift,
        BinOp::And => Op::LogicalAnd,
        BinOp::Or => Op::LogicalOr,
        BinOp::Eq => Op::Equal,
        BinOp::Neq => Op::NotEqual,
        BinOp::Lt => Op::Lt,
        BinOp::Le => Op::Le,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{Binder, ImportLoader, ImportedFunction};
    use crate::parser::Parser;

    struct NoImports;
    impl ImportLoader for NoImports {
        fn load(&mut self, module_name: &str) -> Result<Vec<ImportedFunction>, String> {
            Err(format!("unexpected import of '{}'", module_name))
        }
    }

    fn lower(src: &str) -> IrModule {
        let (ast, root) = Parser::new(src).unwrap().parse().unwrap();
        let bound = Binder::new(&ast).bind_module(root, &mut NoImports).unwrap();
        IrBuilder::new(&ast, bound).lower_module(root).unwrap()
    }

    #[test]
    fn every_vreg_use_is_defined_by_an_earlier_or_same_instruction() {
        let module = lower("fn main() { return (1 + 2) * 3 - 4 / 2 + 7 % 4; }");
        let func = &module.functions[0];
        let mut defined = std::collections::HashSet::new();
        for instr in &func.instrs {
            for used in [instr.s1, instr.s2].into_iter().flatten() {
                assert!(defined.contains(&used), "use of undefined vreg {:?}", used);
            }
            for used in &instr.args {
                assert!(defined.contains(used), "use of undefined vreg {:?}", used);
            }
            if let Some(t) = instr.t {
                defined.insert(t);
            }
        }
    }

    #[test]
    fn label_targets_resolve_to_exactly_one_label_instruction() {
        let module = lower(
            "fn main() { let mut x; x = 5; if x < 10 { return 1; } else { return 0; } }",
        );
        let func = &module.functions[0];
        let mut label_counts: HashMap<i32, u32> = HashMap::new();
        for instr in &func.instrs {
            if instr.op == Op::Label {
                *label_counts.entry(instr.imm.unwrap()).or_insert(0) += 1;
            }
        }
        for instr in &func.instrs {
            if matches!(instr.op, Op::Jmp | Op::Jz | Op::Jnz) {
                assert_eq!(label_counts.get(&instr.imm.unwrap()), Some(&1));
            }
        }
    }

    #[test]
    fn switch_lowers_with_first_match_semantics() {
        let module = lower("fn main() { return switch 2 { 1 => 10, 2 => 20, }; }");
        let func = &module.functions[0];
        let equal_count = func.instrs.iter().filter(|i| i.op == Op::Equal).count();
        assert_eq!(equal_count, 2);
    }

    #[test]
    fn each_string_literal_occurrence_gets_its_own_pool_entry() {
        let module = lower(
            r#"fn main() { let mut a; let mut b; a = "hi"; b = "hi"; return 0; }"#,
        );
        assert_eq!(module.strings.len(), 2);
        assert_eq!(module.strings[0], "hi");
        assert_eq!(module.strings[1], "hi");
    }

    #[test]
    fn call_lowers_arguments_left_to_right_before_the_call() {
        let module = lower("fn add(a, b) { return a + b; } fn main() { return add(3, 4); }");
        let main = module.functions.iter().find(|f| f.name == "main").unwrap();
        let call = main.instrs.iter().find(|i| i.op == Op::Call).unwrap();
        assert_eq!(call.args.len(), 2);
    }
}
