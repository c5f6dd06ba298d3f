//! Pipeline-level tests: source text all the way to emitted assembly
//! text, covering the end-to-end scenarios a linked, run binary would
//! need to exit with a given status. These assert on the assembly the
//! emitter produces rather than linking and running it.

use tanec::binder::{Binder, ImportLoader, ImportedFunction};
use tanec::emitter::Emitter;
use tanec::ir::IrBuilder;
use tanec::parser::Parser;

struct NoImports;
impl ImportLoader for NoImports {
    fn load(&mut self, module_name: &str) -> Result<Vec<ImportedFunction>, String> {
        Err(format!("unexpected import of '{}'", module_name))
    }
}

fn compile(src: &str) -> String {
    let (ast, root) = Parser::new(src).unwrap().parse().unwrap();
    let bound = Binder::new(&ast)
        .bind_module(root, &mut NoImports)
        .unwrap();
    let module = IrBuilder::new(&ast, bound).lower_module(root).unwrap();
    Emitter::new(&module).emit().unwrap()
}

#[test]
fn literal_return_moves_the_constant_toward_the_exit_path() {
    let asm = compile("fn main() { return 42; }");
    assert!(asm.contains(".global main"));
    assert!(asm.contains("42"));
    assert!(asm.contains("ret_main:"));
}

#[test]
fn arithmetic_precedence_lowers_to_a_chain_of_operations() {
    let asm = compile("fn main() { return (1 + 2) * 3 - 4 / 2 + 7 % 4; }");
    assert!(asm.contains("imul"));
    assert!(asm.contains("idiv"));
    assert!(asm.contains("add"));
    assert!(asm.contains("sub"));
}

#[test]
fn if_else_with_assignment_and_comparison() {
    let asm = compile(
        "fn main() { let mut x; x = 5; if x < 10 { return 1; } else { return 0; } }",
    );
    assert!(asm.contains("setl"));
    assert!(asm.contains("je .Lmain") || asm.contains("jne .Lmain"));
}

#[test]
fn while_loop_accumulates_into_a_running_sum() {
    let asm = compile(
        "fn main() { let mut i; let mut s; i = 0; s = 0; while i < 5 { s = s + i; i = i + 1; } return s; }",
    );
    assert!(asm.contains("jmp .Lmain"));
    assert!(asm.matches(".Lmain").count() >= 4);
}

#[test]
fn call_to_a_two_argument_function() {
    let asm = compile("fn add(a, b) { return a + b; } fn main() { return add(3, 4); }");
    assert!(asm.contains("call add"));
    assert!(asm.contains(".global add"));
    assert!(asm.contains(".global main"));
}

#[test]
fn switch_with_first_match_selects_the_matching_arm() {
    let asm = compile(
        "fn main() { let mut x; x = 2; return switch x { 1 => 10, 2 => 20, 3 => 30, }; }",
    );
    assert!(asm.contains("sete al"));
    let jz_or_jnz_count = asm.matches("je .Lmain").count() + asm.matches("jne .Lmain").count();
    assert!(jz_or_jnz_count >= 3);
}

#[test]
fn public_function_is_reachable_and_private_one_is_not_exported() {
    let (ast, root) = Parser::new("pub fn f(a, b) { return a; } fn helper() { return 0; }")
        .unwrap()
        .parse()
        .unwrap();
    let bound = Binder::new(&ast)
        .bind_module(root, &mut NoImports)
        .unwrap();
    let module = IrBuilder::new(&ast, bound).lower_module(root).unwrap();
    assert_eq!(module.public_functions.len(), 1);
    assert_eq!(module.public_functions[0].name, "f");
    assert_eq!(module.public_functions[0].params, vec!["a", "b"]);
}
