//! x86-64 Intel-syntax text emitter with an interleaved linear-scan
//! register allocator.

use std::fmt::Write as _;

use crate::ir::{IrFunc, IrModule, Op};
use crate::regalloc::{PhysReg, RegAlloc};
use crate::symbol::SymbolHandle;

const ABI_PARAM_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

pub struct Emitter<'a> {
    module: &'a IrModule,
    out: String,
}

impl<'a> Emitter<'a> {
    pub fn new(module: &'a IrModule) -> Self {
        Emitter {
            module,
            out: String::new(),
        }
    }

    pub fn emit(mut self) -> Result<String, String> {
        writeln!(self.out, ".intel_syntax noprefix").unwrap();

        if !self.module.strings.is_empty() {
            writeln!(self.out, ".section .rodata").unwrap();
            for (id, text) in self.module.strings.iter().enumerate() {
                writeln!(self.out, ".Lstr{}:", id).unwrap();
                writeln!(self.out, "    .string {:?}", text).unwrap();
            }
        }

        writeln!(self.out, ".text").unwrap();
        for func in &self.module.functions {
            self.emit_function(func)?;
        }
        Ok(self.out)
    }

    fn emit_function(&mut self, func: &IrFunc) -> Result<(), String> {
        if func.params.len() > 6 {
            return Err(format!(
                "function '{}' takes {} parameters, more than the six the ABI passes in registers",
                func.name,
                func.params.len()
            ));
        }

        writeln!(self.out, ".global {}", func.name).unwrap();
        writeln!(self.out, "{}:", func.name).unwrap();
        writeln!(self.out, "    push rbp").unwrap();
        writeln!(self.out, "    mov rbp, rsp").unwrap();
        writeln!(self.out, "    sub rsp, {}", func.local_stack_bytes).unwrap();

        for (i, param) in func.params.iter().enumerate() {
            let offset = self
                .module
                .symbols
                .get(*param)
                .stack_offset
                .ok_or_else(|| "parameter symbol missing a stack offset".to_string())?;
            writeln!(self.out, "    mov [rbp - {}], {}", offset, ABI_PARAM_REGS[i]).unwrap();
        }

        let mut alloc = RegAlloc::for_function(func);
        for (pos, instr) in func.instrs.iter().enumerate() {
            alloc.expire_at(pos);
            self.emit_instr(func, &mut alloc, instr)?;
        }

        writeln!(self.out, "ret_{}:", func.name).unwrap();
        writeln!(self.out, "    mov rsp, rbp").unwrap();
        writeln!(self.out, "    pop rbp").unwrap();
        writeln!(self.out, "    ret").unwrap();
        Ok(())
    }

    fn emit_instr(&mut self, func: &IrFunc, alloc: &mut RegAlloc, instr: &crate::ir::Instr) -> Result<(), String> {
        match instr.op {
            Op::MovImm => {
                let rt = alloc.alloc(instr.t.unwrap())?;
                let imm = instr.imm.unwrap();
                writeln!(self.out, "    mov {}, {}", rt.name64(), imm).unwrap();
            }
            Op::Mov => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                let rt = alloc.alloc(instr.t.unwrap())?;
                if rt != r1 {
                    writeln!(self.out, "    mov {}, {}", rt.name64(), r1.name64()).unwrap();
                }
            }
            Op::Add | Op::Sub | Op::Mul => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                let r2 = alloc.alloc(instr.s2.unwrap())?;
                let rt = alloc.alloc(instr.t.unwrap())?;
                if rt != r1 {
                    writeln!(self.out, "    mov {}, {}", rt.name64(), r1.name64()).unwrap();
                }
                let mnemonic = match instr.op {
                    Op::Add => "add",
                    Op::Sub => "sub",
                    Op::Mul => "imul",
                    _ => unreachable!(),
                };
                writeln!(self.out, "    {} {}, {}", mnemonic, rt.name64(), r2.name64()).unwrap();
            }
            Op::Div | Op::Mod => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                let r2 = alloc.alloc(instr.s2.unwrap())?;
                let rt = alloc.alloc(instr.t.unwrap())?;
                if r1.name64() != "rax" {
                    writeln!(self.out, "    mov rax, {}", r1.name64()).unwrap();
                }
                writeln!(self.out, "    cqo").unwrap();
                writeln!(self.out, "    idiv {}", r2.name64()).unwrap();
                let result_reg = if instr.op == Op::Div { "rax" } else { "rdx" };
                if rt.name64() != result_reg {
                    writeln!(self.out, "    mov {}, {}", rt.name64(), result_reg).unwrap();
                }
            }
            Op::BitAnd | Op::BitOr | Op::BitXor => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                let r2 = alloc.alloc(instr.s2.unwrap())?;
                let rt = alloc.alloc(instr.t.unwrap())?;
                if rt != r1 {
                    writeln!(self.out, "    mov {}, {}", rt.name64(), r1.name64()).unwrap();
                }
                let mnemonic = match instr.op {
                    Op::BitAnd => "and",
                    Op::BitOr => "or",
                    Op::BitXor => "xor",
                    _ => unreachable!(),
                };
                writeln!(self.out, "    {} {}, {}", mnemonic, rt.name64(), r2.name64()).unwrap();
            }
            Op::Lshift | Op::Rshift => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                let r2 = alloc.alloc(instr.s2.unwrap())?;
                let rt = alloc.alloc(instr.t.unwrap())?;
                if rt != r1 {
                    writeln!(self.out, "    mov {}, {}", rt.name64(), r1.name64()).unwrap();
                }
                writeln!(self.out, "    mov cl, {}", r2.name8()).unwrap();
                let mnemonic = if instr.op == Op::Lshift { "shl" } else { "shr" };
                writeln!(self.out, "    {} {}, cl", mnemonic, rt.name64()).unwrap();
            }
            Op::Equal | Op::NotEqual | Op::Lt | Op::Le => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                let r2 = alloc.alloc(instr.s2.unwrap())?;
                let rt = alloc.alloc(instr.t.unwrap())?;
                writeln!(self.out, "    cmp {}, {}", r1.name64(), r2.name64()).unwrap();
                let set = match instr.op {
                    Op::Equal => "sete",
                    Op::NotEqual => "setne",
                    Op::Lt => "setl",
                    Op::Le => "setle",
                    _ => unreachable!(),
                };
                writeln!(self.out, "    {} al", set).unwrap();
                writeln!(self.out, "    movzx {}, al", rt.name64()).unwrap();
            }
            Op::LogicalAnd | Op::LogicalOr => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                let r2 = alloc.alloc(instr.s2.unwrap())?;
                let rt = alloc.alloc(instr.t.unwrap())?;
                writeln!(self.out, "    cmp {}, 0", r1.name64()).unwrap();
                writeln!(self.out, "    setne al").unwrap();
                writeln!(self.out, "    cmp {}, 0", r2.name64()).unwrap();
                writeln!(self.out, "    setne cl").unwrap();
                let mnemonic = if instr.op == Op::LogicalAnd { "and" } else { "or" };
                writeln!(self.out, "    {} al, cl", mnemonic).unwrap();
                writeln!(self.out, "    movzx {}, al", rt.name64()).unwrap();
            }
            Op::FrameAddr => {
                let rt = alloc.alloc(instr.t.unwrap())?;
                writeln!(self.out, "    lea {}, [rbp - {}]", rt.name64(), instr.imm.unwrap()).unwrap();
            }
            Op::Load => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                let rt = alloc.alloc(instr.t.unwrap())?;
                writeln!(self.out, "    mov {}, [{}]", rt.name64(), r1.name64()).unwrap();
            }
            Op::Save => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                let r2 = alloc.alloc(instr.s2.unwrap())?;
                writeln!(self.out, "    mov [{}], {}", r1.name64(), r2.name64()).unwrap();
            }
            Op::LeaString => {
                let rt = alloc.alloc(instr.t.unwrap())?;
                writeln!(self.out, "    lea {}, [rip + .Lstr{}]", rt.name64(), instr.imm.unwrap()).unwrap();
            }
            Op::Label => {
                writeln!(self.out, ".L{}{}:", func.name, instr.imm.unwrap()).unwrap();
            }
            Op::Jmp => {
                writeln!(self.out, "    jmp .L{}{}", func.name, instr.imm.unwrap()).unwrap();
            }
            Op::Jz | Op::Jnz => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                writeln!(self.out, "    cmp {}, 0", r1.name64()).unwrap();
                let mnemonic = if instr.op == Op::Jz { "je" } else { "jne" };
                writeln!(self.out, "    {} .L{}{}", mnemonic, func.name, instr.imm.unwrap()).unwrap();
            }
            Op::Call => {
                if instr.args.len() > 6 {
                    return Err(format!(
                        "call in '{}' passes {} arguments, more than the six ABI registers",
                        func.name,
                        instr.args.len()
                    ));
                }
                let arg_regs: Vec<PhysReg> = instr
                    .args
                    .iter()
                    .map(|&v| alloc.alloc(v))
                    .collect::<Result<_, _>>()?;
                for (arg_reg, abi_reg) in arg_regs.iter().zip(ABI_PARAM_REGS.iter()) {
                    writeln!(self.out, "    mov {}, {}", abi_reg, arg_reg.name64()).unwrap();
                }
                let callee = SymbolHandle(instr.imm.unwrap() as u32);
                let name = self.module.symbols.get(callee).name.clone();
                writeln!(self.out, "    call {}", name).unwrap();
                let rt = alloc.alloc(instr.t.unwrap())?;
                writeln!(self.out, "    mov {}, rax", rt.name64()).unwrap();
            }
            Op::Ret => {
                let r1 = alloc.alloc(instr.s1.unwrap())?;
                writeln!(self.out, "    mov rax, {}", r1.name64()).unwrap();
                writeln!(self.out, "    jmp ret_{}", func.name).unwrap();
            }
        }
        Ok(())
    }
}
