//! Userspace evaluation of seccomp BPF programs
//!
//! Executes the instruction subset the compiler emits against a synthetic
//! `seccomp_data`, so a filter can be checked without installing it.

use super::{
    decode_action, BpfInstr, CompiledProgram, BPF_ABS, BPF_JA, BPF_JEQ, BPF_JGE, BPF_JGT, BPF_JMP,
    BPF_JSET, BPF_K, BPF_LD, BPF_RET, BPF_W,
};
use crate::arch::{ArchitectureProfile, Endian};
use crate::filter::Action;
use thiserror::Error;

/// Errors raised while interpreting a program
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InterpError {
    #[error("Unsupported instruction {code:#06x} at {pc}")]
    Unsupported { pc: usize, code: u16 },

    #[error("Invalid load offset {offset} at {pc}")]
    BadLoad { pc: usize, offset: u32 },

    #[error("Program ran past its end")]
    FellOffEnd,

    #[error("Unknown return value {0:#010x}")]
    UnknownAction(u32),
}

/// Mirror of the kernel's `struct seccomp_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeccompData {
    pub nr: u32,
    pub arch: u32,
    pub instruction_pointer: u64,
    pub args: [u64; 6],
}

impl SeccompData {
    pub fn new(arch: u32, nr: u32, args: [u64; 6]) -> Self {
        Self {
            nr,
            arch,
            instruction_pointer: 0,
            args,
        }
    }

    /// A call to `syscall` as seen on `profile`
    pub fn for_syscall(profile: &ArchitectureProfile, syscall: &str, args: [u64; 6]) -> Option<Self> {
        profile
            .syscall_number(syscall)
            .map(|nr| Self::new(profile.audit_arch, nr, args))
    }

    fn load_word(&self, offset: u32, endian: Endian) -> Option<u32> {
        if offset % 4 != 0 {
            return None;
        }
        let split = |value: u64, second_half: bool| {
            let (first, second) = match endian {
                Endian::Little => (value as u32, (value >> 32) as u32),
                Endian::Big => ((value >> 32) as u32, value as u32),
            };
            if second_half {
                second
            } else {
                first
            }
        };
        match offset {
            0 => Some(self.nr),
            4 => Some(self.arch),
            8 | 12 => Some(split(self.instruction_pointer, offset == 12)),
            16..=60 => {
                let rel = offset - 16;
                Some(split(self.args[(rel / 8) as usize], rel % 8 == 4))
            }
            _ => None,
        }
    }
}

/// Run `program` and return the raw `SECCOMP_RET_*` value
pub fn run(program: &CompiledProgram, data: &SeccompData) -> Result<u32, InterpError> {
    let instrs: &[BpfInstr] = program.instructions();
    let mut acc: u32 = 0;
    let mut pc = 0usize;

    loop {
        let instr = instrs.get(pc).ok_or(InterpError::FellOffEnd)?;
        match instr.code {
            c if c == BPF_LD | BPF_W | BPF_ABS => {
                acc = data
                    .load_word(instr.k, program.endian())
                    .ok_or(InterpError::BadLoad { pc, offset: instr.k })?;
                pc += 1;
            }
            c if c == BPF_RET | BPF_K => return Ok(instr.k),
            c if c == BPF_JMP | BPF_JA => pc += 1 + instr.k as usize,
            c if c & 0x07 == BPF_JMP && c & 0x08 == BPF_K => {
                let taken = match c & 0xf0 {
                    BPF_JEQ => acc == instr.k,
                    BPF_JGT => acc > instr.k,
                    BPF_JGE => acc >= instr.k,
                    BPF_JSET => acc & instr.k != 0,
                    _ => return Err(InterpError::Unsupported { pc, code: c }),
                };
                pc += 1 + usize::from(if taken { instr.jt } else { instr.jf });
            }
            c => return Err(InterpError::Unsupported { pc, code: c }),
        }
    }
}

/// Run `program` and decode the result
pub fn evaluate(program: &CompiledProgram, data: &SeccompData) -> Result<Action, InterpError> {
    let value = run(program, data)?;
    decode_action(value).ok_or(InterpError::UnknownAction(value))
}
