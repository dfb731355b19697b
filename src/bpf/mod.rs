//! Classic BPF encoding and compilation of a [`FilterProgram`]
//!
//! The rule set only ever needs four instruction kinds: load a word of
//! `seccomp_data`, compare it against a constant, jump, and return an action.
//! They are emitted directly rather than through a general assembler.

pub mod interp;

use crate::arch::{ArchitectureProfile, Endian};
use crate::errors::{FilterError, Result};
use crate::filter::{Action, ArgLen, CmpOp, FilterProgram, Rule};

// BPF instruction classes and fields (linux/filter.h)
pub const BPF_LD: u16 = 0x00;
pub const BPF_JMP: u16 = 0x05;
pub const BPF_RET: u16 = 0x06;
pub const BPF_W: u16 = 0x00;
pub const BPF_ABS: u16 = 0x20;
pub const BPF_JA: u16 = 0x00;
pub const BPF_JEQ: u16 = 0x10;
pub const BPF_JGT: u16 = 0x20;
pub const BPF_JGE: u16 = 0x30;
pub const BPF_JSET: u16 = 0x40;
pub const BPF_K: u16 = 0x00;

/// Kernel limit on filter length
pub const BPF_MAXINSNS: usize = 4096;

/// Size of one serialized instruction
pub const INSTR_SIZE: usize = 8;

/// Seccomp return values (linux/seccomp.h)
pub mod actions {
    pub const SECCOMP_RET_KILL_PROCESS: u32 = 0x8000_0000;
    pub const SECCOMP_RET_ERRNO: u32 = 0x0005_0000;
    pub const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;
    pub const SECCOMP_RET_ACTION_FULL: u32 = 0xffff_0000;
    pub const SECCOMP_RET_DATA: u32 = 0x0000_ffff;
}

// struct seccomp_data offsets
pub const SECCOMP_DATA_NR_OFFSET: u32 = 0;
pub const SECCOMP_DATA_ARCH_OFFSET: u32 = 4;
pub const SECCOMP_DATA_ARGS_OFFSET: u32 = 16;

/// Compiled BPF instruction (`struct sock_filter`)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpfInstr {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

impl BpfInstr {
    pub const fn stmt(code: u16, k: u32) -> Self {
        BpfInstr { code, jt: 0, jf: 0, k }
    }

    pub const fn jump(code: u16, k: u32, jt: u8, jf: u8) -> Self {
        BpfInstr { code, jt, jf, k }
    }

    pub fn to_bytes(&self, endian: Endian) -> [u8; INSTR_SIZE] {
        let mut buf = [0u8; INSTR_SIZE];
        let (code, k) = match endian {
            Endian::Little => (self.code.to_le_bytes(), self.k.to_le_bytes()),
            Endian::Big => (self.code.to_be_bytes(), self.k.to_be_bytes()),
        };
        buf[0..2].copy_from_slice(&code);
        buf[2] = self.jt;
        buf[3] = self.jf;
        buf[4..8].copy_from_slice(&k);
        buf
    }

    pub fn from_bytes(buf: [u8; INSTR_SIZE], endian: Endian) -> Self {
        let code = [buf[0], buf[1]];
        let k = [buf[4], buf[5], buf[6], buf[7]];
        let (code, k) = match endian {
            Endian::Little => (u16::from_le_bytes(code), u32::from_le_bytes(k)),
            Endian::Big => (u16::from_be_bytes(code), u32::from_be_bytes(k)),
        };
        BpfInstr { code, jt: buf[2], jf: buf[3], k }
    }
}

fn load_word(offset: u32) -> BpfInstr {
    BpfInstr::stmt(BPF_LD | BPF_W | BPF_ABS, offset)
}

fn jeq(k: u32, jt: u8, jf: u8) -> BpfInstr {
    BpfInstr::jump(BPF_JMP | BPF_JEQ | BPF_K, k, jt, jf)
}

fn ret(action: Action) -> BpfInstr {
    BpfInstr::stmt(BPF_RET | BPF_K, encode_action(action))
}

/// Action to `SECCOMP_RET_*` value
pub fn encode_action(action: Action) -> u32 {
    match action {
        Action::Allow => actions::SECCOMP_RET_ALLOW,
        Action::Errno(errno) => actions::SECCOMP_RET_ERRNO | (u32::from(errno) & actions::SECCOMP_RET_DATA),
        Action::KillProcess => actions::SECCOMP_RET_KILL_PROCESS,
    }
}

/// `SECCOMP_RET_*` value back to an action, if it is one we emit
pub fn decode_action(value: u32) -> Option<Action> {
    match value & actions::SECCOMP_RET_ACTION_FULL {
        actions::SECCOMP_RET_ALLOW => Some(Action::Allow),
        actions::SECCOMP_RET_ERRNO => Some(Action::Errno((value & actions::SECCOMP_RET_DATA) as u16)),
        actions::SECCOMP_RET_KILL_PROCESS => Some(Action::KillProcess),
        _ => None,
    }
}

/// Offsets of the low and high 32-bit halves of `args[index]`
pub fn arg_offsets(index: u8, endian: Endian) -> (u32, u32) {
    let base = SECCOMP_DATA_ARGS_OFFSET + 8 * u32::from(index);
    match endian {
        Endian::Little => (base, base + 4),
        Endian::Big => (base + 4, base),
    }
}

fn jump_offset(distance: usize, what: &str) -> Result<u8> {
    u8::try_from(distance).map_err(|_| {
        FilterError::Compile(format!("{} needs a jump of {} instructions (max 255)", what, distance))
    })
}

/// A compiled filter, ready to be written out for the launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    instructions: Vec<BpfInstr>,
    endian: Endian,
}

impl CompiledProgram {
    pub fn instructions(&self) -> &[BpfInstr] {
        &self.instructions
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Raw `sock_filter` array in the target's byte order
    pub fn to_bytes(&self) -> Vec<u8> {
        self.instructions
            .iter()
            .flat_map(|instr| instr.to_bytes(self.endian))
            .collect()
    }

    /// Parse an exported filter back into instructions
    pub fn from_bytes(bytes: &[u8], endian: Endian) -> Result<Self> {
        if bytes.is_empty() || bytes.len() % INSTR_SIZE != 0 {
            return Err(FilterError::Compile(format!(
                "{} bytes is not a whole number of instructions",
                bytes.len()
            )));
        }
        let instructions = bytes
            .chunks_exact(INSTR_SIZE)
            .map(|chunk| {
                let mut buf = [0u8; INSTR_SIZE];
                buf.copy_from_slice(chunk);
                BpfInstr::from_bytes(buf, endian)
            })
            .collect();
        Ok(Self { instructions, endian })
    }
}

/// Compile `program` for `profile`.
///
/// Layout: architecture check, syscall number load, optional foreign-ABI
/// check, then one block per syscall in first-rule order. Each block tries
/// its rules in insertion order and ends with the default action.
pub fn compile(program: &FilterProgram, profile: &ArchitectureProfile) -> Result<CompiledProgram> {
    let kill = ret(Action::KillProcess);
    let mut instrs = vec![
        load_word(SECCOMP_DATA_ARCH_OFFSET),
        jeq(profile.audit_arch, 1, 0),
        kill,
        load_word(SECCOMP_DATA_NR_OFFSET),
    ];

    if let Some(limit) = profile.syscall_nr_limit {
        instrs.push(BpfInstr::jump(BPF_JMP | BPF_JGE | BPF_K, limit, 0, 1));
        instrs.push(kill);
    }

    for nr in program.syscalls() {
        let mut block = Vec::new();
        for rule in program.rules_for(nr) {
            block.extend(compile_rule(rule, profile.endian)?);
        }
        block.push(ret(program.default_action()));

        let skip = jump_offset(block.len(), &format!("syscall {}", nr))?;
        instrs.push(jeq(nr, 0, skip));
        instrs.extend(block);
    }

    instrs.push(ret(program.default_action()));

    if instrs.len() > BPF_MAXINSNS {
        return Err(FilterError::Compile(format!(
            "program has {} instructions (max {})",
            instrs.len(),
            BPF_MAXINSNS
        )));
    }

    Ok(CompiledProgram {
        instructions: instrs,
        endian: profile.endian,
    })
}

/// Loads and compares for every constraint, falling through to the next rule
/// on the first mismatch, then the rule's return.
fn compile_rule(rule: &Rule, endian: Endian) -> Result<Vec<BpfInstr>> {
    let mut checks = Vec::new();
    for constraint in &rule.constraints {
        let (lo, hi) = arg_offsets(constraint.index, endian);
        match (constraint.op, constraint.len) {
            (CmpOp::Eq, ArgLen::Dword) => checks.push((lo, constraint.value as u32)),
            (CmpOp::Eq, ArgLen::Qword) => {
                checks.push((hi, (constraint.value >> 32) as u32));
                checks.push((lo, constraint.value as u32));
            }
        }
    }

    let len = checks.len() * 2 + 1;
    let mut out = Vec::with_capacity(len);
    for (offset, value) in checks {
        out.push(load_word(offset));
        let skip = jump_offset(len - out.len() - 1, &rule.syscall)?;
        out.push(jeq(value, 0, skip));
    }
    out.push(ret(rule.action));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Arch;
    use crate::filter::{unix_socket_policy, ArgConstraint, FilterBuilder};

    const EPERM: u16 = libc::EPERM as u16;

    #[test]
    fn test_instruction_encoding_is_eight_bytes() {
        let instr = BpfInstr::jump(BPF_JMP | BPF_JEQ | BPF_K, 0xc000003e, 1, 2);
        assert_eq!(
            instr.to_bytes(Endian::Little),
            [0x15, 0x00, 0x01, 0x02, 0x3e, 0x00, 0x00, 0xc0]
        );
        assert_eq!(
            instr.to_bytes(Endian::Big),
            [0x00, 0x15, 0x01, 0x02, 0xc0, 0x00, 0x00, 0x3e]
        );
    }

    #[test]
    fn test_action_values() {
        assert_eq!(encode_action(Action::Allow), 0x7fff0000);
        assert_eq!(encode_action(Action::Errno(1)), 0x00050001);
        assert_eq!(encode_action(Action::KillProcess), 0x80000000);
        assert_eq!(decode_action(0x00050001), Some(Action::Errno(1)));
        assert_eq!(decode_action(0x00030000), None);
    }

    #[test]
    fn test_arg_offsets_follow_endianness() {
        assert_eq!(arg_offsets(0, Endian::Little), (16, 20));
        assert_eq!(arg_offsets(0, Endian::Big), (20, 16));
        assert_eq!(arg_offsets(2, Endian::Little), (32, 36));
    }

    #[test]
    fn test_empty_program_allows_everything() {
        let compiled = FilterBuilder::new(Arch::Aarch64.profile()).finalize().unwrap();
        assert_eq!(compiled.len(), 5);
        assert_eq!(compiled.instructions()[1].k, crate::arch::audit::AUDIT_ARCH_AARCH64);
        assert_eq!(compiled.instructions()[4].k, actions::SECCOMP_RET_ALLOW);
    }

    #[test]
    fn test_x86_64_layout() {
        let compiled = unix_socket_policy(Arch::X86_64.profile(), EPERM)
            .unwrap()
            .finalize()
            .unwrap();
        let ld = BPF_LD | BPF_W | BPF_ABS;
        let jeq_k = BPF_JMP | BPF_JEQ | BPF_K;
        let ret_k = BPF_RET | BPF_K;
        let errno = actions::SECCOMP_RET_ERRNO | 1;
        let allow = actions::SECCOMP_RET_ALLOW;
        let kill = actions::SECCOMP_RET_KILL_PROCESS;

        let expected = vec![
            BpfInstr::stmt(ld, 4),
            BpfInstr::jump(jeq_k, 0xc000003e, 1, 0),
            BpfInstr::stmt(ret_k, kill),
            BpfInstr::stmt(ld, 0),
            BpfInstr::jump(BPF_JMP | BPF_JGE | BPF_K, 0x4000_0000, 0, 1),
            BpfInstr::stmt(ret_k, kill),
            BpfInstr::jump(jeq_k, 41, 0, 4),
            BpfInstr::stmt(ld, 16),
            BpfInstr::jump(jeq_k, 1, 0, 1),
            BpfInstr::stmt(ret_k, errno),
            BpfInstr::stmt(ret_k, allow),
            BpfInstr::jump(jeq_k, 53, 0, 4),
            BpfInstr::stmt(ld, 16),
            BpfInstr::jump(jeq_k, 1, 0, 1),
            BpfInstr::stmt(ret_k, errno),
            BpfInstr::stmt(ret_k, allow),
            BpfInstr::stmt(ret_k, allow),
        ];
        assert_eq!(compiled.instructions(), expected.as_slice());
    }

    #[test]
    fn test_qword_constraint_checks_both_halves() {
        let mut builder = FilterBuilder::new(Arch::X86_64.profile());
        builder
            .add_rule("read", vec![ArgConstraint::qword_eq(1, 0x1_0000_0002)], Action::Errno(EPERM))
            .unwrap();
        let compiled = builder.finalize().unwrap();
        let body = &compiled.instructions()[7..12];
        assert_eq!(body[0], load_word(28));
        assert_eq!(body[1], jeq(1, 0, 3));
        assert_eq!(body[2], load_word(24));
        assert_eq!(body[3], jeq(2, 0, 1));
        assert_eq!(body[4].k, encode_action(Action::Errno(EPERM)));
    }

    #[test]
    fn test_oversized_block_is_compile_error() {
        let mut builder = FilterBuilder::new(Arch::X86_64.profile());
        for _ in 0..100 {
            builder.deny_syscall_on_domain("socket", 1, EPERM).unwrap();
        }
        let err = builder.finalize().unwrap_err();
        assert!(matches!(err, FilterError::Compile(_)));
    }

    #[test]
    fn test_bytes_roundtrip_through_big_endian() {
        let compiled = unix_socket_policy(Arch::S390x.profile(), EPERM)
            .unwrap()
            .finalize()
            .unwrap();
        let bytes = compiled.to_bytes();
        assert_eq!(bytes.len(), compiled.len() * INSTR_SIZE);
        let parsed = CompiledProgram::from_bytes(&bytes, Endian::Big).unwrap();
        assert_eq!(parsed, compiled);
    }

    #[test]
    fn test_truncated_bytes_rejected() {
        assert!(CompiledProgram::from_bytes(&[0u8; 12], Endian::Little).is_err());
        assert!(CompiledProgram::from_bytes(&[], Endian::Little).is_err());
    }
}
