//! Architecture profiles
//!
//! Everything the filter needs to know about a target lives in an
//! [`ArchitectureProfile`]: the audit architecture token the kernel reports in
//! `seccomp_data.arch`, the byte order of that structure, the syscall numbers
//! the rules refer to, and whether socket calls can also reach the kernel
//! through the legacy `socketcall(2)` multiplexer.
//!
//! The profile for the running host is selected at runtime with
//! [`ArchitectureProfile::native`]; any other supported profile can be picked
//! by name to generate filters for a different target.

use crate::errors::{FilterError, Result};
use clap::ValueEnum;
use serde::Serialize;

/// Audit architecture tokens (linux/audit.h)
pub mod audit {
    pub const AUDIT_ARCH_X86_64: u32 = 0xc000003e;
    pub const AUDIT_ARCH_I386: u32 = 0x40000003;
    pub const AUDIT_ARCH_AARCH64: u32 = 0xc00000b7;
    pub const AUDIT_ARCH_ARM: u32 = 0x40000028;
    pub const AUDIT_ARCH_RISCV64: u32 = 0xc00000f3;
    pub const AUDIT_ARCH_S390X: u32 = 0x80000016;
    pub const AUDIT_ARCH_PPC64LE: u32 = 0xc0000015;
}

/// `socketcall(2)` sub-operation codes (linux/net.h)
pub const SYS_SOCKET: u32 = 1;
pub const SYS_SOCKETPAIR: u32 = 8;

/// x32 syscalls share the x86_64 audit token and set this bit in `nr`.
const X32_SYSCALL_BIT: u32 = 0x4000_0000;

/// Byte order of `seccomp_data` and of the exported instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Little,
    Big,
}

/// A multiplexed socket syscall and the sub-operations that create sockets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SocketMultiplex {
    pub syscall: &'static str,
    pub create_socket: u32,
    pub create_socketpair: u32,
}

const SOCKETCALL: SocketMultiplex = SocketMultiplex {
    syscall: "socketcall",
    create_socket: SYS_SOCKET,
    create_socketpair: SYS_SOCKETPAIR,
};

/// Target description consumed by the builder and the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchitectureProfile {
    pub name: &'static str,
    pub audit_arch: u32,
    pub endian: Endian,
    pub syscalls: &'static [(&'static str, u32)],
    /// Syscall numbers at or above this value belong to a foreign ABI
    pub syscall_nr_limit: Option<u32>,
    pub multiplex: Option<SocketMultiplex>,
}

impl ArchitectureProfile {
    /// Profile of the architecture this binary was built for, if supported
    pub fn native() -> Option<&'static ArchitectureProfile> {
        Arch::native().map(|arch| arch.profile())
    }

    /// Resolve an explicit architecture, falling back to the host
    pub fn resolve(arch: Option<Arch>) -> Result<&'static ArchitectureProfile> {
        Self::select(arch, Self::native())
    }

    pub(crate) fn select(
        arch: Option<Arch>,
        native: Option<&'static ArchitectureProfile>,
    ) -> Result<&'static ArchitectureProfile> {
        match arch {
            Some(arch) => Ok(arch.profile()),
            None => native.ok_or_else(|| {
                FilterError::Initialization(format!(
                    "unsupported build target '{}'",
                    std::env::consts::ARCH
                ))
            }),
        }
    }

    /// Get syscall number by name
    pub fn syscall_number(&self, name: &str) -> Option<u32> {
        self.syscalls
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, nr)| *nr)
    }
}

/// Supported target architectures
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize)]
pub enum Arch {
    #[value(name = "x86_64")]
    X86_64,
    #[value(name = "x86", alias = "i386", alias = "i686")]
    X86,
    #[value(name = "aarch64", alias = "arm64")]
    Aarch64,
    #[value(name = "arm")]
    Arm,
    #[value(name = "riscv64")]
    Riscv64,
    #[value(name = "s390x")]
    S390x,
    #[value(name = "ppc64le")]
    Ppc64le,
}

impl Arch {
    pub fn all() -> Vec<Self> {
        vec![
            Arch::X86_64,
            Arch::X86,
            Arch::Aarch64,
            Arch::Arm,
            Arch::Riscv64,
            Arch::S390x,
            Arch::Ppc64le,
        ]
    }

    pub fn native() -> Option<Self> {
        #[cfg(target_arch = "x86_64")]
        {
            Some(Arch::X86_64)
        }
        #[cfg(target_arch = "x86")]
        {
            Some(Arch::X86)
        }
        #[cfg(target_arch = "aarch64")]
        {
            Some(Arch::Aarch64)
        }
        #[cfg(target_arch = "arm")]
        {
            Some(Arch::Arm)
        }
        #[cfg(target_arch = "riscv64")]
        {
            Some(Arch::Riscv64)
        }
        #[cfg(target_arch = "s390x")]
        {
            Some(Arch::S390x)
        }
        #[cfg(all(target_arch = "powerpc64", target_endian = "little"))]
        {
            Some(Arch::Ppc64le)
        }
        #[cfg(not(any(
            target_arch = "x86_64",
            target_arch = "x86",
            target_arch = "aarch64",
            target_arch = "arm",
            target_arch = "riscv64",
            target_arch = "s390x",
            all(target_arch = "powerpc64", target_endian = "little")
        )))]
        {
            None
        }
    }

    pub fn profile(&self) -> &'static ArchitectureProfile {
        match self {
            Arch::X86_64 => &X86_64,
            Arch::X86 => &X86,
            Arch::Aarch64 => &AARCH64,
            Arch::Arm => &ARM,
            Arch::Riscv64 => &RISCV64,
            Arch::S390x => &S390X,
            Arch::Ppc64le => &PPC64LE,
        }
    }
}

// Syscall numbers from each architecture's unistd.h / syscall.tbl

const X86_64_SYSCALLS: &[(&str, u32)] = &[
    ("read", 0),
    ("write", 1),
    ("close", 3),
    ("socket", 41),
    ("connect", 42),
    ("bind", 49),
    ("socketpair", 53),
];

const X86_SYSCALLS: &[(&str, u32)] = &[
    ("read", 3),
    ("write", 4),
    ("close", 6),
    ("socketcall", 102),
    ("socket", 359),
    ("socketpair", 360),
    ("bind", 361),
    ("connect", 362),
];

// asm-generic table shared by aarch64 and riscv64
const GENERIC_SYSCALLS: &[(&str, u32)] = &[
    ("close", 57),
    ("read", 63),
    ("write", 64),
    ("socket", 198),
    ("socketpair", 199),
    ("bind", 200),
    ("connect", 203),
];

// EABI; socketcall only exists for OABI binaries
const ARM_SYSCALLS: &[(&str, u32)] = &[
    ("read", 3),
    ("write", 4),
    ("close", 6),
    ("socket", 281),
    ("bind", 282),
    ("connect", 283),
    ("socketpair", 288),
];

const S390X_SYSCALLS: &[(&str, u32)] = &[
    ("read", 3),
    ("write", 4),
    ("close", 6),
    ("socketcall", 102),
    ("socket", 359),
    ("socketpair", 360),
    ("bind", 361),
    ("connect", 362),
];

const PPC64_SYSCALLS: &[(&str, u32)] = &[
    ("read", 3),
    ("write", 4),
    ("close", 6),
    ("socketcall", 102),
    ("socket", 326),
    ("bind", 327),
    ("connect", 328),
    ("socketpair", 333),
];

static X86_64: ArchitectureProfile = ArchitectureProfile {
    name: "x86_64",
    audit_arch: audit::AUDIT_ARCH_X86_64,
    endian: Endian::Little,
    syscalls: X86_64_SYSCALLS,
    syscall_nr_limit: Some(X32_SYSCALL_BIT),
    multiplex: None,
};

static X86: ArchitectureProfile = ArchitectureProfile {
    name: "x86",
    audit_arch: audit::AUDIT_ARCH_I386,
    endian: Endian::Little,
    syscalls: X86_SYSCALLS,
    syscall_nr_limit: None,
    multiplex: Some(SOCKETCALL),
};

static AARCH64: ArchitectureProfile = ArchitectureProfile {
    name: "aarch64",
    audit_arch: audit::AUDIT_ARCH_AARCH64,
    endian: Endian::Little,
    syscalls: GENERIC_SYSCALLS,
    syscall_nr_limit: None,
    multiplex: None,
};

static ARM: ArchitectureProfile = ArchitectureProfile {
    name: "arm",
    audit_arch: audit::AUDIT_ARCH_ARM,
    endian: Endian::Little,
    syscalls: ARM_SYSCALLS,
    syscall_nr_limit: None,
    multiplex: None,
};

static RISCV64: ArchitectureProfile = ArchitectureProfile {
    name: "riscv64",
    audit_arch: audit::AUDIT_ARCH_RISCV64,
    endian: Endian::Little,
    syscalls: GENERIC_SYSCALLS,
    syscall_nr_limit: None,
    multiplex: None,
};

static S390X: ArchitectureProfile = ArchitectureProfile {
    name: "s390x",
    audit_arch: audit::AUDIT_ARCH_S390X,
    endian: Endian::Big,
    syscalls: S390X_SYSCALLS,
    syscall_nr_limit: None,
    multiplex: Some(SOCKETCALL),
};

static PPC64LE: ArchitectureProfile = ArchitectureProfile {
    name: "ppc64le",
    audit_arch: audit::AUDIT_ARCH_PPC64LE,
    endian: Endian::Little,
    syscalls: PPC64_SYSCALLS,
    syscall_nr_limit: None,
    multiplex: Some(SOCKETCALL),
};
