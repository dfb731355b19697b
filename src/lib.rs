//! seccomp-unix-block: seccomp filter that denies Unix domain sockets
//!
//! Builds a default-allow seccomp-bpf program that fails `socket(AF_UNIX, ..)`
//! and `socketpair(AF_UNIX, ..)` with an errno, and writes it as a raw
//! `sock_filter` array for a sandbox launcher to attach before exec.
//!
//! # Modules
//!
//! - **arch**: Architecture profiles and syscall numbers
//! - **filter**: Policy data and the filter builder
//! - **bpf**: BPF compilation and a userspace interpreter
//! - **export**: Writing the compiled filter
//! - **runner**: The end-to-end generator pipeline
//!
//! # Known limitation
//!
//! Where socket calls can also go through the legacy `socketcall(2)`
//! multiplexer (x86, s390x, ppc64le), the domain is passed behind a pointer
//! that seccomp cannot dereference. Those targets get rules denying the
//! `SYS_SOCKET` and `SYS_SOCKETPAIR` sub-operations outright, which blocks
//! every socket created through the multiplexer, not just Unix domain ones.
//!
//! # Example
//!
//! ```ignore
//! use seccomp_unix_block::{arch::Arch, export::export, filter::unix_socket_policy};
//!
//! let compiled = unix_socket_policy(Arch::X86_64.profile(), libc::EPERM as u16)?.finalize()?;
//! export(&compiled, std::path::Path::new("/tmp/unix-block.bpf"))?;
//! ```

pub mod arch;
pub mod bpf;
pub mod cli;
pub mod errors;
pub mod export;
pub mod filter;
pub mod logging;
pub mod runner;

pub use arch::{Arch, ArchitectureProfile};
pub use bpf::CompiledProgram;
pub use errors::{FilterError, Result};
pub use filter::{Action, FilterBuilder, FilterProgram, Rule};
