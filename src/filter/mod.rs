//! Filter layer: policy data and its construction
//!
//! A [`FilterProgram`] is plain data (default action + ordered rules) so the
//! policy can be inspected and tested without touching the kernel. The
//! [`FilterBuilder`] fills it in for one architecture and hands it to the BPF
//! compiler exactly once.
//!
//! # Examples
//!
//! ```ignore
//! use seccomp_unix_block::filter::unix_socket_policy;
//! use seccomp_unix_block::arch::Arch;
//!
//! let builder = unix_socket_policy(Arch::X86.profile(), libc::EPERM as u16)?;
//! let compiled = builder.finalize()?;
//! ```

pub mod builder;
pub mod program;

pub use builder::{unix_socket_policy, FilterBuilder};
pub use program::{Action, ArgConstraint, ArgLen, CmpOp, FilterProgram, Rule};
