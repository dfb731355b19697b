//! Filter construction for a single architecture

use super::program::{Action, ArgConstraint, FilterProgram, Rule, MAX_ERRNO, MAX_SYSCALL_ARGS};
use crate::arch::{Arch, ArchitectureProfile};
use crate::bpf::{self, CompiledProgram};
use crate::errors::{FilterError, Result};
use log::{debug, warn};

/// Accumulates deny rules for one [`ArchitectureProfile`].
///
/// The builder owns the [`FilterProgram`] until [`FilterBuilder::finalize`]
/// consumes it. It is not `Clone`, so a program is compiled at most
/// once and no rule can be added after compilation.
#[derive(Debug)]
pub struct FilterBuilder<'a> {
    profile: &'a ArchitectureProfile,
    program: FilterProgram,
}

impl FilterBuilder<'static> {
    /// Create an empty default-allow program for `arch`, or the host
    /// architecture when `arch` is `None`.
    pub fn initialize(arch: Option<Arch>) -> Result<Self> {
        Self::initialize_on(arch, ArchitectureProfile::native())
    }

    pub(crate) fn initialize_on(
        arch: Option<Arch>,
        native: Option<&'static ArchitectureProfile>,
    ) -> Result<Self> {
        let profile = ArchitectureProfile::select(arch, native)?;
        Ok(FilterBuilder::new(profile))
    }
}

impl<'a> FilterBuilder<'a> {
    pub fn new(profile: &'a ArchitectureProfile) -> Self {
        debug!("Initializing seccomp filter for {}", profile.name);
        Self {
            profile,
            program: FilterProgram::new(),
        }
    }

    pub fn profile(&self) -> &'a ArchitectureProfile {
        self.profile
    }

    pub fn program(&self) -> &FilterProgram {
        &self.program
    }

    /// Append `syscall(domain, ...) -> errno`.
    ///
    /// Calling this twice with the same arguments appends a redundant rule;
    /// the first one already decides, so the verdict does not change.
    pub fn deny_syscall_on_domain(&mut self, syscall: &str, domain: u32, errno: u16) -> Result<()> {
        self.add_rule(syscall, vec![ArgConstraint::dword_eq(0, domain)], errno_action(syscall, errno)?)
    }

    /// Resolve `syscall` on this architecture and append a rule for it
    pub fn add_rule(
        &mut self,
        syscall: &str,
        constraints: Vec<ArgConstraint>,
        action: Action,
    ) -> Result<()> {
        let nr = self.profile.syscall_number(syscall).ok_or_else(|| {
            FilterError::rule_add(
                syscall,
                format!("unknown syscall on {}", self.profile.name),
            )
        })?;

        if let Some(bad) = constraints.iter().find(|c| c.index >= MAX_SYSCALL_ARGS) {
            return Err(FilterError::rule_add(
                syscall,
                format!("argument index {} out of range", bad.index),
            ));
        }

        debug!(
            "Adding rule {}({}) -> {:?}",
            syscall,
            constraints
                .iter()
                .map(|c| format!("arg{} == {:#x}", c.index, c.value))
                .collect::<Vec<_>>()
                .join(", "),
            action
        );
        self.program.push(Rule::new(syscall, nr, constraints, action));
        Ok(())
    }

    /// Deny socket and socket-pair creation through the multiplexed socket
    /// syscall, keyed on the sub-operation code alone.
    ///
    /// The domain lives in an indirect argument vector that BPF cannot read,
    /// so every socket created through the multiplexer is denied, whatever its
    /// domain. Failures are logged and tolerated. Returns the number of rules
    /// added.
    pub fn apply_legacy_multiplex_rules(&mut self, errno: u16) -> usize {
        let Some(mux) = self.profile.multiplex else {
            debug!("No multiplexed socket syscall on {}", self.profile.name);
            return 0;
        };

        let mut added = 0;
        for (label, subcall) in [
            ("SYS_SOCKET", mux.create_socket),
            ("SYS_SOCKETPAIR", mux.create_socketpair),
        ] {
            let result = errno_action(mux.syscall, errno).and_then(|action| {
                self.add_rule(mux.syscall, vec![ArgConstraint::dword_eq(0, subcall)], action)
            });
            match result {
                Ok(()) => added += 1,
                Err(e) => {
                    let warning = FilterError::MultiplexRule(format!("{}({}): {}", mux.syscall, label, e));
                    warn!("{}", warning);
                }
            }
        }
        added
    }

    /// Deny `socket` and `socketpair` on `AF_UNIX`, then add the multiplex
    /// rules.
    ///
    /// The direct rules are mandatory; the multiplex rules are best effort.
    pub fn deny_unix_sockets(&mut self, errno: u16) -> Result<()> {
        let af_unix = libc::AF_UNIX as u32;

        self.deny_syscall_on_domain("socket", af_unix, errno)?;
        self.deny_syscall_on_domain("socketpair", af_unix, errno)?;
        self.apply_legacy_multiplex_rules(errno);
        Ok(())
    }

    /// Compile the accumulated rules
    pub fn finalize(self) -> Result<CompiledProgram> {
        debug!(
            "Compiling {} rule(s) for {}",
            self.program.rules().len(),
            self.profile.name
        );
        bpf::compile(&self.program, self.profile)
    }
}

fn errno_action(syscall: &str, errno: u16) -> Result<Action> {
    if errno == 0 || errno > MAX_ERRNO {
        return Err(FilterError::rule_add(
            syscall,
            format!("errno {} outside 1..={}", errno, MAX_ERRNO),
        ));
    }
    Ok(Action::Errno(errno))
}

/// Build the Unix-socket blocking policy for `profile`
pub fn unix_socket_policy(profile: &ArchitectureProfile, errno: u16) -> Result<FilterBuilder<'_>> {
    let mut builder = FilterBuilder::new(profile);
    builder.deny_unix_sockets(errno)?;
    Ok(builder)
}
