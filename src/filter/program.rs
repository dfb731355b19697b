//! Policy data: what the filter decides, independent of how it is encoded

use serde::Serialize;

/// Number of syscall arguments available in `seccomp_data`
pub const MAX_SYSCALL_ARGS: u8 = 6;

/// Largest errno the kernel accepts from `SECCOMP_RET_ERRNO`
pub const MAX_ERRNO: u16 = 4095;

/// What happens to a syscall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "errno")]
pub enum Action {
    /// Let the syscall through
    Allow,
    /// Fail the syscall with the given errno without executing it
    Errno(u16),
    /// Kill the whole process (used for foreign-architecture calls)
    KillProcess,
}

/// Width of the argument comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgLen {
    /// Low 32 bits only, for `int` arguments the kernel truncates
    Dword,
    /// Full 64-bit value
    Qword,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CmpOp {
    Eq,
}

/// One `(argument_index, comparator, value)` condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArgConstraint {
    pub index: u8,
    pub len: ArgLen,
    pub op: CmpOp,
    pub value: u64,
}

impl ArgConstraint {
    /// `argument[index] == value`, comparing the low 32 bits
    pub fn dword_eq(index: u8, value: u32) -> Self {
        Self {
            index,
            len: ArgLen::Dword,
            op: CmpOp::Eq,
            value: u64::from(value),
        }
    }

    pub fn qword_eq(index: u8, value: u64) -> Self {
        Self {
            index,
            len: ArgLen::Qword,
            op: CmpOp::Eq,
            value,
        }
    }

    pub fn matches(&self, args: &[u64; MAX_SYSCALL_ARGS as usize]) -> bool {
        let arg = args[self.index as usize];
        match (self.op, self.len) {
            (CmpOp::Eq, ArgLen::Dword) => (arg as u32) == (self.value as u32),
            (CmpOp::Eq, ArgLen::Qword) => arg == self.value,
        }
    }
}

/// One filter clause: all constraints must hold for `action` to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub syscall: String,
    pub nr: u32,
    pub constraints: Vec<ArgConstraint>,
    pub action: Action,
}

impl Rule {
    pub fn new(syscall: &str, nr: u32, constraints: Vec<ArgConstraint>, action: Action) -> Self {
        Self {
            syscall: syscall.to_string(),
            nr,
            constraints,
            action,
        }
    }
}

/// Default action plus an ordered rule list
///
/// The default action is always [`Action::Allow`]; only rules can deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterProgram {
    default_action: Action,
    rules: Vec<Rule>,
}

impl Default for FilterProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterProgram {
    pub fn new() -> Self {
        Self {
            default_action: Action::Allow,
            rules: Vec::new(),
        }
    }

    pub fn default_action(&self) -> Action {
        self.default_action
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Distinct syscall numbers in order of their first rule
    pub fn syscalls(&self) -> Vec<u32> {
        let mut seen = Vec::new();
        for rule in &self.rules {
            if !seen.contains(&rule.nr) {
                seen.push(rule.nr);
            }
        }
        seen
    }

    /// Rules for `nr`, in insertion order
    pub fn rules_for(&self, nr: u32) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |rule| rule.nr == nr)
    }

    /// Reference semantics: first matching rule wins, otherwise the default
    pub fn evaluate(&self, nr: u32, args: &[u64; MAX_SYSCALL_ARGS as usize]) -> Action {
        self.rules_for(nr)
            .find(|rule| rule.constraints.iter().all(|c| c.matches(args)))
            .map(|rule| rule.action)
            .unwrap_or(self.default_action)
    }
}
