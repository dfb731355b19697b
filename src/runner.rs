//! The generator pipeline: construct, compile, verify, persist

use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;

use crate::arch::{Arch, ArchitectureProfile, Endian, SocketMultiplex};
use crate::bpf::interp::{self, SeccompData};
use crate::bpf::CompiledProgram;
use crate::errors::{FilterError, Result};
use crate::export::export;
use crate::filter::{Action, FilterBuilder, FilterProgram};

/// Configuration for one generator run
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub output: PathBuf,
    pub arch: Option<Arch>,
    pub errno: u16,
    pub dump_policy: bool,
}

/// What `--dump-policy` prints
#[derive(Serialize)]
struct PolicyDump<'a> {
    arch: &'a str,
    audit_arch: u32,
    endian: Endian,
    multiplex: Option<SocketMultiplex>,
    policy: &'a FilterProgram,
}

pub fn run(config: GeneratorConfig) -> Result<CompiledProgram> {
    let mut builder = FilterBuilder::initialize(config.arch)?;
    let profile = builder.profile();
    debug!(
        "Target {} (audit arch {:#010x}), errno {}",
        profile.name, profile.audit_arch, config.errno
    );

    builder.deny_unix_sockets(config.errno)?;

    let dump = if config.dump_policy {
        Some(render_policy(&PolicyDump {
            arch: profile.name,
            audit_arch: profile.audit_arch,
            endian: profile.endian,
            multiplex: profile.multiplex,
            policy: builder.program(),
        })?)
    } else {
        None
    };

    let compiled = builder.finalize()?;
    verify_unix_socket_filter(&compiled, profile, config.errno)?;
    export(&compiled, &config.output)?;

    if let Some(json) = dump {
        println!("{}", json);
    }

    info!(
        "Wrote {} instructions for {} to {}",
        compiled.len(),
        profile.name,
        config.output.display()
    );
    Ok(compiled)
}

fn render_policy<T: Serialize>(dump: &T) -> Result<String> {
    serde_json::to_string_pretty(dump).map_err(FilterError::PolicyDump)
}

/// Check the compiled program against the guarantees it must provide.
///
/// Unix domain socket creation must be denied with `errno`; IPv4, IPv6 and
/// unrelated syscalls must pass.
pub fn verify_unix_socket_filter(
    compiled: &CompiledProgram,
    profile: &ArchitectureProfile,
    errno: u16,
) -> Result<()> {
    let af_unix = libc::AF_UNIX as u64;
    let expectations = [
        ("socket", af_unix, Action::Errno(errno)),
        ("socketpair", af_unix, Action::Errno(errno)),
        ("socket", libc::AF_INET as u64, Action::Allow),
        ("socket", libc::AF_INET6 as u64, Action::Allow),
        ("read", 0, Action::Allow),
    ];

    for (syscall, domain, expected) in expectations {
        let data = SeccompData::for_syscall(profile, syscall, [domain, 0, 0, 0, 0, 0]).ok_or_else(|| {
            FilterError::Compile(format!("cannot verify {}: unknown on {}", syscall, profile.name))
        })?;
        let actual = interp::evaluate(compiled, &data)
            .map_err(|e| FilterError::Compile(format!("verifying {}: {}", syscall, e)))?;
        if actual != expected {
            return Err(FilterError::Compile(format!(
                "{}({}) evaluates to {:?}, expected {:?}",
                syscall, domain, actual, expected
            )));
        }
    }

    debug!("Verified compiled filter for {}", profile.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::unix_socket_policy;
    use tempfile::TempDir;

    fn config(dir: &TempDir, arch: Arch) -> GeneratorConfig {
        GeneratorConfig {
            output: dir.path().join("filter.bpf"),
            arch: Some(arch),
            errno: libc::EPERM as u16,
            dump_policy: false,
        }
    }

    #[test]
    fn run_writes_filter_for_each_arch() {
        for arch in Arch::all() {
            let dir = TempDir::new().unwrap();
            let cfg = config(&dir, arch);
            let compiled = run(cfg.clone()).unwrap();
            assert_eq!(std::fs::read(&cfg.output).unwrap(), compiled.to_bytes());
        }
    }

    #[test]
    fn verification_rejects_empty_policy() {
        let profile = Arch::X86_64.profile();
        let compiled = FilterBuilder::new(profile).finalize().unwrap();
        let err = verify_unix_socket_filter(&compiled, profile, 1).unwrap_err();
        assert!(err.to_string().contains("socket"));
    }

    #[test]
    fn verification_rejects_wrong_errno() {
        let profile = Arch::Aarch64.profile();
        let compiled = unix_socket_policy(profile, 13).unwrap().finalize().unwrap();
        assert!(verify_unix_socket_filter(&compiled, profile, 1).is_err());
        assert!(verify_unix_socket_filter(&compiled, profile, 13).is_ok());
    }

    #[test]
    fn run_without_arch_targets_host() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir, Arch::X86_64);
        cfg.arch = None;
        match ArchitectureProfile::native() {
            Some(native) => {
                let compiled = run(cfg).unwrap();
                let expected = unix_socket_policy(native, libc::EPERM as u16)
                    .unwrap()
                    .finalize()
                    .unwrap();
                assert_eq!(compiled, expected);
            }
            None => assert!(matches!(run(cfg), Err(FilterError::Initialization(_)))),
        }
    }

    #[test]
    fn policy_render_failure_is_an_error() {
        struct Unrenderable;
        impl Serialize for Unrenderable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("cannot render"))
            }
        }

        let err = render_policy(&Unrenderable).unwrap_err();
        assert!(matches!(err, FilterError::PolicyDump(_)));
        assert!(err.to_string().contains("cannot render"));
    }

    #[test]
    fn run_reports_open_failure() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir, Arch::X86_64);
        cfg.output = dir.path().join("missing/filter.bpf");
        assert!(matches!(run(cfg), Err(FilterError::Open { .. })));
    }
}
