use clap::Parser;
use std::path::PathBuf;

use crate::arch::Arch;
use crate::filter::program::MAX_ERRNO;
use crate::runner::GeneratorConfig;

#[derive(Parser, Debug)]
#[command(name = "seccomp-unix-block")]
#[command(version, about = "Generate a seccomp filter that blocks Unix domain socket creation", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Filter for the host architecture
    seccomp-unix-block /tmp/unix-block.bpf

    # Filter for another architecture, failing with EACCES
    seccomp-unix-block --arch x86 --errno 13 unix-block-i386.bpf

    # Inspect the rules that were compiled
    seccomp-unix-block --dump-policy /tmp/unix-block.bpf
")]
pub struct Cli {
    /// File to write the compiled BPF program to
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Target architecture (defaults to the host)
    #[arg(short, long, value_enum, value_name = "ARCH")]
    pub arch: Option<Arch>,

    /// Errno returned by denied socket calls
    #[arg(
        short,
        long,
        value_name = "ERRNO",
        default_value_t = libc::EPERM as u16,
        value_parser = clap::value_parser!(u16).range(1..=i64::from(MAX_ERRNO))
    )]
    pub errno: u16,

    /// Print the policy as JSON on stdout
    #[arg(long)]
    pub dump_policy: bool,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl From<Cli> for GeneratorConfig {
    fn from(cli: Cli) -> Self {
        GeneratorConfig {
            output: cli.output,
            arch: cli.arch,
            errno: cli.errno,
            dump_policy: cli.dump_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn parses_single_output() {
        let cli = Cli::try_parse_from(["seccomp-unix-block", "out.bpf"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("out.bpf"));
        assert_eq!(cli.errno, libc::EPERM as u16);
        assert!(cli.arch.is_none());
    }

    #[test]
    fn rejects_missing_and_extra_arguments() {
        let missing = Cli::try_parse_from(["seccomp-unix-block"]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::MissingRequiredArgument);

        let extra = Cli::try_parse_from(["seccomp-unix-block", "a.bpf", "b.bpf"]).unwrap_err();
        assert_eq!(extra.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn parses_arch_and_errno() {
        let cli = Cli::try_parse_from(["seccomp-unix-block", "--arch", "i386", "--errno", "13", "x.bpf"]).unwrap();
        assert_eq!(cli.arch, Some(Arch::X86));
        assert_eq!(cli.errno, 13);

        let config = GeneratorConfig::from(cli);
        assert_eq!(config.output, PathBuf::from("x.bpf"));
    }

    #[test]
    fn rejects_errno_out_of_range() {
        assert!(Cli::try_parse_from(["seccomp-unix-block", "--errno", "0", "x.bpf"]).is_err());
        assert!(Cli::try_parse_from(["seccomp-unix-block", "--errno", "4096", "x.bpf"]).is_err());
    }
}
