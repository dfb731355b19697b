//! Writing a compiled filter for the sandbox launcher

use crate::bpf::CompiledProgram;
use crate::errors::{FilterError, Result};
use log::debug;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Permission bits for newly created filter files
pub const OUTPUT_MODE: u32 = 0o600;

/// Write `program` to `path` as a raw `sock_filter` array.
///
/// The file is created owner read/write only, or truncated if it exists. A
/// failed write may leave a partial file behind; the next successful run
/// truncates it.
pub fn export(program: &CompiledProgram, path: &Path) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OUTPUT_MODE)
        .open(path)
        .map_err(|source| FilterError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let bytes = program.to_bytes();
    file.write_all(&bytes)
        .and_then(|()| file.flush())
        .map_err(|source| FilterError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
