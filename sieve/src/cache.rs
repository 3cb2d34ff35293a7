//! Bytecode cache (§4.2, C3): memory-maps compiled script files and
//! deduplicates them by inode, exactly like a host resolving the same
//! `include` target through two different paths.
//!
//! `memmap2` is the one dependency this workspace carries that the
//! teacher crate itself does not — `mmap`-backed, inode-deduplicated
//! blob storage has no idiomatic equivalent among the teacher's own
//! dependencies, and `memmap2` is the crate the wider ecosystem reaches
//! for here (see DESIGN.md).

use std::fs::File;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use sieve_types::status::StatusCode;

use crate::error::{EngineError, Result};

/// One memory-mapped bytecode blob, keyed by the inode it was loaded
/// from.
struct Blob {
    inode: u64,
    path: PathBuf,
    mmap: Mmap,
}

/// Execute handle: an ordered, inode-deduplicated list of mapped
/// bytecode blobs plus a `current` cursor (§3: "CompiledScript... owns
/// its mappings and file descriptors").
#[derive(Default)]
pub struct CompiledScript {
    blobs: Vec<Blob>,
    current: Option<usize>,
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("blobs", &self.blobs.len())
            .field("current", &self.current)
            .finish()
    }
}

impl CompiledScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of the currently selected blob, if any has been loaded.
    #[must_use]
    pub fn current_bytes(&self) -> Option<&[u8]> {
        self.current.map(|i| &self.blobs[i].mmap[..])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    fn find_by_inode(&self, inode: u64) -> Option<usize> {
        self.blobs.iter().position(|b| b.inode == inode)
    }

    /// Bytes of a specific already-mapped blob, keyed by inode, without
    /// disturbing `current`. `eval::execute` uses this to resolve
    /// `include` targets: every blob an evaluation might need is
    /// expected to have been warmed into `handle` ahead of time via
    /// repeated [`load`] calls, keeping evaluation itself read-only
    /// (§5: "no locking is needed for concurrent reads").
    #[must_use]
    pub fn bytes_for_inode(&self, inode: u64) -> Option<&[u8]> {
        self.find_by_inode(inode).map(|i| &self.blobs[i].mmap[..])
    }
}

/// Maps `path` into `handle`, deduplicating by inode.
///
/// Returns `Ok(StatusCode::ScriptReloaded)` without growing the blob
/// list when `path` (or a hardlink/bind-mount alias sharing the same
/// inode) is already mapped — the cache invariant this is grounded on
/// is "reloading the same compiled script is a no-op that still reports
/// success distinctly from a first load" (§4.2).
///
/// # Errors
/// Returns [`EngineError::Io`] if `path` cannot be opened, stat'd, or
/// mapped.
pub fn load(path: &Path, handle: &mut CompiledScript) -> Result<StatusCode> {
    let file = File::open(path)?;
    let meta = file.metadata()?;
    let inode = meta.ino();

    if let Some(index) = handle.find_by_inode(inode) {
        log::debug!("bytecode cache hit for inode {inode} ({})", path.display());
        handle.current = Some(index);
        return Ok(StatusCode::ScriptReloaded);
    }

    // SAFETY: the mapped file is expected to be a bytecode blob this
    // process (or a cooperating one) wrote via `compiler::compile`; the
    // cache never mutates it, matching memmap2's documented requirement
    // that the backing file not be concurrently truncated.
    let mmap = unsafe { Mmap::map(&file)? };
    handle.blobs.push(Blob {
        inode,
        path: path.to_path_buf(),
        mmap,
    });
    handle.current = Some(handle.blobs.len() - 1);
    log::debug!("mapped bytecode blob {} (inode {inode})", path.display());
    Ok(StatusCode::Ok)
}

/// Drops every mapping owned by `handle`.
///
/// # Errors
/// Never fails in this implementation; returns `Result` to match the
/// public operation's documented signature (§6), since a future host
/// may want to flush pending writes before dropping the handle.
pub fn unload(handle: Option<CompiledScript>) -> Result<()> {
    if let Some(h) = handle {
        log::debug!("unloaded {} bytecode blob(s)", h.blobs.len());
    }
    Ok(())
}
