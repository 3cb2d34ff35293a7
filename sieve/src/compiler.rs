//! Compiles a parsed command tree into the byte form the cache maps
//! from disk (§4.2: "the compiler's tree-to-byte transform is treated as
//! a black box here"). Deliberately thin: the evaluation contract, not
//! instruction dispatch performance, is what callers depend on, so this
//! is a direct structural encode rather than a flattened jump-table VM.

use crate::ast::Block;
use crate::bytecode::{decode_program, encode_program, DecodeError};

/// Compiles a command tree to its on-disk bytecode representation.
#[must_use]
pub fn compile(block: &Block) -> Vec<u8> {
    encode_program(block)
}

/// Recovers the command tree a bytecode blob was compiled from.
///
/// # Errors
/// Returns [`DecodeError`] if `bytes` is truncated, malformed, or was
/// stamped with a different [`crate::bytecode::BYTECODE_VERSION`].
pub fn decompile(bytes: &[u8]) -> Result<Block, DecodeError> {
    decode_program(bytes)
}
