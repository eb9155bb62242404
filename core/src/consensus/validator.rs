// concord/core/src/consensus/validator.rs

use crate::block::Block;
use crate::error::ChainIntegrityError;

/// Checks that `new_block` is a valid successor of `prev_block`.
pub fn validate_block(new_block: &Block, prev_block: &Block) -> Result<(), ChainIntegrityError> {
    // Rule 1: sequential index.
    let expected = prev_block.index + 1;
    if new_block.index != expected {
        return Err(ChainIntegrityError::IndexMismatch {
            expected,
            found: new_block.index,
        });
    }

    // Rule 2: link to the previous block.
    if new_block.previous_hash != prev_block.hash {
        return Err(ChainIntegrityError::PreviousHashMismatch {
            index: new_block.index,
            expected: prev_block.hash.clone(),
            found: new_block.previous_hash.clone(),
        });
    }

    // Rule 3: the stored hash must be the hash of the contents.
    let computed = new_block.calculate_hash();
    if new_block.hash != computed {
        return Err(ChainIntegrityError::HashMismatch {
            index: new_block.index,
            stored: new_block.hash.clone(),
            computed,
        });
    }

    Ok(())
}
