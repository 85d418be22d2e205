use crate::error::{ProbsimError, Result};

/// Decode an `F32_BLOB` column value into an embedding vector.
///
/// libsql stores vector columns as packed little-endian f32s.
pub(crate) fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(ProbsimError::Invariant(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }

    let mut out = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}
