use crate::domain::HashKind;
use crate::error::{ProbeError, Result};

/// Canonical lowercase hex form of `digest`, checked against the size of `kind`.
pub fn normalize_digest(kind: HashKind, digest: &str) -> Result<String> {
    let bytes = hex::decode(digest.trim()).map_err(|e| ProbeError::InvalidDigest {
        kind,
        reason: format!("invalid hex: {e}"),
    })?;
    if bytes.len() != kind.digest_len() {
        return Err(ProbeError::InvalidDigest {
            kind,
            reason: format!(
                "expected {} bytes ({} hex chars), got {}",
                kind.digest_len(),
                kind.digest_len() * 2,
                bytes.len()
            ),
        });
    }
    Ok(hex::encode(bytes))
}
