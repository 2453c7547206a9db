use crate::error::DepotError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// The only digest algorithm the store produces. Foreign algorithms are
/// rejected at parse time so the CAS layout stays uniform.
pub const ALGORITHM: &str = "sha256";

const HEX_LEN: usize = 64;

/// Content digest in `sha256:<64 lowercase hex>` form, used as the blob
/// store's primary key. Identical bytes always map to the same hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Digests `bytes` into a content hash.
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{ALGORITHM}:{}", hex::encode(Sha256::digest(bytes))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn algorithm(&self) -> &str {
        ALGORITHM
    }

    /// The hex payload without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.0[ALGORITHM.len() + 1..]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DepotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s
            .strip_prefix(ALGORITHM)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| DepotError::NameInvalid(format!("digest `{s}`")))?;
        if hex_part.len() != HEX_LEN
            || !hex_part.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        {
            return Err(DepotError::NameInvalid(format!("digest `{s}`")));
        }
        Ok(Self(s.to_string()))
    }
}
