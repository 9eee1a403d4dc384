use std::fmt;
use std::str::FromStr;

use crate::HashError;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Hash function an object id was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Raw digest length in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// The all-zero id for this algorithm.
    pub const fn null_oid(self) -> ObjectId {
        match self {
            Self::Sha1 => ObjectId::Sha1([0; 20]),
            Self::Sha256 => ObjectId::Sha256([0; 32]),
        }
    }
}

/// Identifier of a git object: the digest of its canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl ObjectId {
    pub const NULL_SHA1: Self = Self::Sha1([0; 20]);

    /// Build an id from raw digest bytes.
    pub fn from_bytes(bytes: &[u8], algo: HashAlgorithm) -> Result<Self, HashError> {
        if bytes.len() != algo.digest_len() {
            return Err(HashError::InvalidHashLength {
                expected: algo.digest_len(),
                actual: bytes.len(),
            });
        }
        Ok(match algo {
            HashAlgorithm::Sha1 => {
                let mut arr = [0u8; 20];
                arr.copy_from_slice(bytes);
                Self::Sha1(arr)
            }
            HashAlgorithm::Sha256 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(bytes);
                Self::Sha256(arr)
            }
        })
    }

    /// Parse a full-length hex id; the algorithm follows from the length.
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let algo = match hex.len() {
            40 => HashAlgorithm::Sha1,
            64 => HashAlgorithm::Sha256,
            n => return Err(HashError::InvalidHexLength(n)),
        };
        let mut buf = [0u8; 32];
        let out = &mut buf[..algo.digest_len()];
        for (i, pair) in hex.as_bytes().chunks(2).enumerate() {
            let hi = nibble(pair[0]).ok_or(HashError::InvalidHex {
                position: i * 2,
                character: pair[0] as char,
            })?;
            let lo = nibble(pair[1]).ok_or(HashError::InvalidHex {
                position: i * 2 + 1,
                character: pair[1] as char,
            })?;
            out[i] = (hi << 4) | lo;
        }
        Self::from_bytes(out, algo)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(b) => b,
            Self::Sha256(b) => b,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Sha1(_) => HashAlgorithm::Sha1,
            Self::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    pub fn is_null(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(self.as_bytes().len() * 2);
        for &b in self.as_bytes() {
            s.push(HEX_DIGITS[(b >> 4) as usize] as char);
            s.push(HEX_DIGITS[(b & 0x0f) as usize] as char);
        }
        s
    }

    /// Relative path of the loose object file: `"xx/xxxx..."`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn hex_roundtrip() {
        let oid = ObjectId::from_hex(EMPTY_SHA1).unwrap();
        assert_eq!(oid.algorithm(), HashAlgorithm::Sha1);
        assert_eq!(oid.to_string(), EMPTY_SHA1);
        assert_eq!(EMPTY_SHA1.parse::<ObjectId>().unwrap(), oid);
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let oid = ObjectId::from_hex(&EMPTY_SHA1.to_uppercase()).unwrap();
        assert_eq!(oid.to_hex(), EMPTY_SHA1);
    }

    #[test]
    fn rejects_bad_length_and_digits() {
        assert!(matches!(
            ObjectId::from_hex("abc"),
            Err(HashError::InvalidHexLength(3))
        ));
        let bad = format!("z{}", &EMPTY_SHA1[1..]);
        assert!(matches!(
            ObjectId::from_hex(&bad),
            Err(HashError::InvalidHex { position: 0, .. })
        ));
    }

    #[test]
    fn debug_is_abbreviated() {
        let oid = ObjectId::from_hex(EMPTY_SHA1).unwrap();
        assert_eq!(format!("{oid:?}"), "ObjectId(da39a3ee)");
    }

    #[test]
    fn loose_path_splits_fanout() {
        let oid = ObjectId::from_hex(EMPTY_SHA1).unwrap();
        assert_eq!(oid.loose_path(), "da/39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn null_oid() {
        assert!(ObjectId::NULL_SHA1.is_null());
        assert_eq!(HashAlgorithm::Sha256.null_oid().as_bytes().len(), 32);
    }
}
