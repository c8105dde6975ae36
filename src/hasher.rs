use hmac::{Hmac, Mac};
use primitive_types::H256;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const HMAC_KEY_ERR_MSG: &str =
    "A failure should not be possible here because HMAC-SHA256 accepts keys of any length";

/// Abstraction of the hash function used for all node hashes.
///
/// The hash function is SHA-256. The wrapper exists so that the hashing done
/// by the key derivation & tree code lives behind one type, making the hash
/// function easy to swap.
///
/// No delimiters are inserted between updates; every hashed message is a
/// plain concatenation of fixed-width fields, so the byte layout is
/// unambiguous without them.
///
/// Example:
/// ```
/// use polmst::Hasher;
/// let mut hasher = Hasher::new();
/// hasher.update("leaf".as_bytes());
/// let hash = hasher.finalize();
/// ```
pub struct Hasher(Sha256);

impl Hasher {
    pub fn new() -> Self {
        Hasher(Sha256::new())
    }

    pub fn update(&mut self, input: &[u8]) -> &mut Self {
        self.0.update(input);
        self
    }

    pub fn finalize(&self) -> H256 {
        let bytes: [u8; 32] = self.0.clone().finalize().into();
        H256(bytes)
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Hasher(Sha256::default())
    }
}

/// HMAC-SHA256 of `msg` under `key`.
///
/// Used for leaf hashes, where the key is the per-(account, attestation)
/// attestation key. The MAC binds a leaf to an account without revealing
/// which account that is.
pub fn hmac_sha256(key: &[u8; 32], msg: &[u8]) -> H256 {
    let mut mac = HmacSha256::new_from_slice(key).expect(HMAC_KEY_ERR_MSG);
    mac.update(msg);
    let bytes: [u8; 32] = mac.finalize().into_bytes().into();
    H256(bytes)
}

// -------------------------------------------------------------------------------------------------
// Unit tests.
