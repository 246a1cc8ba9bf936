//! XRPL key handling: family seeds, account derivation and transaction signing.
//!
//! Supports both key families the ledger accepts:
//! - secp256k1 seeds (`s...`), derived through the root/intermediate scheme
//! - ed25519 seeds (`sEd...`)

use ed25519_dalek::Signer as _;
use k256::{
    ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey},
    elliptic_curve::sec1::ToEncodedPoint,
    SecretKey,
};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use crate::error::LedgerError;

const FAMILY_SEED_PREFIX: u8 = 0x21;
const ED25519_SEED_PREFIX: [u8; 3] = [0x01, 0xE1, 0x4B];
const ACCOUNT_ID_PREFIX: u8 = 0x00;
const ED25519_KEY_PREFIX: u8 = 0xED;

/// Key family of a seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Secp256k1,
    Ed25519,
}

/// 16 bytes of seed entropy plus the key family it was encoded for
#[derive(Clone)]
pub struct Seed {
    entropy: [u8; 16],
    algorithm: KeyAlgorithm,
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seed")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Seed {
    pub fn from_base58(encoded: &str) -> Result<Self, LedgerError> {
        let payload = base58check_decode(encoded.trim())
            .map_err(|e| LedgerError::InvalidCredential(format!("seed is not valid base58check: {}", e)))?;

        let (algorithm, entropy) = if payload.len() == 17 && payload[0] == FAMILY_SEED_PREFIX {
            (KeyAlgorithm::Secp256k1, &payload[1..])
        } else if payload.len() == 19 && payload[..3] == ED25519_SEED_PREFIX {
            (KeyAlgorithm::Ed25519, &payload[3..])
        } else {
            return Err(LedgerError::InvalidCredential(
                "unrecognised seed prefix".to_string(),
            ));
        };

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(entropy);
        Ok(Self {
            entropy: bytes,
            algorithm,
        })
    }

    pub fn from_entropy(entropy: [u8; 16], algorithm: KeyAlgorithm) -> Self {
        Self { entropy, algorithm }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn to_base58(&self) -> String {
        let mut payload = match self.algorithm {
            KeyAlgorithm::Secp256k1 => vec![FAMILY_SEED_PREFIX],
            KeyAlgorithm::Ed25519 => ED25519_SEED_PREFIX.to_vec(),
        };
        payload.extend_from_slice(&self.entropy);
        base58check_encode(&payload)
    }
}

/// Signing keypair for one XRPL account
pub enum Keypair {
    Secp256k1 {
        signing_key: SigningKey,
        public_key: [u8; 33],
    },
    Ed25519 {
        signing_key: ed25519_dalek::SigningKey,
        public_key: [u8; 33],
    },
}

impl Keypair {
    pub fn from_seed(seed: &Seed) -> Result<Self, LedgerError> {
        match seed.algorithm {
            KeyAlgorithm::Secp256k1 => {
                let secret = derive_secp256k1_account_key(&seed.entropy)?;
                let encoded = secret.public_key().to_encoded_point(true);
                let mut public_key = [0u8; 33];
                public_key.copy_from_slice(encoded.as_bytes());
                Ok(Keypair::Secp256k1 {
                    signing_key: SigningKey::from(secret),
                    public_key,
                })
            }
            KeyAlgorithm::Ed25519 => {
                let digest = Sha512::digest(seed.entropy);
                let mut secret = [0u8; 32];
                secret.copy_from_slice(&digest[..32]);
                let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);

                let mut public_key = [0u8; 33];
                public_key[0] = ED25519_KEY_PREFIX;
                public_key[1..].copy_from_slice(&signing_key.verifying_key().to_bytes());
                Ok(Keypair::Ed25519 {
                    signing_key,
                    public_key,
                })
            }
        }
    }

    pub fn from_seed_str(encoded: &str) -> Result<Self, LedgerError> {
        Self::from_seed(&Seed::from_base58(encoded)?)
    }

    pub fn public_key(&self) -> &[u8; 33] {
        match self {
            Keypair::Secp256k1 { public_key, .. } | Keypair::Ed25519 { public_key, .. } => {
                public_key
            }
        }
    }

    pub fn account_id(&self) -> [u8; 20] {
        account_id_from_public_key(self.public_key())
    }

    /// Classic `r...` address of the account
    pub fn classic_address(&self) -> String {
        encode_classic_address(&self.account_id())
    }

    /// Sign a transaction signing payload (`STX\0` prefix already applied).
    ///
    /// secp256k1 signs SHA-512Half of the payload and returns a low-S DER
    /// signature; ed25519 signs the payload itself.
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, LedgerError> {
        match self {
            Keypair::Secp256k1 { signing_key, .. } => {
                let digest = sha512_half(payload);
                let signature: Signature = signing_key
                    .sign_prehash(&digest)
                    .map_err(|e| LedgerError::InvalidCredential(format!("signing failed: {}", e)))?;
                let signature = signature.normalize_s().unwrap_or(signature);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            Keypair::Ed25519 { signing_key, .. } => {
                Ok(signing_key.sign(payload).to_bytes().to_vec())
            }
        }
    }
}

/// Derive the classic address for a seed without keeping the keypair around
pub fn address_from_seed(encoded: &str) -> Result<String, LedgerError> {
    Ok(Keypair::from_seed_str(encoded)?.classic_address())
}

fn derive_secp256k1_account_key(entropy: &[u8; 16]) -> Result<SecretKey, LedgerError> {
    let root = derive_scalar(entropy, None)?;
    let root_public = root.public_key().to_encoded_point(true);
    // Account index 0 is the only one the ledger tooling ever uses
    let intermediate = derive_scalar(root_public.as_bytes(), Some(0))?;

    let account = *root.to_nonzero_scalar() + *intermediate.to_nonzero_scalar();
    SecretKey::from_bytes(&account.to_bytes())
        .map_err(|_| LedgerError::InvalidCredential("derived key is out of range".to_string()))
}

fn derive_scalar(bytes: &[u8], discriminator: Option<u32>) -> Result<SecretKey, LedgerError> {
    for sequence in 0..=u32::MAX {
        let mut hasher = Sha512::new();
        hasher.update(bytes);
        if let Some(discriminator) = discriminator {
            hasher.update(discriminator.to_be_bytes());
        }
        hasher.update(sequence.to_be_bytes());
        let digest = hasher.finalize();

        // Rejects zero and values >= the curve order
        if let Ok(key) = SecretKey::from_slice(&digest[..32]) {
            return Ok(key);
        }
    }

    Err(LedgerError::InvalidCredential(
        "no valid scalar for seed".to_string(),
    ))
}

pub fn account_id_from_public_key(public_key: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(public_key);
    let digest = Ripemd160::digest(sha);
    let mut id = [0u8; 20];
    id.copy_from_slice(&digest);
    id
}

pub fn encode_classic_address(account_id: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(ACCOUNT_ID_PREFIX);
    payload.extend_from_slice(account_id);
    base58check_encode(&payload)
}

pub fn decode_classic_address(address: &str) -> Result<[u8; 20], LedgerError> {
    let payload = base58check_decode(address)
        .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", address, e)))?;
    if payload.len() != 21 || payload[0] != ACCOUNT_ID_PREFIX {
        return Err(LedgerError::InvalidAddress(address.to_string()));
    }

    let mut id = [0u8; 20];
    id.copy_from_slice(&payload[1..]);
    Ok(id)
}

pub fn is_valid_classic_address(address: &str) -> bool {
    address.starts_with('r') && decode_classic_address(address).is_ok()
}

/// First half of SHA-512, the ledger's general purpose hash
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let digest = Sha512::digest(data);
    let mut half = [0u8; 32];
    half.copy_from_slice(&digest[..32]);
    half
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut check = [0u8; 4];
    check.copy_from_slice(&digest[..4]);
    check
}

fn base58check_encode(payload: &[u8]) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum(payload));
    bs58::encode(data)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_string()
}

fn base58check_decode(encoded: &str) -> Result<Vec<u8>, String> {
    let raw = bs58::decode(encoded)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_vec()
        .map_err(|e| e.to_string())?;
    if raw.len() < 5 {
        return Err("too short".to_string());
    }

    let (payload, check) = raw.split_at(raw.len() - 4);
    if check != checksum(payload) {
        return Err("checksum mismatch".to_string());
    }
    Ok(payload.to_vec())
}
