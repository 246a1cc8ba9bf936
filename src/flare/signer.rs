use k256::ecdsa::SigningKey;
use rlp::RlpStream;

use crate::error::FlareError;
use crate::flare::abi::keccak256;

/// Pre-EIP-1559 transaction, signed with EIP-155 replay protection
#[derive(Debug, Clone)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: [u8; 20],
    pub value: u128,
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    fn rlp_fields(&self, stream: &mut RlpStream) {
        stream.append(&trimmed(self.nonce as u128));
        stream.append(&trimmed(self.gas_price));
        stream.append(&trimmed(self.gas_limit as u128));
        stream.append(&self.to.to_vec());
        stream.append(&trimmed(self.value));
        stream.append(&self.data);
    }

    pub fn signing_hash(&self, chain_id: u64) -> [u8; 32] {
        let mut stream = RlpStream::new_list(9);
        self.rlp_fields(&mut stream);
        stream.append(&trimmed(chain_id as u128));
        stream.append(&Vec::<u8>::new());
        stream.append(&Vec::<u8>::new());
        keccak256(&stream.out())
    }
}

/// Local EVM key used to pay for attestation requests
pub struct EvmSigner {
    key: SigningKey,
    address: [u8; 20],
}

impl std::fmt::Debug for EvmSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmSigner")
            .field("address", &self.address_hex())
            .finish_non_exhaustive()
    }
}

impl EvmSigner {
    pub fn from_hex(private_key: &str) -> Result<Self, FlareError> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| FlareError::Signer(format!("private key is not hex: {}", e)))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| FlareError::Signer(format!("invalid private key: {}", e)))?;

        let point = key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);

        Ok(Self { key, address })
    }

    pub fn address_hex(&self) -> String {
        format!("0x{}", hex::encode(self.address))
    }

    /// RLP-encoded signed transaction ready for `eth_sendRawTransaction`
    pub fn sign_legacy(
        &self,
        tx: &LegacyTransaction,
        chain_id: u64,
    ) -> Result<Vec<u8>, FlareError> {
        let hash = tx.signing_hash(chain_id);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| FlareError::Signer(format!("signing failed: {}", e)))?;

        let v = recovery_id.to_byte() as u128 + chain_id as u128 * 2 + 35;
        let (r, s) = signature.split_bytes();

        let mut stream = RlpStream::new_list(9);
        tx.rlp_fields(&mut stream);
        stream.append(&trimmed(v));
        stream.append(&strip_leading_zeros(&r));
        stream.append(&strip_leading_zeros(&s));
        Ok(stream.out().to_vec())
    }
}

pub fn parse_address(address: &str) -> Result<[u8; 20], FlareError> {
    let bytes = hex::decode(address.trim().trim_start_matches("0x"))
        .map_err(|e| FlareError::Abi(format!("invalid address '{}': {}", address, e)))?;
    bytes
        .try_into()
        .map_err(|_| FlareError::Abi(format!("address '{}' is not 20 bytes", address)))
}

fn trimmed(value: u128) -> Vec<u8> {
    strip_leading_zeros(&value.to_be_bytes())
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Private key and transaction from the EIP-155 worked example
    const EIP155_KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";

    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: [0x35; 20],
            value: 1_000_000_000_000_000_000,
            data: Vec::new(),
        }
    }

    #[test]
    fn test_eip155_signing_hash() {
        assert_eq!(
            hex::encode(eip155_example().signing_hash(1)),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signed_transaction() {
        let signer = EvmSigner::from_hex(EIP155_KEY).unwrap();
        let raw = signer.sign_legacy(&eip155_example(), 1).unwrap();
        assert_eq!(
            hex::encode(raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn test_address_from_key() {
        let signer = EvmSigner::from_hex(EIP155_KEY).unwrap();
        assert_eq!(signer.address_hex(), "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f");
    }

    #[test]
    fn test_parse_address_length() {
        assert!(parse_address("0x3d893C53D9e8056135C26C8c638B76C8b60Df726").is_ok());
        assert!(parse_address("0x1234").is_err());
    }
}
