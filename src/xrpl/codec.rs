//! Canonical binary serialization for the one transaction shape this service
//! submits: a native XRP Payment with optional memos.
//!
//! Fields are written in canonical order (type code, then field code). Only
//! the field set below is supported; anything else is rejected upstream.

use crate::error::LedgerError;
use crate::xrpl::keys::{decode_classic_address, sha512_half, Keypair};
use crate::xrpl::models::Memo;

const SIGNING_PREFIX: [u8; 4] = *b"STX\0";
const TX_ID_PREFIX: [u8; 4] = *b"TXN\0";

const PAYMENT_TYPE: u16 = 0;
const NATIVE_AMOUNT_FLAG: u64 = 0x4000_0000_0000_0000;
const MAX_DROPS: u64 = 100_000_000_000_000_000;

// Serialized type codes
const ST_UINT16: u8 = 1;
const ST_UINT32: u8 = 2;
const ST_AMOUNT: u8 = 6;
const ST_BLOB: u8 = 7;
const ST_ACCOUNT: u8 = 8;
const ST_OBJECT: u8 = 14;
const ST_ARRAY: u8 = 15;

const OBJECT_END: u8 = 0xE1;
const ARRAY_END: u8 = 0xF1;

/// Unsigned or signed native XRP payment
#[derive(Debug, Clone)]
pub struct PaymentTx {
    pub account: [u8; 20],
    pub destination: [u8; 20],
    pub amount_drops: u64,
    pub fee_drops: u64,
    pub sequence: u32,
    pub last_ledger_sequence: u32,
    pub flags: u32,
    pub signing_pub_key: Vec<u8>,
    pub txn_signature: Option<Vec<u8>>,
    pub memos: Vec<Memo>,
}

/// Signed blob ready for `submit`
#[derive(Debug, Clone)]
pub struct SignedBlob {
    pub tx_blob: String,
    pub hash: String,
}

impl PaymentTx {
    pub fn new(
        account: &str,
        destination: &str,
        amount_drops: u64,
        memos: Vec<Memo>,
    ) -> Result<Self, LedgerError> {
        if amount_drops == 0 || amount_drops > MAX_DROPS {
            return Err(LedgerError::SubmissionFailed {
                code: "temBAD_AMOUNT".to_string(),
                message: format!("{} drops is not a valid XRP amount", amount_drops),
            });
        }

        Ok(Self {
            account: decode_classic_address(account)?,
            destination: decode_classic_address(destination)?,
            amount_drops,
            fee_drops: 0,
            sequence: 0,
            last_ledger_sequence: 0,
            flags: 0,
            signing_pub_key: Vec::new(),
            txn_signature: None,
            memos,
        })
    }

    /// Canonical serialization. `for_signing` omits the signature field.
    pub fn encode(&self, for_signing: bool) -> Result<Vec<u8>, LedgerError> {
        let mut out = Vec::with_capacity(256);

        write_field_id(&mut out, ST_UINT16, 2);
        out.extend_from_slice(&PAYMENT_TYPE.to_be_bytes());

        write_field_id(&mut out, ST_UINT32, 2);
        out.extend_from_slice(&self.flags.to_be_bytes());

        write_field_id(&mut out, ST_UINT32, 4);
        out.extend_from_slice(&self.sequence.to_be_bytes());

        write_field_id(&mut out, ST_UINT32, 27);
        out.extend_from_slice(&self.last_ledger_sequence.to_be_bytes());

        write_field_id(&mut out, ST_AMOUNT, 1);
        out.extend_from_slice(&native_amount(self.amount_drops));

        write_field_id(&mut out, ST_AMOUNT, 8);
        out.extend_from_slice(&native_amount(self.fee_drops));

        write_field_id(&mut out, ST_BLOB, 3);
        write_vl(&mut out, &self.signing_pub_key)?;

        if !for_signing {
            if let Some(signature) = &self.txn_signature {
                write_field_id(&mut out, ST_BLOB, 4);
                write_vl(&mut out, signature)?;
            }
        }

        write_field_id(&mut out, ST_ACCOUNT, 1);
        write_vl(&mut out, &self.account)?;

        write_field_id(&mut out, ST_ACCOUNT, 3);
        write_vl(&mut out, &self.destination)?;

        if !self.memos.is_empty() {
            write_field_id(&mut out, ST_ARRAY, 9);
            for memo in &self.memos {
                write_field_id(&mut out, ST_OBJECT, 10);
                if let Some(memo_type) = &memo.memo_type {
                    write_field_id(&mut out, ST_BLOB, 12);
                    write_vl(&mut out, memo_type)?;
                }
                if let Some(memo_data) = &memo.memo_data {
                    write_field_id(&mut out, ST_BLOB, 13);
                    write_vl(&mut out, memo_data)?;
                }
                if let Some(memo_format) = &memo.memo_format {
                    write_field_id(&mut out, ST_BLOB, 14);
                    write_vl(&mut out, memo_format)?;
                }
                out.push(OBJECT_END);
            }
            out.push(ARRAY_END);
        }

        Ok(out)
    }

    pub fn signing_payload(&self) -> Result<Vec<u8>, LedgerError> {
        let mut payload = SIGNING_PREFIX.to_vec();
        payload.extend(self.encode(true)?);
        Ok(payload)
    }

    /// Attach the signing key, sign and return the submit-ready blob with its hash
    pub fn sign(mut self, keypair: &Keypair) -> Result<SignedBlob, LedgerError> {
        self.signing_pub_key = keypair.public_key().to_vec();
        let signature = keypair.sign(&self.signing_payload()?)?;
        self.txn_signature = Some(signature);

        let blob = self.encode(false)?;
        Ok(SignedBlob {
            hash: transaction_hash(&blob),
            tx_blob: hex::encode_upper(&blob),
        })
    }
}

/// Transaction id of a signed blob
pub fn transaction_hash(blob: &[u8]) -> String {
    let mut prefixed = TX_ID_PREFIX.to_vec();
    prefixed.extend_from_slice(blob);
    hex::encode_upper(sha512_half(&prefixed))
}

fn native_amount(drops: u64) -> [u8; 8] {
    (NATIVE_AMOUNT_FLAG | drops).to_be_bytes()
}

fn write_field_id(out: &mut Vec<u8>, type_code: u8, field_code: u8) {
    match (type_code < 16, field_code < 16) {
        (true, true) => out.push((type_code << 4) | field_code),
        (true, false) => {
            out.push(type_code << 4);
            out.push(field_code);
        }
        (false, true) => {
            out.push(field_code);
            out.push(type_code);
        }
        (false, false) => {
            out.push(0);
            out.push(type_code);
            out.push(field_code);
        }
    }
}

fn write_vl(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), LedgerError> {
    let len = bytes.len();
    if len <= 192 {
        out.push(len as u8);
    } else if len <= 12_480 {
        let rest = len - 193;
        out.push(193 + (rest >> 8) as u8);
        out.push((rest & 0xFF) as u8);
    } else if len <= 918_744 {
        let rest = len - 12_481;
        out.push(241 + (rest >> 16) as u8);
        out.push(((rest >> 8) & 0xFF) as u8);
        out.push((rest & 0xFF) as u8);
    } else {
        return Err(LedgerError::SubmissionFailed {
            code: "temMALFORMED".to_string(),
            message: format!("field of {} bytes is too large to encode", len),
        });
    }
    out.extend_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_SEED: &str = "snoPBrXtMeMyMHUVTgbuqAfg1SUTb";
    const GENESIS_ADDRESS: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";

    fn sample_payment(memos: Vec<Memo>) -> PaymentTx {
        let mut tx = PaymentTx::new(GENESIS_ADDRESS, GENESIS_ADDRESS, 1_000_000, memos).unwrap();
        tx.fee_drops = 12;
        tx.sequence = 7;
        tx.last_ledger_sequence = 120;
        tx
    }

    #[test]
    fn test_field_ids() {
        let mut out = Vec::new();
        write_field_id(&mut out, ST_UINT16, 2);
        write_field_id(&mut out, ST_UINT32, 27);
        write_field_id(&mut out, ST_ARRAY, 9);
        write_field_id(&mut out, ST_OBJECT, 10);
        assert_eq!(out, vec![0x12, 0x20, 0x1B, 0xF9, 0xEA]);
    }

    #[test]
    fn test_variable_length_prefix() {
        let mut out = Vec::new();
        write_vl(&mut out, &[0u8; 192]).unwrap();
        assert_eq!(out[0], 192);

        let mut out = Vec::new();
        write_vl(&mut out, &[0u8; 193]).unwrap();
        assert_eq!(&out[..2], &[193, 0]);

        let mut out = Vec::new();
        write_vl(&mut out, &[0u8; 500]).unwrap();
        assert_eq!(&out[..2], &[194, 51]);
    }

    #[test]
    fn test_native_amount_encoding() {
        assert_eq!(native_amount(1_000_000), [0x40, 0, 0, 0, 0, 0x0F, 0x42, 0x40]);
    }

    #[test]
    fn test_payment_layout() {
        let tx = sample_payment(Vec::new());
        let bytes = tx.encode(true).unwrap();

        // TransactionType Payment, Flags 0
        assert_eq!(&bytes[..3], &[0x12, 0x00, 0x00]);
        assert_eq!(&bytes[3..8], &[0x22, 0, 0, 0, 0]);
        // Sequence 7
        assert_eq!(&bytes[8..13], &[0x24, 0, 0, 0, 7]);
        // LastLedgerSequence 120
        assert_eq!(&bytes[13..19], &[0x20, 0x1B, 0, 0, 0, 120]);
        // Amount then Fee
        assert_eq!(bytes[19], 0x61);
        assert_eq!(bytes[28], 0x68);
        // Empty SigningPubKey
        assert_eq!(&bytes[37..39], &[0x73, 0x00]);
        // Account and Destination, 20 bytes each
        assert_eq!(&bytes[39..41], &[0x81, 0x14]);
        assert_eq!(&bytes[61..63], &[0x83, 0x14]);
        assert_eq!(bytes.len(), 83);
    }

    #[test]
    fn test_memos_are_wrapped_in_array() {
        let memo = Memo {
            memo_type: Some(b"venmo_request".to_vec()),
            memo_data: Some(b"{}".to_vec()),
            memo_format: None,
        };
        let bytes = sample_payment(vec![memo]).encode(true).unwrap();

        let array_start = 83;
        assert_eq!(bytes[array_start], 0xF9);
        assert_eq!(bytes[array_start + 1], 0xEA);
        assert_eq!(&bytes[array_start + 2..array_start + 4], &[0x7C, 13]);
        assert_eq!(*bytes.last().unwrap(), ARRAY_END);
        assert_eq!(bytes[bytes.len() - 2], OBJECT_END);
    }

    #[test]
    fn test_signed_blob_includes_signature_and_hash() {
        let keypair = Keypair::from_seed_str(GENESIS_SEED).unwrap();
        let unsigned_len = sample_payment(Vec::new()).encode(true).unwrap().len();
        let signed = sample_payment(Vec::new()).sign(&keypair).unwrap();

        let blob = hex::decode(&signed.tx_blob).unwrap();
        // 33 byte public key plus a DER signature field
        assert!(blob.len() > unsigned_len + 33 + 2 + 8);
        assert_eq!(signed.hash, transaction_hash(&blob));
        assert_eq!(signed.hash.len(), 64);
    }

    #[test]
    fn test_zero_amount_rejected() {
        assert!(PaymentTx::new(GENESIS_ADDRESS, GENESIS_ADDRESS, 0, Vec::new()).is_err());
    }
}
