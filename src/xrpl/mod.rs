pub mod client;
pub mod codec;
pub mod keys;
pub mod models;

pub use client::{FundedAccount, LedgerClient, XrplClient};
pub use keys::{address_from_seed, is_valid_classic_address, Keypair};
pub use models::{
    drops_to_xrp, xrp_to_drops, AccountInfo, LedgerTransaction, Memo, PaymentDraft,
    SubmittedPayment,
};
