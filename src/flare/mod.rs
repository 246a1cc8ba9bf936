pub mod abi;
pub mod rpc;
pub mod signer;

pub use rpc::{FlareRpc, Receipt};
pub use signer::{EvmSigner, LegacyTransaction};
