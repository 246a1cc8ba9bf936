pub mod engine;
pub mod ftso_oracle;

pub use engine::{PriceQuote, QuoteEngine};
pub use ftso_oracle::{FtsoFeedIds, FtsoOracle, PriceOracle, PricePoint};
