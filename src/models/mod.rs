//! Domain models shared across the whole session.

pub mod market;
pub mod order;
pub mod plan;
pub mod position;
pub mod signal;

pub use market::{PriceBar, Quote, SymbolMeta};
pub use order::{OrderReceipt, OrderRequest, OrderTag};
pub use plan::TradePlan;
pub use position::OpenPosition;
pub use signal::{Direction, MomentumSignal};
