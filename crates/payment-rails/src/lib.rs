//! Payment rails: where money shows up.
//!
//! - [`TransferFeed`] - recent inbound transfers to the receiving wallet,
//!   implemented by [`TonCenterClient`]
//! - [`InvoiceGateway`] - hosted one-time invoices with a pull status API,
//!   implemented by [`MixPayClient`]
//!
//! Amounts cross this boundary in minor units: cents for fiat-quoted
//! invoices, micro-units (6 decimals) for on-chain transfers.

mod error;
mod mixpay;
mod toncenter;
mod traits;
mod types;

pub use error::RailError;
pub use mixpay::{MixPayClient, MixPayConfig};
pub use toncenter::{TonCenterClient, TonCenterConfig};
pub use traits::{InvoiceGateway, TransferFeed};
pub use types::{
    cents_to_micro, format_cents, generate_order_id, Invoice, InvoiceStatus, Transfer,
    MICRO_PER_CENT,
};
