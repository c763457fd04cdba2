//! Bot API request and response types.

mod invoice;
mod send;

pub use invoice::{AnswerPreCheckoutParams, LabeledPrice, SendInvoiceParams, STARS_CURRENCY};
pub use send::{ParseMode, SendMessageParams, SentMessage};
