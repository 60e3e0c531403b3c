//! Chat webhook delivery.
//!
//! - [`payload`] - the embed message and link canonicalization
//! - [`poster`] - the multipart POST carrying the message and the PNG

mod payload;
mod poster;

pub use payload::{base_url, Embed, EmbedAuthor, EmbedImage, EmbedOptions, WebhookPayload};
pub use poster::{PostOutcome, WebhookPoster};
