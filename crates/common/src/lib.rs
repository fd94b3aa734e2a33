//! Types shared by the yt-playlist crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
