#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! HTTP transport for the fragmenter engine: a plain client wrapper, a
//! single-attempt ranged stream downloader (§4.A), and a resumable
//! retrying file downloader built on top of it (§4.B).

mod client;
mod file;
mod retry;
mod stream;

pub use client::{NetClient, NetConfig};
pub use file::{FileDownloadOutcome, FileDownloader, MAX_RETRIES};
pub use retry::backoff_delay;
pub use stream::{StreamDownloader, StreamResult};
