#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! The fragment transfer pipeline: select and fetch a module's ZIP (§4.C),
//! then extract and verify it (§4.D).

mod download;
mod extract;
mod url;

pub use download::{ModuleDownloadRequest, ModuleDownloader};
pub use extract::ModuleDecompressor;
