//! Track records and fingerprint persistence.

pub mod fingerprint;
pub mod store;
pub mod track;

pub use fingerprint::{FingerprintParseError, decode_fingerprint, encode_fingerprint};
pub use store::{LibraryStore, StoreError};
pub use track::{Track, TrackId};
