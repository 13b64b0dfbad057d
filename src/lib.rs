//! Extraction engine for the IQAir world air-quality index.
//!
//! The library half of the crate holds everything that talks to the
//! provider or picks data out of its pages: ranking-table parsing,
//! search-payload reconstruction, fuzzy city resolution, and the
//! multi-strategy detail-page extractor. Terminal presentation lives
//! in the binary.

pub mod error;
pub mod sources;
