//! Identifier parsing and HTML scraping.
//!
//! - [`Doi`] is the normalized key used everywhere in the crawler
//! - [`parse_identifier_list`] splits operator input into DOIs
//! - [`extract_references`] / [`extract_title`] read landing and mirror pages
//!
//! # Example
//!
//! ```
//! use refcrawler_core::parser::{Doi, extract_references};
//!
//! let html = r#"<a href="https://doi.org/10.1000/cited">ref</a>"#;
//! let refs = extract_references(html, None);
//! assert!(refs.contains(&Doi::parse("10.1000/cited").unwrap()));
//! ```

mod doi;
mod error;
mod references;

pub use doi::{Doi, looks_like_doi, parse_identifier_list};
pub use error::ParseError;
pub use references::{extract_references, extract_title};
