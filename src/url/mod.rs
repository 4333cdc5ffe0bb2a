//! URL handling module for Sumi-Harvest
//!
//! Detail links come straight out of the page as raw `href` attributes. This
//! module decides which of them are real links and turns the survivors into
//! fully-qualified URLs relative to the page they were found on.

mod href;

pub use href::{check_href, resolve_href, resolve_href_with, HrefRejection};
