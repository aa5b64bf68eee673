// ABOUTME: Markup extraction for folio: content containers, text cleanup and image candidates.
// ABOUTME: All rules come from the active SourceProfile; nothing here is site-specific.

//! Content extraction module.
//!
//! Submodules:
//! - `compiled`: process-wide compiled-selector cache.
//! - `content`: container location and text extraction.
//! - `images`: image candidate collection and relevance filtering.

pub mod compiled;
pub mod content;
pub mod images;
