//! The library code for the `makesite` static site generator. A build turns
//! three input directories into one output directory:
//!
//! * `static/` is copied into the output as-is ([`crate::util`]).
//! * `layout/` holds the templates every page, index, and feed is rendered
//!   with ([`crate::layout`], [`crate::template`]).
//! * `content/` holds the pages. Each file is either converted into an HTML
//!   page ([`crate::document`], [`crate::page`]) or copied through.
//!
//! Converting a content file goes through a [`document::Converter`]: either
//! the builtin Markdown converter ([`crate::markdown`]) or an external
//! `pandoc` process ([`crate::pandoc`]). Either way the result is a
//! [`document::Document`] whose front-matter becomes the page's flat
//! metadata ([`crate::metadata`]).
//!
//! Pages in a top-level subdirectory of `content/` belong to that category.
//! Each category gets an HTML index and an RSS feed, and the home page lists
//! the most recent pages across categories ([`crate::index`]). The stages
//! are stitched together in [`crate::build`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod document;
pub mod index;
pub mod layout;
pub mod logging;
pub mod markdown;
pub mod metadata;
pub mod page;
pub mod pandoc;
pub mod template;
pub mod util;
