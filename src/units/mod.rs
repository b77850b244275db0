// src/units/mod.rs

//! The `units` module holds the built-in units.
//!
//! | kind      | units |
//! |-----------|-------|
//! | event     | [`MimeEventUnit`], [`DigestEventUnit`] |
//! | line      | [`TxtLineUnit`] |
//! | markup    | [`NamespaceHarvesterUnit`] |
//! | transform | [`GifTransformUnit`] |
//! | terminal  | [`Bz2Unit`], [`GzipUnit`], [`TarUnit`], [`ZipUnit`], [`Lz4Unit`], [`XzUnit`], [`Id3Unit`], [`TextUnit`] |
//!
//! Built-in units are registered through the same factories as plugin
//! units; see [`builtin_factories`].
//!
//! [`MimeEventUnit`]: crate::units::mime::MimeEventUnit
//! [`DigestEventUnit`]: crate::units::digest::DigestEventUnit
//! [`TxtLineUnit`]: crate::units::txtline::TxtLineUnit
//! [`NamespaceHarvesterUnit`]: crate::units::namespaceharvester::NamespaceHarvesterUnit
//! [`GifTransformUnit`]: crate::units::gif::GifTransformUnit
//! [`Bz2Unit`]: crate::units::decompress::Bz2Unit
//! [`GzipUnit`]: crate::units::decompress::GzipUnit
//! [`Lz4Unit`]: crate::units::decompress::Lz4Unit
//! [`XzUnit`]: crate::units::decompress::XzUnit
//! [`TarUnit`]: crate::units::archive::TarUnit
//! [`ZipUnit`]: crate::units::archive::ZipUnit
//! [`Id3Unit`]: crate::units::id3::Id3Unit
//! [`TextUnit`]: crate::units::text::TextUnit

use std::sync::Arc;

use crate::analyzers::units::AnalyzerFactories;

pub mod archive;
pub mod decompress;
pub mod digest;
pub mod gif;
pub mod id3;
pub mod mime;
pub mod namespaceharvester;
pub mod text;
pub mod txtline;

/// Factories of all built-in units, in registration order.
pub fn builtin_factories() -> AnalyzerFactories {
    let mut factories = AnalyzerFactories::new();
    factories.event.push(Arc::new(mime::MimeEventUnitFactory::new()));
    factories.event.push(Arc::new(digest::DigestEventUnitFactory::new()));
    factories.line.push(Arc::new(txtline::TxtLineUnitFactory::new()));
    factories
        .markup
        .push(Arc::new(namespaceharvester::NamespaceHarvesterUnitFactory::new()));
    factories.transform.push(Arc::new(gif::GifTransformUnitFactory::new()));
    factories.terminal.push(Arc::new(decompress::Bz2UnitFactory::new()));
    factories.terminal.push(Arc::new(decompress::GzipUnitFactory::new()));
    factories.terminal.push(Arc::new(archive::TarUnitFactory::new()));
    factories.terminal.push(Arc::new(archive::ZipUnitFactory::new()));
    factories.terminal.push(Arc::new(decompress::Lz4UnitFactory::new()));
    factories.terminal.push(Arc::new(decompress::XzUnitFactory::new()));
    factories.terminal.push(Arc::new(id3::Id3UnitFactory::new()));
    factories.terminal.push(Arc::new(text::TextUnitFactory::new()));

    factories
}
