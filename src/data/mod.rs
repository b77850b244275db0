// src/data/mod.rs

//! The `data` module holds what analysis produces and how it is recorded.
//!
//! * a [`Variant`] is one recorded value
//! * a [`RegisteredField`] names what a value means, e.g. `size` or
//!   `mimeType`; fields are registered once in a [`FieldRegister`]
//! * an [`AnalysisResult`] is the recording context of one node; it hands
//!   the facts of the node to an [`IndexWriter`] when the node ends
//!
//! [`Variant`]: crate::data::variant::Variant
//! [`RegisteredField`]: crate::data::fieldregister::RegisteredField
//! [`FieldRegister`]: crate::data::fieldregister::FieldRegister
//! [`AnalysisResult`]: crate::data::analysisresult::AnalysisResult
//! [`IndexWriter`]: crate::data::analysisresult::IndexWriter

pub mod analysisresult;
pub mod fieldregister;
pub mod variant;
