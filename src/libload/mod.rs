// src/libload/mod.rs

//! Dynamic loading of analyzer plugin libraries.

pub mod plugin_dlopen2;
