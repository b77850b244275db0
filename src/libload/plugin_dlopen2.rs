// src/libload/plugin_dlopen2.rs

//! Functions to dynamically load analyzer plugin libraries using
//! [`dlopen2`].
//!
//! A plugin library is a Rust `cdylib` built against this crate that
//! exports three symbols, best declared with [`declare_analyzer_plugin!`]:
//!
//! * `dsa_plugin_abi_version`, returning [`PLUGIN_ABI_VERSION`]
//! * `dsa_analyzer_factory`, returning a new [`AnalyzerFactories`]
//! * `dsa_delete_analyzer_factory`, releasing what
//!   `dsa_analyzer_factory` returned
//!
//! The factories hold code of the plugin library, so a loaded library is
//! kept in [`PLUGIN_MODULES`] until the process exits.
//!
//! [`dlopen2`]: https://docs.rs/dlopen2/0.7.0/dlopen2/index.html
//! [`declare_analyzer_plugin!`]: crate::declare_analyzer_plugin

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::analyzers::analyzerloader::PluginSource;
use crate::analyzers::error::{AnalyzerError, ResultAnalyzer};
use crate::analyzers::units::AnalyzerFactories;
use crate::common::FPath;
use crate::readers::helpers::path_to_fpath;

use ::dlopen2::wrapper::{Container, WrapperApi};
use ::lazy_static::lazy_static;
use ::si_trace_print::{defn, defo, defx};

/// Bumped whenever [`AnalyzerFactories`] or the unit traits change.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// [`dlopen2`] API wrapper for an analyzer plugin library.
///
/// [`dlopen2`]: https://docs.rs/dlopen2/0.7.0/dlopen2/index.html
#[derive(WrapperApi)]
pub struct PluginApi {
    dsa_plugin_abi_version: unsafe extern "C" fn() -> u32,
    dsa_analyzer_factory: unsafe extern "C" fn() -> *mut AnalyzerFactories,
    dsa_delete_analyzer_factory: unsafe extern "C" fn(factories: *mut AnalyzerFactories),
}

/// `dlopen2` container for a plugin library.
pub type PluginApiContainer = Container<PluginApi>;

/// Multi-threaded pointer to a loaded plugin library.
pub type PluginApiPtr = Arc<PluginApiContainer>;

lazy_static! {
    /// Plugin libraries loaded so far, by file path.
    ///
    /// Shared by every `AnalyzerLoader` of the process so a library is
    /// opened once however many workers load it.
    pub static ref PLUGIN_MODULES: RwLock<BTreeMap<FPath, PluginApiPtr>> = {
        RwLock::new(BTreeMap::new())
    };
}

/// Open the library at `path`, or return the already opened library.
pub fn load_library_plugin(path: &Path) -> ResultAnalyzer<PluginApiPtr> {
    let fpath: FPath = path_to_fpath(path);
    defn!("({:?})", fpath);
    {
        let modules = PLUGIN_MODULES.read().unwrap_or_else(|err| err.into_inner());
        if let Some(api) = modules.get(&fpath) {
            defx!("already loaded");
            return Ok(api.clone());
        }
    }
    let mut modules = PLUGIN_MODULES.write().unwrap_or_else(|err| err.into_inner());
    // another thread may have loaded it in the meantime
    if let Some(api) = modules.get(&fpath) {
        defx!("already loaded");
        return Ok(api.clone());
    }
    defo!("Container::load({:?})", fpath);
    let container = match unsafe { PluginApiContainer::load(path) } {
        Ok(val) => val,
        Err(err) => {
            defx!("failed to load library: {}", err);
            return Err(AnalyzerError::PluginLoad {
                source_id: fpath,
                reason: err.to_string(),
            });
        }
    };
    let version = unsafe { container.dsa_plugin_abi_version() };
    if version != PLUGIN_ABI_VERSION {
        defx!("ABI version {} != {}", version, PLUGIN_ABI_VERSION);
        return Err(AnalyzerError::PluginLoad {
            source_id: fpath,
            reason: format!(
                "plugin ABI version {}, expected {}",
                version, PLUGIN_ABI_VERSION
            ),
        });
    }
    let api: PluginApiPtr = Arc::new(container);
    modules.insert(fpath, api.clone());
    defx!("loaded");

    Ok(api)
}

/// A [`PluginSource`] backed by a dynamic library file.
#[derive(Debug)]
pub struct SharedLibrarySource {
    path: FPath,
}

impl SharedLibrarySource {
    pub fn new(path: &Path) -> SharedLibrarySource {
        SharedLibrarySource {
            path: path_to_fpath(path),
        }
    }
}

impl PluginSource for SharedLibrarySource {
    fn source_id(&self) -> String {
        self.path.clone()
    }

    fn load(&self) -> ResultAnalyzer<AnalyzerFactories> {
        defn!("({:?})", self.path);
        let api = load_library_plugin(Path::new(self.path.as_str()))?;
        let ptr: *mut AnalyzerFactories = unsafe { api.dsa_analyzer_factory() };
        if ptr.is_null() {
            defx!("null factories");
            return Err(AnalyzerError::PluginLoad {
                source_id: self.path.clone(),
                reason: String::from("dsa_analyzer_factory returned null"),
            });
        }
        // clone the shared factory pointers, then let the plugin release its
        // own allocation
        let factories: AnalyzerFactories = unsafe { (*ptr).clone() };
        unsafe { api.dsa_delete_analyzer_factory(ptr) };
        defx!("{} factories", factories.len());

        Ok(factories)
    }
}

/// Export the entry points of an analyzer plugin library.
///
/// `$make` is an expression evaluating to an [`AnalyzerFactories`].
///
/// ```ignore
/// dsalib::declare_analyzer_plugin!({
///     let mut factories = dsalib::analyzers::units::AnalyzerFactories::new();
///     factories.terminal.push(std::sync::Arc::new(MyUnitFactory {}));
///     factories
/// });
/// ```
///
/// [`AnalyzerFactories`]: crate::analyzers::units::AnalyzerFactories
#[macro_export]
macro_rules! declare_analyzer_plugin {
    ($make:expr) => {
        #[no_mangle]
        pub extern "C" fn dsa_plugin_abi_version() -> u32 {
            $crate::libload::plugin_dlopen2::PLUGIN_ABI_VERSION
        }

        #[no_mangle]
        pub extern "C" fn dsa_analyzer_factory(
        ) -> *mut $crate::analyzers::units::AnalyzerFactories {
            let factories: $crate::analyzers::units::AnalyzerFactories = $make;
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(factories))
        }

        #[no_mangle]
        pub extern "C" fn dsa_delete_analyzer_factory(
            factories: *mut $crate::analyzers::units::AnalyzerFactories,
        ) {
            if !factories.is_null() {
                drop(unsafe { ::std::boxed::Box::from_raw(factories) });
            }
        }
    };
}
