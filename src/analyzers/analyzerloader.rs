// src/analyzers/analyzerloader.rs

//! Collects unit factories from [`PluginSource`]s.
//!
//! A source is loaded at most once per [`AnalyzerLoader`], keyed by
//! [`PluginSource::source_id`]. A source that fails to load is skipped with a
//! warning.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;

use crate::analyzers::config::ENV_PLUGIN_PATH;
use crate::analyzers::error::ResultAnalyzer;
use crate::analyzers::units::AnalyzerFactories;
use crate::e_wrn;
use crate::libload::plugin_dlopen2::SharedLibrarySource;

use ::si_trace_print::{defn, defo, defx};

/// File name prefixes of plugin libraries.
pub const PLUGIN_PREFIXES: [&str; 2] = ["libdsa_", "dsa_"];

/// A supplier of unit factories.
pub trait PluginSource {
    /// Identity of the source; loading the same identity twice is a no-op.
    fn source_id(&self) -> String;

    fn load(&self) -> ResultAnalyzer<AnalyzerFactories>;
}

/// A [`PluginSource`] of compiled-in factories.
#[derive(Debug)]
pub struct StaticPluginSource {
    id: String,
    factories: AnalyzerFactories,
}

impl StaticPluginSource {
    pub fn new(id: &str, factories: AnalyzerFactories) -> StaticPluginSource {
        StaticPluginSource {
            id: String::from(id),
            factories,
        }
    }
}

impl PluginSource for StaticPluginSource {
    fn source_id(&self) -> String {
        self.id.clone()
    }

    fn load(&self) -> ResultAnalyzer<AnalyzerFactories> {
        Ok(self.factories.clone())
    }
}

/// Is `name` the file name of a plugin library on this platform?
pub fn is_plugin_file_name(name: &str) -> bool {
    PLUGIN_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        && name.ends_with(env::consts::DLL_SUFFIX)
        && name.len() > env::consts::DLL_SUFFIX.len()
}

#[derive(Debug, Default)]
pub struct AnalyzerLoader {
    factories: AnalyzerFactories,
    loaded: BTreeSet<String>,
}

impl AnalyzerLoader {
    pub fn new() -> AnalyzerLoader {
        AnalyzerLoader::default()
    }

    /// All factories loaded so far, in load order.
    pub fn factories(&self) -> &AnalyzerFactories {
        &self.factories
    }

    /// Identities of the sources loaded so far.
    pub fn loaded_sources(&self) -> Vec<String> {
        self.loaded.iter().cloned().collect()
    }

    /// Load `source`, returning the count of factories added. A source
    /// already loaded adds nothing.
    pub fn load_source(&mut self, source: &dyn PluginSource) -> ResultAnalyzer<usize> {
        let id = source.source_id();
        defn!("({:?})", id);
        if self.loaded.contains(&id) {
            defx!("already loaded");
            return Ok(0);
        }
        let factories = source.load()?;
        self.factories.extend(&factories);
        self.loaded.insert(id);
        defx!("added {}", factories.len());

        Ok(factories.len())
    }

    /// Load every plugin library in directory `dir`. Libraries that fail to
    /// load are skipped. Returns the count of factories added.
    pub fn load_plugins(&mut self, dir: &Path) -> usize {
        defn!("({:?})", dir);
        let entries = match fs::read_dir(dir) {
            Ok(val) => val,
            Err(err) => {
                defx!("read_dir failed {}", err);
                e_wrn!("cannot read plugin directory {:?}: {}", dir, err);
                return 0;
            }
        };
        // sorted so load order does not depend on the directory order
        let mut paths: Vec<std::path::PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| match path.file_name() {
                Some(name) => is_plugin_file_name(&name.to_string_lossy()),
                None => false,
            })
            .collect();
        paths.sort();
        let mut count: usize = 0;
        for path in paths.iter() {
            match fs::metadata(path) {
                Ok(metadata) if metadata.is_file() => {}
                _ => {
                    defo!("skip non-file {:?}", path);
                    continue;
                }
            }
            let source = SharedLibrarySource::new(path);
            match self.load_source(&source) {
                Ok(added) => count += added,
                Err(err) => {
                    e_wrn!("skip plugin {:?}: {}", path, err);
                }
            }
        }
        defx!("added {}", count);

        count
    }

    /// Load the plugin libraries of every directory in environment variable
    /// `DSA_PLUGIN_PATH`. Returns the count of factories added.
    pub fn load_plugins_from_env(&mut self) -> usize {
        let value = match env::var_os(ENV_PLUGIN_PATH) {
            Some(val) => val,
            None => return 0,
        };
        defn!("{}={:?}", ENV_PLUGIN_PATH, value);
        let mut count: usize = 0;
        for dir in env::split_paths(&value) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            count += self.load_plugins(&dir);
        }
        defx!("added {}", count);

        count
    }
}
