// src/data/fieldregister.rs

//! Implements [`FieldRegister`], the registry mapping a field key to its
//! one [`RegisteredField`] token.
//!
//! Units register their fields once, when their factory is registered with a
//! [`StreamAnalyzer`], and keep the returned [`FieldP`] handles. Recording a
//! value then never needs a string lookup.
//!
//! [`StreamAnalyzer`]: crate::analyzers::streamanalyzer::StreamAnalyzer

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use ::si_trace_print::{defn, defx};

/// Key of the well-known field holding the byte size of a node.
pub const FIELD_SIZE: &str = "size";
/// Key of the well-known field holding the MIME type of a node.
pub const FIELD_MIMETYPE: &str = "mimeType";
/// Key of the well-known field holding the class of a node, e.g. `Audio`.
pub const FIELD_TYPE: &str = "type";
/// Key of the well-known field holding a parse error message.
pub const FIELD_PARSEERROR: &str = "parseError";
/// Key of the well-known field holding the file name of a node.
pub const FIELD_FILENAME: &str = "fileName";
/// Key of the well-known field linking a child node to its parent path.
pub const FIELD_PARENTLOCATION: &str = "parentLocation";
/// Key of the well-known field linking a node to its content hash URI.
pub const FIELD_HASHASH: &str = "hasHash";
/// Key of the well-known field holding the recursion depth of a node.
pub const FIELD_DEPTH: &str = "depth";

/// An immutable field token. Two tokens are the same field when their keys
/// are equal; a [`FieldRegister`] hands out at most one token per key.
#[derive(Debug)]
pub struct RegisteredField {
    key: String,
    /// optional parent field for hierarchical roll-up
    parent: Option<FieldP>,
}

/// Shared handle to a [`RegisteredField`].
pub type FieldP = Arc<RegisteredField>;

impl RegisteredField {
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    pub fn parent(&self) -> Option<&FieldP> {
        self.parent.as_ref()
    }
}

impl PartialEq for RegisteredField {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RegisteredField {}

impl fmt::Display for RegisteredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Registry of all fields known to one analysis context.
///
/// Shared across threads as [`FieldRegisterP`]; registration takes a write
/// lock, which only happens while units are being registered.
pub struct FieldRegister {
    fields: RwLock<BTreeMap<String, FieldP>>,
    pub size_field: FieldP,
    pub mimetype_field: FieldP,
    pub type_field: FieldP,
    pub parseerror_field: FieldP,
    pub filename_field: FieldP,
    pub parentlocation_field: FieldP,
    pub hashash_field: FieldP,
    pub depth_field: FieldP,
}

/// Shared handle to a [`FieldRegister`].
pub type FieldRegisterP = Arc<FieldRegister>;

impl fmt::Debug for FieldRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegister")
            .field("count", &self.len())
            .finish()
    }
}

impl Default for FieldRegister {
    fn default() -> Self {
        Self::new()
    }
}

fn new_field(fields: &mut BTreeMap<String, FieldP>, key: &str) -> FieldP {
    let field: FieldP = Arc::new(RegisteredField { key: String::from(key), parent: None });
    fields.insert(String::from(key), field.clone());
    field
}

impl FieldRegister {
    /// Create a `FieldRegister` holding the well-known fields.
    pub fn new() -> FieldRegister {
        let mut fields: BTreeMap<String, FieldP> = BTreeMap::new();
        let size_field = new_field(&mut fields, FIELD_SIZE);
        let mimetype_field = new_field(&mut fields, FIELD_MIMETYPE);
        let type_field = new_field(&mut fields, FIELD_TYPE);
        let parseerror_field = new_field(&mut fields, FIELD_PARSEERROR);
        let filename_field = new_field(&mut fields, FIELD_FILENAME);
        let parentlocation_field = new_field(&mut fields, FIELD_PARENTLOCATION);
        let hashash_field = new_field(&mut fields, FIELD_HASHASH);
        let depth_field = new_field(&mut fields, FIELD_DEPTH);

        FieldRegister {
            fields: RwLock::new(fields),
            size_field,
            mimetype_field,
            type_field,
            parseerror_field,
            filename_field,
            parentlocation_field,
            hashash_field,
            depth_field,
        }
    }

    /// Register the field `key`. Registering the same key again returns the
    /// token created the first time.
    pub fn register_field(&self, key: &str) -> FieldP {
        self.register_field_with_parent(key, None)
    }

    /// Register the field `key` with roll-up parent `parent`. The parent of an
    /// already registered key is not changed.
    pub fn register_field_with_parent(
        &self,
        key: &str,
        parent: Option<&FieldP>,
    ) -> FieldP {
        if let Some(field) = self.field(key) {
            return field;
        }
        defn!("{:?}", key);
        let mut fields = match self.fields.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                crate::de_err!("FieldRegister lock poisoned; continuing");
                poisoned.into_inner()
            }
        };
        // another writer may have won the race since the read above
        let field = fields
            .entry(String::from(key))
            .or_insert_with(|| {
                Arc::new(RegisteredField {
                    key: String::from(key),
                    parent: parent.cloned(),
                })
            })
            .clone();
        defx!("count {}", fields.len());

        field
    }

    /// Look up a registered field by key.
    pub fn field(&self, key: &str) -> Option<FieldP> {
        let fields = match self.fields.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        fields.get(key).cloned()
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let fields = match self.fields.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        fields.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        match self.fields.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
