// src/units/namespaceharvester.rs

//! Collects the namespace URIs declared in markup, e.g. the
//! `http://www.w3.org/2000/svg` of `<svg xmlns="http://www.w3.org/2000/svg">`.

use crate::analyzers::units::{MarkupUnit, MarkupUnitFactory, UnitFactory};
use crate::data::analysisresult::SinkHandle;
use crate::data::fieldregister::{FieldP, FieldRegister};

pub const NAME_NAMESPACE_HARVESTER: &str = "NamespaceHarvesterUnit";

pub const FIELD_USESNAMESPACE: &str = "usesNamespace";

/// Is `key` an attribute declaring a namespace?
fn is_xmlns(key: &str) -> bool {
    key == "xmlns" || key.starts_with("xmlns:")
}

pub struct NamespaceHarvesterUnit {
    usesnamespace_field: FieldP,
    sink: Option<SinkHandle>,
    /// in order of first declaration
    namespaces: Vec<String>,
}

impl MarkupUnit for NamespaceHarvesterUnit {
    fn name(&self) -> &str {
        NAME_NAMESPACE_HARVESTER
    }

    fn start_analysis(&mut self, sink: SinkHandle) {
        self.sink = Some(sink);
        self.namespaces.clear();
    }

    fn start_element(&mut self, _name: &str, attributes: &[(String, String)]) {
        for (key, value) in attributes.iter() {
            if is_xmlns(key) && !value.is_empty() && !self.namespaces.contains(value) {
                self.namespaces.push(value.clone());
            }
        }
    }

    fn end_element(&mut self, _name: &str) {}

    fn characters(&mut self, _text: &str) {}

    fn end_analysis(&mut self, _complete: bool) {
        let sink = match self.sink.take() {
            Some(val) => val,
            None => return,
        };
        for namespace in self.namespaces.drain(..) {
            sink.add_value(&self.usesnamespace_field, namespace);
        }
    }

    fn is_ready_with_stream(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct NamespaceHarvesterUnitFactory {}

impl NamespaceHarvesterUnitFactory {
    pub fn new() -> NamespaceHarvesterUnitFactory {
        NamespaceHarvesterUnitFactory {}
    }
}

impl UnitFactory for NamespaceHarvesterUnitFactory {
    fn name(&self) -> &str {
        NAME_NAMESPACE_HARVESTER
    }

    fn register_fields(&self, register: &FieldRegister) {
        register.register_field(FIELD_USESNAMESPACE);
    }
}

impl MarkupUnitFactory for NamespaceHarvesterUnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn MarkupUnit> {
        Box::new(NamespaceHarvesterUnit {
            usesnamespace_field: register.register_field(FIELD_USESNAMESPACE),
            sink: None,
            namespaces: Vec::new(),
        })
    }
}
