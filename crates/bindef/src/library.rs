// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Definition library.
//!
//! Sanitized descriptors registered under a definition id, so a format is
//! validated once and shared by every tree built from it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::ByteSource;
use crate::descriptor::Descriptor;
use crate::error::{ResolutionError, Result};
use crate::node::{self, Tree};
use crate::sanitizer::sanitize;
use crate::spec::FieldSpec;

#[derive(Default)]
pub struct Library {
    defs: RwLock<HashMap<String, Arc<Descriptor>>>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize `spec` and register it as `id`, replacing any previous
    /// definition.
    pub fn add(&self, id: &str, spec: &FieldSpec) -> Result<Arc<Descriptor>> {
        let desc = sanitize(spec)?;
        self.insert(id, Arc::clone(&desc));
        Ok(desc)
    }

    pub fn insert(&self, id: &str, desc: Arc<Descriptor>) {
        let replaced = self.defs.write().insert(id.to_string(), desc).is_some();
        log::debug!(
            "[library] {} '{}'",
            if replaced { "replaced" } else { "added" },
            id
        );
    }

    pub fn get(&self, id: &str) -> Result<Arc<Descriptor>> {
        self.defs.read().get(id).cloned().ok_or_else(|| {
            ResolutionError::UnknownDefinition { id: id.to_string() }.into()
        })
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Descriptor>> {
        self.defs.write().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.defs.read().contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.defs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.defs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.read().is_empty()
    }

    /// Build a tree of definition `id`: parsed from `source` when given,
    /// default-valued otherwise.
    pub fn build(&self, id: &str, source: Option<&dyn ByteSource>) -> Result<Tree> {
        let desc = self.get(id)?;
        node::build(&desc, source)
    }

    /// Parse the file at `path` as definition `id`.
    pub fn parse_path(&self, id: &str, path: impl AsRef<Path>) -> Result<Tree> {
        let desc = self.get(id)?;
        crate::file::parse_path(&desc, path)
    }

    /// Register every definition of a YAML document. Returns the ids added.
    ///
    /// Nothing is registered unless every definition sanitizes.
    #[cfg(feature = "yaml")]
    pub fn load_yaml_file(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        use crate::spec::yaml::YamlLoader;

        let doc = YamlLoader::load_from_file(path.as_ref())?;
        let mut sanitized = Vec::new();
        let mut errors = Vec::new();
        for (id, spec) in YamlLoader::definitions(&doc)? {
            match sanitize(&spec) {
                Ok(desc) => sanitized.push((id, desc)),
                Err(e) => errors.extend(e.schema_errors().iter().cloned()),
            }
        }
        if !errors.is_empty() {
            log::warn!(
                "[library] {} rejected: {} schema error(s)",
                path.as_ref().display(),
                errors.len()
            );
            return Err(crate::Error::Schema(errors));
        }
        let ids = sanitized.iter().map(|(id, _)| id.clone()).collect();
        for (id, desc) in sanitized {
            self.insert(&id, desc);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::value::Value;

    fn pair() -> FieldSpec {
        FieldSpec::container("pair")
            .entry(FieldSpec::field("len", "UInt8"))
            .entry(FieldSpec::field("payload", "StrRawAscii").size_path(".len"))
    }

    #[test]
    fn test_add_get_remove() {
        let lib = Library::new();
        assert!(lib.is_empty());
        lib.add("pair", &pair()).expect("add");
        lib.add("byte", &FieldSpec::field("b", "UInt8")).expect("add");
        assert_eq!(lib.ids(), vec!["byte".to_string(), "pair".to_string()]);
        assert_eq!(lib.get("pair").expect("get").name, "pair");
        assert!(lib.remove("byte").is_some());
        assert_eq!(lib.len(), 1);
    }

    #[test]
    fn test_unknown_definition() {
        let lib = Library::new();
        let err = lib.build("nope", None).expect_err("unknown");
        assert!(matches!(
            err,
            Error::Resolution(ResolutionError::UnknownDefinition { .. })
        ));
    }

    #[test]
    fn test_invalid_spec_not_registered() {
        let lib = Library::new();
        assert!(lib.add("bad", &FieldSpec::field("x", "NoSuchType")).is_err());
        assert!(!lib.contains("bad"));
    }

    #[test]
    fn test_build_from_source() {
        let lib = Library::new();
        lib.add("pair", &pair()).expect("add");
        let data = [3u8, b'a', b'b', b'c'];
        let tree = lib.build("pair", Some(&data as &dyn ByteSource)).expect("parse");
        assert_eq!(tree.get(tree.root(), "payload").expect("payload"), Value::Str("abc".into()));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_load_yaml_file_is_all_or_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("defs.yaml");
        std::fs::write(
            &path,
            "definitions:\n  good: { type: UInt8 }\n  bad: { type: Bogus }\n",
        )
        .expect("write");
        let lib = Library::new();
        assert!(lib.load_yaml_file(&path).is_err());
        assert!(lib.is_empty());

        std::fs::write(&path, "definitions:\n  good: { type: UInt8 }\n").expect("write");
        assert_eq!(lib.load_yaml_file(&path).expect("load"), vec!["good".to_string()]);
        assert!(lib.contains("good"));
    }
}
