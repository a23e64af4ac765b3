// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML definition loader.
//!
//! Describes [`FieldSpec`] trees in a human-friendly format. Keys are the
//! lower-case spec keys; a bare string where a meta value is expected is a
//! NodePath, and `{ fn: name }` binds a function registered through
//! [`crate::hooks::register_meta_fn`].
//!
//! # Example YAML
//!
//! ```yaml
//! # formats.yaml
//! definitions:
//!   pair:
//!     type: Container
//!     entries:
//!       - { name: len, type: UInt8 }
//!       - { name: payload, type: StrRawAscii, size: .len }
//!
//!   record:
//!     type: Container
//!     endian: ">"
//!     entries:
//!       - { name: kind, type: UInt8 }
//!       - name: body
//!         type: Switch
//!         case: .kind
//!         cases:
//!           - key: 1
//!             field: { include: pair }
//!         default_case: { name: raw, type: BytesRaw, size: 4 }
//! ```
//!
//! `include` names another definition of the same document.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{EnumOption, FieldSpec, Meta};
use crate::error::{Error, SchemaError, SchemaErrorKind};
use crate::hooks;
use crate::value::{CaseKey, Value};
use crate::Result;

/// YAML definition loader.
pub struct YamlLoader;

/// Root YAML document structure.
#[derive(Debug, Deserialize)]
pub struct YamlDefinitionDocument {
    /// Named definitions.
    #[serde(default)]
    pub definitions: HashMap<String, YamlField>,
}

/// A single field in YAML format. Every key is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlField {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub size: Option<YamlMeta>,
    pub sub_struct: Option<Box<YamlField>>,
    pub case: Option<YamlMeta>,
    pub cases: Option<Vec<YamlCase>>,
    pub default_case: Option<Box<YamlField>>,
    pub options: Vec<YamlOption>,
    pub decoder: Option<String>,
    pub encoder: Option<String>,
    pub align: Option<usize>,
    /// Id of another definition in the same document.
    pub include: Option<String>,
    pub default: Option<YamlScalar>,
    pub block_cls: Option<String>,
    pub endian: Option<String>,
    pub offset: Option<usize>,
    pub pointer: Option<YamlMeta>,
    pub carry_off: Option<bool>,
    pub steptree: Option<Box<YamlField>>,
    pub steptree_root: Option<bool>,
    pub entries: Vec<YamlField>,
}

/// Plain YAML scalar.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum YamlScalar {
    Bool(bool),
    UInt(u64),
    SInt(i64),
    Float(f64),
    Str(String),
}

impl From<YamlScalar> for Value {
    fn from(s: YamlScalar) -> Self {
        match s {
            YamlScalar::Bool(b) => Value::Bool(b),
            YamlScalar::UInt(n) => Value::UInt(n),
            YamlScalar::SInt(n) => Value::SInt(n),
            YamlScalar::Float(f) => Value::Float(f),
            YamlScalar::Str(s) => Value::Str(s),
        }
    }
}

/// Meta value: a number or bool literal, a NodePath string, or an explicit
/// mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum YamlMeta {
    Bool(bool),
    UInt(u64),
    SInt(i64),
    Float(f64),
    Path(String),
    Explicit(YamlMetaRef),
}

/// `{ path: .len }`, `{ fn: name }` or `{ literal: "text" }`.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlMetaRef {
    pub path: Option<String>,
    #[serde(rename = "fn")]
    pub func: Option<String>,
    pub literal: Option<YamlScalar>,
}

#[derive(Debug, Deserialize)]
pub struct YamlCase {
    pub key: YamlScalar,
    pub field: YamlField,
}

/// Enum/bool option: a bare name or `{ name, value }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum YamlOption {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        value: Option<YamlScalar>,
    },
}

fn malformed(path: &str, msg: String) -> Error {
    Error::Schema(vec![SchemaError {
        path: path.to_string(),
        kind: SchemaErrorKind::MalformedValue(msg),
    }])
}

impl YamlLoader {
    /// Load YAML definitions from file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<YamlDefinitionDocument> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
        let doc = Self::parse_yaml(&content).map_err(|e| match e {
            Error::Schema(mut errs) => {
                for err in &mut errs {
                    err.path = path.display().to_string();
                }
                Error::Schema(errs)
            }
            other => other,
        })?;
        log::debug!(
            "[yaml] {} definition(s) from {}",
            doc.definitions.len(),
            path.display()
        );
        Ok(doc)
    }

    /// Parse YAML content.
    pub fn parse_yaml(yaml_content: &str) -> Result<YamlDefinitionDocument> {
        serde_yaml::from_str(yaml_content)
            .map_err(|e| malformed("<yaml>", format!("failed to parse YAML: {}", e)))
    }

    /// Spec of definition `id`, with `include` references expanded.
    pub fn get_definition(doc: &YamlDefinitionDocument, id: &str) -> Result<FieldSpec> {
        let mut visiting = HashSet::new();
        Self::definition(doc, id, &mut visiting)
    }

    /// Every definition of the document, sorted by id.
    pub fn definitions(doc: &YamlDefinitionDocument) -> Result<Vec<(String, FieldSpec)>> {
        let mut ids: Vec<&String> = doc.definitions.keys().collect();
        ids.sort();
        ids.into_iter()
            .map(|id| Ok((id.clone(), Self::get_definition(doc, id)?)))
            .collect()
    }

    fn definition(
        doc: &YamlDefinitionDocument,
        id: &str,
        visiting: &mut HashSet<String>,
    ) -> Result<FieldSpec> {
        let field = doc
            .definitions
            .get(id)
            .ok_or_else(|| malformed(id, format!("definition '{}' not found", id)))?;
        if !visiting.insert(id.to_string()) {
            return Err(malformed(id, format!("include cycle through '{}'", id)));
        }
        let mut spec = Self::field_to_spec(doc, field, id, visiting)?;
        visiting.remove(id);
        if spec.name.is_none() {
            spec.name = Some(id.to_string());
        }
        Ok(spec)
    }

    fn field_to_spec(
        doc: &YamlDefinitionDocument,
        field: &YamlField,
        at: &str,
        visiting: &mut HashSet<String>,
    ) -> Result<FieldSpec> {
        let here = match &field.name {
            Some(name) => format!("{}.{}", at, name),
            None => at.to_string(),
        };
        let mut nested = |f: &YamlField| -> Result<Box<FieldSpec>> {
            Self::field_to_spec(doc, f, &here, visiting).map(Box::new)
        };
        let sub_struct = field.sub_struct.as_deref().map(&mut nested).transpose()?;
        let default_case = field.default_case.as_deref().map(&mut nested).transpose()?;
        let steptree = field.steptree.as_deref().map(&mut nested).transpose()?;
        let entries = field
            .entries
            .iter()
            .map(|f| nested(f).map(|b| *b))
            .collect::<Result<Vec<_>>>()?;
        let cases = match &field.cases {
            Some(cases) => {
                let mut out = Vec::with_capacity(cases.len());
                for case in cases {
                    let key = CaseKey::from_value(&Value::from(case.key.clone()))
                        .ok_or_else(|| malformed(&here, format!("bad case key {:?}", case.key)))?;
                    out.push((key, *nested(&case.field)?));
                }
                Some(out)
            }
            None => None,
        };
        let include = match &field.include {
            Some(id) => Some(Box::new(Self::definition(doc, id, visiting)?)),
            None => None,
        };

        Ok(FieldSpec {
            name: field.name.clone(),
            type_name: field.type_name.clone(),
            size: convert_meta(&here, field.size.as_ref())?,
            sub_struct,
            case: convert_meta(&here, field.case.as_ref())?,
            cases,
            default_case,
            options: field.options.iter().map(convert_option).collect(),
            decoder: field.decoder.clone(),
            encoder: field.encoder.clone(),
            align: field.align,
            include,
            default: field.default.clone().map(Value::from),
            block_cls: field.block_cls.clone(),
            endian: field.endian.clone(),
            offset: field.offset,
            pointer: convert_meta(&here, field.pointer.as_ref())?,
            carry_off: field.carry_off,
            steptree,
            steptree_root: field.steptree_root,
            entries,
        })
    }

    /// Load a file and return the spec of definition `id`.
    pub fn load_definition<P: AsRef<Path>>(path: P, id: &str) -> Result<FieldSpec> {
        let doc = Self::load_from_file(path)?;
        Self::get_definition(&doc, id)
    }
}

fn convert_meta(at: &str, meta: Option<&YamlMeta>) -> Result<Option<Meta>> {
    let Some(meta) = meta else {
        return Ok(None);
    };
    let meta = match meta {
        YamlMeta::Bool(b) => Meta::literal(*b),
        YamlMeta::UInt(n) => Meta::literal(*n),
        YamlMeta::SInt(n) => Meta::literal(*n),
        YamlMeta::Float(f) => Meta::literal(*f),
        YamlMeta::Path(p) => Meta::path(p.as_str()),
        YamlMeta::Explicit(r) => match (&r.path, &r.func, &r.literal) {
            (Some(p), None, None) => Meta::path(p.as_str()),
            (None, Some(name), None) => hooks::meta_fn(name)
                .ok_or_else(|| malformed(at, format!("no meta function named '{}'", name)))?,
            (None, None, Some(lit)) => Meta::Literal(lit.clone().into()),
            _ => {
                return Err(malformed(
                    at,
                    "meta mapping needs exactly one of path, fn, literal".to_string(),
                ))
            }
        },
    };
    Ok(Some(meta))
}

fn convert_option(opt: &YamlOption) -> EnumOption {
    match opt {
        YamlOption::Name(name) => EnumOption {
            name: name.clone(),
            value: None,
        },
        YamlOption::Full { name, value } => EnumOption {
            name: name.clone(),
            value: value.clone().map(Value::from),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
definitions:
  pair:
    type: Container
    entries:
      - { name: len, type: UInt8 }
      - { name: payload, type: StrRawAscii, size: .len }
"#;
        let doc = YamlLoader::parse_yaml(yaml).expect("valid YAML should parse");
        let spec = YamlLoader::get_definition(&doc, "pair").expect("definition should exist");
        assert_eq!(spec.name.as_deref(), Some("pair"));
        assert_eq!(spec.entries.len(), 2);
        assert_eq!(spec.entries[1].size, Some(Meta::path(".len")));
    }

    #[test]
    fn test_cases_options_and_literals() {
        let yaml = r#"
definitions:
  base:
    type: UInt16
    endian: ">"
  msg:
    type: Container
    entries:
      - name: mode
        type: UEnum8
        options: [off, { name: on, value: 5 }]
      - name: body
        type: Switch
        case: { path: .mode }
        cases:
          - key: 5
            field: { name: value, include: base }
          - key: "text"
            field: { name: s, type: StrAscii, size: { literal: 4 } }
"#;
        let doc = YamlLoader::parse_yaml(yaml).expect("parse");
        let spec = YamlLoader::get_definition(&doc, "msg").expect("msg");
        let mode = &spec.entries[0];
        assert_eq!(mode.options.len(), 2);
        assert_eq!(mode.options[1].value, Some(Value::UInt(5)));
        let cases = spec.entries[1].cases.as_ref().expect("cases");
        assert_eq!(cases[0].0, CaseKey::Int(5));
        assert_eq!(cases[1].0, CaseKey::Str("text".into()));
        let included = cases[0].1.include.as_ref().expect("include");
        assert_eq!(included.endian.as_deref(), Some(">"));
        assert_eq!(cases[1].1.size, Some(Meta::literal(4u64)));
    }

    #[test]
    fn test_include_cycle_rejected() {
        let yaml = r#"
definitions:
  a: { include: b }
  b: { include: a }
"#;
        let doc = YamlLoader::parse_yaml(yaml).expect("parse");
        assert!(YamlLoader::get_definition(&doc, "a").is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let yaml = "definitions:\n  x: { type: UInt8, sizee: 4 }\n";
        let err = YamlLoader::parse_yaml(yaml).expect_err("typo");
        assert!(matches!(
            err.schema_errors()[0].kind,
            SchemaErrorKind::MalformedValue(_)
        ));
    }

    #[test]
    fn test_definition_not_found() {
        let doc = YamlLoader::parse_yaml("definitions: {}").expect("parse");
        assert!(YamlLoader::get_definition(&doc, "missing").is_err());
    }
}
