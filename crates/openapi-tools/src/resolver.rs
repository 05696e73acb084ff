//! `OpenAPI` `$ref` resolution.
//!
//! `openapiv3` keeps `$ref`s as `ReferenceOr::Reference`; this resolver follows them. Supported:
//! - local refs (`#/components/...`)
//! - refs into sibling files (`common.yaml#/components/...`), resolved relative to the document
//!   that contains the `$ref`
//!
//! Remote (`http(s)://`) documents are not fetched.

use crate::error::{OpenApiToolsError, Result};
use openapiv3::{OpenAPI, ReferenceOr};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of a document participating in `$ref` resolution (a file on disk).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocId(PathBuf);

impl DocId {
    #[must_use]
    pub fn file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }

    fn sibling(&self, relative: &str) -> Self {
        let rel = Path::new(relative);
        if rel.is_absolute() {
            return Self::file(rel);
        }
        let dir = self.0.parent().unwrap_or_else(|| Path::new("."));
        Self::file(dir.join(rel))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[derive(Debug)]
pub struct OpenApiResolver {
    root_doc: DocId,
    docs: RefCell<HashMap<DocId, Arc<Value>>>,
}

impl OpenApiResolver {
    /// Create a resolver rooted at an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be converted to JSON for pointer lookups.
    pub fn new(root_doc: DocId, spec: &OpenAPI) -> Result<Self> {
        let root = serde_json::to_value(spec).map_err(|e| OpenApiToolsError::OpenApi(e.to_string()))?;
        let mut docs = HashMap::new();
        docs.insert(root_doc.clone(), Arc::new(root));
        Ok(Self {
            root_doc,
            docs: RefCell::new(docs),
        })
    }

    #[must_use]
    pub fn root_doc(&self) -> &DocId {
        &self.root_doc
    }

    /// Follow `$ref`s until an inline item is reached.
    ///
    /// Returns the item and the document it was found in (nested refs inside the item are
    /// relative to that document).
    ///
    /// # Errors
    ///
    /// Returns an error on cyclic refs, unsupported ref syntax, unreadable documents, or if the
    /// referenced value does not deserialize as `T`.
    pub fn resolve<T>(&self, current_doc: &DocId, item: &ReferenceOr<T>) -> Result<(DocId, T)>
    where
        T: Clone + DeserializeOwned,
    {
        let mut seen: HashSet<(DocId, String)> = HashSet::new();
        let mut doc = current_doc.clone();
        let mut cur = item.clone();

        loop {
            let reference = match cur {
                ReferenceOr::Item(found) => return Ok((doc, found)),
                ReferenceOr::Reference { reference } => reference,
            };

            let (target_doc, pointer) = Self::split_ref(&doc, &reference)?;
            if !seen.insert((target_doc.clone(), pointer.clone())) {
                return Err(OpenApiToolsError::OpenApi(format!(
                    "Cyclic $ref detected while resolving: {reference}"
                )));
            }

            let root = self.load(&target_doc)?;
            let value = if pointer.is_empty() {
                (*root).clone()
            } else {
                root.pointer(&pointer).cloned().ok_or_else(|| {
                    OpenApiToolsError::OpenApi(format!(
                        "Unresolved $ref '{reference}' (doc {}, missing pointer '{pointer}')",
                        target_doc.path().display()
                    ))
                })?
            };

            cur = serde_json::from_value(value).map_err(|e| {
                OpenApiToolsError::OpenApi(format!(
                    "Referenced value '{reference}' has an unexpected shape: {e}"
                ))
            })?;
            doc = target_doc;
        }
    }

    fn split_ref(current_doc: &DocId, reference: &str) -> Result<(DocId, String)> {
        let (doc_part, fragment) = reference.split_once('#').unwrap_or((reference, ""));

        if doc_part.starts_with("http://") || doc_part.starts_with("https://") {
            return Err(OpenApiToolsError::OpenApi(format!(
                "Remote $ref is not supported: {reference}"
            )));
        }
        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(OpenApiToolsError::OpenApi(format!(
                "Unsupported $ref fragment (expected JSON pointer starting with '/'): {reference}"
            )));
        }

        let target = if doc_part.is_empty() {
            current_doc.clone()
        } else {
            current_doc.sibling(doc_part.strip_prefix("file://").unwrap_or(doc_part))
        };
        Ok((target, fragment.to_string()))
    }

    fn load(&self, doc: &DocId) -> Result<Arc<Value>> {
        if let Some(v) = self.docs.borrow().get(doc) {
            return Ok(Arc::clone(v));
        }

        let content = std::fs::read_to_string(doc.path()).map_err(|e| {
            OpenApiToolsError::OpenApi(format!(
                "Failed to read referenced file {}: {e}",
                doc.path().display()
            ))
        })?;
        // JSON is a subset of YAML.
        let parsed: Value = serde_yaml::from_str(&content).map_err(|e| {
            OpenApiToolsError::OpenApi(format!(
                "Failed to parse referenced document {}: {e}",
                doc.path().display()
            ))
        })?;

        let parsed = Arc::new(parsed);
        self.docs
            .borrow_mut()
            .insert(doc.clone(), Arc::clone(&parsed));
        Ok(parsed)
    }
}
