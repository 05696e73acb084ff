//! `OpenAPI` schema -> JSON Schema conversion for tool input/output schemas.

use crate::resolver::{DocId, OpenApiResolver};
use openapiv3::{ReferenceOr, Schema, SchemaKind, Type};
use serde_json::{Map, Value, json};

/// How deep nested `$ref`s are inlined before falling back to a bare `$ref`.
const MAX_INLINE_DEPTH: usize = 6;

pub(crate) struct SchemaConverter<'a> {
    resolver: &'a OpenApiResolver,
}

impl<'a> SchemaConverter<'a> {
    pub(crate) fn new(resolver: &'a OpenApiResolver) -> Self {
        Self { resolver }
    }

    pub(crate) fn convert_ref(&self, doc: &DocId, schema: &ReferenceOr<Schema>) -> Value {
        self.convert_ref_at(doc, schema, 0)
    }

    pub(crate) fn convert(&self, doc: &DocId, schema: &Schema) -> Value {
        self.convert_at(doc, schema, 0)
    }

    /// Object properties and array items are stored boxed by `openapiv3`.
    pub(crate) fn convert_property(&self, doc: &DocId, schema: &ReferenceOr<Box<Schema>>) -> Value {
        self.convert_boxed(doc, schema, 0)
    }

    fn convert_ref_at(&self, doc: &DocId, schema: &ReferenceOr<Schema>, depth: usize) -> Value {
        match schema {
            ReferenceOr::Item(s) => self.convert_at(doc, s, depth),
            ReferenceOr::Reference { reference } if depth >= MAX_INLINE_DEPTH => {
                json!({ "$ref": reference })
            }
            ReferenceOr::Reference { reference } => {
                match self.resolver.resolve(doc, schema) {
                    Ok((target_doc, s)) => self.convert_at(&target_doc, &s, depth + 1),
                    Err(e) => {
                        tracing::debug!(reference = %reference, error = %e, "keeping unresolved schema ref");
                        json!({ "$ref": reference })
                    }
                }
            }
        }
    }

    fn convert_boxed(&self, doc: &DocId, schema: &ReferenceOr<Box<Schema>>, depth: usize) -> Value {
        match schema {
            ReferenceOr::Item(s) => self.convert_at(doc, s, depth),
            ReferenceOr::Reference { reference } => self.convert_ref_at(
                doc,
                &ReferenceOr::Reference {
                    reference: reference.clone(),
                },
                depth,
            ),
        }
    }

    fn convert_at(&self, doc: &DocId, schema: &Schema, depth: usize) -> Value {
        let mut out = Map::new();
        let data = &schema.schema_data;
        if let Some(desc) = &data.description {
            out.insert("description".into(), json!(desc));
        }
        if let Some(default) = &data.default {
            out.insert("default".into(), default.clone());
        }

        match &schema.schema_kind {
            SchemaKind::Type(Type::String(s)) => {
                out.insert("type".into(), json!("string"));
                let values: Vec<&String> = s.enumeration.iter().flatten().collect();
                if !values.is_empty() {
                    out.insert("enum".into(), json!(values));
                }
            }
            SchemaKind::Type(Type::Number(_)) => {
                out.insert("type".into(), json!("number"));
            }
            SchemaKind::Type(Type::Integer(_)) => {
                out.insert("type".into(), json!("integer"));
            }
            SchemaKind::Type(Type::Boolean(_)) => {
                out.insert("type".into(), json!("boolean"));
            }
            SchemaKind::Type(Type::Array(a)) => {
                out.insert("type".into(), json!("array"));
                if let Some(items) = &a.items {
                    out.insert("items".into(), self.convert_boxed(doc, items, depth));
                }
            }
            SchemaKind::Type(Type::Object(o)) => {
                out.insert("type".into(), json!("object"));
                if !o.properties.is_empty() {
                    let props: Map<String, Value> = o
                        .properties
                        .iter()
                        .map(|(name, prop)| (name.clone(), self.convert_boxed(doc, prop, depth)))
                        .collect();
                    out.insert("properties".into(), Value::Object(props));
                }
                if !o.required.is_empty() {
                    out.insert("required".into(), json!(o.required));
                }
            }
            SchemaKind::AllOf { all_of } => {
                out.insert("allOf".into(), self.convert_list(doc, all_of, depth));
            }
            SchemaKind::OneOf { one_of } => {
                out.insert("oneOf".into(), self.convert_list(doc, one_of, depth));
            }
            SchemaKind::AnyOf { any_of } => {
                out.insert("anyOf".into(), self.convert_list(doc, any_of, depth));
            }
            SchemaKind::Not { .. } | SchemaKind::Any(_) => {}
        }

        Value::Object(out)
    }

    fn convert_list(&self, doc: &DocId, list: &[ReferenceOr<Schema>], depth: usize) -> Value {
        Value::Array(
            list.iter()
                .map(|s| self.convert_ref_at(doc, s, depth))
                .collect(),
        )
    }
}

/// `true` if a converted schema describes a JSON object.
pub(crate) fn is_object_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use openapiv3::OpenAPI;

    const SPEC: &str = r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
components:
  schemas:
    Page:
      type: object
      required: [collection]
      properties:
        totalCount: { type: integer }
        collection:
          type: array
          items:
            $ref: '#/components/schemas/Term'
    Term:
      type: object
      properties:
        prefLabel: { type: string, description: Preferred label }
        obsolete: { type: boolean, default: false }
    Node:
      type: object
      properties:
        child:
          $ref: '#/components/schemas/Node'
paths: {}
"#;

    fn with_converter(f: impl FnOnce(&SchemaConverter<'_>, &DocId)) {
        let spec: OpenAPI = serde_yaml::from_str(SPEC).unwrap();
        let resolver = OpenApiResolver::new(DocId::file("inline.yaml"), &spec).unwrap();
        let converter = SchemaConverter::new(&resolver);
        f(&converter, resolver.root_doc());
    }

    #[test]
    fn inlines_nested_component_refs() {
        with_converter(|c, doc| {
            let v = c.convert_ref(doc, &ReferenceOr::ref_("#/components/schemas/Page"));
            assert!(is_object_schema(&v));
            assert_eq!(v["required"], json!(["collection"]));
            let item = &v["properties"]["collection"]["items"];
            assert_eq!(item["type"], "object");
            assert_eq!(item["properties"]["prefLabel"]["description"], "Preferred label");
            assert_eq!(item["properties"]["obsolete"]["default"], false);
        });
    }

    #[test]
    fn recursive_refs_stop_at_depth_limit() {
        with_converter(|c, doc| {
            let v = c.convert_ref(doc, &ReferenceOr::ref_("#/components/schemas/Node"));
            let mut cur = &v;
            let mut levels = 0;
            while let Some(next) = cur.get("properties").and_then(|p| p.get("child")) {
                cur = next;
                levels += 1;
            }
            assert_eq!(cur["$ref"], "#/components/schemas/Node");
            assert_eq!(levels, MAX_INLINE_DEPTH);
        });
    }
}
