//! `OpenAPI` tool source runtime.
//!
//! Converts `OpenAPI` operations into MCP tools and executes them as backend HTTP requests on
//! behalf of a [`BackendTarget`].

use crate::config::{OpenApiSourceConfig, OperationFilter};
use crate::error::{OpenApiToolsError, Result};
use crate::request::{ParamLocation, QuerySerialization, ToolParameter, build_request};
use crate::resolver::{DocId, OpenApiResolver};
use crate::schema::{SchemaConverter, is_object_schema};
use ontoportal_http_tools::backend::{BackendClient, BackendResponse, BackendTarget};
use openapiv3::{
    OpenAPI, Operation, Parameter, ParameterSchemaOrContent, PathItem, ReferenceOr, RequestBody,
    Response, SchemaKind, StatusCode, Type,
};
use regex::Regex;
use reqwest::Method;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool, ToolAnnotations};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

/// Longest error body echoed back into a tool error message.
const MAX_ERROR_BODY_CHARS: usize = 2_000;

static PATH_TEMPLATE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("valid regex"));
static NON_IDENT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("valid regex"));

/// `OpenAPI` tool source exposing backend endpoints as MCP tools.
#[derive(Clone)]
pub struct OpenApiToolSource {
    spec_location: String,
    title: String,
    version: String,
    servers: Vec<String>,
    tools: Arc<Vec<GeneratedTool>>,
    client: BackendClient,
}

#[derive(Debug, Clone)]
struct GeneratedTool {
    name: String,
    description: String,
    method: Method,
    /// Path template, e.g. `/ontologies/{acronym}`.
    path: String,
    parameters: Vec<ToolParameter>,
    input_schema: Arc<JsonObject>,
    output_schema: Option<Arc<JsonObject>>,
}

struct OperationContext<'a> {
    doc: &'a DocId,
    path: &'a str,
    method: &'static str,
    path_item_params: &'a [ReferenceOr<Parameter>],
    operation: &'a Operation,
}

impl OpenApiToolSource {
    /// Load the spec file named by `config` and derive its tools.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid `OpenAPI` 3 document.
    /// Individual operations that cannot be converted are skipped with a warning.
    pub fn load(config: &OpenApiSourceConfig, client: BackendClient) -> Result<Self> {
        tracing::info!(spec = %config.spec, "loading OpenAPI spec");
        let content = std::fs::read_to_string(&config.spec).map_err(|e| {
            OpenApiToolsError::OpenApiSpecReadFile {
                path: config.spec.clone(),
                source: e,
            }
        })?;
        let spec: OpenAPI =
            serde_yaml::from_str(&content).map_err(|e| OpenApiToolsError::OpenApiSpecParse {
                location: config.spec.clone(),
                source: e,
            })?;

        Self::from_spec(
            &spec,
            DocId::file(&config.spec),
            &config.spec,
            &config.operations,
            client,
        )
    }

    /// Derive tools from an already-parsed document. `root_doc` anchors relative file `$ref`s.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be prepared for `$ref` resolution.
    pub fn from_spec(
        spec: &OpenAPI,
        root_doc: DocId,
        spec_location: &str,
        filter: &OperationFilter,
        client: BackendClient,
    ) -> Result<Self> {
        let tools = discover_tools(spec, root_doc, filter)?;
        if tools.is_empty() {
            tracing::warn!(spec = %spec_location, "OpenAPI spec produced no tools");
        } else {
            tracing::info!(spec = %spec_location, tools = tools.len(), "discovered OpenAPI tools");
        }

        Ok(Self {
            spec_location: spec_location.to_string(),
            title: spec.info.title.clone(),
            version: spec.info.version.clone(),
            servers: spec.servers.iter().map(|s| s.url.clone()).collect(),
            tools: Arc::new(tools),
            client,
        })
    }

    #[must_use]
    pub fn spec_location(&self) -> &str {
        &self.spec_location
    }

    #[must_use]
    pub fn spec_title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn spec_version(&self) -> &str {
        &self.version
    }

    /// `servers[].url` entries from the document (informational; calls use the backend target).
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    #[must_use]
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    /// The MCP `Tool`s exposed by this source, in document order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|t| {
                let mut tool = Tool::new(
                    t.name.clone(),
                    t.description.clone(),
                    Arc::clone(&t.input_schema),
                );
                tool.output_schema.clone_from(&t.output_schema);
                tool.annotations = Some(annotations_for(&t.method));
                tool
            })
            .collect()
    }

    /// Execute a tool call against `target`.
    ///
    /// A 2xx JSON object body is returned both as text and as structured content.
    ///
    /// # Errors
    ///
    /// - [`OpenApiToolsError::UnknownTool`] if no tool has this name
    /// - [`OpenApiToolsError::InvalidArguments`] if required arguments are missing
    /// - [`OpenApiToolsError::Config`] if the target's base URL is unusable
    /// - [`OpenApiToolsError::Request`] on transport failures
    /// - [`OpenApiToolsError::BackendAuth`] / [`OpenApiToolsError::BackendStatus`] on non-2xx
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
        target: &BackendTarget,
    ) -> Result<CallToolResult> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| OpenApiToolsError::UnknownTool(name.to_string()))?;

        let arguments = arguments.unwrap_or_default();
        let request = build_request(&tool.method, &tool.path, &tool.parameters, &arguments)?;
        let response = self.client.send(request, target).await?;

        if response.status.is_success() {
            Ok(success_result(&response))
        } else {
            Err(status_error(&response))
        }
    }
}

fn success_result(response: &BackendResponse) -> CallToolResult {
    match response.json() {
        Some(Value::Object(body)) => {
            let text = serde_json::to_string(&body).unwrap_or_else(|_| response.text());
            CallToolResult {
                content: vec![Content::text(text)],
                structured_content: Some(Value::Object(body)),
                is_error: Some(false),
                meta: None,
            }
        }
        Some(other) if response.is_json() => {
            CallToolResult::success(vec![Content::text(other.to_string())])
        }
        _ => CallToolResult::success(vec![Content::text(response.text())]),
    }
}

fn status_error(response: &BackendResponse) -> OpenApiToolsError {
    let status = response.status.as_u16();
    let reason = response
        .status
        .canonical_reason()
        .unwrap_or("Unknown")
        .to_string();
    let mut body = response.text();
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        body = body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>() + "...";
    }

    if matches!(status, 401 | 403) {
        OpenApiToolsError::BackendAuth {
            status,
            reason,
            body,
        }
    } else {
        OpenApiToolsError::BackendStatus {
            status,
            reason,
            body,
        }
    }
}

fn discover_tools(
    spec: &OpenAPI,
    root_doc: DocId,
    filter: &OperationFilter,
) -> Result<Vec<GeneratedTool>> {
    let resolver = OpenApiResolver::new(root_doc, spec)?;
    let converter = SchemaConverter::new(&resolver);
    let mut names: HashSet<String> = HashSet::new();
    let mut tools = Vec::new();

    for (path, item) in &spec.paths.paths {
        let (doc, item): (DocId, PathItem) = match resolver.resolve(resolver.root_doc(), item) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "skipping path");
                continue;
            }
        };

        let methods = [
            ("get", item.get.as_ref()),
            ("post", item.post.as_ref()),
            ("put", item.put.as_ref()),
            ("delete", item.delete.as_ref()),
            ("patch", item.patch.as_ref()),
        ];
        for (method, operation) in methods {
            let Some(operation) = operation else {
                continue;
            };
            if !filter.allows(method, path) {
                tracing::debug!(method = %method, path = %path, "operation filtered out");
                continue;
            }

            let ctx = OperationContext {
                doc: &doc,
                path,
                method,
                path_item_params: &item.parameters,
                operation,
            };
            match generate_tool(&resolver, &converter, &ctx, &mut names) {
                Ok(tool) => tools.push(tool),
                Err(e) => tracing::warn!(
                    method = %method.to_uppercase(),
                    path = %path,
                    error = %e,
                    "skipping operation"
                ),
            }
        }
    }

    Ok(tools)
}

fn generate_tool(
    resolver: &OpenApiResolver,
    converter: &SchemaConverter<'_>,
    ctx: &OperationContext<'_>,
    names: &mut HashSet<String>,
) -> Result<GeneratedTool> {
    let method: Method = ctx
        .method
        .to_uppercase()
        .parse()
        .map_err(|_| OpenApiToolsError::OpenApi(format!("unsupported method {}", ctx.method)))?;

    let mut parameters = Vec::new();
    for (doc, param) in merge_parameters(resolver, ctx)? {
        if let Some(p) = tool_parameter(converter, &doc, &param, ctx) {
            parameters.push(p);
        }
    }
    if let Some(body) = &ctx.operation.request_body {
        parameters.extend(body_parameters(resolver, converter, ctx.doc, body)?);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for p in &parameters {
        if !seen.insert(p.name.as_str()) {
            return Err(OpenApiToolsError::ParamCollision(format!(
                "argument '{}' appears more than once in {} {}",
                p.name,
                ctx.method.to_uppercase(),
                ctx.path
            )));
        }
    }

    let base_name = ctx
        .operation
        .operation_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| canonical_tool_name(ctx.method, ctx.path));
    let name = reserve_unique_name(names, &base_name);
    if name != base_name {
        tracing::warn!(tool = %base_name, renamed = %name, "duplicate tool name");
    }

    let description = ctx
        .operation
        .summary
        .clone()
        .or_else(|| ctx.operation.description.clone())
        .unwrap_or_else(|| format!("Calls {} {}", ctx.method.to_uppercase(), ctx.path));

    let output_schema = response_schema(resolver, converter, ctx)?
        .filter(is_object_schema)
        .and_then(|v| v.as_object().cloned())
        .map(Arc::new);

    Ok(GeneratedTool {
        name,
        description,
        method,
        path: ctx.path.to_string(),
        input_schema: Arc::new(input_schema(&parameters)),
        parameters,
        output_schema,
    })
}

/// Path-item parameters overridden by operation parameters with the same location and name.
fn merge_parameters(
    resolver: &OpenApiResolver,
    ctx: &OperationContext<'_>,
) -> Result<Vec<(DocId, Parameter)>> {
    let mut merged: Vec<(DocId, Parameter)> = Vec::new();
    let mut index: HashMap<(&'static str, String), usize> = HashMap::new();

    for p in ctx.path_item_params.iter().chain(&ctx.operation.parameters) {
        let (doc, param) = resolver.resolve(ctx.doc, p)?;
        let key = (location_key(&param), param.parameter_data_ref().name.clone());
        match index.get(&key) {
            Some(&i) => merged[i] = (doc, param),
            None => {
                index.insert(key, merged.len());
                merged.push((doc, param));
            }
        }
    }
    Ok(merged)
}

fn location_key(p: &Parameter) -> &'static str {
    match p {
        Parameter::Path { .. } => "path",
        Parameter::Query { .. } => "query",
        Parameter::Header { .. } => "header",
        Parameter::Cookie { .. } => "cookie",
    }
}

fn tool_parameter(
    converter: &SchemaConverter<'_>,
    doc: &DocId,
    param: &Parameter,
    ctx: &OperationContext<'_>,
) -> Option<ToolParameter> {
    let data = param.parameter_data_ref();
    let (location, required, query) = match param {
        Parameter::Path { .. } => (ParamLocation::Path, true, None),
        Parameter::Query {
            style,
            allow_reserved,
            allow_empty_value,
            ..
        } => (
            ParamLocation::Query,
            data.required,
            Some(QuerySerialization::new(
                style.clone(),
                data.explode,
                *allow_reserved,
                allow_empty_value.unwrap_or(false),
            )),
        ),
        Parameter::Header { .. } => (ParamLocation::Header, data.required, None),
        Parameter::Cookie { .. } => {
            tracing::warn!(
                parameter = %data.name,
                method = %ctx.method.to_uppercase(),
                path = %ctx.path,
                "cookie parameters are not supported; skipping"
            );
            return None;
        }
    };

    let mut schema = match &data.format {
        ParameterSchemaOrContent::Schema(s) => converter.convert_ref(doc, s),
        ParameterSchemaOrContent::Content(_) => json!({"type": "string"}),
    };
    if let (Some(obj), Some(desc)) = (schema.as_object_mut(), &data.description) {
        obj.entry("description")
            .or_insert_with(|| Value::String(desc.clone()));
    }

    Some(ToolParameter {
        name: data.name.clone(),
        location,
        required,
        schema,
        query,
        whole_body: false,
    })
}

/// JSON request bodies: object properties become individual arguments, anything else becomes a
/// single `body` argument.
fn body_parameters(
    resolver: &OpenApiResolver,
    converter: &SchemaConverter<'_>,
    doc: &DocId,
    body: &ReferenceOr<RequestBody>,
) -> Result<Vec<ToolParameter>> {
    let (body_doc, body) = resolver.resolve(doc, body)?;
    let Some(schema_ref) = body
        .content
        .iter()
        .find(|(ct, _)| is_json_media_type(ct))
        .and_then(|(_, media)| media.schema.as_ref())
    else {
        return Ok(Vec::new());
    };
    let (schema_doc, schema) = resolver.resolve(&body_doc, schema_ref)?;

    if let SchemaKind::Type(Type::Object(obj)) = &schema.schema_kind
        && !obj.properties.is_empty()
    {
        return Ok(obj
            .properties
            .iter()
            .map(|(name, prop)| ToolParameter {
                name: name.clone(),
                location: ParamLocation::Body,
                required: body.required && obj.required.contains(name),
                schema: converter.convert_property(&schema_doc, prop),
                query: None,
                whole_body: false,
            })
            .collect());
    }

    Ok(vec![ToolParameter {
        name: "body".to_string(),
        location: ParamLocation::Body,
        required: body.required,
        schema: converter.convert(&schema_doc, &schema),
        query: None,
        whole_body: true,
    }])
}

/// Converted JSON schema of the lowest explicit 2xx response (or the `2XX` range).
fn response_schema(
    resolver: &OpenApiResolver,
    converter: &SchemaConverter<'_>,
    ctx: &OperationContext<'_>,
) -> Result<Option<Value>> {
    let responses = &ctx.operation.responses.responses;
    let explicit = responses
        .iter()
        .filter_map(|(code, r)| match code {
            StatusCode::Code(n) if (200..300).contains(n) => Some((*n, r)),
            _ => None,
        })
        .min_by_key(|(n, _)| *n)
        .map(|(_, r)| r);
    let range = responses.iter().find_map(|(code, r)| match code {
        StatusCode::Range(2) => Some(r),
        _ => None,
    });
    let Some(response_ref) = explicit.or(range) else {
        return Ok(None);
    };

    let (doc, response): (DocId, Response) = resolver.resolve(ctx.doc, response_ref)?;
    Ok(response
        .content
        .iter()
        .find(|(ct, _)| is_json_media_type(ct))
        .and_then(|(_, media)| media.schema.as_ref())
        .map(|s| converter.convert_ref(&doc, s)))
}

fn is_json_media_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct == "application/json" || ct.ends_with("+json") || ct.starts_with("application/json;")
}

fn input_schema(parameters: &[ToolParameter]) -> JsonObject {
    let properties: Map<String, Value> = parameters
        .iter()
        .map(|p| (p.name.clone(), p.schema.clone()))
        .collect();
    let required: Vec<&str> = parameters
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    let mut schema = JsonObject::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    schema
}

/// `get` + `/ontologies/{acronym}/classes` -> `get_ontologies_acronym_classes`.
fn canonical_tool_name(method: &str, path: &str) -> String {
    let raw = format!("{}_{}", method.to_lowercase(), path);
    let raw = PATH_TEMPLATE_PARAM.replace_all(&raw, "_${1}");
    let mut name = NON_IDENT_RUN
        .replace_all(&raw, "_")
        .trim_matches('_')
        .to_string();
    name.truncate(64);
    name
}

fn reserve_unique_name(names: &mut HashSet<String>, base: &str) -> String {
    if names.insert(base.to_string()) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| names.insert(candidate.clone()))
        .unwrap_or_else(|| base.to_string())
}

/// MCP tool hints from HTTP method semantics. Every backend tool talks to an external system.
fn annotations_for(method: &Method) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match method.as_str() {
        "GET" | "HEAD" | "OPTIONS" => (Some(true), Some(false), Some(true)),
        "POST" => (Some(false), Some(false), Some(false)),
        "PUT" | "DELETE" => (Some(false), Some(true), Some(true)),
        "PATCH" => (Some(false), Some(true), None),
        _ => (None, None, None),
    };
    ToolAnnotations {
        title: None,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}
