//! Reference resolution - replaces `#/components/...` markers with their targets.
//!
//! Registry entries are resolved once into an arena keyed by category and
//! name. Every marker that resolves is replaced by a clone of the arena's
//! [`Arc`], so all occurrences of a component share one allocation. Subtrees
//! without markers keep the identity they had in the input document.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{MarkerError, ResolveError};
use crate::model::{
    marker, AdditionalProperties, Callback, Components, Header, MediaType, OpenApi, Operation,
    Parameter, PathItem, RequestBody, Response, Schema, SecurityScheme,
};
use crate::types::{escape_pointer, Category, Marker, ResolveOptions};

/// Why a marker was left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No registry entry with that name.
    NotFound,
    /// Points outside `#/components/`.
    External,
    Malformed,
    UnknownCategory,
    /// Category does not match the kind of node carrying the marker.
    CategoryMismatch,
    /// Entry refers back to itself through nested content.
    ///
    /// Which marker stays depends on the order entries are visited. When an
    /// entry is an alias of a recursive one (`A: {$ref: B}` with `B` pointing
    /// back at `A`), resolving the output again inlines one more level before
    /// the marker reappears.
    Recursive,
    /// Target exists but is itself unresolved.
    BrokenChain,
    /// Markers on path items are not resolved.
    PathItem,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnresolvedReason::NotFound => "target not found",
            UnresolvedReason::External => "not a #/components reference",
            UnresolvedReason::Malformed => "malformed reference",
            UnresolvedReason::UnknownCategory => "unknown component category",
            UnresolvedReason::CategoryMismatch => "wrong component category for this node",
            UnresolvedReason::Recursive => "recursive reference",
            UnresolvedReason::BrokenChain => "target is itself unresolved",
            UnresolvedReason::PathItem => "path item references are not supported",
        };
        f.write_str(text)
    }
}

impl From<&MarkerError> for UnresolvedReason {
    fn from(err: &MarkerError) -> Self {
        match err {
            MarkerError::NotLocal { .. } => UnresolvedReason::External,
            MarkerError::Malformed { .. } => UnresolvedReason::Malformed,
            MarkerError::UnknownCategory { .. } => UnresolvedReason::UnknownCategory,
        }
    }
}

/// A marker the resolver left in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRef {
    /// JSON Pointer to the node carrying the marker.
    pub location: String,
    pub marker: String,
    pub reason: UnresolvedReason,
}

impl fmt::Display for UnresolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.location, self.marker, self.reason)
    }
}

/// Output of [`resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub document: OpenApi,
    /// Markers left in `document`, in discovery order.
    pub unresolved: Vec<UnresolvedRef>,
}

impl Resolution {
    /// Returns true if every marker was replaced.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Resolve every `#/components/...` marker reachable from the document.
///
/// The input document is not modified. Markers that cannot be resolved are
/// left in place, logged, and listed in [`Resolution::unresolved`].
///
/// # Errors
///
/// Returns `ResolveError::PathRef` if a route entry carries a marker,
/// `ResolveError::CircularReference` if a chain of markers loops without
/// reaching a concrete node, and `ResolveError::Unresolved` when
/// `options.deny_unresolved` is set and anything was left unresolved.
pub fn resolve(document: &OpenApi, options: &ResolveOptions) -> Result<Resolution, ResolveError> {
    debug!(paths = document.paths.len(), "resolving document");

    let mut resolver = Resolver::new(document.components.as_ref());
    let components = resolver.resolve_components()?;
    let paths = resolver.resolve_paths(&document.paths)?;
    let unresolved = resolver.unresolved;

    debug!(unresolved = unresolved.len(), "resolution finished");

    if options.deny_unresolved && !unresolved.is_empty() {
        return Err(ResolveError::Unresolved { refs: unresolved });
    }

    Ok(Resolution {
        document: OpenApi {
            openapi: document.openapi.clone(),
            info: document.info.clone(),
            external_docs: document.external_docs.clone(),
            servers: document.servers.clone(),
            tags: document.tags.clone(),
            paths,
            components,
        },
        unresolved,
    })
}

/// Find every `$ref` left anywhere in a document.
///
/// Returns `(location, marker)` pairs, locations as JSON Pointers.
pub fn residual_markers(document: &OpenApi) -> Result<Vec<(String, String)>, ResolveError> {
    let value =
        serde_json::to_value(document).map_err(|source| ResolveError::Serialize { source })?;
    let mut found = Vec::new();
    collect_markers(&value, "", &mut found);
    Ok(found)
}

fn collect_markers(value: &Value, path: &str, found: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(r)) = map.get("$ref") {
                if !r.is_empty() {
                    found.push((path.to_string(), r.clone()));
                }
            }
            for (key, child) in map {
                let child_path = format!("{}/{}", path, escape_pointer(key));
                collect_markers(child, &child_path, found);
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                collect_markers(item, &format!("{}/{}", path, i), found);
            }
        }
        _ => {}
    }
}

// --- Internal implementation ---

/// A node kind that lives in one registry category.
trait Component: Clone {
    const CATEGORY: Category;

    fn reference(&self) -> Option<&str>;

    fn registry(components: &Components) -> &IndexMap<String, Arc<Self>>;

    fn registry_mut(components: &mut Components) -> &mut IndexMap<String, Arc<Self>>;

    /// Resolve nested nodes in place. Returns true if anything changed.
    fn resolve_children(
        &mut self,
        resolver: &mut Resolver<'_>,
        path: &str,
    ) -> Result<bool, ResolveError>;
}

struct Resolver<'a> {
    source: Option<&'a Components>,
    /// Resolved entries of the six categories.
    arena: Components,
    /// Entries currently being resolved.
    stack: Vec<(Category, String)>,
    /// Stack index where the current pure marker chain begins.
    chain_start: usize,
    unresolved: Vec<UnresolvedRef>,
}

impl<'a> Resolver<'a> {
    fn new(source: Option<&'a Components>) -> Self {
        Self {
            source,
            arena: Components::default(),
            stack: Vec::new(),
            chain_start: 0,
            unresolved: Vec::new(),
        }
    }

    fn resolve_components(&mut self) -> Result<Option<Components>, ResolveError> {
        let Some(source) = self.source else {
            return Ok(None);
        };

        Ok(Some(Components {
            schemas: self.resolve_category(source)?,
            responses: self.resolve_category(source)?,
            parameters: self.resolve_category(source)?,
            request_bodies: self.resolve_category(source)?,
            headers: self.resolve_category(source)?,
            security_schemes: self.resolve_category(source)?,
            examples: source.examples.clone(),
            links: source.links.clone(),
            callbacks: source.callbacks.clone(),
        }))
    }

    fn resolve_category<T: Component>(
        &mut self,
        source: &'a Components,
    ) -> Result<IndexMap<String, Arc<T>>, ResolveError> {
        let entries = T::registry(source);
        let mut resolved = IndexMap::with_capacity(entries.len());
        for name in entries.keys() {
            if let Some(entry) = self.entry::<T>(name)? {
                resolved.insert(name.clone(), entry);
            }
        }
        Ok(resolved)
    }

    fn resolve_paths(
        &mut self,
        paths: &IndexMap<String, PathItem>,
    ) -> Result<IndexMap<String, PathItem>, ResolveError> {
        let mut resolved = IndexMap::with_capacity(paths.len());
        for (route, item) in paths {
            if let Some(marker) = marker(&item.reference) {
                return Err(path_ref_error(route, marker));
            }
            let path = format!("/paths/{}", escape_pointer(route));
            resolved.insert(route.clone(), self.resolve_path_item(item, &path)?);
        }
        Ok(resolved)
    }

    fn resolve_path_item(&mut self, item: &PathItem, path: &str) -> Result<PathItem, ResolveError> {
        let mut resolved = item.clone();
        for (method, slot) in resolved.operations_mut() {
            if let Some(operation) = slot.as_mut() {
                *operation = self.resolve_operation(operation, &format!("{}/{}", path, method))?;
            }
        }
        self.resolve_list(&mut resolved.parameters, &format!("{}/parameters", path))?;
        Ok(resolved)
    }

    fn resolve_operation(
        &mut self,
        operation: &Operation,
        path: &str,
    ) -> Result<Operation, ResolveError> {
        let mut resolved = operation.clone();

        if let Some(body) = resolved.request_body.as_mut() {
            self.resolve_slot(body, &format!("{}/requestBody", path))?;
        }
        for (status, response) in resolved.responses.iter_mut() {
            let response_path = format!("{}/responses/{}", path, escape_pointer(status));
            self.resolve_slot(response, &response_path)?;
        }
        self.resolve_list(&mut resolved.parameters, &format!("{}/parameters", path))?;
        for (name, callback) in resolved.callbacks.iter_mut() {
            let callback_path = format!("{}/callbacks/{}", path, escape_pointer(name));
            *callback = self.resolve_callback(callback, &callback_path)?;
        }

        Ok(resolved)
    }

    fn resolve_callback(&mut self, callback: &Callback, path: &str) -> Result<Callback, ResolveError> {
        let mut resolved = IndexMap::with_capacity(callback.len());
        for (expression, item) in callback {
            let item_path = format!("{}/{}", path, escape_pointer(expression));
            let item = match marker(&item.reference) {
                Some(marker) => {
                    self.leave(&item_path, marker, UnresolvedReason::PathItem);
                    item.clone()
                }
                None => self.resolve_path_item(item, &item_path)?,
            };
            resolved.insert(expression.clone(), item);
        }
        Ok(resolved)
    }

    fn resolve_list<T: Component>(
        &mut self,
        list: &mut [Arc<T>],
        path: &str,
    ) -> Result<bool, ResolveError> {
        let mut changed = false;
        for (i, item) in list.iter_mut().enumerate() {
            changed |= self.resolve_slot(item, &format!("{}/{}", path, i))?;
        }
        Ok(changed)
    }

    fn resolve_content(
        &mut self,
        content: &mut IndexMap<String, MediaType>,
        path: &str,
    ) -> Result<bool, ResolveError> {
        let mut changed = false;
        for (media, media_type) in content.iter_mut() {
            let media_path = format!("{}/{}", path, escape_pointer(media));
            if let Some(schema) = media_type.schema.as_mut() {
                changed |= self.resolve_slot(schema, &format!("{}/schema", media_path))?;
            }
            for (field, encoding) in media_type.encoding.iter_mut() {
                for (name, header) in encoding.headers.iter_mut() {
                    let header_path = format!(
                        "{}/encoding/{}/headers/{}",
                        media_path,
                        escape_pointer(field),
                        escape_pointer(name)
                    );
                    changed |= self.resolve_slot(header, &header_path)?;
                }
            }
        }
        Ok(changed)
    }

    /// Resolve the node in `slot`, replacing it if the result differs.
    fn resolve_slot<T: Component>(
        &mut self,
        slot: &mut Arc<T>,
        path: &str,
    ) -> Result<bool, ResolveError> {
        let resolved = self.resolve_node(slot, path)?;
        if Arc::ptr_eq(&resolved, slot) {
            return Ok(false);
        }
        *slot = resolved;
        Ok(true)
    }

    fn resolve_node<T: Component>(
        &mut self,
        node: &Arc<T>,
        path: &str,
    ) -> Result<Arc<T>, ResolveError> {
        match node.reference() {
            Some(marker) => {
                let marker = marker.to_string();
                Ok(self
                    .follow::<T>(&marker, path)?
                    .unwrap_or_else(|| Arc::clone(node)))
            }
            None => self.resolve_concrete(node, path),
        }
    }

    fn resolve_concrete<T: Component>(
        &mut self,
        node: &Arc<T>,
        path: &str,
    ) -> Result<Arc<T>, ResolveError> {
        // Descending into content ends the current marker chain.
        let saved = self.chain_start;
        self.chain_start = self.stack.len();
        let mut copy = T::clone(node);
        let changed = copy.resolve_children(self, path);
        self.chain_start = saved;

        if changed? {
            Ok(Arc::new(copy))
        } else {
            Ok(Arc::clone(node))
        }
    }

    /// Follow a marker to its resolved target.
    ///
    /// Returns `None` when the marker stays in place.
    fn follow<T: Component>(
        &mut self,
        marker: &str,
        path: &str,
    ) -> Result<Option<Arc<T>>, ResolveError> {
        let parsed = match Marker::parse(marker) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.leave(path, marker, UnresolvedReason::from(&err));
                return Ok(None);
            }
        };

        if parsed.category != T::CATEGORY {
            self.leave(path, marker, UnresolvedReason::CategoryMismatch);
            return Ok(None);
        }

        if let Some(pos) = self
            .stack
            .iter()
            .position(|(c, n)| *c == parsed.category && *n == parsed.name)
        {
            if pos >= self.chain_start {
                let mut chain: Vec<String> = self.stack[pos..]
                    .iter()
                    .map(|(category, name)| {
                        Marker {
                            category: *category,
                            name: name.clone(),
                        }
                        .to_string()
                    })
                    .collect();
                chain.push(parsed.to_string());
                return Err(ResolveError::CircularReference { chain });
            }
            self.leave(path, marker, UnresolvedReason::Recursive);
            return Ok(None);
        }

        match self.entry::<T>(&parsed.name)? {
            Some(target) if target.reference().is_some() => {
                self.leave(path, marker, UnresolvedReason::BrokenChain);
                Ok(None)
            }
            Some(target) => Ok(Some(target)),
            None => {
                self.leave(path, marker, UnresolvedReason::NotFound);
                Ok(None)
            }
        }
    }

    /// Resolved registry entry by name, resolving it on first use.
    fn entry<T: Component>(&mut self, name: &str) -> Result<Option<Arc<T>>, ResolveError> {
        if let Some(done) = T::registry(&self.arena).get(name) {
            return Ok(Some(Arc::clone(done)));
        }

        let Some(target) = self.source.and_then(|c| T::registry(c).get(name)).cloned() else {
            return Ok(None);
        };

        let entry = Marker {
            category: T::CATEGORY,
            name: name.to_string(),
        };
        debug!(component = %entry, "resolving component");

        self.stack.push((T::CATEGORY, name.to_string()));
        let resolved = self.resolve_node(&target, &entry.pointer());
        self.stack.pop();
        let resolved = resolved?;

        T::registry_mut(&mut self.arena).insert(name.to_string(), Arc::clone(&resolved));
        Ok(Some(resolved))
    }

    fn leave(&mut self, location: &str, marker: &str, reason: UnresolvedReason) {
        warn!(location, marker, %reason, "reference left unresolved");
        self.unresolved.push(UnresolvedRef {
            location: location.to_string(),
            marker: marker.to_string(),
            reason,
        });
    }
}

fn path_ref_error(route: &str, marker: &str) -> ResolveError {
    let reason = match Marker::parse(marker) {
        Ok(parsed) => format!("a component in '{}' is not a path item", parsed.category),
        Err(err) => err.to_string(),
    };
    ResolveError::PathRef {
        route: route.to_string(),
        marker: marker.to_string(),
        reason,
    }
}

impl Component for Schema {
    const CATEGORY: Category = Category::Schemas;

    fn reference(&self) -> Option<&str> {
        marker(&self.reference)
    }

    fn registry(components: &Components) -> &IndexMap<String, Arc<Self>> {
        &components.schemas
    }

    fn registry_mut(components: &mut Components) -> &mut IndexMap<String, Arc<Self>> {
        &mut components.schemas
    }

    fn resolve_children(
        &mut self,
        resolver: &mut Resolver<'_>,
        path: &str,
    ) -> Result<bool, ResolveError> {
        let mut changed = false;

        if let Some(items) = self.items.as_mut() {
            changed |= resolver.resolve_slot(items, &format!("{}/items", path))?;
        }
        for (name, property) in self.properties.iter_mut() {
            let property_path = format!("{}/properties/{}", path, escape_pointer(name));
            changed |= resolver.resolve_slot(property, &property_path)?;
        }
        if let Some(AdditionalProperties::Schema(schema)) = self.additional_properties.as_mut() {
            changed |= resolver.resolve_slot(schema, &format!("{}/additionalProperties", path))?;
        }
        for (keyword, branches) in [
            ("allOf", &mut self.all_of),
            ("anyOf", &mut self.any_of),
            ("oneOf", &mut self.one_of),
        ] {
            changed |= resolver.resolve_list(branches, &format!("{}/{}", path, keyword))?;
        }
        if let Some(not) = self.not.as_mut() {
            changed |= resolver.resolve_slot(not, &format!("{}/not", path))?;
        }

        Ok(changed)
    }
}

impl Component for Response {
    const CATEGORY: Category = Category::Responses;

    fn reference(&self) -> Option<&str> {
        marker(&self.reference)
    }

    fn registry(components: &Components) -> &IndexMap<String, Arc<Self>> {
        &components.responses
    }

    fn registry_mut(components: &mut Components) -> &mut IndexMap<String, Arc<Self>> {
        &mut components.responses
    }

    fn resolve_children(
        &mut self,
        resolver: &mut Resolver<'_>,
        path: &str,
    ) -> Result<bool, ResolveError> {
        let mut changed = false;
        for (name, header) in self.headers.iter_mut() {
            let header_path = format!("{}/headers/{}", path, escape_pointer(name));
            changed |= resolver.resolve_slot(header, &header_path)?;
        }
        changed |= resolver.resolve_content(&mut self.content, &format!("{}/content", path))?;
        Ok(changed)
    }
}

impl Component for Parameter {
    const CATEGORY: Category = Category::Parameters;

    fn reference(&self) -> Option<&str> {
        marker(&self.reference)
    }

    fn registry(components: &Components) -> &IndexMap<String, Arc<Self>> {
        &components.parameters
    }

    fn registry_mut(components: &mut Components) -> &mut IndexMap<String, Arc<Self>> {
        &mut components.parameters
    }

    fn resolve_children(
        &mut self,
        resolver: &mut Resolver<'_>,
        path: &str,
    ) -> Result<bool, ResolveError> {
        let mut changed = false;
        if let Some(schema) = self.schema.as_mut() {
            changed |= resolver.resolve_slot(schema, &format!("{}/schema", path))?;
        }
        changed |= resolver.resolve_content(&mut self.content, &format!("{}/content", path))?;
        Ok(changed)
    }
}

impl Component for RequestBody {
    const CATEGORY: Category = Category::RequestBodies;

    fn reference(&self) -> Option<&str> {
        marker(&self.reference)
    }

    fn registry(components: &Components) -> &IndexMap<String, Arc<Self>> {
        &components.request_bodies
    }

    fn registry_mut(components: &mut Components) -> &mut IndexMap<String, Arc<Self>> {
        &mut components.request_bodies
    }

    fn resolve_children(
        &mut self,
        resolver: &mut Resolver<'_>,
        path: &str,
    ) -> Result<bool, ResolveError> {
        resolver.resolve_content(&mut self.content, &format!("{}/content", path))
    }
}

impl Component for Header {
    const CATEGORY: Category = Category::Headers;

    fn reference(&self) -> Option<&str> {
        marker(&self.reference)
    }

    fn registry(components: &Components) -> &IndexMap<String, Arc<Self>> {
        &components.headers
    }

    fn registry_mut(components: &mut Components) -> &mut IndexMap<String, Arc<Self>> {
        &mut components.headers
    }

    fn resolve_children(
        &mut self,
        resolver: &mut Resolver<'_>,
        path: &str,
    ) -> Result<bool, ResolveError> {
        match self.schema.as_mut() {
            Some(schema) => resolver.resolve_slot(schema, &format!("{}/schema", path)),
            None => Ok(false),
        }
    }
}

impl Component for SecurityScheme {
    const CATEGORY: Category = Category::SecuritySchemes;

    fn reference(&self) -> Option<&str> {
        marker(&self.reference)
    }

    fn registry(components: &Components) -> &IndexMap<String, Arc<Self>> {
        &components.security_schemes
    }

    fn registry_mut(components: &mut Components) -> &mut IndexMap<String, Arc<Self>> {
        &mut components.security_schemes
    }

    fn resolve_children(&mut self, _: &mut Resolver<'_>, _: &str) -> Result<bool, ResolveError> {
        Ok(false)
    }
}
