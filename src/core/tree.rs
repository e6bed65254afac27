//! # Command Tree
//!
//! A trie of [`CommandNode`]s keyed by path segment. Plugins populate it during the
//! registration phase through four operations:
//!
//! - **`listen`**: binds a handler to a leaf path. Re-registering a path replaces the
//!   handler, so override plugins can `find` the old handler, wrap it and `listen` again.
//! - **`subtree`**: declares a grouping node that only carries usage for help listings.
//! - **`synonym`**: binds an alternate leaf path to an existing node. The synonym holds a
//!   link to the canonical node, never a copy of its handler.
//! - **`subtree_synonym`**: declares an alternate prefix for a whole subtree. It is kept as
//!   a rewrite rule applied before every lookup, so children registered under the target
//!   later are reachable through the alias too.
//!
//! Once registration is done the tree is frozen inside a `Shell` and only read.

use crate::{
    core::{
        arg_parser::is_flag,
        handler::Handler,
        path::{CommandPath, PathError},
        rewrite::{RewriteRule, RewriteRules},
    },
    models::{CommandOptions, Usage},
};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Cannot register '{path}' as a synonym of '{target}': it is already bound to a different command.")]
    SynonymShadows { path: String, target: String },
    #[error("'{path}' has no handler, so it cannot be the target of a synonym.")]
    NotALeaf { path: String },
    #[error("No command is registered at '{path}'.")]
    UnknownTarget { path: String },
    #[error("Subtree synonym '{alias}' -> '{target}' would rewrite into itself.")]
    SelfReferentialSynonym { alias: String, target: String },
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Index of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What a node executes when dispatched to.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Created implicitly on the way to a deeper registration.
    None,
    Handler(Handler),
    /// Alternate name for the canonical node.
    Synonym(NodeId),
    /// Listing entry for a subtree synonym. Lookups are rewritten before they get here.
    SubtreeAlias(CommandPath),
}

/// One addressable command or grouping node.
#[derive(Debug, Clone)]
pub struct CommandNode {
    id: NodeId,
    path: CommandPath,
    binding: Binding,
    subtree: bool,
    options: CommandOptions,
    children: BTreeMap<String, NodeId>,
}

impl CommandNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn path(&self) -> &CommandPath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.last()
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn options(&self) -> &CommandOptions {
        &self.options
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.options.usage.as_ref()
    }

    pub fn is_hidden(&self) -> bool {
        self.options.hide
    }

    /// Declared with `subtree`.
    pub fn is_subtree(&self) -> bool {
        self.subtree
    }

    pub fn is_synonym(&self) -> bool {
        matches!(self.binding, Binding::Synonym(_) | Binding::SubtreeAlias(_))
    }

    /// The canonical node this synonym points at.
    pub fn synonym_of(&self) -> Option<NodeId> {
        match self.binding {
            Binding::Synonym(target) => Some(target),
            _ => None,
        }
    }

    /// Explicitly registered, as opposed to created on the way to a child.
    pub fn is_registered(&self) -> bool {
        self.subtree || !matches!(self.binding, Binding::None)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Result of walking input tokens down the trie.
#[derive(Debug)]
pub(crate) struct Walk<'t> {
    /// Nodes matched so far, shallowest first.
    pub trail: Vec<&'t CommandNode>,
    /// Number of tokens consumed by the walk.
    pub consumed: usize,
}

impl Walk<'_> {
    pub fn deepest(&self) -> Option<&CommandNode> {
        self.trail.last().copied()
    }
}

/// The registry of every command path known to the shell.
#[derive(Debug, Clone, Default)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
    roots: BTreeMap<String, NodeId>,
    rewrites: RewriteRules,
}

impl CommandTree {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Registration ---

    /// Binds `handler` to `path`, replacing any handler already there.
    pub fn listen<P>(
        &mut self,
        path: P,
        handler: Handler,
        options: CommandOptions,
    ) -> TreeResult<&CommandNode>
    where
        P: TryInto<CommandPath, Error = PathError>,
    {
        let path = self.canonical_for_registration(path.try_into()?);
        self.ensure_not_an_alias(&path)?;
        let id = self.ensure_path(&path);
        let node = self.slot_mut(id);

        match &node.binding {
            Binding::Handler(_) => {
                log::debug!("Command '{}' re-registered; the new handler wins", path)
            }
            Binding::Synonym(_) | Binding::SubtreeAlias(_) => {
                log::warn!("Synonym '{}' replaced by a handler of its own", path)
            }
            Binding::None => log::trace!("Registered command '{}'", path),
        }

        node.binding = Binding::Handler(handler);
        node.options = options;
        Ok(self.slot(id))
    }

    /// Declares a grouping node. An existing handler at `path` is kept; only the
    /// usage, docs and visibility are taken from `options` in that case.
    pub fn subtree<P>(&mut self, path: P, options: CommandOptions) -> TreeResult<&CommandNode>
    where
        P: TryInto<CommandPath, Error = PathError>,
    {
        let path = self.canonical_for_registration(path.try_into()?);
        self.ensure_not_an_alias(&path)?;
        let id = self.ensure_path(&path);
        let node = self.slot_mut(id);

        node.subtree = true;
        if matches!(node.binding, Binding::None) {
            node.options = options;
        } else {
            node.options.usage = options.usage;
            node.options.docs = options.docs;
            node.options.hide = options.hide;
        }
        log::trace!("Registered subtree '{}'", path);
        Ok(self.slot(id))
    }

    /// Makes `alias` an alternate prefix for everything under `target`.
    pub fn subtree_synonym<A, T>(
        &mut self,
        alias: A,
        target: T,
        options: CommandOptions,
    ) -> TreeResult<&CommandNode>
    where
        A: TryInto<CommandPath, Error = PathError>,
        T: TryInto<CommandPath, Error = PathError>,
    {
        let alias = self.canonical_for_registration(alias.try_into()?);
        let target = self.rewrites.rewrite_path(&target.try_into()?);

        if let Some(existing) = self.lookup_exact(alias.segments())
            && (existing.has_children() || matches!(existing.binding, Binding::Handler(_) | Binding::Synonym(_)))
        {
            return Err(TreeError::SynonymShadows {
                path: alias.to_string(),
                target: target.to_string(),
            });
        }

        self.rewrites.add(alias.clone(), target.clone())?;
        log::debug!("Subtree synonym '{}' -> '{}'", alias, target);

        let id = self.ensure_path(&alias);
        let node = self.slot_mut(id);
        node.binding = Binding::SubtreeAlias(target);
        node.options = options;
        Ok(self.slot(id))
    }

    /// Binds `path` to the same command as `canonical`.
    ///
    /// # Errors
    /// - `UnknownTarget` / `NotALeaf` if `canonical` has no handler.
    /// - `SynonymShadows` if `path` already runs a different command.
    pub fn synonym<P, C>(
        &mut self,
        path: P,
        canonical: C,
        options: CommandOptions,
    ) -> TreeResult<&CommandNode>
    where
        P: TryInto<CommandPath, Error = PathError>,
        C: TryInto<CommandPath, Error = PathError>,
    {
        let path = self.canonical_for_registration(path.try_into()?);
        self.ensure_not_an_alias(&path)?;
        let canonical = self.rewrites.rewrite_path(&canonical.try_into()?);

        let target = self
            .lookup_exact(canonical.segments())
            .ok_or_else(|| TreeError::UnknownTarget {
                path: canonical.to_string(),
            })?;
        let target = self.resolve_synonym(target);
        let Binding::Handler(target_handler) = &target.binding else {
            return Err(TreeError::NotALeaf {
                path: canonical.to_string(),
            });
        };
        let target_id = target.id;

        if target.path == path {
            return Ok(self.slot(target_id));
        }

        if let Some(existing) = self.lookup_exact(path.segments()) {
            let compatible = match &existing.binding {
                Binding::None => true,
                Binding::Handler(h) => h.same(target_handler),
                Binding::Synonym(t) => *t == target_id,
                Binding::SubtreeAlias(_) => false,
            };
            if !compatible {
                return Err(TreeError::SynonymShadows {
                    path: path.to_string(),
                    target: canonical.to_string(),
                });
            }
        }

        let id = self.ensure_path(&path);
        let node = self.slot_mut(id);
        node.binding = Binding::Synonym(target_id);
        node.options = options;
        log::trace!("Registered synonym '{}' -> '{}'", path, canonical);
        Ok(self.slot(id))
    }

    /// Shows or hides a node in help listings. This is the only change allowed
    /// on a node after it has been registered.
    pub fn set_hidden<P>(&mut self, path: P, hidden: bool) -> TreeResult<()>
    where
        P: TryInto<CommandPath, Error = PathError>,
    {
        let path = self.canonical_for_registration(path.try_into()?);
        let id = self
            .lookup_exact(path.segments())
            .filter(|node| node.is_registered())
            .map(CommandNode::id)
            .ok_or_else(|| TreeError::UnknownTarget {
                path: path.to_string(),
            })?;
        self.slot_mut(id).options.hide = hidden;
        Ok(())
    }

    // --- Lookup ---

    /// Finds the registered node at `path`, applying subtree synonyms and
    /// following synonym links to the canonical node.
    pub fn find<P>(&self, path: P) -> Result<Option<&CommandNode>, PathError>
    where
        P: TryInto<CommandPath, Error = PathError>,
    {
        let path = self.rewrites.rewrite_path(&path.try_into()?);
        Ok(self
            .lookup_exact(path.segments())
            .map(|node| self.resolve_synonym(node))
            .filter(|node| node.is_registered()))
    }

    /// The node stored at exactly `path`, synonyms included, without any rewriting.
    pub fn node_at<P>(&self, path: P) -> Result<Option<&CommandNode>, PathError>
    where
        P: TryInto<CommandPath, Error = PathError>,
    {
        let path = path.try_into()?;
        Ok(self.lookup_exact(path.segments()))
    }

    pub fn node(&self, id: NodeId) -> Option<&CommandNode> {
        self.nodes.get(id.0)
    }

    /// The live handler for a node, looked up through its synonym link.
    pub fn handler_of<'t>(&'t self, node: &'t CommandNode) -> Option<&'t Handler> {
        match &self.resolve_synonym(node).binding {
            Binding::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    /// The canonical node for `node` (itself unless it is a synonym).
    pub fn resolve_synonym<'t>(&'t self, node: &'t CommandNode) -> &'t CommandNode {
        match node.binding {
            Binding::Synonym(target) => self.node(target).unwrap_or(node),
            _ => node,
        }
    }

    /// Children of `path` (top-level nodes for `None`), in name order.
    pub fn children(&self, path: Option<&CommandPath>) -> Vec<&CommandNode> {
        let map = match path {
            None => Some(&self.roots),
            Some(path) => {
                let path = self.rewrites.rewrite_path(path);
                self.lookup_exact(path.segments()).map(|node| &node.children)
            }
        };
        map.map(|children| children.values().filter_map(|id| self.node(*id)).collect())
            .unwrap_or_default()
    }

    /// Every node, in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &CommandNode> {
        self.nodes.iter()
    }

    pub fn subtree_synonyms(&self) -> &[RewriteRule] {
        self.rewrites.rules()
    }

    /// Applies subtree synonyms to leading input tokens. `None` if the rules cycle.
    pub(crate) fn rewrite_tokens(&self, tokens: &[String]) -> Option<Vec<String>> {
        self.rewrites.rewrite(tokens)
    }

    /// Greedily descends the trie along leading non-flag tokens.
    pub(crate) fn walk<'t>(&'t self, tokens: &[String]) -> Walk<'t> {
        let mut trail = Vec::new();
        let mut children = &self.roots;

        for token in tokens {
            if is_flag(token) {
                break;
            }
            let Some(node) = children.get(token).and_then(|id| self.node(*id)) else {
                break;
            };
            trail.push(node);
            children = &node.children;
        }

        let consumed = trail.len();
        Walk { trail, consumed }
    }

    // --- Internals ---

    /// Registration paths go through the subtree synonyms of their parent, so an
    /// alias prefix never grows children of its own.
    fn canonical_for_registration(&self, path: CommandPath) -> CommandPath {
        match path.parent() {
            Some(parent) => self.rewrites.rewrite_path(&parent).join(path.last()),
            None => path,
        }
    }

    /// A path that is itself a subtree synonym always rewrites away, so
    /// nothing registered there could ever be reached.
    fn ensure_not_an_alias(&self, path: &CommandPath) -> TreeResult<()> {
        let rewritten = self.rewrites.rewrite_path(path);
        if rewritten == *path {
            return Ok(());
        }
        Err(TreeError::SynonymShadows {
            path: path.to_string(),
            target: rewritten.to_string(),
        })
    }

    fn lookup_exact(&self, segments: &[String]) -> Option<&CommandNode> {
        let mut children = &self.roots;
        let mut found = None;
        for segment in segments {
            let node = self.node(*children.get(segment)?)?;
            children = &node.children;
            found = Some(node);
        }
        found
    }

    fn ensure_path(&mut self, path: &CommandPath) -> NodeId {
        let mut parent: Option<NodeId> = None;
        let mut prefix: Vec<String> = Vec::with_capacity(path.len());

        for segment in path.segments() {
            prefix.push(segment.clone());
            let existing = match parent {
                None => self.roots.get(segment),
                Some(pid) => self.slot(pid).children.get(segment),
            }
            .copied();

            let id = match existing {
                Some(id) => id,
                None => {
                    let id = NodeId(self.nodes.len());
                    let node_path = CommandPath::from_segments(&prefix).unwrap_or_else(|_| path.clone());
                    self.nodes.push(CommandNode {
                        id,
                        path: node_path,
                        binding: Binding::None,
                        subtree: false,
                        options: CommandOptions::default(),
                        children: BTreeMap::new(),
                    });
                    match parent {
                        None => self.roots.insert(segment.clone(), id),
                        Some(pid) => self.slot_mut(pid).children.insert(segment.clone(), id),
                    };
                    id
                }
            };
            parent = Some(id);
        }

        // A CommandPath is never empty, so the loop ran at least once.
        parent.unwrap_or(NodeId(0))
    }

    // NodeIds are only minted by `ensure_path`, so they always index a live node.
    #[allow(clippy::indexing_slicing)]
    fn slot(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.0]
    }

    #[allow(clippy::indexing_slicing)]
    fn slot_mut(&mut self, id: NodeId) -> &mut CommandNode {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn h(tag: &'static str) -> Handler {
        Handler::new(move |_| Ok(json!(tag)))
    }

    #[test]
    fn test_distinct_paths_find_distinct_nodes() {
        let mut tree = CommandTree::new();
        tree.listen("/wsk/actions/invoke", h("invoke"), CommandOptions::new()).unwrap();
        tree.listen("/wsk/actions/get", h("get"), CommandOptions::new()).unwrap();

        let invoke = tree.find("/wsk/actions/invoke").unwrap().unwrap().id();
        let get = tree.find("wsk/actions/get/").unwrap().unwrap().id();
        assert_ne!(invoke, get);
    }

    #[test]
    fn test_synonym_finds_canonical_node_and_shares_handler() {
        let mut tree = CommandTree::new();
        let canonical = tree
            .listen("/wsk/actions/list", h("list"), CommandOptions::new())
            .unwrap()
            .id();
        tree.synonym("/wsk/actions/ls", "/wsk/actions/list", CommandOptions::new().hide())
            .unwrap();

        assert_eq!(tree.find("/wsk/actions/ls").unwrap().unwrap().id(), canonical);

        let raw = tree.node_at("/wsk/actions/ls").unwrap().unwrap();
        assert!(raw.is_synonym());
        assert!(raw.is_hidden());
        let original = tree.handler_of(tree.node(canonical).unwrap()).unwrap();
        assert!(tree.handler_of(raw).unwrap().same(original));
    }

    #[test]
    fn test_synonym_follows_overridden_handler() {
        let mut tree = CommandTree::new();
        tree.listen("/wsk/actions/invoke", h("v1"), CommandOptions::new()).unwrap();
        tree.synonym("/wsk/actions/call", "/wsk/actions/invoke", CommandOptions::new())
            .unwrap();

        let v2 = h("v2");
        tree.listen("/wsk/actions/invoke", v2.clone(), CommandOptions::new()).unwrap();

        let synonym = tree.node_at("/wsk/actions/call").unwrap().unwrap();
        assert!(tree.handler_of(synonym).unwrap().same(&v2));
    }

    #[test]
    fn test_synonym_must_not_shadow_a_distinct_handler() {
        let mut tree = CommandTree::new();
        tree.listen("/a", h("a"), CommandOptions::new()).unwrap();
        tree.listen("/b", h("b"), CommandOptions::new()).unwrap();

        let err = tree.synonym("/b", "/a", CommandOptions::new()).unwrap_err();
        assert!(matches!(err, TreeError::SynonymShadows { .. }));

        // Re-declaring the same synonym is fine.
        tree.synonym("/c", "/a", CommandOptions::new()).unwrap();
        tree.synonym("/c", "/a", CommandOptions::new()).unwrap();
        // But re-pointing it at another command is not.
        assert!(tree.synonym("/c", "/b", CommandOptions::new()).is_err());
    }

    #[test]
    fn test_synonym_requires_a_handler() {
        let mut tree = CommandTree::new();
        tree.subtree("/wsk", CommandOptions::new()).unwrap();
        assert!(matches!(
            tree.synonym("/w", "/wsk", CommandOptions::new()),
            Err(TreeError::NotALeaf { .. })
        ));
        assert!(matches!(
            tree.synonym("/w", "/nope", CommandOptions::new()),
            Err(TreeError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_relisten_replaces_handler_and_find_returns_prior_first() {
        let mut tree = CommandTree::new();
        let v1 = h("v1");
        tree.listen("/x", v1.clone(), CommandOptions::new()).unwrap();

        let node = tree.find("/x").unwrap().unwrap();
        let prior = tree.handler_of(node).unwrap().clone();
        assert!(prior.same(&v1));

        let v2 = h("v2");
        tree.listen("/x", v2.clone(), CommandOptions::new()).unwrap();
        let node = tree.find("/x").unwrap().unwrap();
        assert!(tree.handler_of(node).unwrap().same(&v2));
        assert!(!prior.same(&v2));
    }

    #[test]
    fn test_subtree_synonym_is_lazy() {
        let mut tree = CommandTree::new();
        tree.subtree_synonym("/a", "/b", CommandOptions::new()).unwrap();
        tree.listen("/b/c", h("c"), CommandOptions::new()).unwrap();

        let via_alias = tree.find("/a/c").unwrap().unwrap();
        assert_eq!(via_alias.path().to_string(), "/b/c");
    }

    #[test]
    fn test_registration_under_alias_lands_on_canonical_subtree() {
        let mut tree = CommandTree::new();
        tree.subtree("/wsk/actions", CommandOptions::new()).unwrap();
        tree.subtree_synonym("/wsk/action", "/wsk/actions", CommandOptions::new().hide())
            .unwrap();
        tree.listen("/wsk/action/get", h("get"), CommandOptions::new()).unwrap();

        let node = tree.find("/wsk/actions/get").unwrap().unwrap();
        assert_eq!(node.path().to_string(), "/wsk/actions/get");
        assert!(tree.node_at("/wsk/action").unwrap().unwrap().is_synonym());
        assert!(!tree.node_at("/wsk/action").unwrap().unwrap().has_children());
    }

    #[test]
    fn test_registration_at_an_alias_path_is_rejected() {
        let mut tree = CommandTree::new();
        tree.subtree("/wsk/actions", CommandOptions::new()).unwrap();
        tree.subtree_synonym("/wsk/action", "/wsk/actions", CommandOptions::new().hide())
            .unwrap();
        tree.listen("/wsk/actions/list", h("list"), CommandOptions::new()).unwrap();

        assert!(matches!(
            tree.listen("/wsk/action", h("shadow"), CommandOptions::new()),
            Err(TreeError::SynonymShadows { .. })
        ));
        assert!(matches!(
            tree.subtree("/wsk/action", CommandOptions::new()),
            Err(TreeError::SynonymShadows { .. })
        ));
        assert!(matches!(
            tree.synonym("/wsk/action", "/wsk/actions/list", CommandOptions::new()),
            Err(TreeError::SynonymShadows { .. })
        ));

        let alias = tree.node_at("/wsk/action").unwrap().unwrap();
        assert!(alias.is_synonym());
        assert!(tree.handler_of(alias).is_none());
        assert_eq!(
            tree.find("/wsk/action").unwrap().unwrap().path().to_string(),
            "/wsk/actions"
        );
    }

    #[test]
    fn test_subtree_synonym_cannot_shadow_existing_commands() {
        let mut tree = CommandTree::new();
        tree.listen("/a/x", h("x"), CommandOptions::new()).unwrap();
        assert!(matches!(
            tree.subtree_synonym("/a", "/b", CommandOptions::new()),
            Err(TreeError::SynonymShadows { .. })
        ));
    }

    #[test]
    fn test_implicit_interior_nodes_are_not_found() {
        let mut tree = CommandTree::new();
        tree.listen("/wsk/actions/invoke", h("invoke"), CommandOptions::new()).unwrap();
        assert!(tree.find("/wsk").unwrap().is_none());
        assert!(tree.node_at("/wsk").unwrap().is_some());

        tree.subtree("/wsk", CommandOptions::new().docs("OpenWhisk")).unwrap();
        assert!(tree.find("/wsk").unwrap().unwrap().is_subtree());
    }

    #[test]
    fn test_invalid_paths_are_rejected() {
        let mut tree = CommandTree::new();
        assert!(matches!(
            tree.listen("  / ", h("x"), CommandOptions::new()),
            Err(TreeError::Path(PathError::Invalid { .. }))
        ));
        assert!(tree.find("").is_err());
        // Nothing was created by the failed call.
        assert_eq!(tree.nodes().count(), 0);
    }

    #[test]
    fn test_set_hidden_and_children_listing() {
        let mut tree = CommandTree::new();
        tree.listen("/wsk/actions/list", h("list"), CommandOptions::new()).unwrap();
        tree.listen("/wsk/actions/get", h("get"), CommandOptions::new()).unwrap();
        tree.set_hidden("/wsk/actions/get", true).unwrap();

        let wsk_actions = CommandPath::try_from("/wsk/actions").unwrap();
        let names: Vec<&str> = tree
            .children(Some(&wsk_actions))
            .into_iter()
            .filter(|n| !n.is_hidden())
            .map(CommandNode::name)
            .collect();
        assert_eq!(names, vec!["list"]);
        assert!(matches!(
            tree.set_hidden("/nope", true),
            Err(TreeError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_walk_stops_at_flags_and_unknown_tokens() {
        let mut tree = CommandTree::new();
        tree.listen("/wsk/actions/invoke", h("invoke"), CommandOptions::new()).unwrap();

        let tokens: Vec<String> = ["wsk", "actions", "invoke", "foo", "-p"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let walk = tree.walk(&tokens);
        assert_eq!(walk.consumed, 3);
        assert_eq!(walk.deepest().unwrap().name(), "invoke");

        let tokens: Vec<String> = vec!["wsk".into(), "-v".into(), "actions".into()];
        assert_eq!(tree.walk(&tokens).consumed, 1);
    }
}
