use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("-"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Float(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<Option<String>> for Scalar {
    fn from(value: Option<String>) -> Self {
        value.map(Scalar::Text).unwrap_or(Scalar::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResource {
    pub url: String,
    pub position: u32,
    pub fallback_url: String,
    pub refresh_interval: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Category {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
    Leaf {
        value: Scalar,
        position: u32,
    },
    Image(ImageResource),
}

impl NodeKind {
    fn label(&self) -> &'static str {
        match self {
            NodeKind::Category { .. } => "category",
            NodeKind::Leaf { .. } => "leaf",
            NodeKind::Image(_) => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent: NodeId,
    pub ident: String,
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created(NodeId),
    Updated(NodeId),
    Unchanged(NodeId),
}

impl Upsert {
    pub fn id(self) -> NodeId {
        match self {
            Upsert::Created(id) | Upsert::Updated(id) | Upsert::Unchanged(id) => id,
        }
    }
}

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("parent node {0} does not exist")]
    MissingParent(NodeId),
    #[error("parent node {0} is not a category")]
    NotACategory(NodeId),
    #[error("identifier {ident:?} under {parent} is a {found}, expected a {expected}")]
    KindMismatch {
        parent: NodeId,
        ident: String,
        found: &'static str,
        expected: &'static str,
    },
    #[error("tree storage error: {0}")]
    Storage(String),
}

pub trait NodeRepository: Send {
    fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    fn find(&self, parent: NodeId, ident: &str) -> Option<NodeId>;

    fn get(&self, id: NodeId) -> Option<&Node>;

    /// Children of `parent` ordered by position, then identifier.
    fn children(&self, parent: NodeId) -> Vec<NodeId>;

    fn ensure_category(
        &mut self,
        parent: NodeId,
        ident: &str,
        name: &str,
        kind: Option<&str>,
    ) -> Result<Upsert, TreeError>;

    /// Writes a leaf value. `position: None` keeps the existing position
    /// (0 on creation).
    fn upsert_leaf(
        &mut self,
        parent: NodeId,
        ident: &str,
        name: &str,
        value: Scalar,
        position: Option<u32>,
    ) -> Result<Upsert, TreeError>;

    fn upsert_image(
        &mut self,
        parent: NodeId,
        ident: &str,
        name: &str,
        image: ImageResource,
    ) -> Result<Upsert, TreeError>;

    fn flush(&mut self) -> Result<(), TreeError> {
        Ok(())
    }
}

/// Derives a node identifier from a semantic key. Lower-case letters, digits
/// and `_` are kept; any other byte becomes `-` and two hex digits, so two
/// distinct keys never share an identifier.
pub fn ident(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'_' => out.push(char::from(byte)),
            _ => out.push_str(&format!("-{byte:02x}")),
        }
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTree {
    next_id: u64,
    nodes: BTreeMap<NodeId, Node>,
    #[serde(skip)]
    index: BTreeMap<(NodeId, String), NodeId>,
    #[serde(skip)]
    backing_file: Option<PathBuf>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new("Netatmo Presence")
    }
}

impl MemoryTree {
    pub fn new(root_name: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            NodeId::ROOT,
            Node {
                id: NodeId::ROOT,
                parent: NodeId::ROOT,
                ident: String::new(),
                name: root_name.to_string(),
                kind: NodeKind::Category { kind: None },
            },
        );
        Self {
            next_id: 1,
            nodes,
            index: BTreeMap::new(),
            backing_file: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn lookup(&self, path: &[&str]) -> Option<&Node> {
        let mut current = NodeId::ROOT;
        for ident in path {
            current = self.find(current, ident)?;
        }
        self.nodes.get(&current)
    }

    pub fn load(path: &Path) -> Result<Self, TreeError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| TreeError::Storage(format!("read {}: {err}", path.display())))?;
        let mut tree: MemoryTree = serde_json::from_str(&raw)
            .map_err(|err| TreeError::Storage(format!("parse {}: {err}", path.display())))?;
        tree.rebuild_index();
        Ok(tree)
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TreeError> {
        let path = path.into();
        let mut tree = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        tree.backing_file = Some(path);
        Ok(tree)
    }

    pub fn save(&self, path: &Path) -> Result<(), TreeError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| TreeError::Storage(format!("create {}: {err}", parent.display())))?;
        }
        let body = serde_json::to_vec_pretty(self)
            .map_err(|err| TreeError::Storage(err.to_string()))?;
        fs::write(path, body)
            .map_err(|err| TreeError::Storage(format!("write {}: {err}", path.display())))
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .nodes
            .values()
            .filter(|node| node.id != NodeId::ROOT)
            .map(|node| ((node.parent, node.ident.clone()), node.id))
            .collect();
    }

    fn check_parent(&self, parent: NodeId) -> Result<(), TreeError> {
        match self.nodes.get(&parent) {
            None => Err(TreeError::MissingParent(parent)),
            Some(Node {
                kind: NodeKind::Category { .. },
                ..
            }) => Ok(()),
            Some(_) => Err(TreeError::NotACategory(parent)),
        }
    }

    fn insert(&mut self, parent: NodeId, ident: &str, name: &str, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                parent,
                ident: ident.to_string(),
                name: name.to_string(),
                kind,
            },
        );
        self.index.insert((parent, ident.to_string()), id);
        id
    }

    fn upsert_with(
        &mut self,
        parent: NodeId,
        ident: &str,
        name: &str,
        expected: &'static str,
        create: impl FnOnce() -> NodeKind,
        apply: impl FnOnce(&mut Node) -> bool,
    ) -> Result<Upsert, TreeError> {
        self.check_parent(parent)?;

        let Some(id) = self.find(parent, ident) else {
            return Ok(Upsert::Created(self.insert(parent, ident, name, create())));
        };

        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| TreeError::Storage(format!("index points at missing node {id}")))?;

        let found = node.kind.label();
        if found != expected {
            return Err(TreeError::KindMismatch {
                parent,
                ident: ident.to_string(),
                found,
                expected,
            });
        }

        Ok(if apply(node) {
            Upsert::Updated(id)
        } else {
            Upsert::Unchanged(id)
        })
    }
}

impl NodeRepository for MemoryTree {
    fn find(&self, parent: NodeId, ident: &str) -> Option<NodeId> {
        self.index.get(&(parent, ident.to_string())).copied()
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut children: Vec<&Node> = self
            .index
            .range((parent, String::new())..)
            .take_while(|((p, _), _)| *p == parent)
            .filter_map(|(_, id)| self.nodes.get(id))
            .collect();

        children.sort_by_key(|node| {
            let position = match &node.kind {
                NodeKind::Leaf { position, .. } => *position,
                NodeKind::Image(image) => image.position,
                NodeKind::Category { .. } => 0,
            };
            (position, node.ident.clone())
        });

        children.into_iter().map(|node| node.id).collect()
    }

    fn ensure_category(
        &mut self,
        parent: NodeId,
        ident: &str,
        name: &str,
        kind: Option<&str>,
    ) -> Result<Upsert, TreeError> {
        let tag = kind.map(str::to_string);
        self.upsert_with(
            parent,
            ident,
            name,
            "category",
            || NodeKind::Category { kind: tag.clone() },
            |node| {
                let mut changed = false;
                if node.name != name {
                    node.name = name.to_string();
                    changed = true;
                }
                if let NodeKind::Category { kind } = &mut node.kind {
                    if tag.is_some() && *kind != tag {
                        *kind = tag.clone();
                        changed = true;
                    }
                }
                changed
            },
        )
    }

    fn upsert_leaf(
        &mut self,
        parent: NodeId,
        ident: &str,
        name: &str,
        value: Scalar,
        position: Option<u32>,
    ) -> Result<Upsert, TreeError> {
        let initial = value.clone();
        self.upsert_with(
            parent,
            ident,
            name,
            "leaf",
            || NodeKind::Leaf {
                value: initial,
                position: position.unwrap_or(0),
            },
            |node| {
                let NodeKind::Leaf {
                    value: current,
                    position: current_pos,
                } = &mut node.kind
                else {
                    return false;
                };
                let mut changed = false;
                if *current != value {
                    *current = value;
                    changed = true;
                }
                if let Some(pos) = position {
                    if *current_pos != pos {
                        *current_pos = pos;
                        changed = true;
                    }
                }
                changed
            },
        )
    }

    fn upsert_image(
        &mut self,
        parent: NodeId,
        ident: &str,
        name: &str,
        image: ImageResource,
    ) -> Result<Upsert, TreeError> {
        let initial = image.clone();
        self.upsert_with(
            parent,
            ident,
            name,
            "image",
            || NodeKind::Image(initial),
            |node| match &mut node.kind {
                NodeKind::Image(current) if *current != image => {
                    *current = image;
                    true
                }
                _ => false,
            },
        )
    }

    fn flush(&mut self) -> Result<(), TreeError> {
        match &self.backing_file {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }
}
