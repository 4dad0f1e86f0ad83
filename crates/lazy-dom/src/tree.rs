//! DOM Tree (arena-based allocation)

use crate::{NodeId, Selector};

/// Tree node
#[derive(Debug)]
pub struct Node {
    /// Parent node (NONE if detached or document)
    pub parent: NodeId,
    /// Children in document order
    pub children: Vec<NodeId>,
    /// Node-specific data
    pub data: NodeData,
}

/// Node-specific data
#[derive(Debug)]
pub enum NodeData {
    /// Document root
    Document,
    /// Element
    Element(ElementData),
}

/// Element-specific data
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    /// Tag name (lowercase)
    pub tag: String,
    /// id attribute
    pub id: Option<String>,
    /// class list
    pub classes: Vec<String>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            children: Vec::new(),
            data,
        }
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            NodeData::Document => None,
        }
    }
}

/// Arena-based DOM tree
///
/// Node 0 is always the document node.
#[derive(Debug)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Create a tree holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
        }
    }

    /// Document node
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Element data for a node, if it is an element
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its document node
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        })));
        id
    }

    /// Append `child` as last child of `parent`, detaching it first
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.get(parent).is_none() || self.get(child).is_none() {
            return;
        }
        self.detach(child);
        self.nodes[child.index()].parent = parent;
        self.nodes[parent.index()].children.push(child);
    }

    /// Remove a node from its parent
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        self.nodes[parent.index()].children.retain(|&c| c != node);
        self.nodes[node.index()].parent = NodeId::NONE;
    }

    /// Set the id attribute
    pub fn set_id(&mut self, node: NodeId, id: &str) {
        if let Some(NodeData::Element(e)) = self.nodes.get_mut(node.index()).map(|n| &mut n.data) {
            e.id = Some(id.to_string());
        }
    }

    /// Add a class to the class list
    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(NodeData::Element(e)) = self.nodes.get_mut(node.index()).map(|n| &mut n.data) {
            if !e.classes.iter().any(|c| c == class) {
                e.classes.push(class.to_string());
            }
        }
    }

    /// Parent node, if attached
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).map(|n| n.parent).filter(|p| p.is_valid())
    }

    /// Children of a node
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Walk from `node` (inclusive) up to the document
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.get(node).map(|_| node), move |&n| self.parent(n))
    }

    /// Check if element matches selector
    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.element(node).is_some_and(|e| selector.matches(e))
    }

    /// Find closest inclusive ancestor matching selector
    ///
    /// Invalid selectors match nothing.
    pub fn closest(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let Some(selector) = Selector::parse(selector) else {
            tracing::debug!("closest: unsupported selector {:?}", selector);
            return None;
        };
        self.ancestors(node).find(|&n| self.matches(n, &selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomTree, NodeId, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let html = tree.create_element("html");
        let scroller = tree.create_element("div");
        let img = tree.create_element("lazy-img");
        tree.append_child(tree.root(), html);
        tree.append_child(html, scroller);
        tree.append_child(scroller, img);
        tree.add_class(scroller, "scroller");
        (tree, html, scroller, img)
    }

    #[test]
    fn test_tree_structure() {
        let (tree, html, scroller, img) = sample();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.parent(img), Some(scroller));
        assert_eq!(tree.parent(html), Some(NodeId::ROOT));
        assert_eq!(tree.parent(NodeId::ROOT), None);
        assert_eq!(tree.children(scroller), &[img]);
    }

    #[test]
    fn test_ancestors() {
        let (tree, html, scroller, img) = sample();
        let chain: Vec<_> = tree.ancestors(img).collect();
        assert_eq!(chain, vec![img, scroller, html, NodeId::ROOT]);
    }

    #[test]
    fn test_closest() {
        let (tree, html, scroller, img) = sample();
        assert_eq!(tree.closest(img, ".scroller"), Some(scroller));
        assert_eq!(tree.closest(img, "html"), Some(html));
        assert_eq!(tree.closest(img, "lazy-img"), Some(img));
        assert_eq!(tree.closest(img, ".missing"), None);
        assert_eq!(tree.closest(img, "div > p"), None);
    }

    #[test]
    fn test_reparent() {
        let (mut tree, html, scroller, img) = sample();
        tree.append_child(html, img);
        assert_eq!(tree.parent(img), Some(html));
        assert!(tree.children(scroller).is_empty());

        tree.detach(img);
        assert_eq!(tree.parent(img), None);
        assert_eq!(tree.closest(img, ".scroller"), None);
    }
}
