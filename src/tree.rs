/* The labeled tree produced by a parse. Every rule application contributes one
 * node under the rule's name; nodes built while matching one parent construct
 * are merged into the parent's tree. */

use serde_json::Value;

use std::fmt;
use std::ops::Range;
use std::sync::Arc;


/* Public Interface */

/* Maps rule names to the nodes matched for them, in order of first appearance. */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTree {
    entries: Vec<(String, Slot)>,
}

/* A rule applied once while matching the parent holds a single node; applied
 * several times (in a sequence, or across repetitions) it holds them all, in
 * the order they were matched. */
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    One(Arc<RuleNode>),
    Many(Vec<Arc<RuleNode>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleNode {
    /* The matched text as a JSON string, or whatever the rule's rewrite made of it. */
    pub value: Value,
    /* Byte range of the input this node matched. */
    pub span: Range<usize>,
    pub children: RuleTree,
}

impl RuleTree {
    pub fn new() -> Self {
        RuleTree::default()
    }

    pub fn single(name: impl Into<String>, node: RuleNode) -> Self {
        RuleTree { entries: vec![(name.into(), Slot::One(Arc::new(node)))] }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.entries.iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, slot)| slot)
    }

    /* The first node matched for `name`. */
    pub fn get(&self, name: &str) -> Option<&RuleNode> {
        self.get_all(name).first().map(|node| &**node)
    }

    /* Every node matched for `name`; empty if the rule never matched here. */
    pub fn get_all(&self, name: &str) -> &[Arc<RuleNode>] {
        self.slot(name).map(Slot::nodes).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.entries.iter().map(|(name, slot)| (name.as_str(), slot))
    }

    /* Appends `other` after the nodes already present. A name present in
     * both becomes a Slot::Many holding this tree's nodes first. */
    pub fn merge(&mut self, other: RuleTree) {
        for (name, slot) in other.entries {
            match self.entries.iter_mut().find(|(entry_name, _)| *entry_name == name) {
                Some((_, existing)) => existing.extend(slot),
                None => self.entries.push((name, slot)),
            }
        }
    }

    /* Pre-order traversal; the visitor gets the rule name, the node and its
     * depth (0 for the nodes of this tree). */
    pub fn walk<F>(&self, visitor: &mut F)
    where
        F: FnMut(&str, &RuleNode, usize),
    {
        self.walk_at(0, visitor);
    }

    fn walk_at<F>(&self, depth: usize, visitor: &mut F)
    where
        F: FnMut(&str, &RuleNode, usize),
    {
        for (name, slot) in self.iter() {
            for node in slot.nodes() {
                let node: &RuleNode = node;
                visitor(name, node, depth);
                node.children.walk_at(depth + 1, visitor);
            }
        }
    }

    /* Nodes without children, in document order. */
    pub fn leaves(&self) -> Vec<&RuleNode> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves.sort_by_key(|node| node.span.start);
        leaves
    }

    fn collect_leaves<'t>(&'t self, leaves: &mut Vec<&'t RuleNode>) {
        for (_, slot) in self.iter() {
            for node in slot.nodes() {
                let node: &'t RuleNode = node;
                if node.is_leaf() {
                    leaves.push(node);
                }
                else {
                    node.children.collect_leaves(leaves);
                }
            }
        }
    }
}

impl Slot {
    pub fn nodes(&self) -> &[Arc<RuleNode>] {
        match self {
            Slot::One(node) => std::slice::from_ref(node),
            Slot::Many(nodes) => nodes,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }

    fn into_nodes(self) -> Vec<Arc<RuleNode>> {
        match self {
            Slot::One(node) => vec![node],
            Slot::Many(nodes) => nodes,
        }
    }

    fn extend(&mut self, other: Slot) {
        let mut nodes = std::mem::replace(self, Slot::Many(Vec::new())).into_nodes();
        nodes.extend(other.into_nodes());
        *self = Slot::Many(nodes);
    }
}

impl RuleNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /* The value as text, if it is still a string (i.e. not rewritten into
     * something else). */
    pub fn text(&self) -> Option<&str> {
        self.value.as_str()
    }
}


/* Pretty printing */

/* Renders a tree one rule per line. Leaves show their value as JSON; repeated
 * rules list each node on a "- " line below the rule name. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreePrinter {
    pub indent: usize,
    /* Show values on inner nodes too, not only on leaves. */
    pub all_values: bool,
}

impl Default for TreePrinter {
    fn default() -> Self {
        TreePrinter { indent: 2, all_values: false }
    }
}

impl TreePrinter {
    pub fn render(&self, tree: &RuleTree) -> String {
        self.render_at(tree, 0)
    }

    pub(crate) fn render_at(&self, tree: &RuleTree, level: usize) -> String {
        let mut lines = Vec::new();
        self.push_lines(tree, level, &mut lines);
        lines.join("\n")
    }

    fn push_lines(&self, tree: &RuleTree, level: usize, lines: &mut Vec<String>) {
        for (name, slot) in tree.iter() {
            match slot {
                Slot::One(node) => {
                    let mut line = format!("{}{}", " ".repeat(level), name);
                    if self.shows_value(node) {
                        line.push_str(&format!(": {}", node.value));
                    }
                    lines.push(line);
                    self.push_lines(&node.children, level + self.indent, lines);
                }
                Slot::Many(nodes) => {
                    lines.push(format!("{}{}", " ".repeat(level), name));
                    for node in nodes {
                        let mut line = format!("{}-", " ".repeat(level + self.indent));
                        if self.shows_value(node) {
                            line.push_str(&format!(" {}", node.value));
                        }
                        lines.push(line);
                        self.push_lines(&node.children, level + 2 * self.indent, lines);
                    }
                }
            }
        }
    }

    fn shows_value(&self, node: &RuleNode) -> bool {
        self.all_values || node.is_leaf()
    }
}

impl fmt::Display for RuleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&TreePrinter::default().render(self))
    }
}


/* Tests */

#[cfg(test)]
mod tests {
    use super::*;

    use indoc::indoc;

    fn leaf(text: &str, start: usize) -> RuleNode {
        RuleNode {
            value: Value::from(text),
            span: start..start + text.len(),
            children: RuleTree::new(),
        }
    }

    fn inner(text: &str, start: usize, children: RuleTree) -> RuleNode {
        RuleNode { value: Value::from(text), span: start..start + text.len(), children }
    }

    #[test]
    fn merge_accumulates_repeated_rules() {
        let mut tree = RuleTree::single("digit", leaf("1", 0));
        tree.merge(RuleTree::single("op", leaf("+", 1)));
        tree.merge(RuleTree::single("digit", leaf("2", 2)));

        assert_eq!(tree.len(), 2);
        assert!(matches!(tree.slot("op"), Some(Slot::One(_))));

        let digits: Vec<_> = tree.get_all("digit").iter()
            .map(|node| node.text().unwrap_or_default().to_string())
            .collect();
        assert_eq!(digits, vec!["1", "2"]);

        let names: Vec<_> = tree.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["digit", "op"]);
    }

    #[test]
    fn merging_many_into_many_keeps_order() {
        let mut left = RuleTree::single("a", leaf("x", 0));
        left.merge(RuleTree::single("a", leaf("y", 1)));
        let mut right = RuleTree::single("a", leaf("z", 2));
        right.merge(RuleTree::single("a", leaf("w", 3)));

        left.merge(right);

        assert_eq!(left.get_all("a").len(), 4);
        assert_eq!(left.get_all("a")[3].text(), Some("w"));
        assert_eq!(left.get_all("missing").len(), 0);
        assert!(left.get("missing").is_none());
    }

    #[test]
    fn leaves_come_out_in_document_order() {
        let mut children = RuleTree::single("b", leaf("b", 1));
        children.merge(RuleTree::single("a", leaf("c", 2)));
        let mut tree = RuleTree::single("a", leaf("a", 0));
        tree.merge(RuleTree::single("wrap", inner("bc", 1, children)));

        let text: String = tree.leaves().iter()
            .filter_map(|node| node.text())
            .collect();
        assert_eq!(text, "abc");
    }

    #[test]
    fn walk_reports_depth() {
        let children = RuleTree::single("digit", leaf("7", 0));
        let tree = RuleTree::single("number", inner("7", 0, children));

        let mut seen = Vec::new();
        tree.walk(&mut |name, _, depth| seen.push((name.to_string(), depth)));

        assert_eq!(seen, vec![("number".to_string(), 0), ("digit".to_string(), 1)]);
    }

    #[test]
    fn pretty_printing() {
        let mut children = RuleTree::single("digit", leaf("1", 0));
        children.merge(RuleTree::single("digit", leaf("2", 1)));
        let mut tree = RuleTree::single("number", inner("12", 0, children));
        tree.merge(RuleTree::single("unit", leaf("k\"g", 2)));

        assert_eq!(tree.to_string(), indoc! {r#"
            number
              digit
                - "1"
                - "2"
            unit: "k\"g""#});

        let printer = TreePrinter { indent: 4, all_values: true };
        assert_eq!(printer.render(&tree), indoc! {r#"
            number: "12"
                digit
                    - "1"
                    - "2"
            unit: "k\"g""#});
    }

    #[test]
    fn rewritten_values_print_as_json() {
        let node = RuleNode { value: Value::from(42), span: 0..2, children: RuleTree::new() };
        assert_eq!(RuleTree::single("number", node).to_string(), "number: 42");
    }
}
