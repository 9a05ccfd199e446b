//! Knowledge-tree assembly.
//!
//! Builds the four-level graph project → core concept → paper → foundational
//! topic from finished stage outputs. Nodes are keyed by (group, label): a
//! paper kept under two concepts is one node with two parents, and a topic
//! shared by several papers is one node with several parents. Edges always
//! point from parent to child.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::pipeline::enrich::EnrichedTopics;
use crate::pipeline::explain::Explanations;
use crate::pipeline::selection::SelectedSet;

/// Level of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeGroup {
    Root,
    CoreConcept,
    Paper,
    FoundationalTopic,
}

impl NodeGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::CoreConcept => "core-concept",
            Self::Paper => "paper",
            Self::FoundationalTopic => "foundational-topic",
        }
    }

    fn id_prefix(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::CoreConcept => "concept",
            Self::Paper => "paper",
            Self::FoundationalTopic => "topic",
        }
    }

    pub fn depth(self) -> usize {
        match self {
            Self::Root => 0,
            Self::CoreConcept => 1,
            Self::Paper => 2,
            Self::FoundationalTopic => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub label: String,
    pub group: NodeGroup,
    /// Free text shown on hover.
    pub metadata: String,
}

/// Everything the assembler reads.
#[derive(Debug, Clone, Copy)]
pub struct TreeInputs<'a> {
    pub project_title: &'a str,
    pub core_concepts: &'a [String],
    pub pruned: &'a SelectedSet,
    pub topics: &'a EnrichedTopics,
    pub explanations: &'a Explanations,
}

pub struct KnowledgeTree {
    graph: DiGraph<TreeNode, ()>,
    index: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

impl KnowledgeTree {
    /// Assemble the tree. Pure and deterministic.
    pub fn assemble(inputs: &TreeInputs<'_>) -> Self {
        let root_id = node_id(NodeGroup::Root, inputs.project_title);
        let mut graph = DiGraph::new();
        let root = graph.add_node(TreeNode {
            id: root_id.clone(),
            label: inputs.project_title.to_string(),
            group: NodeGroup::Root,
            metadata: "Project Title".into(),
        });
        let index = HashMap::from([(root_id, root)]);
        let mut tree = Self { graph, index, root };

        let concepts = inputs
            .core_concepts
            .iter()
            .chain(inputs.pruned.keys().filter(|c| !inputs.core_concepts.contains(*c)));
        for concept in concepts {
            let concept_idx = tree.ensure_node(NodeGroup::CoreConcept, concept, || {
                "Core Concept".into()
            });
            tree.link(tree.root, concept_idx);

            let Some(papers) = inputs.pruned.get(concept) else {
                continue;
            };
            for paper in papers {
                let paper_idx = tree.ensure_node(NodeGroup::Paper, paper, || {
                    match inputs.explanations.get(paper) {
                        Some(why) => format!("Seminal Paper\n{why}"),
                        None => "Seminal Paper".into(),
                    }
                });
                tree.link(concept_idx, paper_idx);

                for topic in inputs.topics.get(paper).into_iter().flatten() {
                    let metadata = || {
                        format!(
                            "Foundational Topic\nResource: {}",
                            topic.resource_or_placeholder()
                        )
                    };
                    let topic_idx =
                        tree.ensure_node(NodeGroup::FoundationalTopic, &topic.topic, metadata);
                    tree.link(paper_idx, topic_idx);
                }
            }
        }
        tree
    }

    /// First insertion fixes a node's metadata.
    fn ensure_node(
        &mut self,
        group: NodeGroup,
        label: &str,
        metadata: impl FnOnce() -> String,
    ) -> NodeIndex {
        let id = node_id(group, label);
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(TreeNode {
            id: id.clone(),
            label: label.to_string(),
            group,
            metadata: metadata(),
        });
        self.index.insert(id, idx);
        idx
    }

    fn link(&mut self, parent: NodeIndex, child: NodeIndex) {
        if !self.graph.contains_edge(parent, child) {
            self.graph.add_edge(parent, child, ());
        }
    }

    pub fn graph(&self) -> &DiGraph<TreeNode, ()> {
        &self.graph
    }

    pub fn root(&self) -> &TreeNode {
        &self.graph[self.root]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.graph.node_weights()
    }

    pub fn node(&self, group: NodeGroup, label: &str) -> Option<&TreeNode> {
        self.index
            .get(&node_id(group, label))
            .map(|&idx| &self.graph[idx])
    }

    /// Parent labels of a node, sorted.
    pub fn parents(&self, group: NodeGroup, label: &str) -> Vec<&str> {
        self.neighbors(group, label, Direction::Incoming)
    }

    /// Child labels of a node, sorted.
    pub fn children(&self, group: NodeGroup, label: &str) -> Vec<&str> {
        self.neighbors(group, label, Direction::Outgoing)
    }

    fn neighbors(&self, group: NodeGroup, label: &str, dir: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(&node_id(group, label)) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| {
                let other = if dir == Direction::Incoming {
                    e.source()
                } else {
                    e.target()
                };
                self.graph[other].label.as_str()
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Serializable node and edge lists, in insertion order.
    pub fn export(&self) -> TreeExport {
        TreeExport {
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| TreeEdge {
                    source: self.graph[e.source()].id.clone(),
                    target: self.graph[e.target()].id.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild a tree from an export, checking it has one root, edges only
    /// between known ids, and edges that go exactly one level down.
    pub fn from_export(export: TreeExport) -> RenderResult<Self> {
        let invalid = |message: String| RenderError::InvalidTree { message };

        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut root = None;
        for node in export.nodes {
            if index.contains_key(&node.id) {
                return Err(invalid(format!("duplicate node id `{}`", node.id)));
            }
            let is_root = node.group == NodeGroup::Root;
            let id = node.id.clone();
            let idx = graph.add_node(node);
            index.insert(id, idx);
            if is_root {
                if root.is_some() {
                    return Err(invalid("more than one root node".into()));
                }
                root = Some(idx);
            }
        }
        let root = root.ok_or_else(|| invalid("no root node".into()))?;

        let mut tree = Self { graph, index, root };
        for edge in export.edges {
            let lookup = |id: &str| {
                tree.index
                    .get(id)
                    .copied()
                    .ok_or_else(|| invalid(format!("edge references unknown node `{id}`")))
            };
            let (source, target) = (lookup(&edge.source)?, lookup(&edge.target)?);
            if tree.graph[source].group.depth() + 1 != tree.graph[target].group.depth() {
                return Err(invalid(format!(
                    "edge `{}` -> `{}` skips or reverses a level",
                    edge.source, edge.target
                )));
            }
            tree.link(source, target);
        }
        Ok(tree)
    }
}

impl std::fmt::Debug for KnowledgeTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeTree")
            .field("root", &self.root().label)
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

fn node_id(group: NodeGroup, label: &str) -> String {
    format!("{}:{}", group.id_prefix(), label)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEdge {
    pub source: String,
    pub target: String,
}

/// Flat node/edge lists, the shape renderers and the JSON dump consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeExport {
    pub nodes: Vec<TreeNode>,
    pub edges: Vec<TreeEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FoundationalTopic;

    fn topic(name: &str, resource: Option<&str>) -> FoundationalTopic {
        FoundationalTopic {
            topic: name.into(),
            resource: resource.map(str::to_string),
        }
    }

    struct Fixture {
        core: Vec<String>,
        pruned: SelectedSet,
        topics: EnrichedTopics,
        explanations: Explanations,
    }

    impl Fixture {
        fn new() -> Self {
            let mut pruned = SelectedSet::new();
            pruned.insert("RL".into(), vec!["Q-Learning".into(), "DQN".into()]);
            pruned.insert("Control".into(), vec!["Q-Learning".into()]);
            let mut topics = EnrichedTopics::new();
            topics.insert(
                "Q-Learning".into(),
                vec![topic("MDPs", Some("Puterman 1994")), topic("Probability", None)],
            );
            topics.insert("DQN".into(), vec![topic("MDPs", None)]);
            let mut explanations = Explanations::new();
            explanations.insert("DQN".into(), "Deep function approximation.".into());
            Self {
                core: vec!["RL".into(), "Control".into(), "Vision".into()],
                pruned,
                topics,
                explanations,
            }
        }

        fn inputs(&self) -> TreeInputs<'_> {
            TreeInputs {
                project_title: "Robot Learning",
                core_concepts: &self.core,
                pruned: &self.pruned,
                topics: &self.topics,
                explanations: &self.explanations,
            }
        }
    }

    #[test]
    fn shared_papers_and_topics_are_single_nodes() {
        let f = Fixture::new();
        let tree = KnowledgeTree::assemble(&f.inputs());

        // root + 3 concepts + 2 papers + 2 topics
        assert_eq!(tree.node_count(), 8);
        assert_eq!(tree.nodes().filter(|n| n.group == NodeGroup::Root).count(), 1);
        assert_eq!(tree.parents(NodeGroup::Paper, "Q-Learning"), ["Control", "RL"]);
        assert_eq!(tree.parents(NodeGroup::FoundationalTopic, "MDPs"), ["DQN", "Q-Learning"]);
        assert!(tree.children(NodeGroup::CoreConcept, "Vision").is_empty());
        // 3 + 3 + 3
        assert_eq!(tree.edge_count(), 9);
    }

    #[test]
    fn metadata_strings() {
        let f = Fixture::new();
        let tree = KnowledgeTree::assemble(&f.inputs());
        assert_eq!(tree.root().metadata, "Project Title");
        assert_eq!(
            tree.node(NodeGroup::CoreConcept, "RL").unwrap().metadata,
            "Core Concept"
        );
        assert_eq!(
            tree.node(NodeGroup::Paper, "DQN").unwrap().metadata,
            "Seminal Paper\nDeep function approximation."
        );
        assert_eq!(
            tree.node(NodeGroup::FoundationalTopic, "Probability")
                .unwrap()
                .metadata,
            "Foundational Topic\nResource: No resource available"
        );
        assert_eq!(
            tree.node(NodeGroup::FoundationalTopic, "MDPs").unwrap().metadata,
            "Foundational Topic\nResource: Puterman 1994"
        );
    }

    #[test]
    fn assembly_is_idempotent() {
        let f = Fixture::new();
        let a = KnowledgeTree::assemble(&f.inputs()).export();
        let b = KnowledgeTree::assemble(&f.inputs()).export();
        assert_eq!(a, b);
    }

    #[test]
    fn export_roundtrip_and_validation() {
        let f = Fixture::new();
        let export = KnowledgeTree::assemble(&f.inputs()).export();
        let rebuilt = KnowledgeTree::from_export(export.clone()).unwrap();
        assert_eq!(rebuilt.export(), export);

        let mut broken = export.clone();
        broken.edges.push(TreeEdge {
            source: "root:Robot Learning".into(),
            target: "topic:MDPs".into(),
        });
        assert!(matches!(
            KnowledgeTree::from_export(broken),
            Err(RenderError::InvalidTree { .. })
        ));

        let mut rootless = export;
        rootless.nodes.retain(|n| n.group != NodeGroup::Root);
        rootless.edges.clear();
        assert!(KnowledgeTree::from_export(rootless).is_err());
    }
}
