//! Rendering a knowledge tree to a file.
//!
//! [`HtmlRenderer`] writes a standalone vis-network page; [`DotRenderer`]
//! writes Graphviz DOT through `petgraph::dot`.

use std::path::{Path, PathBuf};

use petgraph::dot::{Config, Dot};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::{RenderError, RenderResult};
use crate::tree::{KnowledgeTree, NodeGroup, TreeExport, TreeNode};

const VIS_NETWORK_JS: &str =
    "https://unpkg.com/vis-network@9.1.9/standalone/umd/vis-network.min.js";

/// Fill and border colours for a node group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStyle {
    pub background: &'static str,
    pub border: &'static str,
}

impl NodeStyle {
    pub const ROOT: Self = Self {
        background: "#FFD700",
        border: "#DAA520",
    };
    pub const BRANCH: Self = Self {
        background: "#87CEEB",
        border: "#4682B4",
    };

    pub fn for_group(group: NodeGroup) -> Self {
        match group {
            NodeGroup::Root => Self::ROOT,
            NodeGroup::CoreConcept | NodeGroup::Paper | NodeGroup::FoundationalTopic => {
                Self::BRANCH
            }
        }
    }
}

/// Something that turns a tree into a visual artifact.
pub trait GraphRenderer {
    /// File extension of the artifact, without the dot.
    fn extension(&self) -> &'static str;

    fn render(&self, tree: &KnowledgeTree) -> RenderResult<String>;

    /// Render and write to `path`, creating parent directories.
    fn render_to_file(&self, tree: &KnowledgeTree, path: &Path) -> RenderResult<PathBuf> {
        let content = self.render(tree)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RenderError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| RenderError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        info!(path = %path.display(), nodes = tree.node_count(), "rendered tree");
        Ok(path.to_path_buf())
    }
}

#[derive(Serialize)]
struct VisColor {
    background: &'static str,
    border: &'static str,
}

#[derive(Serialize)]
struct VisNode<'a> {
    id: &'a str,
    label: &'a str,
    title: &'a str,
    group: &'static str,
    shape: &'static str,
    color: VisColor,
}

#[derive(Serialize)]
struct VisEdge<'a> {
    from: &'a str,
    to: &'a str,
    arrows: &'static str,
}

/// Interactive HTML page (vis-network from a CDN).
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    pub height: String,
    pub width: String,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self {
            height: "750px".into(),
            width: "100%".into(),
        }
    }
}

impl HtmlRenderer {
    fn options() -> serde_json::Value {
        json!({
            "nodes": {"font": {"size": 16}, "shape": "box"},
            "edges": {"smooth": false},
            "physics": {
                "forceAtlas2Based": {
                    "gravitationalConstant": -100,
                    "centralGravity": 0.01,
                    "springLength": 200,
                    "springConstant": 0.05
                },
                "minVelocity": 0.75,
                "solver": "forceAtlas2Based"
            },
            "interaction": {"hover": true, "dragNodes": true}
        })
    }
}

impl GraphRenderer for HtmlRenderer {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, tree: &KnowledgeTree) -> RenderResult<String> {
        let export = tree.export();
        let nodes: Vec<VisNode<'_>> = export
            .nodes
            .iter()
            .map(|n| {
                let style = NodeStyle::for_group(n.group);
                VisNode {
                    id: &n.id,
                    label: &n.label,
                    title: &n.metadata,
                    group: n.group.as_str(),
                    shape: "box",
                    color: VisColor {
                        background: style.background,
                        border: style.border,
                    },
                }
            })
            .collect();
        let edges: Vec<VisEdge<'_>> = export
            .edges
            .iter()
            .map(|e| VisEdge {
                from: &e.source,
                to: &e.target,
                arrows: "to",
            })
            .collect();

        let nodes = script_json(&nodes)?;
        let edges = script_json(&edges)?;
        let options = script_json(&Self::options())?;
        let title = escape_html(&tree.root().label);

        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{VIS_NETWORK_JS}"></script>
<style>
  body {{ margin: 0; font-family: sans-serif; }}
  #tree {{ width: {width}; height: {height}; border: 1px solid lightgray; }}
</style>
</head>
<body>
<div id="tree"></div>
<script>
  var nodes = new vis.DataSet({nodes});
  var edges = new vis.DataSet({edges});
  var options = {options};
  var network = new vis.Network(document.getElementById("tree"), {{nodes: nodes, edges: edges}}, options);
</script>
</body>
</html>
"#,
            width = self.width,
            height = self.height,
        ))
    }
}

/// Graphviz DOT.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotRenderer;

impl GraphRenderer for DotRenderer {
    fn extension(&self) -> &'static str {
        "dot"
    }

    fn render(&self, tree: &KnowledgeTree) -> RenderResult<String> {
        let node_attrs = |node: &TreeNode| {
            let style = NodeStyle::for_group(node.group);
            format!(
                "label = {:?}, tooltip = {:?}, shape = box, style = filled, fillcolor = \"{}\", color = \"{}\"",
                node.label, node.metadata, style.background, style.border
            )
        };
        // Attribute getters are borrowed by `Dot`; format in one expression.
        Ok(format!(
            "{:?}",
            Dot::with_attr_getters(
                tree.graph(),
                &[Config::NodeNoLabel, Config::EdgeNoLabel],
                &|_, _| String::new(),
                &|_, (_, node)| node_attrs(node),
            )
        ))
    }
}

/// Load a tree from a `knowledge_tree` JSON dump.
pub fn load_tree(path: &Path) -> RenderResult<KnowledgeTree> {
    let content = std::fs::read_to_string(path).map_err(|e| RenderError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let export: TreeExport = serde_json::from_str(&content).map_err(|e| RenderError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    KnowledgeTree::from_export(export)
}

/// JSON that is safe to inline in a `<script>` element.
fn script_json<T: Serialize + ?Sized>(value: &T) -> RenderResult<String> {
    serde_json::to_string(value)
        .map(|s| s.replace("</", "<\\/"))
        .map_err(|e| RenderError::Encode {
            message: e.to_string(),
        })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::enrich::EnrichedTopics;
    use crate::pipeline::explain::Explanations;
    use crate::pipeline::selection::SelectedSet;
    use crate::provider::FoundationalTopic;
    use crate::tree::TreeInputs;

    fn tree() -> KnowledgeTree {
        let core = vec!["RL".to_string()];
        let mut pruned = SelectedSet::new();
        pruned.insert("RL".into(), vec!["Q-Learning </script>".into()]);
        let mut topics = EnrichedTopics::new();
        topics.insert(
            "Q-Learning </script>".into(),
            vec![FoundationalTopic {
                topic: "MDPs".into(),
                resource: None,
            }],
        );
        let explanations = Explanations::new();
        KnowledgeTree::assemble(&TreeInputs {
            project_title: "Robots & \"Learning\"",
            core_concepts: &core,
            pruned: &pruned,
            topics: &topics,
            explanations: &explanations,
        })
    }

    #[test]
    fn html_embeds_styled_nodes() {
        let html = HtmlRenderer::default().render(&tree()).unwrap();
        assert!(html.contains(VIS_NETWORK_JS));
        assert!(html.contains("<title>Robots &amp; &quot;Learning&quot;</title>"));
        assert!(html.contains("#FFD700"));
        assert!(html.contains("#87CEEB"));
        assert!(html.contains("forceAtlas2Based"));
        assert!(html.contains(r#""arrows":"to""#));
        // Labels cannot close the script element early.
        assert_eq!(html.matches("</script>").count(), 2);
    }

    #[test]
    fn dot_lists_every_node_and_edge() {
        let dot = DotRenderer.render(&tree()).unwrap();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("label = \"MDPs\""));
        assert!(dot.contains("fillcolor = \"#FFD700\""));
        assert_eq!(dot.matches(" -> ").count(), 3);
    }

    #[test]
    fn render_to_file_then_load_export() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = tree();
        let out = HtmlRenderer::default()
            .render_to_file(&t, &dir.path().join("out/tree.html"))
            .unwrap();
        assert!(out.is_file());

        let json_path = dir.path().join("tree.json");
        std::fs::write(&json_path, serde_json::to_string(&t.export()).unwrap()).unwrap();
        let loaded = load_tree(&json_path).unwrap();
        assert_eq!(loaded.export(), t.export());
    }

    #[test]
    fn load_tree_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_tree(&path), Err(RenderError::Read { .. })));
    }
}
