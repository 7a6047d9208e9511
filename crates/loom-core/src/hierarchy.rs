//! Hierarchy builder — turns a flat concept table into the navigation tree.
//!
//! A pure function from a document's concepts to a rooted tree:
//! Document → Cluster → Refinement → Concept. Hierarchy metadata comes from a
//! best-effort external extraction step, so malformed pointers degrade to an
//! "Uncategorized" attachment instead of failing. Construction is a two-pass
//! index-then-walk; parent pointers are never followed recursively.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::ontology::{Concept, HierarchyLevel};

// ─── Tree types ──────────────────────────────────────────────────────────────

/// What a tree node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  /// The synthetic document root.
  Document,
  Cluster,
  Refinement,
  Concept,
  /// Synthetic bucket for concepts with no resolvable placement.
  Uncategorized,
  /// Synthetic per-type group used by the legacy fallback.
  TypeGroup,
}

/// One node of the navigation tree, in the shape the navigation collaborator
/// consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
  /// Concept id for concept-backed nodes, or a synthetic id
  /// (`doc:…`, `uncategorized`, `type:…`).
  pub id:         String,
  pub label:      String,
  pub node_kind:  NodeKind,
  /// Set iff this node is backed by an input concept.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub concept_id: Option<Uuid>,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub kind:       Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub confidence: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub coherence:  Option<f64>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children:   Vec<TreeNode>,
}

impl TreeNode {
  fn synthetic(id: impl Into<String>, label: impl Into<String>, node_kind: NodeKind) -> Self {
    Self {
      id: id.into(),
      label: label.into(),
      node_kind,
      concept_id: None,
      kind: None,
      confidence: None,
      coherence: None,
      children: Vec::new(),
    }
  }

  fn for_concept(concept: &Concept, node_kind: NodeKind) -> Self {
    Self {
      id:         concept.concept_id.to_string(),
      label:      concept.label.clone(),
      node_kind,
      concept_id: Some(concept.concept_id),
      kind:       Some(concept.kind.clone()),
      confidence: Some(concept.confidence),
      coherence:  concept.coherence,
      children:   Vec::new(),
    }
  }

  /// All concept ids in the tree, in depth-first order.
  pub fn concept_ids(&self) -> Vec<Uuid> {
    let mut out = Vec::new();
    let mut stack = vec![self];
    while let Some(node) = stack.pop() {
      if let Some(id) = node.concept_id {
        out.push(id);
      }
      for child in node.children.iter().rev() {
        stack.push(child);
      }
    }
    out
  }

  /// Number of concept-backed nodes in the tree.
  pub fn concept_count(&self) -> usize {
    self.concept_ids().len()
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Build the navigation tree for one document.
///
/// Totality: every concept in `concepts` appears in the output exactly once.
/// Deterministic: children are ordered by (label, id), independent of input
/// order. Input is never mutated.
pub fn build_hierarchy(doc_id: Uuid, title: &str, concepts: &[Concept]) -> TreeNode {
  let mut root =
    TreeNode::synthetic(format!("doc:{doc_id}"), title, NodeKind::Document);

  if concepts.is_empty() {
    return root;
  }

  // Legacy documents carry no hierarchy metadata at all; group by type.
  if concepts.iter().all(|c| !c.has_hierarchy_metadata()) {
    root.children = type_groups(concepts);
    return root;
  }

  // Pass 1: index.
  let by_id: HashMap<Uuid, &Concept> =
    concepts.iter().map(|c| (c.concept_id, c)).collect();
  let is_level = |id: Uuid, level: HierarchyLevel| {
    by_id.get(&id).is_some_and(|c| c.hierarchy_level == Some(level))
  };

  let mut refinements_of: HashMap<Uuid, Vec<&Concept>> = HashMap::new();
  let mut direct_of: HashMap<Uuid, Vec<&Concept>> = HashMap::new();
  let mut leaves_of: HashMap<Uuid, Vec<&Concept>> = HashMap::new();

  for c in concepts {
    match (c.hierarchy_level, c.parent_cluster_id, c.parent_concept_id) {
      (Some(HierarchyLevel::Refinement), Some(cluster), _)
        if is_level(cluster, HierarchyLevel::Cluster) =>
      {
        refinements_of.entry(cluster).or_default().push(c);
      }
      (Some(HierarchyLevel::Concept), _, Some(refinement))
        if is_level(refinement, HierarchyLevel::Refinement) =>
      {
        leaves_of.entry(refinement).or_default().push(c);
      }
      (Some(HierarchyLevel::Concept), Some(cluster), None)
        if is_level(cluster, HierarchyLevel::Cluster) =>
      {
        direct_of.entry(cluster).or_default().push(c);
      }
      _ => {} // placed by the orphan passes below
    }
  }

  // Pass 2: walk levels 1 → 2 → 3, attaching children from the index.
  let mut placed: HashSet<Uuid> = HashSet::new();

  let mut clusters: Vec<&Concept> = concepts
    .iter()
    .filter(|c| c.hierarchy_level == Some(HierarchyLevel::Cluster))
    .collect();
  sort_concepts(&mut clusters);

  for cluster in clusters {
    let mut node = TreeNode::for_concept(cluster, NodeKind::Cluster);
    placed.insert(cluster.concept_id);

    let mut children: Vec<TreeNode> = Vec::new();
    if let Some(mut refs) = refinements_of.remove(&cluster.concept_id) {
      sort_concepts(&mut refs);
      for refinement in refs {
        children.push(refinement_subtree(refinement, &mut leaves_of, &mut placed));
      }
    }
    if let Some(mut direct) = direct_of.remove(&cluster.concept_id) {
      sort_concepts(&mut direct);
      for leaf in direct {
        placed.insert(leaf.concept_id);
        children.push(TreeNode::for_concept(leaf, NodeKind::Concept));
      }
    }
    sort_nodes(&mut children);
    node.children = children;
    root.children.push(node);
  }

  // Orphan pass 1: refinements whose cluster pointer dangles or points at the
  // wrong level keep their own children, parked under Uncategorized.
  let mut uncategorized: Vec<TreeNode> = Vec::new();
  let mut orphan_refinements: Vec<&Concept> = concepts
    .iter()
    .filter(|c| {
      c.hierarchy_level == Some(HierarchyLevel::Refinement)
        && !placed.contains(&c.concept_id)
    })
    .collect();
  sort_concepts(&mut orphan_refinements);
  for refinement in orphan_refinements {
    warn!(
      concept_id = %refinement.concept_id,
      label = %refinement.label,
      "refinement has no resolvable cluster; attaching under Uncategorized"
    );
    uncategorized.push(refinement_subtree(refinement, &mut leaves_of, &mut placed));
  }

  // Orphan pass 2: everything still unplaced becomes an Uncategorized leaf.
  // This is what guarantees totality.
  let mut leftovers: Vec<&Concept> = concepts
    .iter()
    .filter(|c| !placed.contains(&c.concept_id))
    .collect();
  sort_concepts(&mut leftovers);
  for concept in leftovers {
    warn!(
      concept_id = %concept.concept_id,
      label = %concept.label,
      "concept has no resolvable placement; attaching under Uncategorized"
    );
    placed.insert(concept.concept_id);
    uncategorized.push(TreeNode::for_concept(concept, NodeKind::Concept));
  }

  if !uncategorized.is_empty() {
    sort_nodes(&mut uncategorized);
    let mut bucket =
      TreeNode::synthetic("uncategorized", "Uncategorized", NodeKind::Uncategorized);
    bucket.children = uncategorized;
    root.children.push(bucket);
  }

  root
}

/// A refinement node with its level-3 children attached.
fn refinement_subtree<'a>(
  refinement: &'a Concept,
  leaves_of: &mut HashMap<Uuid, Vec<&'a Concept>>,
  placed: &mut HashSet<Uuid>,
) -> TreeNode {
  let mut node = TreeNode::for_concept(refinement, NodeKind::Refinement);
  placed.insert(refinement.concept_id);
  if let Some(mut leaves) = leaves_of.remove(&refinement.concept_id) {
    sort_concepts(&mut leaves);
    for leaf in leaves {
      placed.insert(leaf.concept_id);
      node.children.push(TreeNode::for_concept(leaf, NodeKind::Concept));
    }
  }
  node
}

/// Legacy fallback: a flat two-level tree grouping concepts by type.
fn type_groups(concepts: &[Concept]) -> Vec<TreeNode> {
  let mut groups: HashMap<&str, Vec<&Concept>> = HashMap::new();
  for c in concepts {
    groups.entry(c.kind.as_str()).or_default().push(c);
  }

  let mut names: Vec<&str> = groups.keys().copied().collect();
  names.sort_unstable();

  names
    .into_iter()
    .map(|name| {
      let mut node =
        TreeNode::synthetic(format!("type:{name}"), name, NodeKind::TypeGroup);
      let mut members = groups.remove(name).unwrap_or_default();
      sort_concepts(&mut members);
      node.children = members
        .into_iter()
        .map(|c| TreeNode::for_concept(c, NodeKind::Concept))
        .collect();
      node
    })
    .collect()
}

fn sort_concepts(concepts: &mut [&Concept]) {
  concepts.sort_by(|a, b| {
    (a.label.as_str(), a.concept_id).cmp(&(b.label.as_str(), b.concept_id))
  });
}

fn sort_nodes(nodes: &mut [TreeNode]) {
  nodes.sort_by(|a, b| (a.label.as_str(), a.id.as_str()).cmp(&(b.label.as_str(), b.id.as_str())));
}
