//! Hierarchical team tree to graph expansion.
//!
//! The team builder UI describes a nested leader/member tree; the engine
//! flattens it into an equivalent `{nodes, edges}` pair: one node per
//! member, one edge per leader→member relation, leaders get an
//! orchestration-augmented prompt. Layout hints are opaque to the engine
//! and passed through keyed by the generated node id. Members carry stable
//! ids (caller-provided or generated), never positional paths.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::types::{AgentConfig, AgentNode, AgentRole, Edge, FailureAction};

/// One member of the team tree. A member with children is a leader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    /// Stable id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub role: AgentRole,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub config: AgentConfig,
    #[serde(default)]
    pub children: Vec<TeamMember>,
    /// Opaque layout hint, passed through untouched.
    #[serde(default)]
    pub layout: Option<Value>,
}

/// Result of expanding a team tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamExpansion {
    pub nodes: Vec<AgentNode>,
    pub edges: Vec<Edge>,
    /// Node id → layout hint for members that carried one.
    pub layout_hints: HashMap<String, Value>,
}

/// Expand a team tree into graph nodes and edges.
pub fn expand_team(root: &TeamMember) -> TeamExpansion {
    let mut expansion = TeamExpansion {
        nodes: Vec::new(),
        edges: Vec::new(),
        layout_hints: HashMap::new(),
    };
    expand_member(root, None, &mut expansion);
    expansion
}

fn expand_member(member: &TeamMember, parent_id: Option<&str>, out: &mut TeamExpansion) -> String {
    let id = member
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let prompt = if member.children.is_empty() {
        member.prompt.clone()
    } else {
        orchestration_prompt(member)
    };

    out.nodes.push(AgentNode {
        id: id.clone(),
        name: member.name.clone(),
        role: member.role,
        config: member.config.clone(),
        inputs: vec![],
        outputs: vec![],
        prompt_template: prompt,
        success_criteria: String::new(),
        on_failure: FailureAction::Abort,
    });

    if let Some(layout) = &member.layout {
        out.layout_hints.insert(id.clone(), layout.clone());
    }

    if let Some(parent) = parent_id {
        let edge_id = format!("{}->{}", parent, id);
        let mut edge = Edge::new(edge_id, parent, id.clone());
        edge.priority = out.edges.iter().filter(|e| e.source == parent).count() as i32;
        out.edges.push(edge);
    }

    for child in &member.children {
        expand_member(child, Some(&id), out);
    }

    id
}

/// Leaders get their prompt prefixed with delegation instructions naming
/// their direct reports.
fn orchestration_prompt(leader: &TeamMember) -> String {
    let reports: Vec<&str> = leader.children.iter().map(|c| c.name.as_str()).collect();
    format!(
        "You lead a team. Delegate sub-tasks to your direct reports ({}), \
         review their results, and integrate them before reporting up.\n\n{}",
        reports.join(", "),
        leader.prompt
    )
}
