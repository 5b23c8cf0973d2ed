//! Sankey graph construction for the cause → severity flow diagram.
//!
//! Causes are ranked by their summed count; the top `N` keep their own
//! node and every other cause is folded into a single [`OTHER_BUCKET`]
//! node before nodes and links are built.

use std::collections::BTreeMap;

use crash_stats_dashboard_models::SankeyRow;
use serde::Serialize;

/// Label of the node absorbing causes outside the top-N.
pub const OTHER_BUCKET: &str = "Other";

/// Options for [`build_sankey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SankeyOptions {
    /// Number of causes that keep their own node.
    pub top_n: usize,
    /// Drill-down: when set, only rows for this cause are considered.
    pub cause: Option<String>,
}

impl SankeyOptions {
    /// Options keeping the `top_n` largest causes.
    #[must_use]
    pub const fn top(top_n: usize) -> Self {
        Self { top_n, cause: None }
    }
}

/// Which side of the diagram a node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A (possibly bucketed) cause.
    Cause,
    /// A severity level.
    Severity,
}

/// A sankey node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SankeyNode {
    /// Display label, unique within the graph.
    pub name: String,
    /// Side of the diagram.
    pub kind: NodeKind,
}

/// A flow between two nodes, by index into [`SankeyGraph::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SankeyLink {
    /// Index of the cause node.
    pub source: usize,
    /// Index of the severity node.
    pub target: usize,
    /// Crash count.
    pub value: u64,
}

/// Nodes and links of a sankey diagram.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SankeyGraph {
    /// Cause nodes in encounter order, followed by severity nodes in
    /// encounter order.
    pub nodes: Vec<SankeyNode>,
    /// One link per input row that survived filtering.
    pub links: Vec<SankeyLink>,
}

impl SankeyGraph {
    /// Returns the node labels in order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.name.as_str()).collect()
    }

    /// Returns the number of cause-side nodes.
    #[must_use]
    pub fn cause_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Cause)
            .count()
    }

    /// Returns `true` if the graph has no flows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Builds a sankey graph from `(cause, severity, count)` rows.
///
/// 1. When `options.cause` is set, rows for other causes are dropped.
/// 2. Counts are summed per cause and causes are ranked by total,
///    descending; ties keep their first-encounter order.
/// 3. Causes outside the top `options.top_n` are renamed to
///    [`OTHER_BUCKET`].
/// 4. Nodes are the reduced causes in encounter order followed by the
///    distinct severities in encounter order. A severity whose label
///    collides with a cause gets a `" (severity)"` suffix so labels stay
///    unique.
/// 5. Each surviving row becomes one link.
#[must_use]
pub fn build_sankey(rows: &[SankeyRow], options: &SankeyOptions) -> SankeyGraph {
    let rows: Vec<&SankeyRow> = rows
        .iter()
        .filter(|row| options.cause.as_ref().is_none_or(|cause| &row.cause == cause))
        .collect();

    let kept = top_causes(&rows, options.top_n);

    let reduced: Vec<(&str, &str, u64)> = rows
        .iter()
        .map(|row| {
            let cause = if kept.contains(&row.cause.as_str()) {
                row.cause.as_str()
            } else {
                OTHER_BUCKET
            };
            (cause, row.severity.as_str(), row.count)
        })
        .collect();

    let mut nodes: Vec<SankeyNode> = Vec::new();
    let mut cause_index: BTreeMap<&str, usize> = BTreeMap::new();
    for (cause, _, _) in &reduced {
        cause_index.entry(*cause).or_insert_with(|| {
            nodes.push(SankeyNode {
                name: (*cause).to_string(),
                kind: NodeKind::Cause,
            });
            nodes.len() - 1
        });
    }

    let mut severity_index: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, severity, _) in &reduced {
        severity_index.entry(*severity).or_insert_with(|| {
            let name = if cause_index.contains_key(severity) {
                format!("{severity} (severity)")
            } else {
                (*severity).to_string()
            };
            nodes.push(SankeyNode {
                name,
                kind: NodeKind::Severity,
            });
            nodes.len() - 1
        });
    }

    let links = reduced
        .iter()
        .map(|(cause, severity, count)| SankeyLink {
            source: cause_index[cause],
            target: severity_index[severity],
            value: *count,
        })
        .collect();

    SankeyGraph { nodes, links }
}

/// Returns the `top_n` causes by summed count. Ties are broken by first
/// encounter order.
fn top_causes<'a>(rows: &[&'a SankeyRow], top_n: usize) -> Vec<&'a str> {
    let mut totals: Vec<(&str, u64)> = Vec::new();
    let mut position: BTreeMap<&str, usize> = BTreeMap::new();

    for &row in rows {
        let idx = *position.entry(row.cause.as_str()).or_insert_with(|| {
            totals.push((row.cause.as_str(), 0));
            totals.len() - 1
        });
        totals[idx].1 += row.count;
    }

    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals.into_iter().take(top_n).map(|(cause, _)| cause).collect()
}
