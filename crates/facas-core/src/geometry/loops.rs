//! Closed-loop ("boca") detection over the segment graph (`§4.4`).
//!
//! Modeled as parallel arrays rather than a reference graph: nodes carry
//! adjacency as edge indices, edges reference node indices by position.

use std::collections::HashMap;

use crate::config::SemanticType;
use crate::geometry::segment::Segment;

struct Edge {
    a: usize,
    b: usize,
    layer: String,
}

/// Result of one loop-detection pass.
pub struct LoopDetectionResult {
    pub num_nodes: usize,
    pub closed_loops_by_type: HashMap<SemanticType, u64>,
    pub total_loops: u64,
    pub note: String,
}

fn quantize(x: f64, y: f64, tol: f64) -> (i64, i64) {
    ((x / tol).round() as i64, (y / tol).round() as i64)
}

fn node_id(
    key: (i64, i64),
    node_index: &mut HashMap<(i64, i64), usize>,
    nodes: &mut Vec<(i64, i64)>,
    adjacency: &mut Vec<Vec<usize>>,
) -> usize {
    *node_index.entry(key).or_insert_with(|| {
        nodes.push(key);
        adjacency.push(Vec::new());
        nodes.len() - 1
    })
}

/// Build the node/edge graph, BFS its connected components and count the
/// ones that are simple cycles (every node degree 2, at least 3 nodes and
/// edges).
pub fn detect_loops(
    segments: &[Segment],
    semantic_by_layer: &HashMap<String, SemanticType>,
    gap_tolerance: f64,
) -> LoopDetectionResult {
    let tol = gap_tolerance.max(1e-3).max(0.2);

    let mut node_index: HashMap<(i64, i64), usize> = HashMap::new();
    let mut nodes: Vec<(i64, i64)> = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut adjacency: Vec<Vec<usize>> = Vec::new();

    for seg in segments {
        if seg.is_degenerate(1e-9) {
            continue;
        }
        let a = node_id(quantize(seg.start.x, seg.start.y, tol), &mut node_index, &mut nodes, &mut adjacency);
        let b = node_id(quantize(seg.end.x, seg.end.y, tol), &mut node_index, &mut nodes, &mut adjacency);
        let edge_idx = edges.len();
        edges.push(Edge { a, b, layer: seg.layer.clone() });
        adjacency[a].push(edge_idx);
        adjacency[b].push(edge_idx);
    }

    let mut visited = vec![false; nodes.len()];
    let mut closed_loops_by_type: HashMap<SemanticType, u64> = HashMap::new();
    let mut total_loops: u64 = 0;

    for start in 0..nodes.len() {
        if visited[start] {
            continue;
        }
        let mut component_nodes = Vec::new();
        let mut component_edges: Vec<usize> = Vec::new();
        let mut queue = vec![start];
        visited[start] = true;

        while let Some(node) = queue.pop() {
            component_nodes.push(node);
            for &edge_idx in &adjacency[node] {
                if !component_edges.contains(&edge_idx) {
                    component_edges.push(edge_idx);
                }
                let other = if edges[edge_idx].a == node { edges[edge_idx].b } else { edges[edge_idx].a };
                if !visited[other] {
                    visited[other] = true;
                    queue.push(other);
                }
            }
        }

        if component_nodes.len() < 3 || component_edges.len() < 3 {
            continue;
        }

        let all_degree_two = component_nodes
            .iter()
            .all(|&n| adjacency[n].len() == 2);
        if !all_degree_two {
            continue;
        }

        let first_layer = &edges[component_edges[0]].layer;
        let semantic_type = semantic_by_layer
            .get(first_layer)
            .copied()
            .unwrap_or(SemanticType::Outro);
        *closed_loops_by_type.entry(semantic_type).or_insert(0) += 1;
        total_loops += 1;
    }

    LoopDetectionResult {
        num_nodes: nodes.len(),
        closed_loops_by_type,
        total_loops,
        note: format!("Loops estimados: {total_loops}"),
    }
}

/// Merge a detected result into the native (entity-level) closed-loop
/// floor, replacing only when the detector's total strictly exceeds it
/// (`§4.4`, `§9` open question: ties keep the floor).
pub fn merge_with_floor(
    floor: &HashMap<SemanticType, u64>,
    detected: LoopDetectionResult,
) -> (HashMap<SemanticType, u64>, String) {
    let floor_total: u64 = floor.values().sum();
    if detected.total_loops > floor_total {
        (detected.closed_loops_by_type, detected.note)
    } else {
        (floor.clone(), detected.note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Point2;

    #[test]
    fn triangle_of_segments_is_one_loop() {
        let segs = vec![
            Segment::new(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "corte", false),
            Segment::new(Point2::new(10.0, 0.0), Point2::new(5.0, 10.0), "corte", false),
            Segment::new(Point2::new(5.0, 10.0), Point2::new(0.0, 0.0), "corte", false),
        ];
        let mut semantic = HashMap::new();
        semantic.insert("corte".to_string(), SemanticType::Corte);

        let result = detect_loops(&segs, &semantic, 0.05);
        assert_eq!(result.total_loops, 1);
        assert_eq!(result.closed_loops_by_type.get(&SemanticType::Corte), Some(&1));
    }

    #[test]
    fn open_polyline_is_not_a_loop() {
        let segs = vec![
            Segment::new(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "corte", false),
            Segment::new(Point2::new(10.0, 0.0), Point2::new(5.0, 10.0), "corte", false),
        ];
        let semantic = HashMap::new();
        let result = detect_loops(&segs, &semantic, 0.05);
        assert_eq!(result.total_loops, 0);
    }

    #[test]
    fn merge_keeps_floor_on_tie() {
        let mut floor = HashMap::new();
        floor.insert(SemanticType::Corte, 2);
        let detected = LoopDetectionResult {
            num_nodes: 4,
            closed_loops_by_type: HashMap::from([(SemanticType::Corte, 2)]),
            total_loops: 2,
            note: "Loops estimados: 2".into(),
        };
        let (merged, _) = merge_with_floor(&floor, detected);
        assert_eq!(merged, floor);
    }
}
