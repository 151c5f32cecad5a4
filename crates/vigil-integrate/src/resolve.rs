//! Entity resolution and the local similarity fallback.

use tracing::warn;

use vigil_graph::{EntityNode, GraphAdapter};

/// How many nodes to inspect per name when resolving.
const RESOLVE_LIMIT: usize = 5;

/// Resolve entity names to graph nodes.
///
/// Case-insensitive exact name matches win; otherwise the top-ranked result
/// is taken. Unresolved names contribute nothing and never block the
/// submission.
pub async fn resolve_entities(
    graph: &dyn GraphAdapter,
    names: &[String],
    group_id: &str,
) -> Vec<EntityNode> {
    let mut out = Vec::new();
    for name in names {
        match graph.hybrid_node_search(name, group_id, RESOLVE_LIMIT).await {
            Ok(nodes) if nodes.is_empty() => {}
            Ok(nodes) => {
                let exact = nodes
                    .iter()
                    .find(|n| n.name.eq_ignore_ascii_case(name))
                    .cloned();
                out.push(exact.unwrap_or_else(|| nodes[0].clone()));
            }
            Err(e) => {
                warn!(name = %name, error = %e, "entity resolution failed");
            }
        }
    }
    out
}

/// Token-overlap similarity in [0, 1], used when a candidate fact arrived
/// without a score from the graph (entity-connected fetches). The graph's
/// own semantic measure is preferred wherever available.
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.iter().filter(|t| tb.contains(*t)).count() as f64;
    let union = (ta.len() + tb.len()) as f64 - intersection;
    intersection / union
}

fn tokens(s: &str) -> Vec<String> {
    let mut out: Vec<String> = s
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sentences_score_one() {
        let s = "Paris is the capital of France";
        assert!((lexical_similarity(s, s) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_sentences_score_zero() {
        assert_eq!(
            lexical_similarity("rust borrow checker", "madrid weather forecast"),
            0.0
        );
    }

    #[test]
    fn near_contradictions_land_in_between() {
        let sim = lexical_similarity(
            "Paris is the capital of Germany",
            "Paris is the capital of France",
        );
        assert!(sim > 0.4 && sim < 1.0);
    }
}
