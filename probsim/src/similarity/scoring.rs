use std::collections::HashSet;

use crate::models::{
    ClusterMap, ProblemFeatures, SimilarityCandidate, SimilarityComponents, SimilarityResult,
    SimilarityWeights,
};

/// Cosine similarity in `[-1, 1]`. Returns 0.0 for mismatched lengths, empty
/// vectors, or zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}

/// Jaccard index over tag-id sets; 0.0 when both sets are empty.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Redistribute the solution weight when that component is undefined for a
/// pair. Input must already be normalized; the result sums to 1 over the
/// defined components. Each remaining weight grows in proportion to its own
/// share, which collapses to dividing by the remaining mass.
fn effective_weights(weights: &SimilarityWeights, solution_defined: bool) -> SimilarityWeights {
    if solution_defined {
        return weights.clone();
    }

    let remaining = weights.statement + weights.tags + weights.competition;
    if remaining <= 0.0 {
        // All weight sat on the missing component; nothing left to score with.
        return SimilarityWeights {
            statement: 0.0,
            solution: 0.0,
            tags: 0.0,
            competition: 0.0,
        };
    }

    SimilarityWeights {
        statement: weights.statement / remaining,
        solution: 0.0,
        tags: weights.tags / remaining,
        competition: weights.competition / remaining,
    }
}

/// Score one candidate against the source. Pure computation, no I/O.
///
/// Every component and every effective weight lies in [0,1] and the effective
/// weights sum to 1 over defined components, so the final score lands in
/// [0,1] as well.
pub fn score(
    source: &ProblemFeatures,
    candidate: &SimilarityCandidate,
    weights: &SimilarityWeights,
    clusters: &ClusterMap,
) -> SimilarityResult {
    let weights = weights.normalized();

    let statement = clamp01(cosine_similarity(
        &source.statement_embedding,
        &candidate.features.statement_embedding,
    ));

    let solution = match (&source.solution_embedding, &candidate.features.solution_embedding) {
        (Some(a), Some(b)) => Some(clamp01(cosine_similarity(a, b))),
        _ => None,
    };

    let tags = jaccard_similarity(&source.tag_ids, &candidate.features.tag_ids);
    let competition = clusters.similarity(&source.competition_key, &candidate.features.competition_key);

    let effective = effective_weights(&weights, solution.is_some());
    let total = statement * effective.statement
        + solution.map_or(0.0, |value| value * effective.solution)
        + tags * effective.tags
        + competition * effective.competition;

    SimilarityResult {
        target_id: candidate.features.id.clone(),
        target_label: candidate.label.clone(),
        score: clamp01(total),
        components: SimilarityComponents {
            statement,
            solution,
            tags,
            competition,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn tag_set(tags: &[&str]) -> HashSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    fn clusters() -> ClusterMap {
        let mut positions = HashMap::new();
        positions.insert("mo-a-krajske".to_string(), 6.5);
        positions.insert("mo-a-celostatni".to_string(), 8.0);
        positions.insert("imo".to_string(), 10.0);
        ClusterMap::new(positions, 10.0)
    }

    fn features(
        id: &str,
        tags: &[&str],
        competition_key: &str,
        statement: Vec<f32>,
        solution: Option<Vec<f32>>,
    ) -> ProblemFeatures {
        ProblemFeatures {
            id: id.to_string(),
            tag_ids: tag_set(tags),
            competition_key: competition_key.to_string(),
            statement_embedding: statement,
            solution_embedding: solution,
        }
    }

    fn candidate(features: ProblemFeatures) -> SimilarityCandidate {
        SimilarityCandidate {
            label: format!("Problem {}", features.id),
            features,
        }
    }

    #[test]
    fn test_cosine_identical_vectors() {
        assert!((cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_jaccard_shared_tags() {
        // {X, Y} vs {X, Z}: one shared out of three distinct
        let sim = jaccard_similarity(&tag_set(&["x", "y"]), &tag_set(&["x", "z"]));
        assert!((sim - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard_is_symmetric() {
        let a = tag_set(&["x", "y", "z"]);
        let b = tag_set(&["y", "w"]);
        assert_eq!(jaccard_similarity(&a, &b), jaccard_similarity(&b, &a));
    }

    #[test]
    fn test_jaccard_identical_nonempty_sets() {
        let a = tag_set(&["x", "y"]);
        assert_eq!(jaccard_similarity(&a, &a), 1.0);
    }

    #[test]
    fn test_jaccard_both_empty_is_zero() {
        assert_eq!(jaccard_similarity(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn test_redistribution_preserves_unit_mass() {
        let weights = SimilarityWeights {
            statement: 0.4,
            solution: 0.3,
            tags: 0.2,
            competition: 0.1,
        }
        .normalized();

        let effective = effective_weights(&weights, false);
        assert!((effective.statement - 0.4 / 0.7).abs() < 1e-12);
        assert!((effective.tags - 0.2 / 0.7).abs() < 1e-12);
        assert!((effective.competition - 0.1 / 0.7).abs() < 1e-12);
        assert_eq!(effective.solution, 0.0);
        assert!((effective.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_redistribution_noop_when_solution_defined() {
        let weights = SimilarityWeights::default().normalized();
        let effective = effective_weights(&weights, true);
        assert_eq!(effective, weights);
    }

    #[test]
    fn test_redistribution_all_weight_on_solution() {
        let weights = SimilarityWeights {
            statement: 0.0,
            solution: 1.0,
            tags: 0.0,
            competition: 0.0,
        };
        let effective = effective_weights(&weights.normalized(), false);
        assert_eq!(effective.sum(), 0.0);
    }

    #[test]
    fn test_score_identical_pair_with_solutions() {
        let embedding = vec![0.3, 0.7, 0.1];
        let source = features(
            "src",
            &["algebra", "induction"],
            "imo",
            embedding.clone(),
            Some(embedding.clone()),
        );
        let cand = candidate(features(
            "tgt",
            &["algebra", "induction"],
            "imo",
            embedding.clone(),
            Some(embedding),
        ));

        let result = score(&source, &cand, &SimilarityWeights::default(), &clusters());
        assert!((result.score - 1.0).abs() < 1e-9);
        let solution = result.components.solution.expect("solution defined");
        assert!((solution - 1.0).abs() < 1e-9);
        assert_eq!(result.components.tags, 1.0);
        assert_eq!(result.components.competition, 1.0);
    }

    #[test]
    fn test_score_without_solution_redistributes() {
        let embedding = vec![1.0, 0.0];
        let source = features("src", &["x", "y"], "imo", embedding.clone(), None);
        let cand = candidate(features("tgt", &["x", "z"], "imo", embedding, None));

        let weights = SimilarityWeights {
            statement: 0.4,
            solution: 0.3,
            tags: 0.2,
            competition: 0.1,
        };
        let result = score(&source, &cand, &weights, &clusters());

        // statement 1.0 * 4/7 + tags (1/3) * 2/7 + competition 1.0 * 1/7
        let expected = 4.0 / 7.0 + (1.0 / 3.0) * (2.0 / 7.0) + 1.0 / 7.0;
        assert!((result.score - expected).abs() < 1e-9);
        assert_eq!(result.components.solution, None);
    }

    #[test]
    fn test_score_stays_in_bounds() {
        // Opposite statement vectors clamp to 0 rather than going negative
        let source = features("src", &[], "imo", vec![1.0, 0.0], None);
        let cand = candidate(features(
            "tgt",
            &["x"],
            "unknown-round",
            vec![-1.0, 0.0],
            None,
        ));

        let result = score(&source, &cand, &SimilarityWeights::default(), &clusters());
        assert!(result.score >= 0.0 && result.score <= 1.0);
        assert_eq!(result.components.statement, 0.0);
        assert_eq!(result.components.competition, 0.0);
    }

    #[test]
    fn test_score_zero_when_only_solution_weighted_and_missing() {
        let source = features("src", &["x"], "imo", vec![1.0, 0.0], None);
        let cand = candidate(features("tgt", &["x"], "imo", vec![1.0, 0.0], None));

        let weights = SimilarityWeights {
            statement: 0.0,
            solution: 1.0,
            tags: 0.0,
            competition: 0.0,
        };
        let result = score(&source, &cand, &weights, &clusters());
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_score_competition_linear_decay() {
        let embedding = vec![1.0, 0.0];
        let source = features("src", &["x"], "mo-a-celostatni", embedding.clone(), None);
        let cand = candidate(features("tgt", &["x"], "imo", embedding, None));

        let result = score(&source, &cand, &SimilarityWeights::default(), &clusters());
        // positions 8.0 and 10.0 on a 10-point scale
        assert!((result.components.competition - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_score_carries_target_identity() {
        let embedding = vec![1.0, 0.0];
        let source = features("src", &["x"], "imo", embedding.clone(), None);
        let cand = candidate(features("tgt", &["x"], "imo", embedding, None));

        let result = score(&source, &cand, &SimilarityWeights::default(), &clusters());
        assert_eq!(result.target_id, "tgt");
        assert_eq!(result.target_label, "Problem tgt");
    }
}
