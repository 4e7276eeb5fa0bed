//! Skill normalization and overlap scoring.

use std::collections::HashSet;

use crate::models::candidate::CandidateSkill;

/// Lowercases, strips punctuation, and folds common aliases onto one spelling.
pub fn normalize_skill(name: &str) -> String {
    let compact: String = name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '+' || *c == '#')
        .collect();
    let canonical = match compact.as_str() {
        "js" | "ecmascript" => "javascript",
        "ts" => "typescript",
        "k8s" => "kubernetes",
        "golang" => "go",
        "postgres" | "psql" => "postgresql",
        "nodejs" => "node",
        "reactjs" => "react",
        "py" => "python",
        "ml" => "machinelearning",
        other => other,
    };
    canonical.to_string()
}

/// Semantic strength of a single pair: 1.0 exact, 0.5 partial (containment), 0.0 none.
fn pair_strength(a: &str, b: &str) -> f64 {
    if a == b {
        1.0
    } else if a.len() >= 2 && b.len() >= 2 && (a.contains(b) || b.contains(a)) {
        0.5
    } else {
        0.0
    }
}

/// Best semantic strength of `target` against any candidate skill.
fn best_strength(target: &str, owned: &[String]) -> f64 {
    owned
        .iter()
        .map(|s| pair_strength(target, s))
        .fold(0.0, f64::max)
}

/// Detailed skills outcome; `score` is 0-100.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillsAssessment {
    pub required_ratio: f64,
    pub preferred_ratio: f64,
    pub proficiency: f64,
    pub score: f64,
}

/// Exact required-skill ratio, semantic preferred-skill ratio, and a proficiency bonus.
pub fn assess_skills(
    candidate_skills: &[CandidateSkill],
    required: &[String],
    preferred: &[String],
) -> SkillsAssessment {
    let owned: Vec<String> = candidate_skills
        .iter()
        .map(|s| normalize_skill(&s.name))
        .collect();
    let owned_set: HashSet<&str> = owned.iter().map(String::as_str).collect();

    let required: Vec<String> = required.iter().map(|s| normalize_skill(s)).collect();
    let matched_required = required
        .iter()
        .filter(|r| owned_set.contains(r.as_str()))
        .count();
    let required_ratio = if required.is_empty() {
        1.0
    } else {
        matched_required as f64 / required.len() as f64
    };

    let preferred_ratio = if preferred.is_empty() {
        required_ratio
    } else {
        let total: f64 = preferred
            .iter()
            .map(|p| best_strength(&normalize_skill(p), &owned))
            .sum();
        total / preferred.len() as f64
    };

    // Mean proficiency over candidate skills that appear in the posting.
    let wanted: HashSet<String> = required
        .iter()
        .cloned()
        .chain(preferred.iter().map(|p| normalize_skill(p)))
        .collect();
    let proficiencies: Vec<f64> = candidate_skills
        .iter()
        .filter(|s| wanted.contains(&normalize_skill(&s.name)))
        .map(|s| s.proficiency.map_or(0.0, |p| p.weight()))
        .collect();
    let proficiency = if proficiencies.is_empty() {
        0.0
    } else {
        proficiencies.iter().sum::<f64>() / proficiencies.len() as f64
    };

    let score = (70.0 * required_ratio + 20.0 * preferred_ratio + 10.0 * proficiency).min(100.0);

    SkillsAssessment {
        required_ratio,
        preferred_ratio,
        proficiency,
        score,
    }
}

/// Fraction of `wanted` skills the candidate holds exactly (1.0 if nothing is wanted).
pub fn exact_overlap(candidate_skills: &[CandidateSkill], wanted: &[String]) -> f64 {
    if wanted.is_empty() {
        return 1.0;
    }
    let owned: HashSet<String> = candidate_skills
        .iter()
        .map(|s| normalize_skill(&s.name))
        .collect();
    let hits = wanted
        .iter()
        .filter(|w| owned.contains(&normalize_skill(w)))
        .count();
    hits as f64 / wanted.len() as f64
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "you", "our", "are", "will", "your", "from", "that", "this",
    "have", "has", "who", "what", "all", "can", "into", "about", "work", "team", "years",
];

/// Lowercased content tokens of at least 3 chars, minus stop words.
pub fn content_tokens<'a>(texts: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    texts
        .into_iter()
        .flat_map(|t| t.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#'))
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= 3 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Jaccard similarity of two token sets (0 when both are empty).
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::Proficiency;

    fn skills(names: &[&str]) -> Vec<CandidateSkill> {
        names
            .iter()
            .map(|n| CandidateSkill {
                name: n.to_string(),
                proficiency: None,
            })
            .collect()
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_folds_aliases() {
        assert_eq!(normalize_skill("JS"), "javascript");
        assert_eq!(normalize_skill("Node.js"), "node");
        assert_eq!(normalize_skill("K8s"), "kubernetes");
        assert_eq!(normalize_skill("C++"), "c++");
    }

    #[test]
    fn test_two_of_three_required_skills() {
        let result = assess_skills(
            &skills(&["js", "react"]),
            &strings(&["js", "react", "node"]),
            &[],
        );
        assert!((result.required_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert!((result.score - 60.0).abs() < 1e-9, "score was {}", result.score);
    }

    #[test]
    fn test_partial_preferred_match_counts_half() {
        let result = assess_skills(
            &skills(&["react"]),
            &[],
            &strings(&["react native"]),
        );
        // "react" is contained in "reactnative"
        assert!((result.preferred_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_proficiency_bonus() {
        let owned = vec![CandidateSkill {
            name: "rust".to_string(),
            proficiency: Some(Proficiency::Expert),
        }];
        let result = assess_skills(&owned, &strings(&["rust"]), &[]);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_no_requirements_is_full_ratio() {
        let result = assess_skills(&skills(&[]), &[], &[]);
        assert_eq!(result.required_ratio, 1.0);
        assert_eq!(result.score, 90.0);
    }

    #[test]
    fn test_exact_overlap() {
        let owned = skills(&["python", "sql"]);
        assert_eq!(exact_overlap(&owned, &strings(&["Python", "Spark"])), 0.5);
        assert_eq!(exact_overlap(&owned, &[]), 1.0);
    }

    #[test]
    fn test_content_tokens_drop_stop_words() {
        let tokens = content_tokens(["Build the Rust services with our team", "go"]);
        assert!(tokens.contains("rust"));
        assert!(tokens.contains("services"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("go"));
    }

    #[test]
    fn test_jaccard() {
        let a = content_tokens(["rust tokio axum"]);
        let b = content_tokens(["rust axum sqlx redis"]);
        assert!((jaccard(&a, &b) - 2.0 / 5.0).abs() < 1e-9);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }
}
