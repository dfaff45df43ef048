//! Score assignment for ordinal scales.

use crate::domain::{error::DomainError, types::ScaleKind};

/// Scores for `count` ordered labels.
///
/// Likert scales are centred on zero (`-2..=2` for five points, `-2, -1, 1, 2` for four),
/// rating scales count up from one.
pub fn scores(kind: ScaleKind, count: usize) -> Vec<i32> {
    let Ok(count) = i32::try_from(count) else {
        return Vec::new();
    };
    match kind {
        ScaleKind::Rating => (1..=count).collect(),
        ScaleKind::Likert => {
            let half = count / 2;
            (-half..=half)
                .filter(|score| count % 2 == 1 || *score != 0)
                .collect()
        }
    }
}

/// Trimmed labels paired with their scores; rejects empty and duplicate labels.
pub fn score_labels(kind: ScaleKind, labels: &[String]) -> Result<Vec<(String, i32)>, DomainError> {
    let labels: Vec<String> = labels.iter().map(|label| label.trim().to_string()).collect();
    if labels.len() < 2 {
        return Err(DomainError::validation(
            "labels",
            "a scale needs at least two labels",
        ));
    }
    if labels.iter().any(String::is_empty) {
        return Err(DomainError::validation("labels", "labels cannot be empty"));
    }
    for (index, label) in labels.iter().enumerate() {
        if labels[..index].contains(label) {
            return Err(DomainError::validation(
                "labels",
                format!("label `{label}` is repeated"),
            ));
        }
    }

    let scores = scores(kind, labels.len());
    Ok(labels.into_iter().zip(scores).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn likert_scores_are_centred() {
        assert_eq!(scores(ScaleKind::Likert, 5), vec![-2, -1, 0, 1, 2]);
        assert_eq!(scores(ScaleKind::Likert, 4), vec![-2, -1, 1, 2]);
        assert_eq!(scores(ScaleKind::Likert, 7), vec![-3, -2, -1, 0, 1, 2, 3]);
    }

    #[test]
    fn rating_scores_count_from_one() {
        assert_eq!(scores(ScaleKind::Rating, 3), vec![1, 2, 3]);
    }

    #[test]
    fn labels_are_scored_in_order() {
        let labels = vec![
            "Disagree".to_string(),
            " Neutral ".to_string(),
            "Agree".to_string(),
        ];
        let scored = score_labels(ScaleKind::Likert, &labels).expect("valid labels");
        assert_eq!(
            scored,
            vec![
                ("Disagree".to_string(), -1),
                ("Neutral".to_string(), 0),
                ("Agree".to_string(), 1),
            ]
        );
    }

    #[test]
    fn repeated_or_missing_labels_are_rejected() {
        let repeated = vec!["Good".to_string(), "good".to_string(), "Good".to_string()];
        assert!(score_labels(ScaleKind::Rating, &repeated).is_err());
        assert!(score_labels(ScaleKind::Rating, &["Only".to_string()]).is_err());
    }
}
