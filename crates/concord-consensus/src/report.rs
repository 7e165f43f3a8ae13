//! Per-source accuracy report.

use concord_adjudicator::Label;
use serde::{Deserialize, Serialize};

use crate::row::ConsensusRow;

/// Label counts and confusion counts of one source, toxic as the positive class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAccuracy {
    /// Source name.
    pub source: String,
    /// Rows inspected.
    pub total_rows: usize,
    /// Toxic labels.
    pub toxic_count: usize,
    /// Neutral labels.
    pub neutral_count: usize,
    /// Fail-safe substitutions and unknown labels.
    pub error_count: usize,
    /// `toxic_count / total_rows × 100`.
    pub negative_percentage: f64,
    /// Toxic label, toxic reference.
    pub tp: usize,
    /// Neutral label, neutral reference.
    pub tn: usize,
    /// Toxic label, neutral reference.
    pub fp: usize,
    /// Neutral label, toxic reference.
    #[serde(rename = "fn")]
    pub fn_: usize,
    /// `(tp + tn) / (tp + tn + fp + fn)`, `0.0` when nothing was compared.
    pub accuracy: f64,
}

/// Builds one [`SourceAccuracy`] per source, in column order.
///
/// Source names are taken from the first row; an empty slice yields an
/// empty report.
pub fn accuracy_report(rows: &[ConsensusRow]) -> Vec<SourceAccuracy> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    first
        .per_source_labels
        .iter()
        .enumerate()
        .map(|(column, entry)| {
            let mut acc = SourceAccuracy {
                source: entry.source.clone(),
                total_rows: rows.len(),
                toxic_count: 0,
                neutral_count: 0,
                error_count: 0,
                negative_percentage: 0.0,
                tp: 0,
                tn: 0,
                fp: 0,
                fn_: 0,
                accuracy: 0.0,
            };

            for row in rows {
                let Some(cell) = row.per_source_labels.get(column) else {
                    acc.error_count += 1;
                    continue;
                };
                if cell.failed || !cell.label.is_known() {
                    acc.error_count += 1;
                }
                match cell.label {
                    Label::Toxic => acc.toxic_count += 1,
                    Label::Neutral => acc.neutral_count += 1,
                    Label::Unknown => continue,
                }
                match (cell.label, row.reference_label) {
                    (Label::Toxic, Some(Label::Toxic)) => acc.tp += 1,
                    (Label::Neutral, Some(Label::Neutral)) => acc.tn += 1,
                    (Label::Toxic, Some(Label::Neutral)) => acc.fp += 1,
                    (Label::Neutral, Some(Label::Toxic)) => acc.fn_ += 1,
                    _ => {}
                }
            }

            if acc.total_rows > 0 {
                acc.negative_percentage = acc.toxic_count as f64 / acc.total_rows as f64 * 100.0;
            }
            let compared = acc.tp + acc.tn + acc.fp + acc.fn_;
            if compared > 0 {
                acc.accuracy = (acc.tp + acc.tn) as f64 / compared as f64;
            }
            acc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::VoteView;
    use concord_store::StoredRow;

    #[test]
    fn test_counts_and_confusion() {
        use Label::{Neutral as N, Toxic as T, Unknown as U};
        let sources = vec!["model".to_string(), "gemini".to_string()];
        let stored = [
            StoredRow::new(1, Some(T), "a", vec![T, T]),
            StoredRow::new(2, Some(N), "b", vec![T, N]),
            StoredRow::new(3, Some(N), "c", vec![N, U]),
            StoredRow::new(4, Some(T), "d", vec![N, T])
                .with_failed_sources(vec!["gemini".to_string()]),
        ];
        let rows: Vec<ConsensusRow> = stored
            .iter()
            .map(|r| ConsensusRow::from_stored(r, &sources, VoteView::Decided))
            .collect();

        let report = accuracy_report(&rows);
        assert_eq!(report.len(), 2);

        let model = &report[0];
        assert_eq!((model.toxic_count, model.neutral_count, model.error_count), (2, 2, 0));
        assert_eq!((model.tp, model.tn, model.fp, model.fn_), (1, 1, 1, 1));
        assert!((model.negative_percentage - 50.0).abs() < 1e-9);
        assert!((model.accuracy - 0.5).abs() < 1e-9);

        let gemini = &report[1];
        assert_eq!(gemini.error_count, 2);
        assert_eq!(gemini.toxic_count, 2);
        assert_eq!((gemini.tp, gemini.tn), (2, 1));
        assert!((gemini.accuracy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_rows() {
        assert!(accuracy_report(&[]).is_empty());
    }
}
