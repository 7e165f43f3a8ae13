//! # Correction Sets
//!
//! Resolves the rows of a disagreement bucket into a toxic-truth set and a
//! clean-truth set.
//!
//! ## Routing
//!
//! ```text
//!   disagreement row
//!         │
//!         ▼
//!   lexicon token hit? ──yes──▶ toxic   (lexicon)
//!         │ no
//!         ▼
//!   screener names a term? ──yes──▶ toxic sources > 1 ? toxic (screened_multi)
//!         │ no                                        : clean (screened_single)
//!         ▼
//!   toxic_sources · 2 > sources ? toxic (majority_toxic) : clean (majority_clean)
//! ```
//!
//! A screener call that still fails after retries counts as "no term".
//!
//! ## Invariant
//!
//! `toxic_truth + clean_truth == input rows`, asserted per bucket before any
//! deduplication.

use concord_adjudicator::{Label, RetryPolicy, SourceCall, TermExtractor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::lexicon::Lexicon;
use crate::partition::Bucket;
use crate::row::ConsensusRow;

/// How a correction row reached its truth label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionRoute {
    /// A lexicon term is a token of the text.
    Lexicon,
    /// The screener named a term and more than one source said toxic.
    ScreenedMulti,
    /// The screener named a term but at most one source said toxic.
    ScreenedSingle,
    /// No term; a strict majority of sources said toxic.
    MajorityToxic,
    /// No term; no strict toxic majority.
    MajorityClean,
}

impl CorrectionRoute {
    /// Truth label implied by the route.
    pub const fn truth(self) -> Label {
        match self {
            Self::Lexicon | Self::ScreenedMulti | Self::MajorityToxic => Label::Toxic,
            Self::ScreenedSingle | Self::MajorityClean => Label::Neutral,
        }
    }
}

/// One corrected disagreement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRow {
    /// Row index.
    pub text_id: u64,
    /// Stored text.
    pub text: String,
    /// Reference annotation.
    pub reference_label: Option<Label>,
    /// Disagreement bucket the row came from.
    pub disagreement: Bucket,
    /// Route taken.
    pub route: CorrectionRoute,
    /// Lexicon or screened term, if any.
    pub term: Option<String>,
    /// Participating toxic votes.
    pub toxic_sources: usize,
    /// Participating votes.
    pub sources: usize,
    /// Resolved label.
    pub truth: Label,
}

/// Corrected rows of one disagreement bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionSet {
    /// Bucket that was corrected.
    pub bucket: Bucket,
    /// Rows resolved to toxic.
    pub toxic_truth: Vec<CorrectionRow>,
    /// Rows resolved to neutral.
    pub clean_truth: Vec<CorrectionRow>,
    /// Rows handed in.
    pub input_rows: usize,
    /// Rows sent to the screener.
    pub rescreened: usize,
    /// Screener calls that failed after retries.
    pub rescreen_failures: usize,
}

impl CorrectionSet {
    /// Toxic rows followed by clean rows.
    pub fn rows(&self) -> impl Iterator<Item = &CorrectionRow> {
        self.toxic_truth.iter().chain(self.clean_truth.iter())
    }

    /// Rows resolved by `route`.
    pub fn count_route(&self, route: CorrectionRoute) -> usize {
        self.rows().filter(|r| r.route == route).count()
    }
}

struct Screener {
    source: Box<dyn SourceCall>,
    policy: RetryPolicy,
}

/// Builds [`CorrectionSet`]s from disagreement rows.
pub struct CorrectionBuilder {
    lexicon: Option<Lexicon>,
    screener: Option<Screener>,
    extractor: TermExtractor,
}

impl Default for CorrectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrectionBuilder {
    /// Builder with neither lexicon nor screener: every row routes by majority.
    pub fn new() -> Self {
        Self {
            lexicon: None,
            screener: None,
            extractor: TermExtractor::new(),
        }
    }

    /// Enables the lexicon pass.
    pub fn with_lexicon(mut self, lexicon: Lexicon) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    /// Enables re-screening of lexicon misses through `source`.
    pub fn with_screener(mut self, source: Box<dyn SourceCall>, policy: RetryPolicy) -> Self {
        self.screener = Some(Screener { source, policy });
        self
    }

    /// Replaces the answer parser used for screening.
    pub fn with_extractor(mut self, extractor: TermExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Corrects the rows of `bucket`.
    ///
    /// # Panics
    ///
    /// Panics if `bucket` is not a disagreement bucket, or if the toxic and
    /// clean sets do not add up to the input.
    pub async fn correct(&self, bucket: Bucket, rows: &[ConsensusRow]) -> CorrectionSet {
        assert!(
            bucket.is_disagreement(),
            "only disagreement buckets can be corrected, got {bucket}"
        );

        let mut set = CorrectionSet {
            bucket,
            toxic_truth: Vec::new(),
            clean_truth: Vec::new(),
            input_rows: rows.len(),
            rescreened: 0,
            rescreen_failures: 0,
        };

        for row in rows {
            let corrected = self.route(bucket, row, &mut set).await;
            if corrected.truth.is_toxic() {
                set.toxic_truth.push(corrected);
            } else {
                set.clean_truth.push(corrected);
            }
        }

        assert_eq!(
            set.toxic_truth.len() + set.clean_truth.len(),
            set.input_rows,
            "correction of {bucket} lost rows: {} toxic + {} clean != {} input",
            set.toxic_truth.len(),
            set.clean_truth.len(),
            set.input_rows
        );
        info!(
            bucket = %bucket,
            input = set.input_rows,
            toxic_truth = set.toxic_truth.len(),
            clean_truth = set.clean_truth.len(),
            rescreened = set.rescreened,
            rescreen_failures = set.rescreen_failures,
            "correction set built"
        );
        set
    }

    async fn route(&self, bucket: Bucket, row: &ConsensusRow, set: &mut CorrectionSet) -> CorrectionRow {
        let toxic_sources = row.toxic_sources();
        let sources = row.participating();

        let lexicon_hit = self
            .lexicon
            .as_ref()
            .and_then(|lexicon| lexicon.first_hit(&row.text))
            .map(str::to_string);

        let (route, term) = if let Some(term) = lexicon_hit {
            (CorrectionRoute::Lexicon, Some(term))
        } else if let Some(term) = self.screen(row, set).await {
            let route = if toxic_sources > 1 {
                CorrectionRoute::ScreenedMulti
            } else {
                CorrectionRoute::ScreenedSingle
            };
            (route, Some(term))
        } else if toxic_sources * 2 > sources {
            (CorrectionRoute::MajorityToxic, None)
        } else {
            (CorrectionRoute::MajorityClean, None)
        };

        debug!(text_id = row.text_id, ?route, term = term.as_deref(), "row corrected");
        CorrectionRow {
            text_id: row.text_id,
            text: row.text.clone(),
            reference_label: row.reference_label,
            disagreement: bucket,
            route,
            term,
            toxic_sources,
            sources,
            truth: route.truth(),
        }
    }

    async fn screen(&self, row: &ConsensusRow, set: &mut CorrectionSet) -> Option<String> {
        let screener = self.screener.as_ref()?;
        set.rescreened += 1;
        let name = screener.source.name();
        match screener
            .policy
            .execute(name, || screener.source.call(&row.text))
            .await
        {
            Ok(answer) => self.extractor.extract(&answer),
            Err(err) => {
                set.rescreen_failures += 1;
                warn!(
                    source = name,
                    text_id = row.text_id,
                    error = %err,
                    "re-screen failed, treating as no term"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::VoteView;
    use async_trait::async_trait;
    use concord_adjudicator::SourceError;
    use concord_store::StoredRow;

    struct FixedAnswer(&'static str);

    #[async_trait]
    impl SourceCall for FixedAnswer {
        fn name(&self) -> &str {
            "screener"
        }

        async fn call(&self, _text: &str) -> Result<String, SourceError> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait]
    impl SourceCall for Down {
        fn name(&self) -> &str {
            "screener"
        }

        async fn call(&self, _text: &str) -> Result<String, SourceError> {
            Err(SourceError::Permanent("401 Unauthorized".into()))
        }
    }

    fn fp_row(id: u64, text: &str, toxic: usize, total: usize) -> ConsensusRow {
        let sources: Vec<String> = (0..total).map(|i| format!("s{i}")).collect();
        let labels = (0..total)
            .map(|i| if i < toxic { Label::Toxic } else { Label::Neutral })
            .collect();
        let stored = StoredRow::new(id, Some(Label::Neutral), text, labels);
        ConsensusRow::from_stored(&stored, &sources, VoteView::Decided)
    }

    #[test]
    fn test_route_truth() {
        assert_eq!(CorrectionRoute::Lexicon.truth(), Label::Toxic);
        assert_eq!(CorrectionRoute::ScreenedSingle.truth(), Label::Neutral);
        assert_eq!(CorrectionRoute::MajorityClean.truth(), Label::Neutral);
    }

    #[tokio::test]
    async fn test_lexicon_hit_wins() {
        let builder = CorrectionBuilder::new()
            .with_lexicon(Lexicon::from_terms(["moron"]))
            .with_screener(Box::new(FixedAnswer("rt")), RetryPolicy::new(1));
        let set = builder
            .correct(Bucket::AtLeastOneFp, &[fp_row(1, "you Moron", 1, 5)])
            .await;

        assert_eq!(set.toxic_truth.len(), 1);
        assert_eq!(set.toxic_truth[0].route, CorrectionRoute::Lexicon);
        assert_eq!(set.toxic_truth[0].term.as_deref(), Some("moron"));
        assert_eq!(set.rescreened, 0);
    }

    #[tokio::test]
    async fn test_screened_term_routes_by_toxic_count() {
        let builder = CorrectionBuilder::new()
            .with_screener(Box::new(FixedAnswer("\"jerk\"")), RetryPolicy::new(1));
        let rows = [fp_row(1, "a", 1, 5), fp_row(2, "b", 2, 5)];
        let set = builder.correct(Bucket::AtLeastOneFp, &rows).await;

        assert_eq!(set.clean_truth[0].route, CorrectionRoute::ScreenedSingle);
        assert_eq!(set.toxic_truth[0].route, CorrectionRoute::ScreenedMulti);
        assert_eq!(set.toxic_truth[0].term.as_deref(), Some("jerk"));
        assert_eq!(set.rescreened, 2);
    }

    #[tokio::test]
    async fn test_no_term_uses_strict_majority() {
        let builder = CorrectionBuilder::new();
        let rows = [fp_row(1, "a", 3, 5), fp_row(2, "b", 2, 4), fp_row(3, "c", 1, 4)];
        let set = builder.correct(Bucket::AtLeastOneFp, &rows).await;

        assert_eq!(set.count_route(CorrectionRoute::MajorityToxic), 1);
        assert_eq!(set.count_route(CorrectionRoute::MajorityClean), 2);
        assert_eq!(set.toxic_truth.len() + set.clean_truth.len(), set.input_rows);
    }

    #[tokio::test]
    async fn test_failed_screen_counts_and_falls_back() {
        let builder = CorrectionBuilder::new().with_screener(Box::new(Down), RetryPolicy::new(3));
        let set = builder
            .correct(Bucket::AtLeastOneFp, &[fp_row(1, "a", 4, 5)])
            .await;

        assert_eq!(set.rescreen_failures, 1);
        assert_eq!(set.toxic_truth[0].route, CorrectionRoute::MajorityToxic);
    }

    #[tokio::test]
    #[should_panic(expected = "only disagreement buckets")]
    async fn test_common_bucket_rejected() {
        CorrectionBuilder::new().correct(Bucket::CommonTp, &[]).await;
    }
}
