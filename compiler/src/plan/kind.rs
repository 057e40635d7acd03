/// A half-open datetime interval of a `date_range` aggregation. Endpoints
/// are raw SQL expressions (date-math already rendered); `None` marks an
/// unbounded side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeInterval {
    pub begin: Option<String>,
    pub end: Option<String>,
}

/// Identifies which response folder applies to a plan entry's rows, along
/// with the data that folder needs to translate the row shape into JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultKind {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Cardinality,
    ValueCount,
    Stats,
    /// `percentiles`; the folder recovers percentile names from the
    /// `quantile_`-prefixed column aliases.
    Quantile,
    TopHits { fields: Vec<String> },
    TopMetrics { fields: Vec<String> },
    /// `percentile_ranks`: the cut values in select order.
    PercentileRanks { cut_names: Vec<String> },
    Histogram,
    DateHistogram { interval_ms: i64 },
    DateRange { intervals: Vec<DateTimeInterval> },
    Terms,
    /// A plain hit list (a request without aggregations).
    Hits,
}

impl Default for ResultKind {
    fn default() -> Self {
        ResultKind::Count
    }
}

impl ResultKind {
    /// Bucket kinds partition rows into groups; everything else is a
    /// metric (a leaf in the aggregation tree).
    pub fn is_bucket_aggregation(&self) -> bool {
        matches!(
            self,
            ResultKind::Histogram
                | ResultKind::DateHistogram { .. }
                | ResultKind::DateRange { .. }
                | ResultKind::Terms
        )
    }
}
