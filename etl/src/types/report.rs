use chrono::NaiveDate;

/// A row of the reporting table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportRow {
    pub date: NaiveDate,
    pub original_rate: f64,
    pub adjusted_rate: f64,
}

/// The reporting table content together with its aggregate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    /// Rows ordered by date.
    pub rows: Vec<ReportRow>,
    /// Mean original rate, absent when there are no rows.
    pub average_original_rate: Option<f64>,
    /// Mean adjusted rate, absent when there are no rows.
    pub average_adjusted_rate: Option<f64>,
}
