//! CSV output of per-round metrics
//!
//! One row per (round, oracle), for spreadsheet analysis and plotting tools.

use crate::acquisition::RoundMetrics;

/// CSV record for one channel in one round
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRoundRow {
    pub round: usize,
    pub oracle: String,
    pub queried: usize,
    pub labeled: usize,
    pub positives: usize,
    pub trained: bool,
    pub tpr_at_cap: f64,
    pub fpr_at_cap: f64,
    pub alternate_tpr_at_cap: f64,
    pub usable: bool,
    pub auc: Option<f64>,
    pub joint_usable: bool,
}

/// CSV output formatter for round metrics
#[derive(Debug, Default)]
pub struct RoundMetricsCsv {
    rows: Vec<CsvRoundRow>,
}

impl RoundMetricsCsv {
    /// Create an empty formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten every round into rows
    pub fn from_rounds(rounds: &[RoundMetrics]) -> Self {
        let mut csv = Self::new();
        for round in rounds {
            csv.add_round(round);
        }
        csv
    }

    /// Add one row per channel of a round
    pub fn add_round(&mut self, round: &RoundMetrics) {
        for channel in &round.channels {
            self.rows.push(CsvRoundRow {
                round: round.round,
                oracle: channel.oracle.clone(),
                queried: channel.queried_this_round,
                labeled: channel.labeled_total,
                positives: channel.labeled_positive,
                trained: channel.trained,
                tpr_at_cap: channel.tpr_at_cap(),
                fpr_at_cap: channel.fpr_at_cap(),
                alternate_tpr_at_cap: channel.alternate_tpr_at_cap,
                usable: channel.gate.usable,
                auc: channel.auc,
                joint_usable: round.joint_usable,
            });
        }
    }

    pub fn rows(&self) -> &[CsvRoundRow] {
        &self.rows
    }

    fn header() -> &'static str {
        "round,oracle,queried,labeled,positives,trained,tpr_at_cap,fpr_at_cap,alternate_tpr_at_cap,usable,auc,joint_usable"
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_row(row: &CsvRoundRow) -> String {
        [
            row.round.to_string(),
            Self::escape_field(&row.oracle),
            row.queried.to_string(),
            row.labeled.to_string(),
            row.positives.to_string(),
            row.trained.to_string(),
            format!("{:.6}", row.tpr_at_cap),
            format!("{:.6}", row.fpr_at_cap),
            format!("{:.6}", row.alternate_tpr_at_cap),
            row.usable.to_string(),
            row.auc.map(|a| format!("{:.6}", a)).unwrap_or_default(),
            row.joint_usable.to_string(),
        ]
        .join(",")
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        output.push_str(Self::header());
        output.push('\n');

        for row in &self.rows {
            output.push_str(&Self::format_row(row));
            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(oracle: &str) -> CsvRoundRow {
        CsvRoundRow {
            round: 2,
            oracle: oracle.to_string(),
            queried: 10,
            labeled: 20,
            positives: 7,
            trained: true,
            tpr_at_cap: 0.5,
            fpr_at_cap: 0.04,
            alternate_tpr_at_cap: 0.25,
            usable: true,
            auc: Some(0.875),
            joint_usable: false,
        }
    }

    #[test]
    fn test_csv_header() {
        let csv = RoundMetricsCsv::new().to_csv();
        assert_eq!(
            csv.lines().next().unwrap(),
            "round,oracle,queried,labeled,positives,trained,tpr_at_cap,fpr_at_cap,alternate_tpr_at_cap,usable,auc,joint_usable"
        );
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_csv_escape_field_simple() {
        assert_eq!(RoundMetricsCsv::escape_field("PAE"), "PAE");
    }

    #[test]
    fn test_csv_escape_field_with_comma() {
        assert_eq!(RoundMetricsCsv::escape_field("a,b"), "\"a,b\"");
    }

    #[test]
    fn test_csv_escape_field_with_quote() {
        assert_eq!(RoundMetricsCsv::escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_format_row() {
        assert_eq!(
            RoundMetricsCsv::format_row(&row("PAE")),
            "2,PAE,10,20,7,true,0.500000,0.040000,0.250000,true,0.875000,false"
        );
    }

    #[test]
    fn test_csv_missing_auc_is_empty() {
        let mut r = row("MSA");
        r.auc = None;
        let line = RoundMetricsCsv::format_row(&r);
        assert!(line.contains(",true,,false"));
    }

    #[test]
    fn test_csv_from_run() {
        use crate::acquisition::AcquisitionRun;
        use crate::config::RunConfig;
        use crate::synthetic::{generate, SyntheticConfig};

        let dataset = generate(&SyntheticConfig {
            n_items: 120,
            ..SyntheticConfig::default()
        })
        .unwrap();
        let config = RunConfig {
            rounds: 2,
            ..RunConfig::default()
        };
        let outcome = AcquisitionRun::new(&dataset, config).unwrap().run().unwrap();

        let csv = RoundMetricsCsv::from_rounds(&outcome.round_metrics);
        assert_eq!(csv.rows().len(), outcome.round_metrics.len() * 2);
        assert_eq!(csv.to_csv().lines().count(), csv.rows().len() + 1);
    }
}
