//! Normalisation of backend report rows into chart and table series.
//!
//! Backends hand back rows of `(dimensions, metrics)` strings. Charts need a
//! deduplicated label list with numeric values of the same length, tables
//! need the raw strings, and time based charts need missing days or weeks
//! filled with zeros.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SeriesError {
    #[error("metric value {0:?} is not a number")]
    NotNumeric(String),
    #[error("row has no metric at position {0}")]
    MissingMetric(usize),
    #[error("{dates} dates but {values} values")]
    LengthMismatch { dates: usize, values: usize },
}

/// One row of a backend report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportRow {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

impl ReportRow {
    pub fn new<D, M>(dimensions: D, metrics: M) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            dimensions: dimensions.into_iter().map(Into::into).collect(),
            metrics: metrics.into_iter().map(Into::into).collect(),
        }
    }
}

/// Labels with one numeric value each.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<i64>,
}

impl Series {
    /// Add `value` to `label`, appending the label if it is new.
    fn accumulate(&mut self, index: &mut HashMap<String, usize>, label: String, value: i64) {
        match index.get(&label) {
            Some(&i) => self.values[i] += value,
            None => {
                index.insert(label.clone(), self.labels.len());
                self.labels.push(label);
                self.values.push(value);
            }
        }
    }
}

/// Shared labels with two parallel value lists ("new" and "returning").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DualSeries {
    pub labels: Vec<String>,
    pub first: Vec<i64>,
    pub second: Vec<i64>,
}

/// Labels with the raw metric strings of each row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSeries {
    pub labels: Vec<String>,
    pub values: Vec<Vec<String>>,
}

/// Parse a metric string. Decimal values are truncated toward zero.
pub fn parse_metric(raw: &str) -> Result<i64, SeriesError> {
    let trimmed = raw.trim();
    if trimmed.contains('.') {
        trimmed
            .parse::<f64>()
            .map(|v| v.trunc() as i64)
            .map_err(|_| SeriesError::NotNumeric(raw.to_string()))
    } else {
        trimmed
            .parse::<i64>()
            .map_err(|_| SeriesError::NotNumeric(raw.to_string()))
    }
}

fn first_metric(row: &ReportRow) -> Result<i64, SeriesError> {
    let raw = row.metrics.first().ok_or(SeriesError::MissingMetric(0))?;
    parse_metric(raw)
}

/// Sum the first metric of every row under its formatted label, keeping the
/// order in which labels were first seen.
pub fn aggregate_bar<F>(rows: &[ReportRow], label: F) -> Result<Series, SeriesError>
where
    F: Fn(&[String]) -> String,
{
    let mut series = Series::default();
    let mut index = HashMap::new();
    for row in rows {
        let value = first_metric(row)?;
        series.accumulate(&mut index, label(&row.dimensions), value);
    }
    Ok(series)
}

/// Like [`aggregate_bar`] but only rows whose dimension at `position`
/// equals `tag` contribute.
pub fn aggregate_segment<F>(
    rows: &[ReportRow],
    position: usize,
    tag: &str,
    label: F,
) -> Result<Series, SeriesError>
where
    F: Fn(&[String]) -> String,
{
    let mut series = Series::default();
    let mut index = HashMap::new();
    for row in rows {
        if row.dimensions.get(position).map(String::as_str) != Some(tag) {
            continue;
        }
        let value = first_metric(row)?;
        series.accumulate(&mut index, label(&row.dimensions), value);
    }
    Ok(series)
}

/// Split rows into two series on the dimension at `position`. Labels come
/// from rows tagged `first_tag`; other rows are summed into `second` under
/// the same label. Labels seen only in the second partition are appended
/// with a zero first value so both lists stay aligned.
pub fn aggregate_dual<F>(
    rows: &[ReportRow],
    position: usize,
    first_tag: &str,
    label: F,
) -> Result<DualSeries, SeriesError>
where
    F: Fn(&[String]) -> String,
{
    let mut first = Series::default();
    let mut first_index = HashMap::new();
    let mut second: Vec<(String, i64)> = Vec::new();

    for row in rows {
        let value = first_metric(row)?;
        let name = label(&row.dimensions);
        if row.dimensions.get(position).map(String::as_str) == Some(first_tag) {
            first.accumulate(&mut first_index, name, value);
        } else {
            second.push((name, value));
        }
    }

    let mut dual = DualSeries {
        second: vec![0; first.labels.len()],
        labels: first.labels,
        first: first.values,
    };
    for (name, value) in second {
        match first_index.get(&name) {
            Some(&i) => dual.second[i] += value,
            None => {
                first_index.insert(name.clone(), dual.labels.len());
                dual.labels.push(name);
                dual.first.push(0);
                dual.second.push(value);
            }
        }
    }
    Ok(dual)
}

/// One label per row and the row's metrics untouched.
pub fn aggregate_table<F>(rows: &[ReportRow], label: F) -> TableSeries
where
    F: Fn(&[String]) -> String,
{
    TableSeries {
        labels: rows.iter().map(|row| label(&row.dimensions)).collect(),
        values: rows.iter().map(|row| row.metrics.clone()).collect(),
    }
}

/// Step between two consecutive points of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Week,
}

impl Granularity {
    fn days(self) -> u64 {
        match self {
            Granularity::Day => 1,
            Granularity::Week => 7,
        }
    }
}

/// Fill the gaps of a sorted, possibly sparse date series with zeros.
///
/// The output runs from the first to the last known date at the given step.
/// Known values stay on their dates, so filling a dense series is a no-op.
/// Dates that fall between steps are kept where they are.
pub fn fill_gaps(
    dates: &[NaiveDate],
    values: &[i64],
    step: Granularity,
) -> Result<(Vec<NaiveDate>, Vec<i64>), SeriesError> {
    if dates.len() != values.len() {
        return Err(SeriesError::LengthMismatch {
            dates: dates.len(),
            values: values.len(),
        });
    }

    let mut filled_dates = Vec::with_capacity(dates.len());
    let mut filled_values = Vec::with_capacity(values.len());
    let stride = Days::new(step.days());

    for (i, (&date, &value)) in dates.iter().zip(values).enumerate() {
        if let Some(&previous) = i.checked_sub(1).and_then(|p| dates.get(p)) {
            let mut cursor = previous.checked_add_days(stride);
            while let Some(missing) = cursor.filter(|d| *d < date) {
                filled_dates.push(missing);
                filled_values.push(0);
                cursor = missing.checked_add_days(stride);
            }
        }
        filled_dates.push(date);
        filled_values.push(value);
    }

    Ok((filled_dates, filled_values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn first_dimension(dims: &[String]) -> String {
        dims.first().cloned().unwrap_or_default()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, m, d).unwrap()
    }

    #[test]
    fn bar_sums_repeated_labels_in_first_seen_order() {
        let rows = vec![
            ReportRow::new(["03-01"], ["20"]),
            ReportRow::new(["03-02"], ["7"]),
            ReportRow::new(["03-01"], ["15"]),
        ];
        let series = aggregate_bar(&rows, first_dimension).unwrap();
        assert_eq!(series.labels, vec!["03-01", "03-02"]);
        assert_eq!(series.values, vec![35, 7]);
    }

    #[test]
    fn bar_truncates_decimals_and_rejects_garbage() {
        let rows = vec![ReportRow::new(["a"], ["12.9"]), ReportRow::new(["b"], ["-3.7"])];
        let series = aggregate_bar(&rows, first_dimension).unwrap();
        assert_eq!(series.values, vec![12, -3]);

        let rows = vec![ReportRow::new(["a"], ["n/a"])];
        let err = aggregate_bar(&rows, first_dimension).unwrap_err();
        assert_eq!(err, SeriesError::NotNumeric("n/a".to_string()));
    }

    #[test]
    fn bar_requires_a_metric() {
        let rows = vec![ReportRow::new(["a"], Vec::<String>::new())];
        assert_eq!(
            aggregate_bar(&rows, first_dimension).unwrap_err(),
            SeriesError::MissingMetric(0)
        );
    }

    #[test]
    fn segment_keeps_only_tagged_rows() {
        let rows = vec![
            ReportRow::new(["03-01", "New Visitor"], ["5"]),
            ReportRow::new(["03-01", "Returning Visitor"], ["3"]),
            ReportRow::new(["03-02", "Returning Visitor"], ["4"]),
            ReportRow::new(["03-02", "Returning Visitor"], ["1"]),
        ];
        let series = aggregate_segment(&rows, 1, "Returning Visitor", first_dimension).unwrap();
        assert_eq!(series.labels, vec!["03-01", "03-02"]);
        assert_eq!(series.values, vec![3, 5]);
    }

    #[test]
    fn dual_aligns_both_partitions_on_shared_labels() {
        let rows = vec![
            ReportRow::new(["03-01", "New Visitor"], ["5"]),
            ReportRow::new(["03-01", "Returning Visitor"], ["3"]),
            ReportRow::new(["03-02", "New Visitor"], ["6"]),
            ReportRow::new(["03-03", "Returning Visitor"], ["2"]),
        ];
        let dual = aggregate_dual(&rows, 1, "New Visitor", first_dimension).unwrap();
        assert_eq!(dual.labels, vec!["03-01", "03-02", "03-03"]);
        assert_eq!(dual.first, vec![5, 6, 0]);
        assert_eq!(dual.second, vec![3, 0, 2]);
    }

    #[test]
    fn table_keeps_every_row_and_raw_values() {
        let rows = vec![
            ReportRow::new(["/home"], ["10", "0.53"]),
            ReportRow::new(["/home"], ["4", "1.00"]),
        ];
        let table = aggregate_table(&rows, first_dimension);
        assert_eq!(table.labels, vec!["/home", "/home"]);
        assert_eq!(table.values[0], vec!["10", "0.53"]);
        assert_eq!(table.values[1], vec!["4", "1.00"]);
    }

    #[test]
    fn fills_missing_days_with_zeros() {
        let (dates, values) =
            fill_gaps(&[date(1, 1), date(1, 4)], &[12, 15], Granularity::Day).unwrap();
        assert_eq!(dates, vec![date(1, 1), date(1, 2), date(1, 3), date(1, 4)]);
        assert_eq!(values, vec![12, 0, 0, 15]);
    }

    #[test]
    fn fills_missing_weeks_with_zeros() {
        let (dates, values) =
            fill_gaps(&[date(1, 7), date(1, 28)], &[3, 9], Granularity::Week).unwrap();
        assert_eq!(dates, vec![date(1, 7), date(1, 14), date(1, 21), date(1, 28)]);
        assert_eq!(values, vec![3, 0, 0, 9]);
    }

    #[test]
    fn filling_dense_input_is_a_no_op() {
        let dates = vec![date(1, 1), date(1, 2), date(1, 3)];
        let values = vec![1, 2, 3];
        let (filled, filled_values) = fill_gaps(&dates, &values, Granularity::Day).unwrap();
        assert_eq!(filled, dates);
        assert_eq!(filled_values, values);
    }

    #[test]
    fn gap_filling_rejects_mismatched_lengths() {
        let err = fill_gaps(&[date(1, 1)], &[], Granularity::Day).unwrap_err();
        assert_eq!(err, SeriesError::LengthMismatch { dates: 1, values: 0 });
        assert_eq!(fill_gaps(&[], &[], Granularity::Day).unwrap(), (vec![], vec![]));
    }

    proptest! {
        #[test]
        fn gap_filling_is_dense_idempotent_and_keeps_values(
            offsets in proptest::collection::btree_set(0u64..200, 1..20),
        ) {
            let start = date(1, 1);
            let dates: Vec<_> = offsets.iter().map(|o| start + Days::new(*o)).collect();
            let values: Vec<i64> = offsets.iter().map(|o| *o as i64 + 1).collect();

            let (filled, filled_values) = fill_gaps(&dates, &values, Granularity::Day).unwrap();
            let span = (dates[dates.len() - 1] - dates[0]).num_days() as usize + 1;
            prop_assert_eq!(filled.len(), span);
            for (d, v) in dates.iter().zip(&values) {
                let at = filled.iter().position(|f| f == d).unwrap();
                prop_assert_eq!(filled_values[at], *v);
            }
            prop_assert_eq!(filled_values.iter().filter(|v| **v != 0).count(), values.len());

            let again = fill_gaps(&filled, &filled_values, Granularity::Day).unwrap();
            prop_assert_eq!(again, (filled, filled_values));
        }
    }
}
