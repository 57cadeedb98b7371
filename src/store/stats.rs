//! Per-table statistics used to plan query evaluation.

use std::cmp::Ordering;

use crate::model::Constant;

/// Row count plus per-column value distributions of one predicate table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableStats {
    count: usize,
    // Sorted column values, one entry per row.
    columns: Vec<Vec<Constant>>,
}

impl TableStats {
    /// Build from the argument lists of every row of a table.
    pub fn from_rows<'a>(arity: usize, rows: impl IntoIterator<Item = &'a [Constant]>) -> Self {
        let mut columns: Vec<Vec<Constant>> = vec![Vec::new(); arity];
        let mut count = 0;
        for row in rows {
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value.clone());
            }
            count += 1;
        }
        for column in &mut columns {
            column.sort();
        }
        Self { count, columns }
    }

    /// Number of rows.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of distinct values in `column`.
    pub fn cardinality(&self, column: usize) -> Option<usize> {
        let values = self.columns.get(column)?;
        let mut distinct = 0;
        let mut prev: Option<&Constant> = None;
        for v in values {
            if prev != Some(v) {
                distinct += 1;
                prev = Some(v);
            }
        }
        Some(distinct)
    }

    /// `cardinality / count`: 1.0 for a key column, lower as values repeat.
    /// An empty table has selectivity 0.
    pub fn selectivity(&self, column: usize) -> Option<f64> {
        let cardinality = self.cardinality(column)?;
        if self.count == 0 {
            return Some(0.0);
        }
        Some(cardinality as f64 / self.count as f64)
    }

    /// Fraction of rows whose `column` value lies in `[lo, hi]`.
    pub fn histogram_selectivity(&self, column: usize, lo: &Constant, hi: &Constant) -> Option<f64> {
        let values = self.columns.get(column)?;
        if self.count == 0 || lo > hi {
            return Some(0.0);
        }
        let start = values.partition_point(|v| v.cmp(lo) == Ordering::Less);
        let end = values.partition_point(|v| v.cmp(hi) != Ordering::Greater);
        Some((end - start) as f64 / self.count as f64)
    }
}
