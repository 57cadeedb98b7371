//! Cross-product enumeration of summation atom arguments.

use std::iter::FusedIterator;

use crate::model::Constant;

/// Every argument tuple drawn from per-position domains.
///
/// Fixed positions are singleton domains. Enumeration keeps one cursor per
/// position and advances the last position fastest, so memory is bounded by
/// the arity no matter how large the domains are. Any empty domain yields no
/// tuples at all.
#[derive(Debug, Clone)]
pub struct CrossProduct {
    domains: Vec<Vec<Constant>>,
    cursor: Vec<usize>,
    exhausted: bool,
}

impl CrossProduct {
    pub fn new(domains: Vec<Vec<Constant>>) -> Self {
        let exhausted = domains.iter().any(Vec::is_empty);
        Self {
            cursor: vec![0; domains.len()],
            domains,
            exhausted,
        }
    }

    /// Total number of tuples, saturating at `usize::MAX`.
    pub fn size(&self) -> usize {
        self.domains
            .iter()
            .fold(1usize, |acc, d| acc.saturating_mul(d.len()))
    }

    fn advance(&mut self) {
        for pos in (0..self.cursor.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.domains[pos].len() {
                return;
            }
            self.cursor[pos] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for CrossProduct {
    type Item = Vec<Constant>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let tuple = self
            .cursor
            .iter()
            .zip(&self.domains)
            .map(|(&i, domain)| domain[i].clone())
            .collect();
        self.advance();
        Some(tuple)
    }
}

impl FusedIterator for CrossProduct {}
