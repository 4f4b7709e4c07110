//! Applies a batch of slide operations to a deck.
//!
//! The batch is classified by slide number: negative numbers delete,
//! fractional numbers insert after the slide with the same integer part,
//! integral numbers replace the slide at that position (or create one there
//! when nothing matches). Deletions run first, then replacements, then every
//! surviving and new slide is ordered by `(integer part, fraction, source,
//! input order)` and renumbered `1..=len`.
//!
//! Stale deletions and replacements of missing slides are tolerated, never
//! errors. The only failure is a non-finite slide number.

use std::cmp::Ordering;
use std::collections::HashMap;

use slide_protocol::{SlideDeck, SlideOperation, SlideRecord};

use crate::error::MergeError;

/// Tolerance used when deciding whether a number is integral and when
/// matching a deletion to a slide.
pub const NUMBER_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperationKind {
    /// Remove the slide numbered `target`.
    Delete { target: f64 },
    /// New slide placed after slide `after`, ordered by `fraction`.
    Insert { after: i64, fraction: f64 },
    /// Overwrite slide `target`, or create it at that position.
    Replace { target: i64 },
}

/// Classify a slide number. The number must be finite.
pub fn classify(number: f64) -> OperationKind {
    if number < 0.0 {
        return OperationKind::Delete { target: -number };
    }
    match split_number(number) {
        (target, fraction) if fraction == 0.0 => OperationKind::Replace { target },
        (after, fraction) => OperationKind::Insert { after, fraction },
    }
}

/// Integer part and fraction of a non-negative number, snapping values
/// within [`NUMBER_EPSILON`] of an integer onto it.
fn split_number(number: f64) -> (i64, f64) {
    let rounded = number.round();
    if (number - rounded).abs() < NUMBER_EPSILON {
        return (rounded as i64, 0.0);
    }
    let floor = number.floor();
    (floor as i64, number - floor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Source {
    Base,
    Operation,
}

#[derive(Debug, Clone, Copy)]
struct SortKey {
    whole: i64,
    fraction: f64,
    source: Source,
    order: usize,
}

impl SortKey {
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.whole
            .cmp(&other.whole)
            .then_with(|| self.fraction.total_cmp(&other.fraction))
            .then_with(|| self.source.cmp(&other.source))
            .then_with(|| self.order.cmp(&other.order))
    }
}

struct Entry {
    key: SortKey,
    record: SlideRecord,
}

#[derive(Debug, Default)]
struct MergeStats {
    deleted: usize,
    stale_deletes: usize,
    replaced: usize,
    created: usize,
    inserted: usize,
}

/// Merge `operations` into `base`, returning a new contiguously numbered deck.
pub fn merge(base: &SlideDeck, operations: &[SlideOperation]) -> Result<SlideDeck, MergeError> {
    for slide in base {
        ensure_finite("base slide", slide.number)?;
    }
    for op in operations {
        ensure_finite("operation", op.number)?;
    }

    let mut working: Vec<Entry> = base
        .iter()
        .enumerate()
        .map(|(order, slide)| {
            let (whole, fraction) = split_number(slide.number.max(0.0));
            Entry {
                key: SortKey { whole, fraction, source: Source::Base, order },
                record: slide.clone(),
            }
        })
        .collect();

    let mut deletes = Vec::new();
    let mut replaces = Vec::new();
    let mut inserts = Vec::new();
    for (order, op) in operations.iter().enumerate() {
        match classify(op.number) {
            OperationKind::Delete { target } => deletes.push(target),
            OperationKind::Replace { target } => replaces.push((order, target, op)),
            OperationKind::Insert { after, fraction } => inserts.push((order, after, fraction, op)),
        }
    }

    let mut stats = MergeStats::default();

    for target in deletes {
        let pos = working
            .iter()
            .position(|entry| (entry.record.number - target).abs() < NUMBER_EPSILON);
        match pos {
            Some(pos) => {
                working.remove(pos);
                stats.deleted += 1;
            }
            None => {
                tracing::debug!("ignoring delete of slide {target}: no such slide");
                stats.stale_deletes += 1;
            }
        }
    }

    // Slides surviving deletion keep their original numbers until the final
    // renumbering, so replacements match against those.
    let mut replaced_by: HashMap<i64, usize> = HashMap::new();
    let mut created = Vec::new();
    for (order, target, op) in replaces {
        let existing = working.iter_mut().find(|entry| {
            entry.key.source == Source::Base && entry.key.fraction == 0.0 && entry.key.whole == target
        });
        match existing {
            Some(entry) => {
                if let Some(previous) = replaced_by.insert(target, order) {
                    tracing::warn!(
                        "slide {target} replaced by operations {previous} and {order}; keeping the later one"
                    );
                } else {
                    stats.replaced += 1;
                }
                entry.record = op.to_record(entry.record.number);
            }
            None => {
                tracing::debug!("no slide {target} to replace; creating it at that position");
                created.push(Entry {
                    key: SortKey { whole: target, fraction: 0.0, source: Source::Operation, order },
                    record: op.to_record(op.number),
                });
                stats.created += 1;
            }
        }
    }
    working.extend(created);

    for (order, after, fraction, op) in inserts {
        working.push(Entry {
            key: SortKey { whole: after, fraction, source: Source::Operation, order },
            record: op.to_record(op.number),
        });
        stats.inserted += 1;
    }

    working.sort_by(|a, b| a.key.cmp_key(&b.key));

    tracing::debug!(
        deleted = stats.deleted,
        stale_deletes = stats.stale_deletes,
        replaced = stats.replaced,
        created = stats.created,
        inserted = stats.inserted,
        total = working.len(),
        "merged slide operations"
    );

    Ok(renumbered(working.into_iter().map(|entry| entry.record)))
}

/// The deck ordered and numbered `1..=len`; same as merging no operations.
pub fn renumber(deck: &SlideDeck) -> Result<SlideDeck, MergeError> {
    merge(deck, &[])
}

fn renumbered(records: impl Iterator<Item = SlideRecord>) -> SlideDeck {
    records
        .enumerate()
        .map(|(i, mut record)| {
            record.number = (i + 1) as f64;
            record
        })
        .collect::<Vec<_>>()
        .into()
}

fn ensure_finite(source_kind: &'static str, value: f64) -> Result<(), MergeError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MergeError::InvalidNumber { source_kind, value })
    }
}
