//! Three-way union merge.
//!
//! A line-level union merge in the same spirit as `git merge-file --union`.
//! Changes made on only one side apply cleanly, identical changes appear
//! once, and where both sides changed the same base region the lines of
//! "ours" are followed by the lines of "theirs". Hunks are grouped more
//! finely than git groups them, so interleaved edits can order union lines
//! differently. The output never contains conflict markers.

use std::ops::Range;

use similar::{Algorithm, DiffTag};
use tracing::{debug, info};

/// The result of a three-way union merge.
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// The merged content.
    pub merged_content: String,
    /// Regions where both sides diverged and were concatenated.
    pub union_regions: Vec<UnionRegion>,
}

impl MergeResult {
    /// `true` when no region needed a union (a plain three-way merge would agree).
    pub fn is_clean(&self) -> bool {
        self.union_regions.is_empty()
    }

    fn whole(content: &str) -> Self {
        Self {
            merged_content: content.to_string(),
            union_regions: Vec::new(),
        }
    }
}

/// A region of merged output built from both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionRegion {
    /// First line (1-indexed) of the region in the merged output.
    pub start_line: usize,
    /// Last line (1-indexed, inclusive) of the region in the merged output.
    pub end_line: usize,
}

/// Stateless union merge engine.
pub struct Merger;

impl Merger {
    /// Merge `ours` and `theirs`, both descended from `base`.
    pub fn union_merge(base: &str, ours: &str, theirs: &str) -> MergeResult {
        info!("performing three-way union merge");

        if ours == base {
            debug!("ours == base, theirs wins cleanly");
            return MergeResult::whole(theirs);
        }
        if theirs == base || ours == theirs {
            debug!("theirs == base or identical sides, ours wins cleanly");
            return MergeResult::whole(ours);
        }

        let base_lines: Vec<&str> = base.split_inclusive('\n').collect();
        let ours_lines: Vec<&str> = ours.split_inclusive('\n').collect();
        let theirs_lines: Vec<&str> = theirs.split_inclusive('\n').collect();

        let ours_edits = edits(&base_lines, &ours_lines);
        let theirs_edits = edits(&base_lines, &theirs_lines);
        let tagged = interleave(&ours_edits, &theirs_edits);

        let mut out = Output::default();
        let mut regions = Vec::new();
        let mut cursor = 0;
        let mut i = 0;

        while i < tagged.len() {
            // Grow the group while the next edit touches or overlaps it.
            let group_start = tagged[i].1.base.start;
            let mut group_end = tagged[i].1.base.end;
            let mut j = i + 1;
            while j < tagged.len() && tagged[j].1.base.start <= group_end {
                group_end = group_end.max(tagged[j].1.base.end);
                j += 1;
            }
            let group = &tagged[i..j];
            let span = group_start..group_end;

            out.extend(&base_lines[cursor..group_start]);

            let ours_part = side_slice(group, Side::Ours, &span, &ours_lines);
            let theirs_part = side_slice(group, Side::Theirs, &span, &theirs_lines);

            match (ours_part, theirs_part) {
                (Some(o), None) => out.extend(o),
                (None, Some(t)) => out.extend(t),
                (Some(o), Some(t)) if o == t => out.extend(o),
                (Some(o), Some(t)) => {
                    let prefix = o.iter().zip(t).take_while(|(a, b)| a == b).count();
                    let suffix = o[prefix..]
                        .iter()
                        .rev()
                        .zip(t[prefix..].iter().rev())
                        .take_while(|(a, b)| a == b)
                        .count();

                    out.extend(&o[..prefix]);
                    let start_line = out.lines + 1;
                    out.extend(&o[prefix..o.len() - suffix]);
                    out.extend(&t[prefix..t.len() - suffix]);
                    if out.lines >= start_line {
                        regions.push(UnionRegion {
                            start_line,
                            end_line: out.lines,
                        });
                    }
                    out.extend(&o[o.len() - suffix..]);
                }
                (None, None) => out.extend(&base_lines[span.clone()]),
            }

            cursor = group_end;
            i = j;
        }
        out.extend(&base_lines[cursor..]);

        debug!(union_regions = regions.len(), "union merge complete");
        MergeResult {
            merged_content: out.text,
            union_regions: regions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Ours,
    Theirs,
}

/// A changed region: `base` lines were replaced by `side` lines.
#[derive(Debug, Clone)]
struct Edit {
    base: Range<usize>,
    side: Range<usize>,
}

/// Non-equal regions of the line diff from `base` to `side`, adjacent ops coalesced.
fn edits(base: &[&str], side: &[&str]) -> Vec<Edit> {
    let mut out: Vec<Edit> = Vec::new();
    for op in similar::capture_diff_slices(Algorithm::Myers, base, side) {
        let (tag, old, new) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.base.end == old.start && last.side.end == new.start => {
                last.base.end = old.end;
                last.side.end = new.end;
            }
            _ => out.push(Edit {
                base: old,
                side: new,
            }),
        }
    }
    out
}

/// Merge both edit lists into one ordered by base position, ours first on ties.
fn interleave<'a>(ours: &'a [Edit], theirs: &'a [Edit]) -> Vec<(Side, &'a Edit)> {
    let mut tagged: Vec<(Side, &Edit)> = ours
        .iter()
        .map(|e| (Side::Ours, e))
        .chain(theirs.iter().map(|e| (Side::Theirs, e)))
        .collect();
    // Stable sort keeps ours ahead of theirs at equal starts.
    tagged.sort_by_key(|(_, e)| e.base.start);
    tagged
}

/// The lines `side` holds for the base range `span`, or `None` if it left it untouched.
fn side_slice<'a, 'b>(
    group: &[(Side, &Edit)],
    side: Side,
    span: &Range<usize>,
    lines: &'b [&'a str],
) -> Option<&'b [&'a str]> {
    let mut own = group.iter().filter(|(s, _)| *s == side).map(|(_, e)| e);
    let first = own.next()?;
    let last = own.last().unwrap_or(first);

    // Outside its own edits a side matches base line for line.
    let start = first.side.start - (first.base.start - span.start);
    let end = last.side.end + (span.end - last.base.end);
    Some(&lines[start..end])
}

#[derive(Default)]
struct Output {
    text: String,
    lines: usize,
}

impl Output {
    fn extend(&mut self, lines: &[&str]) {
        for line in lines {
            // A side's unterminated last line can land mid-file in a union.
            if !self.text.is_empty() && !self.text.ends_with('\n') {
                self.text.push('\n');
            }
            self.text.push_str(line);
            self.lines += 1;
        }
    }
}
