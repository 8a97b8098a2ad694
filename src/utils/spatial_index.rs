use std::cmp::Ordering;
use std::fmt;

use rayon::prelude::*;

use crate::config::constants::KDTREE_NODE_SIZE;
use crate::data::poi::GeoPoint;
use crate::error::{AccessError, Result};

#[derive(Clone, Copy, Debug)]
struct Entry {
    id: usize,
    point: GeoPoint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn next(self) -> Self {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }

    fn of(self, point: &GeoPoint) -> f64 {
        match self {
            Axis::X => point.x,
            Axis::Y => point.y,
        }
    }
}

/// Static 2D k-d tree answering exact radius queries over a fixed point set.
///
/// Entries are stored in one flat array: each range `[left, right]` larger
/// than a leaf bucket keeps its median at `(left + right) / 2`, split on
/// alternating axes. Results are reported as positions in the input order.
#[derive(Clone)]
pub struct SpatialIndex {
    entries: Vec<Entry>,
    node_size: usize,
}

// Manual Debug implementation for SpatialIndex
impl fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("len", &self.entries.len())
            .field("node_size", &self.node_size)
            .finish()
    }
}

impl SpatialIndex {
    /// Builds the tree in O(n log n). An empty input yields an empty index
    /// whose queries return nothing.
    pub fn new(points: &[GeoPoint]) -> Result<Self> {
        Self::with_node_size(points, KDTREE_NODE_SIZE)
    }

    pub fn with_node_size(points: &[GeoPoint], node_size: usize) -> Result<Self> {
        if let Some((idx, p)) = points.iter().enumerate().find(|(_, p)| !p.is_finite()) {
            return Err(AccessError::InvalidInput(format!(
                "point {} has a non-finite coordinate ({}, {})",
                idx, p.x, p.y
            )));
        }

        let mut entries: Vec<Entry> = points
            .iter()
            .enumerate()
            .map(|(id, point)| Entry { id, point: *point })
            .collect();

        let node_size = node_size.max(1);
        if !entries.is_empty() {
            let last = entries.len() - 1;
            build_subtree(&mut entries, 0, last, Axis::X, node_size);
        }

        Ok(Self { entries, node_size })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All indexed positions within `radius` of `center`, boundary
    /// inclusive, in ascending order.
    pub fn query_radius(&self, center: &GeoPoint, radius: f64) -> Result<Vec<usize>> {
        validate_radius(radius)?;
        Ok(self.within_sorted(center, radius * radius))
    }

    /// For every point of `self`, the positions in `other` within `radius`.
    ///
    /// Same result as calling [`SpatialIndex::query_radius`] on `other` once
    /// per point of `self`, in `self`'s input order; the per-point queries
    /// run on the rayon pool.
    pub fn query_all_pairs_radius(&self, other: &SpatialIndex, radius: f64) -> Result<Vec<Vec<usize>>> {
        validate_radius(radius)?;
        let radius_sq = radius * radius;

        let mut by_position: Vec<(usize, Vec<usize>)> = self
            .entries
            .par_iter()
            .map(|entry| (entry.id, other.within_sorted(&entry.point, radius_sq)))
            .collect();

        by_position.sort_unstable_by_key(|(id, _)| *id);
        Ok(by_position.into_iter().map(|(_, found)| found).collect())
    }

    /// Unvalidated form of [`SpatialIndex::query_radius`] taking the squared
    /// radius, for callers that checked the radius once up front.
    pub(crate) fn within_sorted(&self, center: &GeoPoint, radius_sq: f64) -> Vec<usize> {
        let mut results = Vec::new();
        self.collect_within(center, radius_sq, &mut results);
        results.sort_unstable();
        results
    }

    fn collect_within(&self, center: &GeoPoint, radius_sq: f64, results: &mut Vec<usize>) {
        if self.entries.is_empty() {
            return;
        }

        let mut stack = vec![(0usize, self.entries.len() - 1, Axis::X)];

        while let Some((left, right, axis)) = stack.pop() {
            // Leaf bucket: scan linearly
            if right - left <= self.node_size {
                for entry in &self.entries[left..=right] {
                    if entry.point.distance_sq_to(center) <= radius_sq {
                        results.push(entry.id);
                    }
                }
                continue;
            }

            let mid = (left + right) / 2;
            let median = &self.entries[mid];
            if median.point.distance_sq_to(center) <= radius_sq {
                results.push(median.id);
            }

            // Prune on the squared axis gap so that a subtree is skipped only
            // when every point in it fails the same squared-distance test.
            let gap = axis.of(center) - axis.of(&median.point);
            let gap_exceeds = gap * gap > radius_sq;

            if !(gap > 0.0 && gap_exceeds) {
                stack.push((left, mid - 1, axis.next()));
            }
            if !(gap < 0.0 && gap_exceeds) {
                stack.push((mid + 1, right, axis.next()));
            }
        }
    }
}

fn validate_radius(radius: f64) -> Result<()> {
    if radius.is_nan() || radius < 0.0 {
        return Err(AccessError::InvalidParameter(format!(
            "query radius must be >= 0, got {}",
            radius
        )));
    }
    Ok(())
}

fn build_subtree(entries: &mut [Entry], left: usize, right: usize, axis: Axis, node_size: usize) {
    if right - left <= node_size {
        return;
    }

    let mid = (left + right) / 2;
    entries[left..=right].select_nth_unstable_by(mid - left, |a, b| compare_on(axis, a, b));

    build_subtree(entries, left, mid - 1, axis.next(), node_size);
    build_subtree(entries, mid + 1, right, axis.next(), node_size);
}

fn compare_on(axis: Axis, a: &Entry, b: &Entry) -> Ordering {
    axis.of(&a.point).total_cmp(&axis.of(&b.point))
}
