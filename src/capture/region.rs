//! Capture-region optimizer.
//!
//! Rules far apart on screen would force one huge capture rectangle whose
//! per-tick grab cost dwarfs the matching work. Instead, sample points are
//! clustered by proximity (single linkage: a point joins a cluster when it is
//! within epsilon of any member) and each cluster gets its own bounding
//! rectangle, expanded to cover every member rule's full sample area.

use log::info;

use crate::capture::CaptureRect;
use crate::models::Rule;

/// The capture rectangles for one loaded profile. Computed at load time and
/// immutable while the pipeline runs.
#[derive(Debug, Clone, Default)]
pub struct RegionPlan {
    rects: Vec<CaptureRect>,
}

impl RegionPlan {
    /// Plans capture for the given rules' sample geometries. An empty rule
    /// slice yields an empty plan and the tick loop idles.
    pub fn compute<'a>(rules: impl IntoIterator<Item = &'a Rule>, epsilon: u32) -> Self {
        // (center, bounding box) per rule
        let boxes: Vec<(i64, i64, CaptureRect)> = rules
            .into_iter()
            .map(|rule| {
                let center = rule.geometry.center();
                let rect = CaptureRect::for_geometry(&rule.geometry);
                (center.x as i64, center.y as i64, rect)
            })
            .collect();

        if boxes.is_empty() {
            return Self::default();
        }

        let clusters = cluster_indices(&boxes, epsilon);
        let rects: Vec<CaptureRect> = clusters
            .iter()
            .map(|members| enclosing_rect(members.iter().map(|&i| &boxes[i].2)))
            .collect();

        let total: u64 = rects.iter().map(|r| r.area()).sum();
        info!(
            "capture plan: {} rule(s) -> {} rect(s), {} px total",
            boxes.len(),
            rects.len(),
            total
        );

        Self { rects }
    }

    pub fn rects(&self) -> &[CaptureRect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

/// Groups point indices by epsilon-proximity, equivalent to DBSCAN with a
/// minimum cluster size of 1: every point lands in exactly one cluster.
fn cluster_indices(boxes: &[(i64, i64, CaptureRect)], epsilon: u32) -> Vec<Vec<usize>> {
    let eps_sq = (epsilon as i64) * (epsilon as i64);
    let mut cluster_of: Vec<Option<usize>> = vec![None; boxes.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for start in 0..boxes.len() {
        if cluster_of[start].is_some() {
            continue;
        }
        let id = clusters.len();
        clusters.push(vec![start]);
        cluster_of[start] = Some(id);

        // Grow the cluster transitively from the seed point.
        let mut frontier = vec![start];
        while let Some(i) = frontier.pop() {
            for j in 0..boxes.len() {
                if cluster_of[j].is_some() {
                    continue;
                }
                let dx = boxes[i].0 - boxes[j].0;
                let dy = boxes[i].1 - boxes[j].1;
                if dx * dx + dy * dy <= eps_sq {
                    cluster_of[j] = Some(id);
                    clusters[id].push(j);
                    frontier.push(j);
                }
            }
        }
    }

    clusters
}

fn enclosing_rect<'a>(rects: impl Iterator<Item = &'a CaptureRect>) -> CaptureRect {
    let mut left = i32::MAX;
    let mut top = i32::MAX;
    let mut right = i32::MIN;
    let mut bottom = i32::MIN;
    for r in rects {
        left = left.min(r.left);
        top = top.min(r.top);
        right = right.max(r.left + r.width as i32);
        bottom = bottom.max(r.top + r.height as i32);
    }
    CaptureRect::new(left, top, (right - left) as u32, (bottom - top) as u32)
}
