//! Pure board geometry: pins, buckets, walls and the shove line.
//! No state; everything is derived from a [`BoardLayout`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::BoardLayout;

/// One scoring bucket's horizontal span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub index: usize,
    pub left: f32,
    pub right: f32,
    pub score: u32,
}

impl Bucket {
    pub fn center_x(&self) -> f32 {
        (self.left + self.right) * 0.5
    }

    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x < self.right
    }
}

/// Axis-aligned box used for walls and divider posts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub center: Vec2,
    pub half_extents: Vec2,
}

/// Y coordinate of pin row `row` (0-based). Rows are spread evenly between
/// the top drop margin and the bottom bucket margin.
pub fn row_y(layout: &BoardLayout, row: u32) -> f32 {
    if layout.pin_rows <= 1 {
        return layout.top_margin;
    }
    let usable = layout.height - layout.top_margin - layout.bottom_margin;
    layout.top_margin + usable * row as f32 / (layout.pin_rows - 1) as f32
}

/// Number of pins on a row: even rows get `pins_per_row`, odd rows one fewer.
pub fn pins_in_row(layout: &BoardLayout, row: u32) -> u32 {
    if row % 2 == 0 {
        layout.pins_per_row
    } else {
        layout.pins_per_row.saturating_sub(1)
    }
}

/// All pin centres, row by row, left to right. Each row is centred horizontally.
pub fn pin_positions(layout: &BoardLayout) -> Vec<Vec2> {
    let mut pins = Vec::new();
    let mid = layout.width * 0.5;
    for row in 0..layout.pin_rows {
        let count = pins_in_row(layout, row);
        if count == 0 {
            continue;
        }
        let y = row_y(layout, row);
        let span = (count - 1) as f32 * layout.pin_spacing;
        let start = mid - span * 0.5;
        for i in 0..count {
            pins.push(Vec2::new(start + i as f32 * layout.pin_spacing, y));
        }
    }
    pins
}

/// Split the board width into `bucket_count` spans, equal or weighted by
/// `bucket_fractions`, each carrying its configured score.
pub fn bucket_boundaries(layout: &BoardLayout) -> Vec<Bucket> {
    let count = layout.bucket_count.max(1);
    let weights: Vec<f32> = match &layout.bucket_fractions {
        Some(fractions) if fractions.len() == count => fractions.clone(),
        _ => vec![1.0; count],
    };
    let total: f32 = weights.iter().sum();

    let mut buckets = Vec::with_capacity(count);
    let mut left = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        let right = if index + 1 == count {
            layout.width
        } else {
            left + layout.width * weight / total
        };
        buckets.push(Bucket {
            index,
            left,
            right,
            score: layout.bucket_scores.get(index).copied().unwrap_or(0),
        });
        left = right;
    }
    buckets
}

/// Bucket whose span contains `x`. Positions off either edge clamp to the edge bucket.
pub fn bucket_index_at(layout: &BoardLayout, x: f32) -> usize {
    index_in(&bucket_boundaries(layout), x)
}

/// Same as [`bucket_index_at`] against precomputed boundaries.
pub fn index_in(buckets: &[Bucket], x: f32) -> usize {
    if buckets.is_empty() {
        return 0;
    }
    buckets
        .iter()
        .position(|b| x < b.right)
        .unwrap_or(buckets.len() - 1)
}

/// Y of pin row `row_limit - 1`. Shoves are legal only at or above this line.
/// A limit of zero closes the zone (returns the top edge).
pub fn shove_zone_y(layout: &BoardLayout, row_limit: u32) -> f32 {
    if row_limit == 0 {
        return 0.0;
    }
    row_y(layout, row_limit.min(layout.pin_rows) - 1)
}

/// Top of the bucket divider posts.
pub fn bucket_top_y(layout: &BoardLayout) -> f32 {
    layout.height - layout.divider_height
}

/// Where a new puck spawns: halfway into the drop margin, never above the top edge.
pub fn drop_y(layout: &BoardLayout) -> f32 {
    (layout.top_margin * 0.5).max(layout.puck_radius)
}

/// Clamp a drop X so the puck starts fully inside the side walls.
pub fn clamp_drop_x(layout: &BoardLayout, x: f32) -> f32 {
    let r = layout.puck_radius;
    if !x.is_finite() {
        return layout.width * 0.5;
    }
    x.clamp(r, (layout.width - r).max(r))
}

/// Left wall, right wall and floor. Side walls extend one board height above
/// the top edge so a hard upward shove cannot escape sideways.
pub fn wall_segments(layout: &BoardLayout) -> [Segment; 3] {
    let t = layout.wall_thickness;
    let wall_half_h = layout.height + t * 0.5;
    let wall_center_y = t * 0.5;
    [
        Segment {
            center: Vec2::new(-t * 0.5, wall_center_y),
            half_extents: Vec2::new(t * 0.5, wall_half_h),
        },
        Segment {
            center: Vec2::new(layout.width + t * 0.5, wall_center_y),
            half_extents: Vec2::new(t * 0.5, wall_half_h),
        },
        Segment {
            center: Vec2::new(layout.width * 0.5, layout.height + t * 0.5),
            half_extents: Vec2::new(layout.width * 0.5 + t, t * 0.5),
        },
    ]
}

/// Divider posts standing on the floor at every interior bucket boundary.
pub fn divider_segments(layout: &BoardLayout) -> Vec<Segment> {
    if layout.divider_height <= 0.0 {
        return Vec::new();
    }
    let half_h = layout.divider_height * 0.5;
    bucket_boundaries(layout)
        .iter()
        .skip(1)
        .map(|b| Segment {
            center: Vec2::new(b.left, layout.height - half_h),
            half_extents: Vec2::new(layout.pin_radius * 0.5, half_h),
        })
        .collect()
}
