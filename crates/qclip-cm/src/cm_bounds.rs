// cm_bounds.rs — swept-volume bounds and the separating-plane pruning test

use qclip_common::q_shared::{
    dot_product, make_normal_vectors, vector_compare_gt, vector_compare_lt, vector_ma, vector_normalize, CPlane, Vec3,
};

use crate::cm_local::TraceWork;

/// Signed distance from a box to a plane: 0 when the box straddles it,
/// otherwise the gap between the plane and the nearest box face.
pub fn box_distance_from_plane(center: &Vec3, extents: &Vec3, plane: &CPlane) -> f32 {
    let d1 = dot_product(center, &plane.normal) - plane.dist;
    let d2 = (0..3).map(|i| (extents[i] * plane.normal[i]).abs()).sum::<f32>();

    if d1 - d2 > 0.0 {
        d1 - d2
    } else if d1 + d2 < 0.0 {
        d1 + d2
    } else {
        0.0
    }
}

/// Corner table for a box: `[signbits][axis]` picks mins or maxs so the
/// corner farthest behind a plane with those sign bits can be looked up.
pub fn box_corners(size: &[Vec3; 2]) -> [Vec3; 8] {
    let mut offsets = [[0.0; 3]; 8];
    for (i, corner) in offsets.iter_mut().enumerate() {
        for j in 0..3 {
            corner[j] = size[(i >> j) & 1][j];
        }
    }
    offsets
}

impl TraceWork {
    /// Recompute `bounds` to enclose the volume from `start` to the current
    /// fraction of the sweep, optionally widened by one unit on each side.
    pub fn calc_trace_bounds(&mut self, expand: bool) {
        let startd = vector_ma(&self.start, self.trace.fraction, &self.dir);
        let forward = vector_compare_lt(&self.start, &self.end);

        if self.sphere.use_sphere {
            for i in 0..3 {
                let s = self.sphere.offset[i].abs() + self.sphere.radius;
                if forward & (1 << i) != 0 {
                    self.bounds[0][i] = self.start[i] - s;
                    self.bounds[1][i] = startd[i] + s;
                } else {
                    self.bounds[0][i] = startd[i] - s;
                    self.bounds[1][i] = self.start[i] + s;
                }
            }
        } else {
            for i in 0..3 {
                if forward & (1 << i) != 0 {
                    self.bounds[0][i] = self.start[i] + self.size[0][i];
                    self.bounds[1][i] = startd[i] + self.size[1][i];
                } else {
                    self.bounds[0][i] = startd[i] + self.size[0][i];
                    self.bounds[1][i] = self.start[i] + self.size[1][i];
                }
            }
        }

        if expand {
            for i in 0..3 {
                self.bounds[0][i] -= 1.0;
                self.bounds[1][i] += 1.0;
            }
        }
    }

    /// Build the two planes containing the sweep line and the half-width of
    /// the band around them the swept volume can occupy. `corners` is `None`
    /// for a point sweep.
    pub fn set_sweep_planes(&mut self, corners: Option<&[Vec3; 8]>) {
        let mut dir = self.dir;
        vector_normalize(&mut dir);

        let (n1, n2) = make_normal_vectors(&dir);
        self.trace_plane1 = CPlane::new(n1, dot_product(&n1, &self.start));
        self.trace_plane2 = CPlane::new(n2, dot_product(&n2, &self.start));

        match corners {
            None => {
                self.trace_dist1 = 1.0;
                self.trace_dist2 = 1.0;
            }
            Some(corners) => {
                let reach = |plane: &CPlane| {
                    corners
                        .iter()
                        .map(|c| (dot_product(&plane.normal, c) - plane.dist).abs())
                        .fold(0.0f32, f32::max)
                };
                // expand for epsilon
                self.trace_dist1 = reach(&self.trace_plane1) + 1.0;
                self.trace_dist2 = reach(&self.trace_plane2) + 1.0;
            }
        }
    }

    /// Cheap reject for a brush or patch box the sweep cannot touch.
    pub fn trace_through_bounds(&self, mins: &Vec3, maxs: &Vec3) -> bool {
        if vector_compare_gt(mins, &self.bounds[1]) != 0 || vector_compare_lt(maxs, &self.bounds[0]) != 0 {
            return false;
        }

        let mut center = [0.0; 3];
        let mut extents = [0.0; 3];
        for i in 0..3 {
            center[i] = (mins[i] + maxs[i]) * 0.5;
            extents[i] = maxs[i] - center[i];
        }

        if box_distance_from_plane(&center, &extents, &self.trace_plane1).abs() > self.trace_dist1 {
            return false;
        }
        if box_distance_from_plane(&center, &extents, &self.trace_plane2).abs() > self.trace_dist2 {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::assert_near;

    fn box_work(start: Vec3, end: Vec3, half: f32) -> TraceWork {
        let mut tw = TraceWork::default();
        tw.start = start;
        tw.end = end;
        tw.dir = [end[0] - start[0], end[1] - start[1], end[2] - start[2]];
        tw.size = [[-half; 3], [half; 3]];
        tw.offsets = box_corners(&tw.size);
        tw.extents = [half; 3];
        tw.trace.fraction = 1.0;
        tw
    }

    #[test]
    fn test_box_distance_from_plane() {
        let plane = CPlane::new([0.0, 0.0, 1.0], 10.0);
        assert_eq!(box_distance_from_plane(&[0.0, 0.0, 20.0], &[4.0; 3], &plane), 6.0);
        assert_eq!(box_distance_from_plane(&[0.0, 0.0, -20.0], &[4.0; 3], &plane), -26.0);
        assert_eq!(box_distance_from_plane(&[0.0, 0.0, 12.0], &[4.0; 3], &plane), 0.0);
    }

    #[test]
    fn test_box_corners() {
        let c = box_corners(&[[-1.0, -2.0, -3.0], [1.0, 2.0, 3.0]]);
        assert_eq!(c[0], [-1.0, -2.0, -3.0]);
        assert_eq!(c[7], [1.0, 2.0, 3.0]);
        assert_eq!(c[5], [1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_bounds_follow_direction() {
        let mut tw = box_work([0.0, 0.0, 0.0], [100.0, -50.0, 0.0], 8.0);
        tw.calc_trace_bounds(false);
        assert_eq!(tw.bounds[0], [-8.0, -58.0, -8.0]);
        assert_eq!(tw.bounds[1], [108.0, 8.0, 8.0]);

        tw.calc_trace_bounds(true);
        assert_eq!(tw.bounds[0], [-9.0, -59.0, -9.0]);
        assert_eq!(tw.bounds[1], [109.0, 9.0, 9.0]);
    }

    #[test]
    fn test_bounds_shrink_with_fraction() {
        let mut tw = box_work([0.0; 3], [100.0, 0.0, 0.0], 8.0);
        tw.trace.fraction = 0.5;
        tw.calc_trace_bounds(false);
        assert_eq!(tw.bounds[1][0], 58.0);
        assert_eq!(tw.bounds[0][0], -8.0);
    }

    #[test]
    fn test_sphere_bounds() {
        let mut tw = box_work([0.0; 3], [0.0, 0.0, -64.0], 16.0);
        tw.sphere.use_sphere = true;
        tw.sphere.radius = 16.0;
        tw.sphere.offset = [0.0, 0.0, 8.0];
        tw.calc_trace_bounds(false);
        assert_eq!(tw.bounds[0], [-16.0, -16.0, -88.0]);
        assert_eq!(tw.bounds[1], [16.0, 16.0, 24.0]);
    }

    #[test]
    fn test_trace_through_bounds_rejects_off_band() {
        let mut tw = box_work([0.0, 0.0, 0.0], [100.0, 100.0, 0.0], 4.0);
        let corners = tw.offsets;
        tw.set_sweep_planes(Some(&corners));
        tw.calc_trace_bounds(true);

        // on the diagonal
        assert!(tw.trace_through_bounds(&[40.0, 40.0, -4.0], &[48.0, 48.0, 4.0]));
        // inside the axial bounds but well off the diagonal band
        assert!(!tw.trace_through_bounds(&[80.0, 0.0, -4.0], &[88.0, 8.0, 4.0]));
        // outside the axial bounds
        assert!(!tw.trace_through_bounds(&[200.0, 200.0, 0.0], &[210.0, 210.0, 8.0]));
    }

    #[test]
    fn test_point_sweep_planes() {
        let mut tw = box_work([0.0, 0.0, 10.0], [0.0, 0.0, -10.0], 0.0);
        tw.set_sweep_planes(None);
        assert_eq!(tw.trace_dist1, 1.0);
        assert_eq!(tw.trace_dist2, 1.0);
        // both planes contain the sweep line
        assert_near(dot_product(&tw.trace_plane1.normal, &[0.0, 0.0, 1.0]), 0.0, 1e-6);
        assert_near(dot_product(&tw.trace_plane2.normal, &[0.0, 0.0, 1.0]), 0.0, 1e-6);
    }
}
