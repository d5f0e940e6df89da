// cm_capsule.rs — sphere, cylinder and capsule collision for the temporary capsule model

use qclip_common::q_shared::{
    dot_product, vector_add, vector_length_squared, vector_ma, vector_normalize, vector_scale,
    vector_subtract, Vec3, CONTENTS_BODY,
};

use crate::cm_bounds::box_corners;
use crate::cm_local::*;
use crate::cm_math::{distance_from_line_squared, square_root_float, vector_distance_squared};

/// A vertical capsule fitted inside a model's bounding box: a cylinder
/// capped by two spheres whose radius is the smaller of the half width
/// and the half height.
#[derive(Debug, Clone, Copy)]
pub struct CapsuleShape {
    pub center: Vec3,
    pub size: [Vec3; 2],
    pub radius: f32,
    pub halfheight: f32,
}

impl CapsuleShape {
    pub fn from_bounds(mins: &Vec3, maxs: &Vec3) -> Self {
        let mut center = [0.0; 3];
        let mut size = [[0.0; 3]; 2];
        for i in 0..3 {
            center[i] = (mins[i] + maxs[i]) * 0.5;
            size[0][i] = mins[i] - center[i];
            size[1][i] = maxs[i] - center[i];
        }
        let halfwidth = size[1][0];
        let halfheight = size[1][2];

        Self {
            center,
            size,
            radius: halfwidth.min(halfheight),
            halfheight,
        }
    }

    /// Vertical distance from the center to either end-sphere center.
    pub fn cap_offset(&self) -> f32 {
        self.halfheight - self.radius
    }

    pub fn top(&self) -> Vec3 {
        [self.center[0], self.center[1], self.center[2] + self.cap_offset()]
    }

    pub fn bottom(&self) -> Vec3 {
        [self.center[0], self.center[1], self.center[2] - self.cap_offset()]
    }

    /// The same capsule as a sweep description centered on the origin.
    pub fn as_sphere(&self) -> Sphere {
        Sphere {
            use_sphere: true,
            radius: self.radius,
            halfheight: self.halfheight,
            offset: [0.0, 0.0, self.cap_offset()],
        }
    }
}

impl TraceWork {
    fn hit_body(&mut self, fraction: f32, normal: Vec3, intersection: &Vec3) {
        self.trace.fraction = fraction;
        self.trace.plane.normal = normal;
        let world = vector_add(&self.model_origin, intersection);
        self.trace.plane.dist = dot_product(&normal, &world);
        self.trace.contents = CONTENTS_BODY;
    }

    /// First intersection of the segment with a sphere.
    pub fn trace_through_sphere(&mut self, origin: &Vec3, radius: f32, start: &Vec3, end: &Vec3) {
        // if inside the sphere
        if vector_distance_squared(origin, start) < radius * radius {
            self.trace.fraction = 0.0;
            self.trace.startsolid = true;
            if vector_distance_squared(origin, end) < radius * radius {
                self.trace.allsolid = true;
            }
            return;
        }

        let mut dir = vector_subtract(end, start);
        let length = vector_normalize(&mut dir);

        let l1 = distance_from_line_squared(origin, start, end, &dir);
        let l2 = vector_distance_squared(origin, end);
        // no intersection and the end point is at least an epsilon away
        if l1 >= radius * radius && l2 > (radius + SURFACE_CLIP_EPSILON) * (radius + SURFACE_CLIP_EPSILON) {
            return;
        }

        // |origin - (start + t * dir)| = radius, dir is unit length so a = 1
        let v1 = vector_subtract(start, origin);
        let b = 2.0 * dot_product(&dir, &v1);
        let c = dot_product(&v1, &v1) - (radius + RADIUS_EPSILON) * (radius + RADIUS_EPSILON);
        let d = b * b - 4.0 * c;
        if d <= 0.0 {
            return;
        }

        let mut fraction = (-b - square_root_float(d)) * 0.5;
        if fraction < 0.0 {
            fraction = 0.0;
        } else {
            fraction /= length;
        }

        if fraction < self.trace.fraction {
            let intersection = vector_ma(start, fraction, &vector_subtract(end, start));
            let normal = vector_scale(&vector_subtract(&intersection, origin), 1.0 / (radius + RADIUS_EPSILON));
            self.hit_body(fraction, normal, &intersection);
        }
    }

    /// First intersection of the segment with a vertical cylinder extending
    /// `halfheight` above and below `origin`.
    pub fn trace_through_vertical_cylinder(
        &mut self,
        origin: &Vec3,
        radius: f32,
        halfheight: f32,
        start: &Vec3,
        end: &Vec3,
    ) {
        let start2d = [start[0], start[1], 0.0];
        let end2d = [end[0], end[1], 0.0];
        let org2d = [origin[0], origin[1], 0.0];
        let in_band = |z: f32| z <= origin[2] + halfheight && z >= origin[2] - halfheight;

        if in_band(start[2]) && vector_length_squared(&vector_subtract(&start2d, &org2d)) < radius * radius {
            self.trace.fraction = 0.0;
            self.trace.startsolid = true;
            if vector_length_squared(&vector_subtract(&end2d, &org2d)) < radius * radius {
                self.trace.allsolid = true;
            }
            return;
        }

        let mut dir = vector_subtract(&end2d, &start2d);
        let length = vector_normalize(&mut dir);

        let l1 = distance_from_line_squared(&org2d, &start2d, &end2d, &dir);
        let l2 = vector_length_squared(&vector_subtract(&end2d, &org2d));
        if l1 >= radius * radius && l2 > (radius + SURFACE_CLIP_EPSILON) * (radius + SURFACE_CLIP_EPSILON) {
            return;
        }

        let v1 = vector_subtract(start, origin);
        let b = 2.0 * (v1[0] * dir[0] + v1[1] * dir[1]);
        let c = v1[0] * v1[0] + v1[1] * v1[1] - (radius + RADIUS_EPSILON) * (radius + RADIUS_EPSILON);
        let d = b * b - 4.0 * c;
        if d <= 0.0 {
            return;
        }

        let mut fraction = (-b - square_root_float(d)) * 0.5;
        if fraction < 0.0 {
            fraction = 0.0;
        } else {
            fraction /= length;
        }

        if fraction < self.trace.fraction {
            let intersection = vector_ma(start, fraction, &vector_subtract(end, start));
            // only the side of the cylinder, the caps belong to the spheres
            if in_band(intersection[2]) {
                let mut normal = vector_subtract(&intersection, origin);
                normal[2] = 0.0;
                let normal = vector_scale(&normal, 1.0 / (radius + RADIUS_EPSILON));
                self.hit_body(fraction, normal, &intersection);
            }
        }
    }

    fn mark_inside(&mut self) {
        self.trace.startsolid = true;
        self.trace.allsolid = true;
        self.trace.fraction = 0.0;
    }
}

impl ClipMap {
    /// Position test of the trace capsule against the capsule model.
    pub fn test_capsule_in_capsule(&self, tw: &mut TraceWork, model: ClipHandle) {
        let (mins, maxs) = self.model_bounds(model);
        let target = CapsuleShape::from_bounds(&mins, &maxs);

        let top = vector_add(&tw.start, &tw.sphere.offset);
        let bottom = vector_subtract(&tw.start, &tw.sphere.offset);
        let upper = target.top();
        let lower = target.bottom();
        let r = (tw.sphere.radius + target.radius) * (tw.sphere.radius + target.radius);

        // any pair of end spheres overlapping
        for p in [&upper, &lower] {
            for q in [&top, &bottom] {
                if vector_distance_squared(p, q) < r {
                    tw.mark_inside();
                }
            }
        }

        // an end sphere level with the target's cylinder: compare in 2d
        let level = |z: f32| z >= lower[2] && z <= upper[2];
        if level(top[2]) || level(bottom[2]) {
            let dx = top[0] - upper[0];
            let dy = top[1] - upper[1];
            if dx * dx + dy * dy < r {
                tw.mark_inside();
            }
        }
    }

    /// Position test of the trace box against the capsule model, done by
    /// swapping roles: the capsule becomes the swept shape and the trace box
    /// becomes the temporary box model.
    pub fn test_bounding_box_in_capsule(&mut self, tw: &mut TraceWork, model: ClipHandle) {
        let (mins, maxs) = self.model_bounds(model);
        let capsule = CapsuleShape::from_bounds(&mins, &maxs);

        tw.start = vector_subtract(&tw.start, &capsule.center);
        tw.end = vector_subtract(&tw.end, &capsule.center);
        tw.sphere = capsule.as_sphere();
        tw.calc_trace_bounds(false);

        let h = self.temp_box_model(&tw.size[0], &tw.size[1], false);
        let leaf = self.clip_handle_to_model(h).leaf;
        self.test_in_leaf(tw, &leaf);
    }

    /// Sweep of the trace capsule against the (unrotated) capsule model.
    pub fn trace_capsule_through_capsule(&self, tw: &mut TraceWork, model: ClipHandle) {
        let (mins, maxs) = self.model_bounds(model);

        for i in 0..3 {
            if tw.bounds[0][i] > maxs[i] + RADIUS_EPSILON || tw.bounds[1][i] < mins[i] - RADIUS_EPSILON {
                return;
            }
        }

        // end-sphere centers of the trace capsule at both ends of the sweep
        let starttop = vector_add(&tw.start, &tw.sphere.offset);
        let startbottom = vector_subtract(&tw.start, &tw.sphere.offset);
        let endtop = vector_add(&tw.end, &tw.sphere.offset);
        let endbottom = vector_subtract(&tw.end, &tw.sphere.offset);

        let target = CapsuleShape::from_bounds(&mins, &maxs);
        let top = target.top();
        let bottom = target.bottom();
        // grow the target by the trace radius so the trace shrinks to its axis
        let radius = target.radius + tw.sphere.radius;

        if tw.start[0] != tw.end[0] || tw.start[1] != tw.end[1] {
            // both cylinders minus both sphere radii
            let h = target.halfheight + tw.sphere.halfheight - radius;
            if h > 0.0 {
                let (start, end) = (tw.start, tw.end);
                tw.trace_through_vertical_cylinder(&target.center, radius, h, &start, &end);
            }
        }

        tw.trace_through_sphere(&top, radius, &startbottom, &endbottom);
        tw.trace_through_sphere(&bottom, radius, &starttop, &endtop);
    }

    /// Sweep of the trace box against the capsule model, with the same role
    /// swap as the position test.
    pub fn trace_bounding_box_through_capsule(&mut self, tw: &mut TraceWork, model: ClipHandle) {
        let (mins, maxs) = self.model_bounds(model);
        let capsule = CapsuleShape::from_bounds(&mins, &maxs);

        tw.start = vector_subtract(&tw.start, &capsule.center);
        tw.end = vector_subtract(&tw.end, &capsule.center);
        tw.sphere = capsule.as_sphere();

        // the sweep moved into the capsule frame
        tw.set_sweep_planes(Some(&box_corners(&capsule.size)));
        tw.calc_trace_bounds(true);

        let h = self.temp_box_model(&tw.size[0], &tw.size[1], false);
        let leaf = self.clip_handle_to_model(h).leaf;
        self.trace_through_leaf(tw, &leaf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{assert_near, assert_vec_near};

    fn work(start: Vec3, end: Vec3) -> TraceWork {
        let mut tw = TraceWork::default();
        tw.start = start;
        tw.end = end;
        tw.dir = vector_subtract(&end, &start);
        tw.trace.fraction = 1.0;
        tw
    }

    #[test]
    fn test_capsule_shape_from_bounds() {
        let c = CapsuleShape::from_bounds(&[-16.0, -16.0, -24.0], &[16.0, 16.0, 40.0]);
        assert_eq!(c.center, [0.0, 0.0, 8.0]);
        assert_eq!(c.radius, 16.0);
        assert_eq!(c.halfheight, 32.0);
        assert_eq!(c.top(), [0.0, 0.0, 24.0]);
        assert_eq!(c.bottom(), [0.0, 0.0, -8.0]);
        assert_eq!(c.as_sphere().offset, [0.0, 0.0, 16.0]);
    }

    #[test]
    fn test_sphere_head_on() {
        let mut tw = work([-100.0, 0.0, 0.0], [100.0, 0.0, 0.0]);
        let (s, e) = (tw.start, tw.end);
        tw.trace_through_sphere(&[0.0; 3], 10.0, &s, &e);

        // contact at radius + RADIUS_EPSILON
        assert_near(tw.trace.fraction, (100.0 - 11.0) / 200.0, 1e-4);
        assert_vec_near(&tw.trace.plane.normal, &[-1.0, 0.0, 0.0], 1e-4);
        assert_eq!(tw.trace.contents, CONTENTS_BODY);
        assert!(!tw.trace.startsolid);
    }

    #[test]
    fn test_sphere_miss() {
        let mut tw = work([-100.0, 50.0, 0.0], [100.0, 50.0, 0.0]);
        let (s, e) = (tw.start, tw.end);
        tw.trace_through_sphere(&[0.0; 3], 10.0, &s, &e);
        assert_eq!(tw.trace.fraction, 1.0);
    }

    #[test]
    fn test_sphere_start_inside() {
        let mut tw = work([2.0, 0.0, 0.0], [100.0, 0.0, 0.0]);
        let (s, e) = (tw.start, tw.end);
        tw.trace_through_sphere(&[0.0; 3], 10.0, &s, &e);
        assert!(tw.trace.startsolid);
        assert!(!tw.trace.allsolid);
        assert_eq!(tw.trace.fraction, 0.0);

        let mut tw = work([2.0, 0.0, 0.0], [-3.0, 0.0, 0.0]);
        let (s, e) = (tw.start, tw.end);
        tw.trace_through_sphere(&[0.0; 3], 10.0, &s, &e);
        assert!(tw.trace.allsolid);
    }

    #[test]
    fn test_sphere_plane_dist_uses_model_origin() {
        let mut tw = work([-100.0, 0.0, 0.0], [100.0, 0.0, 0.0]);
        tw.model_origin = [1000.0, 0.0, 0.0];
        let (s, e) = (tw.start, tw.end);
        tw.trace_through_sphere(&[0.0; 3], 10.0, &s, &e);
        // normal is -x, contact at x = -11 in model space, x = 989 in the world
        assert_near(tw.trace.plane.dist, -989.0, 1e-2);
    }

    #[test]
    fn test_cylinder_side_hit_and_band() {
        let mut tw = work([0.0, -100.0, 5.0], [0.0, 100.0, 5.0]);
        let (s, e) = (tw.start, tw.end);
        tw.trace_through_vertical_cylinder(&[0.0; 3], 10.0, 20.0, &s, &e);
        assert_near(tw.trace.fraction, (100.0 - 11.0) / 200.0, 1e-4);
        assert_vec_near(&tw.trace.plane.normal, &[0.0, -1.0, 0.0], 1e-4);

        // passing above the cylinder
        let mut tw = work([0.0, -100.0, 50.0], [0.0, 100.0, 50.0]);
        let (s, e) = (tw.start, tw.end);
        tw.trace_through_vertical_cylinder(&[0.0; 3], 10.0, 20.0, &s, &e);
        assert_eq!(tw.trace.fraction, 1.0);
    }

    #[test]
    fn test_cylinder_start_inside_only_within_band() {
        let mut tw = work([0.0, 0.0, 0.0], [50.0, 0.0, 0.0]);
        let (s, e) = (tw.start, tw.end);
        tw.trace_through_vertical_cylinder(&[0.0; 3], 10.0, 20.0, &s, &e);
        assert!(tw.trace.startsolid);

        let mut tw = work([0.0, 0.0, 30.0], [50.0, 0.0, 30.0]);
        let (s, e) = (tw.start, tw.end);
        tw.trace_through_vertical_cylinder(&[0.0; 3], 10.0, 20.0, &s, &e);
        assert!(!tw.trace.startsolid);
    }

    #[test]
    fn test_capsule_in_capsule_overlap() {
        let mut cm = ClipMap::empty();
        let model = cm.temp_box_model(&[-16.0, -16.0, -32.0], &[16.0, 16.0, 32.0], true);

        let mut tw = work([20.0, 0.0, 0.0], [20.0, 0.0, 0.0]);
        tw.sphere = CapsuleShape::from_bounds(&[-8.0, -8.0, -16.0], &[8.0, 8.0, 16.0]).as_sphere();
        cm.test_capsule_in_capsule(&mut tw, model);
        assert!(tw.trace.allsolid);

        let mut tw = work([40.0, 0.0, 0.0], [40.0, 0.0, 0.0]);
        tw.sphere = CapsuleShape::from_bounds(&[-8.0, -8.0, -16.0], &[8.0, 8.0, 16.0]).as_sphere();
        cm.test_capsule_in_capsule(&mut tw, model);
        assert!(!tw.trace.startsolid);
    }

    #[test]
    fn test_capsule_in_capsule_cylinder_band() {
        let mut cm = ClipMap::empty();
        // tall target: end spheres at z = +-48
        let model = cm.temp_box_model(&[-16.0, -16.0, -64.0], &[16.0, 16.0, 64.0], true);

        // small capsule beside the middle of the target, far from both end spheres
        let mut tw = work([20.0, 0.0, 0.0], [20.0, 0.0, 0.0]);
        tw.sphere = CapsuleShape::from_bounds(&[-8.0; 3], &[8.0; 3]).as_sphere();
        cm.test_capsule_in_capsule(&mut tw, model);
        assert!(tw.trace.allsolid, "cylinder section must count as overlap");
    }
}
