// cm_patch.rs — curved surface collision seam
//
// Patch tessellation happens elsewhere; this module defines what the trace
// code needs from a finished patch collision mesh, and a facet-based mesh
// that satisfies it.

use qclip_common::q_shared::{
    cross_product, dot_product, sign_bits_for_normal, vector_add, vector_normalize,
    vector_subtract, Vec3,
};

use crate::cm_local::{TraceWork, SURFACE_CLIP_EPSILON};

/// Read-only collision mesh for one curved surface.
pub trait PatchCollide: std::fmt::Debug + Send + Sync {
    /// Axis-aligned bounds of the mesh, used for broad-phase rejection.
    fn bounds(&self) -> [Vec3; 2];

    /// True if the trace volume at `tw.start` is inside the surface.
    fn position_test(&self, tw: &TraceWork) -> bool;

    /// Clip the sweep in `tw`. Implementations may only lower
    /// `tw.trace.fraction` and update `tw.trace.plane` alongside it.
    fn trace_through(&self, tw: &mut TraceWork);
}

// ============================================================
// Facet mesh
// ============================================================

/// Plane as normal plus distance, with cached signbits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchPlane {
    pub plane: [f32; 4],
    pub signbits: u8,
}

impl PatchPlane {
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self {
            plane: [normal[0], normal[1], normal[2], dist],
            signbits: sign_bits_for_normal(&normal),
        }
    }

    fn normal(&self) -> Vec3 {
        [self.plane[0], self.plane[1], self.plane[2]]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FacetBorder {
    pub plane: usize,
    /// use the plane flipped
    pub inward: bool,
}

/// One flat piece of a patch: the surface plane bounded by border planes.
/// The last border is conventionally the flipped surface plane (back side).
#[derive(Debug, Clone, Default)]
pub struct Facet {
    pub surface_plane: usize,
    pub borders: Vec<FacetBorder>,
}

#[derive(Debug, Clone, Default)]
pub struct FacetPatchCollide {
    pub bounds: [Vec3; 2],
    pub planes: Vec<PatchPlane>,
    pub facets: Vec<Facet>,
}

/// Shift the plane for the volume being traced and pick the start/end the
/// plane should be tested against. `border` planes use the absolute corner
/// offset, which holds for a flipped plane because the box is centered.
fn adjust_plane_for_volume(
    tw: &TraceWork,
    src: &PatchPlane,
    inward: bool,
    border: bool,
) -> ([f32; 4], Vec3, Vec3) {
    let mut plane = if inward {
        [-src.plane[0], -src.plane[1], -src.plane[2], -src.plane[3]]
    } else {
        src.plane
    };
    let normal = [plane[0], plane[1], plane[2]];

    if tw.sphere.use_sphere {
        // adjust the plane distance appropriately for radius
        plane[3] += tw.sphere.radius;

        // find the closest point on the capsule to the plane
        let t = dot_product(&normal, &tw.sphere.offset);
        if t > 0.0 {
            (
                plane,
                vector_subtract(&tw.start, &tw.sphere.offset),
                vector_subtract(&tw.end, &tw.sphere.offset),
            )
        } else {
            (
                plane,
                vector_add(&tw.start, &tw.sphere.offset),
                vector_add(&tw.end, &tw.sphere.offset),
            )
        }
    } else {
        let offset = dot_product(&tw.offsets[src.signbits as usize], &normal);
        if border {
            plane[3] += offset.abs();
        } else {
            plane[3] -= offset;
        }
        (plane, tw.start, tw.end)
    }
}

/// Returns false when the whole facet can be skipped; `hit` is set when this
/// plane became the new entering plane.
fn check_facet_plane(
    plane: &[f32; 4],
    start: &Vec3,
    end: &Vec3,
    enter_frac: &mut f32,
    leave_frac: &mut f32,
    hit: &mut bool,
) -> bool {
    *hit = false;
    let n = [plane[0], plane[1], plane[2]];
    let d1 = dot_product(start, &n) - plane[3];
    let d2 = dot_product(end, &n) - plane[3];

    // completely in front of the face, no intersection with the facet
    if d1 > 0.0 && (d2 >= SURFACE_CLIP_EPSILON || d2 >= d1) {
        return false;
    }

    // doesn't cross the plane, the plane isn't relevant
    if d1 <= 0.0 && d2 <= 0.0 {
        return true;
    }

    if d1 > d2 {
        // enter
        let f = ((d1 - SURFACE_CLIP_EPSILON) / (d1 - d2)).max(0.0);
        // favor earlier plane hits, and thus the surface plane
        if f > *enter_frac {
            *enter_frac = f;
            *hit = true;
        }
    } else {
        // leave
        let f = ((d1 + SURFACE_CLIP_EPSILON) / (d1 - d2)).min(1.0);
        if f < *leave_frac {
            *leave_frac = f;
        }
    }
    true
}

impl FacetPatchCollide {
    pub fn new(planes: Vec<PatchPlane>, facets: Vec<Facet>, bounds: [Vec3; 2]) -> Self {
        Self { bounds, planes, facets }
    }

    /// Single-facet mesh for a flat convex polygon wound counter-clockwise
    /// when seen from the front. Returns None for degenerate input.
    pub fn from_convex_polygon(points: &[Vec3]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }

        let mut normal = cross_product(
            &vector_subtract(&points[1], &points[0]),
            &vector_subtract(&points[2], &points[0]),
        );
        if vector_normalize(&mut normal) == 0.0 {
            return None;
        }

        let mut planes = vec![PatchPlane::new(normal, dot_product(&normal, &points[0]))];
        let mut borders = Vec::with_capacity(points.len() + 1);
        let mut bounds = [points[0], points[0]];

        for (i, p) in points.iter().enumerate() {
            let next = &points[(i + 1) % points.len()];
            let mut out = cross_product(&vector_subtract(next, p), &normal);
            if vector_normalize(&mut out) == 0.0 {
                return None;
            }
            borders.push(FacetBorder { plane: planes.len(), inward: false });
            planes.push(PatchPlane::new(out, dot_product(&out, p)));

            for j in 0..3 {
                bounds[0][j] = bounds[0][j].min(p[j]);
                bounds[1][j] = bounds[1][j].max(p[j]);
            }
        }

        // back side
        borders.push(FacetBorder { plane: 0, inward: true });

        let facets = vec![Facet { surface_plane: 0, borders }];
        Some(Self::new(planes, facets, bounds))
    }

    /// Facets have no thickness, so a point cannot be clipped by entering
    /// and leaving half-spaces. Instead intersect the segment with every
    /// plane once and accept a surface hit that lies inside all borders.
    fn trace_point_through(&self, tw: &mut TraceWork) {
        let mut front_facing = Vec::with_capacity(self.planes.len());
        let mut intersection = Vec::with_capacity(self.planes.len());

        for p in &self.planes {
            let n = p.normal();
            let offset = dot_product(&tw.offsets[p.signbits as usize], &n);
            let d1 = dot_product(&tw.start, &n) - p.plane[3] + offset;
            let d2 = dot_product(&tw.end, &n) - p.plane[3] + offset;
            front_facing.push(d1 > 0.0);
            let t = if d1 == d2 { 99999.0 } else { d1 / (d1 - d2) };
            intersection.push(if t <= 0.0 { 99999.0 } else { t });
        }

        for facet in &self.facets {
            if !front_facing[facet.surface_plane] {
                continue;
            }
            let intersect = intersection[facet.surface_plane];
            if intersect > tw.trace.fraction {
                continue; // already hit something closer
            }

            let inside = facet.borders.iter().all(|b| {
                if front_facing[b.plane] ^ b.inward {
                    intersection[b.plane] <= intersect
                } else {
                    intersection[b.plane] >= intersect
                }
            });
            if !inside {
                continue;
            }

            // intersection with a slight pushoff
            let p = &self.planes[facet.surface_plane];
            let n = p.normal();
            let offset = dot_product(&tw.offsets[p.signbits as usize], &n);
            let d1 = dot_product(&tw.start, &n) - p.plane[3] + offset;
            let d2 = dot_product(&tw.end, &n) - p.plane[3] + offset;
            tw.trace.fraction = ((d1 - SURFACE_CLIP_EPSILON) / (d1 - d2)).max(0.0);
            tw.trace.plane.normal = n;
            tw.trace.plane.dist = p.plane[3];
        }
    }
}

impl PatchCollide for FacetPatchCollide {
    fn bounds(&self) -> [Vec3; 2] {
        self.bounds
    }

    fn position_test(&self, tw: &TraceWork) -> bool {
        if tw.is_point {
            return false;
        }

        'facets: for facet in &self.facets {
            let (plane, startp, _) =
                adjust_plane_for_volume(tw, &self.planes[facet.surface_plane], false, false);
            let n = [plane[0], plane[1], plane[2]];
            if dot_product(&n, &startp) - plane[3] > 0.0 {
                continue;
            }

            for border in &facet.borders {
                let (plane, startp, _) =
                    adjust_plane_for_volume(tw, &self.planes[border.plane], border.inward, true);
                let n = [plane[0], plane[1], plane[2]];
                if dot_product(&n, &startp) - plane[3] > 0.0 {
                    continue 'facets;
                }
            }

            // inside this patch facet
            return true;
        }
        false
    }

    fn trace_through(&self, tw: &mut TraceWork) {
        if tw.is_point {
            self.trace_point_through(tw);
            return;
        }

        'facets: for facet in &self.facets {
            let mut enter_frac = -1.0f32;
            let mut leave_frac = 1.0f32;
            let mut hit = false;
            let mut hitnum: Option<usize> = None;

            let (plane, startp, endp) =
                adjust_plane_for_volume(tw, &self.planes[facet.surface_plane], false, false);
            if !check_facet_plane(&plane, &startp, &endp, &mut enter_frac, &mut leave_frac, &mut hit) {
                continue;
            }
            let mut best = plane;

            for (j, border) in facet.borders.iter().enumerate() {
                let (plane, startp, endp) =
                    adjust_plane_for_volume(tw, &self.planes[border.plane], border.inward, true);
                if !check_facet_plane(&plane, &startp, &endp, &mut enter_frac, &mut leave_frac, &mut hit) {
                    continue 'facets;
                }
                if hit {
                    hitnum = Some(j);
                    best = plane;
                }
            }

            // never clip against the back side
            if !facet.borders.is_empty() && hitnum == Some(facet.borders.len() - 1) {
                continue;
            }

            if enter_frac < leave_frac && enter_frac >= 0.0 && enter_frac < tw.trace.fraction {
                tw.trace.fraction = enter_frac;
                tw.trace.plane.normal = [best[0], best[1], best[2]];
                tw.trace.plane.dist = best[3];
            }
        }
    }
}
