// cm_trace.rs — box, point and capsule traces through the collision world

use qclip_common::common::com_dprintf;
use qclip_common::q_shared::{
    create_rotation_matrix, dot_product, matrix_transpose, vector_add, vector_compare,
    vector_compare_gt, vector_compare_lt, vector_ma, vector_rotate, vector_subtract, CPlane,
    Trace, Vec3, VEC3_ORIGIN,
};

use crate::cm_bounds::box_corners;
use crate::cm_local::*;

impl ClipMap {
    /// Replace the runtime switches, e.g. after the collision cvars changed.
    pub fn set_config(&mut self, config: CmConfig) {
        self.config = config;
    }

    /// Advance the visit counter. When it would wrap, every stamp is cleared
    /// first so an old stamp can never equal a new epoch.
    pub fn next_checkcount(&mut self) -> i32 {
        if self.checkcount == i32::MAX {
            self.brushes.iter_mut().for_each(|b| b.checkcount = 0);
            self.surfaces.iter_mut().flatten().for_each(|p| p.checkcount = 0);
            self.checkcount = 0;
        }
        self.checkcount += 1;
        self.checkcount
    }

    // ============================================================
    // Position testing
    // ============================================================

    pub fn test_box_in_brush(&self, tw: &mut TraceWork, brush: &CBrush) {
        if brush.num_sides == 0 {
            return;
        }

        // special test for axial
        if vector_compare_gt(&tw.bounds[0], &brush.bounds[1]) != 0
            || vector_compare_lt(&tw.bounds[1], &brush.bounds[0]) != 0
        {
            return;
        }

        // the first six planes are the axial planes, so we only
        // need to test the remainder
        let sides = &self.brush_sides[brush.first_side + AXIAL_SIDES.min(brush.num_sides)
            ..brush.first_side + brush.num_sides];
        for side in sides {
            let plane = &self.planes[side.plane_idx];

            let d1 = if tw.sphere.use_sphere {
                let dist = plane.dist + tw.sphere.radius;
                // the end of the capsule nearest the plane
                let startp = if dot_product(&plane.normal, &tw.sphere.offset) > 0.0 {
                    vector_subtract(&tw.start, &tw.sphere.offset)
                } else {
                    vector_add(&tw.start, &tw.sphere.offset)
                };
                dot_product(&startp, &plane.normal) - dist
            } else {
                let dist = plane.dist - dot_product(&tw.offsets[plane.signbits as usize], &plane.normal);
                dot_product(&tw.start, &plane.normal) - dist
            };

            // completely in front of face, no intersection
            if d1 > 0.0 {
                return;
            }
        }

        // inside this brush
        tw.trace.startsolid = true;
        tw.trace.allsolid = true;
        tw.trace.fraction = 0.0;
        tw.trace.contents = brush.contents;
    }

    /// Stamp a brush for the current pass. Returns it when it has not been
    /// seen yet and its contents match the trace mask.
    fn claim_brush(&mut self, brushnum: usize, tw: &TraceWork) -> Option<CBrush> {
        let b = &mut self.brushes[brushnum];
        if b.checkcount == tw.checkcount {
            return None; // already checked this brush in another leaf
        }
        b.checkcount = tw.checkcount;

        if b.contents & tw.contents == 0 {
            return None;
        }
        Some(*b)
    }

    /// Same as `claim_brush` for curved surfaces; planar surfaces have no
    /// collision data and are skipped.
    fn claim_patch(&mut self, surface: usize, tw: &TraceWork) -> Option<CPatch> {
        let patch = self.surfaces[surface].as_mut()?;
        if patch.checkcount == tw.checkcount {
            return None;
        }
        patch.checkcount = tw.checkcount;

        if patch.contents & tw.contents == 0 {
            return None;
        }
        Some(patch.clone())
    }

    pub fn test_in_leaf(&mut self, tw: &mut TraceWork, leaf: &CLeaf) {
        // test box position against all brushes in the leaf
        for k in 0..leaf.num_leaf_brushes {
            let brushnum = self.leaf_brushes[leaf.first_leaf_brush + k];
            let brush = match self.claim_brush(brushnum, tw) {
                Some(b) => b,
                None => continue,
            };

            self.test_box_in_brush(tw, &brush);
            if tw.trace.allsolid {
                return;
            }
        }

        if self.config.no_curves {
            return;
        }

        for k in 0..leaf.num_leaf_surfaces {
            let surface = self.leaf_surfaces[leaf.first_leaf_surface + k];
            let patch = match self.claim_patch(surface, tw) {
                Some(p) => p,
                None => continue,
            };

            if patch.pc.position_test(tw) {
                tw.trace.startsolid = true;
                tw.trace.allsolid = true;
                tw.trace.fraction = 0.0;
                return;
            }
        }
    }

    /// Position test against the whole world: gather the leafs the box
    /// touches, then test each one until something encloses the box.
    pub fn position_test(&mut self, tw: &mut TraceWork) {
        // identify the leafs we are touching
        let mut mins = vector_add(&tw.start, &tw.size[0]);
        let mut maxs = vector_add(&tw.start, &tw.size[1]);
        for i in 0..3 {
            mins[i] -= 1.0;
            maxs[i] += 1.0;
        }
        let mut ll = LeafList::new(mins, maxs, MAX_POSITION_LEAFS);

        tw.checkcount = self.next_checkcount();

        self.box_leafnums_r(&mut ll, 0);

        tw.checkcount = self.next_checkcount();

        if ll.overflowed {
            com_dprintf(&format!(
                "CM_PositionTest: leaf list overflowed at {} leafs\n",
                ll.max_count
            ));
        }

        // test the contents of the leafs
        for &leafnum in &ll.list {
            let leaf = self.leafs[leafnum];
            self.test_in_leaf(tw, &leaf);
            if tw.trace.allsolid {
                break;
            }
        }
    }

    // ============================================================
    // Tracing
    // ============================================================

    fn trace_through_patch(&mut self, tw: &mut TraceWork, patch: &CPatch) {
        let old_frac = tw.trace.fraction;

        self.c_patch_traces += 1;
        patch.pc.trace_through(tw);

        if tw.trace.fraction < old_frac {
            tw.trace.surface_flags = patch.surface_flags;
            tw.trace.contents = patch.contents;
        }
    }

    pub fn trace_through_brush(&mut self, tw: &mut TraceWork, brush: &CBrush) {
        if brush.num_sides == 0 {
            return;
        }
        self.c_brush_traces += 1;

        let mut enter_frac = -1.0f32;
        let mut leave_frac = 1.0f32;
        let mut lead: Option<(CPlane, i32)> = None;
        let mut getout = false;
        let mut startout = false;

        // compare the trace against all planes of the brush, finding the
        // latest time the trace crosses a plane towards the interior and the
        // earliest time it crosses a plane towards the exterior
        for side in &self.brush_sides[brush.first_side..brush.first_side + brush.num_sides] {
            let plane = &self.planes[side.plane_idx];

            let (dist, startp, endp) = if tw.sphere.use_sphere {
                // push the plane out by the radius and test the nearest end sphere
                let dist = plane.dist + tw.sphere.radius;
                if dot_product(&plane.normal, &tw.sphere.offset) > 0.0 {
                    (
                        dist,
                        vector_subtract(&tw.start, &tw.sphere.offset),
                        vector_subtract(&tw.end, &tw.sphere.offset),
                    )
                } else {
                    (
                        dist,
                        vector_add(&tw.start, &tw.sphere.offset),
                        vector_add(&tw.end, &tw.sphere.offset),
                    )
                }
            } else {
                // adjust the plane distance apropriately for mins/maxs
                let dist = plane.dist - dot_product(&tw.offsets[plane.signbits as usize], &plane.normal);
                (dist, tw.start, tw.end)
            };

            let d1 = dot_product(&startp, &plane.normal) - dist;
            let d2 = dot_product(&endp, &plane.normal) - dist;

            if d2 > 0.0 {
                getout = true; // endpoint is not in solid
            }
            if d1 > 0.0 {
                startout = true;
            }

            // if completely in front of face, no intersection with the entire brush
            if d1 > 0.0 && (d2 >= SURFACE_CLIP_EPSILON || d2 >= d1) {
                return;
            }

            // if it doesn't cross the plane, the plane isn't relevent
            if d1 <= 0.0 && d2 <= 0.0 {
                continue;
            }

            if d1 > d2 {
                // enter
                let f = ((d1 - SURFACE_CLIP_EPSILON) / (d1 - d2)).max(0.0);
                if f > enter_frac {
                    enter_frac = f;
                    lead = Some((*plane, side.surface_flags));
                }
            } else {
                // leave
                let f = ((d1 + SURFACE_CLIP_EPSILON) / (d1 - d2)).min(1.0);
                if f < leave_frac {
                    leave_frac = f;
                }
            }
        }

        // all planes have been checked, and the trace was not
        // completely outside the brush
        if !startout {
            // original point was inside brush
            tw.trace.startsolid = true;
            if !getout {
                tw.trace.allsolid = true;
                tw.trace.fraction = 0.0;
                tw.trace.contents = brush.contents;
            }
            return;
        }

        if let Some((plane, surface_flags)) = lead {
            if enter_frac < leave_frac && enter_frac < tw.trace.fraction {
                tw.trace.fraction = enter_frac.max(0.0);
                tw.trace.plane = plane;
                tw.trace.surface_flags = surface_flags;
                tw.trace.contents = brush.contents;
            }
        }
    }

    pub fn trace_through_leaf(&mut self, tw: &mut TraceWork, leaf: &CLeaf) {
        // trace line against all brushes in the leaf
        for k in 0..leaf.num_leaf_brushes {
            let brushnum = self.leaf_brushes[leaf.first_leaf_brush + k];
            let brush = match self.claim_brush(brushnum, tw) {
                Some(b) => b,
                None => continue,
            };

            if self.config.optimize && !tw.trace_through_bounds(&brush.bounds[0], &brush.bounds[1]) {
                continue;
            }

            let fraction = tw.trace.fraction;
            self.trace_through_brush(tw, &brush);
            if tw.trace.fraction == 0.0 {
                return;
            }
            if tw.trace.fraction < fraction {
                tw.calc_trace_bounds(true);
            }
        }

        if self.config.no_curves {
            return;
        }

        // trace line against all patches in the leaf
        for k in 0..leaf.num_leaf_surfaces {
            let surface = self.leaf_surfaces[leaf.first_leaf_surface + k];
            let patch = match self.claim_patch(surface, tw) {
                Some(p) => p,
                None => continue,
            };

            if self.config.optimize {
                let bounds = patch.pc.bounds();
                if !tw.trace_through_bounds(&bounds[0], &bounds[1]) {
                    continue;
                }
            }

            let fraction = tw.trace.fraction;
            self.trace_through_patch(tw, &patch);
            if tw.trace.fraction == 0.0 {
                return;
            }
            if tw.trace.fraction < fraction {
                tw.calc_trace_bounds(true);
            }
        }
    }

    /// Traverse all the contacted leafs from the start to the end position.
    /// If the trace is a point, they will be exactly in order, but for larger
    /// trace volumes it is possible to hit something in a later leaf with
    /// a smaller intercept fraction.
    pub fn trace_through_tree(&mut self, tw: &mut TraceWork, num: i32, p1f: f32, p2f: f32, p1: &Vec3, p2: &Vec3) {
        if tw.trace.fraction <= p1f {
            return; // already hit something nearer
        }

        // if < 0, we are in a leaf node
        if num < 0 {
            let leaf = self.leafs[(-1 - num) as usize];
            self.trace_through_leaf(tw, &leaf);
            return;
        }

        // find the point distances to the separating plane
        // and the offset for the size of the box
        let node = self.nodes[num as usize];
        let plane = self.planes[node.plane_idx];

        let (t1, t2, offset) = if plane.plane_type < 3 {
            let axis = plane.plane_type as usize;
            (p1[axis] - plane.dist, p2[axis] - plane.dist, tw.extents[axis])
        } else {
            let offset = if tw.is_point { 0.0 } else { tw.max_offset };
            (
                dot_product(&plane.normal, p1) - plane.dist,
                dot_product(&plane.normal, p2) - plane.dist,
                offset,
            )
        };

        // see which sides we need to consider
        if t1 >= offset + 1.0 && t2 >= offset + 1.0 {
            self.trace_through_tree(tw, node.children[0], p1f, p2f, p1, p2);
            return;
        }
        if t1 < -offset - 1.0 && t2 < -offset - 1.0 {
            self.trace_through_tree(tw, node.children[1], p1f, p2f, p1, p2);
            return;
        }

        // put the crosspoint SURFACE_CLIP_EPSILON pixels on the near side
        let (side, frac, frac2) = if t1 < t2 {
            let idist = 1.0 / (t1 - t2);
            (
                1,
                (t1 - offset + SURFACE_CLIP_EPSILON) * idist,
                (t1 + offset + SURFACE_CLIP_EPSILON) * idist,
            )
        } else if t1 > t2 {
            let idist = 1.0 / (t1 - t2);
            (
                0,
                (t1 + offset + SURFACE_CLIP_EPSILON) * idist,
                (t1 - offset - SURFACE_CLIP_EPSILON) * idist,
            )
        } else {
            (0, 1.0, 0.0)
        };

        let frac = frac.clamp(0.0, 1.0);
        let frac2 = frac2.clamp(0.0, 1.0);
        let delta = vector_subtract(p2, p1);

        // move up to the node
        let midf = p1f + (p2f - p1f) * frac;
        let mid = vector_ma(p1, frac, &delta);
        self.trace_through_tree(tw, node.children[side], p1f, midf, p1, &mid);

        // go past the node
        let midf = p1f + (p2f - p1f) * frac2;
        let mid = vector_ma(p1, frac2, &delta);
        self.trace_through_tree(tw, node.children[side ^ 1], midf, p2f, &mid, p2);
    }

    // ============================================================
    // Entry points
    // ============================================================

    fn position_test_model(&mut self, tw: &mut TraceWork, model: ClipHandle, leaf: &CLeaf) {
        let temp = model == BOX_MODEL_HANDLE || model == CAPSULE_MODEL_HANDLE;
        match self.config.policy {
            CollisionPolicy::BoxVsBox if temp => {
                tw.sphere.use_sphere = false;
                tw.calc_trace_bounds(false);
                self.test_in_leaf(tw, leaf);
            }
            CollisionPolicy::CapsuleVsCapsule if temp => self.test_capsule_in_capsule(tw, model),
            CollisionPolicy::Mixed if model == CAPSULE_MODEL_HANDLE => {
                if tw.sphere.use_sphere {
                    self.test_capsule_in_capsule(tw, model);
                } else {
                    self.test_bounding_box_in_capsule(tw, model);
                }
            }
            _ => self.test_in_leaf(tw, leaf),
        }
    }

    fn sweep_model(&mut self, tw: &mut TraceWork, model: ClipHandle, leaf: &CLeaf) {
        let temp = model == BOX_MODEL_HANDLE || model == CAPSULE_MODEL_HANDLE;
        match self.config.policy {
            CollisionPolicy::BoxVsBox if temp => {
                tw.sphere.use_sphere = false;
                tw.calc_trace_bounds(true);
                self.trace_through_leaf(tw, leaf);
            }
            CollisionPolicy::CapsuleVsCapsule if temp => self.trace_capsule_through_capsule(tw, model),
            CollisionPolicy::Mixed if model == CAPSULE_MODEL_HANDLE => {
                if tw.sphere.use_sphere {
                    self.trace_capsule_through_capsule(tw, model);
                } else {
                    self.trace_bounding_box_through_capsule(tw, model);
                }
            }
            _ => self.trace_through_leaf(tw, leaf),
        }
    }

    /// Sweep a point, box or capsule from `start` to `end` through the world
    /// (`model == 0`) or through a single model whose space `start` and `end`
    /// are already expressed in. `origin` is only used to place capsule
    /// contact planes in world space.
    #[allow(clippy::too_many_arguments)]
    pub fn trace(
        &mut self,
        start: &Vec3,
        end: &Vec3,
        mins: Option<&Vec3>,
        maxs: Option<&Vec3>,
        model: ClipHandle,
        origin: &Vec3,
        brushmask: i32,
        capsule: bool,
        sphere: Option<&Sphere>,
    ) -> Trace {
        let leaf = self.clip_handle_to_model(model).leaf;

        let checkcount = self.next_checkcount(); // for multi-check avoidance
        self.c_traces += 1; // for statistics, may be zeroed

        // fill in a default trace
        let mut tw = TraceWork {
            checkcount,
            model_origin: *origin,
            ..Default::default()
        };
        tw.trace.fraction = 1.0; // assume it goes the entire distance until shown otherwise

        if self.nodes.is_empty() {
            // map not loaded, shouldn't happen
            tw.trace.endpos = *end;
            return tw.trace;
        }

        // set basic parms
        tw.contents = brushmask;

        // adjust so that mins and maxs are always symetric, which
        // avoids some complications with plane expanding of rotated bmodels
        let mins = mins.unwrap_or(&VEC3_ORIGIN);
        let maxs = maxs.unwrap_or(&VEC3_ORIGIN);
        for i in 0..3 {
            let offset = (mins[i] + maxs[i]) * 0.5;
            tw.size[0][i] = mins[i] - offset;
            tw.size[1][i] = maxs[i] - offset;
            tw.start[i] = start[i] + offset;
            tw.end[i] = end[i] + offset;
        }

        // if a sphere is already specified
        match sphere {
            Some(s) => tw.sphere = *s,
            None => {
                let radius = tw.size[1][0].min(tw.size[1][2]);
                let halfheight = tw.size[1][2];
                tw.sphere = Sphere {
                    use_sphere: capsule,
                    radius,
                    halfheight,
                    offset: [0.0, 0.0, halfheight - radius],
                };
            }
        }

        let position_test = vector_compare(start, end);

        tw.max_offset = tw.size[1][0] + tw.size[1][1] + tw.size[1][2];

        // tw.offsets[signbits] = vector to appropriate corner from origin
        tw.offsets = box_corners(&tw.size);

        // check for point special case
        tw.is_point = tw.size[0] == [0.0; 3];
        tw.extents = if tw.is_point { [0.0; 3] } else { tw.size[1] };

        tw.dir = vector_subtract(&tw.end, &tw.start);

        // calculate bounds
        if position_test {
            tw.calc_trace_bounds(false);
        } else {
            let corners = tw.offsets;
            tw.set_sweep_planes(if tw.is_point { None } else { Some(&corners) });
            tw.calc_trace_bounds(true);
        }

        if position_test {
            if model != 0 {
                self.position_test_model(&mut tw, model, &leaf);
            } else {
                self.position_test(&mut tw);
            }
        } else if model != 0 {
            self.sweep_model(&mut tw, model, &leaf);
        } else {
            // general sweeping through world
            let (p1, p2) = (tw.start, tw.end);
            self.trace_through_tree(&mut tw, 0, 0.0, 1.0, &p1, &p2);
        }

        // generate endpos from the original, unmodified start/end
        tw.trace.endpos = if tw.trace.fraction == 1.0 {
            *end
        } else {
            vector_ma(start, tw.trace.fraction, &vector_subtract(end, start))
        };
        tw.trace
    }

    pub fn box_trace(
        &mut self,
        start: &Vec3,
        end: &Vec3,
        mins: Option<&Vec3>,
        maxs: Option<&Vec3>,
        model: ClipHandle,
        brushmask: i32,
        capsule: bool,
    ) -> Trace {
        self.trace(start, end, mins, maxs, model, &VEC3_ORIGIN, brushmask, capsule, None)
    }

    /// Handles offseting and rotation of the end points for moving and
    /// rotating entities.
    #[allow(clippy::too_many_arguments)]
    pub fn transformed_box_trace(
        &mut self,
        start: &Vec3,
        end: &Vec3,
        mins: Option<&Vec3>,
        maxs: Option<&Vec3>,
        model: ClipHandle,
        brushmask: i32,
        origin: &Vec3,
        angles: &Vec3,
        capsule: bool,
    ) -> Trace {
        let mins = mins.unwrap_or(&VEC3_ORIGIN);
        let maxs = maxs.unwrap_or(&VEC3_ORIGIN);

        // adjust so that mins and maxs are always symetric, which
        // avoids some complications with plane expanding of rotated bmodels
        let mut size = [[0.0; 3]; 2];
        let mut start_l = [0.0; 3];
        let mut end_l = [0.0; 3];
        for i in 0..3 {
            let offset = (mins[i] + maxs[i]) * 0.5;
            size[0][i] = mins[i] - offset;
            size[1][i] = maxs[i] - offset;
            // subtract origin offset
            start_l[i] = start[i] + offset - origin[i];
            end_l[i] = end[i] + offset - origin[i];
        }

        // rotate start and end into the models frame of reference
        let rotated = model != BOX_MODEL_HANDLE && !vector_compare(angles, &VEC3_ORIGIN);

        let halfwidth = size[1][0];
        let halfheight = size[1][2];
        let radius = halfwidth.min(halfheight);
        let t = halfheight - radius;
        let mut sphere = Sphere {
            use_sphere: capsule,
            radius,
            halfheight,
            offset: [0.0, 0.0, t],
        };

        let matrix = if rotated {
            // rotate the trace line instead of the model; exact for capsules,
            // an approximation for boxes since the swept box stays axial
            let matrix = create_rotation_matrix(angles);
            start_l = vector_rotate(&start_l, &matrix);
            end_l = vector_rotate(&end_l, &matrix);
            sphere.offset = [matrix[0][2] * t, -matrix[1][2] * t, matrix[2][2] * t];
            Some(matrix)
        } else {
            None
        };

        // sweep the box through the model
        let mut trace = self.trace(
            &start_l,
            &end_l,
            Some(&size[0]),
            Some(&size[1]),
            model,
            origin,
            brushmask,
            capsule,
            Some(&sphere),
        );

        // if the model was rotated and there was a collision
        if let Some(matrix) = matrix {
            if trace.fraction != 1.0 {
                let transpose = matrix_transpose(&matrix);
                trace.plane.normal = vector_rotate(&trace.plane.normal, &transpose);
            }
        }

        // the endpos from the inner trace is rotated and offset
        trace.endpos = vector_ma(start, trace.fraction, &vector_subtract(end, start));
        trace
    }
}
