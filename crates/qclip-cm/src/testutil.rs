// testutil.rs — small hand-built worlds for the collision tests

use std::sync::Arc;

use qclip_common::q_shared::{CPlane, Vec3};

use crate::cm_load::WorldParts;
use crate::cm_local::*;
use crate::cm_patch::PatchCollide;

struct PendingBrush {
    mins: Vec3,
    maxs: Vec3,
    brush: usize,
    in_world: bool,
}

struct PendingPatch {
    bounds: [Vec3; 2],
    surface: usize,
}

/// Builds either a one-leaf world (a single node whose children both point
/// at leaf 0) or a world split at x = 0 into a front leaf 0 and back leaf 1.
pub struct WorldBuilder {
    parts: WorldParts,
    split: bool,
    pending: Vec<PendingBrush>,
    patches: Vec<PendingPatch>,
    submodels: Vec<Vec<usize>>,
    config: CmConfig,
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self {
            parts: WorldParts::default(),
            split: false,
            pending: Vec::new(),
            patches: Vec::new(),
            submodels: Vec::new(),
            config: CmConfig::default(),
        }
    }

    pub fn split_x() -> Self {
        let mut w = Self::new();
        w.split = true;
        w
    }

    pub fn config(&mut self, config: CmConfig) -> &mut Self {
        self.config = config;
        self
    }

    fn push_brush(&mut self, mins: Vec3, maxs: Vec3, contents: i32, extra: &[(Vec3, f32)]) -> usize {
        let first_side = self.parts.brush_sides.len();
        let mut side = |normal: Vec3, dist: f32| {
            self.parts.brush_sides.push(CBrushSide {
                plane_idx: self.parts.planes.len(),
                surface_flags: 0,
            });
            self.parts.planes.push(CPlane::new(normal, dist));
        };
        side([-1.0, 0.0, 0.0], -mins[0]);
        side([1.0, 0.0, 0.0], maxs[0]);
        side([0.0, -1.0, 0.0], -mins[1]);
        side([0.0, 1.0, 0.0], maxs[1]);
        side([0.0, 0.0, -1.0], -mins[2]);
        side([0.0, 0.0, 1.0], maxs[2]);
        for &(n, d) in extra {
            side(n, d);
        }

        self.parts.brushes.push(CBrush {
            contents,
            first_side,
            num_sides: 6 + extra.len(),
            ..Default::default()
        });
        self.parts.brushes.len() - 1
    }

    /// Axial box brush linked into the world leafs it touches, with
    /// optional extra bevel planes.
    pub fn brush(&mut self, mins: Vec3, maxs: Vec3, contents: i32, extra: &[(Vec3, f32)]) -> usize {
        let brush = self.push_brush(mins, maxs, contents, extra);
        self.pending.push(PendingBrush { mins, maxs, brush, in_world: true });
        brush
    }

    pub fn surface_flags(&mut self, brush: usize, flags: i32) {
        let b = self.parts.brushes[brush];
        for s in &mut self.parts.brush_sides[b.first_side..b.first_side + b.num_sides] {
            s.surface_flags = flags;
        }
    }

    pub fn patch(&mut self, pc: Arc<dyn PatchCollide>, contents: i32, flags: i32) -> usize {
        let bounds = pc.bounds();
        self.parts.surfaces.push(Some(CPatch::new(contents, flags, pc)));
        let surface = self.parts.surfaces.len() - 1;
        self.patches.push(PendingPatch { bounds, surface });
        surface
    }

    /// Inline model made of one brush that is not part of the world tree.
    pub fn submodel_brush(&mut self, mins: Vec3, maxs: Vec3, contents: i32) -> ClipHandle {
        let brush = self.push_brush(mins, maxs, contents, &[]);
        self.pending.push(PendingBrush { mins, maxs, brush, in_world: false });
        self.submodels.push(vec![brush]);
        self.submodels.len() as ClipHandle
    }

    fn touches(&self, leaf: usize, mins: &Vec3, maxs: &Vec3) -> bool {
        if !self.split {
            return true;
        }
        if leaf == 0 {
            maxs[0] > 0.0
        } else {
            mins[0] < 0.0
        }
    }

    pub fn build(&mut self) -> ClipMap {
        let config = self.config;
        ClipMap::load("test", self.build_parts(), config)
    }

    /// The raw world data, for loading through the global holder.
    pub fn build_parts(&mut self) -> WorldParts {
        let mut parts = std::mem::take(&mut self.parts);
        parts.planes.push(CPlane::new([1.0, 0.0, 0.0], 0.0));
        let node_plane = parts.planes.len() - 1;

        let num_leafs = if self.split { 2 } else { 1 };
        parts.nodes = vec![CNode {
            plane_idx: node_plane,
            children: if self.split { [-1, -2] } else { [-1, -1] },
        }];

        for leaf in 0..num_leafs {
            let first_leaf_brush = parts.leaf_brushes.len();
            for p in self.pending.iter().filter(|p| p.in_world) {
                if self.touches(leaf, &p.mins, &p.maxs) {
                    parts.leaf_brushes.push(p.brush);
                }
            }
            let first_leaf_surface = parts.leaf_surfaces.len();
            for p in &self.patches {
                if self.touches(leaf, &p.bounds[0], &p.bounds[1]) {
                    parts.leaf_surfaces.push(p.surface);
                }
            }
            parts.leafs.push(CLeaf {
                cluster: leaf as i32,
                area: 0,
                first_leaf_brush,
                num_leaf_brushes: parts.leaf_brushes.len() - first_leaf_brush,
                first_leaf_surface,
                num_leaf_surfaces: parts.leaf_surfaces.len() - first_leaf_surface,
            });
        }

        parts.submodels.push(CModel {
            mins: [-MAX_WORLD; 3],
            maxs: [MAX_WORLD; 3],
            leaf: CLeaf::default(),
        });
        for brushes in &self.submodels {
            let first_leaf_brush = parts.leaf_brushes.len();
            parts.leaf_brushes.extend_from_slice(brushes);
            let p = self
                .pending
                .iter()
                .find(|p| p.brush == brushes[0])
                .expect("submodel brush was recorded");
            parts.submodels.push(CModel {
                mins: p.mins,
                maxs: p.maxs,
                leaf: CLeaf {
                    cluster: -1,
                    first_leaf_brush,
                    num_leaf_brushes: brushes.len(),
                    ..Default::default()
                },
            });
        }

        parts
    }
}

const MAX_WORLD: f32 = 4096.0;

/// One solid slab spanning x/y ±1000 with its top face at z = 0 and
/// bottom at z = -16.
pub fn slab_world() -> ClipMap {
    let mut w = WorldBuilder::new();
    w.brush([-1000.0, -1000.0, -16.0], [1000.0, 1000.0, 0.0], qclip_common::q_shared::CONTENTS_SOLID, &[]);
    w.build()
}

pub fn assert_near(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "{} != {} (eps {})", a, b, eps);
}

pub fn assert_vec_near(a: &Vec3, b: &Vec3, eps: f32) {
    for i in 0..3 {
        assert!((a[i] - b[i]).abs() <= eps, "{:?} != {:?} (eps {})", a, b, eps);
    }
}
