// cm_load.rs — installing world collision data and the temporary box model

use rayon::prelude::*;

use qclip_common::common::{com_dprintf, com_error, com_printf, ERR_DROP};
use qclip_common::crc::CrcStream;
use qclip_common::q_shared::{CPlane, Vec3, CONTENTS_BODY};

use crate::cm_local::*;

/// Largest coordinate a map can use; bounds for brushes too broken to bound.
pub const MAX_MAP_BOUNDS: f32 = 65535.0;

/// Already-parsed collision arrays as produced by the map loader.
#[derive(Debug, Clone, Default)]
pub struct WorldParts {
    pub planes: Vec<CPlane>,
    pub nodes: Vec<CNode>,
    pub leafs: Vec<CLeaf>,
    pub leaf_brushes: Vec<usize>,
    pub leaf_surfaces: Vec<usize>,
    pub brushes: Vec<CBrush>,
    pub brush_sides: Vec<CBrushSide>,
    pub surfaces: Vec<Option<CPatch>>,
    /// model 0 is the world
    pub submodels: Vec<CModel>,
}

/// Outward normals of the six leading brush sides.
const AXIAL_NORMALS: [Vec3; AXIAL_SIDES] = [
    [-1.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, -1.0],
    [0.0, 0.0, 1.0],
];

/// Derive brush bounds from the axial sides. Returns false for brushes that
/// don't start with the six axial sides; those get map-sized bounds.
fn bound_brush(b: &mut CBrush, sides: &[CBrushSide], planes: &[CPlane]) -> bool {
    if b.num_sides < AXIAL_SIDES {
        b.bounds = [[-MAX_MAP_BOUNDS; 3], [MAX_MAP_BOUNDS; 3]];
        return b.num_sides == 0;
    }

    let side_plane = |i: usize| &planes[sides[b.first_side + i].plane_idx];
    let axial = (0..AXIAL_SIDES).all(|i| side_plane(i).normal == AXIAL_NORMALS[i]);

    for axis in 0..3 {
        b.bounds[0][axis] = -side_plane(axis * 2).dist;
        b.bounds[1][axis] = side_plane(axis * 2 + 1).dist;
    }
    axial
}

impl ClipMap {
    const PARALLEL_LOAD_THRESHOLD: usize = 64;

    /// A world with nothing loaded; every trace against it is unobstructed.
    pub fn empty() -> Self {
        let mut cm = Self {
            leafs: vec![CLeaf::default()],
            cmodels: vec![CModel::default()],
            ..Default::default()
        };
        cm.init_box_hull();
        cm
    }

    /// Validate and finalize parsed collision data, then append the box hull.
    pub fn load(name: &str, parts: WorldParts, config: CmConfig) -> Self {
        let WorldParts {
            mut planes,
            nodes,
            leafs,
            leaf_brushes,
            leaf_surfaces,
            mut brushes,
            brush_sides,
            surfaces,
            mut submodels,
        } = parts;

        validate(&planes, &nodes, &leafs, &leaf_brushes, &leaf_surfaces, &brushes, &brush_sides, &surfaces, &submodels);

        if planes.len() >= Self::PARALLEL_LOAD_THRESHOLD {
            planes.par_iter_mut().for_each(CPlane::classify);
        } else {
            planes.iter_mut().for_each(CPlane::classify);
        }

        let malformed = {
            let bound = |b: &mut CBrush| bound_brush(b, &brush_sides, &planes);
            if brushes.len() >= Self::PARALLEL_LOAD_THRESHOLD {
                brushes.par_iter_mut().map(bound).filter(|ok| !ok).count()
            } else {
                brushes.iter_mut().map(bound).filter(|ok| !ok).count()
            }
        };
        if malformed > 0 {
            com_dprintf(&format!(
                "WARNING: {}: {} brushes without leading axial sides\n",
                name, malformed
            ));
        }

        if submodels.is_empty() {
            submodels.push(CModel::default());
        }

        let mut cm = Self {
            name: name.to_string(),
            planes,
            nodes,
            leafs,
            leaf_brushes,
            leaf_surfaces,
            cmodels: submodels,
            brush_sides,
            brushes,
            surfaces,
            config,
            ..Default::default()
        };
        cm.checksum = cm.compute_checksum();
        cm.init_box_hull();

        com_dprintf(&format!(
            "CM_LoadMap: {}: {} planes, {} nodes, {} leafs, {} brushes, {} patches, {} models, checksum {:04x}\n",
            cm.name,
            cm.box_planes,
            cm.nodes.len(),
            cm.leafs.len(),
            cm.box_brush,
            cm.surfaces.iter().filter(|s| s.is_some()).count(),
            cm.cmodels.len(),
            cm.checksum
        ));
        cm
    }

    /// CRC over the collision geometry, used to detect reloads of the same map.
    fn compute_checksum(&self) -> u16 {
        let mut crc = CrcStream::new();
        for p in &self.planes {
            p.normal.iter().for_each(|&v| crc.float(v));
            crc.float(p.dist);
        }
        for n in &self.nodes {
            crc.int(n.plane_idx as i32);
            crc.int(n.children[0]);
            crc.int(n.children[1]);
        }
        for l in &self.leafs {
            crc.int(l.cluster);
            crc.int(l.area);
            crc.int(l.num_leaf_brushes as i32);
            crc.int(l.num_leaf_surfaces as i32);
        }
        for b in &self.brushes {
            crc.int(b.contents);
            crc.int(b.first_side as i32);
            crc.int(b.num_sides as i32);
        }
        for s in &self.brush_sides {
            crc.int(s.plane_idx as i32);
            crc.int(s.surface_flags);
        }
        crc.finish()
    }

    /// Set up the planes and nodes so that the six floats of a bounding box
    /// can just be stored out and get a proper clipping hull structure.
    pub(crate) fn init_box_hull(&mut self) {
        self.box_planes = self.planes.len();
        self.box_brush = self.brushes.len();

        let first_side = self.brush_sides.len();
        self.brushes.push(CBrush {
            contents: CONTENTS_BODY,
            bounds: [[0.0; 3]; 2],
            first_side,
            num_sides: AXIAL_SIDES,
            checkcount: 0,
        });

        self.box_model = CModel {
            mins: [0.0; 3],
            maxs: [0.0; 3],
            leaf: CLeaf {
                first_leaf_brush: self.leaf_brushes.len(),
                num_leaf_brushes: 1,
                ..Default::default()
            },
        };
        self.leaf_brushes.push(self.box_brush);

        for i in 0..6 {
            let side = i & 1;
            self.brush_sides.push(CBrushSide {
                plane_idx: self.box_planes + i * 2 + side,
                surface_flags: 0,
            });
        }

        // planes come in pairs: +axis then -axis, for maxs then mins
        for i in 0..6 {
            let mut normal = [0.0; 3];
            normal[i >> 1] = 1.0;
            self.planes.push(CPlane {
                normal,
                plane_type: (i >> 1) as u8,
                ..Default::default()
            });

            normal[i >> 1] = -1.0;
            let mut back = CPlane::new(normal, 0.0);
            back.plane_type = 3 + (i >> 1) as u8;
            self.planes.push(back);
        }
    }

    /// To keep everything totally uniform, bounding boxes are turned into
    /// small BSP trees instead of being compared directly. The hull is
    /// rebuilt for capsules too, so a capsule handle traced as a box still
    /// sees its own bounds.
    pub fn temp_box_model(&mut self, mins: &Vec3, maxs: &Vec3, capsule: bool) -> ClipHandle {
        self.box_model.mins = *mins;
        self.box_model.maxs = *maxs;

        let p = self.box_planes;
        for axis in 0..3 {
            let base = p + axis * 4;
            self.planes[base].dist = maxs[axis];
            self.planes[base + 1].dist = -maxs[axis];
            self.planes[base + 2].dist = mins[axis];
            self.planes[base + 3].dist = -mins[axis];
        }
        self.brushes[self.box_brush].bounds = [*mins, *maxs];

        if capsule {
            CAPSULE_MODEL_HANDLE
        } else {
            BOX_MODEL_HANDLE
        }
    }

    pub fn clip_handle_to_model(&self, handle: ClipHandle) -> &CModel {
        if handle < 0 {
            com_error(ERR_DROP, &format!("CM_ClipHandleToModel: bad handle {}", handle));
        }
        if (handle as usize) < self.cmodels.len() {
            return &self.cmodels[handle as usize];
        }
        if handle == BOX_MODEL_HANDLE || handle == CAPSULE_MODEL_HANDLE {
            return &self.box_model;
        }
        com_error(
            ERR_DROP,
            &format!(
                "CM_ClipHandleToModel: bad handle {} ({} submodels)",
                handle,
                self.cmodels.len()
            ),
        );
    }

    pub fn inline_model(&self, index: i32) -> ClipHandle {
        if index < 0 || index as usize >= self.cmodels.len() {
            com_error(ERR_DROP, &format!("CM_InlineModel: bad number {}", index));
        }
        index
    }

    pub fn num_inline_models(&self) -> usize {
        self.cmodels.len()
    }

    pub fn model_bounds(&self, model: ClipHandle) -> (Vec3, Vec3) {
        let cmod = self.clip_handle_to_model(model);
        (cmod.mins, cmod.maxs)
    }

    pub fn clear_stats(&mut self) {
        self.c_traces = 0;
        self.c_brush_traces = 0;
        self.c_patch_traces = 0;
        self.c_pointcontents = 0;
    }

    pub fn print_stats(&self) {
        com_printf(&format!(
            "{:4} traces  ({}b {}p) {:4} points\n",
            self.c_traces, self.c_brush_traces, self.c_patch_traces, self.c_pointcontents
        ));
    }
}

/// Reject structurally broken input before anything indexes into it.
fn validate(
    planes: &[CPlane],
    nodes: &[CNode],
    leafs: &[CLeaf],
    leaf_brushes: &[usize],
    leaf_surfaces: &[usize],
    brushes: &[CBrush],
    brush_sides: &[CBrushSide],
    surfaces: &[Option<CPatch>],
    submodels: &[CModel],
) {
    if !nodes.is_empty() && leafs.is_empty() {
        com_error(ERR_DROP, "CMod_LoadLeafs: map with no leafs");
    }

    for (i, node) in nodes.iter().enumerate() {
        if node.plane_idx >= planes.len() {
            com_error(ERR_DROP, &format!("CMod_LoadNodes: node {} has bad plane", i));
        }
        for &child in &node.children {
            let ok = if child >= 0 {
                (child as usize) < nodes.len()
            } else {
                ((-1 - child) as usize) < leafs.len()
            };
            if !ok {
                com_error(ERR_DROP, &format!("CMod_LoadNodes: node {} has bad child {}", i, child));
            }
        }
    }

    let check_leaf = |what: &str, leaf: &CLeaf| {
        if leaf.first_leaf_brush + leaf.num_leaf_brushes > leaf_brushes.len()
            || leaf.first_leaf_surface + leaf.num_leaf_surfaces > leaf_surfaces.len()
        {
            com_error(ERR_DROP, &format!("CMod_LoadLeafs: {} references past the lists", what));
        }
    };
    leafs.iter().for_each(|l| check_leaf("leaf", l));
    submodels.iter().for_each(|m| check_leaf("submodel", &m.leaf));

    if leaf_brushes.iter().any(|&b| b >= brushes.len()) {
        com_error(ERR_DROP, "CMod_LoadLeafBrushes: bad brush number");
    }
    if leaf_surfaces.iter().any(|&s| s >= surfaces.len()) {
        com_error(ERR_DROP, "CMod_LoadLeafSurfaces: bad surface number");
    }

    for (i, b) in brushes.iter().enumerate() {
        if b.first_side + b.num_sides > brush_sides.len() {
            com_error(ERR_DROP, &format!("CMod_LoadBrushes: brush {} has bad sides", i));
        }
    }
    if brush_sides.iter().any(|s| s.plane_idx >= planes.len()) {
        com_error(ERR_DROP, "CMod_LoadBrushSides: bad plane number");
    }
}
