// cm_local.rs — collision model data shared by the cm_* modules

use std::sync::Arc;

use qclip_common::cvar::CvarContext;
use qclip_common::q_shared::{CPlane, Trace, Vec3, CVAR_CHEAT, CVAR_LATCH, CVAR_ZERO};

use crate::cm_patch::PatchCollide;

/// Index of a collision model: 0 is the world, `1..n` inline sub-models,
/// plus the two reserved temporary-model handles below.
pub type ClipHandle = i32;

pub const MAX_SUBMODELS: ClipHandle = 512;
pub const CAPSULE_MODEL_HANDLE: ClipHandle = MAX_SUBMODELS - 2;
pub const BOX_MODEL_HANDLE: ClipHandle = MAX_SUBMODELS - 1;

/// Maximum leafs a world position test will gather.
pub const MAX_POSITION_LEAFS: usize = 1024;

/// Keep 1/8 unit away from surfaces to avoid sticking on round-off.
pub const SURFACE_CLIP_EPSILON: f32 = 0.125;
pub const RADIUS_EPSILON: f32 = 1.0;

/// Every brush starts with its six axial sides. Map brushes list them as
/// -X, +X, -Y, +Y, -Z, +Z and the box hull as +X, -X, +Y, -Y, +Z, -Z; the
/// collision tests skip them by count only.
pub const AXIAL_SIDES: usize = 6;

// ============================================================
// Map data
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct CNode {
    pub plane_idx: usize,
    /// negative numbers are leafs: `-1 - leaf_index`
    pub children: [i32; 2],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CLeaf {
    pub cluster: i32,
    pub area: i32,
    pub first_leaf_brush: usize,
    pub num_leaf_brushes: usize,
    pub first_leaf_surface: usize,
    pub num_leaf_surfaces: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    /// submodels don't reference the main tree
    pub leaf: CLeaf,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CBrushSide {
    pub plane_idx: usize,
    pub surface_flags: i32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CBrush {
    pub contents: i32,
    pub bounds: [Vec3; 2],
    pub first_side: usize,
    pub num_sides: usize,
    /// to avoid repeated testings
    pub checkcount: i32,
}

/// A curved surface. The collision mesh itself is owned by the
/// tessellator and shared read-only between world copies.
#[derive(Debug, Clone)]
pub struct CPatch {
    pub checkcount: i32,
    pub surface_flags: i32,
    pub contents: i32,
    pub pc: Arc<dyn PatchCollide>,
}

impl CPatch {
    pub fn new(contents: i32, surface_flags: i32, pc: Arc<dyn PatchCollide>) -> Self {
        Self {
            checkcount: 0,
            surface_flags,
            contents,
            pc,
        }
    }
}

// ============================================================
// Per-trace working state
// ============================================================

/// Capsule description used when tracing a capsule instead of a box.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sphere {
    pub use_sphere: bool,
    pub radius: f32,
    pub halfheight: f32,
    /// offset from the center to the top/bottom end-sphere centers
    pub offset: Vec3,
}

/// Everything needed to run one trace, passed down through the traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceWork {
    pub start: Vec3,
    pub end: Vec3,
    /// size of the box being swept through the model
    pub size: [Vec3; 2],
    /// [signbits][x] = either size[0][x] or size[1][x]
    pub offsets: [Vec3; 8],
    /// longest corner length from origin
    pub max_offset: f32,
    /// greatest of abs(size[0]) and abs(size[1])
    pub extents: Vec3,
    /// enclosing box of start and end surrounding by size
    pub bounds: [Vec3; 2],
    /// origin of the model tracing through
    pub model_origin: Vec3,
    /// ored contents of the model tracing through
    pub contents: i32,
    /// optimized case
    pub is_point: bool,
    /// returned from trace call
    pub trace: Trace,
    pub sphere: Sphere,
    /// sweep delta, `end - start`
    pub dir: Vec3,
    /// two planes containing the sweep, used to prune by bounds
    pub trace_plane1: CPlane,
    pub trace_plane2: CPlane,
    pub trace_dist1: f32,
    pub trace_dist2: f32,
    /// visit epoch copied from the world counter
    pub checkcount: i32,
}

/// Result of gathering the leafs a box touches.
#[derive(Debug, Clone, Default)]
pub struct LeafList {
    pub list: Vec<usize>,
    pub max_count: usize,
    pub bounds: [Vec3; 2],
    /// last leaf touched with a valid cluster, recorded even after overflow
    pub last_leaf: Option<usize>,
    /// true when leafs were dropped because `max_count` was reached
    pub overflowed: bool,
}

impl LeafList {
    pub fn new(mins: Vec3, maxs: Vec3, max_count: usize) -> Self {
        Self {
            list: Vec::with_capacity(max_count.min(64)),
            max_count,
            bounds: [mins, maxs],
            last_leaf: None,
            overflowed: false,
        }
    }
}

// ============================================================
// Configuration
// ============================================================

/// Which primitive pairs are used when a trace hits the temporary box
/// or capsule model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// boxes and capsules are both clipped as boxes
    #[default]
    BoxVsBox,
    /// boxes and capsules are both clipped as capsules
    CapsuleVsCapsule,
    /// capsule-vs-capsule, box-vs-capsule and box-vs-box by shape
    Mixed,
}

impl CollisionPolicy {
    pub fn from_cvar(value: i32) -> Self {
        match value {
            1 => CollisionPolicy::CapsuleVsCapsule,
            2 => CollisionPolicy::Mixed,
            _ => CollisionPolicy::BoxVsBox,
        }
    }
}

/// Runtime switches read from the console variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmConfig {
    /// `cm_noCurves`: ignore patch surfaces entirely
    pub no_curves: bool,
    /// `cm_optimize`: reject brushes and patches outside the sweep planes
    pub optimize: bool,
    /// `cm_collisionPolicy`
    pub policy: CollisionPolicy,
}

impl Default for CmConfig {
    fn default() -> Self {
        Self {
            no_curves: false,
            optimize: true,
            policy: CollisionPolicy::BoxVsBox,
        }
    }
}

impl CmConfig {
    /// Create the collision cvars with their defaults and read them back.
    pub fn register(cvars: &mut CvarContext) -> Self {
        cvars.get("cm_noCurves", "0", CVAR_CHEAT);
        cvars.get("cm_optimize", "1", CVAR_CHEAT);
        cvars.get("cm_collisionPolicy", "0", CVAR_LATCH);
        cvars.get("developer", "0", CVAR_ZERO);
        Self::from_cvars(cvars)
    }

    pub fn from_cvars(cvars: &CvarContext) -> Self {
        Self {
            no_curves: cvars.variable_integer("cm_noCurves") != 0,
            optimize: cvars.variable_integer("cm_optimize") != 0,
            policy: CollisionPolicy::from_cvar(cvars.variable_integer("cm_collisionPolicy")),
        }
    }
}

// ============================================================
// The loaded world
// ============================================================

/// A loaded collision world plus the temporary box hull appended after the
/// map data. Traces mutate only the visit stamps and statistics.
#[derive(Debug, Clone, Default)]
pub struct ClipMap {
    pub name: String,
    pub checksum: u16,

    pub planes: Vec<CPlane>,
    pub nodes: Vec<CNode>,
    pub leafs: Vec<CLeaf>,
    pub leaf_brushes: Vec<usize>,
    pub leaf_surfaces: Vec<usize>,
    pub cmodels: Vec<CModel>,
    pub brush_sides: Vec<CBrushSide>,
    pub brushes: Vec<CBrush>,
    /// indexed by leaf_surfaces; planar and triangle-soup surfaces are `None`
    pub surfaces: Vec<Option<CPatch>>,

    /// world visit counter, bumped per trace pass
    pub checkcount: i32,
    pub config: CmConfig,

    pub c_traces: usize,
    pub c_brush_traces: usize,
    pub c_patch_traces: usize,
    pub c_pointcontents: usize,

    // box hull storage, appended after the map data
    pub(crate) box_planes: usize,
    pub(crate) box_brush: usize,
    pub(crate) box_model: CModel,
}
