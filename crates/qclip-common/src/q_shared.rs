// q_shared.rs — foundational types and math shared by the collision crates

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

/// Three row vectors; `vector_rotate` dots a point against each row.
pub type Mat3 = [Vec3; 3];

pub const PITCH: usize = 0; // up / down
pub const YAW: usize = 1; // left / right
pub const ROLL: usize = 2; // fall over

// ============================================================
// Contents and surface flags
// ============================================================

pub const CONTENTS_SOLID: i32 = 0x00000001;
pub const CONTENTS_WATER: i32 = 0x00000020;
pub const CONTENTS_PLAYERCLIP: i32 = 0x00010000;
/// set on the temporary box and capsule models
pub const CONTENTS_BODY: i32 = 0x02000000;

pub const MASK_ALL: i32 = -1;
pub const MASK_SOLID: i32 = CONTENTS_SOLID;
pub const MASK_PLAYERSOLID: i32 = CONTENTS_SOLID | CONTENTS_PLAYERCLIP | CONTENTS_BODY;

pub const SURF_SLICK: i32 = 0x2; // effects game physics

// ============================================================
// Cvar flags
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CvarFlags: i32 {
        /// changes only take effect when the latched value is applied
        const LATCH        = 0x0020;
        /// display only, cannot be set by the user at all
        const ROM          = 0x0040;
        /// created by a set before anything registered it
        const USER_CREATED = 0x0080;
        /// can not be changed unless cheats are enabled
        const CHEAT        = 0x0200;
    }
}
pub const CVAR_ZERO: CvarFlags = CvarFlags::empty();
pub const CVAR_LATCH: CvarFlags = CvarFlags::LATCH;
pub const CVAR_ROM: CvarFlags = CvarFlags::ROM;
pub const CVAR_CHEAT: CvarFlags = CvarFlags::CHEAT;

// ============================================================
// Plane
// ============================================================

// 0-2 are axial planes
pub const PLANE_X: u8 = 0;
pub const PLANE_Y: u8 = 1;
pub const PLANE_Z: u8 = 2;
// 3 and above are non-axial
pub const PLANE_NON_AXIAL: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: u8,
    pub signbits: u8,
    pub pad: [u8; 2],
}

impl Default for CPlane {
    fn default() -> Self {
        Self {
            normal: [0.0; 3],
            dist: 0.0,
            plane_type: 0,
            signbits: 0,
            pad: [0; 2],
        }
    }
}

impl CPlane {
    /// Build a plane and classify it (axial type and signbits).
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self {
            normal,
            dist,
            plane_type: plane_type_for_normal(&normal),
            signbits: sign_bits_for_normal(&normal),
            pad: [0; 2],
        }
    }

    /// Recompute `plane_type` and `signbits` from the normal.
    pub fn classify(&mut self) {
        self.plane_type = plane_type_for_normal(&self.normal);
        self.signbits = sign_bits_for_normal(&self.normal);
    }
}

pub fn plane_type_for_normal(n: &Vec3) -> u8 {
    if n[0] == 1.0 {
        PLANE_X
    } else if n[1] == 1.0 {
        PLANE_Y
    } else if n[2] == 1.0 {
        PLANE_Z
    } else {
        PLANE_NON_AXIAL
    }
}

/// Bit `i` is set when `normal[i]` is negative.
pub fn sign_bits_for_normal(n: &Vec3) -> u8 {
    let mut bits = 0u8;
    for (j, &v) in n.iter().enumerate() {
        if v < 0.0 {
            bits |= 1 << j;
        }
    }
    bits
}

// ============================================================
// Trace
// ============================================================

/// Result of a swept volume query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trace {
    /// if true, plane is not valid
    pub allsolid: bool,
    /// if true, the initial point was in a solid area
    pub startsolid: bool,
    /// time completed, 1.0 = didn't hit anything
    pub fraction: f32,
    /// final position
    pub endpos: Vec3,
    /// surface normal at impact, transformed to world space
    pub plane: CPlane,
    pub surface_flags: i32,
    /// contents on other side of surface hit
    pub contents: i32,
    pub ent_index: i32,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            allsolid: false,
            startsolid: false,
            fraction: 1.0,
            endpos: [0.0; 3],
            plane: CPlane::default(),
            surface_flags: 0,
            contents: 0,
            ent_index: -1,
        }
    }
}

// ============================================================
// MATHLIB — Vector operations
// ============================================================

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vector_negate(v: &Vec3) -> Vec3 {
    [-v[0], -v[1], -v[2]]
}

/// veca + scale * vecb
#[inline]
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

pub fn vector_compare(v1: &Vec3, v2: &Vec3) -> bool {
    v1[0] == v2[0] && v1[1] == v2[1] && v1[2] == v2[2]
}

/// Bit `i` set where `a[i] < b[i]`; non-zero means any axis.
pub fn vector_compare_lt(a: &Vec3, b: &Vec3) -> u32 {
    (a[0] < b[0]) as u32 | ((a[1] < b[1]) as u32) << 1 | ((a[2] < b[2]) as u32) << 2
}

/// Bit `i` set where `a[i] > b[i]`; non-zero means any axis.
pub fn vector_compare_gt(a: &Vec3, b: &Vec3) -> u32 {
    (a[0] > b[0]) as u32 | ((a[1] > b[1]) as u32) << 1 | ((a[2] > b[2]) as u32) << 2
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[inline]
pub fn vector_length_squared(v: &Vec3) -> f32 {
    v[0] * v[0] + v[1] * v[1] + v[2] * v[2]
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

// ============================================================
// Matrix operations
// ============================================================

pub fn vector_rotate(v: &Vec3, matrix: &Mat3) -> Vec3 {
    [
        dot_product(v, &matrix[0]),
        dot_product(v, &matrix[1]),
        dot_product(v, &matrix[2]),
    ]
}

pub fn matrix_transpose(matrix: &Mat3) -> Mat3 {
    let mut out = [[0.0f32; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = matrix[j][i];
        }
    }
    out
}

/// Rows are forward, left (negated right) and up for the given angles.
pub fn create_rotation_matrix(angles: &Vec3) -> Mat3 {
    let (forward, right, up) = angle_vectors_tuple(angles);
    [forward, vector_negate(&right), up]
}

// ============================================================
// Angle functions
// ============================================================

pub fn angle_vectors(
    angles: &Vec3,
    forward: Option<&mut Vec3>,
    right: Option<&mut Vec3>,
    up: Option<&mut Vec3>,
) {
    let angle_yaw = angles[YAW].to_radians();
    let sy = angle_yaw.sin();
    let cy = angle_yaw.cos();

    let angle_pitch = angles[PITCH].to_radians();
    let sp = angle_pitch.sin();
    let cp = angle_pitch.cos();

    let angle_roll = angles[ROLL].to_radians();
    let sr = angle_roll.sin();
    let cr = angle_roll.cos();

    if let Some(fwd) = forward {
        fwd[0] = cp * cy;
        fwd[1] = cp * sy;
        fwd[2] = -sp;
    }
    if let Some(r) = right {
        r[0] = -sr * sp * cy + -cr * -sy;
        r[1] = -sr * sp * sy + -cr * cy;
        r[2] = -sr * cp;
    }
    if let Some(u) = up {
        u[0] = cr * sp * cy + -sr * -sy;
        u[1] = cr * sp * sy + -sr * cy;
        u[2] = cr * cp;
    }
}

/// Convenience version of angle_vectors that returns a tuple (forward, right, up).
pub fn angle_vectors_tuple(angles: &Vec3) -> (Vec3, Vec3, Vec3) {
    let mut forward = [0.0f32; 3];
    let mut right = [0.0f32; 3];
    let mut up = [0.0f32; 3];
    angle_vectors(angles, Some(&mut forward), Some(&mut right), Some(&mut up));
    (forward, right, up)
}

/// Given a normalized forward vector, build two unit vectors that complete
/// an orthonormal basis. Returns (right, up).
pub fn make_normal_vectors(forward: &Vec3) -> (Vec3, Vec3) {
    // this rotate and negate guarantees a vector not colinear with the original
    let mut right = [forward[2], -forward[0], forward[1]];

    let d = dot_product(&right, forward);
    right = vector_ma(&right, -d, forward);
    vector_normalize(&mut right);
    let up = cross_product(&right, forward);
    (right, up)
}

/// Returns 1 (front), 2 (back), or 3 (crossing) for a box vs. plane test.
pub fn box_on_plane_side(emins: &Vec3, emaxs: &Vec3, p: &CPlane) -> i32 {
    // fast axial cases
    if p.plane_type < PLANE_NON_AXIAL {
        let t = p.plane_type as usize;
        if p.dist <= emins[t] {
            return 1;
        }
        if p.dist >= emaxs[t] {
            return 2;
        }
        return 3;
    }

    // general case: pick the nearest and farthest corners from the signbits
    let mut near = [0.0f32; 3];
    let mut far = [0.0f32; 3];
    for i in 0..3 {
        if p.signbits & (1 << i) != 0 {
            near[i] = emins[i];
            far[i] = emaxs[i];
        } else {
            near[i] = emaxs[i];
            far[i] = emins[i];
        }
    }
    let dist1 = dot_product(&p.normal, &near);
    let dist2 = dot_product(&p.normal, &far);

    let mut sides = 0;
    if dist1 >= p.dist {
        sides = 1;
    }
    if dist2 < p.dist {
        sides |= 2;
    }
    sides
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_near(a: &Vec3, b: &Vec3, eps: f32) {
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < eps, "component {}: {:?} vs {:?}", i, a, b);
        }
    }

    #[test]
    fn test_dot_product() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert_eq!(dot_product(&a, &b), 32.0);
    }

    #[test]
    fn test_vector_normalize() {
        let mut v = [3.0, 0.0, 4.0];
        let len = vector_normalize(&mut v);
        assert!((len - 5.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_is_untouched() {
        let mut v = [0.0; 3];
        assert_eq!(vector_normalize(&mut v), 0.0);
        assert_eq!(v, [0.0; 3]);
    }

    #[test]
    fn test_cross_product() {
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0];
        let c = cross_product(&a, &b);
        assert_eq!(c, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_compare_masks() {
        let a = [0.0, 5.0, -1.0];
        let b = [1.0, 5.0, -2.0];
        assert_eq!(vector_compare_lt(&a, &b), 0b001);
        assert_eq!(vector_compare_gt(&a, &b), 0b100);
        assert_eq!(vector_compare_lt(&a, &a), 0);
    }

    #[test]
    fn test_plane_classification() {
        let p = CPlane::new([0.0, 0.0, 1.0], 8.0);
        assert_eq!(p.plane_type, PLANE_Z);
        assert_eq!(p.signbits, 0);

        let p = CPlane::new([0.0, -1.0, 0.0], 8.0);
        assert_eq!(p.plane_type, PLANE_NON_AXIAL, "negative axial normals are not fast-path axial");
        assert_eq!(p.signbits, 0b010);

        let n = 1.0 / 3.0f32.sqrt();
        let p = CPlane::new([-n, n, -n], 0.0);
        assert_eq!(p.signbits, 0b101);
    }

    #[test]
    fn test_box_on_plane_side_axial() {
        let mins = [-1.0, -1.0, -1.0];
        let maxs = [1.0, 1.0, 1.0];
        let plane = CPlane::new([1.0, 0.0, 0.0], 5.0);
        assert_eq!(box_on_plane_side(&mins, &maxs, &plane), 2);
        let plane = CPlane::new([1.0, 0.0, 0.0], -5.0);
        assert_eq!(box_on_plane_side(&mins, &maxs, &plane), 1);
        let plane = CPlane::new([1.0, 0.0, 0.0], 0.0);
        assert_eq!(box_on_plane_side(&mins, &maxs, &plane), 3);
    }

    #[test]
    fn test_box_on_plane_side_general() {
        let n = 1.0 / 2.0f32.sqrt();
        let plane = CPlane::new([n, -n, 0.0], 0.0);
        // box straddles the diagonal
        assert_eq!(box_on_plane_side(&[-1.0, -1.0, -1.0], &[1.0, 1.0, 1.0], &plane), 3);
        // box entirely on the +x -y side
        assert_eq!(box_on_plane_side(&[4.0, -8.0, 0.0], &[6.0, -6.0, 1.0], &plane), 1);
        assert_eq!(box_on_plane_side(&[-8.0, 4.0, 0.0], &[-6.0, 6.0, 1.0], &plane), 2);
    }

    #[test]
    fn test_rotation_matrix_identity() {
        let m = create_rotation_matrix(&[0.0, 0.0, 0.0]);
        assert_vec_near(&m[0], &[1.0, 0.0, 0.0], 1e-6);
        assert_vec_near(&m[1], &[0.0, 1.0, 0.0], 1e-6);
        assert_vec_near(&m[2], &[0.0, 0.0, 1.0], 1e-6);
    }

    #[test]
    fn test_rotation_yaw_and_transpose() {
        let m = create_rotation_matrix(&[0.0, 90.0, 0.0]);
        let local = vector_rotate(&[1.0, 0.0, 0.0], &m);
        assert_vec_near(&local, &[0.0, -1.0, 0.0], 1e-5);

        let t = matrix_transpose(&m);
        let back = vector_rotate(&local, &t);
        assert_vec_near(&back, &[1.0, 0.0, 0.0], 1e-5);
    }

    #[test]
    fn test_make_normal_vectors_orthonormal() {
        let mut fwd = [0.3, -0.5, 0.8];
        vector_normalize(&mut fwd);
        let (right, up) = make_normal_vectors(&fwd);
        assert!(dot_product(&right, &fwd).abs() < 1e-5);
        assert!(dot_product(&up, &fwd).abs() < 1e-5);
        assert!(dot_product(&right, &up).abs() < 1e-5);
        assert!((vector_length(&right) - 1.0).abs() < 1e-5);
        assert!((vector_length(&up) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_trace_default() {
        let t = Trace::default();
        assert_eq!(t.fraction, 1.0);
        assert!(!t.allsolid && !t.startsolid);
        assert_eq!(t.ent_index, -1);
        assert_eq!(t.surface_flags, 0);
    }

    #[test]
    fn test_cvar_flag_bits() {
        let f = CVAR_CHEAT | CVAR_LATCH;
        assert_eq!(f.bits(), 0x0220);
        assert!(f.contains(CvarFlags::CHEAT));
    }
}
