// cm_math.rs — small geometric helpers for the capsule tests

use qclip_common::q_shared::{dot_product, vector_length_squared, vector_ma, vector_subtract, Vec3};

/// Project `point` onto the line through `start` with unit direction `dir`.
pub fn project_point_onto_vector(point: &Vec3, start: &Vec3, dir: &Vec3) -> Vec3 {
    let p = vector_subtract(point, start);
    vector_ma(start, dot_product(&p, dir), dir)
}

/// Squared distance from `p` to the segment `lp1`..`lp2` (`dir` is the unit
/// direction of the segment). When the projection falls outside the segment
/// on any axis the nearer endpoint is used instead.
pub fn distance_from_line_squared(p: &Vec3, lp1: &Vec3, lp2: &Vec3, dir: &Vec3) -> f32 {
    let proj = project_point_onto_vector(p, lp1, dir);
    let outside = (0..3).find(|&j| {
        (proj[j] > lp1[j] && proj[j] > lp2[j]) || (proj[j] < lp1[j] && proj[j] < lp2[j])
    });

    let t = match outside {
        Some(j) => {
            if (proj[j] - lp1[j]).abs() < (proj[j] - lp2[j]).abs() {
                vector_subtract(p, lp1)
            } else {
                vector_subtract(p, lp2)
            }
        }
        None => vector_subtract(p, &proj),
    };
    vector_length_squared(&t)
}

pub fn vector_distance_squared(p1: &Vec3, p2: &Vec3) -> f32 {
    vector_length_squared(&vector_subtract(p2, p1))
}

/// Approximate square root: bit-trick inverse square root refined by two
/// Newton iterations, multiplied back by the input. Results are
/// reproducible bit for bit, unlike a platform `sqrt` on some targets.
pub fn square_root_float(number: f32) -> f32 {
    const THREE_HALFS: f32 = 1.5;

    let x = number * 0.5;
    let i = 0x5f3759df_i32 - ((number.to_bits() as i32) >> 1);
    let mut y = f32::from_bits(i as u32);

    y = y * (THREE_HALFS - (x * y * y));
    y = y * (THREE_HALFS - (x * y * y));
    number * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_root_float_close_to_sqrt() {
        for &v in &[0.25f32, 1.0, 2.0, 9.0, 1234.5, 65536.0, 1.0e6] {
            let approx = square_root_float(v);
            let exact = v.sqrt();
            assert!(
                ((approx - exact) / exact).abs() < 1e-5,
                "sqrt({}) = {} expected {}",
                v,
                approx,
                exact
            );
        }
    }

    #[test]
    fn test_square_root_float_reproducible() {
        let a = square_root_float(4321.125);
        let b = square_root_float(4321.125);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_square_root_float_zero() {
        assert_eq!(square_root_float(0.0), 0.0);
    }

    #[test]
    fn test_distance_inside_segment() {
        let lp1 = [0.0, 0.0, 0.0];
        let lp2 = [10.0, 0.0, 0.0];
        let dir = [1.0, 0.0, 0.0];
        let d = distance_from_line_squared(&[5.0, 3.0, 0.0], &lp1, &lp2, &dir);
        assert!((d - 9.0).abs() < 1e-5);
    }

    #[test]
    fn test_distance_past_endpoints() {
        let lp1 = [0.0, 0.0, 0.0];
        let lp2 = [10.0, 0.0, 0.0];
        let dir = [1.0, 0.0, 0.0];
        // beyond lp2: distance to the endpoint, not the infinite line
        let d = distance_from_line_squared(&[13.0, 4.0, 0.0], &lp1, &lp2, &dir);
        assert!((d - 25.0).abs() < 1e-4);
        // before lp1
        let d = distance_from_line_squared(&[-3.0, 0.0, 4.0], &lp1, &lp2, &dir);
        assert!((d - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_project_point_onto_vector() {
        let p = project_point_onto_vector(&[3.0, 7.0, -2.0], &[0.0, 1.0, 0.0], &[0.0, 1.0, 0.0]);
        assert_eq!(p, [0.0, 7.0, 0.0]);
    }

    #[test]
    fn test_vector_distance_squared() {
        assert_eq!(vector_distance_squared(&[1.0, 2.0, 3.0], &[4.0, 6.0, 3.0]), 25.0);
    }
}
