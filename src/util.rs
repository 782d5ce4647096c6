use nalgebra as na;
use na::{vector, Matrix3, Matrix4, Point3, Vector2, Vector3, Vector4};

/// Transformation of a point to homogenous coordinates.
pub fn to_hom_point(v: Vector3<f32>) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, 1.0];
}

/// Transformation of a point from homogenous coordinates.
/// No guard against w close to zero - caller gets infinities in that case.
pub fn from_hom_point(v: Vector4<f32>) -> Vector3<f32> {
    return vector![v.x / v.w, v.y / v.w, v.z / v.w];
}

/// Inverse transpose of the upper 3x3 part of a model-view matrix, used to carry normals into eye
/// space so they stay perpendicular to surfaces under non-uniform scale.
/// Falls back to the plain upper 3x3 block for singular matrices.
pub fn normal_matrix(mv: &Matrix4<f32>) -> Matrix3<f32> {
    let upper: Matrix3<f32> = mv.fixed_slice::<3, 3>(0, 0).into_owned();
    return match upper.try_inverse() {
        Some(inverse) => inverse.transpose(),
        None => upper,
    };
}

/// Right handed view matrix for a camera at `eye` looking at `target`.
pub fn look_at(eye: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    return Matrix4::look_at_rh(&eye, &target, &up);
}

/// OpenGL style projection - camera looks down -z, ndc z in [-1, 1] from near to far.
pub fn perspective(aspect: f32, fovy: f32, znear: f32, zfar: f32) -> Matrix4<f32> {
    return Matrix4::new_perspective(aspect, fovy, znear, zfar);
}

/// Weighted sum of three Vector3's, weights usually being barycentric coordinates.
pub fn interpolate3(weights: Vector3<f32>, a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> Vector3<f32> {
    return a * weights.x + b * weights.y + c * weights.z;
}

/// Weighted sum of three Vector2's.
pub fn interpolate2(weights: Vector3<f32>, a: Vector2<f32>, b: Vector2<f32>, c: Vector2<f32>) -> Vector2<f32> {
    return a * weights.x + b * weights.y + c * weights.z;
}

/// Clamping every channel of a float color into [0.0, 1.0].
pub fn clamp_color(color: Vector3<f32>) -> Vector3<f32> {
    return color.map(|channel| channel.clamp(0.0, 1.0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_matrix_keeps_normals_perpendicular_under_non_uniform_scale() {
        let mv = Matrix4::new_nonuniform_scaling(&vector![4.0, 1.0, 1.0]);
        // Plane x = y has tangent (1, 1, 0) and normal (1, -1, 0).
        let tangent = (mv * vector![1.0, 1.0, 0.0, 0.0]).xyz();
        let normal = normal_matrix(&mv) * vector![1.0, -1.0, 0.0];
        assert!(tangent.dot(&normal).abs() < 1e-5);
    }

    #[test]
    fn normal_matrix_of_singular_matrix_falls_back_to_upper_block() {
        let mv = Matrix4::new_nonuniform_scaling(&vector![0.0, 1.0, 1.0]);
        let n = normal_matrix(&mv);
        assert_eq!(n[(0, 0)], 0.0);
        assert_eq!(n[(1, 1)], 1.0);
    }

    #[test]
    fn homogenous_round_trip_divides_by_w() {
        let p = from_hom_point(vector![2.0, 4.0, 6.0, 2.0]);
        assert_eq!(p, vector![1.0, 2.0, 3.0]);
        assert_eq!(to_hom_point(p).w, 1.0);
    }

    #[test]
    fn interpolation_with_unit_weight_picks_vertex() {
        let a = vector![1.0, 0.0, 0.0];
        let b = vector![0.0, 1.0, 0.0];
        let c = vector![0.0, 0.0, 1.0];
        assert_eq!(interpolate3(vector![0.0, 1.0, 0.0], a, b, c), b);
        let uv = interpolate2(vector![0.5, 0.5, 0.0], vector![0.0, 0.0], vector![1.0, 1.0], vector![9.0, 9.0]);
        assert_eq!(uv, vector![0.5, 0.5]);
    }
}
