// Transform utilities for Mat4
//
// Extends glam::Mat4 with the helpers the translators need when baking
// world-space proxies. glam::Mat4 already provides transform_point3().

use crate::Aabb;
use glam::Mat4;

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Row-major flattening, the layout USDA `matrix4d` literals use.
    fn to_row_major(&self) -> [f64; 16];

    /// Inverse of [`Mat4Ext::to_row_major`].
    fn from_row_major(values: &[f64; 16]) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return *aabb;
        }
        Aabb::from_positions(&aabb.corners().map(|corner| self.transform_point3(corner)))
    }

    fn to_row_major(&self) -> [f64; 16] {
        // glam stores columns; USD rows hold the translation in the last row,
        // which is exactly glam's column layout read in order.
        let cols = self.to_cols_array();
        cols.map(|v| v as f64)
    }

    fn from_row_major(values: &[f64; 16]) -> Mat4 {
        Mat4::from_cols_array(&values.map(|v| v as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_transform_point3_translation() {
        let mat = Mat4::from_translation(Vec3::new(10.0, 20.0, 30.0));
        let point = Vec3::new(1.0, 2.0, 3.0);
        let transformed = mat.transform_point3(point);

        assert_eq!(transformed, Vec3::new(11.0, 22.0, 33.0));
    }

    #[test]
    fn test_transform_aabb_rotation() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let rotation = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let transformed = rotation.transform_aabb(&aabb);

        // A 45 degree turn grows the X/Z extent to the diagonal.
        let expected = 2.0_f32.sqrt();
        assert!((transformed.x.max - expected).abs() < 0.001);
        assert!((transformed.z.min + expected).abs() < 0.001);
        assert!((transformed.y.max - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_transform_aabb_translation_and_empty() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let moved = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)).transform_aabb(&aabb);
        assert_eq!(moved.min(), Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(moved.max(), Vec3::new(6.0, 1.0, 1.0));

        let empty = Mat4::IDENTITY.transform_aabb(&Aabb::empty());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_row_major_layout() {
        let mat = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let rows = mat.to_row_major();
        assert_eq!(&rows[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(Mat4::from_row_major(&rows), mat);
    }
}
