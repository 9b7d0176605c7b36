//! Math types shared by the scene-description and native sides.
//!
//! Re-exports glam and adds the few helpers the translators need:
//! time windows ([`Interval`]), bounds ([`Aabb`]) and matrix utilities ([`Mat4Ext`]).

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use transform::Mat4Ext;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_creation() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_mat4_column_major_composition() {
        // Parent * child applies the child transform first.
        let parent = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let child = Mat4::from_scale(Vec3::splat(2.0));
        let p = (parent * child).transform_point3(Vec3::X);
        assert_eq!(p, Vec3::new(12.0, 0.0, 0.0));
    }
}
