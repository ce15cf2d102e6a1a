//! Unit cube for cubemap projection.
//!
//! Two attributes per vertex: the rasterised `position` and a `sampling`
//! direction used to look up the cube texture. Both start out identical;
//! only `sampling` is ever rewritten (see [`crate::face`]).

use crate::face::{apply_face_transforms, FaceTransformCodes};

pub const CUBE_FACE_COUNT: usize = 6;
pub const VERTICES_PER_FACE: usize = 6;
pub const CUBE_VERTEX_COUNT: usize = CUBE_FACE_COUNT * VERTICES_PER_FACE;

/// Two triangles per face, faces ordered right, left, top, bottom, back, front.
#[rustfmt::skip]
const CUBE_POSITIONS: [[f32; 3]; CUBE_VERTEX_COUNT] = [
    // right (+x)
    [ 1.0, -1.0, -1.0], [ 1.0, -1.0,  1.0], [ 1.0,  1.0,  1.0],
    [ 1.0,  1.0,  1.0], [ 1.0,  1.0, -1.0], [ 1.0, -1.0, -1.0],
    // left (-x)
    [-1.0, -1.0,  1.0], [-1.0, -1.0, -1.0], [-1.0,  1.0, -1.0],
    [-1.0,  1.0, -1.0], [-1.0,  1.0,  1.0], [-1.0, -1.0,  1.0],
    // top (+y)
    [-1.0,  1.0, -1.0], [ 1.0,  1.0, -1.0], [ 1.0,  1.0,  1.0],
    [ 1.0,  1.0,  1.0], [-1.0,  1.0,  1.0], [-1.0,  1.0, -1.0],
    // bottom (-y)
    [-1.0, -1.0, -1.0], [-1.0, -1.0,  1.0], [ 1.0, -1.0, -1.0],
    [ 1.0, -1.0, -1.0], [-1.0, -1.0,  1.0], [ 1.0, -1.0,  1.0],
    // back (+z)
    [-1.0, -1.0,  1.0], [-1.0,  1.0,  1.0], [ 1.0,  1.0,  1.0],
    [ 1.0,  1.0,  1.0], [ 1.0, -1.0,  1.0], [-1.0, -1.0,  1.0],
    // front (-z)
    [-1.0,  1.0, -1.0], [-1.0, -1.0, -1.0], [ 1.0, -1.0, -1.0],
    [ 1.0, -1.0, -1.0], [ 1.0,  1.0, -1.0], [-1.0,  1.0, -1.0],
];

/// Interleaved GPU vertex. Must match the cubemap WGSL vertex inputs.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CubeVertex {
    pub position: [f32; 3],
    pub sampling: [f32; 3],
}

#[derive(Debug, Clone)]
pub struct CubemapGeometry {
    positions: [[f32; 3]; CUBE_VERTEX_COUNT],
    sampling: [[f32; 3]; CUBE_VERTEX_COUNT],
    corrected: bool,
}

impl Default for CubemapGeometry {
    fn default() -> Self {
        Self::new()
    }
}

impl CubemapGeometry {
    /// Builds the fixed 36-vertex cube with `sampling == position`.
    pub fn new() -> Self {
        Self {
            positions: CUBE_POSITIONS,
            sampling: CUBE_POSITIONS,
            corrected: false,
        }
    }

    #[inline]
    pub fn positions(&self) -> &[[f32; 3]; CUBE_VERTEX_COUNT] {
        &self.positions
    }

    #[inline]
    pub fn sampling(&self) -> &[[f32; 3]; CUBE_VERTEX_COUNT] {
        &self.sampling
    }

    /// Whether face correction already ran on this instance.
    #[inline]
    pub fn is_corrected(&self) -> bool {
        self.corrected
    }

    /// Applies the face transforms to the sampling attribute, once.
    ///
    /// Returns `true` if this call changed the instance's state; later calls
    /// are no-ops and return `false`.
    pub fn correct_faces(&mut self, codes: &FaceTransformCodes) -> bool {
        if self.corrected {
            return false;
        }
        apply_face_transforms(&mut self.sampling, codes);
        self.corrected = true;
        true
    }

    /// Interleaves position and sampling for upload.
    pub fn vertices(&self) -> Vec<CubeVertex> {
        self.positions
            .iter()
            .zip(self.sampling.iter())
            .map(|(p, s)| CubeVertex {
                position: *p,
                sampling: *s,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::FaceTransformCodes;

    #[test]
    fn cube_has_six_axis_aligned_faces() {
        let cube = CubemapGeometry::new();
        // (axis, sign) of the face normal for right, left, top, bottom, back, front.
        let normals = [(0, 1.0), (0, -1.0), (1, 1.0), (1, -1.0), (2, 1.0), (2, -1.0)];
        for (face, (axis, sign)) in normals.iter().enumerate() {
            let verts = &cube.positions()[face * VERTICES_PER_FACE..(face + 1) * VERTICES_PER_FACE];
            assert!(verts.iter().all(|v| v[*axis] == *sign), "face {face}");
        }
    }

    #[test]
    fn sampling_starts_equal_to_position() {
        let cube = CubemapGeometry::new();
        assert_eq!(cube.positions(), cube.sampling());
        assert!(!cube.is_corrected());
    }

    #[test]
    fn correction_runs_only_once() {
        let mut cube = CubemapGeometry::new();
        let codes = FaceTransformCodes::from_raw([5, 0, 0, 0, 0, 0]).unwrap();

        assert!(cube.correct_faces(&codes));
        let after_first = *cube.sampling();
        assert!(!cube.correct_faces(&codes));
        assert_eq!(*cube.sampling(), after_first);
        assert_eq!(*cube.positions(), CUBE_POSITIONS);
    }

    #[test]
    fn interleaved_vertices_follow_both_attributes() {
        let mut cube = CubemapGeometry::new();
        cube.correct_faces(&FaceTransformCodes::from_raw([1, 0, 0, 0, 0, 0]).unwrap());
        let verts = cube.vertices();
        assert_eq!(verts.len(), CUBE_VERTEX_COUNT);
        for (i, v) in verts.iter().enumerate() {
            assert_eq!(v.position, cube.positions()[i]);
            assert_eq!(v.sampling, cube.sampling()[i]);
        }
        assert_eq!(std::mem::size_of::<CubeVertex>(), 24);
    }
}
