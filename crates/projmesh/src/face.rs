//! Cube face transform codes and sampling-direction correction.
//!
//! An encoder may mirror and/or rotate a cube face before packing it into the
//! transmitted frame. The stream signals one of eight codes per face; the
//! client undoes the packing by rewriting where each face *samples* the cube
//! texture. Positions are left alone, so the rasterised cube never changes.
//!
//! The correction mutates the buffer in place and is not self-inverse:
//! callers must apply it at most once per buffer.

use crate::cubemap::{CUBE_VERTEX_COUNT, VERTICES_PER_FACE};
use crate::GeometryError;
use std::f64::consts::{FRAC_PI_2, PI};

/// Packing transform signalled for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FaceTransform {
    #[default]
    Identity = 0,
    MirrorHorizontal = 1,
    Rotate180 = 2,
    Rotate180AfterMirror = 3,
    Rotate90BeforeMirror = 4,
    Rotate90 = 5,
    Rotate270BeforeMirror = 6,
    Rotate270 = 7,
}

impl TryFrom<i32> for FaceTransform {
    type Error = GeometryError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => FaceTransform::Identity,
            1 => FaceTransform::MirrorHorizontal,
            2 => FaceTransform::Rotate180,
            3 => FaceTransform::Rotate180AfterMirror,
            4 => FaceTransform::Rotate90BeforeMirror,
            5 => FaceTransform::Rotate90,
            6 => FaceTransform::Rotate270BeforeMirror,
            7 => FaceTransform::Rotate270,
            other => return Err(GeometryError::UnknownTransformCode(other)),
        })
    }
}

impl FaceTransform {
    /// Anticlockwise rotation in quarter turns, `None` for identity and pure mirror.
    pub fn quarter_turns(self) -> Option<u8> {
        match self {
            FaceTransform::Identity | FaceTransform::MirrorHorizontal => None,
            FaceTransform::Rotate90 | FaceTransform::Rotate90BeforeMirror => Some(1),
            FaceTransform::Rotate180 | FaceTransform::Rotate180AfterMirror => Some(2),
            FaceTransform::Rotate270 | FaceTransform::Rotate270BeforeMirror => Some(3),
        }
    }

    #[inline]
    fn mirrors_before_rotation(self) -> bool {
        self == FaceTransform::Rotate180AfterMirror
    }

    #[inline]
    fn mirrors_after_rotation(self) -> bool {
        matches!(
            self,
            FaceTransform::Rotate90BeforeMirror | FaceTransform::Rotate270BeforeMirror
        )
    }
}

/// Cube faces in the order they appear in the cube vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum CubeFace {
    Right = 0,
    Left = 1,
    Top = 2,
    Bottom = 3,
    Back = 4,
    Front = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Right,
        CubeFace::Left,
        CubeFace::Top,
        CubeFace::Bottom,
        CubeFace::Back,
        CubeFace::Front,
    ];

    /// The two coordinate axes that vary across this face, in rotation order.
    #[inline]
    pub fn tangent_axes(self) -> (usize, usize) {
        match self {
            CubeFace::Right | CubeFace::Left => (1, 2),
            CubeFace::Top | CubeFace::Bottom => (0, 2),
            CubeFace::Back | CubeFace::Front => (0, 1),
        }
    }

    /// Axis negated by a horizontal mirror on this face.
    #[inline]
    pub fn mirror_axis(self) -> usize {
        match self {
            CubeFace::Right | CubeFace::Left => 2,
            CubeFace::Top | CubeFace::Bottom | CubeFace::Back | CubeFace::Front => 0,
        }
    }

    /// Right, bottom and back take the signalled angle as is; the opposing
    /// faces use `360° - angle` so rotation sense stays consistent.
    #[inline]
    fn uses_signalled_angle(self) -> bool {
        matches!(self, CubeFace::Right | CubeFace::Bottom | CubeFace::Back)
    }

    /// Correction angle in radians for `transform` on this face.
    fn rotation_angle(self, transform: FaceTransform) -> Option<f64> {
        let turns = transform.quarter_turns()?;
        let turns = if self.uses_signalled_angle() {
            turns
        } else {
            (4 - turns) % 4
        };
        Some(match turns {
            1 => FRAC_PI_2,
            2 => PI,
            3 => 3.0 * FRAC_PI_2,
            _ => 0.0,
        })
    }
}

/// One transform code per cube face, indexed by [`CubeFace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaceTransformCodes([FaceTransform; 6]);

impl FaceTransformCodes {
    pub const IDENTITY: FaceTransformCodes = FaceTransformCodes([FaceTransform::Identity; 6]);

    #[inline]
    pub fn new(codes: [FaceTransform; 6]) -> Self {
        Self(codes)
    }

    /// Parses the raw integer codes reported by the stream.
    pub fn from_raw(raw: [i32; 6]) -> Result<Self, GeometryError> {
        let mut codes = [FaceTransform::Identity; 6];
        for (slot, code) in codes.iter_mut().zip(raw) {
            *slot = FaceTransform::try_from(code)?;
        }
        Ok(Self(codes))
    }

    #[inline]
    pub fn get(&self, face: CubeFace) -> FaceTransform {
        self.0[face as usize]
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().all(|t| *t == FaceTransform::Identity)
    }
}

/// Rewrites the sampling directions of every face whose code is not identity.
///
/// `sampling` is the cube's second attribute in the fixed face order of
/// [`CubeFace::ALL`], six vertices per face.
pub fn apply_face_transforms(
    sampling: &mut [[f32; 3]; CUBE_VERTEX_COUNT],
    codes: &FaceTransformCodes,
) {
    if codes.is_identity() {
        return;
    }

    for face in CubeFace::ALL {
        let transform = codes.get(face);
        if transform == FaceTransform::Identity {
            continue;
        }

        let start = face as usize * VERTICES_PER_FACE;
        for vertex in &mut sampling[start..start + VERTICES_PER_FACE] {
            correct_vertex(vertex, face, transform);
        }
    }
}

fn correct_vertex(v: &mut [f32; 3], face: CubeFace, transform: FaceTransform) {
    let mirror = face.mirror_axis();

    if transform == FaceTransform::MirrorHorizontal {
        v[mirror] = -v[mirror];
        return;
    }

    if transform.mirrors_before_rotation() {
        v[mirror] = -v[mirror];
    }

    if let Some(angle) = face.rotation_angle(transform) {
        let (a, b) = face.tangent_axes();
        let (sin, cos) = angle.sin_cos();
        let (pa, pb) = (v[a] as f64, v[b] as f64);
        v[a] = (pa * cos - pb * sin) as f32;
        v[b] = (pa * sin + pb * cos) as f32;
    }

    if transform.mirrors_after_rotation() {
        v[mirror] = -v[mirror];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubemap::CubemapGeometry;

    const EPS: f32 = 1e-6;

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < EPS)
    }

    fn face_range(face: CubeFace) -> std::ops::Range<usize> {
        let s = face as usize * VERTICES_PER_FACE;
        s..s + VERTICES_PER_FACE
    }

    #[test]
    fn identity_codes_leave_buffer_bit_identical() {
        let cube = CubemapGeometry::new();
        let mut sampling = *cube.positions();
        apply_face_transforms(&mut sampling, &FaceTransformCodes::IDENTITY);
        for (s, p) in sampling.iter().zip(cube.positions()) {
            for k in 0..3 {
                assert_eq!(s[k].to_bits(), p[k].to_bits());
            }
        }
    }

    #[test]
    fn right_face_rotate_180_negates_tangent_plane() {
        let cube = CubemapGeometry::new();
        let mut sampling = *cube.positions();
        let codes = FaceTransformCodes::from_raw([2, 0, 0, 0, 0, 0]).unwrap();
        apply_face_transforms(&mut sampling, &codes);

        for i in face_range(CubeFace::Right) {
            let [x, y, z] = cube.positions()[i];
            assert!(close(sampling[i], [x, -y, -z]), "vertex {i}: {:?}", sampling[i]);
        }
        for i in VERTICES_PER_FACE..CUBE_VERTEX_COUNT {
            assert_eq!(sampling[i], cube.positions()[i]);
        }
    }

    #[test]
    fn mirror_negates_face_specific_axis() {
        let cube = CubemapGeometry::new();
        let mut sampling = *cube.positions();
        let codes = FaceTransformCodes::from_raw([1, 1, 1, 0, 0, 1]).unwrap();
        apply_face_transforms(&mut sampling, &codes);

        for i in face_range(CubeFace::Left) {
            let [x, y, z] = cube.positions()[i];
            assert_eq!(sampling[i], [x, y, -z]);
        }
        for i in face_range(CubeFace::Top) {
            let [x, y, z] = cube.positions()[i];
            assert_eq!(sampling[i], [-x, y, z]);
        }
        for i in face_range(CubeFace::Front) {
            let [x, y, z] = cube.positions()[i];
            assert_eq!(sampling[i], [-x, y, z]);
        }
    }

    #[test]
    fn opposing_faces_rotate_in_opposite_sense() {
        let cube = CubemapGeometry::new();
        let mut sampling = *cube.positions();
        // 90° on the right face (signalled angle) and on the left face (270°).
        let codes = FaceTransformCodes::from_raw([5, 5, 0, 0, 0, 0]).unwrap();
        apply_face_transforms(&mut sampling, &codes);

        for i in face_range(CubeFace::Right) {
            let [x, y, z] = cube.positions()[i];
            assert!(close(sampling[i], [x, -z, y]));
        }
        for i in face_range(CubeFace::Left) {
            let [x, y, z] = cube.positions()[i];
            assert!(close(sampling[i], [x, z, -y]));
        }
    }

    #[test]
    fn rotate_before_mirror_flips_after_rotating() {
        let cube = CubemapGeometry::new();
        let mut sampling = *cube.positions();
        let codes = FaceTransformCodes::from_raw([0, 0, 0, 0, 4, 0]).unwrap();
        apply_face_transforms(&mut sampling, &codes);

        // Back face: tangent (x, y), 90° signalled angle, then x mirrored.
        for i in face_range(CubeFace::Back) {
            let [x, y, z] = cube.positions()[i];
            assert!(close(sampling[i], [y, x, z]), "{:?}", sampling[i]);
        }
    }

    #[test]
    fn rotate_180_after_mirror_mirrors_first() {
        let cube = CubemapGeometry::new();
        let mut sampling = *cube.positions();
        let codes = FaceTransformCodes::from_raw([0, 0, 0, 3, 0, 0]).unwrap();
        apply_face_transforms(&mut sampling, &codes);

        // Bottom face: mirror x, then rotate (x, z) by 180° => (x, y, -z).
        for i in face_range(CubeFace::Bottom) {
            let [x, y, z] = cube.positions()[i];
            assert!(close(sampling[i], [x, y, -z]));
        }
    }

    #[test]
    fn applying_twice_differs_from_once() {
        let cube = CubemapGeometry::new();
        let codes = FaceTransformCodes::from_raw([2, 5, 0, 0, 0, 0]).unwrap();

        let mut once = *cube.positions();
        apply_face_transforms(&mut once, &codes);
        let mut twice = once;
        apply_face_transforms(&mut twice, &codes);

        let differs = once
            .iter()
            .zip(twice.iter())
            .any(|(a, b)| !close(*a, *b));
        assert!(differs);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(
            FaceTransformCodes::from_raw([0, 0, 8, 0, 0, 0]),
            Err(GeometryError::UnknownTransformCode(8))
        );
        assert!(FaceTransform::try_from(-1).is_err());
    }
}
