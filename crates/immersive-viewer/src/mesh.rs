//! Projection mesh lifecycle: CPU-only `UnboundMesh`, GPU-backed `BoundMesh`.

use crate::backend::{MeshHandle, RenderBackend, TextureHandle};
use crate::engine::ProjectionFormat;
use crate::ViewerError;
use log::debug;
use projmesh::{build_equirect, CubemapGeometry, EquirectParams, FaceTransformCodes, Geometry};

/// Fully built vertex data, not yet attached to the GPU.
#[derive(Debug, Clone)]
pub struct UnboundMesh {
    geometry: Geometry,
}

impl UnboundMesh {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry }
    }

    pub fn equirect(params: &EquirectParams) -> crate::Result<Self> {
        Ok(Self::new(Geometry::Equirect(build_equirect(params)?)))
    }

    pub fn cubemap() -> Self {
        Self::new(Geometry::Cubemap(CubemapGeometry::new()))
    }

    /// Picks the mesh for the stream's projection format. `params` only
    /// applies to equirect streams.
    pub fn for_format(format: ProjectionFormat, params: &EquirectParams) -> crate::Result<Self> {
        match format {
            ProjectionFormat::Equirect => Self::equirect(params),
            ProjectionFormat::Cubemap => Ok(Self::cubemap()),
        }
    }

    #[inline]
    pub fn kind(&self) -> ProjectionFormat {
        self.geometry.kind()
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Uploads the mesh and samples it from `texture`.
    ///
    /// On failure the mesh is handed back untouched together with the error.
    pub fn bind<B: RenderBackend + ?Sized>(
        self,
        backend: &mut B,
        texture: TextureHandle,
    ) -> Result<BoundMesh, (UnboundMesh, ViewerError)> {
        match backend.upload_mesh(&self.geometry, texture) {
            Ok(handle) => {
                debug!(
                    "Bound {:?} mesh ({} vertices) as {:?}.",
                    self.kind(),
                    self.geometry.vertex_count(),
                    handle
                );
                Ok(BoundMesh {
                    geometry: self.geometry,
                    handle,
                    texture,
                })
            }
            Err(err) => Err((self, err)),
        }
    }
}

/// Mesh with GPU resources attached.
#[derive(Debug)]
pub struct BoundMesh {
    geometry: Geometry,
    handle: MeshHandle,
    texture: TextureHandle,
}

impl BoundMesh {
    #[inline]
    pub fn kind(&self) -> ProjectionFormat {
        self.geometry.kind()
    }

    #[inline]
    pub fn handle(&self) -> MeshHandle {
        self.handle
    }

    #[inline]
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// True for a cubemap whose faces have not been corrected yet.
    pub fn needs_face_correction(&self) -> bool {
        matches!(&self.geometry, Geometry::Cubemap(cube) if !cube.is_corrected())
    }

    /// Corrects the cube faces and re-uploads the sampling attribute.
    ///
    /// Runs at most once per mesh; returns whether this call applied it.
    pub fn correct_faces<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        codes: &FaceTransformCodes,
    ) -> bool {
        let Geometry::Cubemap(cube) = &mut self.geometry else {
            return false;
        };
        if !cube.correct_faces(codes) {
            return false;
        }
        backend.update_sampling(self.handle, cube);
        true
    }

    /// Destroys the GPU resources and returns the CPU data.
    pub fn release<B: RenderBackend + ?Sized>(self, backend: &mut B) -> Geometry {
        backend.destroy_mesh(self.handle);
        self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DrawParams, TextureKind};
    use crate::surfaces::DecodedImage;

    #[derive(Default)]
    struct MeshLog {
        fail_uploads: bool,
        uploads: u32,
        sampling_updates: u32,
        destroyed: Vec<MeshHandle>,
    }

    impl RenderBackend for MeshLog {
        fn create_texture(&mut self, _: TextureKind, _: u32, _: u32, _: &str) -> TextureHandle {
            TextureHandle::from_raw(0)
        }
        fn resize_texture(&mut self, _: TextureHandle, _: TextureKind, _: u32, _: u32) {}
        fn write_texture(&mut self, _: TextureHandle, _: u32, _: &DecodedImage) {}
        fn destroy_texture(&mut self, _: TextureHandle) {}
        fn upload_mesh(&mut self, _: &Geometry, _: TextureHandle) -> crate::Result<MeshHandle> {
            if self.fail_uploads {
                return Err(ViewerError::Gpu("out of memory".into()));
            }
            self.uploads += 1;
            Ok(MeshHandle::from_raw(self.uploads))
        }
        fn update_sampling(&mut self, _: MeshHandle, _: &CubemapGeometry) {
            self.sampling_updates += 1;
        }
        fn destroy_mesh(&mut self, mesh: MeshHandle) {
            self.destroyed.push(mesh);
        }
        fn draw_mesh(&mut self, _: MeshHandle, _: &DrawParams) {}
        fn take_error(&mut self) -> Option<String> {
            None
        }
    }

    #[test]
    fn format_selects_geometry() {
        let params = EquirectParams::default();
        let eq = UnboundMesh::for_format(ProjectionFormat::Equirect, &params).unwrap();
        assert_eq!(eq.kind(), ProjectionFormat::Equirect);
        assert_eq!(eq.geometry().vertex_count(), params.vertex_count());

        let cube = UnboundMesh::for_format(ProjectionFormat::Cubemap, &params).unwrap();
        assert_eq!(cube.kind(), ProjectionFormat::Cubemap);
    }

    #[test]
    fn invalid_params_fail_construction() {
        let bad = EquirectParams {
            latitudes: 0,
            ..EquirectParams::default()
        };
        assert!(matches!(
            UnboundMesh::equirect(&bad),
            Err(ViewerError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn failed_bind_hands_the_mesh_back() {
        let mut backend = MeshLog {
            fail_uploads: true,
            ..Default::default()
        };
        let (mesh, err) = UnboundMesh::cubemap()
            .bind(&mut backend, TextureHandle::from_raw(3))
            .unwrap_err();
        assert_eq!(mesh.kind(), ProjectionFormat::Cubemap);
        assert!(matches!(err, ViewerError::Gpu(_)));

        backend.fail_uploads = false;
        let bound = mesh.bind(&mut backend, TextureHandle::from_raw(3)).unwrap();
        assert_eq!(bound.texture(), TextureHandle::from_raw(3));
    }

    #[test]
    fn face_correction_uploads_once() {
        let mut backend = MeshLog::default();
        let mut bound = UnboundMesh::cubemap()
            .bind(&mut backend, TextureHandle::from_raw(1))
            .unwrap();
        let codes = FaceTransformCodes::from_raw([2, 0, 0, 0, 0, 0]).unwrap();

        assert!(bound.needs_face_correction());
        assert!(bound.correct_faces(&mut backend, &codes));
        assert!(!bound.correct_faces(&mut backend, &codes));
        assert!(!bound.needs_face_correction());
        assert_eq!(backend.sampling_updates, 1);

        let handle = bound.handle();
        bound.release(&mut backend);
        assert_eq!(backend.destroyed, vec![handle]);
    }

    #[test]
    fn equirect_meshes_ignore_face_codes() {
        let mut backend = MeshLog::default();
        let mut bound = UnboundMesh::equirect(&EquirectParams::default())
            .unwrap()
            .bind(&mut backend, TextureHandle::from_raw(1))
            .unwrap();
        let codes = FaceTransformCodes::from_raw([1; 6]).unwrap();
        assert!(!bound.needs_face_correction());
        assert!(!bound.correct_faces(&mut backend, &codes));
        assert_eq!(backend.sampling_updates, 0);
    }
}
