// SPDX-License-Identifier: CEPL-1.0
//! Scene content as a set of mesh variants; presence in the set means the GPU
//! resources exist.
use crate::context::Context;
use crate::descriptors::Descriptors;
use crate::error::Result;
use crate::resources::{upload_r8, GpuBuffer, GpuImage};
use ash::vk;
use prism_render::{mesh, MeshKind, TextAtlas, TexturedVertex, VertexFormat};
use std::collections::BTreeMap;
use tracing::debug;

pub struct VertexMesh {
    pub buffer: GpuBuffer,
    pub vertex_count: u32,
}

impl VertexMesh {
    unsafe fn upload(ctx: &Context, format: VertexFormat, verts: &[TexturedVertex]) -> Result<Self> {
        let bytes = format.pack(verts);
        let buffer = GpuBuffer::with_data(ctx, vk::BufferUsageFlags::VERTEX_BUFFER, &bytes)?;
        Ok(Self { buffer, vertex_count: verts.len() as u32 })
    }
}

pub enum GpuMesh {
    Triangle(VertexMesh),
    Cube(VertexMesh),
    Text { quad: VertexMesh, texture: GpuImage },
}

impl GpuMesh {
    pub fn kind(&self) -> MeshKind {
        match self {
            GpuMesh::Triangle(_) => MeshKind::Triangle,
            GpuMesh::Cube(_) => MeshKind::Cube,
            GpuMesh::Text { .. } => MeshKind::Text,
        }
    }

    pub fn vertices(&self) -> &VertexMesh {
        match self {
            GpuMesh::Triangle(m) | GpuMesh::Cube(m) => m,
            GpuMesh::Text { quad, .. } => quad,
        }
    }

    pub unsafe fn triangle(ctx: &Context, format: VertexFormat) -> Result<Self> {
        Ok(GpuMesh::Triangle(VertexMesh::upload(ctx, format, &mesh::TRIANGLE)?))
    }

    pub unsafe fn cube(ctx: &Context, format: VertexFormat) -> Result<Self> {
        Ok(GpuMesh::Cube(VertexMesh::upload(ctx, format, &mesh::cube())?))
    }

    /// Uploads the atlas, builds the quad and points binding 1 at the new texture.
    pub unsafe fn text(
        ctx: &Context,
        cmd_pool: vk::CommandPool,
        descriptors: &mut Descriptors,
        atlas: &TextAtlas,
    ) -> Result<Self> {
        let mut texture = GpuImage::sampled_r8(ctx, atlas.width, atlas.height)?;
        if let Err(e) = upload_r8(ctx, cmd_pool, &texture, &atlas.pixels) {
            texture.destroy(ctx);
            return Err(e);
        }
        let verts = mesh::text_quad(atlas.width, atlas.height, atlas.baseline_y);
        let quad = match VertexMesh::upload(ctx, VertexFormat::Textured, &verts) {
            Ok(q) => q,
            Err(e) => {
                texture.destroy(ctx);
                return Err(e);
            }
        };
        descriptors.bind_texture(&ctx.device, texture.view);
        debug!("vk: text atlas {}x{} uploaded", atlas.width, atlas.height);
        Ok(GpuMesh::Text { quad, texture })
    }

    /// The caller has already waited for the device to go idle.
    pub unsafe fn destroy(self, ctx: &Context, descriptors: &mut Descriptors) {
        match self {
            GpuMesh::Triangle(mut m) | GpuMesh::Cube(mut m) => m.buffer.destroy(ctx),
            GpuMesh::Text { mut quad, mut texture } => {
                // STRICT: no descriptor may point at the view once it is gone
                if descriptors.bound_view() == texture.view {
                    descriptors.bind_dummy(&ctx.device);
                }
                texture.destroy(ctx);
                quad.buffer.destroy(ctx);
            }
        }
    }
}

/// At most one mesh per kind, drawn in kind order.
pub struct MeshSet<M> {
    meshes: BTreeMap<MeshKind, M>,
}

impl<M> Default for MeshSet<M> {
    fn default() -> Self {
        Self { meshes: BTreeMap::new() }
    }
}

impl<M> MeshSet<M> {
    pub fn contains(&self, kind: MeshKind) -> bool {
        self.meshes.contains_key(&kind)
    }

    /// Returns the mesh back if its kind is already present.
    pub fn insert(&mut self, kind: MeshKind, mesh: M) -> std::result::Result<(), M> {
        if self.contains(kind) {
            return Err(mesh);
        }
        self.meshes.insert(kind, mesh);
        Ok(())
    }

    pub fn remove(&mut self, kind: MeshKind) -> Option<M> {
        self.meshes.remove(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = MeshKind> + '_ {
        self.meshes.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &M> {
        self.meshes.values()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (MeshKind, M)> {
        std::mem::take(&mut self.meshes).into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_mesh_per_kind() {
        let mut set = MeshSet::default();
        assert!(set.insert(MeshKind::Cube, "cube").is_ok());
        assert_eq!(set.insert(MeshKind::Cube, "again"), Err("again"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn toggling_twice_restores_the_set() {
        let mut set = MeshSet::default();
        set.insert(MeshKind::Triangle, 1).unwrap();
        let before: Vec<_> = set.kinds().collect();

        assert!(set.insert(MeshKind::Text, 3).is_ok());
        assert_eq!(set.remove(MeshKind::Text), Some(3));
        assert_eq!(set.kinds().collect::<Vec<_>>(), before);
        assert_eq!(set.remove(MeshKind::Text), None);
    }

    #[test]
    fn draw_order_follows_kind_not_insertion() {
        let mut set = MeshSet::default();
        set.insert(MeshKind::Text, 'x').unwrap();
        set.insert(MeshKind::Triangle, 't').unwrap();
        set.insert(MeshKind::Cube, 'c').unwrap();
        assert_eq!(set.iter().copied().collect::<String>(), "tcx");
        let drained: Vec<_> = set.drain().map(|(k, _)| k).collect();
        assert_eq!(drained, MeshKind::ALL.to_vec());
        assert!(set.is_empty());
    }
}
