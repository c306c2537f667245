// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::fmt;
use std::str::FromStr;

/// The meshes a scene can contain. Each kind exists at most once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeshKind {
    Triangle,
    Cube,
    Text,
}

impl MeshKind {
    pub const ALL: [MeshKind; 3] = [MeshKind::Triangle, MeshKind::Cube, MeshKind::Text];

    pub fn name(self) -> &'static str {
        match self {
            MeshKind::Triangle => "triangle",
            MeshKind::Cube => "cube",
            MeshKind::Text => "text",
        }
    }
}

impl fmt::Display for MeshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MeshKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MeshKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown mesh kind {s:?} (expected triangle, cube or text)"))
    }
}

/// `tex_flag` below zero means "use the vertex color".
pub const NO_TEXTURE: f32 = -1.0;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
    pub tex_flag: f32,
}

impl TexturedVertex {
    const fn colored(pos: [f32; 3], color: [f32; 3]) -> Self {
        Self { pos, color, uv: [0.0, 0.0], tex_flag: NO_TEXTURE }
    }
}

/// Per-vertex layout a pipeline consumes, identified by its reflected stride.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexFormat {
    /// `{pos: vec3, color: vec3}`
    Colored,
    /// `{pos: vec3, color: vec3, uv: vec2, tex_flag: f32}`
    Textured,
}

impl VertexFormat {
    pub fn from_stride(stride: u32) -> Option<Self> {
        match stride as usize {
            s if s == std::mem::size_of::<ColorVertex>() => Some(VertexFormat::Colored),
            s if s == std::mem::size_of::<TexturedVertex>() => Some(VertexFormat::Textured),
            _ => None,
        }
    }

    pub fn stride(self) -> u32 {
        match self {
            VertexFormat::Colored => std::mem::size_of::<ColorVertex>() as u32,
            VertexFormat::Textured => std::mem::size_of::<TexturedVertex>() as u32,
        }
    }

    pub fn supports_textures(self) -> bool {
        matches!(self, VertexFormat::Textured)
    }

    /// Serialises vertices into this format's byte layout.
    pub fn pack(self, verts: &[TexturedVertex]) -> Vec<u8> {
        match self {
            VertexFormat::Textured => bytemuck::cast_slice(verts).to_vec(),
            VertexFormat::Colored => {
                let slim: Vec<ColorVertex> = verts
                    .iter()
                    .map(|v| ColorVertex { pos: v.pos, color: v.color })
                    .collect();
                bytemuck::cast_slice(&slim).to_vec()
            }
        }
    }
}

pub const TRIANGLE: [TexturedVertex; 3] = [
    TexturedVertex::colored([0.0, -0.5, 0.0], [1.0, 0.0, 0.0]),
    TexturedVertex::colored([-0.5, 0.5, 0.0], [0.0, 1.0, 0.0]),
    TexturedVertex::colored([0.5, 0.5, 0.0], [0.0, 0.0, 1.0]),
];

/// Unit cube centred on the origin, one flat color per face. Every triangle is
/// clockwise when seen from outside the cube.
pub fn cube() -> Vec<TexturedVertex> {
    // (outward normal, right, up, color); right x up == normal
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y, [1.0, 0.0, 0.0]),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y, [0.0, 1.0, 0.0]),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y, [0.0, 0.0, 1.0]),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y, [1.0, 1.0, 0.0]),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z, [1.0, 0.0, 1.0]),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z, [0.0, 1.0, 1.0]),
    ];

    let mut out = Vec::with_capacity(36);
    for (normal, right, up, color) in faces {
        let c = normal * 0.5;
        let tl = c - right * 0.5 + up * 0.5;
        let tr = c + right * 0.5 + up * 0.5;
        let br = c + right * 0.5 - up * 0.5;
        let bl = c - right * 0.5 - up * 0.5;
        for p in [tl, tr, br, tl, br, bl] {
            out.push(TexturedVertex::colored(p.to_array(), color));
        }
    }
    out
}

/// Textured quad showing a text atlas. The bottom edge samples the baseline row,
/// so descender space below it stays out of view.
pub fn text_quad(atlas_w: u32, atlas_h: u32, baseline_y: u32) -> [TexturedVertex; 6] {
    const HEIGHT: f32 = 0.5;
    let visible_rows = baseline_y.max(1) as f32;
    let half_w = HEIGHT * atlas_w as f32 / visible_rows * 0.5;
    let half_h = HEIGHT * 0.5;
    let v_bottom = baseline_y as f32 / atlas_h.max(1) as f32;

    let vert = |x: f32, y: f32, u: f32, v: f32| TexturedVertex {
        pos: [x, y, 0.0],
        color: [1.0, 1.0, 1.0],
        uv: [u, v],
        tex_flag: 1.0,
    };
    let tl = vert(-half_w, half_h, 0.0, 0.0);
    let tr = vert(half_w, half_h, 1.0, 0.0);
    let br = vert(half_w, -half_h, 1.0, v_bottom);
    let bl = vert(-half_w, -half_h, 0.0, v_bottom);
    [tl, tr, br, tl, br, bl]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_clockwise_from(normal: Vec3, tri: &[TexturedVertex]) -> bool {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|v| Vec3::from_array(v.pos));
        (b - a).cross(c - a).dot(normal) < 0.0
    }

    #[test]
    fn triangle_matches_reference_colors_and_positions() {
        assert_eq!(TRIANGLE[0].pos, [0.0, -0.5, 0.0]);
        assert_eq!(TRIANGLE[0].color, [1.0, 0.0, 0.0]);
        assert_eq!(TRIANGLE[1].pos, [-0.5, 0.5, 0.0]);
        assert_eq!(TRIANGLE[1].color, [0.0, 1.0, 0.0]);
        assert_eq!(TRIANGLE[2].pos, [0.5, 0.5, 0.0]);
        assert_eq!(TRIANGLE[2].color, [0.0, 0.0, 1.0]);
        assert!(TRIANGLE.iter().all(|v| v.tex_flag < 0.0));
    }

    #[test]
    fn triangle_faces_the_camera_clockwise() {
        assert!(is_clockwise_from(Vec3::Z, &TRIANGLE));
    }

    #[test]
    fn cube_triangles_are_clockwise_from_outside() {
        let verts = cube();
        assert_eq!(verts.len(), 36);
        for tri in verts.chunks(3) {
            let centroid = tri
                .iter()
                .map(|v| Vec3::from_array(v.pos))
                .fold(Vec3::ZERO, |acc, p| acc + p)
                / 3.0;
            assert!(is_clockwise_from(centroid.normalize(), tri), "{tri:?}");
        }
    }

    #[test]
    fn cube_stays_within_unit_bounds() {
        for v in cube() {
            assert!(v.pos.iter().all(|c| c.abs() <= 0.5 + f32::EPSILON));
        }
    }

    #[test]
    fn text_quad_uvs_stop_at_baseline() {
        let q = text_quad(200, 60, 45);
        let vs: Vec<f32> = q.iter().map(|v| v.uv[1]).collect();
        assert!(vs.iter().all(|&v| v == 0.0 || v == 0.75));
        assert_eq!(q[0].uv, [0.0, 0.0]);
        assert_eq!(q[2].uv, [1.0, 0.75]);
        assert!(q.iter().all(|v| v.tex_flag > 0.0));
        assert!(is_clockwise_from(Vec3::Z, &q[..3]));
        assert!(is_clockwise_from(Vec3::Z, &q[3..]));
    }

    #[test]
    fn stride_selects_format() {
        assert_eq!(VertexFormat::from_stride(24), Some(VertexFormat::Colored));
        assert_eq!(VertexFormat::from_stride(36), Some(VertexFormat::Textured));
        assert_eq!(VertexFormat::from_stride(12), None);
    }

    #[test]
    fn colored_packing_drops_texture_fields() {
        let bytes = VertexFormat::Colored.pack(&TRIANGLE);
        assert_eq!(bytes.len(), 3 * 24);
        let verts: Vec<ColorVertex> = bytemuck::pod_collect_to_vec(&bytes);
        assert_eq!(verts[1].pos, TRIANGLE[1].pos);
        assert_eq!(verts[1].color, TRIANGLE[1].color);
        assert_eq!(VertexFormat::Textured.pack(&TRIANGLE).len(), 3 * 36);
    }

    #[test]
    fn mesh_kind_parses_case_insensitively() {
        assert_eq!("Cube".parse::<MeshKind>(), Ok(MeshKind::Cube));
        assert_eq!("text".parse::<MeshKind>(), Ok(MeshKind::Text));
        assert!("sphere".parse::<MeshKind>().is_err());
    }
}
