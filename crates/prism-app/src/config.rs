// SPDX-License-Identifier: CEPL-1.0
use prism_render::MeshKind;
use prism_render_vk::RenderConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self { title: "prism".into(), width: 800, height: 600 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub prefer_mailbox: bool,
    pub validation: bool,
    pub vert_shader: PathBuf,
    pub frag_shader: PathBuf,
    pub font: PathBuf,
    pub text: String,
    pub font_px: f32,
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            clear_color: [0.5, 0.5, 0.5, 1.0],
            prefer_mailbox: true,
            validation: cfg!(debug_assertions),
            vert_shader: "vert.spv".into(),
            frag_shader: "frag.spv".into(),
            font: "FiraSans-Bold.ttf".into(),
            text: "Hello World".into(),
            font_px: 48.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CameraCfg {
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
    pub fov_deg: f32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self { move_speed: 2.5, mouse_sensitivity: 0.1, fov_deg: 45.0 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SceneCfg {
    pub initial_meshes: Vec<String>,
    pub rotation_deg_per_sec: f32,
}

impl Default for SceneCfg {
    fn default() -> Self {
        Self { initial_meshes: Vec::new(), rotation_deg_per_sec: 90.0 }
    }
}

impl SceneCfg {
    /// Known kinds in listed order, without repeats; unknown names are logged and skipped.
    pub fn initial_kinds(&self) -> Vec<MeshKind> {
        let mut kinds = Vec::new();
        for name in &self.initial_meshes {
            match name.parse::<MeshKind>() {
                Ok(k) if !kinds.contains(&k) => kinds.push(k),
                Ok(_) => {}
                Err(e) => warn!("config: {e}"),
            }
        }
        kinds
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub camera: CameraCfg,
    pub scene: SceneCfg,
}

impl AppCfg {
    /// Settings the Vulkan renderer needs, with file paths resolved against `base`.
    pub fn render_config(&self, base: &Path) -> RenderConfig {
        RenderConfig {
            clear_color: self.render.clear_color,
            prefer_mailbox: self.render.prefer_mailbox,
            validation: self.render.validation,
            fov_deg: self.camera.fov_deg,
            font_path: resolve(base, &self.render.font),
            text: self.render.text.clone(),
            font_px: self.render.font_px,
        }
    }

    pub fn shader_paths(&self, base: &Path) -> (PathBuf, PathBuf) {
        (resolve(base, &self.render.vert_shader), resolve(base, &self.render.frag_shader))
    }
}

pub fn resolve(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

pub fn parse_cfg(text: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(text)
}

/// A missing file means defaults; a malformed one too, with a warning.
pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => match parse_cfg(&s) {
            Ok(cfg) => {
                info!("config: loaded {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("config: {} is malformed, using defaults: {e}", path.display());
                AppCfg::default()
            }
        },
        Err(_) => AppCfg::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_cfg("").unwrap();
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.window.height, 600);
        assert_eq!(cfg.render.clear_color, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(cfg.render.vert_shader, PathBuf::from("vert.spv"));
        assert_eq!(cfg.render.font_px, 48.0);
        assert_eq!(cfg.camera.move_speed, 2.5);
        assert_eq!(cfg.camera.mouse_sensitivity, 0.1);
        assert_eq!(cfg.scene.rotation_deg_per_sec, 90.0);
        assert!(cfg.scene.initial_meshes.is_empty());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_cfg(
            r#"
            [window]
            title = "demo"

            [render]
            prefer_mailbox = false
            clear_color = [0.0, 0.0, 0.0, 1.0]

            [scene]
            initial_meshes = ["Cube", "text", "cube", "sphere"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "demo");
        assert_eq!(cfg.window.width, 800);
        assert!(!cfg.render.prefer_mailbox);
        assert_eq!(cfg.render.text, "Hello World");
        assert_eq!(cfg.scene.initial_kinds(), vec![MeshKind::Cube, MeshKind::Text]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(parse_cfg("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let cfg = AppCfg::default();
        let base = Path::new("/opt/prism");
        let (vert, frag) = cfg.shader_paths(base);
        assert_eq!(vert, PathBuf::from("/opt/prism/vert.spv"));
        assert_eq!(frag, PathBuf::from("/opt/prism/frag.spv"));
        assert_eq!(cfg.render_config(base).font_path, PathBuf::from("/opt/prism/FiraSans-Bold.ttf"));
        assert_eq!(resolve(base, Path::new("/abs/x.spv")), PathBuf::from("/abs/x.spv"));
    }
}
