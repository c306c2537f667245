use std::{env, fs, path::PathBuf};

// (source, kind, output name). The textured pair is the default pipeline.
const SHADERS: &[(&str, shaderc::ShaderKind, &str)] = &[
    ("shaders/textured.vert", shaderc::ShaderKind::Vertex, "textured.vert.spv"),
    ("shaders/textured.frag", shaderc::ShaderKind::Fragment, "textured.frag.spv"),
    ("shaders/colored.vert", shaderc::ShaderKind::Vertex, "colored.vert.spv"),
    ("shaders/colored.frag", shaderc::ShaderKind::Fragment, "colored.frag.spv"),
    ("shaders/fixtures/int_input.vert", shaderc::ShaderKind::Vertex, "int_input.vert.spv"),
    ("shaders/fixtures/shuffled.vert", shaderc::ShaderKind::Vertex, "shuffled.vert.spv"),
];

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for &(src_path, kind, name) in SHADERS {
        println!("cargo:rerun-if-changed={src_path}");
        let src = fs::read_to_string(src_path).unwrap();
        let spv = comp
            .compile_into_spirv(&src, kind, src_path, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("{src_path}: {e}"));
        fs::write(out.join(name), spv.as_binary_u8()).unwrap();
    }

    // The app loads vert.spv/frag.spv from its own directory:
    // OUT_DIR is target/<profile>/build/<pkg>-<hash>/out.
    if let Some(profile_dir) = out.ancestors().nth(3) {
        for (from, to) in [("textured.vert.spv", "vert.spv"), ("textured.frag.spv", "frag.spv")] {
            if let Err(e) = fs::copy(out.join(from), profile_dir.join(to)) {
                println!("cargo:warning=could not place {to}: {e}");
            }
        }
    }

    println!("cargo:rerun-if-changed=build.rs");
}
