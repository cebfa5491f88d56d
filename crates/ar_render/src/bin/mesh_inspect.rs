//! Mesh inspector
//!
//! Loads a mesh file with a material preset, renders one headless frame and
//! prints what the renderer built and what it asked of the device.
//!
//! Usage: `mesh_inspect <resource dir> <mesh path> [preset] [config.toml|config.ron]`
//!
//! `<mesh path>` is resolved inside `<resource dir>`, e.g. `/models/chair.obj`.
//! Presets: `pbr` (default), `unlit`, `scan`, `depth`, `occluder`.

use std::env;
use std::process::ExitCode;

use ar_render::foundation::logging;
use ar_render::prelude::*;
use ar_render::render::backend::BackendCall;

fn parse_preset(name: &str) -> Option<MaterialPreset> {
    match name {
        "pbr" => Some(MaterialPreset::Pbr),
        "unlit" => Some(MaterialPreset::Unlit),
        "scan" => Some(MaterialPreset::Scan),
        "depth" => Some(MaterialPreset::DepthMask),
        "occluder" => Some(MaterialPreset::Occluder),
        _ => None,
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let (resource_dir, mesh_path) = match args {
        [_, dir, mesh, ..] => (dir.as_str(), mesh.as_str()),
        _ => return Err("usage: mesh_inspect <resource dir> <mesh path> [preset] [config]".into()),
    };
    let preset_name = args.get(3).map_or("pbr", String::as_str);
    let preset = parse_preset(preset_name).ok_or_else(|| format!("unknown preset {preset_name}"))?;

    let config = match args.get(4) {
        Some(path) => RendererConfig::load_from_file(path)?,
        None => RendererConfig::default(),
    };
    logging::init_with_level(&config.log_level);

    let source = FileSystemSource::with_root(resource_dir);
    let mut renderer = Renderer::new(HeadlessBackend::new(), source, config)?;

    let id = renderer.create_mesh(mesh_path, preset, &MeshLoadOptions::default())?;
    renderer.add_mesh(id);

    renderer.begin_frame();
    renderer.render_meshes();
    renderer.end_frame();

    if let Some(mesh) = renderer.mesh(id) {
        println!("{mesh_path}: {} submeshes", mesh.submeshes().len());
        for (index, submesh) in mesh.submeshes().iter().enumerate() {
            let material = submesh.material();
            println!(
                "  [{index}] {:>6} vertices  material {:<16} {}",
                submesh.vertex_count(),
                material.and_then(Material::name).unwrap_or("-"),
                if submesh.is_translucent() { "translucent" } else { "opaque" }
            );
        }
    }

    let backend = renderer.backend();
    let uploads = backend.count_calls(|call| matches!(call, BackendCall::UploadTexture2d { .. }));
    println!(
        "programs {}  textures {} ({} uploads)  buffers {}  draws {}",
        renderer.resources().program_count(),
        renderer.resources().texture_count(),
        uploads,
        backend.live_buffer_count(),
        backend.draw_count()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mesh_inspect: {e}");
            ExitCode::FAILURE
        }
    }
}
