//! End-to-end tests: mesh text in, recorded backend calls out

use approx::assert_relative_eq;

use crate::assets::{ImageData, MemorySource, ParseError};
use crate::core::{RendererConfig, ShaderPair};
use crate::foundation::math::{Mat4, Vec3};
use crate::render::backend::{BackendCall, GraphicsBackend, HeadlessBackend, PassState};
use crate::render::builtins::BuiltinUniform;
use crate::render::material::{MaterialParam, SH_COEFFICIENT_COUNT};
use crate::render::presets::{MaterialPreset, MeshLoadOptions};
use crate::render::renderer::Renderer;
use crate::render::RenderError;

const PBR_VERT: &str = "\
attribute vec3 a_position;
attribute vec2 a_texcoord;
attribute vec3 a_normal;
uniform mat4 matWorld;
uniform mat4 matWVP;
void main() { gl_Position = matWVP * vec4(a_position, 1.0); }
";

const PBR_FRAG: &str = "\
precision mediump float;
uniform sampler2D baseMap;
uniform sampler2D rmaMap;
#ifdef USE_NORMAL_MAP
uniform sampler2D normalMap;
#endif
#ifdef USE_EMISSIVE_MAP
uniform sampler2D emissiveMap;
#endif
uniform sampler2D iblBrdfLutMap;
uniform vec3 shCoeffs[9];
void main() {}
";

const BASIC_VERT: &str = "\
attribute vec3 a_position;
attribute vec2 a_texcoord;
uniform mat4 matWVP;
void main() {}
";

const BASIC_FRAG: &str = "\
uniform sampler2D baseMap;
void main() {}
";

const CHAIR: &str = "\
# two materials sharing positions
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
usemtl Wood
f 1/1/1 2/2/1 3/3/1
usemtl Glass
f 2/2/1 4/1/1 3/3/1
";

const BOX: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
f 1/1 2/2 3/3
";

const OPAQUE: [u8; 4] = [200, 200, 200, 255];
const GLASS: [u8; 4] = [200, 200, 255, 100];

const WOOD_BASE: &str = "/models/chair_Wood_Base.png";

fn source() -> MemorySource {
    let texture = |rgba| ImageData::solid_color(2, 2, rgba);
    let mut source = MemorySource::new()
        .with_text("/shaders/pbr_kh.vert", PBR_VERT)
        .with_text("/shaders/pbr_kh.frag", PBR_FRAG)
        .with_text("/models/chair.obj", CHAIR)
        .with_text("/models/box.obj", BOX)
        .with_text("/models/box.mtl", "# exported\nnewmtl Crate\nKd 1 1 1\n")
        .with_text("/models/bare.obj", BOX)
        .with_text("/models/scan.obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Skin\nf 1 2 3\n")
        .with_text("/models/bad.obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\nusemtl A\nf 1 -2 3\n")
        .with_text("/models/empty.obj", "\n  \n")
        .with_image(WOOD_BASE, texture(OPAQUE))
        .with_image("/models/chair_Wood_RMA.png", texture(OPAQUE))
        .with_image("/models/chair_Wood_Normal.png", texture(OPAQUE))
        .with_image("/models/chair_Glass_Base.png", texture(GLASS))
        .with_image("/models/chair_Glass_RMA.png", texture(OPAQUE))
        .with_image("/models/box_Crate_Base.png", texture(OPAQUE))
        .with_image("/models/winter/box_Crate_Base.png", ImageData::solid_color(4, 4, OPAQUE))
        .with_image("/models/scan_Skin_Base.jpg", texture(OPAQUE))
        .with_image("/textures/brdfLUT.png", texture(OPAQUE))
        .with_image("/textures/uv_0.jpg", texture(OPAQUE));
    for name in ["unlit", "scan", "depth_mask"] {
        source.insert_text(format!("/shaders/{name}.vert"), BASIC_VERT);
        source.insert_text(format!("/shaders/{name}.frag"), BASIC_FRAG);
    }
    source.insert_text("/shaders/occluder.vert", "attribute vec3 a_position;\nuniform mat4 matWVP;\nvoid main() {}\n");
    source.insert_text("/shaders/occluder.frag", "void main() {}\n");
    source
}

fn renderer() -> Renderer<HeadlessBackend> {
    Renderer::new(HeadlessBackend::new(), source(), RendererConfig::default()).unwrap()
}

fn draws(calls: &[BackendCall]) -> usize {
    calls.iter().filter(|call| matches!(call, BackendCall::Draw { .. })).count()
}

fn bound_units(calls: &[BackendCall]) -> Vec<u32> {
    calls
        .iter()
        .filter_map(|call| match call {
            BackendCall::BindTexture { unit, .. } => Some(*unit),
            _ => None,
        })
        .collect()
}

#[test]
fn test_pbr_materials_from_mesh_file() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();

    let mesh = renderer.mesh(id).unwrap();
    assert_eq!(mesh.submeshes().len(), 2);
    assert!(renderer.render_list().is_empty());

    let wood = mesh.submeshes()[0].material().unwrap();
    let glass = mesh.submeshes()[1].material().unwrap();
    assert_eq!(wood.name(), Some("Wood"));
    assert_eq!(glass.name(), Some("Glass"));
    assert_eq!(
        wood.param("baseMap"),
        Some(&MaterialParam::Texture(renderer.resources().texture_id(WOOD_BASE)))
    );
    assert!(wood.param("normalMap").is_some());
    assert!(glass.param("normalMap").is_none());
    assert!(wood.param("emissiveMap").is_none());

    assert!(!wood.is_translucent());
    assert!(glass.is_translucent());

    // USE_NORMAL_MAP only on the wood program
    assert_ne!(wood.program(), glass.program());
    assert_eq!(renderer.resources().program_count(), 2);
}

#[test]
fn test_opaque_pass_precedes_translucent_pass() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    assert!(renderer.add_mesh(id));

    renderer.backend_mut().take_calls();
    renderer.render_meshes();

    let calls = renderer.backend().calls();
    assert_eq!(calls[0], BackendCall::SetPassState(PassState::OPAQUE));
    let translucent_at = calls
        .iter()
        .position(|call| *call == BackendCall::SetPassState(PassState::TRANSLUCENT))
        .unwrap();
    assert_eq!(draws(&calls[..translucent_at]), 1);
    assert_eq!(draws(&calls[translucent_at..]), 1);
}

#[test]
fn test_world_transform_reaches_wvp() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    renderer.mesh_mut(id).unwrap().set_position(Vec3::new(0.0, 0.0, -5.0));

    let program_id = renderer.mesh(id).unwrap().submeshes()[0].material().unwrap().program();
    let program = renderer.resources().program(program_id).unwrap();
    let (handle, location) = (program.handle(), program.uniform_location("matWVP").unwrap());

    renderer.backend_mut().take_calls();
    renderer.render_opaque_submeshes(id).unwrap();

    let uploaded = renderer
        .backend()
        .calls()
        .iter()
        .find_map(|call| match call {
            BackendCall::UniformMatrix4 { program, location: at, value } if *program == handle && *at == location => {
                Some(*value)
            }
            _ => None,
        })
        .unwrap();
    let expected = renderer.camera_mut().view_projection_matrix() * Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0));
    assert_relative_eq!(uploaded, expected, epsilon = 1e-4);
}

#[test]
fn test_texture_units_restart_every_frame() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    renderer.add_mesh(id);

    let mut frames = Vec::new();
    for _ in 0..2 {
        renderer.backend_mut().take_calls();
        renderer.render_meshes();
        frames.push(bound_units(renderer.backend().calls()));
    }

    // wood: baseMap, iblBrdfLutMap, normalMap, rmaMap; glass drops normalMap
    assert_eq!(frames[0], vec![0, 1, 2, 3, 0, 1, 2]);
    assert_eq!(frames[0], frames[1]);
}

#[test]
fn test_environment_texture_loads_once() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    renderer.add_mesh(id);
    assert!(renderer.resources().texture_id("/textures/brdfLUT.png").is_none());

    renderer.render_meshes();
    assert!(renderer.resources().texture_id("/textures/brdfLUT.png").is_some());

    renderer.backend_mut().take_calls();
    renderer.render_meshes();
    let uploads = renderer
        .backend()
        .count_calls(|call| matches!(call, BackendCall::UploadTexture2d { .. }));
    assert_eq!(uploads, 0);
}

#[test]
fn test_preloaded_environment_texture_replaces_lazy_load() {
    let mut renderer = renderer();
    let lut = renderer.load_texture("/textures/uv_0.jpg", false).unwrap();
    renderer
        .environment_mut()
        .set_texture(BuiltinUniform::IblBrdfLutMap, lut.id);

    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    renderer.render_opaque_submeshes(id).unwrap();

    assert!(renderer.resources().texture_id("/textures/brdfLUT.png").is_none());
    let wood = renderer.mesh(id).unwrap().submeshes()[0].material().unwrap();
    let param = wood.param("iblBrdfLutMap").unwrap();
    assert!(param.is_texture());
    assert_eq!(param.texture(), Some(lut.id));
    assert!(!MaterialParam::Float(1.0).is_texture());
    assert_eq!(MaterialParam::Float(1.0).texture(), None);
}

#[test]
fn test_static_vertex_state_created_once() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    renderer.add_mesh(id);

    for _ in 0..3 {
        renderer.begin_frame();
        renderer.render_meshes();
        renderer.end_frame();
    }

    let backend = renderer.backend();
    assert_eq!(backend.count_calls(|call| matches!(call, BackendCall::CreateVertexArray { .. })), 2);
    assert_eq!(draws(backend.calls()), 6);
}

#[test]
fn test_companion_mtl_names_single_submesh() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/box.obj", MaterialPreset::Unlit, &MeshLoadOptions::default())
        .unwrap();

    let material = renderer.mesh(id).unwrap().submeshes()[0].material().unwrap();
    assert_eq!(material.name(), Some("Crate"));
    let base = renderer.resources().texture_id("/models/box_Crate_Base.png");
    assert!(base.is_some());
    assert_eq!(material.param("baseMap"), Some(&MaterialParam::Texture(base)));
}

#[test]
fn test_texture_variant_preferred() {
    let mut renderer = renderer();
    let options = MeshLoadOptions::default().with_texture_variant("winter");
    let id = renderer.create_mesh("/models/box.obj", MaterialPreset::Unlit, &options).unwrap();

    let material = renderer.mesh(id).unwrap().submeshes()[0].material().unwrap();
    let winter = renderer.resources().texture_id("/models/winter/box_Crate_Base.png");
    assert!(winter.is_some());
    assert_eq!(material.param("baseMap"), Some(&MaterialParam::Texture(winter)));
    assert!(renderer.resources().texture_id("/models/box_Crate_Base.png").is_none());
}

#[test]
fn test_mesh_without_names_has_no_materials() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/bare.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    renderer.add_mesh(id);

    let mesh = renderer.mesh(id).unwrap();
    assert_eq!(mesh.submeshes().len(), 1);
    assert!(mesh.submeshes()[0].material().is_none());

    renderer.render_meshes();
    assert_eq!(draws(renderer.backend().calls()), 0);
}

#[test]
fn test_parse_failure_creates_no_mesh() {
    let mut renderer = renderer();
    let result = renderer.create_mesh("/models/bad.obj", MaterialPreset::Pbr, &MeshLoadOptions::default());
    assert!(matches!(
        result,
        Err(RenderError::Parse {
            source: ParseError::NonPositiveIndex { index: -2, .. },
            ..
        })
    ));

    let empty = renderer.create_mesh("/models/empty.obj", MaterialPreset::Pbr, &MeshLoadOptions::default());
    assert!(matches!(
        empty,
        Err(RenderError::Parse {
            source: ParseError::EmptyInput,
            ..
        })
    ));

    let missing = renderer.create_mesh("/models/none.obj", MaterialPreset::Pbr, &MeshLoadOptions::default());
    assert!(matches!(missing, Err(RenderError::Asset(_))));
    assert_eq!(renderer.mesh_count(), 0);
}

#[test]
fn test_program_failure_leaves_submesh_bare() {
    let mut config = RendererConfig::default();
    config.shaders.unlit = ShaderPair::named("missing");
    let mut renderer = Renderer::new(HeadlessBackend::new(), source(), config).unwrap();

    let id = renderer
        .create_mesh("/models/box.obj", MaterialPreset::Unlit, &MeshLoadOptions::default())
        .unwrap();
    assert!(renderer.mesh(id).unwrap().submeshes()[0].material().is_none());
}

#[test]
fn test_scan_keeps_export_triangles() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/scan.obj", MaterialPreset::Scan, &MeshLoadOptions::default())
        .unwrap();

    let submesh = &renderer.mesh(id).unwrap().submeshes()[0];
    let exported = submesh.source_triangles().unwrap();
    assert_eq!(exported.positions.len(), 3);
    assert_eq!(exported.triangles.len(), 1);
    assert_eq!(exported.triangles[0].0[1].v, 1);
    assert!(submesh.material().unwrap().param("baseMap").is_some());
}

#[test]
fn test_depth_mask_uses_fixed_texture() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::DepthMask, &MeshLoadOptions::default())
        .unwrap();

    let uv = renderer.resources().texture_id("/textures/uv_0.jpg");
    assert!(uv.is_some());
    for submesh in renderer.mesh(id).unwrap().submeshes() {
        assert_eq!(submesh.material().unwrap().param("baseMap"), Some(&MaterialParam::Texture(uv)));
    }
    assert_eq!(renderer.resources().texture_refs("/textures/uv_0.jpg"), Some(2));
}

#[test]
fn test_occluder_registers_itself() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/bare.obj", MaterialPreset::Occluder, &MeshLoadOptions::default())
        .unwrap();

    assert_eq!(renderer.render_list(), &[id]);
    assert!(renderer.mesh(id).unwrap().submeshes()[0].material().is_some());

    renderer.render_meshes();
    assert_eq!(draws(renderer.backend().calls()), 1);
}

#[test]
fn test_destroy_mesh_releases_device_state() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    renderer.add_mesh(id);
    renderer.render_meshes();
    assert!(renderer.backend().live_buffer_count() > 0);

    assert!(renderer.destroy_mesh(id));

    let backend = renderer.backend();
    assert_eq!(backend.live_buffer_count(), 0);
    assert_eq!(backend.live_vertex_array_count(), 0);
    assert!(renderer.resources().texture_id(WOOD_BASE).is_none());
    // Environment textures and programs stay with the renderer
    assert!(renderer.resources().texture_id("/textures/brdfLUT.png").is_some());
    assert_eq!(renderer.resources().program_count(), 2);
}

#[test]
fn test_shared_texture_released_with_last_mesh() {
    let mut renderer = renderer();
    let options = MeshLoadOptions::default();
    let first = renderer.create_mesh("/models/chair.obj", MaterialPreset::Pbr, &options).unwrap();
    let second = renderer.create_mesh("/models/chair.obj", MaterialPreset::Pbr, &options).unwrap();
    assert_eq!(renderer.resources().texture_refs(WOOD_BASE), Some(2));

    renderer.destroy_mesh(first);
    assert_eq!(renderer.resources().texture_refs(WOOD_BASE), Some(1));

    renderer.destroy_mesh(second);
    assert_eq!(renderer.resources().texture_refs(WOOD_BASE), None);
}

#[test]
fn test_private_texture_belongs_to_mesh() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/box.obj", MaterialPreset::Unlit, &MeshLoadOptions::default())
        .unwrap();

    let pixels = ImageData::solid_color(8, 8, [10, 20, 30, 255]);
    let texture = renderer.create_private_texture(id, &pixels, false).unwrap();
    renderer.mesh_mut(id).unwrap().replace_texture("baseMap", Some(texture));
    assert_eq!(
        renderer.mesh(id).unwrap().submeshes()[0].material().unwrap().param("baseMap"),
        Some(&MaterialParam::Texture(Some(texture)))
    );

    renderer.destroy_mesh(id);
    assert!(renderer.resources().texture(texture).is_none());
}

#[test]
fn test_sh_coefficients_uploaded() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    let coefficients = [[0.25_f32, 0.5, 0.75]; SH_COEFFICIENT_COUNT];
    renderer.mesh_mut(id).unwrap().set_sh_param("shCoeffs", coefficients);

    renderer.backend_mut().take_calls();
    renderer.render_opaque_submeshes(id).unwrap();

    let uploaded: Vec<_> = renderer
        .backend()
        .calls()
        .iter()
        .filter_map(|call| match call {
            BackendCall::UniformVec3Array { values, .. } => Some(values.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(uploaded, vec![coefficients.to_vec()]);
}

#[test]
fn test_dynamic_mesh_positions_update() {
    let mut renderer = renderer();
    let options = MeshLoadOptions::default().with_dynamic(true);
    let id = renderer.create_mesh("/models/chair.obj", MaterialPreset::Pbr, &options).unwrap();
    renderer.add_mesh(id);
    renderer.render_meshes();

    let moved = [[0.0_f32, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]];
    renderer.update_submesh_positions(id, 0, &moved).unwrap();
    assert_eq!(
        renderer
            .backend()
            .count_calls(|call| matches!(call, BackendCall::UpdateVertexBuffer { offset: 0, size: 36, .. })),
        1
    );
    assert!(matches!(
        renderer.update_submesh_positions(id, 7, &moved),
        Err(RenderError::InvalidUpdate(_))
    ));
}

#[test]
fn test_background_drawn_without_depth() {
    let mut renderer = renderer();
    let frame = ImageData::solid_color(4, 4, OPAQUE);
    let first = renderer.backend_mut().upload_texture_2d(&frame, false).unwrap();
    let second = renderer.backend_mut().upload_texture_2d(&frame, false).unwrap();

    renderer.backend_mut().take_calls();
    renderer.render_background(first);
    renderer.render_background(second);
    assert_eq!(
        renderer.backend().calls(),
        &[
            BackendCall::SetPassState(PassState::empty()),
            BackendCall::DrawBackground(first),
            BackendCall::SetPassState(PassState::OPAQUE),
            BackendCall::SetPassState(PassState::empty()),
            BackendCall::DrawBackground(second),
            BackendCall::SetPassState(PassState::OPAQUE),
        ]
    );
    assert_eq!(renderer.resources().texture_count(), 0);
}

#[test]
fn test_release_all_empties_device() {
    let mut renderer = renderer();
    let id = renderer
        .create_mesh("/models/chair.obj", MaterialPreset::Pbr, &MeshLoadOptions::default())
        .unwrap();
    renderer.add_mesh(id);
    renderer.render_meshes();

    renderer.release_all();

    let backend = renderer.backend();
    assert_eq!(backend.live_program_count(), 0);
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(backend.live_buffer_count(), 0);
    assert_eq!(backend.live_vertex_array_count(), 0);
    assert_eq!(renderer.mesh_count(), 0);
    assert!(renderer.render_list().is_empty());
}
