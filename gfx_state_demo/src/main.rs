//! Renders a few frames of a small scene on a [RecordingDevice] and prints the
//! resulting command stream.
//!
//! Usage: `gfx_state_demo [--frames N] [-v] [--log FILE]`

use std::{collections::BTreeMap, error::Error, path::Path, process};

use clap::{App, Arg, ArgMatches};
use gfx_state::{
    BlendingParameters, Capability, Color4f, ContextConfig, CullFaceMode, CullFaceParameters,
    DepthBufferParameters, DeviceCall, LightParameters, RecordingDevice, Rect, RenderingContext,
};
use scene::{Cube, DemoShader, DemoTexture};
use tracing::Level;
use ultraviolet::{projection::rh_yup::perspective_gl, Mat4, Vec3};

mod logging;
mod scene;

fn main() {
    let matches = App::new("gfx_state_demo")
        .about("Renders a small scene on a recording device and prints the command stream")
        .arg(
            Arg::with_name("frames")
                .long("frames")
                .value_name("N")
                .default_value("3")
                .help("number of frames to render"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("log every device call"),
        )
        .arg(
            Arg::with_name("log")
                .long("log")
                .value_name("FILE")
                .help("also write the log to this file"),
        )
        .get_matches();

    run(&matches).unwrap_or_else(|error| {
        eprintln!("Error: {}", error);
        process::exit(1);
    });
}

fn run(matches: &ArgMatches<'_>) -> Result<(), Box<dyn Error>> {
    let frames: u32 = matches.value_of("frames").unwrap_or("3").parse()?;
    let max_level = if matches.is_present("verbose") {
        Level::TRACE
    } else {
        Level::INFO
    };
    logging::init(matches.value_of("log").map(Path::new), max_level)?;

    // No compute support, so the culling pass below is skipped with a warning.
    let device = RecordingDevice::new().without(Capability::ComputeShader);
    let config = ContextConfig {
        object_capacity: 64,
        ..Default::default()
    };
    let mut ctx = RenderingContext::with_config(device, config)?;
    ctx.set_window_client_area(Rect::new(0, 0, 1280, 720));

    let cube = Cube::upload(ctx.device_mut())?;
    let shader = DemoShader::new(1);
    let checker = DemoTexture::new(2);

    ctx.set_shader(Some(DemoShader::shader_ref(&shader)));
    ctx.set_viewport(ctx.window_client_area());
    ctx.set_projection(perspective_gl(45f32.to_radians(), 16.0 / 9.0, 0.1, 100.0));
    ctx.set_world_to_camera(Mat4::look_at(
        Vec3::new(4.0, 3.0, 6.0),
        Vec3::zero(),
        Vec3::unit_y(),
    ));
    ctx.set_cull_face(CullFaceParameters::cull(CullFaceMode::Back));

    let sun = ctx.enable_light(LightParameters::directional(
        [-0.3, -1.0, -0.2],
        Color4f::WHITE,
    ));
    ctx.enable_light(LightParameters::point(
        [2.0, 2.0, 2.0],
        Color4f::new(1.0, 0.8, 0.6, 1.0),
    ));

    for frame in 0..frames {
        let span = tracing::info_span!("frame", frame);
        let _enter = span.enter();

        ctx.device_mut().clear_calls();
        ctx.clear_screen(Color4f::new(0.1, 0.1, 0.15, 1.0));

        // A grid of lit cubes, one material each.
        let angle = frame as f32 * 0.1;
        for i in 0..5 {
            for j in 0..5 {
                ctx.set_model_to_camera(ctx.world_to_camera());
                let position = Vec3::new(i as f32 * 1.5 - 3.0, 0.0, j as f32 * 1.5 - 3.0);
                ctx.mult_model_to_camera(
                    Mat4::from_translation(position) * Mat4::from_rotation_y(angle),
                );
                ctx.push_and_set_color_material(Color4f::new(
                    i as f32 / 4.0,
                    j as f32 / 4.0,
                    0.5,
                    1.0,
                ));
                ctx.display_mesh(&cube)?;
                ctx.pop_material();
            }
        }

        // A textured, alpha blended overlay that restores its state on drop.
        {
            let mut overlay = ctx.scoped_blending(BlendingParameters::alpha());
            overlay.push_and_set_depth_buffer(DepthBufferParameters::disabled());
            overlay.push_and_set_texture(0, Some(checker.clone()))?;
            overlay.reset_model_to_camera();
            overlay.push_and_set_projection(Mat4::identity());
            overlay.display_mesh_range(&cube, 0, 6)?;
            overlay.pop_projection();
            overlay.pop_texture(0)?;
            overlay.pop_depth_buffer();
        }

        ctx.dispatch_compute([16, 1, 1]);

        // Turn the sun off for odd frames.
        if let Some(sun) = sun {
            if frame % 2 == 1 {
                ctx.disable_light(sun);
            } else {
                ctx.enable_light_id(sun);
            }
        }

        ctx.clear_screen_rect(Rect::new(0, 0, 200, 100), Color4f::BLACK, false);
        ctx.flush();

        print_summary(frame, ctx.device().calls());
    }

    println!("uniform syncs: {}", shader.uniform_syncs());
    let diagnostics = ctx.take_diagnostics();
    println!("diagnostics: {}", diagnostics.len());
    for diagnostic in diagnostics {
        println!("  {}", diagnostic);
    }

    Ok(())
}

fn print_summary(frame: u32, calls: &[DeviceCall]) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for call in calls {
        let name = format!("{:?}", call);
        let name = name
            .split(|c: char| c == '(' || c == ' ' || c == '{')
            .next()
            .unwrap_or_default()
            .to_string();
        *counts.entry(name).or_default() += 1;
    }
    println!("frame {}: {} device calls", frame, calls.len());
    for (name, count) in counts {
        println!("  {:<20} {}", name, count);
    }
}
