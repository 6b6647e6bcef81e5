//! Headless viewer: renders the demo scene through the post-FX chain and
//! writes the display surface to a PNG file.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use afterglow::capture;
use afterglow::{
    DemoScene, PostFxConfig, RenderDevice, Renderer, RendererSettings, ShaderLibrary,
    SoftwareDevice, WgpuDevice,
};

// === Constants ===

const DEFAULT_WIDTH: u32 = 512;
const DEFAULT_HEIGHT: u32 = 512;

#[derive(Debug, Parser)]
#[command(name = "afterglow-viewer", version, about = "Render the demo scene through the post-FX chain")]
struct Args {
    /// Output image.
    #[arg(short, long, default_value = "afterglow.png")]
    output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,

    /// Frames to render before capturing.
    #[arg(short, long, default_value_t = 1)]
    frames: u32,

    /// Seconds of animation per frame.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Post-FX tunables as JSON.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `BlurIterations` from the config.
    #[arg(long)]
    blur_iterations: Option<u32>,

    /// Overrides `Exposure` from the config.
    #[arg(long)]
    exposure: Option<f32>,

    /// Render on a GPU adapter instead of the software device.
    #[arg(long)]
    gpu: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PostFxConfig::load(path)
            .with_context(|| format!("failed to load post-FX config {}", path.display()))?,
        None => PostFxConfig::default(),
    };
    if let Some(iterations) = args.blur_iterations {
        config.blur_iterations = iterations;
    }
    if let Some(exposure) = args.exposure {
        config.exposure = exposure;
    }

    let settings = RendererSettings::with_size(args.width, args.height);
    if args.gpu {
        let device = WgpuDevice::new_headless().context("failed to open a GPU device")?;
        run(device, settings, &config, &args)
    } else {
        run(SoftwareDevice::new(), settings, &config, &args)
    }
}

fn run<D: RenderDevice>(
    device: D,
    settings: RendererSettings,
    config: &PostFxConfig,
    args: &Args,
) -> anyhow::Result<()> {
    let mut renderer = Renderer::new(device, settings)?;
    let library = ShaderLibrary::builtin();
    let mut demo = DemoScene::build(&mut renderer, &library, config)?;
    let start = Instant::now();
    for _ in 0..args.frames.max(1) {
        demo.frame(&mut renderer, args.dt);
    }
    let elapsed = start.elapsed();

    let stats = renderer.device().stats();
    log::info!(
        "Rendered {} frame(s) in {:.2?}: {} passes, {} draw calls, {} triangles, {} fragments",
        args.frames.max(1),
        elapsed,
        stats.passes,
        stats.draw_calls,
        stats.triangles,
        stats.fragments
    );

    capture::save_png(renderer.resources(), renderer.display_texture(), &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    Ok(())
}
