use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use afterglow::postfx::plan_stages;
use afterglow::{DemoScene, PostFxConfig, Renderer, RendererSettings, ShaderLibrary, SoftwareDevice};

/// Benchmark: one full demo frame (G-buffer, lighting, sky and post-FX chain)
fn bench_demo_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("demo_frame");
    group.sample_size(10);

    for size in [64_u32, 128] {
        let mut renderer =
            Renderer::new(SoftwareDevice::new(), RendererSettings::with_size(size, size)).unwrap();
        let library = ShaderLibrary::builtin();
        let mut demo = DemoScene::build(&mut renderer, &library, &PostFxConfig::default()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                demo.frame(&mut renderer, black_box(1.0 / 60.0));
            });
        });
    }
    group.finish();
}

/// Benchmark: stage planning for a deep blur chain
fn bench_plan_stages(c: &mut Criterion) {
    c.bench_function("plan_stages_16", |b| {
        b.iter(|| black_box(plan_stages(black_box(16))));
    });
}

criterion_group!(benches, bench_demo_frame, bench_plan_stages);
criterion_main!(benches);
