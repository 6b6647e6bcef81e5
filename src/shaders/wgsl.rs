//! WGSL translations of the built-in kernels for the GPU device.
//!
//! Each module is the shared prelude, the full-screen vertex stage for
//! image-space kernels, and the kernel body. Bodies declare a `Params`
//! uniform block whose fields mirror the kernel's uniform declarations;
//! see `wgsl/prelude.wgsl` for the binding rules.

const PRELUDE: &str = include_str!("wgsl/prelude.wgsl");
const SCREEN: &str = include_str!("wgsl/screen.wgsl");

/// Internal program that writes a depth image into a depth attachment.
pub const DEPTH_LOAD: &str = include_str!("wgsl/depth_load.wgsl");

/// Element capacity of every uniform array (`UNIFORM_ARRAY_LEN` in WGSL).
pub const UNIFORM_ARRAY_LEN: usize = 8;

fn body(kernel: &str) -> Option<(bool, &'static str)> {
    let entry = match kernel {
        "deferred/gbuffer" => (false, include_str!("wgsl/gbuffer.wgsl")),
        "tvscreen" => (false, include_str!("wgsl/tvscreen.wgsl")),
        "deferred/lighting" => (true, include_str!("wgsl/lighting.wgsl")),
        "skybox" => (true, include_str!("wgsl/skybox.wgsl")),
        "postfx/copy" => (true, include_str!("wgsl/copy.wgsl")),
        "postfx/bloom" => (true, include_str!("wgsl/bloom.wgsl")),
        "postfx/blur" => (true, include_str!("wgsl/blur.wgsl")),
        "postfx/compose" => (true, include_str!("wgsl/compose.wgsl")),
        "postfx/chromatic" => (true, include_str!("wgsl/chromatic.wgsl")),
        "postfx/noise" => (true, include_str!("wgsl/noise.wgsl")),
        "postfx/vignette" => (true, include_str!("wgsl/vignette.wgsl")),
        "postfx/barrel" => (true, include_str!("wgsl/barrel.wgsl")),
        "postfx/scanline" => (true, include_str!("wgsl/scanline.wgsl")),
        _ => return None,
    };
    Some(entry)
}

/// Complete module source for a kernel, `None` when it has no GPU translation.
#[must_use]
pub fn kernel_source(kernel: &str) -> Option<String> {
    let (full_screen, body) = body(kernel)?;
    let mut source = String::with_capacity(PRELUDE.len() + SCREEN.len() + body.len());
    source.push_str(PRELUDE);
    if full_screen {
        source.push_str(SCREEN);
    }
    source.push_str(body);
    Some(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::ShaderLibrary;

    fn snake_case(name: &str) -> String {
        let mut out = String::new();
        for (i, c) in name.chars().enumerate() {
            if c.is_ascii_uppercase() {
                if i > 0 {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    fn params_fields(source: &str) -> Vec<String> {
        let start = source.find("struct Params {").expect("Params block");
        let block = &source[start..];
        let end = block.find("};").expect("Params terminator");
        block[..end]
            .lines()
            .skip(1)
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"))
            .filter_map(|line| line.split(':').next())
            .map(|field| field.trim().to_string())
            .collect()
    }

    #[test]
    fn every_builtin_kernel_has_a_translation() {
        let library = ShaderLibrary::builtin();
        for name in library.kernel_names() {
            assert!(kernel_source(name).is_some(), "no WGSL for `{name}`");
        }
        assert!(kernel_source("postfx/unknown").is_none());
    }

    #[test]
    fn params_blocks_follow_declaration_order() {
        let library = ShaderLibrary::builtin();
        for name in library.kernel_names() {
            let kernel = library.kernel(name).expect("registered kernel");
            let mut expected: Vec<String> = kernel
                .declarations()
                .iter()
                .map(|decl| snake_case(decl.name))
                .collect();
            expected.push("target_size".to_string());

            let source = kernel_source(name).expect("translation");
            assert_eq!(params_fields(&source), expected, "kernel `{name}`");
        }
    }

    #[test]
    fn image_kernels_share_the_screen_vertex_stage() {
        let copy = kernel_source("postfx/copy").expect("copy");
        let gbuffer = kernel_source("deferred/gbuffer").expect("gbuffer");
        assert_eq!(copy.matches("fn vs_main").count(), 1);
        assert_eq!(gbuffer.matches("fn vs_main").count(), 1);
        assert!(copy.contains("struct ScreenVaryings"));
        assert!(!gbuffer.contains("struct ScreenVaryings"));
    }
}
