// library.rs -- the embedded kernel library.
//
// All kernel source lives in one WGSL blob (src/shaders/kernels.wgsl),
// embedded at compile time and turned into a single wgpu::ShaderModule
// when the device context comes up. Kernels are addressed by entry-point
// name; there is no versioning and no hot reload.
//
// ENTRY-POINT METADATA
// ─────────────────────
// wgpu gives us no way to ask a ShaderModule which entry points it
// contains or which workgroup size each declares, so we scan the source
// text ourselves at init:
//
//   @compute @workgroup_size(64, 1, 1)
//   fn axpy(...)
//
// The scan keys two decisions later on: `register_kernel` can reject an
// unknown name before asking the device to compile anything, and
// `dispatch` can validate the caller's group extent against the size the
// shader was actually compiled with.
//
// The scanner is a plain text walk, not a WGSL frontend. It relies on
// two properties the embedded source upholds: workgroup sizes are
// integer literals (no `override` expressions), and the attribute pair
// directly precedes its `fn`. Both are contracts of this crate's own
// shader file, not of arbitrary WGSL.

use crate::error::LaunchError;
use crate::param::Extent;

/// The embedded kernel source, compiled once at device init.
pub(crate) const KERNELS_WGSL: &str = include_str!("shaders/kernels.wgsl");

/// One `@compute` entry point found in the library source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    /// The literal `@workgroup_size` the kernel declares.
    pub workgroup: Extent,
}

/// The compiled kernel library: one shader module plus the entry-point
/// table scanned from its source.
pub struct ShaderLibrary {
    pub(crate) module: wgpu::ShaderModule,
    entries: Vec<EntryPoint>,
}

impl ShaderLibrary {
    /// Compile `source` into a shader module and scan its entry points.
    ///
    /// # Errors
    /// `ResourceUnavailable { api: "create_shader_module" }` if the
    /// device reports a validation error for the source. Fatal: the
    /// whole launch pad is built around this library.
    pub(crate) fn compile(
        device: &wgpu::Device,
        source: &'static str,
    ) -> Result<Self, LaunchError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gantry kernels"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            log::debug!("kernel library rejected: {e}");
            return Err(LaunchError::ResourceUnavailable {
                api: "create_shader_module",
            });
        }

        let entries = scan_entry_points(source);
        log::debug!(
            "kernel library compiled: {} entry points ({})",
            entries.len(),
            entries
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(ShaderLibrary { module, entries })
    }

    /// Look up an entry point by name.
    pub fn entry_point(&self, name: &str) -> Option<&EntryPoint> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Names of every entry point in the library, in source order.
    pub fn kernel_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

/// Scan WGSL source for `@compute` entry points and their literal
/// workgroup sizes. Missing trailing dimensions default to 1, matching
/// WGSL's own rule. Line comments are ignored; block comments are not
/// handled (the embedded source does not use them).
pub fn scan_entry_points(source: &str) -> Vec<EntryPoint> {
    let stripped = strip_line_comments(source);
    let mut entries = Vec::new();
    let mut rest = stripped.as_str();

    while let Some(at) = rest.find("@compute") {
        rest = &rest[at + "@compute".len()..];

        // The attribute block ends at the `fn` that it decorates.
        let Some(fn_at) = rest.find("fn ") else { break };
        let (attrs, after_fn) = rest.split_at(fn_at);

        let workgroup = attrs
            .find("@workgroup_size(")
            .and_then(|ws| {
                let args = &attrs[ws + "@workgroup_size(".len()..];
                let close = args.find(')')?;
                parse_workgroup_dims(&args[..close])
            })
            .unwrap_or(Extent::new(1, 1, 1));

        let after_kw = &after_fn["fn ".len()..];
        let Some(paren) = after_kw.find('(') else { break };
        let name = after_kw[..paren].trim();
        if !name.is_empty() {
            entries.push(EntryPoint {
                name: name.to_string(),
                workgroup,
            });
        }
        rest = after_kw;
    }

    entries
}

/// Drop everything from `//` to end of line, keeping line structure.
fn strip_line_comments(source: &str) -> String {
    source
        .lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the comma-separated dimension list inside `@workgroup_size(...)`.
/// Accepts `64`, `64u`, `64, 1` etc.; returns None on any non-literal.
fn parse_workgroup_dims(args: &str) -> Option<Extent> {
    let mut dims = [1u32; 3];
    for (i, raw) in args.split(',').enumerate() {
        if i >= 3 {
            return None;
        }
        let lit = raw.trim().trim_end_matches('u');
        dims[i] = lit.parse().ok()?;
    }
    Some(Extent::new(dims[0], dims[1], dims[2]))
}
