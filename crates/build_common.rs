// Shared build-script helpers that turn a crate README into rustdoc.
// Pull into a build.rs with: include!("../build_common.rs");
//
// The including file must import:
//   use std::env;
//   use std::fs;
//   use std::path::Path;

/// Copy the crate README into `OUT_DIR/README_GENERATED.md`, rewriting links
/// so rustdoc can resolve them.
///
/// - `](src/foo.rs)` becomes `](foo)` so links point at modules
/// - `](../../README.md` becomes the workspace repository URL
///
/// A crate without a README gets an empty generated file, so the
/// `include_str!` in `lib.rs` always resolves.
fn render_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");
    println!("cargo:rerun-if-changed=../../Cargo.toml");

    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    let dest_path = Path::new(&out_dir).join("README_GENERATED.md");

    let readme = fs::read_to_string(Path::new(crate_dir).join("README.md")).unwrap_or_default();

    let mut rendered = readme.replace("](src/", "](").replace(".rs)", ")");
    if let Some(url) = workspace_repository_url(crate_dir) {
        rendered = rendered.replace("](../../README.md", &format!("]({url}"));
    }

    fs::write(dest_path, rendered).expect("OUT_DIR is writable");
}

/// Read `repository = "..."` from the workspace manifest two levels up.
fn workspace_repository_url(crate_dir: &str) -> Option<String> {
    let manifest = Path::new(crate_dir).parent()?.parent()?.join("Cargo.toml");
    let content = fs::read_to_string(manifest).ok()?;

    content.lines().map(str::trim).find_map(|line| {
        let value = line.strip_prefix("repository")?.trim_start().strip_prefix('=')?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
