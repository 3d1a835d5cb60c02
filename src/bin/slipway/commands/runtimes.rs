//! `slipway runtimes` command

use anyhow::Result;

use slipway::core::artifact_path;
use slipway::util::fs::relative_path;
use slipway::{GlobalContext, Manifest};

pub fn execute() -> Result<()> {
    let ctx = GlobalContext::new()?;

    let manifest_path = ctx.find_manifest()?;
    let manifest = Manifest::load(&manifest_path)?;
    let layout = ctx.project_layout()?;

    println!(
        "Runtime axis for {} {} [{}]:",
        manifest.name(),
        manifest.version(),
        manifest.axis.identity()
    );
    println!();

    for runtime in manifest.axis.entries() {
        let marker = if runtime.id() == manifest.axis.default_id() {
            "*"
        } else {
            " "
        };

        let artifact = artifact_path(&layout, &manifest.descriptor, runtime);
        let status = if artifact.is_file() {
            format!(
                "built      {}",
                relative_path(ctx.cwd(), &artifact).display()
            )
        } else {
            "not built".to_string()
        };

        println!(
            "{} {:<9} {:<6} {:<12} {}",
            marker,
            runtime.id(),
            runtime.tag(),
            runtime.interpreter(),
            status
        );
    }

    println!();
    println!("* designated latest");

    Ok(())
}
