//! `slipway env` command
//!
//! Renders the environment descriptor for one built runtime, either as
//! eval-able shell exports (`eval "$(slipway env)"`) or as JSON. This
//! is the only place a descriptor meets a real shell.

use anyhow::Result;

use crate::cli::{EnvArgs, EnvFormat};
use slipway::core::artifact_path;
use slipway::provision::{
    EnvironmentDescriptor, Provisioner, ScriptResolver, SearchPathResolver, SitePackagesResolver,
    StartupAction,
};
use slipway::util::diagnostic::{NotBuiltError, RuntimeNotFoundError};
use slipway::{BuildResult, GlobalContext, Manifest};

pub fn execute(args: EnvArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let manifest_path = ctx.find_manifest()?;
    let manifest = Manifest::load(&manifest_path)?;
    let layout = ctx.project_layout()?;

    let runtime = match &args.runtime {
        Some(selector) => {
            manifest
                .axis
                .select(selector)
                .ok_or_else(|| RuntimeNotFoundError {
                    selector: selector.clone(),
                    available: Some(manifest.axis.summary()),
                })?
        }
        None => manifest.axis.default_runtime(),
    };

    let build = BuildResult::locate(&layout, &manifest.descriptor, runtime)?.ok_or_else(|| {
        NotBuiltError {
            runtime: runtime.id(),
            expected_artifact: artifact_path(&layout, &manifest.descriptor, runtime),
        }
    })?;

    let resolver: Box<dyn SearchPathResolver> = match &manifest.resolver {
        Some(script) => Box::new(ScriptResolver::new(script.clone())),
        None => Box::new(SitePackagesResolver),
    };

    let environment = Provisioner::new(manifest.axis.identity(), resolver.as_ref()).provision(
        &build,
        runtime,
        &manifest.descriptor,
    )?;

    match args.format {
        EnvFormat::Sh => print!("{}", render_sh(&environment)),
        EnvFormat::Json => println!("{}", serde_json::to_string_pretty(&environment)?),
    }

    Ok(())
}

/// Render a descriptor as an eval-able shell snippet.
///
/// Variables come first, then the startup actions in order, so the
/// banner prints before the search path export takes effect.
fn render_sh(environment: &EnvironmentDescriptor) -> String {
    let mut out = String::new();
    for (name, value) in &environment.vars {
        out.push_str(&format!("export {}={}\n", name, sh_quote(value)));
    }
    for action in &environment.actions {
        match action {
            StartupAction::Print { line } => {
                out.push_str(&format!("echo {}\n", sh_quote(line)));
            }
            StartupAction::Export { name, value } => {
                out.push_str(&format!("export {}={}\n", name, sh_quote(value)));
            }
        }
    }
    out
}

/// Single-quote a value for sh, escaping embedded single quotes.
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_sh_quote_plain() {
        assert_eq!(sh_quote("/opt/site-packages"), "'/opt/site-packages'");
    }

    #[test]
    fn test_sh_quote_embedded_quote() {
        assert_eq!(sh_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_render_sh_orders_vars_before_actions() {
        let mut vars = BTreeMap::new();
        vars.insert("SLIPWAY_PACKAGE".to_string(), "sample-pkg".to_string());
        let environment = EnvironmentDescriptor {
            vars,
            actions: vec![
                StartupAction::Print {
                    line: "slipway environment for sample-pkg 0.0.1a1".to_string(),
                },
                StartupAction::Export {
                    name: "PYTHONPATH".to_string(),
                    value: "/tree/lib/python3.11/site-packages".to_string(),
                },
            ],
        };

        let rendered = render_sh(&environment);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "export SLIPWAY_PACKAGE='sample-pkg'");
        assert_eq!(
            lines[1],
            "echo 'slipway environment for sample-pkg 0.0.1a1'"
        );
        assert_eq!(
            lines[2],
            "export PYTHONPATH='/tree/lib/python3.11/site-packages'"
        );
    }
}
