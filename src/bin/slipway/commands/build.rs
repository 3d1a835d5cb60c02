//! `slipway build` command

use std::time::Instant;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::{BuildArgs, MessageFormat};
use slipway::builder::InterpreterEngine;
use slipway::matrix::{EntryFailure, ExpandError, MatrixExpander};
use slipway::provision::{ScriptResolver, SearchPathResolver, SitePackagesResolver};
use slipway::util::config::load_config;
use slipway::util::diagnostic::{emit_error, suggestions, RuntimeNotFoundError};
use slipway::{FailureMode, GlobalContext, Manifest, MatrixEvent, RuntimeAxis};

pub fn execute(args: BuildArgs, verbose: bool, color: bool) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(verbose);
    ctx.set_color(color);

    let manifest_path = ctx.find_manifest()?;
    let manifest = Manifest::load(&manifest_path)?;
    let layout = ctx.project_layout()?;

    // Load configuration (global + project)
    let config = load_config(&ctx.config_path(), &layout.config_path());

    // Jobs: CLI > config > sequential
    let jobs = args.jobs.or(config.build.jobs).unwrap_or(1);

    let engine = InterpreterEngine::new(config);

    // --runtime narrows the axis to a single entry.
    let axis = match &args.runtime {
        Some(selector) => {
            let runtime =
                manifest
                    .axis
                    .select(selector)
                    .ok_or_else(|| RuntimeNotFoundError {
                        selector: selector.clone(),
                        available: Some(manifest.axis.summary()),
                    })?;
            RuntimeAxis::new(vec![runtime.clone()], runtime.id(), manifest.axis.identity())?
        }
        None => manifest.axis.clone(),
    };

    let resolver: Box<dyn SearchPathResolver> = match &manifest.resolver {
        Some(script) => Box::new(ScriptResolver::new(script.clone())),
        None => Box::new(SitePackagesResolver),
    };

    let failure_mode = if args.keep_going {
        FailureMode::Continue
    } else {
        manifest.failure_mode
    };

    let expander = MatrixExpander::new(
        &manifest.descriptor,
        &axis,
        &engine,
        &layout,
        resolver.as_ref(),
    )
    .failure_mode(failure_mode)
    .jobs(jobs)
    .verbose(ctx.is_verbose());

    let start = Instant::now();
    let total = axis.len();

    let outcome = match args.message_format {
        MessageFormat::Json => expander.expand_with(&mut |event: &MatrixEvent| {
            println!("{}", event.to_json());
        }),
        MessageFormat::Human => {
            // Progress bar across axis entries
            let pb = if !ctx.is_verbose() && total > 1 {
                let pb = ProgressBar::new(total as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                        .unwrap()
                        .progress_chars("#>-"),
                );
                Some(pb)
            } else {
                None
            };

            let result = expander.expand_with(&mut |event| {
                if let Some(pb) = &pb {
                    match event {
                        MatrixEvent::RuntimeBuilt { runtime, .. } => {
                            pb.set_message(runtime.clone());
                            pb.inc(1);
                        }
                        MatrixEvent::RuntimeFailed { runtime, .. } => {
                            pb.set_message(format!("{runtime} failed"));
                            pb.inc(1);
                        }
                        _ => {}
                    }
                }
            });

            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            result
        }
    };

    match outcome {
        Ok(result) => {
            for build in result.builds.values() {
                eprintln!(
                    "    Finished `{}` -> {}",
                    build.runtime,
                    build.artifact.display()
                );
            }
            for failure in &result.failures {
                report_failure(failure, args.keep_going, ctx.color());
            }

            let elapsed = start.elapsed();
            eprintln!(
                "    Finished {} of {} runtime(s) in {:.2}s",
                result.builds.len(),
                total,
                elapsed.as_secs_f64()
            );

            if !result.is_complete() {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(ExpandError::Entry(failure)) => {
            report_failure(&failure, args.keep_going, ctx.color());
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Render one entry failure with its cause chain and fixes.
fn report_failure(failure: &EntryFailure, keep_going: bool, color: bool) {
    let mut context: Vec<String> = vec![failure.source.to_string()];
    let mut cause = std::error::Error::source(&failure.source);
    while let Some(err) = cause {
        context.push(err.to_string());
        cause = err.source();
    }

    let mut fixes = vec![suggestions::BUILD_FAILED];
    if !keep_going {
        fixes.push(suggestions::KEEP_GOING);
    }

    let context_refs: Vec<&str> = context.iter().map(String::as_str).collect();
    emit_error(&failure.to_string(), &context_refs, &fixes, color);
}
