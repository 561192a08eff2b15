//! `dockrun build` command — Build an image from a context directory.
//!
//! Packs the top-level files of the directory into a tar context, submits it
//! to the Docker daemon and relays the build log to stdout.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use tokio::sync::watch;

use dockrun_core::{BuildOptions, ContextMode, DEFAULT_DOCKERFILE, DEFAULT_TAG};
use dockrun_runtime::{build_context, run_build, DockerEngine};

#[derive(Args)]
pub struct BuildArgs {
    /// Build context directory (its top-level files are sent to the daemon)
    pub path: PathBuf,

    /// Name and optionally tag for the image (e.g., "myimage:latest")
    #[arg(short = 't', long = "tag", default_value = DEFAULT_TAG)]
    pub tag: String,

    /// Dockerfile name inside the context
    #[arg(short = 'f', long = "file", default_value = DEFAULT_DOCKERFILE)]
    pub file: String,

    /// Set build-time variables (KEY=VALUE), can be repeated
    #[arg(long = "build-arg")]
    pub build_arg: Vec<String>,

    /// Do not use cache when building the image
    #[arg(long)]
    pub no_cache: bool,

    /// Send only the Dockerfile as build context
    #[arg(long)]
    pub dockerfile_only: bool,

    /// Suppress build output and print the image ID on success
    #[arg(short, long)]
    pub quiet: bool,
}

impl BuildArgs {
    fn to_options(&self) -> Result<BuildOptions, String> {
        let mode = if self.dockerfile_only {
            ContextMode::DockerfileOnly
        } else {
            ContextMode::AllFiles
        };

        Ok(BuildOptions {
            tag: self.tag.clone(),
            dockerfile: self.file.clone(),
            mode,
            build_args: parse_build_args(&self.build_arg)?,
            no_cache: self.no_cache,
            ..BuildOptions::default()
        })
    }
}

pub async fn execute(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.to_options()?;
    options.validate()?;

    // Archive first so a bad context fails without touching the daemon
    let context = build_context(&args.path, &options)?;
    let engine = DockerEngine::connect().await?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupt received, cancelling build");
            let _ = cancel_tx.send(true);
        }
    });

    let mut sink: Box<dyn Write> = if args.quiet {
        Box::new(std::io::sink())
    } else {
        Box::new(std::io::stdout())
    };
    let result = run_build(&engine, context, &options, &mut sink, cancel_rx).await;
    interrupt.abort();
    let outcome = result?;

    if args.quiet {
        if let Some(id) = outcome.image_id {
            println!("{id}");
        }
    }

    Ok(())
}

/// Parse KEY=VALUE pairs into a HashMap.
fn parse_build_args(args: &[String]) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("Invalid build arg (expected KEY=VALUE): {arg}"))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}
