//! Render a template file against a JSON scope.
//!
//! Usage: `render-template <TEMPLATE> [--scope FILE] [--config FILE] [--log-level LEVEL]`

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing::{debug, error};

use directive_compiler::{
    logging, Compiler, CompilerConfig, DirectiveRegistry, FileTemplateLoader, Scope,
};

#[derive(Parser, Debug)]
#[command(name = "render-template")]
#[command(about = "Render an HTML template with {{{ }}} interpolation and directives")]
struct Args {
    /// Template file to render
    template: PathBuf,

    /// JSON object used as the render scope
    #[arg(long)]
    scope: Option<PathBuf>,

    /// Compiler configuration (template dirs and declarative directives)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long = "log-level", default_value = "warn")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    logging::init(&args.log_level);

    let template = match fs::read_to_string(&args.template) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read {}: {}", args.template.display(), e);
            process::exit(1);
        }
    };

    let scope = match &args.scope {
        None => Scope::new(),
        Some(path) => {
            let parsed = fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()));
            match parsed {
                Ok(json) => Scope::from_json(json),
                Err(e) => {
                    error!("Failed to load scope {}: {}", path.display(), e);
                    process::exit(1);
                }
            }
        }
    };

    let config = match &args.config {
        None => CompilerConfig::default(),
        Some(path) => match CompilerConfig::from_path(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        },
    };

    let mut registry = DirectiveRegistry::new();
    match config.register_directives(&mut registry) {
        Ok(count) => debug!(count, "registered configured directives"),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }

    // The template's own directory is searched after the configured ones.
    let mut dirs = config.template_dirs.clone();
    if let Some(parent) = args.template.parent() {
        dirs.push(parent.to_path_buf());
    }
    let loader = FileTemplateLoader::new(dirs);
    if config.preload_templates {
        loader.preload();
    }

    let render = Compiler::new(&registry).with_loader(&loader).compile(&template);
    let html = futures::executor::block_on(async { render.render(&scope).await });
    println!("{}", html);
}
