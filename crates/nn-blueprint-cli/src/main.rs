use std::path::{Path, PathBuf};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use nn_blueprint::{Catalog, Category, EmitterConfig, GeneratedCode, codegen};

mod blueprint;

use blueprint::Blueprint;

#[derive(Parser)]
#[command(author, version, about = "Validate neural network blueprints and emit PyTorch code", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every connection of a blueprint
    Validate {
        #[arg(value_name = "BLUEPRINT")]
        path: PathBuf,
    },
    /// Generate the model, training and inference scripts
    Emit {
        #[arg(value_name = "BLUEPRINT")]
        path: PathBuf,

        /// Directory to write the generated files to; prints the model to stdout otherwise
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Emitter config JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Name of the generated nn.Module class
        #[arg(long)]
        model_name: Option<String>,
    },
    /// List the node kinds of the standard catalog
    Catalog {
        #[arg(long)]
        category: Option<Category>,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO })
        .with_writer(std::io::stderr)
        .init();

    let catalog = Catalog::standard();
    match cli.command {
        Commands::Validate { path } => validate(&catalog, &path),
        Commands::Emit { path, out, config, model_name } => {
            let mut emitter_config = match config {
                Some(config) => EmitterConfig::load(&config)?,
                None => EmitterConfig::default(),
            };
            if let Some(name) = model_name {
                emitter_config = emitter_config.with_model_name(&name)?;
            }
            emit(&catalog, &path, out.as_deref(), emitter_config)
        }
        Commands::Catalog { category, json } => list(&catalog, category, json),
    }
}

fn validate(catalog: &Catalog, path: &Path) -> Result<()> {
    let blueprint = Blueprint::load(path)?;
    let built = blueprint.build(catalog)?;
    for rejected in &built.rejected {
        println!("{} -> {}: rejected", rejected.from, rejected.to);
        for message in rejected.result.messages() {
            println!("  - {message}");
        }
    }
    println!("{} of {} connections accepted", built.graph.connections().len(), blueprint.connections.len());
    if !built.rejected.is_empty() {
        bail!("{} connection(s) rejected", built.rejected.len());
    }
    Ok(())
}

fn emit(catalog: &Catalog, path: &Path, out: Option<&Path>, config: EmitterConfig) -> Result<()> {
    let built = Blueprint::load(path)?.build(catalog)?;
    if let Some(first) = built.rejected.first() {
        bail!("connection {} -> {} rejected: {}", first.from, first.to, first.result);
    }
    let code = codegen::emit(built.graph.snapshot(), &config)?;
    for warning in &code.warnings {
        log::warn!("{warning}");
    }
    match out {
        Some(dir) => {
            for file in write_outputs(dir, &code)? {
                log::info!("Wrote {}", file.display());
            }
        }
        None => {
            print!("{}", code.model_source);
            eprint!("{}", code.summary);
        }
    }
    Ok(())
}

fn write_outputs(dir: &Path, code: &GeneratedCode) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let requirements = code.dependencies.join("\n") + "\n";
    let files = [
        ("model.py", code.model_source.as_str()),
        ("train.py", code.training_scaffold.as_str()),
        ("infer.py", code.inference_scaffold.as_str()),
        ("requirements.txt", requirements.as_str()),
        ("summary.txt", code.summary.as_str()),
    ];
    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = dir.join(name);
        std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn list(catalog: &Catalog, category: Option<Category>, json: bool) -> Result<()> {
    let entries: Vec<_> = catalog.entries()
        .filter(|entry| category.is_none_or(|c| entry.category == c))
        .collect();
    if json {
        let rows: Vec<serde_json::Value> = entries.iter()
            .map(|entry| serde_json::json!({
                "kind": entry.kind.as_str(),
                "category": entry.category,
                "name": entry.name,
                "params": entry.params,
                "inputs": entry.inputs,
                "outputs": entry.outputs,
            }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for entry in entries {
        println!("{:<28} {:<22} {}", entry.kind.as_str(), entry.category.label(), entry.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nn_blueprint::Graph;

    #[test]
    fn writes_every_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let code = codegen::emit(Graph::new().snapshot(), &EmitterConfig::default()).unwrap();
        let written = write_outputs(dir.path(), &code).unwrap();
        assert_eq!(written.len(), 5);
        let requirements = std::fs::read_to_string(dir.path().join("requirements.txt")).unwrap();
        assert_eq!(requirements, "torch>=1.9.0\n");
    }
}
