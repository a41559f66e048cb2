use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use erd_engine::core::{
    Config, FileStore, GlyphStyle, Schema, Simulation, Storage, assign_identities, derive,
    edge_geometry, share,
};

#[derive(Parser)]
#[command(name = "erd-engine")]
#[command(version)]
#[command(about = "Headless driver for the ER diagram layout engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out a schema JSON file and print node rectangles and edge paths
    Layout {
        /// Schema JSON file
        file: PathBuf,
    },

    /// Print the share code of a schema JSON file
    Encode {
        /// Schema JSON file
        file: PathBuf,
    },

    /// Print the schema JSON behind a share code
    Decode {
        /// Share code
        code: String,
    },

    /// Print the demo schema as JSON
    Demo,

    /// List the projects in the configured store
    Projects,
}

fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    let cli = Cli::parse();

    if let Err(e) = run(cli, &config) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Commands::Layout { file } => layout(&file, config),
        Commands::Encode { file } => {
            let schema = read_schema(&file)?;
            println!("{}", share::encode(&schema)?);
            Ok(())
        }
        Commands::Decode { code } => {
            let schema = share::decode(&code).context("invalid share code")?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Commands::Demo => {
            println!("{}", serde_json::to_string_pretty(&Schema::demo())?);
            Ok(())
        }
        Commands::Projects => projects(config),
    }
}

fn read_schema(file: &Path) -> Result<Schema> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let schema: Schema = serde_json::from_str(&json)
        .with_context(|| format!("{} is not a valid schema", file.display()))?;
    Ok(assign_identities(schema))
}

fn layout(file: &Path, config: &Config) -> Result<()> {
    let schema = read_schema(file)?;
    let diagram = derive(&schema);
    let mut simulation =
        Simulation::from_diagram(&diagram, config.layout.clone(), config.viewport_center());
    let steps = simulation.run_until_settled();
    tracing::info!(
        "Laid out {} tables and {} relationships in {} steps",
        diagram.node_count(),
        diagram.edge_count(),
        steps
    );

    let snapshot = simulation.snapshot();
    let glyphs = GlyphStyle::default();
    let nodes: Vec<_> = snapshot
        .nodes
        .iter()
        .map(|frame| {
            let name = diagram
                .node(frame.table_id)
                .map(|n| n.name.as_str())
                .unwrap_or_default();
            serde_json::json!({
                "table": frame.table_id,
                "name": name,
                "x": frame.rect.center.x,
                "y": frame.rect.center.y,
                "width": frame.rect.width,
                "height": frame.rect.height,
            })
        })
        .collect();
    let edges: Vec<_> = diagram
        .edges()
        .filter_map(|(source, target, edge)| {
            let a = snapshot.node(source)?.rect;
            let b = snapshot.node(target)?.rect;
            let geometry = edge_geometry(&a, &b, edge, &glyphs)?;
            Some(serde_json::json!({
                "source": source,
                "target": target,
                "cardinality": edge.cardinality.to_string(),
                "path": geometry.to_svg_path(),
            }))
        })
        .collect();

    let output = serde_json::json!({ "nodes": nodes, "edges": edges });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn projects(config: &Config) -> Result<()> {
    let storage = Storage::new(FileStore::new(&config.storage_dir));
    let workspace = storage.load_workspace();
    for project in workspace.projects() {
        let marker = if project.id == workspace.active_id() {
            "*"
        } else {
            " "
        };
        let tables = project.schema.as_ref().map_or(0, |s| s.tables.len());
        println!(
            "{} {}  {}  {} table(s)  updated {}",
            marker,
            project.id,
            project.name,
            tables,
            project.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
