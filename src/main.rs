//! Marginalia
//!
//! Command line front end for the annotation engine: inspect the plain-text
//! projection of a post, resolve a selection, or render stored annotations
//! as highlights.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marginalia::anchoring::{self, project};
use marginalia::{load_markup, Annotation, Config, HighlightPipeline, LiveSelection, NodePath, PlacementStatus, SelectionPoint};

/// Anchor comments to text ranges and render them as highlights
#[derive(Parser)]
#[command(name = "marginalia")]
#[command(version)]
#[command(about = "Anchor comments to text ranges and render them as highlights")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the plain text and position map of a markup file as JSON
    Project {
        /// Stored post markup
        markup: PathBuf,
    },
    /// Render annotations from a JSON file over a markup file
    Render {
        /// Stored post markup
        markup: PathBuf,
        /// JSON array of annotation records
        annotations: PathBuf,
        /// Flag these annotations as newly created
        #[arg(long)]
        pulse: Vec<String>,
    },
    /// Resolve a selection given as two (node path, offset) boundary points
    Locate {
        /// Stored post markup
        markup: PathBuf,
        /// Anchor node path, e.g. /0/1
        anchor_path: NodePath,
        anchor_offset: usize,
        /// Focus node path
        focus_path: NodePath,
        focus_offset: usize,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr, results to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marginalia=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let cli = Cli::parse();
    match cli.command {
        Commands::Project { markup } => {
            let tree = load_markup(&read(&markup)?, &config.highlight)?;
            let projection = project(&tree);
            let output = json!({
                "plainText": projection.plain_text.as_str(),
                "length": projection.plain_text.len(),
                "leaves": projection.position_map.leaves(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Render {
            markup,
            annotations,
            pulse,
        } => {
            let tree = load_markup(&read(&markup)?, &config.highlight)?;
            let records: Vec<Annotation> = serde_json::from_str(&read(&annotations)?)
                .with_context(|| format!("Invalid annotations in {}", annotations.display()))?;
            let pulse: HashSet<String> = pulse.into_iter().collect();

            let rendered = HighlightPipeline::new(&config).render(&tree, &records, &pulse);
            tracing::info!(
                "Rendered {} highlight ranges for {} annotations",
                rendered.ranges.len(),
                records.len()
            );
            for placement in &rendered.placements {
                match placement.status {
                    PlacementStatus::Stale => {
                        eprintln!("stale: {} (quoted text has since changed)", placement.annotation_id)
                    }
                    PlacementStatus::RenderFailed => {
                        eprintln!("failed: {} (could not be highlighted)", placement.annotation_id)
                    }
                    _ => {}
                }
            }
            println!("{}", rendered.html());
        }
        Commands::Locate {
            markup,
            anchor_path,
            anchor_offset,
            focus_path,
            focus_offset,
        } => {
            let tree = load_markup(&read(&markup)?, &config.highlight)?;
            let selection = LiveSelection::new(
                SelectionPoint::inside(anchor_path, anchor_offset),
                SelectionPoint::inside(focus_path, focus_offset),
            );
            let candidate = anchoring::resolve_selection(
                &project(&tree),
                &selection,
                config.capture.min_selection_chars,
            )
            .context("Selection cannot become an anchor")?;
            println!("{}", serde_json::to_string_pretty(&candidate)?);
        }
    }

    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
