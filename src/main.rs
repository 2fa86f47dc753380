use clap::{Parser, Subcommand};
use roll_planner::config::PlannerConfig;
use roll_planner::labels::SequentialIdMapper;
use roll_planner::render;
use roll_planner::segment::{SegmentItem, SegmentationEngine};
use roll_planner::types::CreatedPlan;
use roll_planner::wastage::{ReportableRange, WastageExtractor};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "roll_planner",
    about = "Paper roll planning: print layout, jumbo labels and wastage"
)]
struct Cli {
    /// JSON config file (defaults apply to missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a cut sequence into width-bounded print segments
    Segment {
        /// Cut rolls as [CODE:]WIDTH (e.g. CR_00001:50 40.5)
        #[arg(long = "cuts", num_args = 1..)]
        cuts: Vec<String>,

        /// Substrate width in inches (default: from config)
        #[arg(long)]
        max_width: Option<f64>,

        /// Sort cuts into print order before segmenting
        #[arg(long)]
        sort: bool,

        /// Show ASCII layout of each segment
        #[arg(long)]
        layout: bool,
    },
    /// Print display labels for a batch of raw jumbo ids
    Labels {
        #[arg(num_args = 1..)]
        ids: Vec<String>,
    },
    /// Extract and validate wastage from a created plan (JSON)
    Wastage {
        #[arg(long)]
        input: PathBuf,
    },
}

fn parse_cut(s: &str, index: usize) -> Result<SegmentItem, String> {
    let (code, width) = match s.rsplit_once(':') {
        Some((code, width)) => (code.to_string(), width),
        None => (format!("#{}", index + 1), s),
    };
    let width = width
        .parse::<f64>()
        .map_err(|_| format!("invalid width in '{}'", s))?;
    if !(width > 0.0) {
        return Err(format!("width must be positive in '{}'", s));
    }
    Ok(SegmentItem::new(code, width))
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", e);
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = PlannerConfig::load(cli.config.as_deref()).unwrap_or_else(|e| fail(e));

    match cli.command {
        Command::Segment {
            cuts,
            max_width,
            sort,
            layout,
        } => {
            let items: Vec<SegmentItem> = cuts
                .iter()
                .enumerate()
                .map(|(i, c)| parse_cut(c, i))
                .collect::<Result<Vec<_>, _>>()
                .unwrap_or_else(|e| fail(e));
            let engine = SegmentationEngine::new(max_width.unwrap_or(config.max_segment_width))
                .unwrap_or_else(|e| fail(e));
            let segments = if sort {
                engine.layout(&items)
            } else {
                engine.segment(&items)
            };

            for (i, segment) in segments.iter().enumerate() {
                println!("Segment {}:", i + 1);
                for item in &segment.items {
                    println!("  {} {}\"", item.code, item.width_inches);
                }
                if layout {
                    print!("{}", render::render_segment(segment, engine.max_allowed_width()));
                } else {
                    println!(
                        "  used {}\", waste {}\", {:.1}% efficient",
                        segment.used_width,
                        segment.waste,
                        segment.efficiency * 100.0
                    );
                }
                println!();
            }
            println!(
                "Summary: {} segment{}",
                segments.len(),
                if segments.len() == 1 { "" } else { "s" },
            );
        }
        Command::Labels { ids } => {
            let mapper = SequentialIdMapper::from_config(&config).unwrap_or_else(|e| fail(e));
            let labels = mapper.jumbo_labels(ids.iter().map(String::as_str));
            for raw in &ids {
                let label = if mapper.is_ungrouped(raw) {
                    roll_planner::labels::UNGROUPED_LABEL
                } else {
                    labels.label(raw)
                };
                println!("{} -> {}", raw, label);
            }
        }
        Command::Wastage { input } => {
            let text = std::fs::read_to_string(&input).unwrap_or_else(|e| fail(e));
            let plan: CreatedPlan = serde_json::from_str(&text).unwrap_or_else(|e| fail(e));
            let cut_rolls: Vec<_> = plan.cut_rolls().cloned().collect();

            let extractor = WastageExtractor::new(ReportableRange::from_config(&config));
            let records = extractor.extract(&cut_rolls, &plan.plan_id);
            let issues = extractor.validate(&records);

            println!(
                "{}",
                serde_json::to_string_pretty(&records).unwrap_or_else(|e| fail(e))
            );
            if !issues.is_empty() {
                for issue in &issues {
                    eprintln!("Invalid: {}", issue);
                }
                std::process::exit(1);
            }
        }
    }
}
