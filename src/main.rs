//! faceroll - roll a dice expression from the command line
//!
//! Prints every term with its faces, then the headline of the equation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::{SeedableRng, rngs::StdRng};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faceroll::{Category, Equation, Headline, Registry, Term, evaluate, evaluate_with};

#[derive(Parser, Debug)]
#[command(
    name = "faceroll",
    version,
    about = "Roll dice expressions such as `4d6k3 + 2` or `3dF >= 1`"
)]
struct Args {
    /// JSON file with custom dice types
    #[arg(short, long, env = "FACEROLL_REGISTRY")]
    registry: Option<PathBuf>,

    /// Seed for reproducible rolls
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print the rolled equation as JSON
    #[arg(long)]
    json: bool,

    /// Expression to roll
    #[arg(required = true, allow_hyphen_values = true)]
    expression: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faceroll=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let registry = match &args.registry {
        Some(path) => Registry::from_path(path)
            .with_context(|| format!("Failed to load registry {}", path.display()))?,
        None => Registry::new(),
    };
    tracing::debug!(types = registry.len(), "registry ready");

    let expression = args.expression.join(" ");
    let equation = match args.seed {
        Some(seed) => evaluate_with(&expression, &registry, &mut StdRng::seed_from_u64(seed)),
        None => evaluate(&expression, &registry),
    }?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&equation)?);
    } else {
        print!("{}", render(&equation));
    }

    Ok(())
}

fn render(equation: &Equation) -> String {
    let mut out = format!("{equation}\n");

    for (sign, term) in equation.terms() {
        let Term::Dice(dice) = term else {
            continue;
        };

        let faces: Vec<String> = dice.faces()
            .iter()
            .map(|face| dice.dice().face_name(&face.label).unwrap_or(&face.label).to_string())
            .collect();
        let sum = dice.sum().map_or_else(|| "-".to_string(), |sum| sum.to_string());

        out.push_str(&format!("  {sign} {}: [{}] = {sum}\n", dice.source(), faces.join(", ")));
    }

    for error in equation.errors() {
        out.push_str(&format!("  warning: {error}\n"));
    }

    let counters = equation.counters();
    for category in Category::ALL {
        if let Some(count) = counters.get(category) {
            out.push_str(&format!("{}: {count}\n", category.name()));
        }
    }

    match equation.headline() {
        Headline::Outcome(outcome) => {
            out.push_str(&format!("Total: {}\n", equation.total()));
            out.push_str(if outcome { "Outcome: pass\n" } else { "Outcome: fail\n" });
        },
        Headline::Counters(_) if equation.has_total() => {
            out.push_str(&format!("Total: {}\n", equation.total()));
        },
        Headline::Counters(_) => {},
        Headline::Total(total) => out.push_str(&format!("Total: {total}\n")),
        Headline::Nothing => out.push_str("Nothing to total\n"),
    }

    out
}
