//! `govmesh evaluate`: which roles a framework grants a set of holdings

use anyhow::{Context, Result};
use clap::Args;
use govmesh_governance::{collect_granted, evaluate_rules, GovernanceDoc, Holdings, HoldingsOracle};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Evaluate a governance framework offline
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Governance framework document (JSON)
    #[arg(long)]
    pub doc: PathBuf,

    /// Credential holdings (TOML); evaluates against no credentials if absent
    #[arg(long)]
    pub holdings: Option<PathBuf>,

    /// Print the decision of every rule
    #[arg(long)]
    pub explain: bool,
}

/// Read and parse a framework document
pub fn load_doc(path: &Path) -> Result<GovernanceDoc> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read framework {}", path.display()))?;
    let doc = GovernanceDoc::from_json_str(&text)
        .with_context(|| format!("Failed to parse framework {}", path.display()))?;
    for role in doc.undeclared_grants() {
        warn!(role, "framework grants a role it does not declare");
    }
    Ok(doc)
}

/// Handle `govmesh evaluate`
pub async fn run(args: EvaluateArgs) -> Result<()> {
    let doc = load_doc(&args.doc)?;
    let holdings = match &args.holdings {
        Some(path) => Holdings::load(path)?,
        None => Holdings::default(),
    };
    let oracle = HoldingsOracle::new(holdings);

    let decisions = evaluate_rules(&doc, &oracle).await;
    if args.explain {
        for decision in &decisions {
            println!(
                "rule {}: {} after {} condition(s) -> {:?}",
                decision.index,
                if decision.granted { "granted" } else { "denied" },
                decision.evaluated,
                decision.roles
            );
        }
    }

    let roles = collect_granted(decisions);
    info!(count = roles.len(), "roles granted");
    println!("{}", serde_json::to_string_pretty(&roles)?);
    Ok(())
}
