//! Recursive knowledge-file discovery and ingestion.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use herald_dispatch::RuleRegistry;
use tracing::{debug, warn};

use crate::asset::{knowledge_rule, KnowledgeAsset};
use crate::platforms::{path_context_expression, path_context_terms};

/// Every `.yaml` file under `root`, recursively, in sorted path order.
/// Sorted order fixes registration order, and with it first-match
/// precedence, across runs.
pub fn discover_rule_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_rule_files(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_rule_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("reading knowledge directory {}", dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("reading knowledge directory {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_rule_files(&path, files)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("yaml") {
            files.push(path);
        }
    }
    Ok(())
}

/// Parses every discovered file into an asset, injecting path-derived
/// platform context and compiling match expressions. A file that fails to
/// parse or compile is logged and skipped; the rest still load.
pub fn load_assets(root: &Path) -> Result<Vec<KnowledgeAsset>> {
    let files = discover_rule_files(root)?;
    let mut assets = Vec::new();
    for path in &files {
        match load_asset_file(path) {
            Ok(asset) => assets.push(asset),
            Err(error) => warn!("skipping knowledge file {}: {error:#}", path.display()),
        }
    }
    Ok(assets)
}

fn load_asset_file(path: &Path) -> Result<KnowledgeAsset> {
    debug!("loading knowledge entry from {}", path.display());
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut asset: KnowledgeAsset =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    apply_path_context(&mut asset, &path.to_string_lossy());
    asset
        .on
        .compile_expressions()
        .with_context(|| format!("compiling match expression in {}", path.display()))?;
    Ok(asset)
}

/// A platform named by the file's own path tightens the asset's condition:
/// the platform's alias terms must also match, and any textual expression
/// picks up a platform clause.
fn apply_path_context(asset: &mut KnowledgeAsset, path: &str) {
    let terms = path_context_terms(path);
    if !terms.is_empty() {
        asset.on.terms.extend(terms);
    }
    if let Some(expr) = asset.on.expr.as_deref() {
        if !expr.is_empty() {
            if let Some(platform_expr) = path_context_expression(path) {
                asset.on.expr = Some(format!("{platform_expr} and {expr}"));
            }
        }
    }
}

/// Loads every asset under `root` and registers its rule. Returns how many
/// rules were registered.
pub fn register_knowledge_rules(root: &Path, registry: &RuleRegistry) -> Result<usize> {
    let assets = load_assets(root)?;
    let count = assets.len();
    for asset in assets {
        registry.register(knowledge_rule(asset));
    }
    Ok(count)
}
