//! Source Validation Binary
//!
//! Checks `tracking/sources.yml` and `tracking/lexicon.yml` before a
//! scheduled run picks them up.

use anyhow::{Context, Result};
use std::path::PathBuf;

use class_action_finder::config::SourcesFile;
use class_action_finder::eligibility::{Lexicon, ProofClassifier};

fn main() -> Result<()> {
    let root = PathBuf::from(std::env::var("ROOT").unwrap_or_else(|_| ".".to_string()));

    println!("=== Source Configuration Validator ===");

    let path = SourcesFile::path(&root);
    if !path.exists() {
        println!("No {:?}; the built-in sources will be used", path);
    }
    let sources = SourcesFile::load(&root).context("Failed to load sources.yml")?;

    let (mut errors, warnings) = sources.validate();

    // A lexicon that does not compile would fail every run
    if let Err(e) = Lexicon::load(&root).and_then(|lexicon| ProofClassifier::new(&lexicon)) {
        errors.push(format!("Lexicon: {}", e));
    }

    if errors.is_empty() && warnings.is_empty() {
        println!("✓ All {} sources are valid", sources.sources.len());
        return Ok(());
    }

    if !errors.is_empty() {
        println!("\n❌ ERRORS (must fix):");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    if !warnings.is_empty() {
        println!("\n⚠️  WARNINGS:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    if !errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
