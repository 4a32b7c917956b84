use crate::output::print_json;
use anyhow::{Context, Result};
use basex_core::{dispatch, SemanticAction};
use std::path::Path;

pub fn run(file: &Path, json: bool) -> Result<()> {
    let body = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let action = SemanticAction::parse(&body)?;
    let handler = dispatch::route(&action)?;

    if json {
        print_json(&serde_json::json!({
            "type": action.type_name,
            "identifier": action.identifier,
            "handler": handler.as_str(),
        }))?;
    } else {
        match &action.identifier {
            Some(id) => println!("{} ({id}) -> {handler}", action.type_name),
            None => println!("{} -> {handler}", action.type_name),
        }
    }
    Ok(())
}
