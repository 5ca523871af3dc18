//! Rules command implementation

use colored::Colorize;
use serde::Serialize;

use loadout_core::rules::{Actions, Signature, table};

use crate::error::Result;

#[derive(Serialize)]
struct RuleRow {
    signature: Signature,
    actions: Actions,
}

/// Print the action table, one rule per line.
pub fn run_rules(json: bool) -> Result<()> {
    if json {
        let rows: Vec<RuleRow> = table::rules()
            .map(|(signature, actions)| RuleRow { signature, actions })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (signature, actions) in table::rules() {
        let rendered = actions.to_string();
        let actions = if actions.is_warning() {
            rendered.yellow()
        } else if actions == Actions::DO_NOTHING {
            rendered.dimmed()
        } else {
            rendered.normal()
        };
        println!("{} => {}", signature.to_string().cyan(), actions);
    }
    Ok(())
}
