//! Policy table listing.

use crate::session::Session;
use crate::style::print_result_table;

/// Prints one row per rule set, in evaluation order.
pub fn run(session: &Session) {
    let mut rows = Vec::new();
    for (action, rule_sets) in session.authorizer.table().iter() {
        if rule_sets.is_empty() {
            rows.push(vec![
                action.to_string(),
                "-".to_string(),
                "-".to_string(),
                "always denied".to_string(),
                "-".to_string(),
            ]);
            continue;
        }
        for rule_set in rule_sets {
            let conditions = if rule_set.conditions.is_empty() {
                "-".to_string()
            } else {
                rule_set
                    .conditions
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            rows.push(vec![
                action.to_string(),
                rule_set.name.clone(),
                rule_set.requirement.to_string(),
                conditions,
                rule_set.denial_reason.clone(),
            ]);
        }
    }

    print_result_table(
        &["Action", "Rule set", "Requires", "Conditions", "Denial reason"],
        &rows,
        "rule set",
    );
}
