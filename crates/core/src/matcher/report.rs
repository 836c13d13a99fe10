//! Plain-text rendering of a ranked match list.

use super::types::{MatchStatus, TrialMatch};

/// Report text for an empty match list.
pub const NO_TRIALS_FOUND: &str = "No clinical trials found matching the patient's profile.";

const HEAVY_RULE_WIDTH: usize = 80;

/// Render matches in the order given. Pure: same input, same output.
pub fn render_report(matches: &[TrialMatch]) -> String {
    if matches.is_empty() {
        return NO_TRIALS_FOUND.to_string();
    }

    let heavy_rule = "=".repeat(HEAVY_RULE_WIDTH);
    let light_rule = "-".repeat(HEAVY_RULE_WIDTH);
    let count = |status: MatchStatus| {
        matches
            .iter()
            .filter(|m| m.match_status == status)
            .count()
    };

    let mut lines = vec![
        heavy_rule.clone(),
        "CLINICAL TRIAL MATCHING REPORT".to_string(),
        heavy_rule.clone(),
        format!("\nTotal Trials Evaluated: {}", matches.len()),
        format!("Qualified: {}", count(MatchStatus::Qualified)),
        format!("Not Qualified: {}", count(MatchStatus::NotQualified)),
        format!("Needs More Information: {}", count(MatchStatus::NeedsMoreInfo)),
        String::new(),
    ];

    for (i, m) in matches.iter().enumerate() {
        lines.push(light_rule.clone());
        lines.push(format!("\n{}. {}", i + 1, m.trial_name));
        lines.push(format!("   Trial ID: {}", m.trial_id));
        lines.push(format!("   Status: {}", m.match_status));
        lines.push(format!("   Confidence: {:.2}%", m.confidence_score * 100.0));
        lines.push(format!("   Contact: {}", m.contact_info));

        push_criteria(
            &mut lines,
            "✓ Inclusion Criteria Met",
            &m.inclusion_criteria_met,
        );
        push_criteria(
            &mut lines,
            "✗ Inclusion Criteria Not Met",
            &m.inclusion_criteria_not_met,
        );
        push_criteria(
            &mut lines,
            "⚠ Exclusion Criteria Violated",
            &m.exclusion_criteria_violated,
        );

        lines.push("\n   Reasoning:".to_string());
        lines.extend(reasoning_lines(&m.reasoning));
        lines.push(String::new());
    }

    lines.push(heavy_rule.clone());
    lines.push("END OF REPORT".to_string());
    lines.push(heavy_rule);

    lines.join("\n")
}

fn push_criteria(lines: &mut Vec<String>, heading: &str, criteria: &[String]) {
    if criteria.is_empty() {
        return;
    }
    lines.push(format!("\n   {} ({}):", heading, criteria.len()));
    lines.extend(criteria.iter().map(|c| format!("     • {}", c)));
}

/// Split on ". " and put each piece on its own line, period-terminated.
fn reasoning_lines(reasoning: &str) -> impl Iterator<Item = String> + '_ {
    reasoning
        .split(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.ends_with('.') {
                format!("     {}", s)
            } else {
                format!("     {}.", s)
            }
        })
}
