use plume_graph::{CoverageOutcome, LoadStats, NodeId};
use plume_locator::{RunReport, Termination};

pub fn render_run_report(report: &RunReport, coverage: &CoverageOutcome, load: &LoadStats) -> String {
    let mut md = String::new();
    md.push_str("# Plume localization report\n\n");
    md.push_str(&format!("- Sink: `{}`\n", report.sink));
    md.push_str(&format!("- Simulated origin: `{}`\n", report.origin));
    md.push_str(&format!(
        "- Records: `{}` accepted, `{}` skipped\n",
        load.accepted, load.skipped
    ));
    md.push_str(&format!(
        "- Universe: `{}` nodes (`{}` candidates)\n",
        report.universe, report.initial_candidates
    ));
    match coverage {
        CoverageOutcome::Dominators(_) => md.push_str("- Coverage: `dominators`\n"),
        CoverageOutcome::Degenerate { cause, .. } => md.push_str(&format!(
            "- Coverage: `degenerate` ({})\n",
            escape_cell(&cause.to_string())
        )),
    }
    md.push_str(&format!("- Outcome: {}\n\n", describe(&report.termination)));

    md.push_str("## Rounds\n\n");
    md.push_str("| round | B | sensors | positive | discarded | remaining |\n");
    md.push_str("|---:|---:|---|---|---:|---:|\n");
    for round in &report.rounds {
        let sensors = round
            .picks
            .iter()
            .map(|p| format!("{} (+{})", p.id, p.gain))
            .collect::<Vec<_>>()
            .join(", ");
        let positive = round
            .readings
            .iter()
            .filter(|r| r.reading.is_positive())
            .map(|r| r.id.to_string())
            .collect::<Vec<_>>();
        md.push_str(&format!(
            "| `{}` | `{}` | {} | {} | `{}` | `{}` |\n",
            round.round,
            round.budget,
            sensors,
            if positive.is_empty() {
                "-".to_string()
            } else {
                positive.join(", ")
            },
            round.discarded.len(),
            round.remaining
        ));
    }
    md.push('\n');

    if let Termination::Found {
        path: Some(path), ..
    } = &report.termination
    {
        md.push_str("## Path to sink\n\n");
        md.push_str(&format!("`{}`\n", join_path(path)));
    }

    md
}

fn describe(termination: &Termination) -> String {
    match termination {
        Termination::Found { origin, path } => match path {
            Some(path) => format!("found `{origin}` ({} hops to sink)", path.len().saturating_sub(1)),
            None => format!("found `{origin}` (no path available)"),
        },
        Termination::Exhausted => "exhausted: every candidate was ruled out".to_string(),
        Termination::Stalled { remaining } => format!(
            "stalled with `{}` candidates left (no sensor fits the round budget)",
            remaining.len()
        ),
    }
}

fn join_path(path: &[NodeId]) -> String {
    path.iter()
        .map(NodeId::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_graph::{DominanceIndex, FlowEdge, FlowGraph};
    use plume_locator::{Localizer, LocatorConfig, NullRecorder};

    #[test]
    fn report_lists_rounds_and_path() {
        let mut graph = FlowGraph::new();
        for (from, to) in [(3, 2), (2, 1), (1, 0)] {
            graph.add_edge(NodeId(from), NodeId(to), FlowEdge::default());
        }
        let coverage = DominanceIndex::build(&graph, NodeId(0)).expect("coverage");
        let config = LocatorConfig::new(NodeId(0))
            .with_sensors_per_round(1)
            .with_origin(NodeId(3));
        let report = Localizer::new(&graph, coverage.index(), config)
            .expect("localizer")
            .run_simulated(&mut NullRecorder);

        let md = render_run_report(
            &report,
            &coverage,
            &LoadStats {
                accepted: 3,
                skipped: 1,
            },
        );

        assert!(md.contains("- Sink: `0`"));
        assert!(md.contains("`3` accepted, `1` skipped"));
        assert!(md.contains("- Coverage: `dominators`"));
        assert!(md.contains("found `3` (3 hops to sink)"));
        assert!(md.contains("| `1` | `2` | 2 (+2) | 2 | `1` | `2` |"));
        assert!(md.contains("`3 -> 2 -> 1 -> 0`"));
    }

    #[test]
    fn describes_unsuccessful_runs() {
        assert!(describe(&Termination::Exhausted).starts_with("exhausted"));
        assert!(describe(&Termination::Stalled {
            remaining: vec![NodeId(1), NodeId(2)]
        })
        .contains("`2` candidates"));
    }
}
