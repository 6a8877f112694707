use anyhow::Result;
use colored::Colorize;
use saga_engine::ValidationIssue;
use std::io::Write;
use std::time::Duration;

use crate::game_tester::ScenarioResult;

#[allow(clippy::cast_precision_loss)]
fn success_rate(results: &[ScenarioResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    (passed as f64 / results.len() as f64) * 100.0
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    total_duration: Duration,
) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Scenario Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "===========================".cyan())?;

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    writeln!(out, "Total runs: {total}")?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", (total - passed).to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(
            out,
            "{} {} (seed {})",
            status,
            result.scenario_name.bold(),
            result.seed
        )?;
        writeln!(
            out,
            "   Steps: {} | game time {:?} | wall time {:?}",
            result.steps_run, result.game_time, result.wall_time
        )?;
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn generate_json_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
) -> std::io::Result<()> {
    writeln!(out, "# Saga Scenario Results\n")?;

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total runs**: {total}")?;
    writeln!(out, "- **Passed**: {passed}")?;
    writeln!(out, "- **Failed**: {}", total - passed)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

    writeln!(out, "## Detailed Results\n")?;
    writeln!(out, "| Scenario | Seed | Result | Steps | Game time |")?;
    writeln!(out, "|---|---|---|---|---|")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(
            out,
            "| {} | {} | {} | {} | {:?} |",
            result.scenario_name, result.seed, status, result.steps_run, result.game_time
        )?;
    }

    let failed: Vec<&ScenarioResult> = results.iter().filter(|r| !r.passed).collect();
    if !failed.is_empty() {
        writeln!(out, "\n## Failures\n")?;
        for result in failed {
            writeln!(out, "### {} (seed {})\n", result.scenario_name, result.seed)?;
            for failure in &result.failures {
                writeln!(out, "- {failure}")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn generate_validation_report(
    out: &mut dyn Write,
    config_name: &str,
    issues: &[ValidationIssue],
) -> std::io::Result<()> {
    if issues.is_empty() {
        writeln!(out, "{} {config_name}: no issues found", "✅".green())?;
        return Ok(());
    }
    writeln!(
        out,
        "{} {config_name}: {} issue(s)",
        "⚠️".yellow(),
        issues.len()
    )?;
    for issue in issues {
        writeln!(out, "  • {issue}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: name.to_string(),
            seed: 7,
            passed,
            steps_run: 2,
            failures: if passed {
                Vec::new()
            } else {
                vec!["current station: expected Some(\"well\"), got None".to_string()]
            },
            game_time: Duration::from_secs(12),
            wall_time: Duration::from_millis(3),
        }
    }

    #[test]
    fn json_report_is_parseable() {
        let mut buffer = Vec::new();
        generate_json_report(&mut buffer, &[result("smoke", true)]).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed[0]["scenarioName"], "smoke");
        assert_eq!(parsed[0]["gameTime"], 12_000);
    }

    #[test]
    fn markdown_report_lists_failures() {
        let mut buffer = Vec::new();
        generate_markdown_report(&mut buffer, &[result("smoke", true), result("choice-yes", false)])
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("- **Success rate**: 50.0%"));
        assert!(text.contains("### choice-yes (seed 7)"));
        assert!(text.contains("expected Some(\"well\")"));
    }

    #[test]
    fn console_report_counts_runs() {
        let mut buffer = Vec::new();
        generate_console_report(&mut buffer, &[result("smoke", true)], Duration::from_secs(1))
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Total runs: 1"));
        assert!(text.contains("smoke"));
    }

    #[test]
    fn validation_report_lists_issues() {
        let mut buffer = Vec::new();
        let issues = vec![ValidationIssue::FreeHelpStation {
            station: "start".to_string(),
        }];
        generate_validation_report(&mut buffer, "Demo", &issues).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("1 issue(s)"));
        assert!(text.contains("help station start costs nothing"));
    }
}
