use colored::Colorize;
use modmig_migrator::{MigrationOutcome, Module, ModuleReport, ModuleStatus, RollbackReport};

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub fn render_rollback(report: &RollbackReport) -> Vec<String> {
    let mut lines = Vec::new();

    if report.modules.is_empty() && !report.cancelled {
        lines.push("No modules registered.".to_string());
    }

    for module in &report.modules {
        render_module(module, &mut lines);
    }

    if report.cancelled {
        lines.push(format!(
            "{} remaining modules were skipped.",
            "Rollback cancelled:".yellow()
        ));
    }

    lines
}

fn render_module(module: &ModuleReport, lines: &mut Vec<String>) {
    let slug = module.module.as_str();

    if module.nothing_to_rollback() {
        lines.push(format!("[{slug}] Nothing to rollback."));
    }

    for outcome in &module.outcomes {
        match outcome {
            MigrationOutcome::RolledBack { migration } => {
                lines.push(format!("{} [{slug}] {migration}", "Rolled back:".green()));
            }
            MigrationOutcome::Pretended {
                migration,
                statements,
            } => {
                lines.push(format!("{} [{slug}] {migration}", "Would roll back:".cyan()));
                if statements.is_empty() {
                    lines.push("    (no statements)".to_string());
                }
                for statement in statements {
                    lines.push(format!("    {statement}"));
                }
            }
        }
    }

    for orphan in &module.orphaned {
        lines.push(format!(
            "{} [{slug}] {} is recorded in batch {} but has no migration file",
            "Orphaned:".yellow(),
            orphan.migration,
            orphan.batch
        ));
    }

    if let Some(err) = &module.error {
        lines.push(format!("{} {err}", "Error:".red().bold()));
    }
}

pub fn render_status(statuses: &[ModuleStatus]) -> Vec<String> {
    let mut lines = Vec::new();

    for status in statuses {
        let last = status
            .last_batch
            .map(|b| format!("last batch {b}"))
            .unwrap_or_else(|| "nothing applied".to_string());
        lines.push(format!("{} ({last})", status.module.slug.as_str().bold()));

        for record in &status.applied {
            lines.push(format!(
                "  {} batch {:<4} {}",
                "applied ".green(),
                record.batch,
                record.migration
            ));
        }
        for migration in &status.pending {
            lines.push(format!("  {}            {migration}", "pending ".yellow()));
        }
        for record in &status.orphaned {
            lines.push(format!(
                "  {} batch {:<4} {} (file missing)",
                "orphaned".red(),
                record.batch,
                record.migration
            ));
        }
    }

    lines
}

pub fn render_modules(modules: &[Module]) -> Vec<String> {
    if modules.is_empty() {
        return vec!["No modules registered.".to_string()];
    }

    modules
        .iter()
        .map(|m| format!("  {:<20} {}", m.slug.as_str(), m.migration_dir.display()))
        .collect()
}
