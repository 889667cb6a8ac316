use anyhow::{Context, Result, bail};
use colored::Colorize;
use modmig_migrator::{CancelToken, ModuleLocator, RollbackReport, RollbackScope, should_proceed};
use tracing::warn;

use crate::context::AppContext;
use crate::report;

pub struct RollbackArgs {
    pub module: Option<String>,
    pub database: Option<String>,
    pub force: bool,
    pub pretend: bool,
}

pub async fn run(ctx: &AppContext, args: RollbackArgs) -> Result<()> {
    if !may_proceed(&ctx.config().environment, args.force, confirm)? {
        println!("Rollback cancelled.");
        return Ok(());
    }

    let scope = RollbackScope::from(args.module);
    if let RollbackScope::Module(slug) = &scope
        && ctx.module_locator().find(slug)?.is_none()
    {
        bail!("unknown module: {slug}");
    }

    let Some(orchestrator) = ctx.orchestrator(args.database.as_deref(), args.pretend)? else {
        println!("Nothing to rollback.");
        return Ok(());
    };

    // Poll once so the Ctrl-C handler is installed before any migration runs.
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let early = tokio::select! {
        biased;
        signal = &mut interrupt => Some(signal),
        () = std::future::ready(()) => None,
    };
    let listening = match early {
        None => true,
        Some(Ok(())) => bail!("rollback cancelled before it started"),
        Some(Err(e)) => {
            warn!("cannot listen for Ctrl-C: {e}");
            false
        }
    };

    let cancel = CancelToken::new();
    let orchestrator = orchestrator.with_cancel(cancel.clone());
    let mut task = tokio::task::spawn_blocking(move || orchestrator.run(&scope));

    let joined = tokio::select! {
        joined = &mut task => joined,
        signal = &mut interrupt, if listening => {
            if signal.is_ok() {
                warn!("interrupt received, stopping at the next migration boundary");
                cancel.cancel();
            }
            task.await
        }
    };
    let report = joined.context("rollback task failed")??;

    report::print_lines(&report::render_rollback(&report));
    exit_status(&report)?;

    if !report.pretend && report.rolled_back() > 0 {
        println!("{} migration(s) rolled back.", report.rolled_back());
    }

    Ok(())
}

/// Outside production, or with `--force`, no prompt is shown.
fn may_proceed(
    environment: &str,
    force: bool,
    confirm: impl FnOnce(&str) -> Result<bool>,
) -> Result<bool> {
    if should_proceed(environment, force) {
        return Ok(true);
    }
    confirm(environment)
}

/// The first fatal error, then an interrupt, decides a non-zero exit.
fn exit_status(report: &RollbackReport) -> Result<()> {
    if let Some((module, err)) = report.first_error() {
        match err.migration() {
            Some(_) => bail!("{err}"),
            None => bail!("rollback of module {module} failed: {err}"),
        }
    }

    if report.cancelled {
        bail!("rollback cancelled; remaining modules were skipped");
    }

    Ok(())
}

fn confirm(environment: &str) -> Result<bool> {
    println!(
        "{}",
        format!("Application is in {environment}!").yellow().bold()
    );

    dialoguer::Confirm::new()
        .with_prompt("Do you really wish to run this command?")
        .default(false)
        .interact()
        .context("failed to read confirmation")
}

#[cfg(test)]
mod tests {
    use super::{exit_status, may_proceed};
    use modmig_common::Error;
    use modmig_migrator::{MigrationOutcome, ModuleReport, RollbackReport};
    use std::cell::Cell;

    fn module_report(slug: &str, error: Option<Error>) -> ModuleReport {
        ModuleReport {
            module: slug.into(),
            batch: Some(1),
            outcomes: Vec::new(),
            orphaned: Vec::new(),
            error,
        }
    }

    #[test]
    fn clean_run_exits_zero() {
        let mut billing = module_report("billing", None);
        billing.outcomes.push(MigrationOutcome::RolledBack {
            migration: "m1".into(),
        });
        let report = RollbackReport {
            modules: vec![billing],
            ..RollbackReport::default()
        };

        assert!(exit_status(&report).is_ok());
    }

    #[test]
    fn first_fatal_error_carries_its_identifier() {
        let report = RollbackReport {
            modules: vec![
                module_report("users", None),
                module_report(
                    "billing",
                    Some(Error::MigrationRevert {
                        module: "billing".into(),
                        migration: "2024_01_02_add_index".into(),
                        cause: "no such index".into(),
                    }),
                ),
                module_report(
                    "audit",
                    Some(Error::UnresolvableUnit {
                        module: "audit".into(),
                        migration: "m9".into(),
                        reason: "gone".into(),
                    }),
                ),
            ],
            ..RollbackReport::default()
        };

        let err = exit_status(&report).unwrap_err();
        assert_eq!(
            err.to_string(),
            "rollback of [billing] 2024_01_02_add_index failed: no such index"
        );
    }

    #[test]
    fn module_level_error_names_the_module() {
        let report = RollbackReport {
            modules: vec![module_report(
                "billing",
                Some(Error::Database("database is locked".into())),
            )],
            ..RollbackReport::default()
        };

        let err = exit_status(&report).unwrap_err();
        assert_eq!(
            err.to_string(),
            "rollback of module billing failed: database error: database is locked"
        );
    }

    #[test]
    fn interrupted_run_exits_non_zero() {
        let report = RollbackReport {
            cancelled: true,
            ..RollbackReport::default()
        };

        assert!(
            exit_status(&report)
                .unwrap_err()
                .to_string()
                .contains("cancelled")
        );
    }

    #[test]
    fn declined_prompt_stops_the_rollback() {
        let asked = Cell::new(0);
        let proceed = may_proceed("production", false, |env| {
            asked.set(asked.get() + 1);
            assert_eq!(env, "production");
            Ok(false)
        })
        .unwrap();

        assert!(!proceed);
        assert_eq!(asked.get(), 1);
    }

    #[test]
    fn prompt_is_skipped_outside_production_or_with_force() {
        let never = |_: &str| -> anyhow::Result<bool> { panic!("prompt should not be shown") };

        assert!(may_proceed("local", false, never).unwrap());
        assert!(may_proceed("production", true, never).unwrap());
    }

    #[test]
    fn unreadable_prompt_is_an_error() {
        let result = may_proceed("prod", false, |_| anyhow::bail!("not a terminal"));
        assert!(result.is_err());
    }
}
