/*!
 * Kernel Driver - Main Entry Point
 *
 * Boots the two subsystems and exercises them:
 * - runs the intersection simulation and reports collisions
 * - starts a program that forks children, each of which execs another
 *   program with arguments, and reaps them
 */

use anyhow::{bail, Context, Result};
use edu_kernel::{
    init_tracing, KernelConfig, ProcessManager, ProgramRegistry, Simulation, UserContext, UserPtr,
    WaitStatus,
};
use std::sync::Arc;
use tracing::{info, warn};

const ARGTEST: &str = "/testbin/argtest";
const FORKTEST: &str = "/testbin/forktest";

/// Logs its arguments and exits with argc
fn argtest(ctx: &mut UserContext) -> i32 {
    match ctx.args() {
        Ok(args) => {
            info!(pid = ctx.getpid(), ?args, "argtest running");
            args.len() as i32
        }
        Err(e) => {
            warn!(error = %e, "argtest could not read its arguments");
            -1
        }
    }
}

/// Forks `children` children that exec argtest, then reaps them all
fn forktest(ctx: &mut UserContext, children: usize) -> i32 {
    let mut pids = Vec::with_capacity(children);
    for child in 0..children {
        let forked = ctx.fork(move |ctx| {
            let args = [ARGTEST.to_string(), format!("child-{child}"), "hello".to_string()];
            let exec = ctx
                .push_str(ARGTEST)
                .and_then(|path| ctx.push_argv(&args).map(|argv| (path, argv)));
            match exec {
                Ok((path, argv)) => {
                    let err = ctx.execv(path, argv);
                    warn!(error = %err, "execv failed");
                }
                Err(e) => warn!(error = %e, "could not build argv"),
            }
            1
        });
        match forked {
            Ok(pid) => pids.push(pid),
            Err(e) => {
                warn!(error = %e, "fork failed");
                break;
            }
        }
    }

    let status = match ctx.alloc(4) {
        Ok(ptr) => ptr,
        Err(_) => UserPtr::NULL,
    };
    let mut failures = 0;
    for pid in pids {
        match ctx.waitpid(pid, status, 0) {
            Ok(_) if !status.is_null() => {
                let raw = ctx.read_i32(status).unwrap_or(-1);
                info!(child = pid, status = %WaitStatus::from_raw(raw), "child reaped");
            }
            Ok(_) => info!(child = pid, "child reaped"),
            Err(e) => {
                warn!(child = pid, error = %e, "waitpid failed");
                failures += 1;
            }
        }
    }
    failures
}

fn main() -> Result<()> {
    init_tracing();

    info!("Kernel driver starting...");
    info!("================================================");

    let config = KernelConfig::from_env().context("reading kernel configuration")?;
    config.validate().context("validating kernel configuration")?;

    info!("Running intersection simulation...");
    let report = Simulation::from_config(&config).run();
    info!(report = %serde_json::to_string(&report)?, "Simulation report");
    if report.collisions > 0 {
        bail!("{} collisions in the intersection", report.collisions);
    }

    info!("Initializing process manager...");
    let registry = Arc::new(ProgramRegistry::new());
    registry.register(ARGTEST, argtest);
    registry.register(FORKTEST, |ctx| forktest(ctx, 4));

    let manager = ProcessManager::builder()
        .with_config(config)
        .with_loader(registry)
        .build();

    let init = manager
        .spawn_program(FORKTEST, &[FORKTEST])
        .context("starting forktest")?;
    let status = manager.join(&init);
    info!(pid = init.pid(), %status, "forktest finished");

    for info in manager.list() {
        warn!(?info, "process left in table");
    }
    if let Some(signal) = status.term_signal() {
        bail!("forktest killed by signal {signal}");
    }
    if status.exit_code() != 0 {
        bail!("forktest reported {} failures", status.exit_code());
    }

    info!("Kernel driver finished");
    Ok(())
}
