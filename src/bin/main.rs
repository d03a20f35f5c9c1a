extern crate gsim;
use std::sync::Arc;
use anyhow::{anyhow, Context as _, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use gsim::cli;
use gsim::config::{Dataset, RunParams};
use gsim::context::{create_context, Context, Status};
use gsim::output::{dump_table, energy_summary};
use gsim::scheduler::Scheduler;

/// Prints the body table every time a new day is published, until the run stops
fn report(ctx: &Context, params: &RunParams) {
    let period = match params.report_frequency.period() {
        Some(period) => period.as_duration(),
        None => return,
    };

    if ctx.wait_until_running() != Status::Running {
        return;
    }

    let mut last_day = None;
    loop {
        let stopped = ctx.is_stopped();
        let report = {
            let state = ctx.read();
            if last_day != Some(state.day) {
                last_day = Some(state.day);
                Some((dump_table(&state.bodies(), Some(state.day)), energy_summary(state.store())))
            } else {
                None
            }
        };
        if let Some((table, energy)) = report {
            println!("{}\n{}", table, energy);
        }
        if stopped {
            break;
        }
        std::thread::sleep(period);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gsim=info".parse()?))
        .init();

    let matches = cli::parse_command_line();
    let path = cli::dataset_path(&matches)?;
    let dataset = Dataset::load(&path).with_context(|| format!("loading {}", path.display()))?;

    let mut params = dataset.simulation;
    cli::apply_overrides(&matches, &mut params)?;

    let bodies = dataset.bodies()?;
    let ctx = Arc::new(create_context(&bodies, params.view_radius())?);
    println!("{}", dump_table(&ctx.bodies(), None));

    let mut scheduler = Scheduler::new(&params)?;
    if !params.paced {
        scheduler = scheduler.unpaced();
    }

    let simulation = {
        let ctx = Arc::clone(&ctx);
        std::thread::Builder::new()
            .name("simulation".to_string())
            .spawn(move || scheduler.run(&ctx))?
    };

    let reporter = {
        let ctx = Arc::clone(&ctx);
        std::thread::Builder::new()
            .name("reporter".to_string())
            .spawn(move || report(&ctx, &params))?
    };

    let summary = simulation.join().map_err(|_| anyhow!("simulation thread panicked"))?;
    reporter.join().map_err(|_| anyhow!("reporter thread panicked"))?;
    let summary = summary?;

    info!(
        days = summary.days,
        steps = summary.steps,
        simulated_days = summary.simulated.as_days(),
        cancelled = summary.cancelled,
        "done"
    );
    Ok(())
}
