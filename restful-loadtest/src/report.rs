//! Prints the results of a load test run to stdout.

use std::time::Duration;

use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::error::Step;
use crate::runner::{Metrics, Report};

impl Report {
    /// Prints per-step latencies, iteration totals and failures.
    pub fn print(&self) {
        let Report {
            users,
            elapsed,
            metrics,
        } = self;
        let elapsed = *elapsed;

        println!();
        println!(
            "{} (users: {}, duration: {:.2?})",
            "## Restful API Test".bold(),
            users.bold(),
            elapsed
        );

        for step in Step::ALL {
            print_step(metrics, step, elapsed);
        }

        println!();
        println!("{}", "## TOTALS".bold());
        print_totals(metrics, elapsed);
    }
}

fn print_step(metrics: &Metrics, step: Step, duration: Duration) {
    let step_metrics = metrics.step(step);
    let label = format!("{}:", step.as_str().to_uppercase());
    let ops = step_metrics.timing.count();

    if ops == 0 && step_metrics.failures == 0 {
        return;
    }

    print!("{} ({} ops", label.bold().green(), ops.bold());
    if step_metrics.failures > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", step_metrics.failures).bold().red()
        );
    }
    println!(")");

    if ops > 0 {
        print_ops(&step_metrics.timing, duration);
        println!();
        print_percentiles(&step_metrics.timing);
    }
}

fn print_totals(metrics: &Metrics, duration: Duration) {
    print!(
        "{} ({} iterations",
        "ITERATIONS:".bold().green(),
        metrics.iterations().bold()
    );
    if metrics.failures() > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", metrics.failures()).bold().red()
        );
    }
    println!(")");

    if metrics.successes > 0 {
        print_ops(&metrics.iteration_timing, duration);
        println!();
        print_percentiles(&metrics.iteration_timing);
    }

    let failures = [
        ("status", metrics.status_failures),
        ("extraction", metrics.extraction_failures),
        ("consistency", metrics.consistency_failures),
        ("transport", metrics.transport_failures),
    ];
    for (kind, count) in failures {
        if count > 0 {
            println!("  {kind} failures: {}", count.bold().red());
        }
    }
}

fn print_percentiles(sketch: &DDSketch) {
    let ops = sketch.count();
    let quantile = |q| sketch.quantile(q).ok().flatten().map(Duration::from_secs_f64);

    let (Some(sum), Some(p50), Some(p90), Some(p99)) =
        (sketch.sum(), quantile(0.5), quantile(0.9), quantile(0.99))
    else {
        return;
    };

    let avg = Duration::from_secs_f64(sum / ops as f64);
    println!(
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

fn print_ops(sketch: &DDSketch, duration: Duration) {
    let ops = sketch.count();
    let ops_ps = ops as f64 / duration.as_secs_f64();
    print!("  {:.2} operations/s", ops_ps.bold());
}
