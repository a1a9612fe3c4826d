use anyhow::Result;
use queue_balancer_core::{BalancePlan, ExecutedPass, MonitoredQueue, PlanSummary};
use serde_json::json;

fn print_queues(queues: &[MonitoredQueue], delta_header: &str) {
    println!(
        "{:<40} {:>10} {:>8} {:>12} {:>10}",
        "QUEUE", "DEPTH", "BOUND", delta_header, "FLAGGED"
    );
    println!("{}", "-".repeat(84));
    for queue in queues {
        println!(
            "{:<40} {:>10} {:>8} {:>12} {:>10}",
            queue.name(),
            queue.observed_depth(),
            if queue.clients_bound() { "yes" } else { "no" },
            queue.target_delta(),
            if queue.rebalance_flag() { "yes" } else { "" }
        );
    }
}

fn print_summary(summary: &PlanSummary) {
    println!("Total messages:     {}", summary.total_msgs);
    println!("Bound queues:       {}", summary.ready_queues);
    println!("Average target:     {}", summary.average_target);
    println!("Remainder:          {}", summary.remainder);
    if let Some(recipient) = &summary.remainder_recipient {
        println!("Remainder goes to:  {}", recipient);
    }
}

pub(crate) fn print_plan(plan: &BalancePlan, as_json: bool) -> Result<()> {
    if as_json {
        let output = json!({
            "rebalance_needed": plan.rebalance_needed(),
            "summary": plan.summary(),
            "queues": plan.queues(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_summary(plan.summary());
    println!();
    print_queues(plan.queues(), "DELTA");
    println!();
    println!(
        "Rebalance required: {}",
        if plan.rebalance_needed() { "yes" } else { "no" }
    );
    Ok(())
}

pub(crate) fn print_execution(executed: &ExecutedPass, as_json: bool) -> Result<()> {
    let report = &executed.report;
    if as_json {
        let output = json!({
            "report": report,
            "progress_percent": report.progress_percent(),
            "queues": executed.queues,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_queues(&executed.queues, "REMAINING");
    println!();
    println!(
        "Moved {} of {} planned messages ({}%)",
        report.completed_moves,
        report.planned_moves,
        report.progress_percent()
    );
    if !report.abandoned_queues.is_empty() {
        println!("Abandoned queues:   {}", report.abandoned_queues.join(", "));
    }
    Ok(())
}
