//! Wayfarer - 命令行前端
//!
//! 入口：初始化日志、构建组件，逐行读取旅行需求并运行行程规划。

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use wayfarer::agent::{ResultSource, RunControl, TaskOutcome, TripPlan};
use wayfarer::core::{create_agent_builder, AgentError};

const HELP: &str = "\
Describe the trip you want, for example:
  5 days in Lisbon for 2 people in May, mid-range budget, love food and history
Commands:
  help                 show this message
  exit | quit | bye | q  leave";

fn print_summary(outcome: &TaskOutcome<TripPlan>) {
    let plan = &outcome.result;
    let overview = &plan.itinerary.overview;
    if let ResultSource::Fallback { reason } = &outcome.source {
        println!("[fallback plan: {}]", reason);
    }
    println!("Session: {}", plan.session_id);
    if !plan.message.is_empty() {
        println!("{}", plan.message);
    }
    println!(
        "{} -> {} | {} day(s), {} traveller(s) | {} to {} | est. {}",
        overview.start_location,
        overview.destination_location,
        overview.duration_days,
        overview.people_count,
        overview.start_date,
        overview.end_date,
        overview.estimated_overall_cost
    );
    if !overview.summary.is_empty() {
        println!("{}", overview.summary);
    }
    for city in &plan.itinerary.cities {
        println!(
            "\n== {} -> {} ({}) ==",
            city.travel.from, city.travel.to, city.travel.option
        );
        if !city.accommodation.name.is_empty() {
            println!(
                "Stay: {} ({} {})",
                city.accommodation.name,
                city.accommodation.price.amount,
                city.accommodation.price.currency
            );
        }
        for day in &city.days {
            println!("  {} {}: {}", day.day_number, day.date, day.title);
            for activity in &day.activities {
                println!("    - {}", activity.title);
            }
        }
    }
    println!("\n({} completion round(s))", outcome.rounds);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wayfarer::observability::init();

    let components = create_agent_builder(None)
        .build()
        .context("Failed to build agent")?;

    println!("Wayfarer trip planner. Type 'help' for usage.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let input = line.trim();
        match input.to_lowercase().as_str() {
            "" => continue,
            "help" => {
                println!("{}", HELP);
                continue;
            }
            "exit" | "quit" | "bye" | "q" => break,
            _ => {}
        }

        let control = RunControl::default();
        let cancel = control.cancel.clone();
        let run = components.trip.plan_with(input, None, control);
        tokio::pin!(run);
        let outcome = tokio::select! {
            res = &mut run => res,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                run.await
            }
        };
        match outcome {
            Ok(outcome) => print_summary(&outcome),
            Err(AgentError::Cancelled) => println!("Cancelled."),
            Err(e) => println!("Error: {}", e),
        }
    }
    Ok(())
}
