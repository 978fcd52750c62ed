//! Rendering recommendations as tables or JSON.

use keystone::Recommendation;

use crate::error::Result;
use crate::OutputFormat;

/// Prints a recommendation in the selected format.
pub fn print_recommendation(
    recommendation: &Recommendation,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(recommendation)
                .map_err(|e| anyhow::anyhow!("serializing recommendation: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Table => print_table(recommendation),
    }
    Ok(())
}

fn print_table(recommendation: &Recommendation) {
    println!(
        "objective {:.2}, total size {:.0} bytes{}",
        recommendation.objective,
        recommendation.total_size,
        if recommendation.timed_out { " (deadline hit)" } else { "" }
    );

    println!("\nindexes ({}):", recommendation.indexes.len());
    for index in &recommendation.indexes {
        println!(
            "  {}  [{}][{}] -> [{}] over {}  ({:.0} bytes)",
            index.key,
            index.hash.join(", "),
            index.order.join(", "),
            index.extra.join(", "),
            index.path.join("."),
            index.size,
        );
    }

    println!("\nquery plans ({}):", recommendation.queries.len());
    for query in &recommendation.queries {
        println!("  {} (weight {}, cost {:.2})", query.statement, query.weight, query.cost);
        for step in &query.steps {
            println!("    {step}");
        }
    }

    if !recommendation.updates.is_empty() {
        println!("\nupdate plans ({}):", recommendation.updates.len());
        for update in &recommendation.updates {
            println!("  {} -> {} (cost {:.2})", update.statement, update.index_key, update.cost);
            for query in &update.support_queries {
                println!("    support: {query}");
            }
            for step in &update.steps {
                println!("    {step}");
            }
        }
    }

    if let Some(schedule) = &recommendation.schedule {
        println!("\nschedule:");
        for (step, keys) in schedule.iter().enumerate() {
            println!("  step {step}: {}", keys.join(", "));
        }
    }
}
