//! Line-oriented workload file loader.
//!
//! The format declares entities, then weighted statements:
//!
//! ```text
//! # Twitter-shaped example
//! Entity User * 100 [
//!     UserId: id
//!     City: string 20
//!     Username: string 30
//! ]
//! Entity Tweet * 1000 [
//!     TweetId: id
//!     Body: string 140
//!     User: fk User one
//! ]
//!
//! Budget 100000
//! Mix evening
//!
//! Q 5.0 SELECT Username FROM User WHERE User.City = ?
//! Group writes default=1.0 evening=0.5 [
//!     UPDATE User SET Username = ? WHERE User.City = ?
//! ]
//! TimeSteps 2
//! F [1.0, 3.0] SELECT Body FROM Tweet.User WHERE User.City = ?
//! ```
//!
//! `Q` adds a fixed-weight statement, `Group` adds statements with one
//! weight per mix label, and `F` adds statements with one weight per time
//! step. `#` starts a comment.

use std::collections::BTreeMap;

use keystone_model::{Cardinality, EntityDef, ModelBuilder};
use keystone_query::{Weights, Workload};

use crate::error::{Error, Result};

/// Parses a workload file.
///
/// The model is built first, then every statement is parsed against it.
/// Invalid statements are recorded on the workload (so `check` can report
/// them all) rather than failing the load.
///
/// # Errors
///
/// Returns [`Error::Loader`] for malformed lines and [`Error::Model`] if
/// the declared model is inconsistent.
pub fn load_workload(text: &str) -> Result<Workload> {
    let mut entities: Vec<EntityDef> = Vec::new();
    let mut statements: Vec<(String, Weights)> = Vec::new();
    let mut budget: Option<u64> = None;
    let mut mix: Option<String> = None;
    let mut time_steps: Option<usize> = None;

    let mut lines = text.lines().enumerate();
    while let Some((number, raw)) = lines.next() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }
        let error = |reason: String| Error::Loader { line: number + 1, reason };

        let mut words = line.split_whitespace();
        let Some(directive) = words.next() else { continue };
        match directive {
            "Entity" => {
                let name = words
                    .next()
                    .ok_or_else(|| error("Entity needs a name".to_owned()))?;
                if words.next() != Some("*") {
                    return Err(error(format!("expected `Entity {name} * <count> [`")));
                }
                let count: u64 = words
                    .next()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(|| error("entity count must be a positive integer".to_owned()))?;
                if words.next() != Some("[") {
                    return Err(error("expected `[` to open the field block".to_owned()));
                }

                let mut def = EntityDef::new(name, count);
                loop {
                    let Some((field_number, field_raw)) = lines.next() else {
                        return Err(error(format!("unterminated field block for {name}")));
                    };
                    let field_line = strip_comment(field_raw);
                    if field_line.is_empty() {
                        continue;
                    }
                    if field_line == "]" {
                        break;
                    }
                    def = parse_field(def, field_line).map_err(|reason| Error::Loader {
                        line: field_number + 1,
                        reason,
                    })?;
                }
                entities.push(def);
            }
            "Budget" => {
                budget = Some(
                    words
                        .next()
                        .and_then(|w| w.parse().ok())
                        .ok_or_else(|| error("Budget needs a byte count".to_owned()))?,
                );
            }
            "Mix" => {
                mix = Some(
                    words
                        .next()
                        .ok_or_else(|| error("Mix needs a label".to_owned()))?
                        .to_owned(),
                );
            }
            "TimeSteps" => {
                time_steps = Some(
                    words
                        .next()
                        .and_then(|w| w.parse().ok())
                        .ok_or_else(|| error("TimeSteps needs a count".to_owned()))?,
                );
            }
            "Q" => {
                let weight: f64 = words
                    .next()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(|| error("Q needs a weight".to_owned()))?;
                let statement = words.collect::<Vec<_>>().join(" ");
                if statement.is_empty() {
                    return Err(error("Q needs a statement".to_owned()));
                }
                statements.push((statement, Weights::Fixed(weight)));
            }
            "Group" => {
                let _name = words
                    .next()
                    .ok_or_else(|| error("Group needs a name".to_owned()))?;
                let mut weights = BTreeMap::new();
                for word in words {
                    if word == "[" {
                        break;
                    }
                    let (label, value) = word
                        .split_once('=')
                        .ok_or_else(|| error(format!("expected <mix>=<weight>, found {word}")))?;
                    let value: f64 = value
                        .parse()
                        .map_err(|_| error(format!("bad weight for mix {label}")))?;
                    weights.insert(label.to_owned(), value);
                }
                if weights.is_empty() {
                    return Err(error("Group needs at least one <mix>=<weight>".to_owned()));
                }

                loop {
                    let Some((_, group_raw)) = lines.next() else {
                        return Err(error("unterminated Group block".to_owned()));
                    };
                    let group_line = strip_comment(group_raw);
                    if group_line.is_empty() {
                        continue;
                    }
                    if group_line == "]" {
                        break;
                    }
                    statements
                        .push((group_line.to_owned(), Weights::PerMix(weights.clone())));
                }
            }
            "F" => {
                let rest = line[1..].trim_start();
                let close = rest
                    .find(']')
                    .ok_or_else(|| error("F needs a [w0, w1, ...] weight list".to_owned()))?;
                if !rest.starts_with('[') {
                    return Err(error("F needs a [w0, w1, ...] weight list".to_owned()));
                }
                let weights: Vec<f64> = rest[1..close]
                    .split(',')
                    .map(|w| w.trim().parse::<f64>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| error("bad weight in F list".to_owned()))?;
                let statement = rest[close + 1..].trim();
                if statement.is_empty() {
                    return Err(error("F needs a statement".to_owned()));
                }
                statements.push((statement.to_owned(), Weights::PerStep(weights)));
            }
            other => {
                return Err(error(format!("unknown directive {other}")));
            }
        }
    }

    let mut builder = ModelBuilder::new();
    for def in entities {
        builder = builder.entity(def);
    }
    let model = builder.build()?;

    let mut workload = Workload::new(model);
    if let Some(budget) = budget {
        workload = workload.with_budget(budget);
    }
    if let Some(mix) = mix {
        workload = workload.with_mix(mix);
    }
    if let Some(steps) = time_steps {
        workload = workload.with_time_steps(steps);
    }
    for (statement, weights) in statements {
        workload.add_weighted(&statement, weights);
    }
    Ok(workload)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(at) => line[..at].trim(),
        None => line.trim(),
    }
}

/// Parses `<name>: <kind>` field declarations.
fn parse_field(def: EntityDef, line: &str) -> std::result::Result<EntityDef, String> {
    let (name, kind) = line
        .split_once(':')
        .ok_or_else(|| format!("expected `<field>: <kind>`, found {line}"))?;
    let name = name.trim();
    let mut words = kind.split_whitespace();
    match words.next() {
        Some("id") => Ok(def.id(name)),
        Some("integer" | "int") => Ok(def.integer(name)),
        Some("float") => Ok(def.float(name)),
        Some("date") => Ok(def.date(name)),
        Some("string") => {
            let length: u64 = words
                .next()
                .and_then(|w| w.parse().ok())
                .ok_or_else(|| format!("string field {name} needs a length"))?;
            Ok(def.string(name, length))
        }
        Some("fk" | "foreign_key") => {
            let target = words
                .next()
                .ok_or_else(|| format!("foreign key {name} needs a target entity"))?;
            let cardinality = match words.next() {
                Some("one") | None => Cardinality::One,
                Some("many") => Cardinality::Many,
                Some(other) => {
                    return Err(format!("unknown cardinality {other} for {name}"))
                }
            };
            Ok(def.foreign_key(name, target, cardinality))
        }
        Some(other) => Err(format!("unknown field kind {other}")),
        None => Err(format!("field {name} needs a kind")),
    }
}
