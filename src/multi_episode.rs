//! Combines the names of multi-episode files
//!
//! Two-part episodes are usually titled `Name (1)`, `Name (2)`. Such lists are
//! merged into a single name using the configured format, anything else is
//! joined.

use crate::config::ConfigValueError;
use crate::template::{self, Fields, Value};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static NUMBERED_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*) \(([0-9]+)\)$").expect("part regex should compile"));

/// Splits `Name (2)` into `("Name", Some(2))`
fn split_part(name: &str) -> (&str, Option<u32>) {
    NUMBERED_PART
        .captures(name)
        .and_then(|caps| {
            let base = caps.get(1)?.as_str();
            let number = caps.get(2)?.as_str().parse().ok()?;
            Some((base, Some(number)))
        })
        .unwrap_or((name, None))
}

/// Builds one display name from the names of consecutive episodes
///
/// `format` receives `epname`, `episodemin` and `episodemax`. Names that do
/// not share a base or are not numbered consecutively are joined with
/// `join_with` instead.
pub fn aggregate_names(
    names: &[String],
    join_with: &str,
    format: &str,
) -> Result<String, ConfigValueError> {
    if names.len() < 2 {
        return Ok(names.first().cloned().unwrap_or_default());
    }

    let parts: Vec<(&str, Option<u32>)> = names.iter().map(|n| split_part(n)).collect();

    let unnumbered = parts.iter().filter(|(_, number)| number.is_none()).count();
    let bases: BTreeSet<&str> = parts.iter().map(|(base, _)| *base).collect();
    let numbers: Vec<u32> = parts.iter().map(|(_, number)| number.unwrap_or(1)).collect();
    let distinct: BTreeSet<u32> = numbers.iter().copied().collect();

    let (Some(&min), Some(&max)) = (distinct.first(), distinct.last()) else {
        return Ok(names.join(join_with));
    };

    let consecutive = (max - min) as usize == numbers.len() - 1;
    if unnumbered > 1 || bases.len() > 1 || distinct.len() != numbers.len() || !consecutive {
        return Ok(names.join(join_with));
    }

    let mut fields = Fields::new();
    fields.insert("epname".to_string(), Value::from(parts[0].0));
    fields.insert("episodemin".to_string(), Value::from(min));
    fields.insert("episodemax".to_string(), Value::from(max));
    template::render(format, &fields)
}
