use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionShortfall {
    pub partition: PathBuf,
    pub available: u64,
    pub needed: u64,
}

/// Partitions whose pending output would not fit. Partitions missing from
/// `available` are assumed to have room.
pub fn find_shortfalls(
    needed: &BTreeMap<PathBuf, u64>,
    available: &BTreeMap<PathBuf, u64>,
) -> Vec<PartitionShortfall> {
    needed
        .iter()
        .filter_map(|(partition, &needed)| {
            let &free = available.get(partition)?;
            (needed > free).then(|| PartitionShortfall {
                partition: partition.clone(),
                available: free,
                needed,
            })
        })
        .collect()
}

pub fn shortfall_warning(shortfalls: &[PartitionShortfall]) -> String {
    let mut text = String::from(
        "The space needed to timestamp all the files found exceeds the amount of free space found:\n\n",
    );
    for item in shortfalls {
        text.push_str(&format!(
            "* {}: free space {}, space needed {} (approximately)\n",
            item.partition.display(),
            human_size(item.available),
            human_size(item.needed)
        ));
    }
    text.push_str("\nTimestamped files might not fit on disk.");
    text
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
