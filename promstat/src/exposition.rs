//! Encoding of registry snapshots into the Prometheus text exposition format.

use crate::common::Snapshot;
use crate::formatting::{write_help_line, write_type_line};

/// Encodes every metric of `snapshot` in the Prometheus text exposition format.
///
/// Each metric is written as an optional `# HELP` line, a `# TYPE` line, and then the lines of all
/// of its instances, with no blank lines in between.  Metrics appear in snapshot order.
pub fn encode(snapshot: &Snapshot) -> String {
    let mut output = String::new();

    for entry in snapshot {
        let name = entry.name();
        if let Some(help) = entry.help() {
            write_help_line(&mut output, name, help);
        }

        write_type_line(&mut output, name, entry.kind().as_str());
        entry.metric().render(&mut output);
    }

    output
}
