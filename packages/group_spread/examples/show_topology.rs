//! Prints the processor group layout a monitoring session would operate on.

use group_spread::SessionTopology;

fn main() {
    match SessionTopology::current() {
        Ok(topology) => {
            println!("{} active processor groups:", topology.group_count());

            for group in topology.groups() {
                println!(
                    "  group {}: {} processors, full mask {:#x}",
                    group.index(),
                    group.processor_count(),
                    group.full_mask()
                );
            }
        }
        Err(error) => {
            println!("nothing to spread across: {error}");
        }
    }
}
