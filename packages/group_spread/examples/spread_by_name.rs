//! Monitors the first process matching a name for a few seconds, then stops.
//!
//! Run with: `cargo run --example spread_by_name -- <process-name>`

use std::time::Duration;

use group_spread::{GroupSpreader, process_ids_by_name};

fn main() {
    let Some(name) = std::env::args().nth(1) else {
        println!("usage: spread_by_name <process-name>");
        return;
    };

    let pids = process_ids_by_name(&name);
    let Some(&pid) = pids.first() else {
        println!("no process named '{name}' found");
        return;
    };

    let mut spreader = GroupSpreader::new();
    let (completion_tx, completion_rx) = oneshot::channel();

    spreader.start_async(pid, Duration::from_millis(500), completion_tx);
    println!("monitoring process {pid} for 10 seconds");

    match completion_rx.recv_timeout(Duration::from_secs(10)) {
        Ok(outcome) => println!("session ended on its own: {outcome}"),
        Err(_) => println!("time is up, stopping"),
    }

    spreader.stop();
}
