//! Command-line front end: resolve the target, run one monitoring session and relay either a
//! user interrupt or the session's own completion into a clean stop.

use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

use argh::FromArgs;
use group_spread::{
    GroupSpreader, PlacementPolicy, ProcessId, SessionError, SessionOutcome, process_ids_by_name,
};
use tracing::{error, info, warn};

/// Keep the threads of a target process spread across all processor groups.
#[derive(Debug, FromArgs)]
struct Args {
    /// process id or executable name of the target process
    #[argh(positional)]
    target: String,

    /// refresh interval in milliseconds (values below the allowed minimum substitute the
    /// default)
    #[argh(option, default = "1000")]
    refresh_ms: u64,

    /// place new threads on a uniformly random group instead of filling by capacity
    #[argh(switch)]
    random: bool,
}

/// What the host waits on: whichever fires first wins.
#[derive(Debug)]
enum HostEvent {
    Interrupted,
    SessionEnded(SessionOutcome),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_target(false).init();

    let args: Args = argh::from_env();

    let Some(pid) = resolve_target(&args.target) else {
        error!("no processes found that match '{}'", args.target);
        return ExitCode::from(5);
    };

    let policy = if args.random {
        PlacementPolicy::UniformRandom
    } else {
        PlacementPolicy::CapacityFirst
    };

    let (event_tx, event_rx) = mpsc::channel();

    let interrupt_tx = event_tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(HostEvent::Interrupted);
    })
    .expect("installing the interrupt handler cannot fail this early in the process");

    let (completion_tx, completion_rx) = oneshot::channel();

    let mut spreader = GroupSpreader::with_policy(policy);
    spreader.start_async(pid, Duration::from_millis(args.refresh_ms), completion_tx);

    // Relay session completion into the same event stream the interrupt handler feeds.
    std::thread::spawn(move || {
        if let Ok(outcome) = completion_rx.recv() {
            let _ = event_tx.send(HostEvent::SessionEnded(outcome));
        }
    });

    let exit_code = match event_rx.recv() {
        Ok(HostEvent::Interrupted) | Err(_) => {
            info!("interrupt received, stopping");
            ExitCode::SUCCESS
        }
        Ok(HostEvent::SessionEnded(outcome)) => {
            info!("session ended: {outcome}");
            match outcome {
                SessionOutcome::TargetExited | SessionOutcome::Cancelled => ExitCode::SUCCESS,
                SessionOutcome::Aborted(SessionError::Topology(_)) => ExitCode::from(2),
                SessionOutcome::Aborted(_) => ExitCode::from(3),
                _ => ExitCode::FAILURE,
            }
        }
    };

    spreader.stop();
    exit_code
}

/// Resolves the command-line target to a process id.
///
/// Name resolution runs first and a numeric parse is only the fallback, so processes with
/// executable names that happen to be integers still resolve by name.
fn resolve_target(target: &str) -> Option<ProcessId> {
    let pids = process_ids_by_name(target);

    match pids.as_slice() {
        [] => target.parse().ok(),
        [pid] => Some(*pid),
        [first, ..] => {
            warn!(
                "{} instances of '{target}' found, but only one can be managed per session - \
                 managing {first}",
                pids.len()
            );
            Some(*first)
        }
    }
}
