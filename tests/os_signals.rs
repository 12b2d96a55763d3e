//! Real OS signals through `OsSignalSource`.
//!
//! The watched set has to be blocked on the process's initial thread before
//! any other thread exists, so this target provides its own `main` instead of
//! the libtest runner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use lifecycle_coordinator::Coordinator;

const TIMEOUT: Duration = Duration::from_secs(5);

fn main() {
    let coordinator = Arc::new(Coordinator::builder().signal_grace(Duration::from_secs(30)).build());
    coordinator.start().expect("coordinator start");

    run("sighup_runs_reload_listeners", || sighup_runs_reload_listeners(&coordinator));
    run("second_sigint_cuts_grace_short", || second_sigint_cuts_grace_short(&coordinator));
    run("shutdown_joins_worker_threads", || shutdown_joins_worker_threads(&coordinator));
}

fn run(name: &str, test: impl FnOnce()) {
    print!("test {} ... ", name);
    test();
    println!("ok");
}

fn send(signal: Signal) {
    let pid = Pid::from_raw(std::process::id() as i32);
    kill(pid, signal).expect("kill");
}

fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn sighup_runs_reload_listeners(coordinator: &Coordinator) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    coordinator.register_config_reload_listener(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    send(Signal::SIGHUP);
    assert!(wait_for(|| calls.load(Ordering::SeqCst) == 1));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(coordinator.termination_record().is_none());
}

fn second_sigint_cuts_grace_short(coordinator: &Arc<Coordinator>) {
    let sender = {
        let coordinator = coordinator.clone();
        thread::spawn(move || {
            send(Signal::SIGINT);
            // Pending standard signals coalesce; wait for the first to land.
            assert!(wait_for(|| coordinator.termination_record().is_some()));
            thread::sleep(Duration::from_millis(50));
            send(Signal::SIGINT);
        })
    };

    let started = Instant::now();
    let reason = coordinator.wait_for_termination();
    sender.join().expect("sender thread");

    assert_eq!(reason, "Interactive attention signal");
    assert!(started.elapsed() < TIMEOUT);
    assert_eq!(coordinator.termination_record().unwrap().grace, Duration::from_secs(30));
}

fn shutdown_joins_worker_threads(coordinator: &Coordinator) {
    coordinator.shutdown();
    assert!(!coordinator.has_running_threads());
}
