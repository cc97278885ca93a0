//! `evm-lab` serves the execution gateway over HTTP and sends it requests.

use clap::Parser;
use evm_lab::CountingAllocator;
use evm_lab_cli::MainCmd;

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator::new();

#[tokio::main]
async fn main() {
    set_thread_panic_hook();
    if let Err(e) = MainCmd::parse().run().await {
        println!("{e}");
        std::process::exit(1);
    }
}

/// Records panics in the log before the default report. Handler panics do not bring the server
/// down.
fn set_thread_panic_hook() {
    use std::panic::{set_hook, take_hook};
    let orig_hook = take_hook();
    set_hook(Box::new(move |panic_info| {
        tracing::error!(%panic_info, "Thread panicked");
        orig_hook(panic_info);
    }));
}
