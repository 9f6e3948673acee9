//! Installs `alloc_ledger` as the global allocator, attributes allocations to categories and
//! prints the resulting report.
//!
//! Run with: `cargo run --example alloc_ledger_basic`

use std::collections::HashMap;
use std::hint::black_box;

use alloc_ledger::{CategoryId, CategoryScope, Tracker, TrackingAllocator, categories};

static TRACKER: Tracker = Tracker::new();

#[global_allocator]
static ALLOCATOR: TrackingAllocator<std::alloc::System> = TrackingAllocator::system(&TRACKER);

const SCRIPTING: CategoryId = 12;

fn main() {
    TRACKER.register_category(SCRIPTING, "Scripting");

    let textures = {
        let _scope = CategoryScope::enter(categories::GRAPHICS);
        (0..16).map(|_| vec![0_u8; 64 * 64 * 4]).collect::<Vec<_>>()
    };

    let sounds = {
        let _scope = CategoryScope::enter(categories::AUDIO);
        vec![0_i16; 44_100]
    };

    {
        let _scope = CategoryScope::enter(SCRIPTING);

        let mut globals = HashMap::new();
        for i in 0..1_000 {
            globals.insert(format!("variable_{i}"), i);
        }
        black_box(&globals);
    }

    println!("While textures and sounds are loaded:");
    TRACKER.print_to_stdout();

    drop(textures);
    drop(sounds);

    println!();
    println!("After unloading:");
    TRACKER.print_to_stdout();

    let path = std::env::temp_dir().join("alloc_ledger_basic.txt");
    match TRACKER.write_report_to_file(&path) {
        Ok(listed) => println!("\nListed {listed} live allocations in {}", path.display()),
        Err(e) => println!("\nFailed to write report: {e}"),
    }
}
