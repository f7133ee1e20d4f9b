//! Segments never move, so blocks can be held as plain references while
//! the arena keeps growing.

use memarena::{ArenaConfig, SegmentedArena};

fn main() -> Result<(), memarena::ArenaError> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let arena = SegmentedArena::with_config(ArenaConfig::default().with_segment_capacity(256))?;

    let first = arena.alloc_value(2.22f64)?;
    println!("First value {} at {:p}", first, first);

    let mut words = Vec::new();
    for i in 0..64u32 {
        words.push(arena.alloc_value(i * 10)?);
    }

    let big = arena.alloc(4096)?;
    big.fill(0xaa);
    println!("Dedicated block of {} bytes at {:p}", big.len(), big.as_ptr());

    println!("First value is still {} at {:p}", first, first);
    println!("Last word {} at {:p}", words[63], words[63]);
    println!(
        "{} segments, current {}, {:?}",
        arena.segment_count(),
        arena.current_segment(),
        arena.stats()
    );

    Ok(())
}
