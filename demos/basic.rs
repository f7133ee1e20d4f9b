use memarena::{Arena, Block};

fn log_alloc(arena: &Arena, block: Block) {
    println!("Requested {} bytes of memory", block.len());
    println!(
        "Received offset {} (address {:?}), used {} / {}",
        block.offset(),
        arena.as_ptr(block).map(|ptr| ptr.as_ptr()),
        arena.used(),
        arena.capacity()
    );
}

fn main() -> Result<(), memarena::ArenaError> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::TRACE).init();

    let mut arena = Arena::new()?;

    let b1 = arena.alloc_value(22u64)?;
    log_alloc(&arena, b1);

    let b2 = arena.alloc(8)?;
    log_alloc(&arena, b2);

    arena.align_next_block();
    let b3 = arena.alloc(16)?;
    log_alloc(&arena, b3);

    arena.free(b1)?;
    let b4 = arena.alloc(8)?;
    println!("Should be first offset {}: {}", b1.offset(), b4.offset());

    // Force a growth, the handles keep working.
    let big = arena.alloc(64 * 1024)?;
    log_alloc(&arena, big);
    println!("b4 still reads {:?}", arena.get(b4)?);

    println!("{:?}", arena.stats());
    arena.teardown();

    Ok(())
}
