//! Example walking a chain through configuration, prepare and processing
//!
//! Run with: cargo run --package focuscrush-core --example chain_demo

use focuscrush_core::domain::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("focuscrush_core=debug,info")
        .init();

    println!("=== FocusCrush Chain Demo ===\n");

    // 1. Parameter surface
    println!("1. Parameters:");
    for descriptor in PARAMETERS.iter() {
        println!(
            "   {:<20} {:>8} .. {:<8} default {} {}",
            descriptor.name,
            descriptor.min,
            descriptor.max,
            descriptor.default,
            descriptor.unit.symbol()
        );
    }

    // 2. Save and reload a configuration
    println!("\n2. Saving configuration...");
    let mut config = ChainConfig {
        layout: BusLayout::new(1, 2),
        ..ChainConfig::default()
    };
    config.parameters.set(ParamId::BitDepth, 8.0);
    let config_path = std::env::temp_dir().join("focuscrush_demo.toml");
    config.save_to_file(&config_path).await?;
    let loaded = ChainConfig::load_from_file(&config_path).await?;
    println!("   ✓ Round trip through {}", config_path.display());

    // 3. Build and prepare the chain
    println!("\n3. Preparing chain (mono in, stereo out)...");
    let mut chain = loaded.into_chain()?;
    chain.prepare(ProcessSpec::new(44100.0, 256, 2))?;
    println!("   ✓ {} prepared", chain.name());

    // 4. Process one block of a 1 kHz sine
    println!("\n4. Processing one block...");
    let mut buffer = AudioBuffer::new(2, 256);
    for (i, sample) in buffer.channel_mut(0).iter_mut().enumerate() {
        *sample = (0.5 * (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / 44100.0).sin()) as f32;
    }
    chain.process(&mut buffer)?;
    let peak = buffer.channel(0).iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    println!("   Left peak: {:.4}", peak);
    println!("   Right silent: {}", buffer.channel(1).iter().all(|&s| s == 0.0));

    // 5. Live parameter change from another thread
    println!("\n5. Changing drive from a control thread...");
    let params = chain.params().clone();
    std::thread::spawn(move || params.set(ParamId::Drive, 1.0)).join().ok();
    chain.process(&mut buffer)?;
    println!("   ✓ drive = {}", chain.params().get(ParamId::Drive));

    println!("\n=== Demo Complete ===");

    std::fs::remove_file(config_path)?;

    Ok(())
}
