/// Example program to print the loaded configuration
///
/// Run with: cargo run -p rune-config --example print_config

fn main() {
    let config = rune_config::RuneConfig::load();

    println!("=== Rune Animation Configuration ===\n");

    println!("Animation Settings:");
    println!("  Frame Interval: {} ms", config.animation.frame_interval_ms);
    println!("  Document Origin: {} ms", config.animation.document_origin_ms);
    println!("  Max Frames Per Advance: {}", config.animation.max_frames_per_advance);
    println!();

    println!("Diagnostics Settings:");
    println!("  Trace Frames: {}", config.diagnostics.trace_frames);
    println!();

    match toml::to_string_pretty(&config) {
        Ok(toml_str) => {
            println!("=== Serialized Configuration ===");
            println!("{}", toml_str);
        }
        Err(e) => {
            eprintln!("Failed to serialize config: {}", e);
        }
    }
}
