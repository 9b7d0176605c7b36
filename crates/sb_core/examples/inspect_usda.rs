//! Example: Open a USDA file and print its composed prim hierarchy.
//!
//! Run with: cargo run --example inspect_usda -- scene.usda

use std::env;

use sb_core::usd::Stage;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_usda <path-to-usda-file>");
        println!("\nExample:");
        println!("  cargo run --example inspect_usda -- scene.usda");
        return;
    }

    let path = &args[1];
    println!("Opening stage: {}", path);

    match Stage::open(path) {
        Ok(stage) => {
            let meta = stage.metadata();
            println!("\n=== Stage: {} ===", stage.identifier());
            println!("Prims: {}", stage.len());
            if let Some(default_prim) = &meta.default_prim {
                println!("Default prim: {}", default_prim);
            }
            if let (Some(start), Some(end)) = (meta.start_time_code, meta.end_time_code) {
                println!("Time range: {} - {}", start, end);
            }

            println!("\n--- Hierarchy ---");
            for prim in stage.traverse() {
                let indent = "  ".repeat(prim.path().depth());
                let type_name = if prim.type_name().is_empty() {
                    "-"
                } else {
                    prim.type_name()
                };
                let animated = prim
                    .attributes()
                    .filter(|(_, attr)| attr.is_time_varying())
                    .count();
                if animated > 0 {
                    println!(
                        "{}{} [{}] ({} animated attributes)",
                        indent,
                        prim.name(),
                        type_name,
                        animated
                    );
                } else {
                    println!("{}{} [{}]", indent, prim.name(), type_name);
                }
            }
        }
        Err(e) => {
            eprintln!("Error opening stage: {}", e);
        }
    }
}
