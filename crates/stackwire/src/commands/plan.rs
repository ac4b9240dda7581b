use colored::Colorize;
use stackwire_config::Settings;
use stackwire_core::{Composer, Profile, REQUIRED_KEYS};
use std::sync::Arc;

pub fn handle(settings: Settings, profile: Profile) -> anyhow::Result<()> {
    let provider = super::local_provider(&settings, profile);
    let state_dir = provider.state_dir().to_path_buf();
    let composer = Composer::new(settings, Arc::new(provider));

    let plan = match composer.plan() {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{}", "✗ Invalid component graph".red().bold());
            eprintln!("  {}", e);
            return Err(e.into());
        }
    };

    let settings = composer.settings();
    println!(
        "{} {} ({}, {})",
        "Plan for".blue(),
        settings.stack_name.cyan(),
        profile,
        settings.region
    );
    println!("  state: {}", state_dir.display());
    println!();

    for (index, layer) in plan.layers().iter().enumerate() {
        let names: Vec<String> = layer.iter().map(|c| c.as_str().cyan().to_string()).collect();
        println!("  layer {}: {}", index, names.join(", "));
        for id in layer {
            if let Some(descriptor) = plan.descriptor(*id) {
                for input in &descriptor.inputs {
                    println!("    {} <- {}", id, input);
                }
            }
        }
    }

    let capacity = profile.capacity();
    println!();
    println!("{}", "Capacity".bold());
    println!(
        "  cache: {} x {}",
        capacity.cache_nodes, capacity.cache_node_type
    );
    println!(
        "  service: {} replica(s), {} CPU units, {}MiB",
        capacity.service_desired_count, capacity.service_cpu, capacity.service_memory_mib
    );
    println!(
        "  database: {}-{} capacity units",
        capacity.database_min_capacity, capacity.database_max_capacity
    );
    println!();
    println!("{} {}", "Runtime keys:".bold(), REQUIRED_KEYS.join(", "));

    Ok(())
}
