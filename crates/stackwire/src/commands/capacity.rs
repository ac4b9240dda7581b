use colored::Colorize;
use stackwire_core::{CAPACITY_TABLE, MAX_SERVICE_REPLICAS};

pub fn handle() {
    println!("{}", "Capacity by profile".bold());
    println!();
    println!(
        "  {:<12} {:>6} {:<18} {:>8} {:>6} {:>8} {:>12}",
        "PROFILE", "NODES", "CACHE NODE TYPE", "REPLICAS", "CPU", "MEMORY", "DB CAPACITY"
    );
    for (profile, capacity) in &CAPACITY_TABLE {
        println!(
            "  {:<12} {:>6} {:<18} {:>8} {:>6} {:>8} {:>12}",
            profile.to_string().cyan(),
            capacity.cache_nodes,
            capacity.cache_node_type.as_str(),
            capacity.service_desired_count,
            capacity.service_cpu,
            format!("{}MiB", capacity.service_memory_mib),
            format!(
                "{}-{}",
                capacity.database_min_capacity, capacity.database_max_capacity
            ),
        );
    }
    println!();
    println!(
        "  Service replicas scale between the profile's count and {} at 50% CPU",
        MAX_SERVICE_REPLICAS
    );
}
