use anyhow::Context;
use colored::Colorize;
use stackwire_cloud::CloudProvider;
use stackwire_config::Settings;
use stackwire_core::{Composer, Profile};
use std::path::Path;
use std::sync::Arc;

pub async fn handle(
    settings: Settings,
    profile: Profile,
    version: &str,
    outputs: Option<&Path>,
) -> anyhow::Result<()> {
    let provider = super::local_provider(&settings, profile);

    let auth = provider.check_auth().await?;
    if !auth.authenticated {
        anyhow::bail!(
            "{} is not ready: {}",
            provider.display_name(),
            auth.error.unwrap_or_default()
        );
    }

    println!(
        "{} {} ({}) version {}",
        "Deploying".blue(),
        settings.stack_name.cyan(),
        profile,
        version.cyan()
    );
    if let Some(account) = &auth.account_info {
        println!("  provider: {} [{}]", provider.display_name(), account);
    }

    let composer = Composer::new(settings, Arc::new(provider));
    let deployment = match composer.run(profile, version).await {
        Ok(deployment) => deployment,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Deployment failed".red().bold());
            if let Some(component) = e.component() {
                eprintln!("  component: {}", component);
            }
            eprintln!("  {}", e);
            eprintln!("  Resources created before the failure were left in place.");
            return Err(e.into());
        }
    };

    println!();
    for (index, layer) in deployment.layers.iter().enumerate() {
        let names: Vec<&str> = layer.iter().map(|c| c.as_str()).collect();
        println!("  {} layer {}: {}", "✓".green(), index, names.join(", "));
    }
    println!("  {} security rules", deployment.rules.len());

    println!();
    println!("{}", "Outputs".bold());
    for (name, value, description) in deployment.outputs.entries() {
        println!("  {:<18} {}", name.cyan(), value);
        println!("  {:<18} {}", "", description.dimmed());
    }

    if let Some(path) = outputs {
        let json = serde_json::to_string_pretty(&deployment.outputs.to_json())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write outputs to {}", path.display()))?;
        println!();
        println!("  outputs written to {}", path.display().to_string().cyan());
    }

    println!();
    println!("{}", "✓ Deployment complete".green().bold());
    Ok(())
}
