//! `utgen doctor`

use anyhow::Context;
use std::path::Path;
use utgen_core::GeneratorConfig;
use utgen_provider::build_client;
use utgen_toolchain::{check_dependencies, CmakeSettings};

pub(crate) async fn run(config_path: &Path, skip_provider: bool) -> anyhow::Result<i32> {
    let config = GeneratorConfig::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    let settings = CmakeSettings::new(std::env::temp_dir(), config.build_timeout(), config.test_timeout());
    let report = check_dependencies(&settings).await;
    println!("Toolchain:");
    for tool in report.tools() {
        match &tool.version {
            Some(version) => println!("  ok       {:<8} {version}", tool.program),
            None => println!("  missing  {}", tool.program),
        }
    }
    let mut healthy = report.all_available();

    let providers = &config.llm_settings.providers;
    println!("Provider: {} ({})", providers.provider, providers.model());
    if skip_provider {
        println!("  skipped");
    } else {
        let provider_ok = match build_client(providers) {
            Ok(client) => match client.probe(&config.completion_options()).await {
                Ok(true) => {
                    println!("  ok       connection test passed");
                    true
                }
                Ok(false) => {
                    println!("  failed   empty answer to the connection test");
                    false
                }
                Err(err) => {
                    println!("  failed   {err}");
                    false
                }
            },
            Err(err) => {
                println!("  failed   {err}");
                false
            }
        };
        healthy &= provider_ok;
    }

    Ok(i32::from(!healthy))
}
