pub mod capacity;
pub mod deploy;
pub mod plan;

use stackwire_cloud_local::LocalProvider;
use stackwire_config::Settings;
use stackwire_core::Profile;

/// Local provider for `profile`, with the configured registry tags published
///
/// Each profile keeps its own state directory so staging and production
/// never share resources.
pub fn local_provider(settings: &Settings, profile: Profile) -> LocalProvider {
    LocalProvider::new(settings.state_dir.join(profile.as_str()), &settings.region).with_images(
        &settings.registry.repository,
        settings.registry.tags.iter().cloned(),
    )
}
