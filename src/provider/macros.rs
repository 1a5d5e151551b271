use super::{Provider, ProviderConfig, ProviderInfo};
use crate::Result;

/// Internal registration structure used by the macro.
#[doc(hidden)]
pub struct ProviderRegistration {
    pub info: ProviderInfo,
    pub factory: fn(&ProviderConfig) -> Result<Box<dyn Provider>>,
}

/// Distributed slice that collects all provider registrations.
#[doc(hidden)]
#[linkme::distributed_slice]
pub static PROVIDER_REGISTRY: [ProviderRegistration];

/// Registers a provider so [`create`](crate::provider::create) can build it.
///
/// The config type must implement `TryFrom<&ProviderConfig>` with
/// `Error = KubaError`, and the provider must have a `new(config)` constructor.
///
/// ```ignore
/// register_provider! {
///     struct: SecretsManagerProvider,
///     config: SecretsManagerConfig,
///     name: "aws",
///     description: "AWS Secrets Manager",
/// }
/// ```
#[macro_export]
macro_rules! register_provider {
    (
        struct: $struct_name:ident,
        config: $config_type:ty,
        name: $name:expr,
        description: $description:expr $(,)?
    ) => {
        impl $struct_name {
            const PROVIDER_NAME: &'static str = $name;
        }

        const _: () = {
            #[linkme::distributed_slice($crate::provider::PROVIDER_REGISTRY)]
            #[doc(hidden)]
            static PROVIDER_REGISTRATION: $crate::provider::ProviderRegistration = $crate::provider::ProviderRegistration {
                info: $crate::provider::ProviderInfo {
                    name: $name,
                    description: $description,
                },
                factory: |config| {
                    let config = <$config_type>::try_from(config)?;
                    Ok(Box::new(<$struct_name>::new(config)))
                },
            };
        };
    };
}
