//! Typed endpoint catalog.
//!
//! Each resource gets a borrowed handle (`client.containers()`,
//! `client.images()`, ...) whose methods build an [`Endpoint`] and hand it
//! to the dispatch core.
//!
//! [`Endpoint`]: crate::endpoint::Endpoint

pub mod containers;
pub mod exec;
pub mod images;
pub mod networks;
pub mod plugins;
pub mod secrets;
pub mod system;
pub mod volumes;

pub use containers::{
    AttachOptions, ContainerListOptions, Containers, KillOptions, LogsOptions,
    RemoveContainerOptions, StatsOptions, StopOptions, TopOptions, WaitOptions,
};
pub use exec::Exec;
pub use images::{
    ImageListOptions, Images, PullOptions, PushOptions, RegistryAuth, RemoveImageOptions,
    TagOptions,
};
pub use networks::Networks;
pub use plugins::Plugins;
pub use secrets::{ObjectKind, SwarmObjects};
pub use system::{EventsOptions, System};
pub use volumes::Volumes;

use crate::dispatch::Client;
use crate::endpoint::{Filters, HasQuery, Query};

/// Filtered listing shared by networks, volumes, plugins, secrets and configs.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filters: Filters,
}

impl ListOptions {
    pub fn with_filters(filters: Filters) -> Self {
        Self { filters }
    }
}

impl HasQuery for ListOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_filters(&self.filters);
    }
}

impl Client {
    pub fn containers(&self) -> Containers<'_> {
        Containers::new(self)
    }

    pub fn images(&self) -> Images<'_> {
        Images::new(self)
    }

    pub fn networks(&self) -> Networks<'_> {
        Networks::new(self)
    }

    pub fn volumes(&self) -> Volumes<'_> {
        Volumes::new(self)
    }

    pub fn exec(&self) -> Exec<'_> {
        Exec::new(self)
    }

    pub fn plugins(&self) -> Plugins<'_> {
        Plugins::new(self)
    }

    pub fn secrets(&self) -> SwarmObjects<'_> {
        SwarmObjects::new(self, ObjectKind::Secret)
    }

    pub fn configs(&self) -> SwarmObjects<'_> {
        SwarmObjects::new(self, ObjectKind::Config)
    }

    pub fn system(&self) -> System<'_> {
        System::new(self)
    }
}
